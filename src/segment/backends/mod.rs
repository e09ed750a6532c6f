pub mod stub;

#[cfg(feature = "backend-tract")]
pub mod tract;

pub use stub::StubOracle;

#[cfg(feature = "backend-tract")]
pub use tract::TractOracle;
