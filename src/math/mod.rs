//! Numerical utilities: weighted least squares and resampling.

pub mod ols;
pub mod resample;

pub use ols::*;
pub use resample::*;
