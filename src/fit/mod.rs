//! Redshift fitting orchestration.
//!
//! Responsibilities:
//!
//! - scan chi2(z) for every (target, template) pair (parallel over targets)
//! - refine local minima of each scan (parallel over targets)
//! - merge per-template minima into one ranked candidate table per target
//! - reduce the scans to one best redshift per target

pub mod aggregate;
pub mod chi2;
pub mod dispatch;
pub mod engine;
pub mod minima;
pub mod pool;
pub mod zbest;
pub mod zfind;

#[cfg(test)]
pub(crate) mod fixtures;

pub use aggregate::*;
pub use chi2::*;
pub use dispatch::*;
pub use engine::*;
pub use minima::*;
pub use pool::*;
pub use zbest::*;
pub use zfind::*;
