//! Input/output helpers.
//!
//! - hierarchical result container (`store`)
//! - zscan result read/write on top of it (`zscan`)
//! - target JSON read/write (`targets`)
//! - candidate exports (CSV) (`export`)

pub mod export;
pub mod store;
pub mod targets;
pub mod zscan;

pub use export::*;
pub use store::*;
pub use targets::*;
pub use zscan::*;
