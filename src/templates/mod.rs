//! Basis templates and the catalog that loads them.
//!
//! - `Template` value type (`template`)
//! - per-type redshift scan grids (`grid`)
//! - FITS subset reader/writer (`fits`)
//! - discovery and loading (`catalog`)

pub mod catalog;
pub mod fits;
pub mod grid;
pub mod template;

pub use catalog::*;
pub use grid::*;
pub use template::*;
