//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - observed inputs (`Target`, `Spectrum`)
//! - spectral classification (`SpecType`, `TemplateKey`)
//! - refinement and ranking outputs (`ZFit`, `Candidate`, `CandidateTable`, `ZBestRow`)
//! - the nested scan results (`ScanResults`, `TemplateScan`)
//! - run configuration (`ZfindConfig`)
//! - `zwarn` bit definitions

pub mod scan;
pub mod types;
pub mod zwarn;

pub use scan::*;
pub use types::*;
