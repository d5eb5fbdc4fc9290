//! `rr-zfind` library crate.
//!
//! The binary (`rrz`) is a thin wrapper around this library so that:
//!
//! - the fitting pipeline is testable without spawning processes
//! - the evaluation engines can be swapped by library users
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod logging;
pub mod math;
pub mod report;
pub mod templates;
