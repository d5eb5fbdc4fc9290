//! Shared domain types.
//!
//! These types are kept small and serializable so they can be:
//!
//! - passed to the evaluation engines during a scan
//! - exported to JSON/CSV
//! - rebuilt from a persisted result file

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ZfindError;

/// Coarse spectral class of a template.
///
/// Variant order is alphabetical by tag so that derived ordering matches
/// ordering by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SpecType {
    Galaxy,
    Qso,
    Star,
}

impl SpecType {
    pub const ALL: [SpecType; 3] = [SpecType::Galaxy, SpecType::Qso, SpecType::Star];

    pub fn as_str(self) -> &'static str {
        match self {
            SpecType::Galaxy => "GALAXY",
            SpecType::Qso => "QSO",
            SpecType::Star => "STAR",
        }
    }
}

impl std::fmt::Display for SpecType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SpecType {
    type Err = ZfindError;

    /// Parse a type tag; surrounding whitespace and case are ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim().to_uppercase();
        match tag.as_str() {
            "GALAXY" => Ok(SpecType::Galaxy),
            "QSO" => Ok(SpecType::Qso),
            "STAR" => Ok(SpecType::Star),
            _ => Err(ZfindError::UnknownSpectralType(tag)),
        }
    }
}

/// Identifies one template: its spectral type plus an optional subtype.
///
/// The composite `SPECTYPE:SUBTYPE` string ("full type") only exists at
/// serialization and display boundaries.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TemplateKey {
    pub spectype: SpecType,
    pub subtype: String,
}

impl TemplateKey {
    pub fn new(spectype: SpecType, subtype: impl Into<String>) -> Self {
        Self {
            spectype,
            subtype: subtype.into(),
        }
    }

    /// `SPECTYPE` when there is no subtype, else `SPECTYPE:SUBTYPE`.
    pub fn fulltype(&self) -> String {
        if self.subtype.is_empty() {
            self.spectype.as_str().to_string()
        } else {
            format!("{}:{}", self.spectype, self.subtype)
        }
    }
}

impl std::fmt::Display for TemplateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.fulltype())
    }
}

impl FromStr for TemplateKey {
    type Err = ZfindError;

    /// Split on the first `:`; everything after it is the subtype.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (spectype, subtype) = match s.split_once(':') {
            Some((t, sub)) => (t, sub),
            None => (s, ""),
        };
        Ok(TemplateKey::new(spectype.parse()?, subtype))
    }
}

/// One observed spectrum: wavelengths [Å], flux, and inverse variance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spectrum {
    pub wave: Vec<f64>,
    pub flux: Vec<f64>,
    pub ivar: Vec<f64>,
}

impl Spectrum {
    pub fn len(&self) -> usize {
        self.wave.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wave.is_empty()
    }

    pub fn validate(&self) -> Result<(), ZfindError> {
        if self.flux.len() != self.wave.len() || self.ivar.len() != self.wave.len() {
            return Err(ZfindError::InvalidArgument(format!(
                "spectrum arrays differ in length: wave={}, flux={}, ivar={}",
                self.wave.len(),
                self.flux.len(),
                self.ivar.len()
            )));
        }
        if self.ivar.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(ZfindError::InvalidArgument(
                "spectrum ivar must be finite and non-negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// An observed object to be redshifted. Read-only to the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub id: i64,
    pub spectra: Vec<Spectrum>,
}

impl Target {
    pub fn new(id: i64, spectra: Vec<Spectrum>) -> Self {
        Self { id, spectra }
    }

    pub fn validate(&self) -> Result<(), ZfindError> {
        for spectrum in &self.spectra {
            spectrum.validate().map_err(|e| {
                ZfindError::InvalidArgument(format!("target {}: {e}", self.id))
            })?;
        }
        Ok(())
    }
}

/// One refined local minimum of chi2(z) for a (target, template) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZFit {
    pub z: f64,
    pub zerr: f64,
    pub chi2: f64,
    /// Template coefficients at `z`; length is the template's basis size.
    pub coeff: Vec<f64>,
    pub zwarn: u32,
}

/// One row of a target's ranked candidate table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub targetid: i64,
    pub z: f64,
    pub zerr: f64,
    pub chi2: f64,
    /// Zero-padded to the widest basis among the target's templates.
    pub coeff: Vec<f64>,
    pub zwarn: u32,
    pub spectype: SpecType,
    pub subtype: String,
    /// Rank by ascending chi2 before per-type trimming.
    pub znum: usize,
    /// `chi2` of the next-ranked row minus this row's; 0 for the last row.
    pub deltachi2: f64,
}

impl Candidate {
    pub fn fulltype(&self) -> String {
        TemplateKey::new(self.spectype, self.subtype.clone()).fulltype()
    }
}

/// Ranked candidates for one target, ascending in chi2.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateTable {
    pub targetid: i64,
    pub rows: Vec<Candidate>,
}

impl CandidateTable {
    /// Best (lowest chi2) candidate, if any.
    pub fn best(&self) -> Option<&Candidate> {
        self.rows.first()
    }
}

/// One row of the persisted per-target summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZBestRow {
    pub targetid: i64,
    pub z: f64,
    pub zerr: f64,
    pub zwarn: u32,
}

/// Settings for a `zfind` run.
#[derive(Debug, Clone, PartialEq)]
pub struct ZfindConfig {
    /// Worker count; `None` means half the available cores (at least 1).
    pub ncpu: Option<usize>,
    /// Maximum candidates kept per spectral type per target.
    pub nminima: usize,
}

impl Default for ZfindConfig {
    fn default() -> Self {
        Self {
            ncpu: None,
            nminima: 3,
        }
    }
}

impl ZfindConfig {
    pub fn validate(&self) -> Result<(), ZfindError> {
        if self.nminima == 0 {
            return Err(ZfindError::InvalidArgument("nminima must be >= 1".to_string()));
        }
        if self.ncpu == Some(0) {
            return Err(ZfindError::InvalidArgument("ncpu must be >= 1".to_string()));
        }
        Ok(())
    }

    pub fn resolved_ncpu(&self) -> usize {
        match self.ncpu {
            Some(n) => n.max(1),
            None => default_ncpu(),
        }
    }
}

/// Half of the available cores, at least 1.
pub fn default_ncpu() -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    (cores / 2).max(1)
}
