//! Nested scan results: target id → template → scan record.

use std::collections::BTreeMap;

use nalgebra::DMatrix;

use crate::domain::{TemplateKey, ZFit};

/// Lowest-chi2 refined minimum of one (target, template) pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BestMinimum {
    pub z: f64,
    pub zerr: f64,
    pub chi2: f64,
    pub zwarn: u32,
}

impl BestMinimum {
    /// Pick the lowest-chi2 entry of a refined-minima table.
    pub fn from_fits(fits: &[ZFit]) -> Option<Self> {
        fits.iter()
            .min_by(|a, b| a.chi2.total_cmp(&b.chi2))
            .map(|f| BestMinimum {
                z: f.z,
                zerr: f.zerr,
                chi2: f.chi2,
                zwarn: f.zwarn,
            })
    }
}

/// Full scan of one template against one target.
///
/// `zchi2`, `penalty` and the rows of `zcoeff` are aligned with `redshifts`.
/// An empty record (the default) marks a slot that never received results.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateScan {
    pub redshifts: Vec<f64>,
    pub zchi2: Vec<f64>,
    pub penalty: Vec<f64>,
    /// `[nz, nbasis]` coefficients.
    pub zcoeff: DMatrix<f64>,
    pub best: Option<BestMinimum>,
}

impl Default for TemplateScan {
    fn default() -> Self {
        Self {
            redshifts: Vec::new(),
            zchi2: Vec::new(),
            penalty: Vec::new(),
            zcoeff: DMatrix::zeros(0, 0),
            best: None,
        }
    }
}

impl TemplateScan {
    pub fn is_empty(&self) -> bool {
        self.redshifts.is_empty()
    }
}

/// Scan records for every (target, template) pair of a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanResults {
    targets: BTreeMap<i64, BTreeMap<TemplateKey, TemplateScan>>,
}

impl ScanResults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Results with an empty slot for every (target, template) pair.
    pub fn with_slots<'a>(
        target_ids: impl IntoIterator<Item = i64>,
        keys: impl IntoIterator<Item = &'a TemplateKey> + Clone,
    ) -> Self {
        let mut results = Self::new();
        for id in target_ids {
            let slots = results.targets.entry(id).or_default();
            for key in keys.clone() {
                slots.entry(key.clone()).or_default();
            }
        }
        results
    }

    pub fn insert(&mut self, targetid: i64, key: TemplateKey, scan: TemplateScan) {
        self.targets.entry(targetid).or_default().insert(key, scan);
    }

    pub fn get(&self, targetid: i64, key: &TemplateKey) -> Option<&TemplateScan> {
        self.targets.get(&targetid).and_then(|t| t.get(key))
    }

    /// Scans recorded for one target, ordered by template key.
    pub fn target(&self, targetid: i64) -> Option<&BTreeMap<TemplateKey, TemplateScan>> {
        self.targets.get(&targetid)
    }

    pub fn target_ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.targets.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (i64, &BTreeMap<TemplateKey, TemplateScan>)> {
        self.targets.iter().map(|(id, t)| (*id, t))
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}
