//! Best-redshift extraction: one summary row per target.

use crate::domain::{ScanResults, ZBestRow, zwarn};

/// Reduces nested scan results to one summary row per scanned target.
pub trait BestRedshift {
    fn zbest(&self, results: &ScanResults) -> Vec<ZBestRow>;
}

/// Picks, per target, the template whose best refined minimum has the
/// smallest chi2. Ties go to the first template in key order.
///
/// Targets without any refined minimum get `Z = ZERR = NaN` and
/// `ZWARN = NODATA`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MinChi2Extractor;

impl BestRedshift for MinChi2Extractor {
    fn zbest(&self, results: &ScanResults) -> Vec<ZBestRow> {
        results
            .iter()
            .map(|(targetid, scans)| {
                let best = scans
                    .values()
                    .filter_map(|s| s.best)
                    .reduce(|acc, b| if b.chi2 < acc.chi2 { b } else { acc });
                match best {
                    Some(b) => ZBestRow {
                        targetid,
                        z: b.z,
                        zerr: b.zerr,
                        zwarn: b.zwarn,
                    },
                    None => ZBestRow {
                        targetid,
                        z: f64::NAN,
                        zerr: f64::NAN,
                        zwarn: zwarn::NODATA,
                    },
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BestMinimum, SpecType, TemplateKey, TemplateScan};

    fn scan_with_best(z: f64, chi2: f64) -> TemplateScan {
        TemplateScan {
            redshifts: vec![z],
            best: Some(BestMinimum {
                z,
                zerr: 0.01,
                chi2,
                zwarn: 0,
            }),
            ..TemplateScan::default()
        }
    }

    #[test]
    fn picks_lowest_minchi2_across_templates() {
        let mut results = ScanResults::new();
        let galaxy = TemplateKey::new(SpecType::Galaxy, "");
        let qso = TemplateKey::new(SpecType::Qso, "");
        let star = TemplateKey::new(SpecType::Star, "G");
        results.insert(3, galaxy.clone(), scan_with_best(0.7, 12.0));
        results.insert(3, qso.clone(), scan_with_best(2.1, 4.0));
        results.insert(3, star, scan_with_best(0.0, 4.0));
        results.insert(1, galaxy, scan_with_best(0.3, 1.0));

        let rows = MinChi2Extractor.zbest(&results);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].targetid, 1);
        assert_eq!(rows[0].z, 0.3);
        // QSO sorts before STAR, so it wins the tie.
        assert_eq!(rows[1].targetid, 3);
        assert_eq!(rows[1].z, 2.1);
    }

    #[test]
    fn target_without_minima_is_flagged_nodata() {
        let key = TemplateKey::new(SpecType::Galaxy, "");
        let results = ScanResults::with_slots([8], [&key]);
        let rows = MinChi2Extractor.zbest(&results);
        assert_eq!(rows.len(), 1);
        assert!(rows[0].z.is_nan());
        assert_eq!(rows[0].zwarn, zwarn::NODATA);
    }
}
