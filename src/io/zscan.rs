//! Persist and reload the nested scan results of a run.
//!
//! Layout inside the store:
//!
//! - `zbest/{TARGETID,Z,ZERR,ZWARN}` summary columns, one row per target
//! - `targets/{targetid}/{fulltype}/{field}` for each (target, template):
//!   `z`, `zchi2`, `penalty`, `zcoeff` (`[nz, nbasis]`), and when a refined
//!   minimum exists `zbest`, `minchi2`, `zerr`, `zwarn`

use std::path::Path;

use tracing::{debug, info};

use crate::domain::{BestMinimum, ScanResults, TemplateKey, TemplateScan, ZBestRow};
use crate::error::ZfindError;
use crate::fit::BestRedshift;
use crate::io::store::{Dataset, Node, Store};

pub const SUMMARY_GROUP: &str = "zbest";
pub const TARGETS_GROUP: &str = "targets";

/// Write `results` and their per-target summary to `path`.
///
/// With `overwrite`, an existing file is deleted first. Otherwise an existing
/// file is updated in place: every (target, template) record written here
/// replaces the stored one as a whole, other records and groups are kept, and
/// the summary is rebuilt from all targets present after the merge.
pub fn write_zscan(
    path: &Path,
    results: &ScanResults,
    overwrite: bool,
    extractor: &dyn BestRedshift,
) -> Result<(), ZfindError> {
    if overwrite && path.exists() {
        std::fs::remove_file(path).map_err(|e| ZfindError::io(path, e))?;
    }
    let mut store = Store::open_or_create(path)?;

    for (targetid, scans) in results.iter() {
        for (key, scan) in scans {
            let fulltype = key.fulltype();
            if fulltype.contains('/') {
                return Err(ZfindError::storage(
                    path.display().to_string(),
                    format!("template type '{fulltype}' cannot be used as a group name"),
                ));
            }
            let base = format!("{TARGETS_GROUP}/{targetid}/{fulltype}");
            store.remove(&base);
            store.put(&format!("{base}/z"), Dataset::f64_array(scan.redshifts.clone()))?;
            store.put(&format!("{base}/zchi2"), Dataset::f64_array(scan.zchi2.clone()))?;
            store.put(&format!("{base}/penalty"), Dataset::f64_array(scan.penalty.clone()))?;
            store.put(&format!("{base}/zcoeff"), Dataset::f64_matrix(&scan.zcoeff))?;
            if let Some(best) = scan.best {
                store.put(&format!("{base}/zbest"), Dataset::f64_scalar(best.z))?;
                store.put(&format!("{base}/minchi2"), Dataset::f64_scalar(best.chi2))?;
                store.put(&format!("{base}/zerr"), Dataset::f64_scalar(best.zerr))?;
                store.put(&format!("{base}/zwarn"), Dataset::i64_scalar(i64::from(best.zwarn)))?;
            }
        }
    }

    let merged = read_scans(&store)?;
    let summary = extractor.zbest(&merged);
    store.put(
        &format!("{SUMMARY_GROUP}/TARGETID"),
        Dataset::i64_array(summary.iter().map(|r| r.targetid).collect()),
    )?;
    store.put(
        &format!("{SUMMARY_GROUP}/Z"),
        Dataset::f64_array(summary.iter().map(|r| r.z).collect()),
    )?;
    store.put(
        &format!("{SUMMARY_GROUP}/ZERR"),
        Dataset::f64_array(summary.iter().map(|r| r.zerr).collect()),
    )?;
    store.put(
        &format!("{SUMMARY_GROUP}/ZWARN"),
        Dataset::i64_array(summary.iter().map(|r| i64::from(r.zwarn)).collect()),
    )?;

    store.save(path)?;
    info!(
        path = %path.display(),
        ntargets = results.len(),
        nstored = merged.len(),
        "wrote zscan results"
    );
    Ok(())
}

/// Read back the summary table and nested results written by [`write_zscan`].
pub fn read_zscan(path: &Path) -> Result<(Vec<ZBestRow>, ScanResults), ZfindError> {
    let store = Store::open(path)?;
    let summary = read_summary(&store)?;
    let results = read_scans(&store)?;
    debug!(path = %path.display(), ntargets = results.len(), "read zscan results");
    Ok((summary, results))
}

fn read_scans(store: &Store) -> Result<ScanResults, ZfindError> {
    let mut results = ScanResults::new();
    if !store.contains(TARGETS_GROUP) {
        return Ok(results);
    }
    for (tid, node) in store.group(TARGETS_GROUP)? {
        let targetid: i64 = tid.parse().map_err(|_| {
            ZfindError::storage(format!("{TARGETS_GROUP}/{tid}"), "target group name is not an integer id")
        })?;
        let Node::Group(templates) = node else {
            return Err(ZfindError::storage(format!("{TARGETS_GROUP}/{tid}"), "expected a group"));
        };
        for fulltype in templates.keys() {
            let base = format!("{TARGETS_GROUP}/{tid}/{fulltype}");
            let key: TemplateKey = fulltype
                .parse()
                .map_err(|e| ZfindError::storage(base.clone(), format!("bad template type: {e}")))?;
            let scan = read_template_scan(store, &base)?;
            results.insert(targetid, key, scan);
        }
    }
    Ok(results)
}

fn read_summary(store: &Store) -> Result<Vec<ZBestRow>, ZfindError> {
    let ids = i64_column(store, &format!("{SUMMARY_GROUP}/TARGETID"))?;
    let z = f64_column(store, &format!("{SUMMARY_GROUP}/Z"))?;
    let zerr = f64_column(store, &format!("{SUMMARY_GROUP}/ZERR"))?;
    let zwarn = i64_column(store, &format!("{SUMMARY_GROUP}/ZWARN"))?;
    if z.len() != ids.len() || zerr.len() != ids.len() || zwarn.len() != ids.len() {
        return Err(ZfindError::storage(SUMMARY_GROUP, "summary columns differ in length"));
    }

    let mut rows = Vec::with_capacity(ids.len());
    for i in 0..ids.len() {
        rows.push(ZBestRow {
            targetid: ids[i],
            z: z[i],
            zerr: zerr[i],
            zwarn: to_mask(zwarn[i], SUMMARY_GROUP)?,
        });
    }
    Ok(rows)
}

fn read_template_scan(store: &Store, base: &str) -> Result<TemplateScan, ZfindError> {
    let zcoeff_path = format!("{base}/zcoeff");
    let zcoeff = store
        .dataset(&zcoeff_path)?
        .to_matrix()
        .ok_or_else(|| ZfindError::storage(zcoeff_path.clone(), "expected a 2-D f64 dataset"))?;

    let best = if store.contains(&format!("{base}/zbest")) {
        let zwarn_path = format!("{base}/zwarn");
        Some(BestMinimum {
            z: f64_scalar(store, &format!("{base}/zbest"))?,
            zerr: f64_scalar(store, &format!("{base}/zerr"))?,
            chi2: f64_scalar(store, &format!("{base}/minchi2"))?,
            zwarn: to_mask(i64_scalar(store, &zwarn_path)?, &zwarn_path)?,
        })
    } else {
        None
    };

    Ok(TemplateScan {
        redshifts: f64_column(store, &format!("{base}/z"))?.to_vec(),
        zchi2: f64_column(store, &format!("{base}/zchi2"))?.to_vec(),
        penalty: f64_column(store, &format!("{base}/penalty"))?.to_vec(),
        zcoeff,
        best,
    })
}

fn f64_column<'a>(store: &'a Store, path: &str) -> Result<&'a [f64], ZfindError> {
    store
        .dataset(path)?
        .as_f64()
        .ok_or_else(|| ZfindError::storage(path, "expected an f64 dataset"))
}

fn i64_column<'a>(store: &'a Store, path: &str) -> Result<&'a [i64], ZfindError> {
    store
        .dataset(path)?
        .as_i64()
        .ok_or_else(|| ZfindError::storage(path, "expected an i64 dataset"))
}

fn f64_scalar(store: &Store, path: &str) -> Result<f64, ZfindError> {
    match f64_column(store, path)? {
        [v] => Ok(*v),
        _ => Err(ZfindError::storage(path, "expected a scalar")),
    }
}

fn i64_scalar(store: &Store, path: &str) -> Result<i64, ZfindError> {
    match i64_column(store, path)? {
        [v] => Ok(*v),
        _ => Err(ZfindError::storage(path, "expected a scalar")),
    }
}

fn to_mask(v: i64, path: &str) -> Result<u32, ZfindError> {
    u32::try_from(v).map_err(|_| ZfindError::storage(path, format!("zwarn value {v} out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{SpecType, zwarn};
    use crate::fit::MinChi2Extractor;
    use nalgebra::DMatrix;

    fn scan(z0: f64, nbasis: usize, best: Option<BestMinimum>) -> TemplateScan {
        let redshifts: Vec<f64> = (0..5).map(|i| z0 + 0.1 * i as f64).collect();
        TemplateScan {
            zchi2: redshifts.iter().map(|z| (z - z0 - 0.2).powi(2) * 1e3 + 0.1).collect(),
            penalty: vec![0.0, 0.5, 0.0, 0.25, 1.0 / 3.0],
            zcoeff: DMatrix::from_fn(5, nbasis, |i, j| (i * 10 + j) as f64 / 7.0),
            redshifts,
            best,
        }
    }

    fn sample_results() -> ScanResults {
        let galaxy = TemplateKey::new(SpecType::Galaxy, "");
        let star = TemplateKey::new(SpecType::Star, "K");
        let best = |z, chi2| {
            Some(BestMinimum {
                z,
                zerr: 1e-4,
                chi2,
                zwarn: zwarn::SMALL_DELTA_CHI2,
            })
        };

        let mut results = ScanResults::with_slots([-3, 12], [&galaxy, &star]);
        results.insert(-3, galaxy.clone(), scan(0.1, 4, best(0.31, 12.5)));
        results.insert(-3, star.clone(), scan(-0.001, 6, best(0.0001, 40.0)));
        results.insert(12, galaxy, scan(0.7, 4, None));
        results
    }

    #[test]
    fn round_trip_is_exact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zscan.rrz");
        let results = sample_results();

        write_zscan(&path, &results, false, &MinChi2Extractor).unwrap();
        let (summary, back) = read_zscan(&path).unwrap();

        assert_eq!(back, results);
        assert_eq!(back.target_ids().collect::<Vec<_>>(), vec![-3, 12]);
        assert_eq!(summary.len(), 2);

        assert_eq!(summary[0].targetid, -3);
        assert_eq!(summary[0].z, 0.31);
        // Target 12 has no refined minimum in any template.
        assert_eq!(summary[1].targetid, 12);
        assert!(summary[1].z.is_nan());
        assert_eq!(summary[1].zwarn, zwarn::NODATA);
    }

    #[test]
    fn update_in_place_keeps_unrelated_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zscan.rrz");

        let mut store = Store::new();
        store.put("notes/run", Dataset::i64_scalar(1)).unwrap();
        store.put("targets/99/QSO/zchi2", Dataset::f64_array(vec![1.0])).unwrap();
        store.save(&path).unwrap();

        let mut results = ScanResults::new();
        results.insert(99, TemplateKey::new(SpecType::Qso, ""), scan(1.0, 3, None));
        write_zscan(&path, &results, false, &MinChi2Extractor).unwrap();

        let store = Store::open(&path).unwrap();
        assert!(store.contains("notes/run"));
        assert_eq!(store.dataset("targets/99/QSO/zchi2").unwrap().shape(), &[5]);

        // Overwriting starts from an empty file.
        write_zscan(&path, &results, true, &MinChi2Extractor).unwrap();
        let store = Store::open(&path).unwrap();
        assert!(!store.contains("notes/run"));
    }

    fn summary_ids(summary: &[ZBestRow]) -> Vec<i64> {
        summary.iter().map(|r| r.targetid).collect()
    }

    #[test]
    fn update_in_place_replaces_records_and_rebuilds_summary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zscan.rrz");
        let galaxy = TemplateKey::new(SpecType::Galaxy, "");
        let best = BestMinimum {
            z: 0.1,
            zerr: 1e-4,
            chi2: 3.0,
            zwarn: 0,
        };

        let mut first = ScanResults::new();
        first.insert(1, galaxy.clone(), scan(0.0, 2, Some(best)));
        write_zscan(&path, &first, false, &MinChi2Extractor).unwrap();

        // Target 1 lost its minimum; target 2 is new.
        let mut second = ScanResults::new();
        second.insert(1, galaxy.clone(), scan(0.0, 2, None));
        second.insert(2, galaxy.clone(), scan(0.5, 2, Some(BestMinimum { z: 0.7, ..best })));
        write_zscan(&path, &second, false, &MinChi2Extractor).unwrap();

        let (summary, back) = read_zscan(&path).unwrap();
        assert_eq!(back, second);
        assert!(back.get(1, &galaxy).unwrap().best.is_none());
        assert_eq!(summary_ids(&summary), vec![1, 2]);
        assert_eq!(summary[0].zwarn, zwarn::NODATA);
        assert_eq!(summary[1].z, 0.7);

        // Targets from earlier writes stay and keep their summary rows.
        let mut third = ScanResults::new();
        third.insert(3, galaxy, scan(0.2, 2, None));
        write_zscan(&path, &third, false, &MinChi2Extractor).unwrap();
        let (summary, back) = read_zscan(&path).unwrap();
        assert_eq!(back.target_ids().collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(summary_ids(&summary), vec![1, 2, 3]);
        assert_eq!(summary[1].z, 0.7);
    }

    #[test]
    fn unwritable_destination_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no/such/dir/zscan.rrz");
        let err = write_zscan(&path, &sample_results(), false, &MinChi2Extractor).unwrap_err();
        assert!(matches!(err, ZfindError::Io { .. }));
    }

    #[test]
    fn missing_summary_is_a_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.rrz");
        let mut store = Store::new();
        store.put("targets/1/GALAXY/z", Dataset::f64_array(vec![0.1])).unwrap();
        store.save(&path).unwrap();
        assert!(matches!(read_zscan(&path), Err(ZfindError::Storage { .. })));
    }
}
