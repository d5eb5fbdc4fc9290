//! Export ranked candidates to CSV.
//!
//! One row per candidate, meant to be easy to consume in spreadsheets or
//! downstream scripts. Coefficients are packed into a single `;`-separated
//! column because their count depends on the templates used.

use std::path::Path;

use serde::Serialize;

use crate::domain::CandidateTable;
use crate::error::ZfindError;

#[derive(Debug, Serialize)]
struct CandidateRecord<'a> {
    targetid: i64,
    znum: usize,
    spectype: &'a str,
    subtype: &'a str,
    z: f64,
    zerr: f64,
    chi2: f64,
    deltachi2: f64,
    zwarn: u32,
    coeff: String,
}

/// Write every candidate of every table to `path`.
pub fn write_candidates_csv(path: &Path, tables: &[CandidateTable]) -> Result<(), ZfindError> {
    let fail = |e: csv::Error| ZfindError::storage(path.display().to_string(), format!("failed to write candidates CSV: {e}"));
    let mut writer = csv::Writer::from_path(path).map_err(fail)?;

    for table in tables {
        for row in &table.rows {
            let coeff = row
                .coeff
                .iter()
                .map(|c| format!("{c:.10e}"))
                .collect::<Vec<_>>()
                .join(";");
            writer
                .serialize(CandidateRecord {
                    targetid: row.targetid,
                    znum: row.znum,
                    spectype: row.spectype.as_str(),
                    subtype: &row.subtype,
                    z: row.z,
                    zerr: row.zerr,
                    chi2: row.chi2,
                    deltachi2: row.deltachi2,
                    zwarn: row.zwarn,
                    coeff,
                })
                .map_err(fail)?;
        }
    }

    writer
        .flush()
        .map_err(|e| ZfindError::io(path, e))?;
    Ok(())
}
