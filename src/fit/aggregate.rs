//! Candidate aggregation: per-template minima → one ranked table per target.
//!
//! Steps, per target:
//! 1. zero-pad coefficients to the widest basis among the target's templates
//! 2. concatenate all templates' minima and stable-sort by chi2
//! 3. assign `znum` and `deltachi2`, flag ambiguous rows (`deltachi2 < 9`)
//! 4. keep the first `nminima` rows of each spectral type, then restore chi2
//!    order

use crate::domain::{Candidate, CandidateTable, SpecType, zwarn};
use crate::fit::dispatch::TemplateFits;

/// Merge one target's per-template minima into a ranked candidate table.
pub fn rank_candidates(targetid: i64, tables: &[TemplateFits], nminima: usize) -> CandidateTable {
    let width = tables
        .iter()
        .flat_map(|t| t.fits.iter().map(|f| f.coeff.len()))
        .max()
        .unwrap_or(0);

    let mut rows: Vec<Candidate> = tables
        .iter()
        .flat_map(|table| {
            table.fits.iter().map(move |fit| {
                let mut coeff = fit.coeff.clone();
                coeff.resize(width, 0.0);
                Candidate {
                    targetid,
                    z: fit.z,
                    zerr: fit.zerr,
                    chi2: fit.chi2,
                    coeff,
                    zwarn: fit.zwarn,
                    spectype: table.key.spectype,
                    subtype: table.key.subtype.clone(),
                    znum: 0,
                    deltachi2: 0.0,
                }
            })
        })
        .collect();

    sort_by_chi2(&mut rows);
    for i in 0..rows.len() {
        let delta = match rows.get(i + 1) {
            Some(next) => next.chi2 - rows[i].chi2,
            None => 0.0,
        };
        rows[i].znum = i;
        rows[i].deltachi2 = delta;
        if delta < zwarn::DELTACHI2_THRESHOLD {
            rows[i].zwarn |= zwarn::SMALL_DELTA_CHI2;
        }
    }

    let rows = trim_per_spectype(rows, nminima);
    CandidateTable { targetid, rows }
}

/// Keep the first `nminima` rows of every spectral type; `rows` must already
/// be sorted by chi2.
fn trim_per_spectype(rows: Vec<Candidate>, nminima: usize) -> Vec<Candidate> {
    let total = rows.len();
    let mut kept: Vec<Candidate> = Vec::with_capacity(total);
    for spectype in SpecType::ALL {
        kept.extend(
            rows.iter()
                .filter(|r| r.spectype == spectype)
                .take(nminima)
                .cloned(),
        );
    }
    if kept.len() == total {
        return rows;
    }
    sort_by_chi2(&mut kept);
    kept
}

/// Ascending, stable.
fn sort_by_chi2(rows: &mut [Candidate]) {
    rows.sort_by(|a, b| a.chi2.total_cmp(&b.chi2));
}
