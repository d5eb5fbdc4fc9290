//! Pipeline entry point: scan, refine and rank candidates for all targets.

use std::collections::HashSet;
use std::time::Instant;

use tracing::info;

use crate::domain::{CandidateTable, ScanResults, Target, ZfindConfig};
use crate::error::ZfindError;
use crate::fit::aggregate::rank_candidates;
use crate::fit::dispatch::scan_and_fit;
use crate::fit::engine::{MinimaRefiner, ZScanEngine};
use crate::fit::pool::WorkerPool;
use crate::templates::Template;

/// Result of a `zfind` run.
#[derive(Debug, Clone)]
pub struct ZfindOutput {
    /// Full scans per (target, template).
    pub scans: ScanResults,
    /// Ranked candidates, one table per target in input order.
    pub candidates: Vec<CandidateTable>,
}

/// Redshift every target against every template.
///
/// Templates run one after another; within a template the targets are
/// sharded over `config.ncpu` workers. Any failure aborts the whole run.
pub fn zfind<E, R>(
    targets: &[Target],
    templates: &[Template],
    config: &ZfindConfig,
    engine: &E,
    refiner: &R,
) -> Result<ZfindOutput, ZfindError>
where
    E: ZScanEngine + ?Sized,
    R: MinimaRefiner + ?Sized,
{
    config.validate()?;
    if templates.is_empty() {
        return Err(ZfindError::NotFound("no templates to fit".to_string()));
    }
    let mut seen = HashSet::with_capacity(targets.len());
    for target in targets {
        if !seen.insert(target.id) {
            return Err(ZfindError::InvalidArgument(format!(
                "duplicate target id {}",
                target.id
            )));
        }
    }

    let t0 = Instant::now();
    let pool = WorkerPool::new(config.resolved_ncpu())?;
    info!(
        ntargets = targets.len(),
        ntemplates = templates.len(),
        nminima = config.nminima,
        "starting zfind"
    );

    let dispatched = scan_and_fit(targets, templates, &pool, config.nminima, engine, refiner)?;

    let candidates = targets
        .iter()
        .map(|t| {
            let tables = dispatched.fits.get(&t.id).map(Vec::as_slice).unwrap_or(&[]);
            rank_candidates(t.id, tables, config.nminima)
        })
        .collect();

    info!(elapsed_s = t0.elapsed().as_secs_f64(), "zfind done");
    Ok(ZfindOutput {
        scans: dispatched.scans,
        candidates,
    })
}
