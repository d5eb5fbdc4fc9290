//! Scan & fit dispatch: templates in sequence, targets in parallel.
//!
//! For each template:
//! 1. scan chi2(z) for all targets on the template's redshift grid
//! 2. refine minima of `zchi2 + penalty` for all targets
//! 3. record the scan and the refined minima per (target, template)
//!
//! Both stages fan out over the worker pool. A failing shard aborts the run;
//! the failure is logged here and handed back as `WorkerFailure`.

use std::collections::BTreeMap;
use std::ops::Range;
use std::time::Instant;

use tracing::{debug, error, info};

use crate::domain::{BestMinimum, ScanResults, Target, TemplateKey, TemplateScan, ZFit};
use crate::error::{Stage, ZfindError};
use crate::fit::engine::{MinimaRefiner, ZScan, ZScanEngine};
use crate::fit::pool::WorkerPool;
use crate::templates::Template;

/// Refined minima of one template for one target.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateFits {
    pub key: TemplateKey,
    pub fits: Vec<ZFit>,
}

/// Everything the dispatcher produced for a run.
#[derive(Debug, Clone, Default)]
pub struct Dispatched {
    pub scans: ScanResults,
    /// Per target, one entry per template in template order.
    pub fits: BTreeMap<i64, Vec<TemplateFits>>,
}

/// Scan and refine every template against every target.
pub fn scan_and_fit<E, R>(
    targets: &[Target],
    templates: &[Template],
    pool: &WorkerPool,
    nminima: usize,
    engine: &E,
    refiner: &R,
) -> Result<Dispatched, ZfindError>
where
    E: ZScanEngine + ?Sized,
    R: MinimaRefiner + ?Sized,
{
    if pool.is_parallel() {
        info!("using multiprocessing with {} cores", pool.ncpu());
    } else {
        info!("not using multiprocessing");
    }

    let mut out = Dispatched {
        scans: ScanResults::with_slots(targets.iter().map(|t| t.id), templates.iter().map(|t| t.key())),
        fits: targets.iter().map(|t| (t.id, Vec::new())).collect(),
    };

    for template in templates {
        let fulltype = template.fulltype();
        let redshifts = template.redshifts();
        let nz = redshifts.len();

        let t0 = Instant::now();
        let scans: Vec<ZScan> = pool
            .map_shards(targets.len(), |range| {
                let scans = engine.calc_zchi2(redshifts, &targets[range], template)?;
                for scan in &scans {
                    check_scan(scan, nz, template.nbasis())?;
                }
                Ok(scans)
            })
            .map_err(|(range, e)| worker_failure(Stage::Scan, &fulltype, range, e))?;
        debug!(
            template = %fulltype,
            ntargets = targets.len(),
            nz,
            elapsed_s = t0.elapsed().as_secs_f64(),
            "computed zchi2 scan"
        );

        let t0 = Instant::now();
        let combined: Vec<Vec<f64>> = scans.iter().map(ZScan::combined_chi2).collect();
        let fits: Vec<Vec<ZFit>> = pool
            .map_shards(targets.len(), |range| {
                refiner.fit_minima(
                    &combined[range.clone()],
                    redshifts,
                    &targets[range],
                    template,
                    nminima,
                )
            })
            .map_err(|(range, e)| worker_failure(Stage::Refine, &fulltype, range, e))?;
        debug!(
            template = %fulltype,
            elapsed_s = t0.elapsed().as_secs_f64(),
            "refined chi2 minima"
        );

        for ((target, scan), fits) in targets.iter().zip(scans).zip(fits) {
            let record = TemplateScan {
                redshifts: redshifts.to_vec(),
                zchi2: scan.zchi2,
                penalty: scan.penalty,
                zcoeff: scan.zcoeff,
                best: BestMinimum::from_fits(&fits),
            };
            out.scans.insert(target.id, template.key().clone(), record);
            out.fits.entry(target.id).or_default().push(TemplateFits {
                key: template.key().clone(),
                fits,
            });
        }
    }

    Ok(out)
}

fn check_scan(scan: &ZScan, nz: usize, nbasis: usize) -> Result<(), ZfindError> {
    if scan.zchi2.len() != nz || scan.penalty.len() != nz {
        return Err(ZfindError::Engine(format!(
            "scan arrays misaligned with {nz} redshifts: zchi2={}, penalty={}",
            scan.zchi2.len(),
            scan.penalty.len()
        )));
    }
    if scan.zcoeff.shape() != (nz, nbasis) {
        return Err(ZfindError::Engine(format!(
            "zcoeff has shape {:?}, expected ({nz}, {nbasis})",
            scan.zcoeff.shape()
        )));
    }
    Ok(())
}

fn worker_failure(stage: Stage, template: &str, targets: Range<usize>, source: ZfindError) -> ZfindError {
    error!(
        %stage,
        template,
        targets = ?targets,
        error = %source,
        "worker failed; aborting run"
    );
    ZfindError::WorkerFailure {
        stage,
        template: template.to_string(),
        targets,
        source: Box::new(source),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SpecType;
    use crate::fit::chi2::LinearChi2Scan;
    use crate::fit::fixtures::{line_template, observe, typed_line_template};
    use crate::fit::minima::ParabolicMinima;

    #[test]
    fn fills_every_pair_in_target_order() {
        let grid: Vec<f64> = (0..11).map(|i| 0.4 + 0.02 * i as f64).collect();
        let galaxy = line_template(grid.clone());
        let star = typed_line_template(SpecType::Star, "K", grid.clone());
        let targets: Vec<Target> = (0..5)
            .map(|i| observe(&galaxy, 100 + i, 0.5, &[1.0, 2.0 + i as f64]))
            .collect();

        let pool = WorkerPool::new(2).unwrap();
        let out = scan_and_fit(
            &targets,
            &[galaxy.clone(), star.clone()],
            &pool,
            2,
            &LinearChi2Scan,
            &ParabolicMinima::default(),
        )
        .unwrap();

        assert_eq!(out.scans.len(), 5);
        for target in &targets {
            let per_template = out.scans.target(target.id).unwrap();
            assert_eq!(per_template.len(), 2);
            let scan = out.scans.get(target.id, galaxy.key()).unwrap();
            assert_eq!(scan.redshifts, grid);
            assert_eq!(scan.zchi2.len(), grid.len());
            assert!(scan.best.is_some());

            let fits = &out.fits[&target.id];
            assert_eq!(fits[0].key, *galaxy.key());
            assert_eq!(fits[1].key, *star.key());
            assert!(fits.iter().all(|t| t.fits.len() <= 2));
        }
    }

    #[test]
    fn penalty_is_added_before_refinement() {
        struct Penalised;
        impl ZScanEngine for Penalised {
            fn calc_zchi2(&self, z: &[f64], targets: &[Target], t: &Template) -> Result<Vec<ZScan>, ZfindError> {
                Ok(targets
                    .iter()
                    .map(|_| ZScan {
                        zchi2: vec![1.0; z.len()],
                        zcoeff: nalgebra::DMatrix::zeros(z.len(), t.nbasis()),
                        penalty: (0..z.len()).map(|i| i as f64).collect(),
                    })
                    .collect())
            }
        }
        struct Echo;
        impl MinimaRefiner for Echo {
            fn fit_minima(
                &self,
                zchi2: &[Vec<f64>],
                z: &[f64],
                _: &[Target],
                _: &Template,
                _: usize,
            ) -> Result<Vec<Vec<ZFit>>, ZfindError> {
                Ok(zchi2
                    .iter()
                    .map(|c| {
                        vec![ZFit { z: z[1], zerr: 0.0, chi2: c[1], coeff: vec![], zwarn: 0 }]
                    })
                    .collect())
            }
        }

        let template = line_template(vec![0.1, 0.2, 0.3]);
        let target = observe(&template, 1, 0.2, &[1.0, 1.0]);
        let pool = WorkerPool::new(1).unwrap();
        let out = scan_and_fit(&[target], &[template.clone()], &pool, 1, &Penalised, &Echo).unwrap();
        assert_eq!(out.fits[&1][0].fits[0].chi2, 2.0);
        assert_eq!(out.scans.get(1, template.key()).unwrap().penalty, vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn misshapen_engine_output_is_a_worker_failure() {
        struct Short;
        impl ZScanEngine for Short {
            fn calc_zchi2(&self, _: &[f64], targets: &[Target], _: &Template) -> Result<Vec<ZScan>, ZfindError> {
                Ok(targets
                    .iter()
                    .map(|_| ZScan {
                        zchi2: vec![0.0],
                        zcoeff: nalgebra::DMatrix::zeros(1, 2),
                        penalty: vec![0.0],
                    })
                    .collect())
            }
        }

        let template = line_template(vec![0.1, 0.2, 0.3]);
        let target = observe(&template, 1, 0.2, &[1.0, 1.0]);
        let pool = WorkerPool::new(1).unwrap();
        let err = scan_and_fit(&[target], &[template], &pool, 1, &Short, &ParabolicMinima::default()).unwrap_err();
        assert!(matches!(err, ZfindError::WorkerFailure { stage: Stage::Scan, .. }));
    }
}
