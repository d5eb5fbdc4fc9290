//! Reference local-minimum refinement.
//!
//! For every target:
//! - locate local minima of the coarse chi2(z) curve (grid edges count)
//! - keep the `nminima` deepest
//! - rescan a fine grid spanning each minimum's neighbours
//! - fit a parabola through the three fine points around the fine minimum;
//!   its vertex gives `z` and `chi2`, its curvature gives `zerr` (the offset
//!   at which chi2 rises by 1)
//! - evaluate the coefficients at the refined `z`

use crate::domain::{Target, ZFit, zwarn};
use crate::error::ZfindError;
use crate::fit::chi2::LinearChi2Scan;
use crate::fit::engine::{MinimaRefiner, ZScan, ZScanEngine};
use crate::templates::Template;

/// Parabolic refinement on a fine rescan performed with `engine`.
#[derive(Debug, Clone)]
pub struct ParabolicMinima<S = LinearChi2Scan> {
    pub engine: S,
    /// Number of points of the fine rescan around each coarse minimum.
    pub nfine: usize,
}

impl Default for ParabolicMinima<LinearChi2Scan> {
    fn default() -> Self {
        Self {
            engine: LinearChi2Scan,
            nfine: 15,
        }
    }
}

impl<S: ZScanEngine> ParabolicMinima<S> {
    fn refine_target(
        &self,
        zchi2: &[f64],
        redshifts: &[f64],
        target: &Target,
        template: &Template,
        nminima: usize,
    ) -> Result<Vec<ZFit>, ZfindError> {
        let nz = redshifts.len();
        if zchi2.len() != nz {
            return Err(ZfindError::InvalidArgument(format!(
                "target {}: chi2 curve has {} points for {nz} redshifts",
                target.id,
                zchi2.len()
            )));
        }

        let mut fits = Vec::new();
        for i in find_minima(zchi2).into_iter().take(nminima) {
            let mut warn = 0;
            if nz > 1 && (i == 0 || i == nz - 1) {
                warn |= zwarn::Z_FITLIMIT;
            }
            let lo = redshifts[i.saturating_sub(1)];
            let hi = redshifts[(i + 1).min(nz - 1)];

            let fine_z = linspace(lo, hi, if hi > lo { self.nfine.max(3) } else { 1 });
            let fine = self.scan_one(&fine_z, target, template)?;
            let fine_chi2 = fine.combined_chi2();
            let j = argmin(&fine_chi2).unwrap_or(0);

            let (z, chi2, zerr) = match fit_parabola(&fine_z, &fine_chi2, j) {
                Some(v) => v,
                None => {
                    warn |= zwarn::BAD_MINFIT;
                    (fine_z[j], fine_chi2[j], -1.0)
                }
            };

            let at = self.scan_one(&[z], target, template)?;
            if at.zcoeff.nrows() != 1 {
                return Err(ZfindError::Engine(format!(
                    "target {}: rescan at z={z} returned {} coefficient rows",
                    target.id,
                    at.zcoeff.nrows()
                )));
            }
            let coeff = at.zcoeff.row(0).iter().copied().collect();
            fits.push(ZFit {
                z,
                zerr,
                chi2,
                coeff,
                zwarn: warn,
            });
        }

        fits.sort_by(|a, b| a.chi2.total_cmp(&b.chi2));
        Ok(fits)
    }

    fn scan_one(
        &self,
        redshifts: &[f64],
        target: &Target,
        template: &Template,
    ) -> Result<ZScan, ZfindError> {
        self.engine
            .calc_zchi2(redshifts, std::slice::from_ref(target), template)?
            .into_iter()
            .next()
            .ok_or_else(|| ZfindError::Engine(format!("no rescan result for target {}", target.id)))
    }
}

impl<S: ZScanEngine> MinimaRefiner for ParabolicMinima<S> {
    fn fit_minima(
        &self,
        zchi2: &[Vec<f64>],
        redshifts: &[f64],
        targets: &[Target],
        template: &Template,
        nminima: usize,
    ) -> Result<Vec<Vec<ZFit>>, ZfindError> {
        targets
            .iter()
            .zip(zchi2)
            .map(|(target, curve)| self.refine_target(curve, redshifts, target, template, nminima))
            .collect()
    }
}

/// Indices of strict local minima (edges included), deepest first.
///
/// A curve without any strict minimum (e.g. constant) yields its first
/// global minimum so that every non-empty scan produces a candidate.
pub fn find_minima(x: &[f64]) -> Vec<usize> {
    let n = x.len();
    let mut idx: Vec<usize> = (0..n)
        .filter(|&i| {
            let left = i == 0 || x[i] < x[i - 1];
            let right = i == n - 1 || x[i] < x[i + 1];
            left && right
        })
        .collect();
    if idx.is_empty() {
        idx.extend(argmin(x));
    }
    idx.sort_by(|&a, &b| x[a].total_cmp(&x[b]));
    idx
}

fn argmin(x: &[f64]) -> Option<usize> {
    x.iter()
        .enumerate()
        .filter(|(_, v)| !v.is_nan())
        .min_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
}

fn linspace(lo: f64, hi: f64, n: usize) -> Vec<f64> {
    if n <= 1 {
        return vec![lo];
    }
    (0..n)
        .map(|i| lo + (hi - lo) * i as f64 / (n - 1) as f64)
        .collect()
}

/// Vertex `(z, chi2, zerr)` of the parabola through the three points around
/// index `j`, or `None` if it opens downward or the vertex leaves the bracket.
fn fit_parabola(z: &[f64], chi2: &[f64], j: usize) -> Option<(f64, f64, f64)> {
    if z.len() < 3 {
        return None;
    }
    let j = j.clamp(1, z.len() - 2);
    let (x0, x1, x2) = (z[j - 1], z[j], z[j + 1]);
    let (y0, y1, y2) = (chi2[j - 1], chi2[j], chi2[j + 1]);

    // y = a t^2 + b t + y1 with t = x - x1.
    let (t0, t2) = (x0 - x1, x2 - x1);
    let d0 = (y0 - y1) / t0;
    let d2 = (y2 - y1) / t2;
    let a = (d2 - d0) / (t2 - t0);
    let b = d0 - a * t0;
    if !(a > 0.0 && a.is_finite()) {
        return None;
    }

    let t = -b / (2.0 * a);
    let zmin = x1 + t;
    if !(zmin >= x0 && zmin <= x2) {
        return None;
    }
    Some((zmin, y1 - b * b / (4.0 * a), 1.0 / a.sqrt()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fit::fixtures::{line_template, observe};

    #[test]
    fn find_minima_orders_by_depth_and_includes_edges() {
        let x = [1.0, 3.0, 0.5, 2.0, 2.5, 0.8];
        assert_eq!(find_minima(&x), vec![2, 5, 0]);
        assert_eq!(find_minima(&[4.0, 4.0, 4.0]), vec![0]);
        assert!(find_minima(&[]).is_empty());
    }

    #[test]
    fn parabola_recovers_vertex_and_curvature() {
        // chi2 = 4 (z - 0.31)^2 + 7
        let z = [0.2, 0.3, 0.4];
        let chi2: Vec<f64> = z.iter().map(|v| 4.0 * (v - 0.31f64).powi(2) + 7.0).collect();
        let (zmin, cmin, zerr) = fit_parabola(&z, &chi2, 1).unwrap();
        assert!((zmin - 0.31).abs() < 1e-12);
        assert!((cmin - 7.0).abs() < 1e-12);
        assert!((zerr - 0.5).abs() < 1e-12);

        let concave: Vec<f64> = chi2.iter().map(|c| -c).collect();
        assert!(fit_parabola(&z, &concave, 1).is_none());
    }

    #[test]
    fn refines_off_grid_redshift() {
        let grid: Vec<f64> = (0..21).map(|i| 0.3 + 0.02 * i as f64).collect();
        let template = line_template(grid.clone());
        let target = observe(&template, 9, 0.507, &[1.0, 5.0]);

        let scan = LinearChi2Scan
            .calc_zchi2(&grid, std::slice::from_ref(&target), &template)
            .unwrap()
            .remove(0);
        let refiner = ParabolicMinima {
            engine: LinearChi2Scan,
            nfine: 41,
        };
        let fits = refiner
            .fit_minima(&[scan.zchi2], &grid, std::slice::from_ref(&target), &template, 3)
            .unwrap();

        assert_eq!(fits.len(), 1);
        let best = &fits[0][0];
        assert!((best.z - 0.507).abs() < 1e-3, "z={}", best.z);
        assert!(best.zerr > 0.0);
        assert_eq!(best.coeff.len(), 2);
        assert!(fits[0].windows(2).all(|w| w[0].chi2 <= w[1].chi2));
        assert!(fits[0].len() <= 3);
    }
}
