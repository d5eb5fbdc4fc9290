//! Reference chi2(z) scan.
//!
//! Given:
//! - a target's observed spectra (wavelength, flux, inverse variance)
//! - a template's rest-frame basis vectors
//! - a grid of trial redshifts
//!
//! we solve, for each trial `z`:
//! - an inverse-variance weighted least squares problem for the basis
//!   coefficients, with every basis vector resampled onto `wave_obs / (1+z)`
//! - the resulting chi2
//!
//! Spectra of one target are stacked into a single linear system, so one set
//! of coefficients describes all of them.

use nalgebra::DMatrix;

use crate::domain::Target;
use crate::error::ZfindError;
use crate::fit::engine::{ZScan, ZScanEngine};
use crate::math::{interp_linear, weighted_fit};
use crate::templates::Template;

/// chi2 reported when the linear system at some `z` cannot be solved.
pub const BAD_CHI2: f64 = 9e99;

/// Linear-interpolation chi2 scan with no penalty term.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearChi2Scan;

impl ZScanEngine for LinearChi2Scan {
    fn calc_zchi2(
        &self,
        redshifts: &[f64],
        targets: &[Target],
        template: &Template,
    ) -> Result<Vec<ZScan>, ZfindError> {
        let basis = basis_rows(template);
        let nbasis = template.nbasis();
        let nz = redshifts.len();

        let mut out = Vec::with_capacity(targets.len());
        for target in targets {
            target.validate()?;
            let mut zchi2 = Vec::with_capacity(nz);
            let mut zcoeff = DMatrix::<f64>::zeros(nz, nbasis);
            for (i, &z) in redshifts.iter().enumerate() {
                let (coeff, chi2) = fit_with_basis(z, target, template.wave(), &basis);
                for (k, c) in coeff.iter().enumerate() {
                    zcoeff[(i, k)] = *c;
                }
                zchi2.push(chi2);
            }
            out.push(ZScan {
                zchi2,
                zcoeff,
                penalty: vec![0.0; nz],
            });
        }
        Ok(out)
    }
}

fn basis_rows(template: &Template) -> Vec<Vec<f64>> {
    (0..template.nbasis())
        .map(|k| template.basis_vector(k))
        .collect()
}

fn fit_with_basis(z: f64, target: &Target, rest_wave: &[f64], basis: &[Vec<f64>]) -> (Vec<f64>, f64) {
    let nbasis = basis.len();
    let npix: usize = target.spectra.iter().map(|s| s.len()).sum();
    if npix == 0 || !(1.0 + z > 0.0) {
        return (vec![0.0; nbasis], BAD_CHI2);
    }

    let mut design = DMatrix::<f64>::zeros(npix, nbasis);
    let mut flux = Vec::with_capacity(npix);
    let mut ivar = Vec::with_capacity(npix);

    let mut row0 = 0;
    for spectrum in &target.spectra {
        let rest: Vec<f64> = spectrum.wave.iter().map(|w| w / (1.0 + z)).collect();
        for (k, vector) in basis.iter().enumerate() {
            let resampled = interp_linear(&rest, rest_wave, vector);
            for (i, v) in resampled.into_iter().enumerate() {
                design[(row0 + i, k)] = v;
            }
        }
        flux.extend_from_slice(&spectrum.flux);
        ivar.extend_from_slice(&spectrum.ivar);
        row0 += spectrum.len();
    }

    match weighted_fit(&design, &flux, &ivar) {
        Some(fit) => fit,
        None => (vec![0.0; nbasis], BAD_CHI2),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fit::fixtures::{line_template, observe};

    #[test]
    fn scan_is_minimal_at_true_redshift() {
        let grid: Vec<f64> = (0..41).map(|i| 0.3 + 0.01 * i as f64).collect();
        let template = line_template(grid.clone());
        let target = observe(&template, 1, 0.5, &[1.0, 5.0]);

        let scans = LinearChi2Scan
            .calc_zchi2(&grid, std::slice::from_ref(&target), &template)
            .unwrap();
        assert_eq!(scans.len(), 1);
        let scan = &scans[0];
        assert_eq!(scan.zchi2.len(), grid.len());
        assert_eq!(scan.zcoeff.shape(), (grid.len(), 2));
        assert!(scan.penalty.iter().all(|p| *p == 0.0));

        let (imin, _) = scan
            .zchi2
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.total_cmp(b.1))
            .unwrap();
        assert!((grid[imin] - 0.5).abs() < 1e-9);
        assert!(scan.zchi2[imin] < 1e-12);
        assert!((scan.zcoeff[(imin, 1)] - 5.0).abs() < 1e-6);
    }

    #[test]
    fn target_without_pixels_gets_bad_chi2() {
        let template = line_template(vec![0.1, 0.2]);
        let target = Target::new(3, Vec::new());
        let (coeff, chi2) = fit_with_basis(0.1, &target, template.wave(), &basis_rows(&template));
        assert_eq!(coeff, vec![0.0, 0.0]);
        assert_eq!(chi2, BAD_CHI2);
    }
}
