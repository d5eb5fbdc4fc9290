//! Inverse-variance weighted least squares.
//!
//! For each trial redshift we solve a small linear problem of the form:
//!
//! ```text
//! minimize Σ ivar_i (flux_i - Σ_k T_ik c_k)^2
//! ```
//!
//! where the columns of `T` are the template basis vectors resampled onto the
//! observed pixels. Rows are scaled by `sqrt(ivar_i)` and the resulting
//! ordinary least squares problem is solved with SVD, which tolerates the
//! tall, occasionally rank-deficient systems produced when a redshifted
//! template only partially covers the observed range.

use nalgebra::{DMatrix, DVector};

/// Solve `x β ≈ y` in the least squares sense using SVD.
///
/// Returns `None` if no tolerance yields a finite solution.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Weighted fit of `basis` (pixels × nbasis) to `flux` with weights `ivar`.
///
/// Returns the coefficients and the chi2 of the fit, or `None` when the
/// system cannot be solved.
pub fn weighted_fit(basis: &DMatrix<f64>, flux: &[f64], ivar: &[f64]) -> Option<(Vec<f64>, f64)> {
    let npix = flux.len();
    if basis.nrows() != npix || ivar.len() != npix || basis.ncols() == 0 {
        return None;
    }

    let mut xw = basis.clone();
    let mut yw = DVector::<f64>::zeros(npix);
    for i in 0..npix {
        let sw = ivar[i].sqrt();
        for j in 0..basis.ncols() {
            xw[(i, j)] *= sw;
        }
        yw[i] = flux[i] * sw;
    }

    let coeff = solve_least_squares(&xw, &yw)?;
    let model = basis * &coeff;
    let chi2: f64 = (0..npix)
        .map(|i| {
            let r = flux[i] - model[i];
            ivar[i] * r * r
        })
        .sum();

    if chi2.is_finite() {
        Some((coeff.iter().copied().collect(), chi2))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn least_squares_solves_simple_system() {
        // y = 2 + 3x on x = [0,1,2]
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-10);
        assert!((beta[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn weighted_fit_ignores_zero_weight_pixels() {
        // Pixel 2 is corrupted but carries no weight.
        let basis = DMatrix::from_row_slice(4, 1, &[1.0, 2.0, 3.0, 4.0]);
        let flux = [0.5, 1.0, 100.0, 2.0];
        let ivar = [1.0, 1.0, 0.0, 1.0];

        let (coeff, chi2) = weighted_fit(&basis, &flux, &ivar).unwrap();
        assert!((coeff[0] - 0.5).abs() < 1e-10);
        assert!(chi2.abs() < 1e-18);
    }
}
