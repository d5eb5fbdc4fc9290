//! Evaluation engines used by the dispatcher.
//!
//! The dispatcher only orchestrates; the numerical work is delegated to two
//! engines so that alternative implementations (or test doubles) can be
//! plugged in:
//!
//! - a [`ZScanEngine`] computes chi2 on the full redshift grid
//! - a [`MinimaRefiner`] turns a chi2(z) curve into a few precise minima

use nalgebra::DMatrix;

use crate::domain::{Target, ZFit};
use crate::error::ZfindError;
use crate::templates::Template;

/// chi2(z) scan of one template against one target.
#[derive(Debug, Clone, PartialEq)]
pub struct ZScan {
    pub zchi2: Vec<f64>,
    /// `[nz, nbasis]`
    pub zcoeff: DMatrix<f64>,
    /// Non-negative additive term, aligned with `zchi2`.
    pub penalty: Vec<f64>,
}

impl ZScan {
    /// `zchi2 + penalty`, elementwise.
    pub fn combined_chi2(&self) -> Vec<f64> {
        self.zchi2
            .iter()
            .zip(&self.penalty)
            .map(|(c, p)| c + p)
            .collect()
    }
}

/// Computes chi2 over a redshift grid.
///
/// Implementations must return exactly one scan per input target, in input
/// order. They are shared across worker threads.
pub trait ZScanEngine: Sync {
    fn calc_zchi2(
        &self,
        redshifts: &[f64],
        targets: &[Target],
        template: &Template,
    ) -> Result<Vec<ZScan>, ZfindError>;
}

/// Refines local minima of chi2(z).
///
/// `zchi2[i]` is the (penalised) chi2 curve of `targets[i]`. Implementations
/// return one table of at most `nminima` minima per target, in input order.
pub trait MinimaRefiner: Sync {
    fn fit_minima(
        &self,
        zchi2: &[Vec<f64>],
        redshifts: &[f64],
        targets: &[Target],
        template: &Template,
        nminima: usize,
    ) -> Result<Vec<Vec<ZFit>>, ZfindError>;
}
