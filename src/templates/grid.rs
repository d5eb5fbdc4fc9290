//! Redshift grid generation.
//!
//! Each spectral type is scanned over a fixed, type-specific grid of trial
//! redshifts. Galaxies and quasars use constant steps in `log10(z)`; stars are
//! scanned over a narrow linear window around zero to absorb radial velocity.

use crate::domain::SpecType;
use crate::error::ZfindError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridSpacing {
    Linear,
    Log10,
}

/// Half-open `[start, stop)` grid with a constant step in linear or log10 space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZGridRule {
    pub start: f64,
    pub stop: f64,
    pub step: f64,
    pub spacing: GridSpacing,
}

impl ZGridRule {
    /// Default scan rule for a spectral type.
    pub fn for_spectype(spectype: SpecType) -> Self {
        match spectype {
            SpecType::Galaxy => ZGridRule {
                start: 0.1,
                stop: 2.0,
                step: 4e-4,
                spacing: GridSpacing::Log10,
            },
            SpecType::Star => ZGridRule {
                start: -0.001,
                stop: 0.00101,
                step: 1e-4,
                spacing: GridSpacing::Linear,
            },
            SpecType::Qso => ZGridRule {
                start: 0.5,
                stop: 4.0,
                step: 5e-4,
                spacing: GridSpacing::Log10,
            },
        }
    }

    pub fn generate(&self) -> Result<Vec<f64>, ZfindError> {
        match self.spacing {
            GridSpacing::Linear => arange(self.start, self.stop, self.step),
            GridSpacing::Log10 => {
                if !(self.start > 0.0 && self.stop > 0.0) {
                    return Err(ZfindError::InvalidArgument(format!(
                        "log-spaced redshift grid needs positive bounds, got [{}, {})",
                        self.start, self.stop
                    )));
                }
                let exps = arange(self.start.log10(), self.stop.log10(), self.step)?;
                Ok(exps.into_iter().map(|e| 10f64.powf(e)).collect())
            }
        }
    }
}

/// Default redshift grid for a spectral type.
pub fn default_redshifts(spectype: SpecType) -> Vec<f64> {
    // The built-in rules always have valid bounds.
    ZGridRule::for_spectype(spectype)
        .generate()
        .unwrap_or_default()
}

/// `start, start+step, ...` for every value below `stop`.
///
/// The point count is `ceil((stop - start) / step)`, and each value is
/// computed as `start + i*step` so rounding does not accumulate.
pub fn arange(start: f64, stop: f64, step: f64) -> Result<Vec<f64>, ZfindError> {
    if !(start.is_finite() && stop.is_finite() && step.is_finite() && step > 0.0) {
        return Err(ZfindError::InvalidArgument(format!(
            "invalid grid: start={start}, stop={stop}, step={step}"
        )));
    }
    if stop <= start {
        return Ok(Vec::new());
    }

    let n = ((stop - start) / step).ceil() as usize;
    Ok((0..n).map(|i| start + step * i as f64).collect())
}
