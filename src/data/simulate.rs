//! Synthetic targets drawn from templates.
//!
//! Each target picks a template, a redshift inside that template's scan grid
//! and positive basis coefficients at random, then observes the redshifted
//! model on a fixed wavelength grid with Gaussian noise. The draw is fully
//! determined by the seed.

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;
use serde::{Deserialize, Serialize};

use crate::domain::{Spectrum, Target, TemplateKey};
use crate::error::ZfindError;
use crate::math::interp_linear;
use crate::templates::Template;

/// Observed wavelength coverage [Å].
pub const SIM_WAVE_MIN: f64 = 3600.0;
pub const SIM_WAVE_MAX: f64 = 9800.0;
pub const SIM_DWAVE: f64 = 2.0;

/// Input parameters of one simulated target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimTruth {
    pub targetid: i64,
    pub template: TemplateKey,
    pub z: f64,
    pub coeff: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct SimulatedTargets {
    pub targets: Vec<Target>,
    pub truth: Vec<SimTruth>,
}

/// Draw `n` noisy targets from `templates`.
///
/// `snr` is the ratio of the median absolute model flux to the per-pixel
/// noise sigma.
pub fn simulate_targets(
    templates: &[Template],
    n: usize,
    seed: u64,
    snr: f64,
) -> Result<SimulatedTargets, ZfindError> {
    if templates.is_empty() {
        return Err(ZfindError::NotFound("no templates to simulate from".to_string()));
    }
    if n == 0 {
        return Err(ZfindError::InvalidArgument("target count must be > 0".to_string()));
    }
    if !(snr.is_finite() && snr > 0.0) {
        return Err(ZfindError::InvalidArgument(format!("snr must be positive, got {snr}")));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let wave = observed_wave();

    let mut targets = Vec::with_capacity(n);
    let mut truth = Vec::with_capacity(n);
    for i in 0..n {
        let template = &templates[rng.gen_range(0..templates.len())];
        let zgrid = template.redshifts();
        let (zlo, zhi) = (zgrid[0], zgrid[zgrid.len() - 1]);
        let z = if zhi > zlo { rng.gen_range(zlo..zhi) } else { zlo };
        let coeff: Vec<f64> = (0..template.nbasis()).map(|_| rng.gen_range(0.5..2.0)).collect();

        let model = render(template, &wave, z, &coeff);
        let sigma = noise_sigma(&model, snr);
        let noise = Normal::new(0.0, sigma)
            .map_err(|e| ZfindError::InvalidArgument(format!("noise distribution error: {e}")))?;
        let flux: Vec<f64> = model.iter().map(|m| m + noise.sample(&mut rng)).collect();

        let targetid = i as i64;
        targets.push(Target::new(
            targetid,
            vec![Spectrum {
                wave: wave.clone(),
                flux,
                ivar: vec![1.0 / (sigma * sigma); wave.len()],
            }],
        ));
        truth.push(SimTruth {
            targetid,
            template: template.key().clone(),
            z,
            coeff,
        });
    }

    Ok(SimulatedTargets { targets, truth })
}

fn observed_wave() -> Vec<f64> {
    let n = ((SIM_WAVE_MAX - SIM_WAVE_MIN) / SIM_DWAVE).floor() as usize + 1;
    (0..n).map(|i| SIM_WAVE_MIN + SIM_DWAVE * i as f64).collect()
}

/// Model flux of `template` at redshift `z` sampled on `wave`.
fn render(template: &Template, wave: &[f64], z: f64, coeff: &[f64]) -> Vec<f64> {
    let rest: Vec<f64> = wave.iter().map(|w| w / (1.0 + z)).collect();
    let mut flux = vec![0.0; wave.len()];
    for (k, c) in coeff.iter().enumerate() {
        let basis = interp_linear(&rest, template.wave(), &template.basis_vector(k));
        for (f, b) in flux.iter_mut().zip(basis) {
            *f += c * b;
        }
    }
    flux
}

fn noise_sigma(model: &[f64], snr: f64) -> f64 {
    let mut abs: Vec<f64> = model.iter().map(|m| m.abs()).filter(|m| *m > 0.0).collect();
    abs.sort_by(|a, b| a.total_cmp(b));
    let median = abs.get(abs.len() / 2).copied().unwrap_or(1.0);
    (median / snr).max(1e-12)
}
