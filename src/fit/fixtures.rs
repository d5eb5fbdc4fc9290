//! Shared test fixtures: a two-vector emission-line template and noiseless
//! observations of it.

use nalgebra::DMatrix;

use crate::domain::{SpecType, Spectrum, Target};
use crate::math::interp_linear;
use crate::templates::Template;

/// Flat continuum plus one Gaussian line at 3000 Å rest frame.
pub fn line_template(redshifts: Vec<f64>) -> Template {
    typed_line_template(SpecType::Galaxy, "", redshifts)
}

pub fn typed_line_template(spectype: SpecType, subtype: &str, redshifts: Vec<f64>) -> Template {
    let wave: Vec<f64> = (0..2000).map(|i| 2000.0 + i as f64 * 2.0).collect();
    let line: Vec<f64> = wave
        .iter()
        .map(|w| (-0.5 * ((w - 3000.0) / 20.0f64).powi(2)).exp())
        .collect();
    let flux = DMatrix::from_fn(2, wave.len(), |k, j| if k == 0 { 1.0 } else { line[j] });
    Template::with_redshifts(spectype, subtype, wave, flux, redshifts).unwrap()
}

/// Noiseless unit-ivar observation of `template` at `z` over 3600–6598 Å.
pub fn observe(template: &Template, id: i64, z: f64, coeff: &[f64]) -> Target {
    let wave: Vec<f64> = (0..1500).map(|i| 3600.0 + i as f64 * 2.0).collect();
    let rest: Vec<f64> = wave.iter().map(|w| w / (1.0 + z)).collect();
    let mut flux = vec![0.0; wave.len()];
    for (k, c) in coeff.iter().enumerate() {
        let v = interp_linear(&rest, template.wave(), &template.basis_vector(k));
        for (f, x) in flux.iter_mut().zip(v) {
            *f += c * x;
        }
    }
    let ivar = vec![1.0; wave.len()];
    Target::new(id, vec![Spectrum { wave, flux, ivar }])
}
