//! Basis templates.

use std::path::Path;

use nalgebra::DMatrix;

use crate::domain::{SpecType, TemplateKey};
use crate::error::ZfindError;
use crate::templates::grid::default_redshifts;

/// One rest-frame basis set plus the redshifts it is scanned over.
///
/// Templates are built once at load time and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    key: TemplateKey,
    wave: Vec<f64>,
    /// `[nbasis, nwave]`
    flux: DMatrix<f64>,
    redshifts: Vec<f64>,
}

impl Template {
    /// Build a template scanned over the default grid for its type.
    pub fn new(
        spectype: SpecType,
        subtype: impl Into<String>,
        wave: Vec<f64>,
        flux: DMatrix<f64>,
    ) -> Result<Self, ZfindError> {
        Self::with_redshifts(spectype, subtype, wave, flux, default_redshifts(spectype))
    }

    /// Build a template with an explicit redshift grid.
    pub fn with_redshifts(
        spectype: SpecType,
        subtype: impl Into<String>,
        wave: Vec<f64>,
        flux: DMatrix<f64>,
        redshifts: Vec<f64>,
    ) -> Result<Self, ZfindError> {
        let key = TemplateKey::new(spectype, subtype);
        let invalid = |message: String| ZfindError::invalid_template(Path::new(&key.fulltype()), message);

        if wave.is_empty() {
            return Err(invalid("empty wavelength axis".to_string()));
        }
        if !is_strictly_increasing(&wave) {
            return Err(invalid("wavelengths must be strictly increasing".to_string()));
        }
        if flux.nrows() == 0 {
            return Err(invalid("no basis vectors".to_string()));
        }
        if flux.ncols() != wave.len() {
            return Err(invalid(format!(
                "basis vectors have {} samples but the wavelength axis has {}",
                flux.ncols(),
                wave.len()
            )));
        }
        if redshifts.is_empty() || !is_strictly_increasing(&redshifts) {
            return Err(invalid(
                "redshift grid must be non-empty and strictly increasing".to_string(),
            ));
        }

        Ok(Self {
            key,
            wave,
            flux,
            redshifts,
        })
    }

    pub fn key(&self) -> &TemplateKey {
        &self.key
    }

    pub fn spectype(&self) -> SpecType {
        self.key.spectype
    }

    pub fn subtype(&self) -> &str {
        &self.key.subtype
    }

    pub fn fulltype(&self) -> String {
        self.key.fulltype()
    }

    pub fn wave(&self) -> &[f64] {
        &self.wave
    }

    pub fn flux(&self) -> &DMatrix<f64> {
        &self.flux
    }

    /// One basis vector as a contiguous vector.
    pub fn basis_vector(&self, k: usize) -> Vec<f64> {
        self.flux.row(k).iter().copied().collect()
    }

    pub fn redshifts(&self) -> &[f64] {
        &self.redshifts
    }

    pub fn nbasis(&self) -> usize {
        self.flux.nrows()
    }

    pub fn nwave(&self) -> usize {
        self.wave.len()
    }
}

fn is_strictly_increasing(values: &[f64]) -> bool {
    values.iter().all(|v| v.is_finite()) && values.windows(2).all(|w| w[1] > w[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_basis(nbasis: usize, nwave: usize) -> DMatrix<f64> {
        DMatrix::from_fn(nbasis, nwave, |k, j| (k + 1) as f64 + j as f64 * 0.01)
    }

    #[test]
    fn new_uses_default_grid_for_type() {
        let wave: Vec<f64> = (0..10).map(|i| 3000.0 + i as f64).collect();
        let t = Template::new(SpecType::Star, "K", wave, flat_basis(2, 10)).unwrap();
        assert_eq!(t.fulltype(), "STAR:K");
        assert_eq!(t.nbasis(), 2);
        assert_eq!(t.nwave(), 10);
        assert_eq!(t.redshifts(), default_redshifts(SpecType::Star).as_slice());
        assert_eq!(t.basis_vector(1)[0], 2.0);
    }

    #[test]
    fn rejects_shape_mismatch_and_unsorted_axes() {
        let wave = vec![1.0, 2.0, 3.0];
        assert!(Template::new(SpecType::Galaxy, "", wave.clone(), flat_basis(1, 4)).is_err());
        assert!(Template::new(SpecType::Galaxy, "", vec![1.0, 3.0, 2.0], flat_basis(1, 3)).is_err());
        assert!(
            Template::with_redshifts(SpecType::Qso, "", wave, flat_basis(1, 3), vec![0.2, 0.1])
                .is_err()
        );
    }
}
