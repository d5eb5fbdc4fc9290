//! Template discovery and loading.
//!
//! Templates live in one directory, resolved in this order:
//!
//! 1. an explicit directory given by the caller
//! 2. `$RR_TEMPLATE_DIR` (a `.env` file is honoured)
//! 3. `templates/` next to this crate, if it exists
//!
//! Every `rrtemplate-*.fits` file in that directory is one template.

use std::fs;
use std::path::{Path, PathBuf};

use nalgebra::DMatrix;
use tracing::{debug, info};

use crate::domain::SpecType;
use crate::error::ZfindError;
use crate::templates::fits::{Header, HeaderValue, read_fits, write_image_fits};
use crate::templates::template::Template;

/// Environment variable naming the template directory.
pub const TEMPLATE_DIR_ENV: &str = "RR_TEMPLATE_DIR";
/// Discovery pattern: `{TEMPLATE_PREFIX}*{TEMPLATE_SUFFIX}`.
pub const TEMPLATE_PREFIX: &str = "rrtemplate-";
pub const TEMPLATE_SUFFIX: &str = ".fits";
/// Extension holding the basis vectors.
pub const BASIS_EXTNAME: &str = "BASIS_VECTORS";

/// Resolves the template directory without touching process-wide state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateLocator {
    pub explicit: Option<PathBuf>,
    pub env_dir: Option<PathBuf>,
    pub install_dir: Option<PathBuf>,
}

impl TemplateLocator {
    /// Locator with only an explicit directory.
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            explicit: Some(dir.into()),
            ..Self::default()
        }
    }

    /// Default resolver: `$RR_TEMPLATE_DIR` and the crate's `templates/` directory.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let env_dir = std::env::var_os(TEMPLATE_DIR_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        let install = Path::new(env!("CARGO_MANIFEST_DIR")).join("templates");
        Self {
            explicit: None,
            env_dir,
            install_dir: install.is_dir().then_some(install),
        }
    }

    /// Override the directory with an explicit one, if given.
    pub fn or_explicit(mut self, dir: Option<PathBuf>) -> Self {
        if dir.is_some() {
            self.explicit = dir;
        }
        self
    }

    pub fn resolve_dir(&self) -> Result<PathBuf, ZfindError> {
        self.explicit
            .clone()
            .or_else(|| self.env_dir.clone())
            .or_else(|| self.install_dir.clone())
            .ok_or_else(|| {
                ZfindError::NotFound(format!(
                    "can't find template directory: no explicit directory, ${TEMPLATE_DIR_ENV}, or templates/"
                ))
            })
    }
}

/// List template files in the resolved directory, sorted by name.
pub fn discover(locator: &TemplateLocator) -> Result<Vec<PathBuf>, ZfindError> {
    let dir = locator.resolve_dir()?;
    let entries = fs::read_dir(&dir).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => {
            ZfindError::NotFound(format!("template directory '{}' does not exist", dir.display()))
        }
        _ => ZfindError::io(&dir, e),
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ZfindError::io(&dir, e))?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if name.starts_with(TEMPLATE_PREFIX) && name.ends_with(TEMPLATE_SUFFIX) {
            files.push(entry.path());
        }
    }
    files.sort();

    if files.is_empty() {
        return Err(ZfindError::NotFound(format!(
            "no {TEMPLATE_PREFIX}*{TEMPLATE_SUFFIX} templates in '{}'",
            dir.display()
        )));
    }
    debug!(dir = %dir.display(), count = files.len(), "discovered templates");
    Ok(files)
}

/// Load one template given a path, or a file name inside the template directory.
pub fn load(path_or_name: &Path, locator: &TemplateLocator) -> Result<Template, ZfindError> {
    if path_or_name.exists() {
        return read_template_file(path_or_name);
    }
    if let Ok(dir) = locator.resolve_dir() {
        let candidate = dir.join(path_or_name);
        if candidate.exists() {
            return read_template_file(&candidate);
        }
    }
    Err(ZfindError::NotFound(format!(
        "unable to find template {}",
        path_or_name.display()
    )))
}

/// Load a set of templates: every listed entry (see [`load`]), or with `None`
/// every template discovered in the resolved directory.
pub fn load_many(
    list: Option<&[PathBuf]>,
    locator: &TemplateLocator,
) -> Result<Vec<Template>, ZfindError> {
    let files = match list {
        None => discover(locator)?,
        Some(entries) => entries.to_vec(),
    };

    let templates = files
        .iter()
        .map(|f| load(f, locator))
        .collect::<Result<Vec<_>, _>>()?;

    if templates.is_empty() {
        return Err(ZfindError::NotFound("no templates found".to_string()));
    }
    info!(
        count = templates.len(),
        types = %templates.iter().map(Template::fulltype).collect::<Vec<_>>().join(","),
        "loaded templates"
    );
    Ok(templates)
}

/// Parse a template FITS file.
///
/// The `BASIS_VECTORS` extension supplies the basis matrix (`NAXIS2` vectors
/// of `NAXIS1` samples), the wavelength axis (`CRVAL1 + CDELT1*i`, raised to
/// the power of ten when `LOGLAM` is non-zero) and the type tags (`RRTYPE`,
/// optional `RRSUBTYP`). The redshift grid follows from `RRTYPE`.
pub fn read_template_file(path: &Path) -> Result<Template, ZfindError> {
    let hdus = read_fits(path)?;
    let hdu = hdus
        .iter()
        .find(|h| h.extname().map(str::trim) == Some(BASIS_EXTNAME))
        .ok_or_else(|| ZfindError::invalid_template(path, format!("no {BASIS_EXTNAME} extension")))?;
    let header = &hdu.header;

    let float = |key: &str| {
        header
            .get(key)
            .and_then(HeaderValue::as_f64)
            .ok_or_else(|| ZfindError::invalid_template(path, format!("missing or non-numeric {key}")))
    };
    let crval = float("CRVAL1")?;
    let cdelt = float("CDELT1")?;

    let (nwave, nbasis) = match hdu.shape.as_slice() {
        [nwave] => (*nwave, 1),
        [nwave, nbasis] => (*nwave, *nbasis),
        other => {
            return Err(ZfindError::invalid_template(
                path,
                format!("basis image must be 1-D or 2-D, got {} axes", other.len()),
            ));
        }
    };

    let loglam = header
        .get("LOGLAM")
        .and_then(HeaderValue::as_bool)
        .unwrap_or(false);
    let wave: Vec<f64> = (0..nwave)
        .map(|i| {
            let w = crval + cdelt * i as f64;
            if loglam { 10f64.powf(w) } else { w }
        })
        .collect();

    let rrtype = header
        .get("RRTYPE")
        .and_then(HeaderValue::as_str)
        .ok_or_else(|| ZfindError::invalid_template(path, "missing RRTYPE"))?;
    let spectype: SpecType = rrtype.parse()?;
    let subtype = header
        .get("RRSUBTYP")
        .and_then(HeaderValue::as_str)
        .map(|s| s.trim().to_string())
        .unwrap_or_default();

    if hdu.data.len() != nwave * nbasis {
        return Err(ZfindError::invalid_template(
            path,
            format!(
                "{BASIS_EXTNAME} holds {} values, expected {nbasis}x{nwave} (is it an IMAGE extension?)",
                hdu.data.len()
            ),
        ));
    }
    // FITS stores NAXIS1 fastest, i.e. one basis vector per row.
    let flux = DMatrix::from_row_slice(nbasis, nwave, &hdu.data);

    let template = Template::new(spectype, subtype, wave, flux)
        .map_err(|e| ZfindError::invalid_template(path, e.to_string()))?;
    debug!(
        path = %path.display(),
        fulltype = %template.fulltype(),
        nbasis = template.nbasis(),
        nwave = template.nwave(),
        nz = template.redshifts().len(),
        "read template"
    );
    Ok(template)
}

/// Write a template to a FITS file readable by [`read_template_file`].
///
/// The wavelength axis must be linear (constant step) or, with `loglam`,
/// linear in `log10(wave)`.
pub fn write_template_file(path: &Path, template: &Template, loglam: bool) -> Result<(), ZfindError> {
    let axis: Vec<f64> = if loglam {
        template.wave().iter().map(|w| w.log10()).collect()
    } else {
        template.wave().to_vec()
    };
    let crval = axis[0];
    let cdelt = if axis.len() > 1 { axis[1] - axis[0] } else { 1.0 };
    let linear = axis
        .windows(2)
        .all(|w| ((w[1] - w[0]) - cdelt).abs() <= 1e-9 * cdelt.abs().max(1.0));
    if !linear {
        return Err(ZfindError::InvalidArgument(format!(
            "template {} does not have a constant wavelength step",
            template.fulltype()
        )));
    }

    let mut header = Header::default();
    header.push("CRVAL1", HeaderValue::Float(crval));
    header.push("CDELT1", HeaderValue::Float(cdelt));
    if loglam {
        header.push("LOGLAM", HeaderValue::Int(1));
    }
    header.push("RRTYPE", HeaderValue::Str(template.spectype().to_string()));
    if !template.subtype().is_empty() {
        header.push("RRSUBTYP", HeaderValue::Str(template.subtype().to_string()));
    }

    let flux = template.flux();
    let data: Vec<f64> = (0..flux.nrows())
        .flat_map(|k| flux.row(k).iter().copied().collect::<Vec<_>>())
        .collect();
    write_image_fits(path, BASIS_EXTNAME, flux.nrows(), flux.ncols(), &data, &header)
}
