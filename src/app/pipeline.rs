//! Shared "zfind pipeline" logic used by the CLI commands.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! templates + targets -> zfind -> result file -> optional CSV export

use std::path::PathBuf;

use tracing::info;

use crate::domain::{Target, ZBestRow, ZfindConfig};
use crate::error::ZfindError;
use crate::fit::{BestRedshift, LinearChi2Scan, MinChi2Extractor, ParabolicMinima, ZfindOutput, zfind};
use crate::io::{read_targets_json, write_candidates_csv, write_zscan};
use crate::templates::{Template, TemplateLocator, discover, load_many, read_template_file};

/// Settings of one `rrz run`.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub targets: PathBuf,
    /// Explicit template files or names; `None` discovers them.
    pub templates: Option<Vec<PathBuf>>,
    pub locator: TemplateLocator,
    pub zfind: ZfindConfig,
    pub output: PathBuf,
    pub overwrite: bool,
    pub export_candidates: Option<PathBuf>,
}

/// All computed outputs of a single run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub templates: Vec<Template>,
    pub targets: Vec<Target>,
    pub output: ZfindOutput,
    pub zbest: Vec<ZBestRow>,
}

/// Execute the full pipeline with the reference engines.
pub fn run_zfind(config: &RunConfig) -> Result<RunOutput, ZfindError> {
    // 1) Templates and targets.
    let templates = load_many(config.templates.as_deref(), &config.locator)?;
    let targets = read_targets_json(&config.targets)?;
    info!(
        path = %config.targets.display(),
        count = targets.len(),
        "loaded targets"
    );

    // 2) Scan, refine and rank.
    let output = zfind(
        &targets,
        &templates,
        &config.zfind,
        &LinearChi2Scan,
        &ParabolicMinima::default(),
    )?;

    // 3) Persist scans plus summary, then optional exports.
    let extractor = MinChi2Extractor;
    write_zscan(&config.output, &output.scans, config.overwrite, &extractor)?;
    if let Some(path) = &config.export_candidates {
        write_candidates_csv(path, &output.candidates)?;
        info!(path = %path.display(), "exported candidates");
    }
    let zbest = extractor.zbest(&output.scans);

    Ok(RunOutput {
        templates,
        targets,
        output,
        zbest,
    })
}

/// Discovered template files together with their parsed contents.
pub fn list_templates(locator: &TemplateLocator) -> Result<Vec<(PathBuf, Template)>, ZfindError> {
    discover(locator)?
        .into_iter()
        .map(|path| read_template_file(&path).map(|t| (path, t)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SpecType;
    use crate::fit::fixtures::{observe, typed_line_template};
    use crate::io::{read_zscan, write_targets_json};
    use crate::templates::write_template_file;

    #[test]
    fn end_to_end_run_writes_results() {
        let dir = tempfile::tempdir().unwrap();
        let tdir = dir.path().join("templates");
        std::fs::create_dir(&tdir).unwrap();

        let galaxy = typed_line_template(SpecType::Galaxy, "", vec![0.1, 0.2]);
        write_template_file(&tdir.join("rrtemplate-galaxy.fits"), &galaxy, false).unwrap();
        std::fs::write(tdir.join("README.txt"), "not a template").unwrap();

        let targets = vec![observe(&galaxy, 1, 0.5, &[1.0, 6.0]), observe(&galaxy, 2, 0.8, &[2.0, 4.0])];
        let targets_path = dir.path().join("targets.json");
        write_targets_json(&targets_path, &targets).unwrap();

        let config = RunConfig {
            targets: targets_path,
            templates: None,
            locator: TemplateLocator::with_dir(&tdir),
            zfind: ZfindConfig {
                ncpu: Some(2),
                nminima: 2,
            },
            output: dir.path().join("zscan.rrz"),
            overwrite: true,
            export_candidates: Some(dir.path().join("candidates.csv")),
        };
        let run = run_zfind(&config).unwrap();

        assert_eq!(run.templates.len(), 1);
        // The file-derived template scans the default galaxy grid.
        assert!((run.templates[0].redshifts()[0] - 0.1).abs() < 1e-12);
        assert_eq!(run.zbest.len(), 2);
        assert!((run.zbest[0].z - 0.5).abs() < 2e-3, "z={}", run.zbest[0].z);
        assert!((run.zbest[1].z - 0.8).abs() < 2e-3, "z={}", run.zbest[1].z);

        let (summary, scans) = read_zscan(&config.output).unwrap();
        assert_eq!(summary, run.zbest);
        assert_eq!(scans, run.output.scans);
        assert!(config.export_candidates.as_ref().unwrap().exists());

        let listing = list_templates(&config.locator).unwrap();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].1.spectype(), SpecType::Galaxy);
    }
}
