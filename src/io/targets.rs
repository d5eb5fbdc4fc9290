//! Read/write target JSON files.
//!
//! A targets file is a JSON list of `{ "id", "spectra": [{ "wave", "flux",
//! "ivar" }] }` objects. Array lengths and target ids are checked on load so
//! the fit stages can assume well-formed input.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::domain::Target;
use crate::error::ZfindError;

/// Read and validate a targets file.
pub fn read_targets_json(path: &Path) -> Result<Vec<Target>, ZfindError> {
    let file = File::open(path).map_err(|e| ZfindError::io(path, e))?;
    let targets: Vec<Target> = serde_json::from_reader(BufReader::new(file)).map_err(|e| {
        ZfindError::InvalidArgument(format!("invalid targets JSON '{}': {e}", path.display()))
    })?;

    let mut seen = HashSet::with_capacity(targets.len());
    for target in &targets {
        target.validate()?;
        if !seen.insert(target.id) {
            return Err(ZfindError::InvalidArgument(format!(
                "duplicate target id {} in '{}'",
                target.id,
                path.display()
            )));
        }
    }
    Ok(targets)
}

/// Write targets as pretty-printed JSON.
pub fn write_targets_json(path: &Path, targets: &[Target]) -> Result<(), ZfindError> {
    let file = File::create(path).map_err(|e| ZfindError::io(path, e))?;
    serde_json::to_writer_pretty(BufWriter::new(file), targets)
        .map_err(|e| ZfindError::storage(path.display().to_string(), format!("failed to write targets JSON: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Spectrum;

    fn target(id: i64) -> Target {
        Target::new(
            id,
            vec![Spectrum {
                wave: vec![4000.0, 4001.5],
                flux: vec![0.25, -1.0],
                ivar: vec![2.0, 0.0],
            }],
        )
    }

    #[test]
    fn round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("targets.json");
        let targets = vec![target(1), target(-5)];
        write_targets_json(&path, &targets).unwrap();
        assert_eq!(read_targets_json(&path).unwrap(), targets);
    }

    #[test]
    fn rejects_duplicates_and_ragged_spectra() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dup.json");
        write_targets_json(&path, &[target(3), target(3)]).unwrap();
        assert!(matches!(read_targets_json(&path), Err(ZfindError::InvalidArgument(_))));

        let path = dir.path().join("ragged.json");
        std::fs::write(
            &path,
            r#"[{"id": 1, "spectra": [{"wave": [1.0, 2.0], "flux": [1.0], "ivar": [1.0, 1.0]}]}]"#,
        )
        .unwrap();
        assert!(matches!(read_targets_json(&path), Err(ZfindError::InvalidArgument(_))));
    }
}
