//! EN-013: Run reports: load, save (atomic), path derivation.

use super::error::{Error, Result};
use super::types::RunReport;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Derive the report path for a module within the state directory.
pub fn report_path(state_dir: &Path, module_key: &str) -> PathBuf {
    state_dir.join(module_key).join("last-run.yaml")
}

/// Load the last report for a module. Returns None if there is none yet.
pub fn load_report(state_dir: &Path, module_key: &str) -> Result<Option<RunReport>> {
    let path = report_path(state_dir, module_key);
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(&path).map_err(|source| Error::Read {
        path: path.clone(),
        source,
    })?;
    let report: RunReport = serde_yaml_ng::from_str(&content)
        .map_err(|e| Error::Config(format!("invalid report {}: {}", path.display(), e)))?;
    Ok(Some(report))
}

/// Save a report atomically (write to a uniquely named temp, then rename).
///
/// Concurrent saves for the same module each get their own temp file; the
/// last rename wins.
pub fn save_report(state_dir: &Path, report: &RunReport) -> Result<PathBuf> {
    let path = report_path(state_dir, &report.module_key);
    let parent = path.parent().unwrap_or(state_dir);
    std::fs::create_dir_all(parent)?;

    let yaml = serde_yaml_ng::to_string(report)
        .map_err(|e| Error::Config(format!("cannot serialize report: {}", e)))?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".last-run.")
        .suffix(".yaml.tmp")
        .tempfile_in(parent)?;
    tmp.write_all(yaml.as_bytes())?;
    tmp.persist(&path).map_err(|e| e.error)?;

    Ok(path)
}

/// Load every report under the state directory, sorted by module key.
pub fn list_reports(state_dir: &Path) -> Result<Vec<RunReport>> {
    if !state_dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut keys: Vec<String> = std::fs::read_dir(state_dir)?
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_dir())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .collect();
    keys.sort();

    let mut reports = Vec::new();
    for key in keys {
        match load_report(state_dir, &key) {
            Ok(Some(report)) => reports.push(report),
            Ok(None) => {}
            Err(e) => log::warn!("skipping {}: {}", key, e),
        }
    }
    Ok(reports)
}
