use persona_core::{AnalysisReport, CoreError, ExportDocument, PersistenceError};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Writes export documents and analysis reports as pretty-printed JSON.
///
/// Files are written to a sibling temp file and renamed into place, so a
/// reader never sees a half-written document. An existing file for the same
/// user is replaced.
#[derive(Debug, Clone)]
pub struct PersistenceWriter {
    output_dir: PathBuf,
}

impl PersistenceWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn export_path(&self, username: &str) -> PathBuf {
        self.output_dir.join(format!("{}_export.json", username))
    }

    pub fn report_path(&self, username: &str) -> PathBuf {
        self.output_dir.join(format!("{}_analysis.json", username))
    }

    pub fn write(&self, document: &ExportDocument) -> Result<PathBuf, CoreError> {
        let path = self.export_path(document.username());
        self.write_json(&path, document)?;
        info!("Export for u/{} written to {}", document.username(), path.display());
        Ok(path)
    }

    pub fn write_report(&self, report: &AnalysisReport) -> Result<PathBuf, CoreError> {
        let path = self.report_path(&report.username);
        self.write_json(&path, report)?;
        info!("Analysis for u/{} written to {}", report.username, path.display());
        Ok(path)
    }

    /// Read back a document written by [`PersistenceWriter::write`].
    pub fn load(path: impl AsRef<Path>) -> Result<ExportDocument, CoreError> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let contents = fs::read_to_string(path).map_err(|source| PersistenceError::Read {
            path: display.clone(),
            source,
        })?;
        let document = serde_json::from_str(&contents)
            .map_err(|source| PersistenceError::Deserialize { path: display, source })?;
        Ok(document)
    }

    fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), CoreError> {
        let display = path.display().to_string();

        fs::create_dir_all(&self.output_dir).map_err(|source| PersistenceError::CreateDirectory {
            path: self.output_dir.display().to_string(),
            source,
        })?;

        let json = serde_json::to_string_pretty(value).map_err(|source| PersistenceError::Serialize {
            path: display.clone(),
            source,
        })?;

        let temp_path = path.with_extension("json.tmp");
        debug!("Writing {} bytes to {}", json.len(), temp_path.display());
        fs::write(&temp_path, json).map_err(|source| PersistenceError::Write {
            path: temp_path.display().to_string(),
            source,
        })?;
        fs::rename(&temp_path, path).map_err(|source| {
            let _ = fs::remove_file(&temp_path);
            PersistenceError::Write {
                path: display,
                source,
            }
        })?;
        Ok(())
    }
}
