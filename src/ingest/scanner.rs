//! Folder scanner for bulk asset import.
//!
//! Walks a directory tree, picks out production files by extension and turns
//! each one into a new asset whose stage is guessed from its path.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::{EngineError, PipelineDefinition, PipelineEngine};
use crate::domain::{AssetId, NewAsset};

use super::rules::{default_extensions, infer_stage, FileKind};

/// Errors that can occur while preparing a scan
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Import directory does not exist: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("Invalid ignore pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        source: glob::PatternError,
    },
}

/// Which files a scan picks up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanConfig {
    /// File extensions to import, without the dot
    pub extensions: Vec<String>,

    /// Glob patterns matched against paths relative to the scan root
    pub ignore: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            ignore: Vec::new(),
        }
    }
}

/// A production file found by the scanner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedFile {
    /// Absolute or root-joined path on disk
    pub path: PathBuf,

    /// Directory relative to the scan root, `/`-separated with a trailing
    /// slash, or empty for files at the root
    pub relative_dir: String,

    pub file_name: String,

    pub kind: Option<FileKind>,
}

impl ScannedFile {
    /// File name without its final extension
    pub fn stem(&self) -> &str {
        match self.file_name.rfind('.') {
            Some(0) | None => &self.file_name,
            Some(i) => &self.file_name[..i],
        }
    }

    pub fn relative_path(&self) -> String {
        format!("{}{}", self.relative_dir, self.file_name)
    }

    /// Stage guessed from the path, if `pipeline` defines it
    pub fn stage_for(&self, pipeline: &PipelineDefinition) -> Option<String> {
        infer_stage(&self.relative_dir, &self.file_name)
            .filter(|stage| pipeline.stage(stage).is_some())
            .map(str::to_string)
    }

    /// Build the creation request. Unmatched stages and the asset type are
    /// left for the engine to default.
    pub fn to_new_asset(&self, pipeline: &PipelineDefinition) -> NewAsset {
        let mut asset = NewAsset::named(self.stem())
            .with_notes(format!("Imported from: {}", self.relative_path()))
            .with_metadata("source_path", self.relative_path().into());
        if let Some(kind) = self.kind {
            asset = asset.with_metadata("file_kind", kind.as_str().into());
        }
        if let Some(stage) = self.stage_for(pipeline) {
            asset = asset.with_stage(stage);
        }
        asset
    }
}

/// Result of walking a directory
#[derive(Debug, Default)]
pub struct ScanResult {
    /// Matching files, sorted by relative path
    pub files: Vec<ScannedFile>,

    /// Files skipped for an unrecognised extension
    pub skipped: usize,

    /// Entries skipped by an ignore pattern
    pub ignored: usize,

    /// Entries that could not be read
    pub errors: usize,
}

/// Outcome of importing scanned files into an engine
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub imported: Vec<AssetId>,

    /// Imported assets per stage
    pub by_stage: BTreeMap<String, usize>,
}

impl ImportReport {
    pub fn count(&self) -> usize {
        self.imported.len()
    }
}

/// Recursive directory scanner
#[derive(Debug)]
pub struct FolderScanner {
    config: ScanConfig,
    ignore: Vec<glob::Pattern>,
}

impl Default for FolderScanner {
    fn default() -> Self {
        Self {
            config: ScanConfig::default(),
            ignore: Vec::new(),
        }
    }
}

impl FolderScanner {
    /// Create a scanner, compiling the ignore patterns
    pub fn new(config: ScanConfig) -> Result<Self, ScanError> {
        let ignore = config
            .ignore
            .iter()
            .map(|p| {
                glob::Pattern::new(p).map_err(|source| ScanError::InvalidPattern {
                    pattern: p.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { config, ignore })
    }

    /// Configuration the scanner was built from
    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Walk `root` and collect every importable file
    pub async fn scan(&self, root: &Path) -> Result<ScanResult> {
        if !tokio::fs::metadata(root)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
        {
            return Err(ScanError::DirectoryNotFound(root.to_path_buf()).into());
        }

        let mut result = ScanResult::default();
        let mut pending = vec![(root.to_path_buf(), String::new())];

        while let Some((dir, relative_dir)) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) => {
                    warn!("Failed to read {}: {}", dir.display(), e);
                    result.errors += 1;
                    continue;
                }
            };

            while let Some(entry) = entries
                .next_entry()
                .await
                .with_context(|| format!("Failed to list {}", dir.display()))?
            {
                let path = entry.path();
                let name = entry.file_name().to_string_lossy().into_owned();
                let relative = format!("{}{}", relative_dir, name);

                if self.is_ignored(&relative) {
                    debug!(path = %relative, "Ignored");
                    result.ignored += 1;
                    continue;
                }

                let file_type = match entry.file_type().await {
                    Ok(t) => t,
                    Err(e) => {
                        warn!("Failed to stat {}: {}", path.display(), e);
                        result.errors += 1;
                        continue;
                    }
                };

                if file_type.is_dir() {
                    pending.push((path, format!("{}/", relative)));
                } else if file_type.is_file() {
                    if !self.has_wanted_extension(&path) {
                        result.skipped += 1;
                        continue;
                    }
                    result.files.push(ScannedFile {
                        kind: FileKind::from_path(&path),
                        path,
                        relative_dir: relative_dir.clone(),
                        file_name: name,
                    });
                }
            }
        }

        result.files.sort_by_key(|f| f.relative_path());
        debug!(
            files = result.files.len(),
            skipped = result.skipped,
            ignored = result.ignored,
            "Scan complete"
        );
        Ok(result)
    }

    fn is_ignored(&self, relative: &str) -> bool {
        self.ignore.iter().any(|p| p.matches(relative))
    }

    fn has_wanted_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                self.config
                    .extensions
                    .iter()
                    .any(|e| e.trim_start_matches('.').eq_ignore_ascii_case(ext))
            })
            .unwrap_or(false)
    }
}

/// Create one asset per scanned file, in scan order.
///
/// Stops at the first engine error; assets created before it remain.
pub fn import_files(
    engine: &mut PipelineEngine,
    files: &[ScannedFile],
) -> Result<ImportReport, EngineError> {
    let mut report = ImportReport::default();

    for file in files {
        let asset = engine.create_asset(file.to_new_asset(engine.pipeline()))?;
        *report.by_stage.entry(asset.stage).or_default() += 1;
        report.imported.push(asset.id);
    }

    info!(imported = report.count(), "Folder import complete");
    Ok(report)
}
