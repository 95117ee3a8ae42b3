//! Bulk import of production files.
//!
//! Import runs in two steps:
//!
//! 1. **Scanner**: Walks a folder tree and collects files by extension
//! 2. **Rules**: Guess each file's stage from its folder and file name
//!
//! ```text
//! folder → FolderScanner → ScannedFile → NewAsset → PipelineEngine
//! ```

pub mod rules;
pub mod scanner;

// Re-export key types
pub use rules::{default_extensions, infer_stage, FileKind};
pub use scanner::{
    import_files, FolderScanner, ImportReport, ScanConfig, ScanError, ScanResult, ScannedFile,
};
