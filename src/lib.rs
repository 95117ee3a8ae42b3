//! assetline - Asset production pipeline tracker
//!
//! Tracks 3D game assets as they move through a configurable series of
//! production stages, with a dependency graph between assets, a bounded
//! activity log and a durable snapshot of the whole state.
//!
//! # Architecture
//!
//! The engine is a synchronous state machine:
//! - Every mutation records history, persists a snapshot, then notifies
//!   subscribers
//! - The dependency graph is kept acyclic
//! - State is restored from the snapshot on startup
//!
//! # Modules
//!
//! - `core`: Engine, pipeline definition, graph, storage, event bus
//! - `domain`: Data structures (Asset, EngineEvent, HistoryEntry)
//! - `ingest`: Bulk import of production files from a folder
//! - `config`: Paths and settings
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Register an asset and move it along
//! assetline add "Sci-Fi Crate" --type prop
//! assetline advance <asset-id>
//!
//! # Import a folder of production files
//! assetline import ~/art/crates
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod ingest;

// Re-export main types at crate root for convenience
pub use self::core::{
    DependencyRejection, EngineError, FileSlot, MemorySlot, PipelineDefinition, PipelineEngine,
    StorageSlot,
};
pub use domain::{Asset, AssetId, AssetPatch, EngineEvent, EventKind, HistoryEntry, NewAsset};
