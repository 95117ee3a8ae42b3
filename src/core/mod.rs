//! Core pipeline tracking logic.
//!
//! This module contains:
//! - Pipeline: Stage, transition and asset type definitions
//! - Engine: Asset store, stage state machine and dependency graph
//! - Graph: Cycle detection and graph snapshots
//! - Bus: Synchronous event delivery
//! - Storage: Durable snapshot slots
//! - Stats: Per-stage and per-type counts

pub mod bus;
pub mod demo;
pub mod engine;
pub mod graph;
pub mod pipeline;
pub mod stats;
pub mod storage;

// Re-export commonly used types
pub use bus::{EventBus, SubscriptionId};
pub use demo::seed_demo_assets;
pub use engine::{DependencyRejection, EngineError, PipelineEngine};
pub use graph::{GraphEdge, GraphNode, GraphSnapshot};
pub use pipeline::{AssetType, PipelineDefinition, Stage, Transition};
pub use stats::PipelineStats;
pub use storage::{FileSlot, MemorySlot, Snapshot, StorageError, StorageSlot, STORAGE_KEY};
