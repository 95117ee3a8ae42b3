//! Domain types for the assetline engine.
//!
//! This module contains the core data structures:
//! - Asset: Tracked production work and its stage log
//! - Events: Notifications of acknowledged state changes
//! - History: Bounded audit log of actions

pub mod asset;
pub mod events;
pub mod history;

// Re-export commonly used types
pub use asset::{Asset, AssetId, AssetPatch, Metadata, NewAsset, StageAction, StageEvent};
pub use events::{EngineEvent, EventKind};
pub use history::{
    HistoryAction, HistoryEntry, HistoryLog, DEFAULT_HISTORY_LIMIT, HISTORY_CAPACITY,
};
