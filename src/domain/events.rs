//! Events published by the pipeline engine.
//!
//! Every state change the engine acknowledges is announced as one of these
//! variants, after the change has been persisted.

use serde::{Deserialize, Serialize};

use super::asset::{Asset, AssetId};

/// A state change notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "camelCase")]
pub enum EngineEvent {
    /// The engine finished loading its configuration and prior state
    Initialized {
        pipeline: String,
        asset_count: usize,
    },

    /// A new asset was registered
    AssetCreated(Asset),

    /// Descriptive fields of an asset changed
    AssetUpdated(Asset),

    /// An asset was removed along with every reference to it
    AssetDeleted { id: AssetId, asset: Asset },

    /// An asset moved to another stage
    StageChanged {
        asset: Asset,
        from: String,
        to: String,
    },

    /// `asset` now depends on `dependency`
    DependencyAdded { asset: Asset, dependency: Asset },

    DependencyRemoved {
        asset_id: AssetId,
        depends_on_id: AssetId,
    },

    /// All assets and history were erased
    Cleared,
}

impl EngineEvent {
    /// The kind of this event, used for subscription
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Initialized { .. } => EventKind::Initialized,
            Self::AssetCreated(_) => EventKind::AssetCreated,
            Self::AssetUpdated(_) => EventKind::AssetUpdated,
            Self::AssetDeleted { .. } => EventKind::AssetDeleted,
            Self::StageChanged { .. } => EventKind::StageChanged,
            Self::DependencyAdded { .. } => EventKind::DependencyAdded,
            Self::DependencyRemoved { .. } => EventKind::DependencyRemoved,
            Self::Cleared => EventKind::Cleared,
        }
    }
}

/// Event names subscribers can listen for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    Initialized,
    AssetCreated,
    AssetUpdated,
    AssetDeleted,
    StageChanged,
    DependencyAdded,
    DependencyRemoved,
    Cleared,
}

impl EventKind {
    pub const ALL: [EventKind; 8] = [
        EventKind::Initialized,
        EventKind::AssetCreated,
        EventKind::AssetUpdated,
        EventKind::AssetDeleted,
        EventKind::StageChanged,
        EventKind::DependencyAdded,
        EventKind::DependencyRemoved,
        EventKind::Cleared,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Initialized => "initialized",
            EventKind::AssetCreated => "assetCreated",
            EventKind::AssetUpdated => "assetUpdated",
            EventKind::AssetDeleted => "assetDeleted",
            EventKind::StageChanged => "stageChanged",
            EventKind::DependencyAdded => "dependencyAdded",
            EventKind::DependencyRemoved => "dependencyRemoved",
            EventKind::Cleared => "cleared",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EventKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        EventKind::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| anyhow::anyhow!("Unknown event name: {}", s))
    }
}
