//! Asset records tracked by the pipeline engine.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque, globally unique asset identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(String);

impl AssetId {
    /// Generate a fresh identifier
    pub fn generate() -> Self {
        Self(format!("asset_{}", Uuid::new_v4().simple()))
    }

    /// Get the raw string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AssetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AssetId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for AssetId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::borrow::Borrow<str> for AssetId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Free-form metadata attached to an asset (never validated)
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// A tracked unit of production work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub id: AssetId,

    pub name: String,

    /// Asset type id
    #[serde(rename = "type")]
    pub asset_type: String,

    /// Current stage id
    pub stage: String,

    /// Assets this one depends on, in insertion order
    #[serde(default)]
    pub dependencies: Vec<AssetId>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    /// Creation and stage transition log for this asset
    #[serde(default)]
    pub history: Vec<StageEvent>,

    #[serde(default)]
    pub notes: String,

    #[serde(default)]
    pub metadata: Metadata,
}

impl Asset {
    /// Whether this asset directly depends on `id`
    pub fn depends_on(&self, id: &str) -> bool {
        self.dependencies.iter().any(|d| d.as_str() == id)
    }

    /// Refresh the modification timestamp
    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// One entry of an asset's own stage log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageEvent {
    /// Stage the asset entered
    pub stage: String,

    /// Stage the asset left (absent for creation)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,

    pub timestamp: DateTime<Utc>,

    pub action: StageAction,
}

impl StageEvent {
    pub fn created(stage: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            from: None,
            timestamp: Utc::now(),
            action: StageAction::Created,
        }
    }

    pub fn transition(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            stage: to.into(),
            from: Some(from.into()),
            timestamp: Utc::now(),
            action: StageAction::Transition,
        }
    }
}

/// What produced a stage log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageAction {
    Created,
    Transition,
}

/// Input for creating an asset. Unset fields take pipeline defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewAsset {
    #[serde(default)]
    pub id: Option<AssetId>,

    pub name: String,

    #[serde(default, rename = "type")]
    pub asset_type: Option<String>,

    #[serde(default)]
    pub stage: Option<String>,

    #[serde(default)]
    pub dependencies: Vec<AssetId>,

    #[serde(default)]
    pub notes: String,

    #[serde(default)]
    pub metadata: Metadata,
}

impl NewAsset {
    /// Start an asset with just a name
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Use a caller-chosen id
    pub fn with_id(mut self, id: impl Into<AssetId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the asset type
    pub fn with_type(mut self, asset_type: impl Into<String>) -> Self {
        self.asset_type = Some(asset_type.into());
        self
    }

    /// Set the initial stage
    pub fn with_stage(mut self, stage: impl Into<String>) -> Self {
        self.stage = Some(stage.into());
        self
    }

    /// Add an initial dependency
    pub fn with_dependency(mut self, id: impl Into<AssetId>) -> Self {
        self.dependencies.push(id.into());
        self
    }

    /// Set notes
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    /// Add a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Partial update of an asset's descriptive fields.
///
/// Identity, creation time and the stage log are never patchable. Stage and
/// dependency changes go through the transition and dependency operations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssetPatch {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default, rename = "type")]
    pub asset_type: Option<String>,

    #[serde(default)]
    pub notes: Option<String>,

    /// Replaces the whole metadata map
    #[serde(default)]
    pub metadata: Option<Metadata>,
}

impl AssetPatch {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn asset_type(mut self, asset_type: impl Into<String>) -> Self {
        self.asset_type = Some(asset_type.into());
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Whether the patch changes nothing
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.asset_type.is_none()
            && self.notes.is_none()
            && self.metadata.is_none()
    }

    /// Merge the supplied fields into `asset`
    pub(crate) fn apply(self, asset: &mut Asset) {
        if let Some(name) = self.name {
            asset.name = name;
        }
        if let Some(asset_type) = self.asset_type {
            asset.asset_type = asset_type;
        }
        if let Some(notes) = self.notes {
            asset.notes = notes;
        }
        if let Some(metadata) = self.metadata {
            asset.metadata = metadata;
        }
    }
}
