//! Pipeline definitions and loading.
//!
//! A pipeline is an ordered list of production stages, the forward
//! transitions sanctioned between them, and the closed set of asset types.
//! Definitions are written in YAML; the built-in 3D game asset pipeline is
//! embedded in the binary.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// The built-in pipeline definition
const BUILTIN_PIPELINE_YAML: &str = include_str!("../../pipelines/game_asset.yaml");

/// A complete pipeline definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineDefinition {
    /// Human-readable pipeline name
    pub name: String,

    /// Definition version
    #[serde(default)]
    pub version: String,

    /// Asset type assigned when a new asset does not name one
    /// (falls back to the first asset type)
    #[serde(default)]
    pub default_asset_type: Option<String>,

    /// Stages in canonical order
    pub stages: Vec<Stage>,

    /// Sanctioned forward moves
    #[serde(default)]
    pub transitions: Vec<Transition>,

    /// Closed set of asset types
    pub asset_types: Vec<AssetType>,
}

impl PipelineDefinition {
    /// The embedded "3D Game Asset Pipeline"
    pub fn builtin() -> Result<Self> {
        Self::from_yaml(BUILTIN_PIPELINE_YAML).context("Built-in pipeline definition is invalid")
    }

    /// Load a pipeline definition from a YAML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read pipeline file: {}", path.display()))?;

        Self::from_yaml(&content)
            .with_context(|| format!("Invalid pipeline file: {}", path.display()))
    }

    /// Parse and validate a pipeline definition from YAML content
    pub fn from_yaml(content: &str) -> Result<Self> {
        let definition: Self =
            serde_yaml::from_str(content).context("Failed to parse pipeline YAML")?;
        definition.validate()?;
        Ok(definition)
    }

    /// Validate the pipeline definition
    pub fn validate(&self) -> Result<()> {
        if self.stages.is_empty() {
            anyhow::bail!("Pipeline '{}' must have at least one stage", self.name);
        }

        let mut stage_ids = HashSet::new();
        for (i, stage) in self.stages.iter().enumerate() {
            if stage.id.is_empty() {
                anyhow::bail!("Stage {} has an empty id", i);
            }
            if !stage_ids.insert(stage.id.as_str()) {
                anyhow::bail!("Duplicate stage id '{}'", stage.id);
            }
        }

        for transition in &self.transitions {
            for end in [&transition.from, &transition.to] {
                if !stage_ids.contains(end.as_str()) {
                    anyhow::bail!(
                        "Transition {} -> {} references unknown stage '{}'",
                        transition.from,
                        transition.to,
                        end
                    );
                }
            }
        }

        if self.asset_types.is_empty() {
            anyhow::bail!("Pipeline '{}' must have at least one asset type", self.name);
        }

        let mut type_ids = HashSet::new();
        for asset_type in &self.asset_types {
            if !type_ids.insert(asset_type.id.as_str()) {
                anyhow::bail!("Duplicate asset type id '{}'", asset_type.id);
            }
        }

        if let Some(ref default_type) = self.default_asset_type {
            if !type_ids.contains(default_type.as_str()) {
                anyhow::bail!("Default asset type '{}' is not defined", default_type);
            }
        }

        Ok(())
    }

    /// All stages in canonical order
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Get a stage by id
    pub fn stage(&self, id: &str) -> Option<&Stage> {
        self.stages.iter().find(|s| s.id == id)
    }

    /// Canonical progression index of a stage
    pub fn stage_index(&self, id: &str) -> Option<usize> {
        self.stages.iter().position(|s| s.id == id)
    }

    /// The stage new assets start in
    pub fn first_stage(&self) -> &Stage {
        &self.stages[0]
    }

    /// The conventionally terminal stage
    pub fn last_stage(&self) -> &Stage {
        &self.stages[self.stages.len() - 1]
    }

    /// The stage following `id` in canonical order, if any
    pub fn next_stage(&self, id: &str) -> Option<&Stage> {
        let index = self.stage_index(id)?;
        self.stages.get(index + 1)
    }

    /// All asset types
    pub fn asset_types(&self) -> &[AssetType] {
        &self.asset_types
    }

    /// Get an asset type by id
    pub fn asset_type(&self, id: &str) -> Option<&AssetType> {
        self.asset_types.iter().find(|t| t.id == id)
    }

    /// Asset type used when none is supplied
    pub fn default_asset_type(&self) -> &AssetType {
        self.default_asset_type
            .as_deref()
            .and_then(|id| self.asset_type(id))
            .unwrap_or(&self.asset_types[0])
    }

    /// Whether `from -> to` is an explicitly configured forward move
    pub fn is_sanctioned_forward(&self, from: &str, to: &str) -> bool {
        self.transitions.iter().any(|t| t.from == from && t.to == to)
    }
}

/// A named step in the production pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    /// Unique stage id (e.g. "concept")
    pub id: String,

    /// Display name
    pub name: String,

    /// Display color (hex)
    #[serde(default)]
    pub color: String,

    /// Display icon
    #[serde(default)]
    pub icon: String,

    #[serde(default)]
    pub description: String,
}

/// A sanctioned forward move between two stages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub from: String,
    pub to: String,
}

/// Display/grouping category for assets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetType {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub icon: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_PIPELINE_YAML: &str = r#"
name: test
stages:
  - { id: a, name: A }
  - { id: b, name: B }
  - { id: c, name: C }
transitions:
  - { from: a, to: b }
asset_types:
  - { id: prop, name: Prop }
  - { id: weapon, name: Weapon }
default_asset_type: weapon
"#;

    #[test]
    fn test_builtin_pipeline() {
        let pipeline = PipelineDefinition::builtin().unwrap();

        assert_eq!(pipeline.name, "3D Game Asset Pipeline");
        assert_eq!(pipeline.stages.len(), 8);
        assert_eq!(pipeline.transitions.len(), 7);
        assert_eq!(pipeline.first_stage().id, "concept");
        assert_eq!(pipeline.last_stage().id, "export");
        assert_eq!(pipeline.default_asset_type().id, "prop");
    }

    #[test]
    fn test_pipeline_parsing() {
        let pipeline = PipelineDefinition::from_yaml(TEST_PIPELINE_YAML).unwrap();

        assert_eq!(pipeline.stage_index("c"), Some(2));
        assert_eq!(pipeline.next_stage("a").map(|s| s.id.as_str()), Some("b"));
        assert!(pipeline.next_stage("c").is_none());
        assert_eq!(pipeline.default_asset_type().id, "weapon");
        assert!(pipeline.is_sanctioned_forward("a", "b"));
        assert!(!pipeline.is_sanctioned_forward("b", "c"));
    }

    #[test]
    fn test_unknown_transition_stage() {
        let yaml = r#"
name: invalid
stages:
  - { id: a, name: A }
transitions:
  - { from: a, to: nowhere }
asset_types:
  - { id: prop, name: Prop }
"#;
        assert!(PipelineDefinition::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_duplicate_stage_rejected() {
        let yaml = r#"
name: invalid
stages:
  - { id: a, name: A }
  - { id: a, name: Again }
asset_types:
  - { id: prop, name: Prop }
"#;
        assert!(PipelineDefinition::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_missing_default_type_rejected() {
        let yaml = r#"
name: invalid
stages:
  - { id: a, name: A }
asset_types:
  - { id: prop, name: Prop }
default_asset_type: vehicle
"#;
        assert!(PipelineDefinition::from_yaml(yaml).is_err());
    }
}
