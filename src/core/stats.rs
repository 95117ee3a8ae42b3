//! Pipeline statistics.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::Asset;

use super::pipeline::PipelineDefinition;

/// Asset counts per stage and type
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStats {
    pub total: usize,

    /// Every configured stage appears, with zero when empty
    pub by_stage: BTreeMap<String, usize>,

    /// Every configured asset type appears, with zero when empty
    pub by_type: BTreeMap<String, usize>,

    /// Assets sitting in the final configured stage
    pub completed: usize,
}

impl PipelineStats {
    pub fn compute<'a>(
        pipeline: &PipelineDefinition,
        assets: impl IntoIterator<Item = &'a Asset>,
    ) -> Self {
        let mut by_stage: BTreeMap<String, usize> =
            pipeline.stages().iter().map(|s| (s.id.clone(), 0)).collect();
        let mut by_type: BTreeMap<String, usize> = pipeline
            .asset_types()
            .iter()
            .map(|t| (t.id.clone(), 0))
            .collect();

        let mut total = 0;
        for asset in assets {
            total += 1;
            *by_stage.entry(asset.stage.clone()).or_default() += 1;
            *by_type.entry(asset.asset_type.clone()).or_default() += 1;
        }

        let completed = by_stage
            .get(&pipeline.last_stage().id)
            .copied()
            .unwrap_or_default();

        Self {
            total,
            by_stage,
            by_type,
            completed,
        }
    }

    /// Fraction of assets in the final stage (0.0 when empty)
    pub fn completion_ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AssetId, StageEvent};
    use chrono::Utc;

    fn asset(stage: &str, asset_type: &str) -> Asset {
        let now = Utc::now();
        Asset {
            id: AssetId::generate(),
            name: "x".to_string(),
            asset_type: asset_type.to_string(),
            stage: stage.to_string(),
            dependencies: Vec::new(),
            created_at: now,
            updated_at: now,
            history: vec![StageEvent::created(stage)],
            notes: String::new(),
            metadata: Default::default(),
        }
    }

    #[test]
    fn test_empty_pipeline_is_zero_seeded() {
        let pipeline = PipelineDefinition::builtin().unwrap();
        let stats = PipelineStats::compute(&pipeline, std::iter::empty());

        assert_eq!(stats.total, 0);
        assert_eq!(stats.by_stage.len(), 8);
        assert!(stats.by_stage.values().all(|c| *c == 0));
        assert_eq!(stats.by_type.len(), 5);
        assert_eq!(stats.completion_ratio(), 0.0);
    }

    #[test]
    fn test_completed_counts_final_stage() {
        let pipeline = PipelineDefinition::builtin().unwrap();
        let assets = vec![
            asset("export", "prop"),
            asset("export", "weapon"),
            asset("uv", "weapon"),
            asset("concept", "vehicle"),
        ];

        let stats = PipelineStats::compute(&pipeline, &assets);

        assert_eq!(stats.total, 4);
        assert_eq!(stats.completed, 2);
        assert_eq!(stats.by_type["weapon"], 2);
        assert_eq!(stats.completion_ratio(), 0.5);
    }
}
