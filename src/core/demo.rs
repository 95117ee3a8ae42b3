//! Sample assets for trying out a fresh pipeline.

use tracing::info;

use crate::domain::{AssetId, NewAsset};

use super::engine::{EngineError, PipelineEngine};

/// (name, type, stage)
const DEMO_ASSETS: [(&str, &str, &str); 5] = [
    ("Sci-Fi Crate", "prop", "texture"),
    ("Character Base", "character", "highpoly"),
    ("Laser Rifle", "weapon", "uv"),
    ("Hover Vehicle", "vehicle", "blockout"),
    ("Wall Panel", "environment", "bake"),
];

/// Create the five demo assets and make the third depend on the first.
///
/// Types and stages the active pipeline does not define fall back to the
/// pipeline defaults.
pub fn seed_demo_assets(engine: &mut PipelineEngine) -> Result<Vec<AssetId>, EngineError> {
    let mut ids = Vec::with_capacity(DEMO_ASSETS.len());

    for (name, asset_type, stage) in DEMO_ASSETS {
        let mut input = NewAsset::named(name);
        if engine.pipeline().asset_type(asset_type).is_some() {
            input = input.with_type(asset_type);
        }
        if engine.get_stage(stage).is_some() {
            input = input.with_stage(stage);
        }
        ids.push(engine.create_asset(input)?.id);
    }

    engine.add_dependency(ids[2].as_str(), ids[0].as_str())?;

    info!(count = ids.len(), "Demo assets added");
    Ok(ids)
}
