//! Persistence Integration Tests
//!
//! Tests for snapshot round-trips through memory and file slots, recovery
//! from damaged data, and clearing.

use assetline::core::{
    seed_demo_assets, FileSlot, MemorySlot, PipelineDefinition, PipelineEngine, StorageSlot,
    STORAGE_KEY,
};
use assetline::domain::{AssetPatch, NewAsset, HISTORY_CAPACITY};
use tempfile::TempDir;

fn pipeline() -> PipelineDefinition {
    PipelineDefinition::builtin().unwrap()
}

/// Run a representative mix of mutations
fn populate(engine: &mut PipelineEngine) {
    let ids = seed_demo_assets(engine).unwrap();
    engine.advance_stage(ids[0].as_str()).unwrap();
    engine.transition_to(ids[1].as_str(), "concept").unwrap();
    engine
        .update_asset(
            ids[3].as_str(),
            AssetPatch::default().notes("Needs a second pass"),
        )
        .unwrap();
    engine.add_dependency(ids[4].as_str(), ids[3].as_str()).unwrap();
    engine.delete_asset(ids[1].as_str()).unwrap();
}

#[test]
fn test_round_trip_through_memory_slot() {
    let slot = MemorySlot::new();

    let (assets, history) = {
        let mut engine = PipelineEngine::open(pipeline(), slot.clone()).unwrap();
        populate(&mut engine);
        let assets: Vec<_> = engine.list_assets().into_iter().cloned().collect();
        (assets, engine.get_history(HISTORY_CAPACITY))
    };

    let restored = PipelineEngine::open(pipeline(), slot).unwrap();
    let restored_assets: Vec<_> = restored.list_assets().into_iter().cloned().collect();

    assert_eq!(restored_assets, assets);
    assert_eq!(restored.get_history(HISTORY_CAPACITY), history);
}

#[test]
fn test_round_trip_through_file_slot() {
    let temp = TempDir::new().unwrap();

    let snapshot = {
        let mut engine =
            PipelineEngine::open(pipeline(), FileSlot::open(temp.path()).unwrap()).unwrap();
        populate(&mut engine);
        engine.snapshot()
    };

    let slot = FileSlot::open(temp.path()).unwrap();
    assert!(slot.path_for(STORAGE_KEY).exists());

    let restored = PipelineEngine::open(pipeline(), slot).unwrap();
    assert_eq!(restored.snapshot(), snapshot);
}

#[test]
fn test_snapshot_layout() {
    let slot = MemorySlot::new();
    let mut engine = PipelineEngine::open(pipeline(), slot.clone()).unwrap();
    let id = engine
        .create_asset(NewAsset::named("Crate").with_stage("uv"))
        .unwrap()
        .id;

    let raw = slot.get(STORAGE_KEY).unwrap().unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();

    let pair = &value["assets"][0];
    assert_eq!(pair[0], id.as_str());
    assert_eq!(pair[1]["id"], id.as_str());
    assert_eq!(pair[1]["type"], "prop");
    assert_eq!(pair[1]["stage"], "uv");
    assert_eq!(value["history"][0]["action"], "create");
}

#[test]
fn test_malformed_data_starts_empty() {
    let mut slot = MemorySlot::new();
    slot.set(STORAGE_KEY, "{ not json").unwrap();

    let mut engine = PipelineEngine::open(pipeline(), slot.clone()).unwrap();
    assert!(engine.is_empty());

    // The engine stays usable and overwrites the bad data
    engine.create_asset(NewAsset::named("Fresh")).unwrap();
    let restored = PipelineEngine::open(pipeline(), slot).unwrap();
    assert_eq!(restored.len(), 1);
}

#[test]
fn test_dangling_dependency_is_rejected_on_restore() {
    let mut slot = MemorySlot::new();
    {
        let mut engine = PipelineEngine::open(pipeline(), slot.clone()).unwrap();
        let a = engine.create_asset(NewAsset::named("A")).unwrap().id;
        engine
            .create_asset(NewAsset::named("B").with_dependency(a))
            .unwrap();
    }

    // Drop the first asset from the stored document, leaving B's edge dangling
    let raw = slot.get(STORAGE_KEY).unwrap().unwrap();
    let mut value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    value["assets"].as_array_mut().unwrap().remove(0);
    slot.set(STORAGE_KEY, &value.to_string()).unwrap();

    let engine = PipelineEngine::open(pipeline(), slot).unwrap();
    assert!(engine.is_empty());
}

#[test]
fn test_history_is_bounded() {
    let slot = MemorySlot::new();
    let mut engine = PipelineEngine::open(pipeline(), slot.clone()).unwrap();

    for i in 0..HISTORY_CAPACITY + 20 {
        engine
            .create_asset(NewAsset::named(format!("Asset {}", i)))
            .unwrap();
    }

    let history = engine.get_history(usize::MAX);
    assert_eq!(history.len(), HISTORY_CAPACITY);
    assert_eq!(history[0].asset_name, format!("Asset {}", HISTORY_CAPACITY + 19));

    let restored = PipelineEngine::open(pipeline(), slot).unwrap();
    assert_eq!(restored.get_history(usize::MAX), history);
}

#[test]
fn test_clear_erases_slot_and_memory() {
    let temp = TempDir::new().unwrap();
    let mut engine =
        PipelineEngine::open(pipeline(), FileSlot::open(temp.path()).unwrap()).unwrap();
    populate(&mut engine);

    engine.clear().unwrap();

    assert!(engine.is_empty());
    assert!(engine.get_history(10).is_empty());
    let slot = FileSlot::open(temp.path()).unwrap();
    assert!(!slot.path_for(STORAGE_KEY).exists());

    let restored = PipelineEngine::open(pipeline(), slot).unwrap();
    assert!(restored.is_empty());
}
