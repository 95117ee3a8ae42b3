//! Pipeline Engine Integration Tests
//!
//! Tests for stage transitions, dependency graph rules, delete integrity
//! and statistics, through the public engine API.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::thread::sleep;
use std::time::Duration;

use assetline::core::graph::find_cycle;
use assetline::core::{MemorySlot, PipelineDefinition, PipelineEngine};
use assetline::domain::{AssetId, AssetPatch, EngineEvent, EventKind, HistoryAction, NewAsset};

fn engine() -> PipelineEngine {
    PipelineEngine::open(PipelineDefinition::builtin().unwrap(), MemorySlot::new()).unwrap()
}

fn create(engine: &mut PipelineEngine, name: &str) -> AssetId {
    engine.create_asset(NewAsset::named(name)).unwrap().id
}

fn record_all(engine: &mut PipelineEngine) -> Rc<RefCell<Vec<EngineEvent>>> {
    let events = Rc::new(RefCell::new(Vec::new()));
    for kind in EventKind::ALL {
        let sink = Rc::clone(&events);
        engine.on(kind, move |e| sink.borrow_mut().push(e.clone()));
    }
    events
}

#[test]
fn test_dependency_graph_stays_acyclic() {
    let mut engine = engine();
    let ids: Vec<AssetId> = (0..8)
        .map(|i| create(&mut engine, &format!("Asset {}", i)))
        .collect();

    // Deterministic pseudo-random edge attempts
    let mut state: u64 = 0x2545_f491_4f6c_dd1d;
    let mut accepted = 0;
    for _ in 0..200 {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        let from = &ids[(state % 8) as usize];
        let to = &ids[((state >> 8) % 8) as usize];

        if engine.add_dependency(from.as_str(), to.as_str()).unwrap() {
            accepted += 1;
        }

        let assets: HashMap<AssetId, _> = engine
            .list_assets()
            .into_iter()
            .map(|a| (a.id.clone(), a.clone()))
            .collect();
        assert_eq!(find_cycle(&assets), None);
    }

    assert!(accepted > 0);
}

#[test]
fn test_cycle_rejection_leaves_asset_unchanged() {
    let mut engine = engine();
    let a = create(&mut engine, "A");
    let b = create(&mut engine, "B");
    let c = create(&mut engine, "C");

    assert!(engine.add_dependency(a.as_str(), b.as_str()).unwrap());
    assert!(engine.add_dependency(b.as_str(), c.as_str()).unwrap());

    let before = engine.get_asset(c.as_str()).unwrap().clone();
    let events = record_all(&mut engine);

    assert!(engine.would_create_cycle(c.as_str(), a.as_str()));
    assert!(!engine.add_dependency(c.as_str(), a.as_str()).unwrap());

    assert_eq!(engine.get_asset(c.as_str()).unwrap(), &before);
    assert!(events.borrow().is_empty());
}

#[test]
fn test_delete_purges_incoming_references() {
    let mut engine = engine();
    let base = create(&mut engine, "Base Mesh");
    let crate_a = create(&mut engine, "Crate A");
    let crate_b = create(&mut engine, "Crate B");
    engine.add_dependency(crate_a.as_str(), base.as_str()).unwrap();
    engine.add_dependency(crate_b.as_str(), base.as_str()).unwrap();
    engine.add_dependency(crate_b.as_str(), crate_a.as_str()).unwrap();

    assert!(engine.delete_asset(base.as_str()).unwrap());

    assert!(engine.get_asset(base.as_str()).is_none());
    for asset in engine.list_assets() {
        assert!(!asset.depends_on(base.as_str()));
    }
    assert_eq!(
        engine.get_asset(crate_b.as_str()).unwrap().dependencies,
        vec![crate_a.clone()]
    );
    assert_eq!(engine.get_history(1)[0].action, HistoryAction::Delete);

    // Deleting again is a plain miss
    assert!(!engine.delete_asset(base.as_str()).unwrap());
}

#[test]
fn test_transition_appends_one_history_entry() {
    let mut engine = engine();
    let id = create(&mut engine, "Crate");

    let moved = engine.advance_stage(id.as_str()).unwrap().unwrap();
    assert_eq!(moved.stage, "blockout");
    assert_eq!(moved.history.len(), 2);

    let moved = engine.transition_to(id.as_str(), "uv").unwrap().unwrap();
    assert_eq!(moved.stage, "uv");
    assert_eq!(moved.history.len(), 3);

    let last = moved.history.last().unwrap();
    assert_eq!(last.stage, "uv");
    assert_eq!(last.from.as_deref(), Some("blockout"));

    let history = engine.get_history(10);
    assert_eq!(history.len(), 3);
    assert_eq!(history[0].action, HistoryAction::Transition);
    assert_eq!(history[0].from.as_deref(), Some("blockout"));
    assert_eq!(history[0].to.as_deref(), Some("uv"));
}

#[test]
fn test_backward_transitions_always_allowed() {
    let mut engine = engine();
    let id = engine
        .create_asset(NewAsset::named("Rifle").with_stage("export"))
        .unwrap()
        .id;

    let stages: Vec<String> = engine.list_stages().iter().map(|s| s.id.clone()).collect();
    for earlier in &stages[..stages.len() - 1] {
        assert!(engine.can_transition(id.as_str(), earlier), "{}", earlier);
    }
    assert!(!engine.can_transition(id.as_str(), "export"));
}

#[test]
fn test_advance_at_final_stage_is_noop() {
    let mut engine = engine();
    let id = engine
        .create_asset(NewAsset::named("Done").with_stage("export"))
        .unwrap()
        .id;
    let before = engine.get_asset(id.as_str()).unwrap().clone();
    let history_len = engine.get_history(100).len();
    let events = record_all(&mut engine);

    assert!(engine.advance_stage(id.as_str()).unwrap().is_none());

    let after = engine.get_asset(id.as_str()).unwrap();
    assert_eq!(after, &before);
    assert_eq!(after.updated_at, before.updated_at);
    assert_eq!(engine.get_history(100).len(), history_len);
    assert!(events.borrow().is_empty());
}

#[test]
fn test_stats_match_assets() {
    let mut engine = engine();
    engine
        .create_asset(NewAsset::named("A").with_type("weapon").with_stage("uv"))
        .unwrap();
    engine
        .create_asset(NewAsset::named("B").with_type("weapon").with_stage("export"))
        .unwrap();
    engine
        .create_asset(NewAsset::named("C").with_stage("uv"))
        .unwrap();

    let stats = engine.get_stats();

    assert_eq!(stats.total, 3);
    assert_eq!(stats.by_stage["uv"], 2);
    assert_eq!(stats.by_stage["export"], 1);
    assert_eq!(stats.by_stage["concept"], 0);
    assert_eq!(stats.by_stage.len(), 8);
    assert_eq!(stats.by_type["weapon"], 2);
    assert_eq!(stats.by_type["prop"], 1);
    assert_eq!(stats.by_type["vehicle"], 0);
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.by_stage.values().sum::<usize>(), stats.total);
}

#[test]
fn test_seven_advances_reach_export() {
    let mut engine = engine();
    let id = create(&mut engine, "Hover Vehicle");

    for _ in 0..7 {
        assert!(engine.advance_stage(id.as_str()).unwrap().is_some());
    }

    let asset = engine.get_asset(id.as_str()).unwrap();
    assert_eq!(asset.stage, "export");
    assert_eq!(asset.history.len(), 8);
    assert_eq!(engine.get_stats().completed, 1);
    assert!(engine.advance_stage(id.as_str()).unwrap().is_none());
}

#[test]
fn test_dependency_edge_can_be_reversed_after_removal() {
    let mut engine = engine();
    let a = create(&mut engine, "A");
    let b = create(&mut engine, "B");

    assert!(engine.add_dependency(a.as_str(), b.as_str()).unwrap());
    assert!(!engine.add_dependency(b.as_str(), a.as_str()).unwrap());

    assert!(engine.remove_dependency(a.as_str(), b.as_str()).unwrap());
    assert!(!engine.remove_dependency(a.as_str(), b.as_str()).unwrap());

    assert!(engine.add_dependency(b.as_str(), a.as_str()).unwrap());
    assert_eq!(
        engine.get_asset(b.as_str()).unwrap().dependencies,
        vec![a.clone()]
    );
}

#[test]
fn test_graph_snapshot_edges() {
    let mut engine = engine();
    let base = create(&mut engine, "Base");
    let rifle = engine
        .create_asset(NewAsset::named("Rifle").with_stage("bake").with_dependency(base.clone()))
        .unwrap()
        .id;

    let graph = engine.build_graph_snapshot();

    assert_eq!(graph.nodes.len(), 2);
    assert_eq!(graph.nodes[1].id, rifle);
    assert_eq!(graph.nodes[1].stage_info.as_ref().unwrap().name, "Baking");
    assert_eq!(graph.edges.len(), 1);
    assert_eq!(graph.edges[0].source, base);
    assert_eq!(graph.edges[0].target, rifle);
}

#[test]
fn test_mutations_refresh_updated_at() {
    let mut engine = engine();
    let a = create(&mut engine, "A");
    let b = create(&mut engine, "B");
    let created_at = engine.get_asset(a.as_str()).unwrap().created_at;

    let mut last = engine.get_asset(a.as_str()).unwrap().updated_at;
    let mut check = |engine: &PipelineEngine, label: &str| {
        let asset = engine.get_asset(a.as_str()).unwrap();
        assert!(asset.updated_at > last, "{} did not refresh updated_at", label);
        assert_eq!(asset.created_at, created_at, "{} changed created_at", label);
        last = asset.updated_at;
    };

    sleep(Duration::from_millis(5));
    assert!(engine.add_dependency(a.as_str(), b.as_str()).unwrap());
    check(&engine, "add_dependency");

    sleep(Duration::from_millis(5));
    assert!(engine.remove_dependency(a.as_str(), b.as_str()).unwrap());
    check(&engine, "remove_dependency");

    sleep(Duration::from_millis(5));
    assert!(engine.transition_to(a.as_str(), "uv").unwrap().is_some());
    check(&engine, "transition_to");

    sleep(Duration::from_millis(5));
    assert!(engine
        .update_asset(a.as_str(), AssetPatch::default().notes("Second pass"))
        .unwrap()
        .is_some());
    check(&engine, "update_asset");

    // Deleting B purges A's edge and refreshes A
    sleep(Duration::from_millis(5));
    assert!(engine.add_dependency(a.as_str(), b.as_str()).unwrap());
    check(&engine, "add_dependency again");
    sleep(Duration::from_millis(5));
    assert!(engine.delete_asset(b.as_str()).unwrap());
    check(&engine, "delete_asset");
    assert!(engine.get_asset(a.as_str()).unwrap().dependencies.is_empty());
}
