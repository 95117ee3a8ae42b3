//! Dependency graph traversal and snapshots.
//!
//! Edges point from an asset to each of its prerequisites. The engine keeps
//! this relation acyclic by asking [`would_create_cycle`] before every
//! insertion.

use std::collections::{HashMap, HashSet};

use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};

use crate::domain::{Asset, AssetId};

use super::pipeline::{PipelineDefinition, Stage};

/// Whether `target` can be reached from `start` by following dependencies.
///
/// Iterative depth-first search; O(V + E). A node reaches itself.
pub fn reaches(assets: &HashMap<AssetId, Asset>, start: &str, target: &str) -> bool {
    let mut visited: HashSet<&str> = HashSet::new();
    let mut stack = vec![start];

    while let Some(current) = stack.pop() {
        if current == target {
            return true;
        }
        if !visited.insert(current) {
            continue;
        }
        if let Some(asset) = assets.get(current) {
            stack.extend(asset.dependencies.iter().map(AssetId::as_str));
        }
    }

    false
}

/// Whether adding the edge `asset_id -> depends_on_id` would close a cycle
pub fn would_create_cycle(
    assets: &HashMap<AssetId, Asset>,
    asset_id: &str,
    depends_on_id: &str,
) -> bool {
    reaches(assets, depends_on_id, asset_id)
}

/// Find an asset on a dependency cycle, if the relation has one.
///
/// Builds a petgraph `DiGraph` and runs a topological sort; O(V + E).
/// Edges to unknown assets are ignored.
pub fn find_cycle(assets: &HashMap<AssetId, Asset>) -> Option<AssetId> {
    let mut graph: DiGraph<&AssetId, ()> = DiGraph::with_capacity(assets.len(), assets.len());
    let index: HashMap<&str, NodeIndex> = assets
        .keys()
        .map(|id| (id.as_str(), graph.add_node(id)))
        .collect();

    for (id, asset) in assets {
        let from = index[id.as_str()];
        for dep in &asset.dependencies {
            if let Some(&to) = index.get(dep.as_str()) {
                graph.add_edge(from, to, ());
            }
        }
    }

    petgraph::algo::toposort(&graph, None)
        .err()
        .map(|cycle| graph[cycle.node_id()].clone())
}

/// Read-only view of the dependency graph for rendering
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

/// One asset in a [`GraphSnapshot`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: AssetId,
    pub name: String,
    #[serde(rename = "type")]
    pub asset_type: String,
    pub stage: String,
    pub stage_info: Option<Stage>,
}

/// A dependency, directed from the depended-upon asset to the dependent one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: AssetId,
    pub target: AssetId,
}

impl GraphSnapshot {
    /// Build a snapshot from assets in display order
    pub fn build<'a>(
        pipeline: &PipelineDefinition,
        assets: impl IntoIterator<Item = &'a Asset>,
    ) -> Self {
        let mut snapshot = Self::default();

        for asset in assets {
            snapshot.nodes.push(GraphNode {
                id: asset.id.clone(),
                name: asset.name.clone(),
                asset_type: asset.asset_type.clone(),
                stage: asset.stage.clone(),
                stage_info: pipeline.stage(&asset.stage).cloned(),
            });

            for dep in &asset.dependencies {
                snapshot.edges.push(GraphEdge {
                    source: dep.clone(),
                    target: asset.id.clone(),
                });
            }
        }

        snapshot
    }
}
