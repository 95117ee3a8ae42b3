//! The pipeline engine.
//!
//! Owns the asset store, the dependency graph, the audit history and the
//! subscriber list. Every mutating operation runs to completion before it
//! returns: mutate, record history, persist the snapshot, then notify
//! subscribers.
//!
//! Lookups of unknown assets or stages are not errors; they yield `None` or
//! `false`. [`EngineError`] is reserved for invalid caller input and
//! persistence failures.

use std::collections::{HashMap, HashSet};

use anyhow::Context;
use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::domain::{
    Asset, AssetId, AssetPatch, EngineEvent, EventKind, HistoryAction, HistoryEntry, HistoryLog,
    NewAsset, StageEvent,
};

use super::bus::{EventBus, SubscriptionId};
use super::graph::{self, GraphSnapshot};
use super::pipeline::{AssetType, PipelineDefinition, Stage};
use super::stats::PipelineStats;
use super::storage::{Snapshot, StorageError, StorageSlot, STORAGE_KEY};

/// Errors returned by engine operations
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid pipeline definition: {0}")]
    InvalidPipeline(String),

    #[error("Unknown stage: {0}")]
    UnknownStage(String),

    #[error("Unknown asset type: {0}")]
    UnknownAssetType(String),

    #[error("Unknown asset: {0}")]
    UnknownAsset(AssetId),

    #[error("Asset already exists: {0}")]
    DuplicateAsset(AssetId),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Why a dependency edge was refused
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DependencyRejection {
    #[error("Unknown asset: {0}")]
    UnknownAsset(AssetId),

    #[error("An asset cannot depend on itself")]
    SelfDependency,

    #[error("Dependency already exists")]
    AlreadyExists,

    #[error("Dependency would create a cycle")]
    WouldCreateCycle,
}

/// In-memory asset pipeline state machine with a durable snapshot
pub struct PipelineEngine {
    pipeline: PipelineDefinition,

    assets: HashMap<AssetId, Asset>,

    /// Asset ids in insertion order
    order: Vec<AssetId>,

    history: HistoryLog,

    slot: Box<dyn StorageSlot>,

    bus: EventBus,
}

impl std::fmt::Debug for PipelineEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineEngine")
            .field("pipeline", &self.pipeline.name)
            .field("assets", &self.assets.len())
            .field("history", &self.history.len())
            .field("bus", &self.bus)
            .finish()
    }
}

impl PipelineEngine {
    /// Create an empty engine. Prior state is not loaded until [`init`](Self::init).
    pub fn new(
        pipeline: PipelineDefinition,
        slot: impl StorageSlot + 'static,
    ) -> Result<Self, EngineError> {
        pipeline
            .validate()
            .map_err(|e| EngineError::InvalidPipeline(format!("{:#}", e)))?;

        Ok(Self {
            pipeline,
            assets: HashMap::new(),
            order: Vec::new(),
            history: HistoryLog::new(),
            slot: Box::new(slot),
            bus: EventBus::new(),
        })
    }

    /// Create an engine and load prior state from `slot`
    pub fn open(
        pipeline: PipelineDefinition,
        slot: impl StorageSlot + 'static,
    ) -> Result<Self, EngineError> {
        let mut engine = Self::new(pipeline, slot)?;
        engine.init();
        Ok(engine)
    }

    /// Load prior state and announce `initialized`
    pub fn init(&mut self) {
        self.restore();
        info!(
            pipeline = %self.pipeline.name,
            assets = self.assets.len(),
            "Pipeline engine initialized"
        );
        self.emit(EngineEvent::Initialized {
            pipeline: self.pipeline.name.clone(),
            asset_count: self.assets.len(),
        });
    }

    // ------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------

    pub fn pipeline(&self) -> &PipelineDefinition {
        &self.pipeline
    }

    pub fn list_stages(&self) -> &[Stage] {
        self.pipeline.stages()
    }

    pub fn get_stage(&self, id: &str) -> Option<&Stage> {
        self.pipeline.stage(id)
    }

    pub fn list_asset_types(&self) -> &[AssetType] {
        self.pipeline.asset_types()
    }

    pub fn is_sanctioned_forward(&self, from: &str, to: &str) -> bool {
        self.pipeline.is_sanctioned_forward(from, to)
    }

    // ------------------------------------------------------------------
    // Asset store
    // ------------------------------------------------------------------

    /// Register a new asset
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub fn create_asset(&mut self, input: NewAsset) -> Result<Asset, EngineError> {
        let id = input.id.unwrap_or_else(AssetId::generate);
        if self.assets.contains_key(&id) {
            return Err(EngineError::DuplicateAsset(id));
        }

        let asset_type = match input.asset_type {
            Some(t) if self.pipeline.asset_type(&t).is_none() => {
                return Err(EngineError::UnknownAssetType(t))
            }
            Some(t) => t,
            None => self.pipeline.default_asset_type().id.clone(),
        };

        let stage = match input.stage {
            Some(s) if self.pipeline.stage(&s).is_none() => return Err(EngineError::UnknownStage(s)),
            Some(s) => s,
            None => self.pipeline.first_stage().id.clone(),
        };

        let mut dependencies: Vec<AssetId> = Vec::with_capacity(input.dependencies.len());
        for dep in input.dependencies {
            if !self.assets.contains_key(&dep) {
                return Err(EngineError::UnknownAsset(dep));
            }
            if !dependencies.contains(&dep) {
                dependencies.push(dep);
            }
        }

        let now = Utc::now();
        let asset = Asset {
            id: id.clone(),
            name: input.name,
            asset_type,
            stage: stage.clone(),
            dependencies,
            created_at: now,
            updated_at: now,
            history: vec![StageEvent::created(stage)],
            notes: input.notes,
            metadata: input.metadata,
        };

        self.assets.insert(id.clone(), asset.clone());
        self.order.push(id.clone());
        self.history.push(HistoryEntry::new(HistoryAction::Create, &asset));
        self.persist()?;

        info!(asset_id = %id, stage = %asset.stage, "Asset created");
        self.emit(EngineEvent::AssetCreated(asset.clone()));
        Ok(asset)
    }

    pub fn get_asset(&self, id: &str) -> Option<&Asset> {
        self.assets.get(id)
    }

    /// All assets in insertion order
    pub fn list_assets(&self) -> Vec<&Asset> {
        self.ordered().collect()
    }

    pub fn list_assets_by_stage(&self, stage: &str) -> Vec<&Asset> {
        self.ordered().filter(|a| a.stage == stage).collect()
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// Merge descriptive fields into an asset. `None` if the asset is unknown.
    ///
    /// Only name, type, notes and metadata are patchable. The stage changes
    /// through [`transition_to`](Self::transition_to) and
    /// [`advance_stage`](Self::advance_stage), and dependencies through
    /// [`add_dependency`](Self::add_dependency) and
    /// [`remove_dependency`](Self::remove_dependency), so stage history and
    /// graph acyclicity cannot be bypassed.
    #[instrument(skip(self, patch), fields(asset_id = %id))]
    pub fn update_asset(
        &mut self,
        id: &str,
        patch: AssetPatch,
    ) -> Result<Option<Asset>, EngineError> {
        if !self.assets.contains_key(id) {
            return Ok(None);
        }
        if let Some(ref t) = patch.asset_type {
            if self.pipeline.asset_type(t).is_none() {
                return Err(EngineError::UnknownAssetType(t.clone()));
            }
        }

        let updated = match self.assets.get_mut(id) {
            Some(asset) => {
                patch.apply(asset);
                asset.touch();
                asset.clone()
            }
            None => return Ok(None),
        };
        self.persist()?;

        debug!("Asset updated");
        self.emit(EngineEvent::AssetUpdated(updated.clone()));
        Ok(Some(updated))
    }

    /// Remove an asset and every dependency edge pointing at it
    #[instrument(skip(self), fields(asset_id = %id))]
    pub fn delete_asset(&mut self, id: &str) -> Result<bool, EngineError> {
        let Some(asset) = self.assets.remove(id) else {
            return Ok(false);
        };
        self.order.retain(|o| o.as_str() != id);

        let mut purged = 0;
        for other in self.assets.values_mut() {
            if other.depends_on(id) {
                other.dependencies.retain(|d| d.as_str() != id);
                other.touch();
                purged += 1;
            }
        }

        self.history.push(HistoryEntry::new(HistoryAction::Delete, &asset));
        self.persist()?;

        info!(purged_references = purged, "Asset deleted");
        self.emit(EngineEvent::AssetDeleted {
            id: asset.id.clone(),
            asset,
        });
        Ok(true)
    }

    // ------------------------------------------------------------------
    // Stage transitions
    // ------------------------------------------------------------------

    /// Whether moving the asset to `to` is sanctioned: a configured forward
    /// transition, or any move to an earlier stage.
    pub fn can_transition(&self, id: &str, to: &str) -> bool {
        let Some(asset) = self.assets.get(id) else {
            return false;
        };
        let (Some(current), Some(target)) = (
            self.pipeline.stage_index(&asset.stage),
            self.pipeline.stage_index(to),
        ) else {
            return false;
        };

        self.pipeline.is_sanctioned_forward(&asset.stage, to) || target < current
    }

    /// Move an asset to `to`.
    ///
    /// Does not consult [`can_transition`](Self::can_transition); callers
    /// gate moves themselves. `None` if the asset or stage is unknown.
    #[instrument(skip(self), fields(asset_id = %id))]
    pub fn transition_to(&mut self, id: &str, to: &str) -> Result<Option<Asset>, EngineError> {
        if self.pipeline.stage(to).is_none() {
            debug!(stage = to, "Transition to unknown stage ignored");
            return Ok(None);
        }
        let Some(asset) = self.assets.get_mut(id) else {
            return Ok(None);
        };

        let from = std::mem::replace(&mut asset.stage, to.to_string());
        asset.touch();
        asset.history.push(StageEvent::transition(from.clone(), to));
        let moved = asset.clone();

        self.history
            .push(HistoryEntry::new(HistoryAction::Transition, &moved).with_stages(&from, to));
        self.persist()?;

        info!(from = %from, to = %to, "Stage changed");
        self.emit(EngineEvent::StageChanged {
            asset: moved.clone(),
            from,
            to: to.to_string(),
        });
        Ok(Some(moved))
    }

    /// Move an asset to the next stage in canonical order.
    ///
    /// `None` (and no mutation) if the asset is unknown or already in the
    /// last stage.
    pub fn advance_stage(&mut self, id: &str) -> Result<Option<Asset>, EngineError> {
        let Some(asset) = self.assets.get(id) else {
            return Ok(None);
        };
        let Some(next) = self.pipeline.next_stage(&asset.stage) else {
            debug!(asset_id = %id, stage = %asset.stage, "Asset already at final stage");
            return Ok(None);
        };

        let next = next.id.clone();
        self.transition_to(id, &next)
    }

    // ------------------------------------------------------------------
    // Dependency graph
    // ------------------------------------------------------------------

    /// Explain whether `asset_id -> depends_on_id` may be added
    pub fn check_dependency(
        &self,
        asset_id: &str,
        depends_on_id: &str,
    ) -> Result<(), DependencyRejection> {
        let asset = self
            .assets
            .get(asset_id)
            .ok_or_else(|| DependencyRejection::UnknownAsset(AssetId::from(asset_id)))?;
        if !self.assets.contains_key(depends_on_id) {
            return Err(DependencyRejection::UnknownAsset(AssetId::from(depends_on_id)));
        }
        if asset.depends_on(depends_on_id) {
            return Err(DependencyRejection::AlreadyExists);
        }
        if asset_id == depends_on_id {
            return Err(DependencyRejection::SelfDependency);
        }
        if self.would_create_cycle(asset_id, depends_on_id) {
            return Err(DependencyRejection::WouldCreateCycle);
        }
        Ok(())
    }

    /// Make `asset_id` depend on `depends_on_id`.
    ///
    /// Returns `false` without mutating anything when the edge is refused;
    /// see [`check_dependency`](Self::check_dependency) for the reason.
    #[instrument(skip(self), fields(asset_id = %asset_id, depends_on = %depends_on_id))]
    pub fn add_dependency(
        &mut self,
        asset_id: &str,
        depends_on_id: &str,
    ) -> Result<bool, EngineError> {
        if let Err(rejection) = self.check_dependency(asset_id, depends_on_id) {
            debug!(%rejection, "Dependency rejected");
            return Ok(false);
        }

        let dependency = match self.assets.get(depends_on_id) {
            Some(d) => d.clone(),
            None => return Ok(false),
        };
        let asset = match self.assets.get_mut(asset_id) {
            Some(asset) => {
                asset.dependencies.push(dependency.id.clone());
                asset.touch();
                asset.clone()
            }
            None => return Ok(false),
        };
        self.persist()?;

        debug!("Dependency added");
        self.emit(EngineEvent::DependencyAdded { asset, dependency });
        Ok(true)
    }

    /// Drop the edge `asset_id -> depends_on_id`. `false` if it does not exist.
    #[instrument(skip(self), fields(asset_id = %asset_id, depends_on = %depends_on_id))]
    pub fn remove_dependency(
        &mut self,
        asset_id: &str,
        depends_on_id: &str,
    ) -> Result<bool, EngineError> {
        let Some(asset) = self.assets.get_mut(asset_id) else {
            return Ok(false);
        };
        let Some(index) = asset
            .dependencies
            .iter()
            .position(|d| d.as_str() == depends_on_id)
        else {
            return Ok(false);
        };

        let removed = asset.dependencies.remove(index);
        asset.touch();
        let asset_id = asset.id.clone();
        self.persist()?;

        debug!("Dependency removed");
        self.emit(EngineEvent::DependencyRemoved {
            asset_id,
            depends_on_id: removed,
        });
        Ok(true)
    }

    /// Whether adding `from_id -> to_id` would close a loop
    pub fn would_create_cycle(&self, from_id: &str, to_id: &str) -> bool {
        graph::would_create_cycle(&self.assets, from_id, to_id)
    }

    /// Assets that may legally become dependencies of `id`: not itself, not
    /// already a dependency, and not something that depends on it.
    pub fn dependency_candidates(&self, id: &str) -> Vec<&Asset> {
        let Some(asset) = self.assets.get(id) else {
            return Vec::new();
        };

        self.ordered()
            .filter(|other| other.id != asset.id)
            .filter(|other| !asset.depends_on(other.id.as_str()))
            .filter(|other| !self.would_create_cycle(id, other.id.as_str()))
            .collect()
    }

    /// Nodes and edges for rendering
    pub fn build_graph_snapshot(&self) -> GraphSnapshot {
        GraphSnapshot::build(&self.pipeline, self.ordered())
    }

    pub fn get_stats(&self) -> PipelineStats {
        PipelineStats::compute(&self.pipeline, self.ordered())
    }

    // ------------------------------------------------------------------
    // History and persistence
    // ------------------------------------------------------------------

    /// Up to `limit` audit entries, most recent first
    pub fn get_history(&self, limit: usize) -> Vec<HistoryEntry> {
        self.history.recent(limit)
    }

    /// The state that [`persist`](Self::persist) writes
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            assets: self.ordered().map(|a| (a.id.clone(), a.clone())).collect(),
            history: self.history.clone(),
        }
    }

    /// Write the full state to the storage slot
    pub fn persist(&mut self) -> Result<(), EngineError> {
        let snapshot = self.snapshot();
        let json = serde_json::to_string(&snapshot)?;
        self.slot.set(STORAGE_KEY, &json)?;
        debug!(assets = snapshot.assets.len(), bytes = json.len(), "Snapshot persisted");
        Ok(())
    }

    /// Replace in-memory state with the stored snapshot.
    ///
    /// Missing, unreadable or inconsistent data leaves the engine empty.
    /// Returns whether prior state was loaded.
    pub fn restore(&mut self) -> bool {
        self.reset();

        let raw = match self.slot.get(STORAGE_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!("No stored pipeline data");
                return false;
            }
            Err(e) => {
                warn!(error = %e, "Failed to read stored pipeline data, starting empty");
                return false;
            }
        };

        let snapshot = match self.decode_snapshot(&raw) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                let reason = format!("{:#}", e);
                warn!(error = %reason, "Ignoring stored pipeline data");
                return false;
            }
        };

        for (id, asset) in snapshot.assets {
            self.order.push(id.clone());
            self.assets.insert(id, asset);
        }
        self.history = snapshot.history;

        debug!(assets = self.assets.len(), history = self.history.len(), "Snapshot restored");
        true
    }

    /// Erase stored and in-memory state
    #[instrument(skip(self))]
    pub fn clear(&mut self) -> Result<(), EngineError> {
        self.slot.remove(STORAGE_KEY)?;
        self.reset();

        info!("Pipeline data cleared");
        self.emit(EngineEvent::Cleared);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    /// Subscribe to events of `kind`
    pub fn on<F>(&mut self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: FnMut(&EngineEvent) + 'static,
    {
        self.bus.on(kind, handler)
    }

    /// Unsubscribe a handler registered with [`on`](Self::on)
    pub fn off(&mut self, kind: EventKind, id: SubscriptionId) -> bool {
        self.bus.off(kind, id)
    }

    fn emit(&mut self, event: EngineEvent) {
        self.bus.emit(&event);
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn ordered(&self) -> impl Iterator<Item = &Asset> {
        self.order.iter().filter_map(|id| self.assets.get(id))
    }

    fn reset(&mut self) {
        self.assets.clear();
        self.order.clear();
        self.history.clear();
    }

    /// Parse a stored snapshot and check it against the engine invariants
    fn decode_snapshot(&self, raw: &str) -> anyhow::Result<Snapshot> {
        let snapshot: Snapshot =
            serde_json::from_str(raw).context("Stored pipeline data is not a valid snapshot")?;

        let mut seen = HashSet::new();
        for (id, asset) in &snapshot.assets {
            if *id != asset.id {
                anyhow::bail!("Asset key {} does not match asset id {}", id, asset.id);
            }
            if !seen.insert(id.as_str()) {
                anyhow::bail!("Duplicate asset id {}", id);
            }
            if self.pipeline.stage(&asset.stage).is_none() {
                anyhow::bail!("Asset {} is in unknown stage '{}'", id, asset.stage);
            }
        }

        let assets: HashMap<AssetId, Asset> = snapshot
            .assets
            .iter()
            .map(|(id, asset)| (id.clone(), asset.clone()))
            .collect();
        for asset in assets.values() {
            if let Some(dep) = asset.dependencies.iter().find(|d| !assets.contains_key(*d)) {
                anyhow::bail!("Asset {} depends on missing asset {}", asset.id, dep);
            }
        }
        if let Some(id) = graph::find_cycle(&assets) {
            anyhow::bail!("Dependency cycle through asset {}", id);
        }

        Ok(snapshot)
    }
}
