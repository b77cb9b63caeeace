//! C5: Entity Registry.
//!
//! The single authoritative in-process store of published snapshots.
//! Publication (C4) is serialized under one writer lock so index updates
//! are atomic; reads never take that lock and always observe a fully
//! published snapshot.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value as Json;
use tokio::sync::RwLock;

use store_core::{
    apply_versioning, build_tree, compute_diff, EntityHandle, PublishOutcome, RootLookup, Tree, Versioned,
};
use store_core_types::{LineageId, LiveId, LogicalId};
use store_errors::CoreError;
use store_events::{event_type, Event, EventBus, EventContext, EventPhase};
use store_logging::{log_op_end, log_op_start};

/// An event correlated to whatever [`EventContext`] the call is already
/// nested under (set up by `store-callable`'s `function.executing` scope),
/// or a fresh, parentless one when publishing happens outside any call.
fn scoped_event(event_type: &str, phase: EventPhase) -> Event {
    match EventContext::current() {
        Some((parent_id, lineage_id)) => Event::child_of(parent_id, lineage_id, event_type, phase),
        None => Event::new(event_type, phase),
    }
}

#[derive(Default)]
struct RegistryIndices {
    tree_by_root: HashMap<LogicalId, Arc<Tree>>,
    lineage_chain: HashMap<LineageId, Vec<LogicalId>>,
    live_index: HashMap<LiveId, EntityHandle>,
    logical_to_root: HashMap<LogicalId, LogicalId>,
    type_index: HashMap<&'static str, HashSet<LineageId>>,
}

/// Build the `entity.versioned` completion event for a versioning outcome:
/// `changed_count` plus the old→new root mapping when a new version was
/// minted, matching the original system's `EntityVersionedEvent` payload.
fn versioned_event(outcome: &PublishOutcome, duration_ms: u64) -> Event {
    let event = scoped_event(event_type::ENTITY_VERSIONED, EventPhase::Completed).with_duration_ms(duration_ms);
    match *outcome {
        PublishOutcome::NewVersion { old_root, new_root, changed_count } => {
            let mut event = event
                .with_metadata("changed_count", Json::from(changed_count))
                .with_metadata("new_root", Json::from(new_root.to_string()))
                .with_subject(new_root);
            if let Some(old_root) = old_root {
                event = event.with_metadata("old_root", Json::from(old_root.to_string()));
            }
            event
        }
        PublishOutcome::Unchanged => event.with_metadata("changed_count", Json::from(0)),
    }
}

struct IndicesLookup<'a>(&'a RegistryIndices);

impl RootLookup for IndicesLookup<'_> {
    fn is_known_root(&self, id: LogicalId) -> bool {
        self.0.tree_by_root.contains_key(&id)
    }
}

/// The indexed store of published snapshots. One value is
/// threaded through the core; tests instantiate independent registries.
pub struct Registry {
    indices: RwLock<RegistryIndices>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            indices: RwLock::new(RegistryIndices::default()),
        }
    }

    /// Publish `root` as the next snapshot of its lineage, applying
    /// rekey-on-change (C2 → C3 → C4). Emits `tree.building`/`tree.built`,
    /// `changes.detecting`/`changes.detected`, and
    /// `entity.versioning`/`entity.versioned` around each step, correlated to
    /// the ambient `function.executing` event when called from inside one.
    pub async fn publish(&self, root: EntityHandle, bus: &EventBus) -> Result<PublishOutcome, CoreError> {
        log_op_start!("publish");
        let started = Instant::now();
        let lineage_id = root.header().lineage_id;
        let type_name = root.type_name();

        bus.emit(scoped_event(event_type::TREE_BUILDING, EventPhase::Started)).await?;
        let build_started = Instant::now();
        let (old_tree, new_tree) = {
            let guard = self.indices.read().await;
            let old_tree = guard
                .lineage_chain
                .get(&lineage_id)
                .and_then(|chain| chain.last())
                .and_then(|root_id| guard.tree_by_root.get(root_id))
                .cloned();
            let lookup = IndicesLookup(&guard);
            let new_tree = build_tree(root, &lookup)?;
            (old_tree, new_tree)
        };
        bus.emit(
            scoped_event(event_type::TREE_BUILT, EventPhase::Completed)
                .with_metadata("node_count", Json::from(new_tree.node_count))
                .with_duration_ms(build_started.elapsed().as_millis() as u64),
        )
        .await?;

        bus.emit(scoped_event(event_type::CHANGES_DETECTING, EventPhase::Started)).await?;
        let diff_started = Instant::now();
        let diff = compute_diff(&new_tree, old_tree.as_deref());
        bus.emit(
            scoped_event(event_type::CHANGES_DETECTED, EventPhase::Completed)
                .with_metadata("changed_count", Json::from(diff.changed_ids.len()))
                .with_duration_ms(diff_started.elapsed().as_millis() as u64),
        )
        .await?;

        bus.emit(scoped_event(event_type::ENTITY_VERSIONING, EventPhase::Started)).await?;
        let version_started = Instant::now();
        let versioned = apply_versioning(new_tree, old_tree.as_deref(), &diff);
        bus.emit(versioned_event(&versioned.outcome, version_started.elapsed().as_millis() as u64)).await?;

        if matches!(versioned.outcome, PublishOutcome::Unchanged) {
            log_op_end!("publish", duration_ms = started.elapsed().as_millis() as u64);
            return Ok(versioned.outcome);
        }

        let tree = Arc::new(versioned.tree);
        {
            let mut guard = self.indices.write().await;
            for (&id, handle) in &tree.nodes {
                guard.logical_to_root.insert(id, tree.root_logical_id);
                guard.live_index.insert(handle.header().live_id, handle.clone());
            }
            guard.tree_by_root.insert(tree.root_logical_id, tree.clone());
            guard
                .lineage_chain
                .entry(lineage_id)
                .or_default()
                .push(tree.root_logical_id);
            guard.type_index.entry(type_name).or_default().insert(lineage_id);
        }

        log_op_end!("publish", duration_ms = started.elapsed().as_millis() as u64);
        Ok(versioned.outcome)
    }

    /// Publish several roots produced by the same call, cross-linking the
    /// ones that actually mint a new version via `sibling_output_logical_ids`
    /// before any of them become visible to readers. Used for multi-entity
    /// function outputs (tuple/collection returns) where siblings must
    /// reference each other's *final*, post-rekey logical ids.
    pub async fn publish_linked(&self, roots: Vec<EntityHandle>, bus: &EventBus) -> Result<Vec<PublishOutcome>, CoreError> {
        log_op_start!("publish_linked");
        let started = Instant::now();

        let mut prepared: Vec<(LineageId, &'static str, Versioned)> = Vec::with_capacity(roots.len());
        {
            let guard = self.indices.read().await;
            let lookup = IndicesLookup(&guard);
            for root in roots {
                let lineage_id = root.header().lineage_id;
                let type_name = root.type_name();
                let old_tree = guard
                    .lineage_chain
                    .get(&lineage_id)
                    .and_then(|chain| chain.last())
                    .and_then(|root_id| guard.tree_by_root.get(root_id))
                    .cloned();

                bus.emit(scoped_event(event_type::TREE_BUILDING, EventPhase::Started)).await?;
                let build_started = Instant::now();
                let new_tree = build_tree(root, &lookup)?;
                bus.emit(
                    scoped_event(event_type::TREE_BUILT, EventPhase::Completed)
                        .with_metadata("node_count", Json::from(new_tree.node_count))
                        .with_duration_ms(build_started.elapsed().as_millis() as u64),
                )
                .await?;

                bus.emit(scoped_event(event_type::CHANGES_DETECTING, EventPhase::Started)).await?;
                let diff_started = Instant::now();
                let diff = compute_diff(&new_tree, old_tree.as_deref());
                bus.emit(
                    scoped_event(event_type::CHANGES_DETECTED, EventPhase::Completed)
                        .with_metadata("changed_count", Json::from(diff.changed_ids.len()))
                        .with_duration_ms(diff_started.elapsed().as_millis() as u64),
                )
                .await?;

                bus.emit(scoped_event(event_type::ENTITY_VERSIONING, EventPhase::Started)).await?;
                let version_started = Instant::now();
                let versioned = apply_versioning(new_tree, old_tree.as_deref(), &diff);
                bus.emit(versioned_event(&versioned.outcome, version_started.elapsed().as_millis() as u64)).await?;

                prepared.push((lineage_id, type_name, versioned));
            }
        }

        let final_ids: Vec<LogicalId> = prepared
            .iter()
            .filter_map(|(_, _, v)| match v.outcome {
                PublishOutcome::NewVersion { new_root, .. } => Some(new_root),
                PublishOutcome::Unchanged => None,
            })
            .collect();

        for (_, _, versioned) in prepared.iter_mut() {
            if let PublishOutcome::NewVersion { new_root, .. } = versioned.outcome {
                if let Some(handle) = versioned.tree.nodes.get(&new_root).cloned() {
                    let siblings: BTreeSet<LogicalId> =
                        final_ids.iter().copied().filter(|id| *id != new_root).collect();
                    let mut cloned = handle.clone_boxed();
                    cloned.header_mut().sibling_output_logical_ids = siblings;
                    versioned.tree.nodes.insert(new_root, Arc::from(cloned));
                }
            }
        }

        let mut outcomes = Vec::with_capacity(prepared.len());
        {
            let mut guard = self.indices.write().await;
            for (lineage_id, type_name, versioned) in prepared {
                if let PublishOutcome::NewVersion { .. } = versioned.outcome {
                    let tree = Arc::new(versioned.tree);
                    for (&id, handle) in &tree.nodes {
                        guard.logical_to_root.insert(id, tree.root_logical_id);
                        guard.live_index.insert(handle.header().live_id, handle.clone());
                    }
                    guard.tree_by_root.insert(tree.root_logical_id, tree.clone());
                    guard
                        .lineage_chain
                        .entry(lineage_id)
                        .or_default()
                        .push(tree.root_logical_id);
                    guard.type_index.entry(type_name).or_default().insert(lineage_id);
                }
                outcomes.push(versioned.outcome);
            }
        }

        log_op_end!("publish_linked", duration_ms = started.elapsed().as_millis() as u64);
        Ok(outcomes)
    }

    pub async fn get_tree(&self, root_logical_id: LogicalId) -> Option<Arc<Tree>> {
        self.indices.read().await.tree_by_root.get(&root_logical_id).cloned()
    }

    pub async fn get_latest_tree(&self, lineage_id: LineageId) -> Option<Arc<Tree>> {
        let guard = self.indices.read().await;
        let root_id = guard.lineage_chain.get(&lineage_id)?.last().copied()?;
        guard.tree_by_root.get(&root_id).cloned()
    }

    pub async fn get_entity(&self, root_logical_id: LogicalId, logical_id: LogicalId) -> Option<EntityHandle> {
        let guard = self.indices.read().await;
        guard.tree_by_root.get(&root_logical_id)?.nodes.get(&logical_id).cloned()
    }

    pub async fn find_root_of(&self, logical_id: LogicalId) -> Option<LogicalId> {
        self.indices.read().await.logical_to_root.get(&logical_id).copied()
    }

    pub async fn lineage_history(&self, lineage_id: LineageId) -> Vec<LogicalId> {
        self.indices
            .read()
            .await
            .lineage_chain
            .get(&lineage_id)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn live_lookup(&self, live_id: LiveId) -> Option<EntityHandle> {
        self.indices.read().await.live_index.get(&live_id).cloned()
    }

    pub async fn lineages_of_type(&self, type_name: &str) -> HashSet<LineageId> {
        self.indices
            .read()
            .await
            .type_index
            .get(type_name)
            .cloned()
            .unwrap_or_default()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
