//! C4: Versioning Engine.
//!
//! Applies the differ's result: mints fresh logical ids for every changed
//! node, rebuilds edges and ancestry paths against the (possibly new) ids,
//! and restamps `root_logical_id`/`root_live_id` everywhere. Rekeying never
//! mutates the tree handed in, it builds an entirely new [`Tree`] value, so
//! a failed publish (this function does not fail, but its caller's writer
//! lock acquisition might) never leaves a half-rekeyed tree visible.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use store_core_types::{LiveId, LogicalId};

use crate::diff::Diff;
use crate::entity::EntityHandle;
use crate::tree::{Edge, FieldSlot, Tree};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    Unchanged,
    NewVersion {
        old_root: Option<LogicalId>,
        new_root: LogicalId,
        changed_count: usize,
    },
}

pub struct Versioned {
    pub tree: Tree,
    pub outcome: PublishOutcome,
}

/// Apply rekey-on-change to `new_tree` given the diff against `old_tree`.
pub fn apply_versioning(new_tree: Tree, old_tree: Option<&Tree>, diff: &Diff) -> Versioned {
    if diff.changed_ids.is_empty() {
        if let Some(old) = old_tree {
            return Versioned {
                tree: old.clone(),
                outcome: PublishOutcome::Unchanged,
            };
        }
    }

    let now = Utc::now();
    let mut id_remap: HashMap<LogicalId, LogicalId> = HashMap::new();
    let mut rekeyed_nodes: HashMap<LogicalId, EntityHandle> = HashMap::new();

    for (&id, handle) in &new_tree.nodes {
        if diff.changed_ids.contains(&id) {
            let mut cloned = handle.clone_boxed();
            let new_id = LogicalId::new();
            {
                let header = cloned.header_mut();
                header.previous_logical_id = Some(header.logical_id);
                header.logical_id = new_id;
                header.forked_at = Some(now);
            }
            id_remap.insert(id, new_id);
            rekeyed_nodes.insert(new_id, Arc::from(cloned));
        } else {
            id_remap.insert(id, id);
            rekeyed_nodes.insert(id, handle.clone());
        }
    }

    let new_root_id = id_remap[&new_tree.root_logical_id];
    let new_root_live_id: LiveId = rekeyed_nodes[&new_root_id].header().live_id;

    let edges: Vec<Edge> = new_tree
        .edges
        .iter()
        .map(|e| Edge {
            parent: id_remap[&e.parent],
            slot: FieldSlot {
                field: e.slot.field,
                key: e.slot.key.clone(),
            },
            child: id_remap[&e.child],
        })
        .collect();

    let ancestry_paths: HashMap<LogicalId, Vec<LogicalId>> = new_tree
        .ancestry_paths
        .iter()
        .map(|(id, path)| {
            let new_id = id_remap[id];
            let new_path = path.iter().map(|p| id_remap[p]).collect::<Vec<_>>();
            (new_id, new_path)
        })
        .collect();

    let mut final_nodes: HashMap<LogicalId, EntityHandle> = HashMap::with_capacity(rekeyed_nodes.len());
    for (id, handle) in rekeyed_nodes {
        let mut cloned = handle.clone_boxed();
        {
            let header = cloned.header_mut();
            header.root_logical_id = new_root_id;
            header.root_live_id = new_root_live_id;
        }
        final_nodes.insert(id, Arc::from(cloned));
    }

    let node_count = final_nodes.len();
    let tree = Tree {
        root_logical_id: new_root_id,
        nodes: final_nodes,
        edges,
        ancestry_paths,
        node_count,
        max_depth: new_tree.max_depth,
    };

    let old_root = old_tree.map(|t| t.root_logical_id);
    let changed_count = diff.changed_ids.len();

    Versioned {
        tree,
        outcome: PublishOutcome::NewVersion {
            old_root,
            new_root: new_root_id,
            changed_count,
        },
    }
}
