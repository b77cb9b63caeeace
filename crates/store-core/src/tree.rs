//! C2: Tree Builder.
//!
//! Builds an immutable [`Tree`] snapshot from a root entity by breadth-first
//! traversal, detecting cycles and illegal multi-parent containment along
//! the way. The builder is pure: it never mutates its input and never
//! touches the registry beyond the read-only [`RootLookup`] it is given.

use std::collections::{HashMap, VecDeque};

use store_core_types::LogicalId;
use store_errors::{CoreError, CoreErrorKind};

use crate::entity::{EntityHandle, FieldValue, MixedSlot, SlotKey};

/// The field/container slot an edge was reached through.
#[derive(Debug, Clone)]
pub struct FieldSlot {
    pub field: &'static str,
    pub key: Option<SlotKey>,
}

#[derive(Debug, Clone)]
pub struct Edge {
    pub parent: LogicalId,
    pub slot: FieldSlot,
    pub child: LogicalId,
}

/// A frozen reachability graph from one root, plus the indexes
/// requires (`ancestry_paths`, `node_count`, `max_depth`).
#[derive(Debug, Clone)]
pub struct Tree {
    pub root_logical_id: LogicalId,
    pub nodes: HashMap<LogicalId, EntityHandle>,
    pub edges: Vec<Edge>,
    pub ancestry_paths: HashMap<LogicalId, Vec<LogicalId>>,
    pub node_count: usize,
    pub max_depth: usize,
}

impl Tree {
    pub fn get(&self, id: LogicalId) -> Option<&EntityHandle> {
        self.nodes.get(&id)
    }
}

/// Read-only view the builder needs into the registry: whether a given
/// logical id is already the root of some other currently-published tree
/// (embed as a value, don't traverse into it).
pub trait RootLookup {
    fn is_known_root(&self, id: LogicalId) -> bool;
}

/// A `RootLookup` that reports no known roots, for building a tree in
/// isolation (tests, or a fresh registry).
pub struct NoKnownRoots;

impl RootLookup for NoKnownRoots {
    fn is_known_root(&self, _id: LogicalId) -> bool {
        false
    }
}

/// Build an immutable tree from `root` via breadth-first traversal.
pub fn build_tree(root: EntityHandle, root_lookup: &dyn RootLookup) -> Result<Tree, CoreError> {
    let root_id = root.header().logical_id;

    let mut nodes: HashMap<LogicalId, EntityHandle> = HashMap::new();
    let mut edges: Vec<Edge> = Vec::new();
    let mut ancestry_paths: HashMap<LogicalId, Vec<LogicalId>> = HashMap::new();

    nodes.insert(root_id, root.clone());
    ancestry_paths.insert(root_id, vec![root_id]);

    let mut queue: VecDeque<(EntityHandle, Vec<LogicalId>)> = VecDeque::new();
    queue.push_back((root, vec![root_id]));

    let mut max_depth = 0usize;

    while let Some((entity, path)) = queue.pop_front() {
        max_depth = max_depth.max(path.len().saturating_sub(1));
        let parent_id = entity.header().logical_id;

        for desc in entity.field_descriptors() {
            let Some(value) = entity.field_value(desc.name) else {
                continue;
            };

            let children: Vec<(Option<SlotKey>, EntityHandle)> = match value {
                FieldValue::Primitive(_) => continue,
                FieldValue::Entity(child) => vec![(None, child)],
                FieldValue::EntityVec(items) => items
                    .into_iter()
                    .enumerate()
                    .map(|(i, c)| (Some(SlotKey::Index(i)), c))
                    .collect(),
                FieldValue::EntitySet(items) => items
                    .into_iter()
                    .enumerate()
                    .map(|(i, c)| (Some(SlotKey::Index(i)), c))
                    .collect(),
                FieldValue::EntityTuple(items) => items
                    .into_iter()
                    .enumerate()
                    .map(|(i, c)| (Some(SlotKey::Index(i)), c))
                    .collect(),
                FieldValue::EntityMap(items) => items
                    .into_iter()
                    .map(|(k, c)| (Some(SlotKey::Name(k)), c))
                    .collect(),
                FieldValue::Mixed(slots) => slots
                    .into_iter()
                    .enumerate()
                    .filter_map(|(i, slot)| match slot {
                        MixedSlot::Primitive(_) => None,
                        MixedSlot::Entity(c) => Some((Some(SlotKey::Index(i)), c)),
                    })
                    .collect(),
            };

            for (key, child) in children {
                let child_id = child.header().logical_id;
                let child_path = {
                    let mut p = path.clone();
                    p.push(child_id);
                    p
                };

                if let Some(existing_path) = ancestry_paths.get(&child_id) {
                    // Already visited. A back-edge to an ancestor is a cycle;
                    // a second distinct parent path is illegal containment.
                    if path.contains(&child_id) {
                        return Err(CoreError::new(CoreErrorKind::CycleDetected)
                            .with_op("build_tree")
                            .with_logical_id(child_id));
                    }
                    if existing_path != &child_path {
                        return Err(CoreError::new(CoreErrorKind::MultiParentContainment)
                            .with_op("build_tree")
                            .with_logical_id(child_id));
                    }
                    continue;
                }

                edges.push(Edge {
                    parent: parent_id,
                    slot: FieldSlot { field: desc.name, key },
                    child: child_id,
                });

                nodes.insert(child_id, child.clone());
                ancestry_paths.insert(child_id, child_path.clone());

                // Embed-as-value: a child that is itself a known published
                // root is copied in by value but not traversed further.
                if child_id != root_id && root_lookup.is_known_root(child_id) {
                    continue;
                }

                queue.push_back((child, child_path));
            }
        }
    }

    let node_count = nodes.len();

    Ok(Tree {
        root_logical_id: root_id,
        nodes,
        edges,
        ancestry_paths,
        node_count,
        max_depth,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{EntityHeader, FieldDescriptor, FieldKind, IsEntity};
    use serde_json::Value as Json;
    use std::sync::Arc;

    #[derive(Debug, Clone)]
    struct Leaf {
        header: EntityHeader,
        value: i64,
    }

    impl IsEntity for Leaf {
        fn header(&self) -> &EntityHeader {
            &self.header
        }
        fn header_mut(&mut self) -> &mut EntityHeader {
            &mut self.header
        }
        fn type_name(&self) -> &'static str {
            "Leaf"
        }
        fn field_descriptors(&self) -> &'static [FieldDescriptor] {
            const D: [FieldDescriptor; 1] = [FieldDescriptor { name: "value", kind: FieldKind::Primitive }];
            &D
        }
        fn field_value(&self, name: &str) -> Option<FieldValue> {
            match name {
                "value" => Some(FieldValue::Primitive(Json::from(self.value))),
                _ => None,
            }
        }
        fn clone_boxed(&self) -> Box<dyn IsEntity> {
            Box::new(self.clone())
        }
    }

    #[derive(Debug, Clone)]
    struct Parent {
        header: EntityHeader,
        child: EntityHandle,
    }

    impl IsEntity for Parent {
        fn header(&self) -> &EntityHeader {
            &self.header
        }
        fn header_mut(&mut self) -> &mut EntityHeader {
            &mut self.header
        }
        fn type_name(&self) -> &'static str {
            "Parent"
        }
        fn field_descriptors(&self) -> &'static [FieldDescriptor] {
            const D: [FieldDescriptor; 1] = [FieldDescriptor { name: "child", kind: FieldKind::EntityRef }];
            &D
        }
        fn field_value(&self, name: &str) -> Option<FieldValue> {
            match name {
                "child" => Some(FieldValue::Entity(self.child.clone())),
                _ => None,
            }
        }
        fn clone_boxed(&self) -> Box<dyn IsEntity> {
            Box::new(self.clone())
        }
    }

    #[test]
    fn single_node_tree_has_root_ancestry() {
        let leaf = Leaf { header: EntityHeader::new_root(), value: 1 };
        let id = leaf.header.logical_id;
        let tree = build_tree(Arc::new(leaf), &NoKnownRoots).unwrap();
        assert_eq!(tree.root_logical_id, id);
        assert_eq!(tree.node_count, 1);
        assert_eq!(tree.ancestry_paths[&id], vec![id]);
    }

    #[test]
    fn parent_child_tree_builds_ancestry_path() {
        let child = Leaf { header: EntityHeader::new_root(), value: 1 };
        let child_id = child.header.logical_id;
        let parent = Parent { header: EntityHeader::new_root(), child: Arc::new(child) };
        let parent_id = parent.header.logical_id;

        let tree = build_tree(Arc::new(parent), &NoKnownRoots).unwrap();
        assert_eq!(tree.node_count, 2);
        assert_eq!(tree.ancestry_paths[&child_id], vec![parent_id, child_id]);
        assert_eq!(tree.max_depth, 1);
    }

    #[test]
    fn reusing_same_child_through_same_slot_is_fine() {
        // Same child reached twice through the identical path is not an error
        // (e.g. re-traversal via BFS of a diamond collapsing onto one slot).
        let child = Leaf { header: EntityHeader::new_root(), value: 1 };
        let child_id = child.header.logical_id;
        let shared: EntityHandle = Arc::new(child);
        let parent = Parent { header: EntityHeader::new_root(), child: shared };
        let tree = build_tree(Arc::new(parent), &NoKnownRoots).unwrap();
        assert!(tree.nodes.contains_key(&child_id));
    }

    #[derive(Debug, Clone)]
    struct Pair {
        header: EntityHeader,
        left: EntityHandle,
        right: EntityHandle,
    }

    impl IsEntity for Pair {
        fn header(&self) -> &EntityHeader {
            &self.header
        }
        fn header_mut(&mut self) -> &mut EntityHeader {
            &mut self.header
        }
        fn type_name(&self) -> &'static str {
            "Pair"
        }
        fn field_descriptors(&self) -> &'static [FieldDescriptor] {
            const D: [FieldDescriptor; 2] = [
                FieldDescriptor { name: "left", kind: FieldKind::EntityRef },
                FieldDescriptor { name: "right", kind: FieldKind::EntityRef },
            ];
            &D
        }
        fn field_value(&self, name: &str) -> Option<FieldValue> {
            match name {
                "left" => Some(FieldValue::Entity(self.left.clone())),
                "right" => Some(FieldValue::Entity(self.right.clone())),
                _ => None,
            }
        }
        fn clone_boxed(&self) -> Box<dyn IsEntity> {
            Box::new(self.clone())
        }
    }

    struct OnlyRoot(LogicalId);

    impl RootLookup for OnlyRoot {
        fn is_known_root(&self, id: LogicalId) -> bool {
            id == self.0
        }
    }

    // P8: a currently-published root reached through two distinct non-root
    // paths is still multi-parent containment, even though reaching it
    // through exactly one such path is the supported embed-as-value case.
    #[test]
    fn known_root_reached_through_two_paths_is_multi_parent_containment() {
        let shared_root = Leaf { header: EntityHeader::new_root(), value: 1 };
        let shared_id = shared_root.header.logical_id;
        let shared: EntityHandle = Arc::new(shared_root);
        let left = Arc::new(Parent { header: EntityHeader::new_root(), child: shared.clone() });
        let right = Arc::new(Parent { header: EntityHeader::new_root(), child: shared });
        let pair = Pair { header: EntityHeader::new_root(), left, right };
        let err = build_tree(Arc::new(pair), &OnlyRoot(shared_id)).unwrap_err();
        assert_eq!(err.kind(), CoreErrorKind::MultiParentContainment);
    }

    fn chain_of(values: &[i64]) -> EntityHandle {
        let mut handle: EntityHandle = Arc::new(Leaf { header: EntityHeader::new_root(), value: 0 });
        for &v in values {
            handle = Arc::new(Parent { header: EntityHeader::new_root(), child: handle });
            let _ = v;
        }
        handle
    }

    proptest::proptest! {
        // P1: every node's ancestry path starts at the root, ends at the
        // node itself, and every intermediate id is a node in the tree.
        #[test]
        fn ancestry_paths_are_well_formed(depths in proptest::collection::vec(0i64..100, 0..8)) {
            let root = chain_of(&depths);
            let root_id = root.header().logical_id;
            let tree = build_tree(root, &NoKnownRoots).unwrap();

            for (&id, path) in &tree.ancestry_paths {
                proptest::prop_assert_eq!(path.first().copied(), Some(root_id));
                proptest::prop_assert_eq!(path.last().copied(), Some(id));
                for ancestor in path {
                    proptest::prop_assert!(tree.nodes.contains_key(ancestor));
                }
            }
        }
    }
}
