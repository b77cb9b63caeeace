//! C3: Structural Differ.
//!
//! Compares a newly built tree against its stored predecessor and returns
//! the set of logical ids that need a fresh identity, including every
//! strict ancestor of a changed node (a changed leaf forces a new version of
//! everything that contains it).

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use store_core_types::LogicalId;

use crate::entity::SlotKey;
use crate::tree::Tree;

/// One node's position in the tree, expressed as the sequence of
/// field/slot steps from the root, *not* as a chain of ids, since the
/// differ must match nodes before either side has been rekeyed.
type StructuralPath = Vec<(&'static str, Option<SlotKey>)>;

fn structural_paths(tree: &Tree) -> HashMap<LogicalId, StructuralPath> {
    let mut by_parent: HashMap<LogicalId, Vec<&crate::tree::Edge>> = HashMap::new();
    for edge in &tree.edges {
        by_parent.entry(edge.parent).or_default().push(edge);
    }

    let mut paths: HashMap<LogicalId, StructuralPath> = HashMap::new();
    paths.insert(tree.root_logical_id, Vec::new());

    let mut queue = VecDeque::new();
    queue.push_back(tree.root_logical_id);

    while let Some(id) = queue.pop_front() {
        let parent_path = paths[&id].clone();
        if let Some(edges) = by_parent.get(&id) {
            for edge in edges {
                if paths.contains_key(&edge.child) {
                    continue;
                }
                let mut child_path = parent_path.clone();
                child_path.push((edge.slot.field, edge.slot.key.clone()));
                paths.insert(edge.child, child_path);
                queue.push_back(edge.child);
            }
        }
    }

    paths
}

fn immediate_slots(tree: &Tree, id: LogicalId) -> HashSet<(&'static str, Option<SlotKey>)> {
    tree.edges
        .iter()
        .filter(|e| e.parent == id)
        .map(|e| (e.slot.field, e.slot.key.clone()))
        .collect()
}

fn nodes_match(new_tree: &Tree, new_id: LogicalId, old_tree: &Tree, old_id: LogicalId) -> bool {
    let new_node = &new_tree.nodes[&new_id];
    let old_node = &old_tree.nodes[&old_id];
    if !new_node.primitive_fields_eq(old_node.as_ref()) {
        return false;
    }
    immediate_slots(new_tree, new_id) == immediate_slots(old_tree, old_id)
}

/// The result of comparing `new_tree` to its predecessor: logical ids (in
/// `new_tree`) whose snapshot content differs, plus their strict ancestors.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Diff {
    pub changed_ids: BTreeSet<LogicalId>,
}

/// Compare `new_tree` against `old_tree` (`None` for a first publication).
pub fn compute_diff(new_tree: &Tree, old_tree: Option<&Tree>) -> Diff {
    let Some(old_tree) = old_tree else {
        return Diff {
            changed_ids: new_tree.nodes.keys().copied().collect(),
        };
    };

    let new_paths = structural_paths(new_tree);
    let old_paths = structural_paths(old_tree);
    let old_path_to_id: HashMap<StructuralPath, LogicalId> =
        old_paths.into_iter().map(|(id, path)| (path, id)).collect();

    let mut directly_changed: BTreeSet<LogicalId> = BTreeSet::new();
    for (new_id, path) in &new_paths {
        match old_path_to_id.get(path) {
            Some(old_id) => {
                if !nodes_match(new_tree, *new_id, old_tree, *old_id) {
                    directly_changed.insert(*new_id);
                }
            }
            None => {
                directly_changed.insert(*new_id);
            }
        }
    }

    let mut changed_ids = directly_changed.clone();
    for id in &directly_changed {
        if let Some(ancestry) = new_tree.ancestry_paths.get(id) {
            changed_ids.extend(ancestry.iter().copied());
        }
    }

    let diff = Diff { changed_ids };

    // Determinism self-check: the computed diff must round-trip through
    // serialization unchanged. A mismatch here is a programmer-error-class
    // bug in the differ, not a user-facing condition, so it is only checked
    // in debug/test builds.
    #[cfg(debug_assertions)]
    {
        let encoded = serde_json::to_string(&diff).expect("diff must serialize");
        let decoded: Diff = serde_json::from_str(&encoded).expect("diff must deserialize");
        debug_assert_eq!(diff, decoded, "differ produced a non-deterministic result");
    }

    diff
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{EntityHandle, EntityHeader, FieldDescriptor, FieldKind, FieldValue, IsEntity};
    use crate::tree::{build_tree, NoKnownRoots};
    use serde_json::Value as Json;
    use std::sync::Arc;

    #[derive(Debug, Clone)]
    struct Student {
        header: EntityHeader,
        name: String,
        gpa: f64,
    }

    impl IsEntity for Student {
        fn header(&self) -> &EntityHeader {
            &self.header
        }
        fn header_mut(&mut self) -> &mut EntityHeader {
            &mut self.header
        }
        fn type_name(&self) -> &'static str {
            "Student"
        }
        fn field_descriptors(&self) -> &'static [FieldDescriptor] {
            const D: [FieldDescriptor; 2] = [
                FieldDescriptor { name: "name", kind: FieldKind::Primitive },
                FieldDescriptor { name: "gpa", kind: FieldKind::Primitive },
            ];
            &D
        }
        fn field_value(&self, name: &str) -> Option<FieldValue> {
            match name {
                "name" => Some(FieldValue::Primitive(Json::from(self.name.clone()))),
                "gpa" => Some(FieldValue::Primitive(Json::from(self.gpa))),
                _ => None,
            }
        }
        fn clone_boxed(&self) -> Box<dyn IsEntity> {
            Box::new(self.clone())
        }
    }

    fn student(name: &str, gpa: f64) -> EntityHandle {
        Arc::new(Student { header: EntityHeader::new_root(), name: name.into(), gpa })
    }

    #[test]
    fn first_publication_marks_everything_changed() {
        let tree = build_tree(student("Alice", 3.5), &NoKnownRoots).unwrap();
        let diff = compute_diff(&tree, None);
        assert_eq!(diff.changed_ids.len(), 1);
    }

    #[test]
    fn unchanged_gpa_yields_no_changes() {
        let s = student("Alice", 3.5);
        let old_tree = build_tree(s.clone(), &NoKnownRoots).unwrap();
        // Re-use the same logical id to simulate re-publishing the identical value.
        let new_tree = build_tree(s, &NoKnownRoots).unwrap();
        let diff = compute_diff(&new_tree, Some(&old_tree));
        assert!(diff.changed_ids.is_empty());
    }

    #[test]
    fn changed_gpa_marks_the_node_changed() {
        let mut alice = Student { header: EntityHeader::new_root(), name: "Alice".into(), gpa: 3.5 };
        let old_id = alice.header.logical_id;
        let old_tree = build_tree(Arc::new(alice.clone()), &NoKnownRoots).unwrap();

        alice.gpa = 3.8;
        // Same logical id (pre-rekey): the differ runs before C4 mints a new one.
        alice.header.logical_id = old_id;
        let new_tree = build_tree(Arc::new(alice), &NoKnownRoots).unwrap();

        let diff = compute_diff(&new_tree, Some(&old_tree));
        assert_eq!(diff.changed_ids.len(), 1);
        assert!(diff.changed_ids.contains(&old_id));
    }

    #[derive(Debug, Clone)]
    struct Wrapper {
        header: EntityHeader,
        inner: EntityHandle,
    }

    impl IsEntity for Wrapper {
        fn header(&self) -> &EntityHeader {
            &self.header
        }
        fn header_mut(&mut self) -> &mut EntityHeader {
            &mut self.header
        }
        fn type_name(&self) -> &'static str {
            "Wrapper"
        }
        fn field_descriptors(&self) -> &'static [FieldDescriptor] {
            const D: [FieldDescriptor; 1] = [FieldDescriptor { name: "inner", kind: FieldKind::EntityRef }];
            &D
        }
        fn field_value(&self, name: &str) -> Option<FieldValue> {
            match name {
                "inner" => Some(FieldValue::Entity(self.inner.clone())),
                _ => None,
            }
        }
        fn clone_boxed(&self) -> Box<dyn IsEntity> {
            Box::new(self.clone())
        }
    }

    #[test]
    fn changed_grandchild_propagates_to_every_strict_ancestor() {
        // Grandparent(Parent(Leaf)): mutate only the leaf and confirm the
        // whole containing chain is marked changed, and nothing else is.
        let leaf = student("Gina", 2.0);
        let leaf_id = leaf.header().logical_id;
        let parent = Arc::new(Wrapper { header: EntityHeader::new_root(), inner: leaf.clone() });
        let parent_id = parent.header.logical_id;
        let grandparent = Arc::new(Wrapper { header: EntityHeader::new_root(), inner: parent.clone() });
        let grandparent_id = grandparent.header.logical_id;
        let old_tree = build_tree(grandparent.clone(), &NoKnownRoots).unwrap();

        let mutated_leaf = Student { header: leaf.header().clone(), name: "Gina".into(), gpa: 2.5 };
        let new_parent = Wrapper { header: parent.header.clone(), inner: Arc::new(mutated_leaf) };
        let new_grandparent =
            Wrapper { header: grandparent.header.clone(), inner: Arc::new(new_parent) };
        let new_tree = build_tree(Arc::new(new_grandparent), &NoKnownRoots).unwrap();

        let diff = compute_diff(&new_tree, Some(&old_tree));
        assert_eq!(diff.changed_ids, BTreeSet::from([leaf_id, parent_id, grandparent_id]));
    }
}
