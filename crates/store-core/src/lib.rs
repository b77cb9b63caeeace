//! C1–C4: entity identity, field introspection, tree construction,
//! structural diffing, and the versioning engine.

pub mod diff;
pub mod entity;
pub mod tree;
pub mod version;

pub use diff::{compute_diff, Diff};
pub use entity::{
    Container, EntityHandle, EntityHeader, FieldDescriptor, FieldKind, FieldValue, IsConfig,
    IsEntity, MixedSlot, SlotKey,
};
pub use tree::{build_tree, Edge, FieldSlot, NoKnownRoots, RootLookup, Tree};
pub use version::{apply_versioning, PublishOutcome, Versioned};
