//! C1: Identity & Field Introspection.
//!
//! Field classification has no runtime reflection to lean on: every entity
//! type implements [`IsEntity`] and hands back a static table of
//! [`FieldDescriptor`]s (built once per type) plus a `field_value` accessor
//! that stands in for the dynamic `getattr` the original system used.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value as Json;
use store_core_types::{ExecutionId, LineageId, LiveId, LogicalId};

/// How a declared field participates in tree traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Leaf scalar or opaque value; no entity anywhere inside.
    Primitive,
    /// The field value is itself an entity.
    EntityRef,
    /// An ordered sequence of entities.
    EntityVec,
    /// A set of entities.
    EntitySet,
    /// A map keyed by string with entity values.
    EntityMap,
    /// A fixed tuple of entity slots.
    EntityTuple,
    /// Contains both entity and non-entity elements; traversal visits only
    /// the entity elements but the container's own slot identity is kept.
    Mixed,
}

/// One declared field of an entity type, part of the static per-type table.
#[derive(Debug, Clone, Copy)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub kind: FieldKind,
}

/// A key identifying one slot within a container field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SlotKey {
    Index(usize),
    Name(String),
}

/// The value found at one field, classified the same way its descriptor is.
///
/// Child entities are handed back as `Arc<dyn IsEntity>` clones rather than
/// borrows: entities are immutable values shared by reference-count, so an
/// owned handle is both cheap and avoids tying field access to `&self`'s
/// lifetime (needed since the tree builder stores handles long after the
/// parent that produced them goes out of scope).
pub enum FieldValue {
    Primitive(Json),
    Entity(EntityHandle),
    EntityVec(Vec<EntityHandle>),
    EntitySet(Vec<EntityHandle>),
    EntityMap(Vec<(String, EntityHandle)>),
    EntityTuple(Vec<EntityHandle>),
    Mixed(Vec<MixedSlot>),
}

pub enum MixedSlot {
    Primitive(Json),
    Entity(EntityHandle),
}

/// Fields every entity carries regardless of its declared payload.
#[derive(Debug, Clone)]
pub struct EntityHeader {
    pub logical_id: LogicalId,
    pub live_id: LiveId,
    pub root_logical_id: LogicalId,
    pub root_live_id: LiveId,
    pub lineage_id: LineageId,
    pub created_at: DateTime<Utc>,
    pub previous_logical_id: Option<LogicalId>,
    pub forked_at: Option<DateTime<Utc>>,
    pub derived_from_function: Option<String>,
    pub derived_from_execution_id: Option<ExecutionId>,
    pub sibling_output_logical_ids: BTreeSet<LogicalId>,
    pub container_of: Option<String>,
}

impl EntityHeader {
    /// A freshly created entity: logical/live/lineage/root ids all newly
    /// minted, as if constructed in user code this instant.
    pub fn new_root() -> Self {
        let logical_id = LogicalId::new();
        let live_id = LiveId::new();
        Self {
            logical_id,
            live_id,
            root_logical_id: logical_id,
            root_live_id: live_id,
            lineage_id: LineageId::new(),
            created_at: Utc::now(),
            previous_logical_id: None,
            forked_at: None,
            derived_from_function: None,
            derived_from_execution_id: None,
            sibling_output_logical_ids: BTreeSet::new(),
            container_of: None,
        }
    }

    pub fn is_root(&self) -> bool {
        self.logical_id == self.root_logical_id
    }
}

/// Implemented by every user-defined entity type. Object-safe so trees can
/// hold heterogeneous entity types behind `dyn IsEntity`.
pub trait IsEntity: std::fmt::Debug + Send + Sync {
    fn header(&self) -> &EntityHeader;
    fn header_mut(&mut self) -> &mut EntityHeader;
    fn type_name(&self) -> &'static str;
    fn field_descriptors(&self) -> &'static [FieldDescriptor];
    fn field_value(&self, name: &str) -> Option<FieldValue>;
    fn clone_boxed(&self) -> Box<dyn IsEntity>;

    /// Value equality ignoring identity/provenance header fields, used by
    /// the structural differ to compare primitive fields of matched nodes.
    fn primitive_fields_eq(&self, other: &dyn IsEntity) -> bool {
        if self.type_name() != other.type_name() {
            return false;
        }
        for desc in self.field_descriptors() {
            if desc.kind != FieldKind::Primitive {
                continue;
            }
            let a = self.field_value(desc.name);
            let b = other.field_value(desc.name);
            match (a, b) {
                (Some(FieldValue::Primitive(a)), Some(FieldValue::Primitive(b))) => {
                    if a != b {
                        return false;
                    }
                }
                (None, None) => {}
                _ => return false,
            }
        }
        true
    }
}

/// Marker trait for configuration entities (the `ConfigParameterized`
/// argument pattern). A distinguished subtype, not a separate class
/// hierarchy; classification is trait-driven.
pub trait IsConfig: IsEntity {}

/// A synthesized entity wrapping a non-entity function return.
#[derive(Debug, Clone)]
pub struct Container {
    pub header: EntityHeader,
    pub wrapped_value: Json,
}

impl Container {
    pub fn new(wrapped_value: Json, container_of: impl Into<String>) -> Self {
        let mut header = EntityHeader::new_root();
        header.container_of = Some(container_of.into());
        Self { header, wrapped_value }
    }
}

impl IsEntity for Container {
    fn header(&self) -> &EntityHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut EntityHeader {
        &mut self.header
    }

    fn type_name(&self) -> &'static str {
        "Container"
    }

    fn field_descriptors(&self) -> &'static [FieldDescriptor] {
        const DESCS: [FieldDescriptor; 1] = [FieldDescriptor {
            name: "wrapped_value",
            kind: FieldKind::Primitive,
        }];
        &DESCS
    }

    fn field_value(&self, name: &str) -> Option<FieldValue> {
        match name {
            "wrapped_value" => Some(FieldValue::Primitive(self.wrapped_value.clone())),
            _ => None,
        }
    }

    fn clone_boxed(&self) -> Box<dyn IsEntity> {
        Box::new(self.clone())
    }
}

/// Convenience handle used once an entity has been copied into an immutable
/// tree snapshot.
pub type EntityHandle = Arc<dyn IsEntity>;
