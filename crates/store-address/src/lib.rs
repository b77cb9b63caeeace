//! C6: Address Resolution.
//!
//! Parses and resolves the `@<logical-id>(.<step>)*` grammar used to point
//! at an entity or one of its fields from outside the tree it lives in:
//! function arguments, event payloads, anywhere a reference needs to survive
//! rekeying better than a raw field value would. Grounded in the original
//! system's `_fetch_entity_attribute`/`_resolve_entity_references` pair,
//! generalized to the registry's `(root, logical_id)` indexing.

use serde_json::Value as Json;
use store_core::{EntityHandle, FieldValue, MixedSlot};
use store_core_types::LogicalId;
use store_errors::{CoreError, CoreErrorKind};
use store_registry::Registry;

/// One step of an address path: a named field, or a numeric index into a
/// vec/tuple-shaped field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Name(String),
    Index(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    pub logical_id: LogicalId,
    pub steps: Vec<Step>,
}

/// What resolving an address down to its final step produced.
#[derive(Debug, Clone)]
pub enum Resolved {
    Entity(EntityHandle),
    Value(Json),
}

impl Resolved {
    pub fn into_json(self) -> Json {
        match self {
            Resolved::Entity(handle) => entity_to_json(handle.as_ref()),
            Resolved::Value(v) => v,
        }
    }
}

fn entity_to_json(entity: &dyn store_core::IsEntity) -> Json {
    serde_json::json!({
        "logical_id": entity.header().logical_id.to_string(),
        "type": entity.type_name(),
    })
}

/// Parse `"@<uuid>.<name-or-index>.<name-or-index>..."` into an [`Address`].
pub fn parse(reference: &str) -> Result<Address, CoreError> {
    let body = reference.strip_prefix('@').ok_or_else(|| {
        CoreError::new(CoreErrorKind::InvalidAddress)
            .with_op("parse")
            .with_message(format!("address must start with '@': {reference}"))
    })?;

    let mut parts = body.split('.');
    let head = parts.next().unwrap_or("");
    let logical_id: LogicalId = head.parse().map_err(|_| {
        CoreError::new(CoreErrorKind::InvalidAddress)
            .with_op("parse")
            .with_message(format!("not a valid uuid: {head}"))
    })?;

    let steps = parts
        .map(|p| match p.parse::<usize>() {
            Ok(i) => Step::Index(i),
            Err(_) => Step::Name(p.to_string()),
        })
        .collect();

    Ok(Address { logical_id, steps })
}

/// Resolve an already-parsed [`Address`] against the registry.
pub async fn resolve(registry: &Registry, address: &Address) -> Result<Resolved, CoreError> {
    let root_logical_id = registry.find_root_of(address.logical_id).await.ok_or_else(|| {
        CoreError::new(CoreErrorKind::EntityNotFound)
            .with_op("resolve")
            .with_logical_id(address.logical_id)
            .with_message("entity not found in any registered tree")
    })?;

    let entity = registry
        .get_entity(root_logical_id, address.logical_id)
        .await
        .ok_or_else(|| {
            CoreError::new(CoreErrorKind::EntityNotFound)
                .with_op("resolve")
                .with_logical_id(address.logical_id)
        })?;

    if address.steps.is_empty() {
        return Ok(Resolved::Entity(entity));
    }

    walk(entity, &address.steps)
}

fn walk(start: EntityHandle, steps: &[Step]) -> Result<Resolved, CoreError> {
    let mut current = start;
    for (i, step) in steps.iter().enumerate() {
        let field_name = match step {
            Step::Name(name) => name.as_str(),
            Step::Index(_) => {
                return step_into_indexed(&current, steps, i);
            }
        };

        let available = || {
            current
                .field_descriptors()
                .iter()
                .map(|d| d.name.to_string())
                .collect::<Vec<_>>()
        };

        let value = current.field_value(field_name).ok_or_else(|| {
            CoreError::new(CoreErrorKind::FieldNotFound)
                .with_op("resolve")
                .with_logical_id(current.header().logical_id)
                .with_message(format!("no such field: {field_name}"))
                .with_available(available())
        })?;

        match value {
            FieldValue::Primitive(json) => {
                if i + 1 == steps.len() {
                    return Ok(Resolved::Value(json));
                }
                return Err(CoreError::new(CoreErrorKind::FieldNotFound)
                    .with_op("resolve")
                    .with_message(format!("'{field_name}' is a primitive, cannot descend further")));
            }
            FieldValue::Entity(child) => {
                if i + 1 == steps.len() {
                    return Ok(Resolved::Entity(child));
                }
                current = child;
            }
            FieldValue::EntityVec(_)
            | FieldValue::EntitySet(_)
            | FieldValue::EntityTuple(_)
            | FieldValue::EntityMap(_)
            | FieldValue::Mixed(_) => {
                return step_into_container(value, steps, i);
            }
        }
    }
    Ok(Resolved::Entity(current))
}

fn step_into_indexed(current: &EntityHandle, steps: &[Step], i: usize) -> Result<Resolved, CoreError> {
    Err(CoreError::new(CoreErrorKind::InvalidAddress)
        .with_op("resolve")
        .with_logical_id(current.header().logical_id)
        .with_message(format!("numeric step '{:?}' must follow a container field", steps[i])))
}

fn step_into_container(value: FieldValue, steps: &[Step], i: usize) -> Result<Resolved, CoreError> {
    let Some(next_step) = steps.get(i + 1) else {
        return Err(CoreError::new(CoreErrorKind::InvalidAddress)
            .with_op("resolve")
            .with_message("address ends on a container field; an index or key is required"));
    };

    let child = match (value, next_step) {
        (FieldValue::EntityVec(items), Step::Index(idx))
        | (FieldValue::EntitySet(items), Step::Index(idx))
        | (FieldValue::EntityTuple(items), Step::Index(idx)) => items.into_iter().nth(*idx).ok_or_else(|| {
            CoreError::new(CoreErrorKind::FieldNotFound)
                .with_op("resolve")
                .with_message(format!("index {idx} out of range"))
        })?,
        (FieldValue::EntityMap(items), Step::Name(key)) => items
            .into_iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
            .ok_or_else(|| {
                CoreError::new(CoreErrorKind::FieldNotFound)
                    .with_op("resolve")
                    .with_message(format!("no such key: {key}"))
            })?,
        (FieldValue::Mixed(slots), Step::Index(idx)) => match slots.into_iter().nth(*idx) {
            Some(MixedSlot::Entity(e)) => e,
            Some(MixedSlot::Primitive(_)) => {
                return Err(CoreError::new(CoreErrorKind::InvalidAddress)
                    .with_op("resolve")
                    .with_message(format!("slot {idx} is a primitive, not an entity")));
            }
            None => {
                return Err(CoreError::new(CoreErrorKind::FieldNotFound)
                    .with_op("resolve")
                    .with_message(format!("index {idx} out of range")));
            }
        },
        _ => {
            return Err(CoreError::new(CoreErrorKind::InvalidAddress)
                .with_op("resolve")
                .with_message("step kind does not match container shape"));
        }
    };

    walk(child, &steps[i + 2..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use store_core::{EntityHeader, FieldDescriptor, FieldKind, IsEntity};
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

    #[test]
    fn parses_bare_uuid_and_dotted_path() {
        let id = LogicalId::new();
        let addr = parse(&format!("@{id}")).unwrap();
        assert_eq!(addr.logical_id, id);
        assert!(addr.steps.is_empty());

        let addr = parse(&format!("@{id}.gpa")).unwrap();
        assert_eq!(addr.steps, vec![Step::Name("gpa".into())]);

        let addr = parse(&format!("@{id}.siblings.0.gpa")).unwrap();
        assert_eq!(
            addr.steps,
            vec![Step::Name("siblings".into()), Step::Index(0), Step::Name("gpa".into())]
        );
    }

    #[test]
    fn rejects_reference_missing_the_sigil() {
        let id = LogicalId::new();
        assert!(parse(&id.to_string()).is_err());
    }

    #[tokio::test]
    async fn resolves_whole_entity_and_a_field() {
        let (bus, _drain) = store_events::EventBus::spawn(16, 16);
        let registry = Registry::new();
        let student = Student { header: EntityHeader::new_root(), name: "Alice".into(), gpa: 3.5 };
        let outcome = registry.publish(Arc::new(student), &bus).await.unwrap();
        let new_root = match outcome {
            store_core::PublishOutcome::NewVersion { new_root, .. } => new_root,
            store_core::PublishOutcome::Unchanged => panic!("expected new version"),
        };

        let whole_addr = parse(&format!("@{new_root}")).unwrap();
        let whole = resolve(&registry, &whole_addr).await;
        assert!(matches!(whole, Ok(Resolved::Entity(_))));

        let addr = parse(&format!("@{new_root}.gpa")).unwrap();
        let field = resolve(&registry, &addr).await.unwrap();
        match field {
            Resolved::Value(v) => assert_eq!(v, Json::from(3.5)),
            Resolved::Entity(_) => panic!("expected a primitive value"),
        }
    }

    #[tokio::test]
    async fn unknown_entity_is_not_found() {
        let registry = Registry::new();
        let addr = parse(&format!("@{}", LogicalId::new())).unwrap();
        let err = resolve(&registry, &addr).await.unwrap_err();
        assert_eq!(err.kind(), CoreErrorKind::EntityNotFound);
    }

    // P5: resolving the bare address of a currently-published entity returns
    // one structurally equal to the entity that was published.
    #[test]
    fn address_round_trip_resolves_a_structurally_equal_entity() {
        tokio_test::block_on(async {
            let (bus, _drain) = store_events::EventBus::spawn(16, 16);
            let registry = Registry::new();
            let student = Student { header: EntityHeader::new_root(), name: "Wei".into(), gpa: 3.8 };
            let outcome = registry.publish(Arc::new(student), &bus).await.unwrap();
            let root = match outcome {
                store_core::PublishOutcome::NewVersion { new_root, .. } => new_root,
                store_core::PublishOutcome::Unchanged => panic!("expected new version"),
            };

            let addr = parse(&format!("@{root}")).unwrap();
            let resolved = resolve(&registry, &addr).await.unwrap();
            let entity = match resolved {
                Resolved::Entity(handle) => handle,
                Resolved::Value(_) => panic!("expected the whole entity"),
            };
            match entity.field_value("name") {
                Some(FieldValue::Primitive(v)) => assert_eq!(v, Json::from("Wei")),
                _ => panic!("expected a primitive name field"),
            }
            match entity.field_value("gpa") {
                Some(FieldValue::Primitive(v)) => assert_eq!(v, Json::from(3.8)),
                _ => panic!("expected a primitive gpa field"),
            }
        });
    }
}
