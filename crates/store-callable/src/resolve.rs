//! Reference materialization: every `reference` argument is
//! resolved via the address resolver (C6) before the user function sees it.
//! The resolved entity is a snapshot copy the user function cannot write
//! back into the registry through: all entities here are borrowed values.

use std::collections::HashMap;
use std::time::Instant;

use serde_json::Value as Json;
use store_address::{parse, resolve, Resolved};
use store_core::{EntityHandle, FieldValue};
use store_errors::{CoreError, CoreErrorKind};
use store_events::{event_type, Event, EventBus, EventContext, EventPhase};
use store_registry::Registry;

use crate::classify::ArgValue;
use crate::schema::{FieldType, InputSchema};

fn scoped_event(event_type: &str, phase: EventPhase) -> Event {
    match EventContext::current() {
        Some((parent_id, lineage_id)) => Event::child_of(parent_id, lineage_id, event_type, phase),
        None => Event::new(event_type, phase),
    }
}

#[derive(Debug, Clone)]
pub enum ResolvedValue {
    Primitive(Json),
    Entity(EntityHandle),
    EntityList(Vec<EntityHandle>),
}

pub type ResolvedArgs = HashMap<String, ResolvedValue>;

async fn materialize_one(registry: &Registry, value: ArgValue) -> Result<ResolvedValue, CoreError> {
    match value {
        ArgValue::Primitive(json) => Ok(ResolvedValue::Primitive(json)),
        ArgValue::Entity(handle) => Ok(ResolvedValue::Entity(handle)),
        ArgValue::Reference(reference) => {
            let address = parse(&reference)?;
            match resolve(registry, &address).await? {
                Resolved::Entity(handle) => Ok(ResolvedValue::Entity(handle)),
                Resolved::Value(json) => Ok(ResolvedValue::Primitive(json)),
            }
        }
        ArgValue::Collection(items) => {
            let mut handles = Vec::with_capacity(items.len());
            for item in items {
                match Box::pin(materialize_one(registry, item)).await? {
                    ResolvedValue::Entity(handle) => handles.push(handle),
                    ResolvedValue::Primitive(_) | ResolvedValue::EntityList(_) => {
                        return Err(CoreError::new(CoreErrorKind::UnsupportedArgumentPattern)
                            .with_op("materialize")
                            .with_message("entity-collection argument contained a non-entity element"));
                    }
                }
            }
            Ok(ResolvedValue::EntityList(handles))
        }
    }
}

/// Resolve every `@...` reference in `args` against `registry`. A parameter
/// declared [`FieldType::Config`] is not kept as a single entity argument:
/// its own fields are flattened into the resolved args under their own
/// names, the `ConfigParameterized` pattern, bracketed by
/// `config.creating`/`config.created`.
pub async fn materialize(
    registry: &Registry,
    bus: &EventBus,
    schema: &InputSchema,
    args: HashMap<String, ArgValue>,
) -> Result<ResolvedArgs, CoreError> {
    let mut resolved = HashMap::with_capacity(args.len());
    for (name, value) in args {
        let is_config = matches!(schema.get(&name), Some(FieldType::Config(_)));
        let value = materialize_one(registry, value).await?;

        if !is_config {
            resolved.insert(name, value);
            continue;
        }

        bus.emit(
            scoped_event(event_type::CONFIG_CREATING, EventPhase::Started)
                .with_metadata("parameter", Json::from(name.clone())),
        )
        .await?;
        let started = Instant::now();

        let ResolvedValue::Entity(handle) = value else {
            return Err(CoreError::new(CoreErrorKind::UnsupportedArgumentPattern)
                .with_op("materialize")
                .with_message(format!("config parameter '{name}' did not resolve to an entity")));
        };

        let mut flattened = 0usize;
        for descriptor in handle.field_descriptors() {
            let field_value = match handle.field_value(descriptor.name) {
                Some(FieldValue::Primitive(json)) => ResolvedValue::Primitive(json),
                Some(FieldValue::Entity(child)) => ResolvedValue::Entity(child),
                _ => continue,
            };
            resolved.insert(descriptor.name.to_string(), field_value);
            flattened += 1;
        }

        bus.emit(
            scoped_event(event_type::CONFIG_CREATED, EventPhase::Completed)
                .with_metadata("parameter", Json::from(name))
                .with_metadata("field_count", Json::from(flattened))
                .with_duration_ms(started.elapsed().as_millis() as u64),
        )
        .await?;
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use store_core::{EntityHeader, FieldDescriptor, FieldKind, FieldValue, IsEntity, PublishOutcome};
    use std::sync::Arc;

    #[derive(Debug, Clone)]
    struct Student {
        header: EntityHeader,
        name: String,
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
            const D: [FieldDescriptor; 1] = [FieldDescriptor { name: "name", kind: FieldKind::Primitive }];
            &D
        }
        fn field_value(&self, name: &str) -> Option<FieldValue> {
            match name {
                "name" => Some(FieldValue::Primitive(Json::from(self.name.clone()))),
                _ => None,
            }
        }
        fn clone_boxed(&self) -> Box<dyn IsEntity> {
            Box::new(self.clone())
        }
    }

    #[derive(Debug, Clone)]
    struct AnalysisConfig {
        header: EntityHeader,
        threshold: f64,
        label: String,
    }

    impl IsEntity for AnalysisConfig {
        fn header(&self) -> &EntityHeader {
            &self.header
        }
        fn header_mut(&mut self) -> &mut EntityHeader {
            &mut self.header
        }
        fn type_name(&self) -> &'static str {
            "AnalysisConfig"
        }
        fn field_descriptors(&self) -> &'static [FieldDescriptor] {
            const D: [FieldDescriptor; 2] = [
                FieldDescriptor { name: "threshold", kind: FieldKind::Primitive },
                FieldDescriptor { name: "label", kind: FieldKind::Primitive },
            ];
            &D
        }
        fn field_value(&self, name: &str) -> Option<FieldValue> {
            match name {
                "threshold" => Some(FieldValue::Primitive(Json::from(self.threshold))),
                "label" => Some(FieldValue::Primitive(Json::from(self.label.clone()))),
                _ => None,
            }
        }
        fn clone_boxed(&self) -> Box<dyn IsEntity> {
            Box::new(self.clone())
        }
    }

    fn new_bus() -> EventBus {
        let (bus, _drain) = EventBus::spawn(16, 16);
        bus
    }

    #[tokio::test]
    async fn reference_resolves_to_an_entity_and_primitives_pass_through() {
        let bus = new_bus();
        let registry = Registry::new();
        let student = Student { header: EntityHeader::new_root(), name: "Alice".into() };
        let outcome = registry.publish(Arc::new(student), &bus).await.unwrap();
        let new_root = match outcome {
            PublishOutcome::NewVersion { new_root, .. } => new_root,
            PublishOutcome::Unchanged => panic!("expected new version"),
        };

        let mut args = HashMap::new();
        args.insert("student".to_string(), ArgValue::Reference(format!("@{new_root}")));
        args.insert("note".to_string(), ArgValue::Primitive(Json::from("hi")));
        let schema = InputSchema::new()
            .field("student", FieldType::Entity("Student"))
            .field("note", FieldType::Primitive(crate::schema::PrimitiveType::Str));

        let resolved = materialize(&registry, &bus, &schema, args).await.unwrap();
        assert!(matches!(resolved.get("student"), Some(ResolvedValue::Entity(_))));
        assert!(matches!(resolved.get("note"), Some(ResolvedValue::Primitive(_))));
    }

    // C7 `ConfigParameterized`: a config-typed argument's own fields are
    // flattened into the resolved args under their own names, not kept as
    // a single entity bound to the parameter's declared name.
    #[tokio::test]
    async fn config_parameter_is_flattened_into_named_fields() {
        let bus = new_bus();
        let registry = Registry::new();
        let config = AnalysisConfig { header: EntityHeader::new_root(), threshold: 0.5, label: "strict".into() };
        let outcome = registry.publish(Arc::new(config), &bus).await.unwrap();
        let new_root = match outcome {
            PublishOutcome::NewVersion { new_root, .. } => new_root,
            PublishOutcome::Unchanged => panic!("expected new version"),
        };

        let mut args = HashMap::new();
        args.insert("options".to_string(), ArgValue::Reference(format!("@{new_root}")));
        let schema = InputSchema::new().field("options", FieldType::Config("AnalysisConfig"));

        let resolved = materialize(&registry, &bus, &schema, args).await.unwrap();
        assert!(resolved.get("options").is_none(), "the config parameter itself is not kept");
        assert!(matches!(resolved.get("threshold"), Some(ResolvedValue::Primitive(v)) if *v == Json::from(0.5)));
        assert!(matches!(resolved.get("label"), Some(ResolvedValue::Primitive(v)) if *v == Json::from("strict")));

        let history = bus.history().await;
        assert!(history.iter().any(|e| e.event_type == event_type::CONFIG_CREATING));
        assert!(history.iter().any(|e| e.event_type == event_type::CONFIG_CREATED));
    }
}
