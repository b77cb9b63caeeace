//! A small in-process entity type and a couple of registered functions,
//! good enough to drive `call`/`get`/`history`/`publish-demo` without a
//! durable store behind them. Not part of the core's contract, purely a
//! harness for manual exploration, never a wire protocol.

use std::sync::Arc;

use serde_json::Value as Json;
use store_callable::{Callable, CallableRegistry, CallableValue, FieldType, InputSchema, OutputSchema, ResolvedValue};
use store_core::{EntityHeader, FieldDescriptor, FieldKind, FieldValue, IsEntity};
use store_errors::{CoreError, CoreErrorKind};

#[derive(Debug, Clone)]
pub struct Student {
    pub header: EntityHeader,
    pub name: String,
    pub gpa: f64,
}

impl Student {
    pub fn new(name: impl Into<String>, gpa: f64) -> Self {
        Self { header: EntityHeader::new_root(), name: name.into(), gpa }
    }
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
        const DESCS: [FieldDescriptor; 2] = [
            FieldDescriptor { name: "name", kind: FieldKind::Primitive },
            FieldDescriptor { name: "gpa", kind: FieldKind::Primitive },
        ];
        &DESCS
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

fn student_fields(handle: &store_core::EntityHandle) -> Result<(String, f64), CoreError> {
    let name = match handle.field_value("name") {
        Some(FieldValue::Primitive(v)) => v.as_str().unwrap_or_default().to_string(),
        _ => {
            return Err(CoreError::new(CoreErrorKind::FieldNotFound)
                .with_op("demo")
                .with_message("expected a 'name' field"))
        }
    };
    let gpa = match handle.field_value("gpa") {
        Some(FieldValue::Primitive(v)) => v.as_f64().unwrap_or_default(),
        _ => {
            return Err(CoreError::new(CoreErrorKind::FieldNotFound)
                .with_op("demo")
                .with_message("expected a 'gpa' field"))
        }
    };
    Ok((name, gpa))
}

/// Register two seed-scenario functions: a single-entity transform
/// (`bump_gpa`) and a multi-output composition (`analyze`).
pub async fn register_demo_functions(calls: &CallableRegistry) -> Result<(), CoreError> {
    let bump_gpa: Arc<dyn Fn(&store_callable::ResolvedArgs) -> Result<CallableValue, CoreError> + Send + Sync> =
        Arc::new(|args| match args.get("student") {
            Some(ResolvedValue::Entity(handle)) => {
                let (name, gpa) = student_fields(handle)?;
                let bumped = Student { header: handle.header().clone(), name, gpa: gpa + 1.0 };
                Ok(CallableValue::Entity(Arc::new(bumped)))
            }
            _ => Err(CoreError::new(CoreErrorKind::UnsupportedArgumentPattern)
                .with_op("bump_gpa")
                .with_message("expected a 'student' entity argument")),
        });
    calls
        .register(
            "bump_gpa",
            InputSchema::new().field("student", FieldType::Entity("Student")),
            OutputSchema::single_entity("Student"),
            Callable::Sync(bump_gpa),
        )
        .await?;

    let analyze: Arc<dyn Fn(&store_callable::ResolvedArgs) -> Result<CallableValue, CoreError> + Send + Sync> =
        Arc::new(|args| match args.get("student") {
            Some(ResolvedValue::Entity(handle)) => {
                let (name, gpa) = student_fields(handle)?;
                let assessment = Student::new(format!("Assessment for {name}"), gpa);
                let recommendation = Student::new(format!("Recommendation for {name}"), gpa);
                Ok(CallableValue::EntityList(vec![Arc::new(assessment), Arc::new(recommendation)]))
            }
            _ => Err(CoreError::new(CoreErrorKind::UnsupportedArgumentPattern)
                .with_op("analyze")
                .with_message("expected a 'student' entity argument")),
        });
    calls
        .register(
            "analyze",
            InputSchema::new().field("student", FieldType::Entity("Student")),
            OutputSchema::entity_tuple(vec!["Student", "Student"]),
            Callable::Sync(analyze),
        )
        .await?;

    Ok(())
}
