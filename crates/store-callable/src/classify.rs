//! Per-call argument classification: the shape of the provided
//! arguments, compared against the function's declared [`InputSchema`],
//! determines which of the four argument patterns applies and therefore how
//! arguments are materialized before the user function runs.

use std::collections::HashMap;

use serde_json::Value as Json;
use store_core::EntityHandle;
use store_errors::{CoreError, CoreErrorKind};

use crate::schema::{FieldType, InputSchema};

/// One provided argument, before reference resolution.
#[derive(Debug, Clone)]
pub enum ArgValue {
    Primitive(Json),
    /// An unresolved `@...` address string.
    Reference(String),
    Entity(EntityHandle),
    Collection(Vec<ArgValue>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    Primitive,
    Reference,
    Entity,
    EntityCollection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgPattern {
    PurePrimitives,
    SingleEntity,
    MultiEntityComposition,
    ConfigParameterized,
}

fn classify_one(declared: &FieldType, value: &ArgValue) -> Result<ArgKind, CoreError> {
    match (declared, value) {
        (FieldType::Primitive(_), ArgValue::Primitive(_)) => Ok(ArgKind::Primitive),
        (FieldType::Primitive(_), _) => Err(CoreError::new(CoreErrorKind::UnsupportedArgumentPattern)
            .with_op("classify_arguments")
            .with_message("primitive parameter given a non-primitive value")),
        (FieldType::Entity(_) | FieldType::Config(_), ArgValue::Reference(_)) => Ok(ArgKind::Reference),
        (FieldType::Entity(_) | FieldType::Config(_), ArgValue::Entity(_)) => Ok(ArgKind::Entity),
        (FieldType::EntityList(_), ArgValue::Collection(_)) => Ok(ArgKind::EntityCollection),
        _ => Err(CoreError::new(CoreErrorKind::UnsupportedArgumentPattern)
            .with_op("classify_arguments")
            .with_message("argument value does not match its declared parameter kind")),
    }
}

/// Classify the overall call, given the function's declared schema and the
/// caller-supplied arguments (by name).
pub fn classify_arguments(schema: &InputSchema, args: &HashMap<String, ArgValue>) -> Result<ArgPattern, CoreError> {
    let mut entity_like_count = 0usize;
    let mut has_config = false;

    for (name, declared) in schema.iter() {
        let Some(value) = args.get(name) else { continue };
        let kind = classify_one(declared, value)?;

        if matches!(declared, FieldType::Config(_)) {
            has_config = true;
        }
        if matches!(kind, ArgKind::Reference | ArgKind::Entity | ArgKind::EntityCollection) {
            entity_like_count += 1;
        }
    }

    if has_config {
        return Ok(ArgPattern::ConfigParameterized);
    }

    match entity_like_count {
        0 => Ok(ArgPattern::PurePrimitives),
        1 => Ok(ArgPattern::SingleEntity),
        _ => Ok(ArgPattern::MultiEntityComposition),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::PrimitiveType;

    #[test]
    fn pure_primitives_when_no_entity_arguments() {
        let schema = InputSchema::new().field("gpa", FieldType::Primitive(PrimitiveType::F64));
        let mut args = HashMap::new();
        args.insert("gpa".to_string(), ArgValue::Primitive(Json::from(3.5)));
        assert_eq!(classify_arguments(&schema, &args).unwrap(), ArgPattern::PurePrimitives);
    }

    #[test]
    fn single_entity_when_exactly_one_entity_like_argument() {
        let schema = InputSchema::new().field("student", FieldType::Entity("Student"));
        let mut args = HashMap::new();
        args.insert("student".to_string(), ArgValue::Reference("@00000000-0000-0000-0000-000000000000".into()));
        assert_eq!(classify_arguments(&schema, &args).unwrap(), ArgPattern::SingleEntity);
    }

    #[test]
    fn multi_entity_composition_with_two_entity_arguments() {
        let schema = InputSchema::new()
            .field("a", FieldType::Entity("Student"))
            .field("b", FieldType::Entity("Course"));
        let mut args = HashMap::new();
        args.insert("a".to_string(), ArgValue::Reference("@00000000-0000-0000-0000-000000000000".into()));
        args.insert("b".to_string(), ArgValue::Reference("@00000000-0000-0000-0000-000000000001".into()));
        assert_eq!(classify_arguments(&schema, &args).unwrap(), ArgPattern::MultiEntityComposition);
    }

    #[test]
    fn config_parameterized_when_a_parameter_is_a_config_entity() {
        let schema = InputSchema::new().field("options", FieldType::Config("AnalysisConfig"));
        let mut args = HashMap::new();
        args.insert("options".to_string(), ArgValue::Reference("@00000000-0000-0000-0000-000000000000".into()));
        assert_eq!(classify_arguments(&schema, &args).unwrap(), ArgPattern::ConfigParameterized);
    }

    #[test]
    fn mismatched_primitive_argument_is_unsupported() {
        let schema = InputSchema::new().field("gpa", FieldType::Primitive(PrimitiveType::F64));
        let mut args = HashMap::new();
        args.insert("gpa".to_string(), ArgValue::Reference("@00000000-0000-0000-0000-000000000000".into()));
        let err = classify_arguments(&schema, &args).unwrap_err();
        assert_eq!(err.kind(), CoreErrorKind::UnsupportedArgumentPattern);
    }
}
