//! Declared input/output schemas.
//!
//! The original system derives these from the function's type hints at
//! decoration time (`get_type_hints`); Rust erases generic parameter names
//! at compile time, so registration instead takes an explicit schema built
//! with this small builder, the one place the host language's lack of
//! reflection forces a declaration instead of a derivation.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveType {
    Str,
    I64,
    F64,
    Bool,
    Json,
}

/// The declared shape of one parameter or of the return value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    Primitive(PrimitiveType),
    /// A single entity of the named type.
    Entity(&'static str),
    /// An ordered collection of entities of the named type.
    EntityList(&'static str),
    /// A configuration entity: its own fields are flattened into named
    /// parameters at call time (the `ConfigParameterized` pattern).
    Config(&'static str),
}

impl FieldType {
    pub fn is_entity_like(&self) -> bool {
        matches!(self, FieldType::Entity(_) | FieldType::EntityList(_))
    }
}

#[derive(Debug, Clone, Default)]
pub struct InputSchema {
    fields: HashMap<String, FieldType>,
    order: Vec<String>,
}

impl InputSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, kind: FieldType) -> Self {
        let name = name.into();
        if !self.fields.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.fields.insert(name, kind);
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldType> {
        self.fields.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldType)> {
        self.order.iter().map(move |name| (name.as_str(), &self.fields[name]))
    }

    pub fn names(&self) -> Vec<String> {
        self.order.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputShape {
    SingleEntity(&'static str),
    EntityTuple(Vec<&'static str>),
    EntityCollection(&'static str),
    /// A scalar or plain-data return, wrapped in a container. `container_of`
    /// on the resulting event carries the declared type name, e.g. `"int"`.
    NonEntity(&'static str),
}

#[derive(Debug, Clone)]
pub struct OutputSchema {
    pub shape: OutputShape,
}

impl OutputSchema {
    pub fn single_entity(type_name: &'static str) -> Self {
        Self { shape: OutputShape::SingleEntity(type_name) }
    }

    pub fn entity_tuple(type_names: Vec<&'static str>) -> Self {
        Self { shape: OutputShape::EntityTuple(type_names) }
    }

    pub fn entity_collection(type_name: &'static str) -> Self {
        Self { shape: OutputShape::EntityCollection(type_name) }
    }

    pub fn non_entity(type_name: &'static str) -> Self {
        Self { shape: OutputShape::NonEntity(type_name) }
    }
}
