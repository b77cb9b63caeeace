//! `CallableFunction`: a metadata record published into the registry as a
//! root entity on registration, mirroring the original system's
//! `func_entity.promote_to_root()`, so the function's own schema becomes a
//! versioned artifact like any other entity rather than living only in
//! process memory.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value as Json;
use store_core::{EntityHeader, FieldDescriptor, FieldKind, FieldValue, IsEntity};
use store_errors::CoreError;

use crate::resolve::ResolvedArgs;
use crate::schema::{InputSchema, OutputSchema};

/// The raw value a user function hands back, before output classification
/// decides how it gets published.
#[derive(Debug, Clone)]
pub enum CallableValue {
    Entity(store_core::EntityHandle),
    EntityList(Vec<store_core::EntityHandle>),
    Scalar(Json),
}

pub type SyncCallable = Arc<dyn Fn(&ResolvedArgs) -> Result<CallableValue, CoreError> + Send + Sync>;
pub type AsyncCallable =
    Arc<dyn Fn(ResolvedArgs) -> Pin<Box<dyn Future<Output = Result<CallableValue, CoreError>> + Send>> + Send + Sync>;

#[derive(Clone)]
pub enum Callable {
    Sync(SyncCallable),
    Async(AsyncCallable),
}

/// One registered function: the callable itself plus everything C7 needs to
/// classify and publish its calls.
#[derive(Clone)]
pub struct FunctionEntry {
    pub name: String,
    pub input_schema: InputSchema,
    pub output_schema: OutputSchema,
    pub callable: Callable,
}

impl FunctionEntry {
    pub fn is_async(&self) -> bool {
        matches!(self.callable, Callable::Async(_))
    }
}

/// Published metadata twin of a [`FunctionEntry`], versioned the same way
/// any other entity is, so a function's declared signature history can be
/// inspected through the registry rather than only held in memory.
#[derive(Debug, Clone)]
pub struct CallableFunction {
    pub header: EntityHeader,
    pub name: String,
    pub param_names: Vec<String>,
    pub is_async: bool,
}

impl CallableFunction {
    pub fn new(name: impl Into<String>, param_names: Vec<String>, is_async: bool) -> Self {
        Self { header: EntityHeader::new_root(), name: name.into(), param_names, is_async }
    }
}

impl IsEntity for CallableFunction {
    fn header(&self) -> &EntityHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut EntityHeader {
        &mut self.header
    }

    fn type_name(&self) -> &'static str {
        "CallableFunction"
    }

    fn field_descriptors(&self) -> &'static [FieldDescriptor] {
        const DESCS: [FieldDescriptor; 3] = [
            FieldDescriptor { name: "name", kind: FieldKind::Primitive },
            FieldDescriptor { name: "param_names", kind: FieldKind::Primitive },
            FieldDescriptor { name: "is_async", kind: FieldKind::Primitive },
        ];
        &DESCS
    }

    fn field_value(&self, name: &str) -> Option<FieldValue> {
        match name {
            "name" => Some(FieldValue::Primitive(Json::from(self.name.clone()))),
            "param_names" => Some(FieldValue::Primitive(Json::from(self.param_names.clone()))),
            "is_async" => Some(FieldValue::Primitive(Json::from(self.is_async))),
            _ => None,
        }
    }

    fn clone_boxed(&self) -> Box<dyn IsEntity> {
        Box::new(self.clone())
    }
}
