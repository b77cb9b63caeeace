//! Cross-cutting error facility.
//!
//! Every crate in the workspace defines its own precise, matchable
//! `thiserror` enum for its own concerns, and provides `impl From<X> for
//! CoreError` so that any crate's error flows into this single, stably-coded
//! value at API boundaries, logs, and emitted events.

use std::fmt;

use store_core_types::{LogicalId, RequestId, TraceId};

/// The shared error taxonomy used across the store's crates, independent of which
/// crate's internal enum actually produced the failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreErrorKind {
    InvalidAddress,
    EntityNotFound,
    FieldNotFound,
    MultiParentContainment,
    CycleDetected,
    UnsupportedArgumentPattern,
    InputValidationFailed,
    FunctionFailed,
    HandlerTimeout,
    Cancelled,
    Serialization,
    Internal,
}

impl CoreErrorKind {
    /// Stable string code, safe to log or expose to a future external surface.
    pub fn code(&self) -> &'static str {
        match self {
            CoreErrorKind::InvalidAddress => "ERR_INVALID_ADDRESS",
            CoreErrorKind::EntityNotFound => "ERR_ENTITY_NOT_FOUND",
            CoreErrorKind::FieldNotFound => "ERR_FIELD_NOT_FOUND",
            CoreErrorKind::MultiParentContainment => "ERR_MULTI_PARENT_CONTAINMENT",
            CoreErrorKind::CycleDetected => "ERR_CYCLE_DETECTED",
            CoreErrorKind::UnsupportedArgumentPattern => "ERR_UNSUPPORTED_ARGUMENT_PATTERN",
            CoreErrorKind::InputValidationFailed => "ERR_INPUT_VALIDATION_FAILED",
            CoreErrorKind::FunctionFailed => "ERR_FUNCTION_FAILED",
            CoreErrorKind::HandlerTimeout => "ERR_HANDLER_TIMEOUT",
            CoreErrorKind::Cancelled => "ERR_CANCELLED",
            CoreErrorKind::Serialization => "ERR_SERIALIZATION",
            CoreErrorKind::Internal => "ERR_INTERNAL",
        }
    }
}

/// A tagged, builder-constructed error value carrying enough context to log
/// or report without re-deriving it from the call site.
#[derive(Debug)]
pub struct CoreError {
    kind: CoreErrorKind,
    op: Option<&'static str>,
    logical_id: Option<LogicalId>,
    request_id: Option<RequestId>,
    trace_id: Option<TraceId>,
    message: Option<String>,
    available: Vec<String>,
    source: Option<Box<CoreError>>,
}

impl CoreError {
    pub fn new(kind: CoreErrorKind) -> Self {
        Self {
            kind,
            op: None,
            logical_id: None,
            request_id: None,
            trace_id: None,
            message: None,
            available: Vec::new(),
            source: None,
        }
    }

    pub fn with_op(mut self, op: &'static str) -> Self {
        self.op = Some(op);
        self
    }

    pub fn with_logical_id(mut self, id: LogicalId) -> Self {
        self.logical_id = Some(id);
        self
    }

    pub fn with_request_id(mut self, id: RequestId) -> Self {
        self.request_id = Some(id);
        self
    }

    pub fn with_trace_id(mut self, id: TraceId) -> Self {
        self.trace_id = Some(id);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Attach the set of available field/index names, for `FieldNotFound`.
    pub fn with_available(mut self, available: Vec<String>) -> Self {
        self.available = available;
        self
    }

    pub fn with_source(mut self, source: CoreError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn kind(&self) -> CoreErrorKind {
        self.kind
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn available_fields(&self) -> &[String] {
        &self.available
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.kind.code(), self.kind_label())?;
        if let Some(op) = self.op {
            write!(f, " during {op}")?;
        }
        if let Some(id) = &self.logical_id {
            write!(f, " [logical_id={id}]")?;
        }
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        if !self.available.is_empty() {
            write!(f, " (available: {})", self.available.join(", "))?;
        }
        Ok(())
    }
}

impl CoreError {
    fn kind_label(&self) -> &'static str {
        match self.kind {
            CoreErrorKind::InvalidAddress => "invalid address",
            CoreErrorKind::EntityNotFound => "entity not found",
            CoreErrorKind::FieldNotFound => "field not found",
            CoreErrorKind::MultiParentContainment => "multi-parent containment",
            CoreErrorKind::CycleDetected => "cycle detected",
            CoreErrorKind::UnsupportedArgumentPattern => "unsupported argument pattern",
            CoreErrorKind::InputValidationFailed => "input validation failed",
            CoreErrorKind::FunctionFailed => "function failed",
            CoreErrorKind::HandlerTimeout => "handler timeout",
            CoreErrorKind::Cancelled => "cancelled",
            CoreErrorKind::Serialization => "serialization error",
            CoreErrorKind::Internal => "internal error",
        }
    }
}

impl std::error::Error for CoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_deref().map(|e| e as &(dyn std::error::Error + 'static))
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::new(CoreErrorKind::Serialization).with_message(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_code_and_message() {
        let err = CoreError::new(CoreErrorKind::EntityNotFound)
            .with_op("get_entity")
            .with_message("no such id");
        let rendered = err.to_string();
        assert!(rendered.contains("ERR_ENTITY_NOT_FOUND"));
        assert!(rendered.contains("get_entity"));
        assert!(rendered.contains("no such id"));
    }

    #[test]
    fn field_not_found_carries_available_names() {
        let err = CoreError::new(CoreErrorKind::FieldNotFound)
            .with_available(vec!["name".into(), "gpa".into()]);
        assert_eq!(err.available_fields(), &["name".to_string(), "gpa".to_string()]);
    }
}
