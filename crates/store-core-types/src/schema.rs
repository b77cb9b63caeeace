//! Canonical field names and event type strings shared by logging and the
//! event bus, so both sides stay in sync without stringly-typed duplication.

pub const FIELD_COMPONENT: &str = "component";
pub const FIELD_OP: &str = "op";
pub const FIELD_EVENT: &str = "event";
pub const FIELD_DURATION_MS: &str = "duration_ms";
pub const FIELD_REQUEST_ID: &str = "request_id";
pub const FIELD_TRACE_ID: &str = "trace_id";
pub const FIELD_SPAN_ID: &str = "span_id";
pub const FIELD_LOGICAL_ID: &str = "logical_id";
pub const FIELD_LINEAGE_ID: &str = "lineage_id";
pub const FIELD_ERR_KIND: &str = "err_kind";
pub const FIELD_ERR_CODE: &str = "err_code";

pub const EVENT_START: &str = "op.start";
pub const EVENT_END: &str = "op.end";
pub const EVENT_END_ERROR: &str = "op.end_error";

/// Contractual event-bus type strings, dotted-lowercase and stable across versions.
pub mod event_type {
    pub const ENTITY_CREATED: &str = "entity.created";
    pub const ENTITY_PROMOTED: &str = "entity.promoted";
    pub const ENTITY_VERSIONING: &str = "entity.versioning";
    pub const ENTITY_VERSIONED: &str = "entity.versioned";
    pub const ENTITY_BORROWED: &str = "entity.borrowed";
    pub const ENTITY_DETACHED: &str = "entity.detached";
    pub const ENTITY_ATTACHED: &str = "entity.attached";
    pub const TREE_BUILDING: &str = "tree.building";
    pub const TREE_BUILT: &str = "tree.built";
    pub const CHANGES_DETECTING: &str = "changes.detecting";
    pub const CHANGES_DETECTED: &str = "changes.detected";
    pub const FUNCTION_EXECUTING: &str = "function.executing";
    pub const FUNCTION_EXECUTED: &str = "function.executed";
    pub const STRATEGY_DETECTING: &str = "strategy.detecting";
    pub const STRATEGY_DETECTED: &str = "strategy.detected";
    pub const CONFIG_CREATING: &str = "config.creating";
    pub const CONFIG_CREATED: &str = "config.created";
    pub const HANDLER_TIMEOUT: &str = "handler.timeout";
}
