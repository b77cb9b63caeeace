//! Shared id newtypes, correlation types, and canonical field/event names
//! used by every crate in the workspace.

pub mod correlation;
pub mod ids;
pub mod schema;

pub use correlation::{RequestContext, RequestId, SpanId, TraceId};
pub use ids::{ExecutionId, LineageId, LiveId, LogicalId};
