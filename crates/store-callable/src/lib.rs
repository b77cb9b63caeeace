//! C7: Callable Registry & Execution Strategies.

pub mod classify;
pub mod execute;
pub mod function;
pub mod resolve;
pub mod schema;

pub use classify::{ArgKind, ArgPattern, ArgValue, classify_arguments};
pub use execute::{CallableOutput, CallableRegistry};
pub use function::{Callable, CallableFunction, CallableValue, FunctionEntry};
pub use resolve::{materialize, ResolvedArgs, ResolvedValue};
pub use schema::{FieldType, InputSchema, OutputSchema, OutputShape, PrimitiveType};
