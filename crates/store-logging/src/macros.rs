//! Canonical op-boundary logging macros.

/// Log the start of an operation.
#[macro_export]
macro_rules! log_op_start {
    ($op:expr) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = store_core_types::schema::EVENT_START,
        );
    };
    ($op:expr, $($field:tt)*) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = store_core_types::schema::EVENT_START,
            $($field)*
        );
    };
}

/// Log the successful end of an operation.
#[macro_export]
macro_rules! log_op_end {
    ($op:expr, duration_ms = $duration:expr) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = store_core_types::schema::EVENT_END,
            duration_ms = $duration,
        );
    };
    ($op:expr, duration_ms = $duration:expr, $($field:tt)*) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = store_core_types::schema::EVENT_END,
            duration_ms = $duration,
            $($field)*
        );
    };
}

/// Log an operation error. Accepts anything convertible into `store_errors::CoreError`.
#[macro_export]
macro_rules! log_op_error {
    ($op:expr, $err:expr, duration_ms = $duration:expr) => {{
        let core_err: store_errors::CoreError = $err.into();
        tracing::error!(
            component = module_path!(),
            op = $op,
            event = store_core_types::schema::EVENT_END_ERROR,
            duration_ms = $duration,
            err_kind = ?core_err.kind(),
            err_code = core_err.code(),
        );
    }};
}
