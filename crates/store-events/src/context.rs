//! Parent/child correlation via an implicit async context, the Rust
//! analogue of the original system's contextvar-carried parent event.

use std::cell::Cell;
use std::future::Future;

use uuid::Uuid;

tokio::task_local! {
    static CURRENT_PARENT: Cell<Option<(Uuid, Uuid)>>;
}

/// Handle onto the ambient (parent_id, lineage_id) pair for the task
/// currently executing inside an [`enter`] scope.
pub struct EventContext;

impl EventContext {
    /// The `(parent_id, lineage_id)` established by the nearest enclosing
    /// [`EventContext::enter`], if any.
    pub fn current() -> Option<(Uuid, Uuid)> {
        CURRENT_PARENT.try_with(|c| c.get()).unwrap_or(None)
    }

    /// Run `f` with `parent_id`/`lineage_id` as the ambient parent for any
    /// event constructed inside it. Nesting composes: the previous scope is
    /// restored once `f`'s future resolves, including on early return via
    /// `?`.
    pub async fn enter<F, Fut, T>(parent_id: Uuid, lineage_id: Uuid, f: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        CURRENT_PARENT.scope(Cell::new(Some((parent_id, lineage_id))), f()).await
    }
}
