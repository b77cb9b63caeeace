//! `emit_with_children`: the nesting pattern shared by every "do some work,
//! emit a starting event, then emit completion events for whatever the work
//! produced" call site in the original system's event bridge
//! (`emit_creation_events`, `emit_processing_events`, `emit_timed_operation`,
//! ...). A closure stands in for Python's async generator: it is handed the
//! ambient parent context and returns the child event once its work
//! completes, with duration measured around the call.

use std::time::Instant;

use futures::future::BoxFuture;
use store_errors::CoreError;

use crate::bus::EventBus;
use crate::context::EventContext;
use crate::event::Event;

pub type ChildFactory = Box<dyn FnOnce() -> BoxFuture<'static, Result<Event, CoreError>> + Send>;

/// Emit `parent`, run each child factory nested under it (so any event a
/// factory emits along the way is itself correlated to `parent` via
/// [`EventContext`]), then emit every child event produced. Returns `parent`
/// back to the caller for further chaining.
pub async fn emit_with_children(
    bus: &EventBus,
    parent: Event,
    children: Vec<ChildFactory>,
) -> Result<Event, CoreError> {
    let parent_id = parent.id;
    let lineage_id = parent.lineage_id;
    bus.emit(parent.clone()).await?;

    let produced = EventContext::enter(parent_id, lineage_id, move || async move {
        let mut results = Vec::with_capacity(children.len());
        for factory in children {
            let started = Instant::now();
            let outcome = factory().await;
            results.push(outcome.map(|event| {
                if event.duration_ms.is_some() {
                    event
                } else {
                    event.with_duration_ms(started.elapsed().as_millis() as u64)
                }
            }));
        }
        results
    })
    .await;

    for result in produced {
        bus.emit(result?).await?;
    }

    Ok(parent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventPhase;
    use crate::subscription::{Handler, Subscription};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::Mutex;

    #[tokio::test]
    async fn children_are_correlated_to_the_parent() {
        let (bus, _drain) = EventBus::spawn(16, 16);
        let observed = Arc::new(Mutex::new(Vec::new()));
        let observed_clone = observed.clone();

        bus.subscribe(Subscription::new(Handler::Async(Arc::new(move |event| {
            let observed = observed_clone.clone();
            Box::pin(async move {
                observed.lock().await.push((event.event_type.clone(), event.parent_id));
            })
        }))))
        .await;

        let parent = Event::new("function.executing", EventPhase::Started);
        let parent_id = parent.id;

        emit_with_children(
            &bus,
            parent,
            vec![Box::new(|| {
                Box::pin(async move { Ok(Event::new("entity.versioned", EventPhase::Completed)) })
            })],
        )
        .await
        .unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        let seen = observed.lock().await.clone();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], ("function.executing".to_string(), None));
        assert_eq!(seen[1], ("entity.versioned".to_string(), Some(parent_id)));
    }

    #[tokio::test]
    async fn a_failing_child_factory_propagates_without_emitting_it() {
        let (bus, _drain) = EventBus::spawn(16, 16);
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        bus.subscribe(Subscription::new(Handler::Sync(Arc::new(move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        }))))
        .await;

        let parent = Event::new("function.executing", EventPhase::Started);
        let result = emit_with_children(
            &bus,
            parent,
            vec![Box::new(|| {
                Box::pin(async move {
                    Err(CoreError::new(store_errors::CoreErrorKind::FunctionFailed).with_op("child"))
                })
            })],
        )
        .await;

        assert!(result.is_err());
        tokio::time::sleep(Duration::from_millis(20)).await;
        // Only the parent was emitted; the failing child never was.
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
