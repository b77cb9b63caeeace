//! Subscriptions: what a handler matches against, and how it runs.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::event::Event;

pub type SyncHandler = Arc<dyn Fn(&Event) + Send + Sync>;
pub type AsyncHandler = Arc<dyn Fn(Event) -> BoxFuture<'static, ()> + Send + Sync>;

#[derive(Clone)]
pub enum Handler {
    Sync(SyncHandler),
    Async(AsyncHandler),
}

pub type Predicate = Arc<dyn Fn(&Event) -> bool + Send + Sync>;

#[derive(Clone)]
pub struct Subscription {
    pub id: Uuid,
    pub type_filter: Option<String>,
    pub glob: Option<String>,
    pub predicate: Option<Predicate>,
    pub priority: i32,
    pub timeout: Option<Duration>,
    pub handler: Handler,
}

impl Subscription {
    pub fn new(handler: Handler) -> Self {
        Self {
            id: Uuid::now_v7(),
            type_filter: None,
            glob: None,
            predicate: None,
            priority: 0,
            timeout: None,
            handler,
        }
    }

    pub fn with_type(mut self, event_type: impl Into<String>) -> Self {
        self.type_filter = Some(event_type.into());
        self
    }

    pub fn with_glob(mut self, pattern: impl Into<String>) -> Self {
        self.glob = Some(pattern.into());
        self
    }

    pub fn with_predicate(mut self, predicate: Predicate) -> Self {
        self.predicate = Some(predicate);
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn matches(&self, event: &Event) -> bool {
        if let Some(t) = &self.type_filter {
            if &event.event_type != t {
                return false;
            }
        }
        if let Some(glob) = &self.glob {
            if !glob_match(glob, &event.event_type) {
                return false;
            }
        }
        if let Some(predicate) = &self.predicate {
            if !predicate(event) {
                return false;
            }
        }
        true
    }
}

/// Segment-wise glob match over a dotted event type: `*` matches exactly one
/// segment, any other segment must match literally.
fn glob_match(pattern: &str, value: &str) -> bool {
    let pattern_segments: Vec<&str> = pattern.split('.').collect();
    let value_segments: Vec<&str> = value.split('.').collect();
    if pattern_segments.len() != value_segments.len() {
        return false;
    }
    pattern_segments
        .iter()
        .zip(value_segments.iter())
        .all(|(p, v)| *p == "*" || p == v)
}
