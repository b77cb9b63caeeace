//! The bus: a bounded queue, a background drain task that dispatches to
//! matching subscribers in priority order, a bounded history ring, and
//! running totals.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::event::{Event, EventPhase};
use crate::subscription::{Handler, Subscription};

#[derive(Debug, Clone, Default)]
pub struct BusStats {
    pub total_events: u64,
    pub per_type: HashMap<String, u64>,
}

struct Shared {
    subscriptions: RwLock<Vec<Subscription>>,
    history: Mutex<VecDeque<Event>>,
    history_capacity: usize,
    stats: Mutex<BusStats>,
}

/// A bounded, subscribable event channel. Cloning an `EventBus` shares the
/// same queue, subscriber list, and history.
#[derive(Clone)]
pub struct EventBus {
    sender: mpsc::Sender<Event>,
    shared: Arc<Shared>,
}

impl EventBus {
    /// Spawn the bus's drain task and return the handle plus a `JoinHandle`
    /// the caller may hold to await shutdown (dropping the bus closes the
    /// channel and lets the drain task exit).
    pub fn spawn(queue_capacity: usize, history_capacity: usize) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(queue_capacity);
        let shared = Arc::new(Shared {
            subscriptions: RwLock::new(Vec::new()),
            history: Mutex::new(VecDeque::with_capacity(history_capacity)),
            history_capacity,
            stats: Mutex::new(BusStats::default()),
        });

        let drain_shared = shared.clone();
        let self_sender = sender.clone();
        let handle = tokio::spawn(async move { drain(receiver, drain_shared, self_sender).await });

        (Self { sender, shared }, handle)
    }

    /// Enqueue an event. Awaits capacity if the queue is full.
    pub async fn emit(&self, event: Event) -> Result<(), store_errors::CoreError> {
        self.sender.send(event).await.map_err(|_| {
            store_errors::CoreError::new(store_errors::CoreErrorKind::Internal)
                .with_op("emit")
                .with_message("event bus drain task has shut down")
        })
    }

    pub async fn subscribe(&self, subscription: Subscription) -> Uuid {
        let id = subscription.id;
        self.shared.subscriptions.write().await.push(subscription);
        id
    }

    pub async fn unsubscribe(&self, id: Uuid) {
        self.shared.subscriptions.write().await.retain(|s| s.id != id);
    }

    pub async fn history(&self) -> Vec<Event> {
        self.shared.history.lock().await.iter().cloned().collect()
    }

    pub async fn stats(&self) -> BusStats {
        self.shared.stats.lock().await.clone()
    }
}

async fn drain(mut receiver: mpsc::Receiver<Event>, shared: Arc<Shared>, self_sender: mpsc::Sender<Event>) {
    while let Some(event) = receiver.recv().await {
        {
            let mut history = shared.history.lock().await;
            if history.len() == shared.history_capacity {
                history.pop_front();
            }
            history.push_back(event.clone());
        }
        {
            let mut stats = shared.stats.lock().await;
            stats.total_events += 1;
            *stats.per_type.entry(event.event_type.clone()).or_insert(0) += 1;
        }

        let mut matched: Vec<Subscription> = {
            let subs = shared.subscriptions.read().await;
            subs.iter().filter(|s| s.matches(&event)).cloned().collect()
        };
        matched.sort_by(|a, b| b.priority.cmp(&a.priority));

        for sub in matched {
            dispatch(event.clone(), sub, self_sender.clone()).await;
        }
    }
}

async fn dispatch(event: Event, sub: Subscription, self_sender: mpsc::Sender<Event>) {
    let started = Instant::now();
    let run = run_handler(event.clone(), sub.handler.clone());

    let outcome = match sub.timeout {
        Some(timeout) => tokio::time::timeout(timeout, run).await,
        None => Ok(run.await),
    };

    if outcome.is_err() {
        tracing::warn!(event_type = %event.event_type, subscription = %sub.id, "handler timed out");
        let timeout_event = Event::child_of(event.id, event.lineage_id, "handler.timeout", EventPhase::Failed)
            .with_duration_ms(started.elapsed().as_millis() as u64);
        let _ = self_sender.send(timeout_event).await;
    }
}

async fn run_handler(event: Event, handler: Handler) {
    match handler {
        Handler::Sync(f) => f(&event),
        Handler::Async(f) => f(event).await,
    }
}
