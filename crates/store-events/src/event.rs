//! The event value itself: a dotted type name, a phase, and the
//! parent/lineage correlation fields that let subscribers reconstruct the
//! call tree a given event was emitted from.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value as Json};
use store_core_types::LogicalId;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventPhase {
    Started,
    Completed,
    Failed,
}

#[derive(Debug, Clone)]
pub struct Event {
    pub id: Uuid,
    pub event_type: String,
    pub phase: EventPhase,
    pub lineage_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub subject_logical_id: Option<LogicalId>,
    pub metadata: Map<String, Json>,
    pub emitted_at: DateTime<Utc>,
    pub duration_ms: Option<u64>,
}

impl Event {
    /// A fresh, parentless event starting a new lineage.
    pub fn new(event_type: impl Into<String>, phase: EventPhase) -> Self {
        let id = Uuid::now_v7();
        Self {
            id,
            event_type: event_type.into(),
            phase,
            lineage_id: id,
            parent_id: None,
            subject_logical_id: None,
            metadata: Map::new(),
            emitted_at: Utc::now(),
            duration_ms: None,
        }
    }

    /// An event correlated under an existing parent/lineage.
    pub fn child_of(parent_id: Uuid, lineage_id: Uuid, event_type: impl Into<String>, phase: EventPhase) -> Self {
        Self {
            id: Uuid::now_v7(),
            event_type: event_type.into(),
            phase,
            lineage_id,
            parent_id: Some(parent_id),
            subject_logical_id: None,
            metadata: Map::new(),
            emitted_at: Utc::now(),
            duration_ms: None,
        }
    }

    pub fn with_subject(mut self, id: LogicalId) -> Self {
        self.subject_logical_id = Some(id);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Json>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_duration_ms(mut self, ms: u64) -> Self {
        self.duration_ms = Some(ms);
        self
    }
}
