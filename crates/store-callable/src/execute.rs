//! `CallableRegistry`: registration plus the `execute`/`aexecute` pipeline:
//! classify arguments, materialize references, run the user function,
//! classify its output, publish the result(s), and emit correlated events.
//! A direct structural translation of the original system's
//! `CallableRegistry.register`/`execute`/`aexecute`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value as Json;
use tokio::sync::RwLock;
use uuid::Uuid;

use store_core::EntityHandle;
use store_core_types::ExecutionId;
use store_errors::{CoreError, CoreErrorKind};
use store_events::{event_type, Event, EventBus, EventContext, EventPhase};
use store_logging::{log_op_end, log_op_start};
use store_registry::Registry;

use crate::classify::{classify_arguments, ArgValue};
use crate::function::{Callable, CallableFunction, CallableValue, FunctionEntry};
use crate::resolve::{materialize, ResolvedArgs};
use crate::schema::{InputSchema, OutputSchema, OutputShape};

/// The published result of one call: a single new root, or several
/// cross-linked roots (tuple/collection outputs).
#[derive(Debug, Clone)]
pub enum CallableOutput {
    Single(store_core_types::LogicalId),
    Multiple(Vec<store_core_types::LogicalId>),
}

pub struct CallableRegistry {
    registry: Arc<Registry>,
    bus: Arc<EventBus>,
    functions: RwLock<HashMap<String, FunctionEntry>>,
}

impl CallableRegistry {
    pub fn new(registry: Arc<Registry>, bus: Arc<EventBus>) -> Self {
        Self { registry, bus, functions: RwLock::new(HashMap::new()) }
    }

    /// Register `name`, replacing any prior entry under the same name, and
    /// publish its `CallableFunction` metadata record as a new root.
    pub async fn register(
        &self,
        name: impl Into<String>,
        input_schema: InputSchema,
        output_schema: OutputSchema,
        callable: Callable,
    ) -> Result<(), CoreError> {
        let name = name.into();
        let is_async = matches!(callable, Callable::Async(_));
        let entry = FunctionEntry { name: name.clone(), input_schema, output_schema, callable };

        let metadata = CallableFunction::new(name.clone(), entry.input_schema.names(), is_async);
        self.registry.publish(Arc::new(metadata), &self.bus).await?;

        self.functions.write().await.insert(name, entry);
        Ok(())
    }

    async fn lookup(&self, name: &str) -> Result<FunctionEntry, CoreError> {
        self.functions.read().await.get(name).cloned().ok_or_else(|| {
            CoreError::new(CoreErrorKind::FunctionFailed)
                .with_op("execute")
                .with_message(format!("function '{name}' is not registered"))
        })
    }

    /// Run `name` against `args`, awaiting the user function on the current
    /// scheduler whether it is declared sync or async. `function.executing`
    /// is emitted before any work starts; every entity/tree event the call
    /// produces (argument classification, publication) is correlated under
    /// it via [`EventContext`], and `function.executed` is emitted last.
    pub async fn execute(
        &self,
        name: &str,
        args: HashMap<String, ArgValue>,
    ) -> Result<CallableOutput, CoreError> {
        log_op_start!("execute");
        let started = Instant::now();
        let entry = self.lookup(name).await?;
        let execution_id = ExecutionId::new();

        let parent = Event::new(event_type::FUNCTION_EXECUTING, EventPhase::Started)
            .with_metadata("function", Json::from(name));
        let parent_id = parent.id;
        let lineage_id = parent.lineage_id;
        self.bus.emit(parent).await?;

        let result = EventContext::enter(parent_id, lineage_id, || async {
            let detect_started = Instant::now();
            self.bus
                .emit(Event::child_of(parent_id, lineage_id, event_type::STRATEGY_DETECTING, EventPhase::Started))
                .await?;
            let pattern = classify_arguments(&entry.input_schema, &args)?;
            self.bus
                .emit(
                    Event::child_of(parent_id, lineage_id, event_type::STRATEGY_DETECTED, EventPhase::Completed)
                        .with_metadata("pattern", Json::from(format!("{pattern:?}")))
                        .with_duration_ms(detect_started.elapsed().as_millis() as u64),
                )
                .await?;

            let resolved = materialize(&self.registry, &self.bus, &entry.input_schema, args).await?;
            validate_required(&entry.input_schema, &resolved)?;

            let value = match run_callable(&entry, resolved).await {
                Ok(value) => value,
                Err(err) => {
                    let duration_ms = started.elapsed().as_millis() as u64;
                    emit_completion_child(
                        &self.bus,
                        parent_id,
                        lineage_id,
                        name,
                        &CallableOutput::Multiple(Vec::new()),
                        duration_ms,
                        Some(&err),
                    )
                    .await?;
                    return Err(err);
                }
            };

            // Once the user function has returned, publication must run to
            // completion regardless of whether the calling task is later
            // cancelled: spawn it as a detached task so dropping `execute`'s
            // future cannot abort a half-applied publish. `EventContext` is
            // task-local, so the spawned task re-enters the same parent
            // scope explicitly to keep its events correlated.
            let registry = self.registry.clone();
            let bus = self.bus.clone();
            let schema = entry.output_schema.clone();
            let name_owned = name.to_string();
            let handle = tokio::spawn(async move {
                let outcome = EventContext::enter(parent_id, lineage_id, || {
                    publish_output(&registry, &bus, &schema, value, &name_owned, execution_id)
                })
                .await;
                let duration_ms = started.elapsed().as_millis() as u64;
                match &outcome {
                    Ok(output) => {
                        let _ =
                            emit_completion_child(&bus, parent_id, lineage_id, &name_owned, output, duration_ms, None)
                                .await;
                    }
                    Err(err) => {
                        let _ = emit_completion_child(
                            &bus,
                            parent_id,
                            lineage_id,
                            &name_owned,
                            &CallableOutput::Multiple(Vec::new()),
                            duration_ms,
                            Some(err),
                        )
                        .await;
                    }
                }
                outcome
            });

            handle.await.unwrap_or_else(|_| {
                Err(CoreError::new(CoreErrorKind::Internal)
                    .with_op("execute")
                    .with_message(format!("publication task for '{name}' panicked")))
            })
        })
        .await;

        log_op_end!("execute", duration_ms = started.elapsed().as_millis() as u64);
        result
    }

    /// Convenience alias: every registered function, sync or async, is
    /// already awaited in [`execute`]. Kept distinct so call sites can name
    /// their intent the way the original `aexecute` does.
    pub async fn aexecute(
        &self,
        name: &str,
        args: HashMap<String, ArgValue>,
    ) -> Result<CallableOutput, CoreError> {
        self.execute(name, args).await
    }
}

/// Emit `function.executed` as a child of the call's `function.executing`
/// parent, which was already emitted at the start of [`CallableRegistry::execute`].
async fn emit_completion_child(
    bus: &EventBus,
    parent_id: Uuid,
    lineage_id: Uuid,
    name: &str,
    output: &CallableOutput,
    duration_ms: u64,
    error: Option<&CoreError>,
) -> Result<(), CoreError> {
    let phase = if error.is_some() { EventPhase::Failed } else { EventPhase::Completed };
    let ids: Vec<store_core_types::LogicalId> = match output {
        CallableOutput::Single(id) => vec![*id],
        CallableOutput::Multiple(ids) => ids.clone(),
    };

    let mut event = Event::child_of(parent_id, lineage_id, event_type::FUNCTION_EXECUTED, phase)
        .with_metadata("function", Json::from(name))
        .with_duration_ms(duration_ms);
    if let Some(id) = ids.first() {
        event = event.with_subject(*id);
    }
    if let Some(err) = error {
        event = event.with_metadata("error", Json::from(err.to_string()));
    }
    bus.emit(event).await
}

async fn publish_output(
    registry: &Arc<Registry>,
    bus: &EventBus,
    schema: &OutputSchema,
    value: CallableValue,
    name: &str,
    execution_id: ExecutionId,
) -> Result<CallableOutput, CoreError> {
    match (&schema.shape, value) {
        (OutputShape::SingleEntity(_), CallableValue::Entity(handle)) => {
            let lineage_id = handle.header().lineage_id;
            let stamped = stamp_provenance(handle, name, execution_id);
            let outcome = registry.publish(stamped, bus).await?;
            Ok(CallableOutput::Single(root_id_for(registry, outcome, lineage_id).await?))
        }
        (OutputShape::EntityTuple(_), CallableValue::EntityList(handles))
        | (OutputShape::EntityCollection(_), CallableValue::EntityList(handles)) => {
            let lineages: Vec<_> = handles.iter().map(|h| h.header().lineage_id).collect();
            let stamped: Vec<EntityHandle> =
                handles.into_iter().map(|h| stamp_provenance(h, name, execution_id)).collect();
            let outcomes = registry.publish_linked(stamped, bus).await?;
            let mut ids = Vec::with_capacity(outcomes.len());
            for (outcome, lineage_id) in outcomes.into_iter().zip(lineages) {
                ids.push(root_id_for(registry, outcome, lineage_id).await?);
            }
            Ok(CallableOutput::Multiple(ids))
        }
        (OutputShape::NonEntity(type_name), value) => {
            let wrapped = wrap_non_entity(value, type_name);
            let lineage_id = wrapped.header.lineage_id;
            let stamped = stamp_provenance(Arc::new(wrapped), name, execution_id);
            let outcome = registry.publish(stamped, bus).await?;
            Ok(CallableOutput::Single(root_id_for(registry, outcome, lineage_id).await?))
        }
        _ => Err(CoreError::new(CoreErrorKind::UnsupportedArgumentPattern)
            .with_op("publish_output")
            .with_message("function return shape did not match its declared output schema")),
    }
}

/// `publish`/`publish_linked` report `Unchanged` for an identity-preserving
/// transform; the call still has a result, just not a new version, so
/// resolve it back to the lineage's current root.
async fn root_id_for(
    registry: &Arc<Registry>,
    outcome: store_core::PublishOutcome,
    lineage_id: store_core_types::LineageId,
) -> Result<store_core_types::LogicalId, CoreError> {
    match outcome {
        store_core::PublishOutcome::NewVersion { new_root, .. } => Ok(new_root),
        store_core::PublishOutcome::Unchanged => registry
            .get_latest_tree(lineage_id)
            .await
            .map(|tree| tree.root_logical_id)
            .ok_or_else(|| {
                CoreError::new(CoreErrorKind::Internal)
                    .with_op("publish_output")
                    .with_message("unchanged outcome has no existing lineage to resolve")
            }),
    }
}

fn validate_required(schema: &InputSchema, resolved: &ResolvedArgs) -> Result<(), CoreError> {
    for name in schema.names() {
        if !resolved.contains_key(&name) {
            return Err(CoreError::new(CoreErrorKind::InputValidationFailed)
                .with_op("execute")
                .with_message(format!("missing required argument '{name}'")));
        }
    }
    Ok(())
}

async fn run_callable(entry: &FunctionEntry, args: ResolvedArgs) -> Result<CallableValue, CoreError> {
    match &entry.callable {
        Callable::Sync(f) => f(&args),
        Callable::Async(f) => f(args).await,
    }
    .map_err(|err| {
        CoreError::new(CoreErrorKind::FunctionFailed)
            .with_op("execute")
            .with_message(format!("'{}' failed", entry.name))
            .with_source(err)
    })
}

fn stamp_provenance(handle: EntityHandle, name: &str, execution_id: ExecutionId) -> EntityHandle {
    let mut cloned = handle.clone_boxed();
    let header = cloned.header_mut();
    header.derived_from_function = Some(name.to_string());
    header.derived_from_execution_id = Some(execution_id);
    Arc::from(cloned)
}

fn wrap_non_entity(value: CallableValue, type_name: &'static str) -> store_core::Container {
    let json = match value {
        CallableValue::Scalar(json) => json,
        CallableValue::Entity(_) | CallableValue::EntityList(_) => Json::Null,
    };
    store_core::Container::new(json, type_name)
}
