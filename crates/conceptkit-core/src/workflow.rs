//! # Workflow Concept
//!
//! Per-(entity, workflow) current-state tracking, validated against a
//! transition table registered ahead of time.
//!
//! States and transitions are data: the engine is generic over any workflow
//! definition. Terminal states are simply states with no outgoing
//! transitions. An entity must already hold a state (see [`seed_state`])
//! before `transition` accepts it.
//!
//! ## Guards
//!
//! Every transition carries an opaque guard string. The engine does not
//! interpret it; a [`GuardEvaluator`] decides whether a registered transition
//! may fire. The default, [`AlwaysAllow`], accepts everything.

use crate::concept::{
    Concept, TypedRecord, VariantOutput, optional_text_field, text_field, variant,
};
use crate::primitives::{WORKFLOW, WORKFLOW_STATE, WORKFLOW_TRANSITION};
use crate::storage::RelationStore;
use crate::{Criteria, Key, KernelError, Record};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

// =============================================================================
// GUARDS
// =============================================================================

/// Everything a guard evaluator may inspect about a pending transition.
///
/// Guards run with no store lock held, so `store` may be read freely
/// (role or ownership lookups, for instance).
#[derive(Clone, Copy)]
pub struct GuardContext<'a> {
    pub entity_id: &'a str,
    pub workflow_id: &'a str,
    pub from_state: &'a str,
    pub to_state: &'a str,
    /// The guard string stored with the transition definition.
    pub guard: &'a str,
    pub store: &'a dyn RelationStore,
}

impl fmt::Debug for GuardContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuardContext")
            .field("entity_id", &self.entity_id)
            .field("workflow_id", &self.workflow_id)
            .field("from_state", &self.from_state)
            .field("to_state", &self.to_state)
            .field("guard", &self.guard)
            .finish_non_exhaustive()
    }
}

/// Decides whether a registered transition may fire.
pub trait GuardEvaluator: Send + Sync {
    fn allows(&self, ctx: &GuardContext<'_>) -> bool;
}

/// Default evaluator: every registered transition may fire.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysAllow;

impl GuardEvaluator for AlwaysAllow {
    fn allows(&self, _ctx: &GuardContext<'_>) -> bool {
        true
    }
}

// =============================================================================
// RECORDS
// =============================================================================

/// A named state within a workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowStateDef {
    pub workflow_id: String,
    pub name: String,
    pub config: String,
}

impl TypedRecord for WorkflowStateDef {
    const RELATION: &'static str = WORKFLOW;

    fn key(&self) -> Key {
        Key::triple(&self.workflow_id, "state", &self.name)
    }

    fn to_record(&self) -> Result<Record, KernelError> {
        Ok(Record::new()
            .with("workflow_id", self.workflow_id.as_str())
            .with("state_name", self.name.as_str())
            .with("config", self.config.as_str())
            .with("kind", "state"))
    }

    fn from_record(key: &Key, record: &Record) -> Result<Self, KernelError> {
        Ok(Self {
            workflow_id: text_field(Self::RELATION, key, record, "workflow_id")?,
            name: text_field(Self::RELATION, key, record, "state_name")?,
            config: text_field(Self::RELATION, key, record, "config")?,
        })
    }
}

/// A registered `from -> to` edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowTransition {
    pub workflow_id: String,
    pub from_state: String,
    pub to_state: String,
    pub guard: String,
}

impl WorkflowTransition {
    fn key_for(workflow_id: &str, from_state: &str, to_state: &str) -> Key {
        Key::triple(workflow_id, from_state, to_state)
    }
}

impl TypedRecord for WorkflowTransition {
    const RELATION: &'static str = WORKFLOW_TRANSITION;

    fn key(&self) -> Key {
        Self::key_for(&self.workflow_id, &self.from_state, &self.to_state)
    }

    fn to_record(&self) -> Result<Record, KernelError> {
        Ok(Record::new()
            .with("workflow_id", self.workflow_id.as_str())
            .with("from_state", self.from_state.as_str())
            .with("to_state", self.to_state.as_str())
            .with("guard", self.guard.as_str())
            .with("kind", "transition"))
    }

    fn from_record(key: &Key, record: &Record) -> Result<Self, KernelError> {
        Ok(Self {
            workflow_id: text_field(Self::RELATION, key, record, "workflow_id")?,
            from_state: text_field(Self::RELATION, key, record, "from_state")?,
            to_state: text_field(Self::RELATION, key, record, "to_state")?,
            guard: text_field(Self::RELATION, key, record, "guard")?,
        })
    }
}

/// Current state of one entity in one workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityState {
    pub entity_id: String,
    pub workflow_id: String,
    pub state: String,
    pub previous_state: Option<String>,
}

impl EntityState {
    fn key_for(entity_id: &str, workflow_id: &str) -> Key {
        Key::pair(entity_id, workflow_id)
    }
}

impl TypedRecord for EntityState {
    const RELATION: &'static str = WORKFLOW_STATE;

    fn key(&self) -> Key {
        Self::key_for(&self.entity_id, &self.workflow_id)
    }

    fn to_record(&self) -> Result<Record, KernelError> {
        let mut record = Record::new()
            .with("entity_id", self.entity_id.as_str())
            .with("workflow_id", self.workflow_id.as_str())
            .with("state", self.state.as_str());
        if let Some(previous) = &self.previous_state {
            record.set("previous_state", previous.as_str());
        }
        Ok(record)
    }

    fn from_record(key: &Key, record: &Record) -> Result<Self, KernelError> {
        Ok(Self {
            entity_id: text_field(Self::RELATION, key, record, "entity_id")?,
            workflow_id: text_field(Self::RELATION, key, record, "workflow_id")?,
            state: text_field(Self::RELATION, key, record, "state")?,
            previous_state: optional_text_field(Self::RELATION, key, record, "previous_state")?,
        })
    }
}

/// Give an entity its initial state in a workflow.
///
/// This is the precondition step for `transition`; it is not a handler
/// operation and performs no validation against the transition table.
pub fn seed_state(
    store: &dyn RelationStore,
    entity_id: &str,
    workflow_id: &str,
    state: &str,
) -> Result<(), KernelError> {
    let record = EntityState {
        entity_id: entity_id.to_string(),
        workflow_id: workflow_id.to_string(),
        state: state.to_string(),
        previous_state: None,
    };
    store.put(WORKFLOW_STATE, record.key(), record.to_record()?);
    Ok(())
}

// =============================================================================
// OPERATIONS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefineStateInput {
    pub workflow_id: String,
    pub name: String,
    #[serde(default)]
    pub config: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "variant")]
pub enum DefineStateOutput {
    #[serde(rename = "ok")]
    Ok {
        workflow_id: String,
        state_name: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefineTransitionInput {
    pub workflow_id: String,
    pub from_state: String,
    pub to_state: String,
    #[serde(default)]
    pub guard: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "variant")]
pub enum DefineTransitionOutput {
    #[serde(rename = "ok")]
    Ok {
        workflow_id: String,
        from_state: String,
        to_state: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionInput {
    pub entity_id: String,
    pub workflow_id: String,
    pub target_state: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "variant")]
pub enum TransitionOutput {
    #[serde(rename = "ok")]
    Ok {
        entity_id: String,
        from_state: String,
        to_state: String,
    },
    #[serde(rename = "notAllowed")]
    NotAllowed { message: String },
    #[serde(rename = "notfound")]
    NotFound { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetCurrentStateInput {
    pub entity_id: String,
    pub workflow_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "variant")]
pub enum GetCurrentStateOutput {
    #[serde(rename = "ok")]
    Ok { entity_id: String, state: String },
    #[serde(rename = "notfound")]
    NotFound { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailableTransitionsInput {
    pub entity_id: String,
    pub workflow_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "variant")]
pub enum AvailableTransitionsOutput {
    #[serde(rename = "ok")]
    Ok {
        entity_id: String,
        state: String,
        /// Target states registered from `state`, sorted.
        targets: Vec<String>,
    },
    #[serde(rename = "notfound")]
    NotFound { message: String },
}

impl VariantOutput for DefineStateOutput {
    fn variant(&self) -> &'static str {
        variant::OK
    }

    fn message(&self) -> Option<&str> {
        None
    }
}

impl VariantOutput for DefineTransitionOutput {
    fn variant(&self) -> &'static str {
        variant::OK
    }

    fn message(&self) -> Option<&str> {
        None
    }
}

impl VariantOutput for TransitionOutput {
    fn variant(&self) -> &'static str {
        match self {
            Self::Ok { .. } => variant::OK,
            Self::NotAllowed { .. } => variant::NOT_ALLOWED,
            Self::NotFound { .. } => variant::NOT_FOUND,
        }
    }

    fn message(&self) -> Option<&str> {
        match self {
            Self::Ok { .. } => None,
            Self::NotAllowed { message } | Self::NotFound { message } => Some(message),
        }
    }
}

impl VariantOutput for GetCurrentStateOutput {
    fn variant(&self) -> &'static str {
        match self {
            Self::Ok { .. } => variant::OK,
            Self::NotFound { .. } => variant::NOT_FOUND,
        }
    }

    fn message(&self) -> Option<&str> {
        match self {
            Self::Ok { .. } => None,
            Self::NotFound { message } => Some(message),
        }
    }
}

impl VariantOutput for AvailableTransitionsOutput {
    fn variant(&self) -> &'static str {
        match self {
            Self::Ok { .. } => variant::OK,
            Self::NotFound { .. } => variant::NOT_FOUND,
        }
    }

    fn message(&self) -> Option<&str> {
        match self {
            Self::Ok { .. } => None,
            Self::NotFound { message } => Some(message),
        }
    }
}

// =============================================================================
// HANDLER
// =============================================================================

/// Handler for the workflow concept.
#[derive(Clone)]
pub struct WorkflowHandler {
    guards: Arc<dyn GuardEvaluator>,
}

impl Default for WorkflowHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for WorkflowHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowHandler").finish_non_exhaustive()
    }
}

impl Concept for WorkflowHandler {
    const NAME: &'static str = "workflow";
    const RELATIONS: &'static [&'static str] = &[WORKFLOW, WORKFLOW_TRANSITION, WORKFLOW_STATE];
}

fn no_state_message(entity_id: &str, workflow_id: &str) -> String {
    format!(
        "no state found for entity '{}' in workflow '{}'",
        entity_id, workflow_id
    )
}

impl WorkflowHandler {
    /// Handler with the default always-allow guard evaluator.
    #[must_use]
    pub fn new() -> Self {
        Self::with_guards(Arc::new(AlwaysAllow))
    }

    /// Handler consulting `guards` before any transition fires.
    #[must_use]
    pub fn with_guards(guards: Arc<dyn GuardEvaluator>) -> Self {
        Self { guards }
    }

    /// Register (or overwrite) a state descriptor.
    pub fn define_state(
        &self,
        input: DefineStateInput,
        store: &dyn RelationStore,
    ) -> Result<DefineStateOutput, KernelError> {
        let def = WorkflowStateDef {
            workflow_id: input.workflow_id,
            name: input.name,
            config: input.config,
        };
        store.put(WORKFLOW, def.key(), def.to_record()?);

        Ok(DefineStateOutput::Ok {
            workflow_id: def.workflow_id,
            state_name: def.name,
        })
    }

    /// Register a transition edge. States are not checked for existence.
    pub fn define_transition(
        &self,
        input: DefineTransitionInput,
        store: &dyn RelationStore,
    ) -> Result<DefineTransitionOutput, KernelError> {
        let edge = WorkflowTransition {
            workflow_id: input.workflow_id,
            from_state: input.from_state,
            to_state: input.to_state,
            guard: input.guard,
        };
        store.put(WORKFLOW_TRANSITION, edge.key(), edge.to_record()?);

        Ok(DefineTransitionOutput::Ok {
            workflow_id: edge.workflow_id,
            from_state: edge.from_state,
            to_state: edge.to_state,
        })
    }

    /// Move an entity to `target_state` if a matching edge is registered and
    /// its guard allows it.
    ///
    /// The guard runs between two batches: one reads the current state and
    /// edge, the other re-checks both and writes. If either changed while the
    /// guard ran, the transition is `notAllowed`.
    pub fn transition(
        &self,
        input: TransitionInput,
        store: &dyn RelationStore,
    ) -> Result<TransitionOutput, KernelError> {
        let state_key = EntityState::key_for(&input.entity_id, &input.workflow_id);

        let (current, edge_key, edge_record) = {
            let batch = store.batch();
            let Some(record) = batch.get(WORKFLOW_STATE, &state_key) else {
                return Ok(TransitionOutput::NotFound {
                    message: no_state_message(&input.entity_id, &input.workflow_id),
                });
            };
            let current = EntityState::from_record(&state_key, &record)?;

            let edge_key = WorkflowTransition::key_for(
                &input.workflow_id,
                &current.state,
                &input.target_state,
            );
            let Some(edge_record) = batch.get(WORKFLOW_TRANSITION, &edge_key) else {
                tracing::warn!(
                    entity_id = %input.entity_id,
                    workflow_id = %input.workflow_id,
                    from = %current.state,
                    to = %input.target_state,
                    "transition not registered"
                );
                return Ok(TransitionOutput::NotAllowed {
                    message: format!(
                        "transition from '{}' to '{}' is not allowed in workflow '{}'",
                        current.state, input.target_state, input.workflow_id
                    ),
                });
            };
            (current, edge_key, edge_record)
        };
        let edge = WorkflowTransition::from_record(&edge_key, &edge_record)?;

        let ctx = GuardContext {
            entity_id: &input.entity_id,
            workflow_id: &input.workflow_id,
            from_state: &current.state,
            to_state: &input.target_state,
            guard: &edge.guard,
            store,
        };
        if !self.guards.allows(&ctx) {
            tracing::warn!(
                entity_id = %input.entity_id,
                workflow_id = %input.workflow_id,
                guard = %edge.guard,
                "transition rejected by guard"
            );
            return Ok(TransitionOutput::NotAllowed {
                message: format!(
                    "guard '{}' rejected transition from '{}' to '{}' in workflow '{}'",
                    edge.guard, current.state, input.target_state, input.workflow_id
                ),
            });
        }

        let mut batch = store.batch();
        let state_unchanged = match batch.get(WORKFLOW_STATE, &state_key) {
            Some(record) => EntityState::from_record(&state_key, &record)?.state == current.state,
            None => false,
        };
        let edge_unchanged =
            batch.get(WORKFLOW_TRANSITION, &edge_key).as_ref() == Some(&edge_record);
        if !(state_unchanged && edge_unchanged) {
            tracing::warn!(
                entity_id = %input.entity_id,
                workflow_id = %input.workflow_id,
                from = %current.state,
                "state changed during guard evaluation"
            );
            return Ok(TransitionOutput::NotAllowed {
                message: format!(
                    "entity '{}' left state '{}' in workflow '{}' before the transition applied",
                    input.entity_id, current.state, input.workflow_id
                ),
            });
        }

        let next = EntityState {
            entity_id: input.entity_id,
            workflow_id: input.workflow_id,
            state: input.target_state,
            previous_state: Some(current.state),
        };
        batch.put(WORKFLOW_STATE, state_key, next.to_record()?);

        tracing::debug!(
            entity_id = %next.entity_id,
            workflow_id = %next.workflow_id,
            to = %next.state,
            "transition applied"
        );

        Ok(TransitionOutput::Ok {
            entity_id: next.entity_id,
            from_state: next.previous_state.unwrap_or_default(),
            to_state: next.state,
        })
    }

    pub fn get_current_state(
        &self,
        input: GetCurrentStateInput,
        store: &dyn RelationStore,
    ) -> Result<GetCurrentStateOutput, KernelError> {
        let key = EntityState::key_for(&input.entity_id, &input.workflow_id);
        match store.get(WORKFLOW_STATE, &key) {
            None => Ok(GetCurrentStateOutput::NotFound {
                message: no_state_message(&input.entity_id, &input.workflow_id),
            }),
            Some(record) => {
                let current = EntityState::from_record(&key, &record)?;
                Ok(GetCurrentStateOutput::Ok {
                    entity_id: input.entity_id,
                    state: current.state,
                })
            }
        }
    }

    /// Target states reachable in one registered step from the current state.
    pub fn available_transitions(
        &self,
        input: AvailableTransitionsInput,
        store: &dyn RelationStore,
    ) -> Result<AvailableTransitionsOutput, KernelError> {
        let batch = store.batch();
        let key = EntityState::key_for(&input.entity_id, &input.workflow_id);
        let Some(record) = batch.get(WORKFLOW_STATE, &key) else {
            return Ok(AvailableTransitionsOutput::NotFound {
                message: no_state_message(&input.entity_id, &input.workflow_id),
            });
        };
        let current = EntityState::from_record(&key, &record)?;

        let mut targets = batch
            .find(
                WORKFLOW_TRANSITION,
                &Criteria::field("workflow_id", input.workflow_id.as_str())
                    .and("from_state", current.state.as_str()),
            )
            .iter()
            .map(|edge| {
                let edge_key = Key::triple(
                    input.workflow_id.as_str(),
                    current.state.as_str(),
                    edge.get("to_state").map(|v| v.render()).unwrap_or_default(),
                );
                WorkflowTransition::from_record(&edge_key, edge).map(|t| t.to_state)
            })
            .collect::<Result<Vec<_>, _>>()?;
        targets.sort();

        Ok(AvailableTransitionsOutput::Ok {
            entity_id: input.entity_id,
            state: current.state,
            targets,
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================
