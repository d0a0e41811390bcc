//! # Action Dispatch
//!
//! Maps wire-level invocations (`{"action": "graph.add_node", ...}`) onto the
//! kernel's concept handlers. Shared by the HTTP API and the `run` command.

use crate::config::KernelConfig;
use conceptkit_core::graph::{
    AddEdgeInput, AddNodeInput, GetNeighborsInput, RemoveEdgeInput, RemoveNodeInput,
};
use conceptkit_core::password::{CheckInput, SetInput, ValidateInput};
use conceptkit_core::tag::{
    AddTagInput, GetByTagInput, RemoveTagInput, RenameInput, TagsForNodeInput,
};
use conceptkit_core::workflow::{
    AvailableTransitionsInput, DefineStateInput, DefineTransitionInput, GetCurrentStateInput,
    TransitionInput,
};
use conceptkit_core::{
    Concept, GraphHandler, InMemoryStore, KernelError, PasswordHandler, StoreStats, TagHandler,
    WorkflowHandler, seed_state,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;

// =============================================================================
// INVOCATION
// =============================================================================

/// Seed an entity's initial workflow state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedStateInput {
    pub entity_id: String,
    pub workflow_id: String,
    pub state: String,
}

/// One action call, tagged by `"action"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum Invocation {
    #[serde(rename = "graph.add_node")]
    GraphAddNode(AddNodeInput),
    #[serde(rename = "graph.remove_node")]
    GraphRemoveNode(RemoveNodeInput),
    #[serde(rename = "graph.add_edge")]
    GraphAddEdge(AddEdgeInput),
    #[serde(rename = "graph.remove_edge")]
    GraphRemoveEdge(RemoveEdgeInput),
    #[serde(rename = "graph.get_neighbors")]
    GraphGetNeighbors(GetNeighborsInput),

    #[serde(rename = "workflow.define_state")]
    WorkflowDefineState(DefineStateInput),
    #[serde(rename = "workflow.define_transition")]
    WorkflowDefineTransition(DefineTransitionInput),
    #[serde(rename = "workflow.seed_state")]
    WorkflowSeedState(SeedStateInput),
    #[serde(rename = "workflow.transition")]
    WorkflowTransition(TransitionInput),
    #[serde(rename = "workflow.get_current_state")]
    WorkflowGetCurrentState(GetCurrentStateInput),
    #[serde(rename = "workflow.available_transitions")]
    WorkflowAvailableTransitions(AvailableTransitionsInput),

    #[serde(rename = "tag.add_tag")]
    TagAdd(AddTagInput),
    #[serde(rename = "tag.remove_tag")]
    TagRemove(RemoveTagInput),
    #[serde(rename = "tag.get_by_tag")]
    TagGetByTag(GetByTagInput),
    #[serde(rename = "tag.rename")]
    TagRename(RenameInput),
    #[serde(rename = "tag.tags_for_node")]
    TagTagsForNode(TagsForNodeInput),

    #[serde(rename = "password.set")]
    PasswordSet(SetInput),
    #[serde(rename = "password.check")]
    PasswordCheck(CheckInput),
    #[serde(rename = "password.validate")]
    PasswordValidate(ValidateInput),
}

impl Invocation {
    /// Name of the concept that handles this invocation.
    pub fn concept(&self) -> &'static str {
        match self {
            Self::GraphAddNode(_)
            | Self::GraphRemoveNode(_)
            | Self::GraphAddEdge(_)
            | Self::GraphRemoveEdge(_)
            | Self::GraphGetNeighbors(_) => GraphHandler::NAME,
            Self::WorkflowDefineState(_)
            | Self::WorkflowDefineTransition(_)
            | Self::WorkflowSeedState(_)
            | Self::WorkflowTransition(_)
            | Self::WorkflowGetCurrentState(_)
            | Self::WorkflowAvailableTransitions(_) => WorkflowHandler::NAME,
            Self::TagAdd(_)
            | Self::TagRemove(_)
            | Self::TagGetByTag(_)
            | Self::TagRename(_)
            | Self::TagTagsForNode(_) => TagHandler::NAME,
            Self::PasswordSet(_) | Self::PasswordCheck(_) | Self::PasswordValidate(_) => {
                PasswordHandler::NAME
            }
        }
    }

    /// Operation name within the concept.
    pub fn operation(&self) -> &'static str {
        match self {
            Self::GraphAddNode(_) => "add_node",
            Self::GraphRemoveNode(_) => "remove_node",
            Self::GraphAddEdge(_) => "add_edge",
            Self::GraphRemoveEdge(_) => "remove_edge",
            Self::GraphGetNeighbors(_) => "get_neighbors",
            Self::WorkflowDefineState(_) => "define_state",
            Self::WorkflowDefineTransition(_) => "define_transition",
            Self::WorkflowSeedState(_) => "seed_state",
            Self::WorkflowTransition(_) => "transition",
            Self::WorkflowGetCurrentState(_) => "get_current_state",
            Self::WorkflowAvailableTransitions(_) => "available_transitions",
            Self::TagAdd(_) => "add_tag",
            Self::TagRemove(_) => "remove_tag",
            Self::TagGetByTag(_) => "get_by_tag",
            Self::TagRename(_) => "rename",
            Self::TagTagsForNode(_) => "tags_for_node",
            Self::PasswordSet(_) => "set",
            Self::PasswordCheck(_) => "check",
            Self::PasswordValidate(_) => "validate",
        }
    }

    /// The wire action name, `<concept>.<operation>`.
    pub fn action(&self) -> String {
        format!("{}.{}", self.concept(), self.operation())
    }
}

/// Result of one invocation: the action name and its tagged output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvokeResponse {
    pub action: String,
    pub output: Value,
}

impl InvokeResponse {
    /// The `variant` tag of the output, if present.
    pub fn variant(&self) -> Option<&str> {
        self.output.get("variant").and_then(Value::as_str)
    }

    /// The failure message of the output, if present.
    pub fn message(&self) -> Option<&str> {
        self.output.get("message").and_then(Value::as_str)
    }
}

// =============================================================================
// KERNEL
// =============================================================================

/// One store plus the handlers bound to it.
#[derive(Debug)]
pub struct Kernel {
    store: InMemoryStore,
    workflow: WorkflowHandler,
    max_depth: u32,
}

impl Kernel {
    pub fn new(config: &KernelConfig) -> Self {
        Self::with_workflow(config, WorkflowHandler::new())
    }

    /// Kernel whose workflow handler uses a custom guard evaluator.
    pub fn with_workflow(config: &KernelConfig, workflow: WorkflowHandler) -> Self {
        Self {
            store: InMemoryStore::new(),
            workflow,
            max_depth: config.max_traversal_depth,
        }
    }

    pub fn stats(&self) -> StoreStats {
        self.store.stats()
    }

    /// Live record count per concept, summed over the relations it owns.
    pub fn concept_records(&self) -> BTreeMap<String, usize> {
        let stats = self.stats();
        let owned = |relations: &[&str]| -> usize {
            relations
                .iter()
                .filter_map(|r| stats.relations.get(*r))
                .sum()
        };
        BTreeMap::from([
            (GraphHandler::NAME.to_string(), owned(GraphHandler::RELATIONS)),
            (WorkflowHandler::NAME.to_string(), owned(WorkflowHandler::RELATIONS)),
            (TagHandler::NAME.to_string(), owned(TagHandler::RELATIONS)),
            (PasswordHandler::NAME.to_string(), owned(PasswordHandler::RELATIONS)),
        ])
    }

    /// Run one invocation against the store.
    pub fn invoke(&self, invocation: Invocation) -> Result<InvokeResponse, KernelError> {
        let action = invocation.action();
        let store = &self.store;
        tracing::debug!(action = %action, "invoke");

        let output = match invocation {
            Invocation::GraphAddNode(input) => encode(&GraphHandler.add_node(input, store)?),
            Invocation::GraphRemoveNode(input) => {
                encode(&GraphHandler.remove_node(input, store)?)
            }
            Invocation::GraphAddEdge(input) => encode(&GraphHandler.add_edge(input, store)?),
            Invocation::GraphRemoveEdge(input) => {
                encode(&GraphHandler.remove_edge(input, store)?)
            }
            Invocation::GraphGetNeighbors(mut input) => {
                input.depth = input.depth.min(self.max_depth);
                encode(&GraphHandler.get_neighbors(input, store)?)
            }

            Invocation::WorkflowDefineState(input) => {
                encode(&self.workflow.define_state(input, store)?)
            }
            Invocation::WorkflowDefineTransition(input) => {
                encode(&self.workflow.define_transition(input, store)?)
            }
            Invocation::WorkflowSeedState(input) => {
                seed_state(store, &input.entity_id, &input.workflow_id, &input.state)?;
                Ok(json!({
                    "variant": "ok",
                    "entity_id": input.entity_id,
                    "state": input.state,
                }))
            }
            Invocation::WorkflowTransition(input) => {
                encode(&self.workflow.transition(input, store)?)
            }
            Invocation::WorkflowGetCurrentState(input) => {
                encode(&self.workflow.get_current_state(input, store)?)
            }
            Invocation::WorkflowAvailableTransitions(input) => {
                encode(&self.workflow.available_transitions(input, store)?)
            }

            Invocation::TagAdd(input) => encode(&TagHandler.add_tag(input, store)?),
            Invocation::TagRemove(input) => encode(&TagHandler.remove_tag(input, store)?),
            Invocation::TagGetByTag(input) => encode(&TagHandler.get_by_tag(input, store)?),
            Invocation::TagRename(input) => encode(&TagHandler.rename(input, store)?),
            Invocation::TagTagsForNode(input) => {
                encode(&TagHandler.tags_for_node(input, store)?)
            }

            Invocation::PasswordSet(input) => encode(&PasswordHandler.set(input, store)?),
            Invocation::PasswordCheck(input) => encode(&PasswordHandler.check(input, store)?),
            Invocation::PasswordValidate(input) => encode(&PasswordHandler.validate(input)?),
        }?;

        Ok(InvokeResponse {
            action,
            output,
        })
    }
}

fn encode<T: Serialize>(output: &T) -> Result<Value, KernelError> {
    Ok(serde_json::to_value(output)?)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use conceptkit_core::{GuardContext, GuardEvaluator};
    use std::sync::Arc;

    fn kernel() -> Kernel {
        Kernel::new(&KernelConfig::default())
    }

    fn call(kernel: &Kernel, body: Value) -> InvokeResponse {
        let invocation: Invocation = serde_json::from_value(body).expect("parse");
        kernel.invoke(invocation).expect("invoke")
    }

    #[test]
    fn parses_tagged_action() {
        let invocation: Invocation =
            serde_json::from_value(json!({"action": "graph.add_node", "entity_id": "a"}))
                .expect("parse");
        assert_eq!(
            invocation,
            Invocation::GraphAddNode(AddNodeInput {
                entity_id: "a".into()
            })
        );
        assert_eq!(invocation.action(), "graph.add_node");
    }

    #[test]
    fn unknown_action_is_rejected() {
        let result: Result<Invocation, _> =
            serde_json::from_value(json!({"action": "graph.explode", "entity_id": "a"}));
        assert!(result.is_err());
    }

    #[test]
    fn action_name_round_trips_through_serde() {
        let invocation = Invocation::TagRename(RenameInput {
            old_tag: "a".into(),
            new_tag: "b".into(),
        });
        let wire = serde_json::to_value(&invocation).expect("encode");
        assert_eq!(wire["action"], invocation.action());
    }

    #[test]
    fn action_prefix_is_concept_name() {
        for (body, concept) in [
            (json!({"action": "graph.remove_node", "entity_id": "a"}), "graph"),
            (
                json!({"action": "workflow.seed_state", "entity_id": "e", "workflow_id": "w", "state": "s"}),
                "workflow",
            ),
            (json!({"action": "tag.tags_for_node", "node_id": "n"}), "tag"),
            (json!({"action": "password.validate", "password": "p"}), "password"),
        ] {
            let expected = body["action"].clone();
            let invocation: Invocation = serde_json::from_value(body).expect("parse");
            assert_eq!(invocation.concept(), concept);
            assert_eq!(expected, invocation.action());
            assert_eq!(serde_json::to_value(&invocation).expect("encode")["action"], expected);
        }
    }

    #[test]
    fn concept_records_sum_owned_relations() {
        let kernel = kernel();
        call(&kernel, json!({"action": "graph.add_edge", "source_id": "a", "target_id": "b"}));
        call(&kernel, json!({"action": "tag.add_tag", "node_id": "a", "tag_name": "t"}));

        let counts = kernel.concept_records();
        assert_eq!(counts.get("graph"), Some(&1));
        // one entry plus one index record
        assert_eq!(counts.get("tag"), Some(&2));
        assert_eq!(counts.get("workflow"), Some(&0));
        assert_eq!(counts.get("password"), Some(&0));
    }

    #[test]
    fn graph_actions_dispatch() {
        let kernel = kernel();
        call(&kernel, json!({"action": "graph.add_edge", "source_id": "a", "target_id": "b"}));
        call(&kernel, json!({"action": "graph.add_edge", "source_id": "b", "target_id": "c"}));

        let out = call(
            &kernel,
            json!({"action": "graph.get_neighbors", "entity_id": "a", "depth": 2}),
        );
        assert_eq!(out.variant(), Some("ok"));
        assert_eq!(out.output["neighbors"], json!(["b", "c"]));
    }

    #[test]
    fn depth_is_clamped_by_config() {
        let kernel = Kernel::new(&KernelConfig {
            max_traversal_depth: 1,
        });
        call(&kernel, json!({"action": "graph.add_edge", "source_id": "a", "target_id": "b"}));
        call(&kernel, json!({"action": "graph.add_edge", "source_id": "b", "target_id": "c"}));

        let out = call(
            &kernel,
            json!({"action": "graph.get_neighbors", "entity_id": "a", "depth": 5}),
        );
        assert_eq!(out.output["neighbors"], json!(["b"]));
        assert_eq!(out.output["depth"], 1);
    }

    #[test]
    fn workflow_actions_dispatch() {
        let kernel = kernel();
        call(
            &kernel,
            json!({"action": "workflow.define_transition", "workflow_id": "w", "from_state": "draft", "to_state": "published"}),
        );
        let seeded = call(
            &kernel,
            json!({"action": "workflow.seed_state", "entity_id": "e", "workflow_id": "w", "state": "draft"}),
        );
        assert_eq!(seeded.variant(), Some("ok"));

        let forward = call(
            &kernel,
            json!({"action": "workflow.transition", "entity_id": "e", "workflow_id": "w", "target_state": "published"}),
        );
        assert_eq!(forward.variant(), Some("ok"));

        let back = call(
            &kernel,
            json!({"action": "workflow.transition", "entity_id": "e", "workflow_id": "w", "target_state": "draft"}),
        );
        assert_eq!(back.variant(), Some("notAllowed"));
        assert!(back.message().is_some());
    }

    struct DenyAll;

    impl GuardEvaluator for DenyAll {
        fn allows(&self, _ctx: &GuardContext<'_>) -> bool {
            false
        }
    }

    #[test]
    fn custom_guards_reach_the_workflow_handler() {
        let kernel = Kernel::with_workflow(
            &KernelConfig::default(),
            WorkflowHandler::with_guards(Arc::new(DenyAll)),
        );
        call(
            &kernel,
            json!({"action": "workflow.define_transition", "workflow_id": "w", "from_state": "a", "to_state": "b"}),
        );
        call(
            &kernel,
            json!({"action": "workflow.seed_state", "entity_id": "e", "workflow_id": "w", "state": "a"}),
        );

        let out = call(
            &kernel,
            json!({"action": "workflow.transition", "entity_id": "e", "workflow_id": "w", "target_state": "b"}),
        );
        assert_eq!(out.variant(), Some("notAllowed"));
    }

    #[test]
    fn password_actions_dispatch() {
        let kernel = kernel();
        let short = call(
            &kernel,
            json!({"action": "password.set", "user": "u", "password": "short"}),
        );
        assert_eq!(short.variant(), Some("invalid"));

        call(
            &kernel,
            json!({"action": "password.set", "user": "u", "password": "long enough"}),
        );
        let check = call(
            &kernel,
            json!({"action": "password.check", "user": "u", "password": "long enough"}),
        );
        assert_eq!(check.output, json!({"variant": "ok", "valid": true}));
    }

    #[test]
    fn stats_reflect_writes() {
        let kernel = kernel();
        call(&kernel, json!({"action": "tag.add_tag", "node_id": "n", "tag_name": "t"}));

        let stats = kernel.stats();
        assert_eq!(stats.total_records, 2);
        assert_eq!(stats.relations.get("tag_entry"), Some(&1));
        assert_eq!(stats.relations.get("tag_index"), Some(&1));
    }
}
