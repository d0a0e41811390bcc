//! # Kernel Constants
//!
//! Relation names owned by each concept, and the fixed limits the handlers
//! enforce. These are compiled in and immutable at runtime.

// =============================================================================
// RELATION NAMES
// =============================================================================

/// Graph concept: one record per node.
pub const GRAPH_NODE: &str = "graph_node";

/// Graph concept: one record per directed edge, keyed `(source, target)`.
pub const GRAPH_EDGE: &str = "graph_edge";

/// Workflow concept: state descriptors, keyed `(workflow, "state", name)`.
pub const WORKFLOW: &str = "workflow";

/// Workflow concept: transition edges, keyed `(workflow, from, to)`.
pub const WORKFLOW_TRANSITION: &str = "workflow_transition";

/// Workflow concept: current state per entity, keyed `(entity, workflow)`.
pub const WORKFLOW_STATE: &str = "workflow_state";

/// Tag concept: membership facts, keyed `(node, tag)`.
pub const TAG_ENTRY: &str = "tag_entry";

/// Tag concept: reverse index, keyed `(tag)`.
pub const TAG_INDEX: &str = "tag_index";

/// Credential concept: one salted hash per user.
pub const PASSWORD: &str = "password";

// =============================================================================
// LIMITS
// =============================================================================

/// Maximum traversal depth for neighbor discovery.
///
/// All queries must be computationally bounded; larger depths are clamped.
pub const MAX_TRAVERSAL_DEPTH: u32 = 100;

/// Minimum accepted password length, in characters.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Salt size for credential hashing, in bytes.
pub const SALT_LENGTH: usize = 16;
