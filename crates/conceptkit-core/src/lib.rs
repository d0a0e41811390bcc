//! # conceptkit-core
//!
//! The relation-store kernel for ConceptKit - THE LOGIC.
//!
//! A single schemaless store holds named relations of keyed records. Feature
//! modules ("concepts") are stateless handlers that own a fixed set of
//! relations and talk to the world only through the store.
//!
//! ## Contents
//!
//! - `storage` - the `RelationStore` boundary and the in-memory backend
//! - `concept` - the handler contract and variant-result trait
//! - `graph` - nodes, edges, bounded-depth neighbor discovery
//! - `workflow` - per-entity state machines with pluggable guards
//! - `tag` - tag entries plus the denormalized reverse index
//! - `password` - salted credentials
//!
//! ## Architectural Constraints
//!
//! - NO async, NO network dependencies (pure Rust)
//! - Concepts never call each other; the store is the only shared state
//! - Every collection handed back to a caller is deterministically ordered

// =============================================================================
// MODULES
// =============================================================================

pub mod concept;
pub mod graph;
pub mod password;
pub mod primitives;
pub mod storage;
pub mod tag;
pub mod types;
pub mod workflow;

// =============================================================================
// RE-EXPORTS: Core Types
// =============================================================================

pub use types::{Criteria, FieldValue, Key, KernelError, Record};

// =============================================================================
// RE-EXPORTS: Store and Contract
// =============================================================================

pub use concept::{Concept, TypedRecord, VariantOutput};
pub use storage::{Batch, InMemoryStore, RelationStore, RelationView, StoreStats};

// =============================================================================
// RE-EXPORTS: Handlers
// =============================================================================

pub use graph::GraphHandler;
pub use password::PasswordHandler;
pub use tag::TagHandler;
pub use workflow::{AlwaysAllow, GuardContext, GuardEvaluator, WorkflowHandler, seed_state};
