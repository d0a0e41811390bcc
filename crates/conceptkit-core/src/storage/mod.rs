//! # Relation Storage
//!
//! The storage boundary every concept is written against.
//!
//! ## Primitives
//!
//! Exactly five operations, all total (none of them fail):
//! - `put` - upsert, replacing any existing record wholesale
//! - `get` - point lookup
//! - `find` - every record matching the criteria (empty criteria = all)
//! - `del` - idempotent delete
//! - `del_many` - delete every match, returning the count
//!
//! ## Serialization
//!
//! A store has a single mutual-exclusion point. `RelationStore::batch` hands
//! out exclusive access to it as a [`Batch`]; the standalone primitives are
//! one-call batches, so one primitive always completes before the next one
//! begins. Composite handler operations that write more than once hold a
//! single batch for their whole duration. A batch is not reentrant: nothing
//! holding one may call back into the store.

mod memory;

pub use memory::{InMemoryStore, StoreStats};

use crate::{Criteria, Key, Record};

// =============================================================================
// RELATION VIEW
// =============================================================================

/// The five primitives, over state the caller holds exclusively.
pub trait RelationView {
    /// Insert or replace the record stored under `key`.
    fn put(&mut self, relation: &str, key: Key, record: Record);

    /// Lookup a record. Returns `None` if absent.
    fn get(&self, relation: &str, key: &Key) -> Option<Record>;

    /// All records in `relation` matching `criteria`.
    fn find(&self, relation: &str, criteria: &Criteria) -> Vec<Record>;

    /// Remove the record under `key` if present.
    fn del(&mut self, relation: &str, key: &Key);

    /// Remove every record matching `criteria`. Returns how many were removed.
    fn del_many(&mut self, relation: &str, criteria: &Criteria) -> usize;
}

/// Exclusive handle on a store. Dropping it releases the store.
pub type Batch<'a> = Box<dyn RelationView + 'a>;

// =============================================================================
// RELATION STORE
// =============================================================================

/// A process-wide, schemaless store shared by every concept.
///
/// Implementors only provide `batch`; the primitives default to one-call
/// batches. A networked or disk-backed store can implement this trait without
/// any handler changing.
pub trait RelationStore: Send + Sync {
    /// Acquire exclusive access for a composite operation.
    fn batch(&self) -> Batch<'_>;

    fn put(&self, relation: &str, key: Key, record: Record) {
        self.batch().put(relation, key, record);
    }

    fn get(&self, relation: &str, key: &Key) -> Option<Record> {
        self.batch().get(relation, key)
    }

    fn find(&self, relation: &str, criteria: &Criteria) -> Vec<Record> {
        self.batch().find(relation, criteria)
    }

    fn del(&self, relation: &str, key: &Key) {
        self.batch().del(relation, key);
    }

    fn del_many(&self, relation: &str, criteria: &Criteria) -> usize {
        self.batch().del_many(relation, criteria)
    }
}
