//! # In-Memory Relation Store
//!
//! The default store: every relation lives in one ordered map guarded by a
//! single mutex. State lives as long as the store object.

use super::{Batch, RelationStore, RelationView};
use crate::{Criteria, Key, Record};
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// All relations: relation name -> (key -> record).
///
/// A relation with no live records is removed, so it never shows up in stats.
#[derive(Debug, Default)]
struct Tables {
    relations: BTreeMap<String, BTreeMap<Key, Record>>,
}

impl RelationView for Tables {
    fn put(&mut self, relation: &str, key: Key, record: Record) {
        self.relations
            .entry(relation.to_string())
            .or_default()
            .insert(key, record);
    }

    fn get(&self, relation: &str, key: &Key) -> Option<Record> {
        self.relations.get(relation)?.get(key).cloned()
    }

    fn find(&self, relation: &str, criteria: &Criteria) -> Vec<Record> {
        self.relations
            .get(relation)
            .into_iter()
            .flat_map(BTreeMap::values)
            .filter(|record| record.matches(criteria))
            .cloned()
            .collect()
    }

    fn del(&mut self, relation: &str, key: &Key) {
        if let Some(table) = self.relations.get_mut(relation) {
            table.remove(key);
            if table.is_empty() {
                self.relations.remove(relation);
            }
        }
    }

    fn del_many(&mut self, relation: &str, criteria: &Criteria) -> usize {
        let Some(table) = self.relations.get_mut(relation) else {
            return 0;
        };
        let before = table.len();
        table.retain(|_, record| !record.matches(criteria));
        let removed = before - table.len();
        if table.is_empty() {
            self.relations.remove(relation);
        }
        tracing::trace!(relation, removed, "del_many");
        removed
    }
}

impl RelationView for MutexGuard<'_, Tables> {
    fn put(&mut self, relation: &str, key: Key, record: Record) {
        (**self).put(relation, key, record);
    }

    fn get(&self, relation: &str, key: &Key) -> Option<Record> {
        (**self).get(relation, key)
    }

    fn find(&self, relation: &str, criteria: &Criteria) -> Vec<Record> {
        (**self).find(relation, criteria)
    }

    fn del(&mut self, relation: &str, key: &Key) {
        (**self).del(relation, key);
    }

    fn del_many(&mut self, relation: &str, criteria: &Criteria) -> usize {
        (**self).del_many(relation, criteria)
    }
}

// =============================================================================
// STORE
// =============================================================================

/// Record counts per relation, for status reporting.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StoreStats {
    pub relations: BTreeMap<String, usize>,
    pub total_records: usize,
}

/// Mutex-guarded in-memory store.
///
/// Construct one per process and share it by reference (or `Arc`).
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of record counts, taken under the store lock.
    #[must_use]
    pub fn stats(&self) -> StoreStats {
        let tables = self.tables.lock();
        let relations: BTreeMap<String, usize> = tables
            .relations
            .iter()
            .map(|(name, table)| (name.clone(), table.len()))
            .collect();
        let total_records = relations.values().sum();
        StoreStats {
            relations,
            total_records,
        }
    }
}

impl RelationStore for InMemoryStore {
    fn batch(&self) -> Batch<'_> {
        Box::new(self.tables.lock())
    }
}

// =============================================================================
// TESTS
// =============================================================================
