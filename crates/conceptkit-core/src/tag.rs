//! # Tag Concept
//!
//! Node classification with a denormalized reverse index.
//!
//! `tag_entry` is the source of truth: one record per `(node_id, tag_name)`.
//! `tag_index` caches, per tag, the list of nodes carrying it. Every operation
//! that writes both relations holds one batch, so after any completed
//! operation:
//!
//! ```text
//! get_by_tag(t) == { n : TagEntry(n, t) exists }
//! ```
//!
//! An index whose node list becomes empty is deleted.

use crate::concept::{Concept, TypedRecord, VariantOutput, string_list_field, text_field, variant};
use crate::primitives::{TAG_ENTRY, TAG_INDEX};
use crate::storage::{RelationStore, RelationView};
use crate::{Criteria, FieldValue, Key, KernelError, Record};
use serde::{Deserialize, Serialize};

// =============================================================================
// RECORDS
// =============================================================================

/// One node carrying one tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagEntry {
    pub node_id: String,
    pub tag_name: String,
}

impl TagEntry {
    #[must_use]
    pub fn new(node_id: impl Into<String>, tag_name: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            tag_name: tag_name.into(),
        }
    }
}

impl TypedRecord for TagEntry {
    const RELATION: &'static str = TAG_ENTRY;

    fn key(&self) -> Key {
        Key::pair(&self.node_id, &self.tag_name)
    }

    fn to_record(&self) -> Result<Record, KernelError> {
        Ok(Record::new()
            .with("node_id", self.node_id.as_str())
            .with("tag_name", self.tag_name.as_str()))
    }

    fn from_record(key: &Key, record: &Record) -> Result<Self, KernelError> {
        Ok(Self {
            node_id: text_field(Self::RELATION, key, record, "node_id")?,
            tag_name: text_field(Self::RELATION, key, record, "tag_name")?,
        })
    }
}

/// Cached node list for one tag, in insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagIndex {
    pub tag_name: String,
    pub node_ids: Vec<String>,
}

impl TagIndex {
    fn key_for(tag_name: &str) -> Key {
        Key::single(tag_name)
    }

    fn load(view: &dyn RelationView, tag_name: &str) -> Result<Option<Self>, KernelError> {
        let key = Self::key_for(tag_name);
        view.get(TAG_INDEX, &key)
            .map(|record| Self::from_record(&key, &record))
            .transpose()
    }

    /// Write the index back, or delete it once no node carries the tag.
    fn store(&self, view: &mut dyn RelationView) -> Result<(), KernelError> {
        if self.node_ids.is_empty() {
            view.del(TAG_INDEX, &self.key());
        } else {
            view.put(TAG_INDEX, self.key(), self.to_record()?);
        }
        Ok(())
    }

    fn insert(&mut self, node_id: &str) {
        if !self.node_ids.iter().any(|n| n == node_id) {
            self.node_ids.push(node_id.to_string());
        }
    }
}

impl TypedRecord for TagIndex {
    const RELATION: &'static str = TAG_INDEX;

    fn key(&self) -> Key {
        Self::key_for(&self.tag_name)
    }

    fn to_record(&self) -> Result<Record, KernelError> {
        Ok(Record::new()
            .with("tag_name", self.tag_name.as_str())
            .with("node_ids", FieldValue::json(&self.node_ids)?))
    }

    fn from_record(key: &Key, record: &Record) -> Result<Self, KernelError> {
        Ok(Self {
            tag_name: text_field(Self::RELATION, key, record, "tag_name")?,
            node_ids: string_list_field(Self::RELATION, key, record, "node_ids")?,
        })
    }
}

// =============================================================================
// OPERATIONS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddTagInput {
    pub node_id: String,
    pub tag_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "variant")]
pub enum AddTagOutput {
    #[serde(rename = "ok")]
    Ok { node_id: String, tag_name: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveTagInput {
    pub node_id: String,
    pub tag_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "variant")]
pub enum RemoveTagOutput {
    #[serde(rename = "ok")]
    Ok { node_id: String, tag_name: String },
    #[serde(rename = "notfound")]
    NotFound { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetByTagInput {
    pub tag_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "variant")]
pub enum GetByTagOutput {
    #[serde(rename = "ok")]
    Ok {
        tag_name: String,
        node_ids: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameInput {
    pub old_tag: String,
    pub new_tag: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "variant")]
pub enum RenameOutput {
    #[serde(rename = "ok")]
    Ok {
        old_tag: String,
        new_tag: String,
        /// Nodes that carried `old_tag`.
        moved: usize,
    },
    #[serde(rename = "notfound")]
    NotFound { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagsForNodeInput {
    pub node_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "variant")]
pub enum TagsForNodeOutput {
    #[serde(rename = "ok")]
    Ok { node_id: String, tags: Vec<String> },
}

impl VariantOutput for AddTagOutput {
    fn variant(&self) -> &'static str {
        variant::OK
    }

    fn message(&self) -> Option<&str> {
        None
    }
}

impl VariantOutput for RemoveTagOutput {
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

impl VariantOutput for GetByTagOutput {
    fn variant(&self) -> &'static str {
        variant::OK
    }

    fn message(&self) -> Option<&str> {
        None
    }
}

impl VariantOutput for RenameOutput {
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

impl VariantOutput for TagsForNodeOutput {
    fn variant(&self) -> &'static str {
        variant::OK
    }

    fn message(&self) -> Option<&str> {
        None
    }
}

// =============================================================================
// HANDLER
// =============================================================================

/// Handler for the tag concept.
#[derive(Debug, Clone, Copy, Default)]
pub struct TagHandler;

impl Concept for TagHandler {
    const NAME: &'static str = "tag";
    const RELATIONS: &'static [&'static str] = &[TAG_ENTRY, TAG_INDEX];
}

impl TagHandler {
    /// Attach a tag to a node. Idempotent.
    pub fn add_tag(
        &self,
        input: AddTagInput,
        store: &dyn RelationStore,
    ) -> Result<AddTagOutput, KernelError> {
        let entry = TagEntry::new(input.node_id, input.tag_name);

        let mut batch = store.batch();
        batch.put(TAG_ENTRY, entry.key(), entry.to_record()?);

        let mut index = TagIndex::load(&*batch, &entry.tag_name)?.unwrap_or_else(|| TagIndex {
            tag_name: entry.tag_name.clone(),
            node_ids: Vec::new(),
        });
        index.insert(&entry.node_id);
        index.store(&mut *batch)?;

        Ok(AddTagOutput::Ok {
            node_id: entry.node_id,
            tag_name: entry.tag_name,
        })
    }

    pub fn remove_tag(
        &self,
        input: RemoveTagInput,
        store: &dyn RelationStore,
    ) -> Result<RemoveTagOutput, KernelError> {
        let entry = TagEntry::new(input.node_id, input.tag_name);

        let mut batch = store.batch();
        if batch.get(TAG_ENTRY, &entry.key()).is_none() {
            return Ok(RemoveTagOutput::NotFound {
                message: format!(
                    "Tag '{}' not found on node '{}'",
                    entry.tag_name, entry.node_id
                ),
            });
        }
        batch.del(TAG_ENTRY, &entry.key());

        if let Some(mut index) = TagIndex::load(&*batch, &entry.tag_name)? {
            index.node_ids.retain(|n| *n != entry.node_id);
            index.store(&mut *batch)?;
        }

        Ok(RemoveTagOutput::Ok {
            node_id: entry.node_id,
            tag_name: entry.tag_name,
        })
    }

    /// Nodes carrying `tag_name`, read from the index only.
    pub fn get_by_tag(
        &self,
        input: GetByTagInput,
        store: &dyn RelationStore,
    ) -> Result<GetByTagOutput, KernelError> {
        let batch = store.batch();
        let node_ids = TagIndex::load(&*batch, &input.tag_name)?
            .map(|index| index.node_ids)
            .unwrap_or_default();

        Ok(GetByTagOutput::Ok {
            tag_name: input.tag_name,
            node_ids,
        })
    }

    /// Move every node from `old_tag` to `new_tag`, merging into an existing
    /// `new_tag` index.
    pub fn rename(
        &self,
        input: RenameInput,
        store: &dyn RelationStore,
    ) -> Result<RenameOutput, KernelError> {
        let mut batch = store.batch();
        let Some(old) = TagIndex::load(&*batch, &input.old_tag)? else {
            return Ok(RenameOutput::NotFound {
                message: format!("Tag '{}' not found", input.old_tag),
            });
        };
        let moved = old.node_ids.len();

        if input.old_tag != input.new_tag {
            let mut merged = TagIndex::load(&*batch, &input.new_tag)?.unwrap_or_else(|| TagIndex {
                tag_name: input.new_tag.clone(),
                node_ids: Vec::new(),
            });

            for node_id in &old.node_ids {
                batch.del(TAG_ENTRY, &Key::pair(node_id, &input.old_tag));
                let entry = TagEntry::new(node_id.as_str(), input.new_tag.as_str());
                batch.put(TAG_ENTRY, entry.key(), entry.to_record()?);
                merged.insert(node_id);
            }

            batch.del(TAG_INDEX, &old.key());
            merged.store(&mut *batch)?;
        }

        tracing::debug!(old_tag = %input.old_tag, new_tag = %input.new_tag, moved, "tag renamed");

        Ok(RenameOutput::Ok {
            old_tag: input.old_tag,
            new_tag: input.new_tag,
            moved,
        })
    }

    /// Tags on one node, read from the entry table, sorted.
    pub fn tags_for_node(
        &self,
        input: TagsForNodeInput,
        store: &dyn RelationStore,
    ) -> Result<TagsForNodeOutput, KernelError> {
        let mut tags = store
            .find(TAG_ENTRY, &Criteria::field("node_id", input.node_id.as_str()))
            .iter()
            .map(|record| {
                let tag = record.get("tag_name").map(FieldValue::render).unwrap_or_default();
                let key = Key::pair(input.node_id.as_str(), tag);
                TagEntry::from_record(&key, record).map(|entry| entry.tag_name)
            })
            .collect::<Result<Vec<_>, _>>()?;
        tags.sort();

        Ok(TagsForNodeOutput::Ok {
            node_id: input.node_id,
            tags,
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================
