//! # Concurrency Tests
//!
//! Composite operations hold the store for their whole span, so concurrent
//! callers never leave the tag index or the workflow state half-written.

use conceptkit_core::primitives::TAG_ENTRY;
use conceptkit_core::tag::{AddTagInput, GetByTagInput, GetByTagOutput, RenameInput};
use conceptkit_core::workflow::{
    DefineTransitionInput, GetCurrentStateInput, GetCurrentStateOutput, TransitionInput,
};
use conceptkit_core::{
    Criteria, InMemoryStore, RelationStore, TagHandler, VariantOutput, WorkflowHandler,
    seed_state,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;

fn index_of(store: &InMemoryStore, tag: &str) -> BTreeSet<String> {
    let GetByTagOutput::Ok { node_ids, .. } = TagHandler
        .get_by_tag(GetByTagInput { tag_name: tag.into() }, store)
        .expect("get_by_tag");
    node_ids.into_iter().collect()
}

fn entries_of(store: &InMemoryStore, tag: &str) -> BTreeSet<String> {
    store
        .find(TAG_ENTRY, &Criteria::field("tag_name", tag))
        .iter()
        .map(|r| r.get("node_id").expect("node_id").render())
        .collect()
}

#[test]
fn concurrent_add_tag_and_rename_keep_index_consistent() {
    let store = Arc::new(InMemoryStore::new());

    let adders: Vec<_> = (0..4)
        .map(|worker| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..50 {
                    let tag = if i % 2 == 0 { "red" } else { "blue" };
                    TagHandler
                        .add_tag(
                            AddTagInput {
                                node_id: format!("w{worker}-n{i}"),
                                tag_name: tag.into(),
                            },
                            &*store,
                        )
                        .expect("add_tag");
                }
            })
        })
        .collect();

    let renamer = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            for i in 0..100 {
                let (old_tag, new_tag) = if i % 2 == 0 {
                    ("red", "blue")
                } else {
                    ("blue", "red")
                };
                TagHandler
                    .rename(
                        RenameInput {
                            old_tag: old_tag.into(),
                            new_tag: new_tag.into(),
                        },
                        &*store,
                    )
                    .expect("rename");
            }
        })
    };

    for handle in adders {
        handle.join().expect("adder");
    }
    renamer.join().expect("renamer");

    for tag in ["red", "blue"] {
        assert_eq!(index_of(&store, tag), entries_of(&store, tag), "tag {tag}");
    }

    let total = index_of(&store, "red").len() + index_of(&store, "blue").len();
    let distinct: BTreeSet<String> = index_of(&store, "red")
        .union(&index_of(&store, "blue"))
        .cloned()
        .collect();
    assert_eq!(distinct.len(), 200);
    assert!(total >= distinct.len());
}

#[test]
fn concurrent_transitions_fire_once() {
    let store = Arc::new(InMemoryStore::new());
    let handler = WorkflowHandler::new();
    handler
        .define_transition(
            DefineTransitionInput {
                workflow_id: "order".into(),
                from_state: "open".into(),
                to_state: "closed".into(),
                guard: String::new(),
            },
            &*store,
        )
        .expect("define");
    seed_state(&*store, "o1", "order", "open").expect("seed");

    let racers: Vec<_> = (0..8)
        .map(|_| {
            let store = Arc::clone(&store);
            let handler = handler.clone();
            thread::spawn(move || {
                handler
                    .transition(
                        TransitionInput {
                            entity_id: "o1".into(),
                            workflow_id: "order".into(),
                            target_state: "closed".into(),
                        },
                        &*store,
                    )
                    .expect("transition")
                    .is_ok()
            })
        })
        .collect();

    let winners = racers
        .into_iter()
        .map(|h| h.join().expect("racer"))
        .filter(|ok| *ok)
        .count();
    assert_eq!(winners, 1);

    let current = handler
        .get_current_state(
            GetCurrentStateInput {
                entity_id: "o1".into(),
                workflow_id: "order".into(),
            },
            &*store,
        )
        .expect("get");
    assert!(matches!(current, GetCurrentStateOutput::Ok { state, .. } if state == "closed"));
}
