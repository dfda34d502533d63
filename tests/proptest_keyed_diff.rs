//! Property tests for keyed array reconciliation.
//!
//! Any pair of duplicate-free key orders must reconcile into exactly the next
//! list, keep the controls of surviving keys, and dispose the rest.

use std::collections::HashMap;

use proptest::prelude::*;
use spark_forms::engine::{diff_keys, Match};
use spark_forms::*;

// =============================================================================
// Generators
// =============================================================================

fn key_order() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::btree_set(any::<u8>(), 0..12)
        .prop_map(|keys| keys.into_iter().collect::<Vec<_>>())
        .prop_shuffle()
}

fn tracked_array(keys: &[u8]) -> VirtualNode {
    let values: Vec<Value> = keys.iter().map(|&k| Value::from(k as i64)).collect();
    array(
        ArrayProps {
            source: Some(Value::list(values.clone())),
            track_by: Some(key_by_value()),
            ..Default::default()
        },
        values.into_iter().map(|value| {
            control(ControlProps {
                value,
                ..Default::default()
            })
        }),
    )
}

fn node_keyed_array(keys: &[u8]) -> VirtualNode {
    array(
        ArrayProps::default(),
        keys.iter().map(|&k| {
            control(ControlProps {
                key: Some(Key::Int(k as i64)),
                value: Value::from(k as i64),
                ..Default::default()
            })
        }),
    )
}

fn check_transition(
    build: fn(&[u8]) -> VirtualNode,
    previous: &[u8],
    next: &[u8],
) -> std::result::Result<(), TestCaseError> {
    let mut engine = Engine::new(MemoryHost::default());
    let id = engine.reconcile(&build(previous), None).unwrap();

    let before: HashMap<u8, ControlId> = previous
        .iter()
        .copied()
        .zip(engine.host().children(id))
        .collect();

    let again = engine.reconcile(&build(next), Some(id)).unwrap();
    prop_assert_eq!(again, id);

    let expected = Value::list(next.iter().map(|&k| Value::from(k as i64)));
    prop_assert_eq!(engine.host().raw_value(id), expected);
    prop_assert_eq!(engine.host().array_len(id), next.len());

    let after = engine.host().children(id);
    for (key, child) in next.iter().zip(&after) {
        if let Some(kept) = before.get(key) {
            prop_assert_eq!(child, kept);
        }
    }
    for (key, old) in &before {
        if !next.contains(key) {
            prop_assert!(!engine.host().contains(*old));
        }
    }
    Ok(())
}

proptest! {
    #[test]
    fn prop_tracked_array_follows_next_order(
        previous in key_order(),
        next in key_order(),
    ) {
        check_transition(tracked_array, &previous, &next)?;
    }

    #[test]
    fn prop_node_keys_follow_next_order(
        previous in key_order(),
        next in key_order(),
    ) {
        check_transition(node_keyed_array, &previous, &next)?;
    }

    #[test]
    fn prop_diff_keys_partitions_both_sides(
        previous in key_order(),
        next in key_order(),
    ) {
        let previous: Vec<Key> = previous.into_iter().map(|k| Key::Int(k as i64)).collect();
        let next: Vec<Key> = next.into_iter().map(|k| Key::Int(k as i64)).collect();

        let diff = diff_keys(&previous, &next, |_, _| Match::Same);

        let matched = diff.unchanged.len() + diff.index_updated.len() + diff.updated.len();
        prop_assert_eq!(diff.added.len() + matched, next.len());
        prop_assert_eq!(diff.removed.len() + matched, previous.len());
        prop_assert!(diff.removed.windows(2).all(|w| w[0] > w[1]));

        let sources = diff.sources(next.len());
        for (j, source) in sources.iter().enumerate() {
            match source {
                Some(i) => prop_assert_eq!(&previous[*i], &next[j]),
                None => prop_assert!(!previous.contains(&next[j])),
            }
        }
    }
}
