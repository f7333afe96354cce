//! Property-Based Tests for Memory Nodes
//!
//! Uses proptest to check the storage commands against a simple model.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use proptest::prelude::*;
use serde_json::{json, Value};

use crate::error::CacheError;
use crate::node::{MemoryNode, NodeStore};
use crate::remote::CacheBackend;

// == Test Configuration ==
const TEST_MAX_ENTRIES: usize = 100;

// == Strategies ==
/// Generates valid node keys (no whitespace, within length limit)
fn valid_key_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_:]{1,64}"
}

/// Generates JSON values, falsy ones included
fn value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(json!("")),
        Just(json!([])),
        Just(json!(0)),
        Just(json!(false)),
        Just(Value::Null),
        any::<u32>().prop_map(|n| json!(n)),
        "[a-zA-Z0-9 ]{1,64}".prop_map(Value::from),
    ]
}

#[derive(Debug, Clone)]
enum NodeOp {
    Set { key: String, value: Value },
    Add { key: String, value: Value },
    Replace { key: String, value: Value },
    Delete { key: String },
    Incr { key: String, delta: u32 },
}

fn node_op_strategy() -> impl Strategy<Value = NodeOp> {
    // A small key space makes collisions, and so the conditional paths, likely.
    let key = "k[0-4]";
    prop_oneof![
        (key, value_strategy()).prop_map(|(key, value)| NodeOp::Set { key, value }),
        (key, value_strategy()).prop_map(|(key, value)| NodeOp::Add { key, value }),
        (key, value_strategy()).prop_map(|(key, value)| NodeOp::Replace { key, value }),
        key.prop_map(|key| NodeOp::Delete { key }),
        (key, any::<u32>()).prop_map(|(key, delta)| NodeOp::Incr { key, delta }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Every command sequence leaves the store matching a plain HashMap model.
    #[test]
    fn prop_store_matches_model(ops in prop::collection::vec(node_op_strategy(), 1..60)) {
        let mut store = NodeStore::new(TEST_MAX_ENTRIES);
        let mut model: HashMap<String, Value> = HashMap::new();

        for op in ops {
            match op {
                NodeOp::Set { key, value } => {
                    store.set(&key, value.clone(), 0).unwrap();
                    model.insert(key, value);
                }
                NodeOp::Add { key, value } => {
                    let result = store.add(&key, value.clone(), 0);
                    if model.contains_key(&key) {
                        prop_assert!(matches!(result, Err(CacheError::NotStored(_))));
                    } else {
                        prop_assert!(result.is_ok());
                        model.insert(key, value);
                    }
                }
                NodeOp::Replace { key, value } => {
                    let result = store.replace(&key, value.clone(), 0);
                    if model.contains_key(&key) {
                        prop_assert!(result.is_ok());
                        model.insert(key, value);
                    } else {
                        prop_assert!(matches!(result, Err(CacheError::NotFound(_))));
                    }
                }
                NodeOp::Delete { key } => {
                    let result = store.delete(&key);
                    prop_assert_eq!(result.is_ok(), model.remove(&key).is_some());
                }
                NodeOp::Incr { key, delta } => {
                    let result = store.incr(&key, u64::from(delta));
                    match model.get(&key).and_then(crate::value::counter_value) {
                        Some(current) => {
                            let next = current.wrapping_add(u64::from(delta));
                            prop_assert_eq!(result, Ok(next));
                            model.insert(key, json!(next));
                        }
                        None => prop_assert!(result.is_err()),
                    }
                }
            }
        }

        prop_assert_eq!(store.len(), model.len());
        for (key, value) in &model {
            let stored = store.get(key);
            prop_assert_eq!(stored.as_ref(), Some(value));
        }
    }

    // The store never holds more than its capacity.
    #[test]
    fn prop_capacity_enforcement(
        entries in prop::collection::vec((valid_key_strategy(), value_strategy()), 1..200)
    ) {
        let max_entries = 50;
        let mut store = NodeStore::new(max_entries);

        for (key, value) in entries {
            store.set(&key, value, 0).unwrap();
            prop_assert!(
                store.len() <= max_entries,
                "Store size {} exceeds max {}",
                store.len(),
                max_entries
            );
        }
    }

    // At capacity, a new key evicts the least recently used one, and a read
    // protects a key from being that victim.
    #[test]
    fn prop_lru_access_tracking(
        keys in prop::collection::hash_set(valid_key_strategy(), 3..8),
        new_key in valid_key_strategy()
    ) {
        let unique_keys: Vec<String> = keys.into_iter().collect();
        prop_assume!(!unique_keys.contains(&new_key));

        let mut store = NodeStore::new(unique_keys.len());
        for key in &unique_keys {
            store.set(key, json!(format!("value_{key}")), 0).unwrap();
        }

        let accessed = &unique_keys[0];
        let expected_evicted = &unique_keys[1];
        store.get(accessed);

        store.set(&new_key, json!("new"), 0).unwrap();

        prop_assert!(store.get(accessed).is_some());
        prop_assert!(store.get(expected_evicted).is_none());
        prop_assert!(store.get(&new_key).is_some());
    }

    // Racing adds on one node: exactly one wins per key.
    #[test]
    fn prop_concurrent_add_has_single_winner(
        keys in prop::collection::hash_set(valid_key_strategy(), 1..10),
        writers in 2usize..6
    ) {
        let node = Arc::new(MemoryNode::new("race", TEST_MAX_ENTRIES));
        let keys: Vec<String> = keys.into_iter().collect();

        let wins: Vec<usize> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..writers)
                .map(|writer| {
                    let node = Arc::clone(&node);
                    let keys = &keys;
                    scope.spawn(move || {
                        keys.iter()
                            .filter(|key| node.add(key, json!(writer), 0).is_ok())
                            .count()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        prop_assert_eq!(wins.iter().sum::<usize>(), keys.len());
        let distinct: HashSet<&String> = keys.iter().collect();
        prop_assert_eq!(node.len(), distinct.len());
    }
}
