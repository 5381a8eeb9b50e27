// QMap property tests against std::collections::HashMap.
//
// Model: a HashMap<u32, u32> receiving the same operations.
// Operations: insert, add, remove, migrating find, side effect free get,
// seal followed by unseal, minimum size change.
// Invariant after each step: len() matches, and the key touched by the step
// maps to the same value in both. At the end every model entry is found and
// iteration yields exactly the model.
//
// Keys are hashed weakly so that probe chains collide and migration chains
// and cycles happen often.
use proptest::prelude::*;
use qhash::{InlineKeys, PutMode, QMap};
use std::collections::HashMap;

fn weak_ops() -> InlineKeys<u32> {
    InlineKeys::new(|k| k / 3, |a, b| a == b)
}

fn check_model(
    map: &QMap<u32, u32, InlineKeys<u32>>,
    model: &HashMap<u32, u32>,
) -> Result<(), TestCaseError> {
    prop_assert_eq!(map.len(), model.len());
    for (k, v) in model {
        prop_assert_eq!(map.get(k), Some(v));
    }
    let mut seen = HashMap::new();
    for (k, v) in map.iter() {
        prop_assert!(seen.insert(*k, *v).is_none());
    }
    prop_assert_eq!(&seen, model);
    Ok(())
}

proptest! {
    #[test]
    fn prop_qmap_matches_model(
        cache_hashes in any::<bool>(),
        ops in proptest::collection::vec((0u8..=6u8, 0u32..1500u32, any::<u32>()), 1..1500),
    ) {
        let mut map = QMap::with_min_size_and_ops_in(0, weak_ops(), cache_hashes, allocator_api2::alloc::Global);
        let mut model: HashMap<u32, u32> = HashMap::new();

        for (op, key, value) in ops {
            match op {
                0 | 1 => {
                    prop_assert_eq!(map.insert(key, value), model.insert(key, value));
                }
                2 => {
                    let added = map.add(key, value);
                    prop_assert_eq!(added, !model.contains_key(&key));
                    model.entry(key).or_insert(value);
                }
                3 => {
                    prop_assert_eq!(map.remove(&key), model.remove(&key));
                }
                4 => {
                    let found = map.find(&key).map(|pos| *map.value_at(pos));
                    prop_assert_eq!(found.as_ref(), model.get(&key));
                }
                5 => {
                    map.seal();
                    prop_assert!(!map.raw().is_resizing());
                    prop_assert_eq!(map.raw().ghosts().count(), 0);
                    check_model(&map, &model)?;
                    map.unseal();
                }
                6 => {
                    map.set_min_size(value % 256);
                }
                _ => unreachable!(),
            }

            prop_assert_eq!(map.len(), model.len());
            prop_assert_eq!(map.get(&key), model.get(&key));
        }

        check_model(&map, &model)?;
        let put = map.put(1500, 1, PutMode::Keep);
        prop_assert!(!put.is_collision());
        prop_assert_eq!(map.key_at(put.pos()), &1500);
    }
}
