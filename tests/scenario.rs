use qhash::{PutMode, QMapU32, QSetU32, RawTable, U32Keys};
use test_log::test;

const PRIMES: [usize; 27] = [
    11, 23, 53, 97, 193, 389, 769, 1543, 3079, 6151, 12289, 24593, 49157, 98317, 196613, 393241,
    786433, 1572869, 3145739, 6291469, 12582917, 25165843, 50331653, 100663319, 201326611,
    402653189, 805306457,
];

#[test]
fn thousand_keys_grow_through_primes() {
    let mut set = QSetU32::new();
    let mut sizes = Vec::new();

    for key in 1..=1000u32 {
        assert!(set.insert(key));
        if sizes.last() != Some(&set.capacity()) {
            sizes.push(set.capacity());
        }
        assert!(set.len() <= set.capacity());
    }
    assert_eq!(sizes, vec![11, 23, 53, 97, 193, 389, 769, 1543]);
    assert_eq!(set.len(), 1000);

    for key in 1..=1000u32 {
        assert!(set.contains(&key), "key {key} missing");
    }
    assert!(!set.contains(&1001));
    assert!(!set.contains(&0));

    for key in 1..=1000u32 {
        assert!(set.remove(&key));
    }
    assert!(set.is_empty());

    set.seal();
    assert_eq!(set.len(), 0);
    assert_eq!(set.raw().ghosts().count(), 0);
    assert_eq!(set.capacity(), 389);
    assert!(!set.contains(&1));
}

#[test]
fn capacity_is_always_prime() {
    let mut map = QMapU32::<u32>::new();
    let mut state = 0x1234_5678u32;
    for i in 0..20_000u32 {
        // xorshift
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        let key = state % 4096;
        if i % 3 == 2 {
            map.remove(&key);
        } else {
            map.insert(key, i);
        }
        assert!(PRIMES.contains(&map.capacity()));
        assert!(map.len() <= map.capacity());
    }
}

#[test]
fn tombstones_are_reclaimed() {
    let mut map = QMapU32::<u64>::new();
    for key in 0..5000 {
        map.insert(key, key as u64);
    }
    let grown = map.capacity();
    for key in 0..5000 {
        assert_eq!(map.remove(&key), Some(key as u64));
    }
    assert!(map.raw().ghosts().count() > 0);

    map.seal();
    assert!(map.is_empty());
    assert_eq!(map.raw().ghosts().count(), 0);
    assert!(map.capacity() < grown);
    assert_eq!(map.iter().count(), 0);
}

#[test]
fn seal_is_idempotent() {
    let mut map = QMapU32::<u32>::new();
    for key in 0..3000 {
        map.insert(key * 7, key);
    }
    for key in 0..1000 {
        map.remove(&(key * 7));
    }

    map.seal();
    let capacity = map.capacity();
    let len = map.len();
    let mut keys: Vec<u32> = map.keys().copied().collect();
    keys.sort_unstable();

    map.unseal();
    map.seal();
    assert_eq!(map.capacity(), capacity);
    assert_eq!(map.len(), len);
    let mut again: Vec<u32> = map.keys().copied().collect();
    again.sort_unstable();
    assert_eq!(keys, again);
}

#[test]
fn reads_during_resize() {
    let ops = U32Keys;
    let mut table = RawTable::<u32, u32>::new(true);
    let mut key = 0u32;
    while !table.is_resizing() {
        table.put(&ops, key, key, !key, PutMode::Keep);
        key += 1;
    }

    // Side effect free lookups see both generations.
    for k in 0..key {
        let pos = table.safe_get(&ops, k, &k).expect("key lost mid resize");
        assert_eq!(*table.value(pos), !k);
    }
    assert!(table.is_resizing());
    assert_eq!(table.positions().count(), key as usize);

    // Removing during the resize, from either generation.
    for k in (0..key).step_by(2) {
        let pos = table.safe_get(&ops, k, &k).unwrap();
        assert!(table.del_at(pos));
        assert!(!table.del_at(pos));
    }
    assert_eq!(table.len(), key as usize / 2);

    // Migrating lookups finish the resize.
    for k in 0..key {
        let found = table.get(&ops, k, &k).map(|pos| *table.value(pos));
        assert_eq!(found, (k % 2 == 1).then_some(!k));
    }
    let first_batch = key;
    while table.is_resizing() {
        table.put(&ops, key, key, !key, PutMode::Keep);
        key += 1;
    }
    for k in 0..key {
        let expected = k >= first_batch || k % 2 == 1;
        let found = table.safe_get(&ops, k, &k).map(|pos| *table.value(pos));
        assert_eq!(found, expected.then_some(!k));
    }
}

#[test]
#[should_panic(expected = "unsafe find operation performed on a sealed hash table")]
fn migrating_lookup_on_sealed_table_panics() {
    let mut map = QMapU32::<u32>::new();
    map.insert(1, 1);
    map.seal();
    map.find(&1);
}

#[test]
#[should_panic(expected = "delete operation performed on a sealed hash table")]
fn delete_on_sealed_table_panics() {
    let mut map = QMapU32::<u32>::new();
    let pos = map.put(1, 1, PutMode::Keep).pos();
    map.seal();
    map.remove_at(pos);
}

#[test]
#[should_panic(expected = "clear performed on a sealed hash table")]
fn clear_on_sealed_table_panics() {
    let mut set = QSetU32::new();
    set.seal();
    set.clear();
}

#[test]
#[should_panic(expected = "overflows the slot index space")]
fn oversized_min_size_panics() {
    let mut set = QSetU32::new();
    set.set_min_size(u32::MAX / 2);
}
