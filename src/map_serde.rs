use crate::{KeyOps, QMap, QSet};
use allocator_api2::alloc::{Allocator, Global};
use core::fmt;
use core::marker::PhantomData;
use serde_crate::de::{Deserialize, MapAccess, SeqAccess, Visitor};
use serde_crate::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use serde_crate::Deserializer;

/// Entries are inserted one by one, so this only bounds the initial size.
const MAX_PREALLOCATED: usize = 1 << 16;

fn min_size_hint(hint: Option<usize>) -> u32 {
    hint.unwrap_or(0).min(MAX_PREALLOCATED) as u32
}

pub struct QMapVisitor<K, V, O> {
    marker: PhantomData<fn() -> QMap<K, V, O, Global>>,
}

impl<K, V, O> QMapVisitor<K, V, O> {
    fn new() -> Self {
        QMapVisitor {
            marker: PhantomData,
        }
    }
}

impl<'de, K, V, O> Visitor<'de> for QMapVisitor<K, V, O>
where
    K: Deserialize<'de> + Copy,
    V: Deserialize<'de> + Copy,
    O: KeyOps<K> + Default,
{
    type Value = QMap<K, V, O, Global>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a map")
    }

    fn visit_map<M>(self, mut access: M) -> Result<Self::Value, M::Error>
    where
        M: MapAccess<'de>,
    {
        let mut map = QMap::with_min_size(min_size_hint(access.size_hint()));

        while let Some((key, value)) = access.next_entry()? {
            map.insert(key, value);
        }

        Ok(map)
    }
}

impl<'de, K, V, O> Deserialize<'de> for QMap<K, V, O, Global>
where
    K: Deserialize<'de> + Copy,
    V: Deserialize<'de> + Copy,
    O: KeyOps<K> + Default,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(QMapVisitor::<K, V, O>::new())
    }
}

impl<K, V, O, A> Serialize for QMap<K, V, O, A>
where
    K: Serialize + Copy,
    V: Serialize + Copy,
    O: KeyOps<K>,
    A: Allocator,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.len()))?;

        for (k, v) in self.iter() {
            map.serialize_entry(k, v)?;
        }

        map.end()
    }
}

pub struct QSetVisitor<K, O> {
    marker: PhantomData<fn() -> QSet<K, O, Global>>,
}

impl<'de, K, O> Visitor<'de> for QSetVisitor<K, O>
where
    K: Deserialize<'de> + Copy,
    O: KeyOps<K> + Default,
{
    type Value = QSet<K, O, Global>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a sequence")
    }

    fn visit_seq<M>(self, mut access: M) -> Result<Self::Value, M::Error>
    where
        M: SeqAccess<'de>,
    {
        let mut set = QSet::with_min_size(min_size_hint(access.size_hint()));

        while let Some(key) = access.next_element()? {
            set.insert(key);
        }

        Ok(set)
    }
}

impl<'de, K, O> Deserialize<'de> for QSet<K, O, Global>
where
    K: Deserialize<'de> + Copy,
    O: KeyOps<K> + Default,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_seq(QSetVisitor::<K, O> {
            marker: PhantomData,
        })
    }
}

impl<K, O, A> Serialize for QSet<K, O, A>
where
    K: Serialize + Copy,
    O: KeyOps<K>,
    A: Allocator,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(self.len()))?;

        for key in self.iter() {
            seq.serialize_element(key)?;
        }

        seq.end()
    }
}

#[cfg(test)]
mod test {
    use crate::{QMap, QMapU32, QSetU64};

    #[test]
    fn qmap_serde() {
        let mut map = QMapU32::<u8>::new();

        map.insert(0, 11);
        map.insert(1, 12);
        map.insert(2, 13);
        map.insert(3, 14);
        map.insert(4, 15);
        map.insert(5, 16);

        let serialized = serde_json::to_string(&map).expect("Couldn't serialize map");
        let deserialized: QMapU32<u8> =
            serde_json::from_str(&serialized).expect("Couldn't deserialize map");

        assert_eq!(deserialized.len(), 6);
        assert_eq!(deserialized.get(&0), Some(&11));
        assert_eq!(deserialized.get(&1), Some(&12));
        assert_eq!(deserialized.get(&2), Some(&13));
        assert_eq!(deserialized.get(&3), Some(&14));
        assert_eq!(deserialized.get(&4), Some(&15));
        assert_eq!(deserialized.get(&5), Some(&16));
    }

    #[test]
    fn hashed_qmap_serde() {
        let map: QMap<char, u16> = [('a', 1), ('b', 2)].into_iter().collect();
        let serialized = serde_json::to_string(&map).expect("Couldn't serialize map");
        let deserialized: QMap<char, u16> =
            serde_json::from_str(&serialized).expect("Couldn't deserialize map");
        assert_eq!(deserialized.get(&'a'), Some(&1));
        assert_eq!(deserialized.get(&'b'), Some(&2));
    }

    #[test]
    fn qset_serde() {
        let set: QSetU64 = (0..50u64).map(|k| k << 33).collect();

        let serialized = serde_json::to_string(&set).expect("Couldn't serialize set");
        let deserialized: QSetU64 =
            serde_json::from_str(&serialized).expect("Couldn't deserialize set");

        assert_eq!(deserialized.len(), 50);
        assert!((0..50u64).all(|k| deserialized.contains(&(k << 33))));
    }
}
