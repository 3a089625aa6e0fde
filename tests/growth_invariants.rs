use std::collections::HashMap as StdHashMap;
use std::hash::BuildHasher;

use proptest::prelude::*;
use siphasher::sip::SipHasher;
use snug_hash::HashMap;
use snug_hash::LoadFactor;

#[derive(Clone, Default)]
struct SipHashBuilder;

impl BuildHasher for SipHashBuilder {
    type Hasher = SipHasher;

    fn build_hasher(&self) -> Self::Hasher {
        SipHasher::new_with_keys(0x1F2E_3D4C_5B6A_7988, 0x0123_4567_89AB_CDEF)
    }
}

type Map = HashMap<u16, u32, SipHashBuilder>;

/// Keys are drawn from a small range so inserts regularly hit existing keys.
fn key_strategy() -> impl Strategy<Value = u16> {
    0u16..600
}

#[derive(Debug, Clone)]
enum MapOp {
    Insert(u16, u32),
    Remove(u16),
    Reserve(u16),
    ExtendKnown(Vec<(u16, u32)>),
    Extend(Vec<(u16, u32)>),
    Retain(u16),
    Clear,
    CloneMap,
}

fn map_op_strategy() -> impl Strategy<Value = MapOp> {
    prop_oneof![
        8 => (key_strategy(), any::<u32>()).prop_map(|(k, v)| MapOp::Insert(k, v)),
        3 => key_strategy().prop_map(MapOp::Remove),
        1 => (0u16..300).prop_map(MapOp::Reserve),
        1 => proptest::collection::vec((key_strategy(), any::<u32>()), 0..64)
            .prop_map(MapOp::ExtendKnown),
        1 => proptest::collection::vec((key_strategy(), any::<u32>()), 0..64)
            .prop_map(MapOp::Extend),
        1 => (1u16..8).prop_map(MapOp::Retain),
        1 => Just(MapOp::Clear),
        1 => Just(MapOp::CloneMap),
    ]
}

fn load_factor_strategy() -> impl Strategy<Value = LoadFactor> {
    prop_oneof![Just(0.25f32), Just(0.5), Just(0.75), Just(1.0), Just(3.0)]
        .prop_map(|lf| LoadFactor::new(lf).unwrap())
}

fn check_shape(map: &Map) -> Result<(), TestCaseError> {
    let capacity = map.capacity();
    prop_assert!(
        capacity == 0 || capacity.is_power_of_two(),
        "capacity {} is not a power of two",
        capacity
    );
    prop_assert!(
        map.len() <= map.threshold(),
        "{} entries exceed threshold {}",
        map.len(),
        map.threshold()
    );
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Replays random operations on both `HashMap` and the standard library
    /// map, checking contents agree and the bucket array only ever grows.
    #[test]
    fn ops_match_std_and_capacity_never_shrinks(
        load_factor in load_factor_strategy(),
        ops in proptest::collection::vec(map_op_strategy(), 0..400),
    ) {
        let mut map = Map::with_load_factor(load_factor);
        let mut model: StdHashMap<u16, u32> = StdHashMap::new();
        let mut last_capacity = map.capacity();

        for op in ops {
            match op {
                MapOp::Insert(k, v) => {
                    prop_assert_eq!(map.insert(k, v), model.insert(k, v), "insert({})", k);
                }
                MapOp::Remove(k) => {
                    prop_assert_eq!(map.remove(&k), model.remove(&k), "remove({})", k);
                }
                MapOp::Reserve(additional) => {
                    let before = map.len();
                    map.reserve(additional as usize);
                    prop_assert!(map.threshold() >= before + additional as usize);
                }
                MapOp::ExtendKnown(entries) => {
                    let known_size = entries.len();
                    model.extend(entries.iter().copied());
                    map.extend_known(entries, known_size);
                }
                MapOp::Extend(entries) => {
                    model.extend(entries.iter().copied());
                    map.extend(entries);
                }
                MapOp::Retain(modulus) => {
                    map.retain(|k, _| k % modulus == 0);
                    model.retain(|k, _| k % modulus == 0);
                }
                MapOp::Clear => {
                    map.clear();
                    model.clear();
                }
                MapOp::CloneMap => {
                    let clone = map.clone();
                    check_shape(&clone)?;
                    prop_assert!(clone.capacity() <= map.capacity());
                    prop_assert_eq!(clone.len(), map.len());
                    prop_assert_eq!(clone.load_factor(), map.load_factor());
                }
            }

            check_shape(&map)?;
            prop_assert!(
                map.capacity() >= last_capacity,
                "capacity shrank from {} to {}",
                last_capacity,
                map.capacity()
            );
            last_capacity = map.capacity();
            prop_assert_eq!(map.len(), model.len());
        }

        for (k, v) in &model {
            prop_assert_eq!(map.get(k), Some(v));
        }
    }

    /// A copy built from a known size never has more buckets than the source
    /// built one entry at a time.
    #[test]
    fn copy_never_exceeds_sequential_build(
        load_factor in load_factor_strategy(),
        keys in proptest::collection::hash_set(any::<u16>(), 0..1024),
    ) {
        let mut sequential = Map::with_load_factor(load_factor);
        for &k in &keys {
            sequential.insert(k, u32::from(k));
        }

        let copy = Map::from_entries_and_hasher(
            sequential.iter().map(|(&k, &v)| (k, v)),
            sequential.len(),
            load_factor,
            SipHashBuilder,
        );
        prop_assert_eq!(&copy, &sequential);
        prop_assert!(copy.capacity() <= sequential.capacity());

        let mut bulk = Map::with_load_factor(load_factor);
        bulk.extend_known(keys.iter().map(|&k| (k, u32::from(k))), keys.len());
        prop_assert!(bulk.capacity() <= sequential.capacity());
    }
}
