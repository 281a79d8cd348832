use std::collections::HashMap;

use hub_dispatch::distance::DistanceGraph;
use hub_dispatch::domain::{Address, Deadline, LocationId};
use hub_dispatch::error::Result;
use hub_dispatch::solver::{sequence_stops, Stop};
use hub_dispatch::store::KeyedStore;
use proptest::prelude::*;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

#[derive(Debug, Clone)]
enum Op {
    Insert(u32, u64),
    Remove(u32),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0u32..200, any::<u64>()).prop_map(|(k, v)| Op::Insert(k, v)),
        1 => (0u32..200).prop_map(Op::Remove),
    ]
}

proptest! {
    #[test]
    fn store_matches_a_map_model(ops in prop::collection::vec(op(), 0..300)) {
        let mut store: KeyedStore<u32, u64> = KeyedStore::new();
        let mut model = HashMap::new();
        let mut buckets = store.bucket_count();

        for op in ops {
            match op {
                Op::Insert(k, v) => {
                    prop_assert_eq!(store.insert(k, v), model.insert(k, v));
                    prop_assert!(store.load_factor() <= 0.5);
                }
                Op::Remove(k) => {
                    prop_assert_eq!(store.remove(k).ok(), model.remove(&k));
                }
            }
            prop_assert!(store.bucket_count() >= buckets);
            buckets = store.bucket_count();
            prop_assert_eq!(store.len(), model.len());
        }

        for (k, v) in &model {
            prop_assert_eq!(store.get(*k).ok(), Some(v));
        }
        prop_assert_eq!(store.iter().count(), model.len());
    }

    #[test]
    fn graph_distances_are_symmetric(weights in prop::collection::vec(0.0f64..50.0, 1..40)) {
        let mut graph = DistanceGraph::new();
        let n = (1..).find(|n| n * (n + 1) / 2 >= weights.len()).unwrap_or(1) + 1;
        let ids: Vec<LocationId> = (0..n)
            .map(|i| graph.add_vertex(&format!("L{i}"), Address::new(&format!("{i} Main St"), "Town", "1")))
            .collect();

        let mut w = weights.iter().cycle();
        for i in 0..n {
            for j in 0..i {
                graph.add_edge(ids[i], ids[j], *w.next().unwrap()).unwrap();
            }
        }
        prop_assert!(graph.ensure_dense().is_ok());
        for &a in &ids {
            prop_assert_eq!(graph.distance(a, a).unwrap(), 0.0);
            for &b in &ids {
                prop_assert_eq!(graph.distance(a, b).unwrap(), graph.distance(b, a).unwrap());
            }
        }
    }

    #[test]
    fn sequencing_is_a_greedy_permutation(
        points in prop::collection::vec((0usize..30, prop::option::of(0u32..600)), 0..25)
    ) {
        let stops: Vec<Stop> = points
            .iter()
            .enumerate()
            .map(|(i, (loc, minutes))| Stop {
                package: i as u32,
                location: LocationId(*loc),
                deadline: minutes
                    .and_then(|m| chrono::NaiveTime::from_hms_opt(8 + m / 60, m % 60, 0))
                    .map_or(Deadline::EndOfDay, Deadline::By),
            })
            .collect();
        let line = |a: LocationId, b: LocationId| -> Result<f64> { Ok((a.0 as f64 - b.0 as f64).abs()) };

        let order = sequence_stops(&stops, LocationId(0), line).unwrap();
        let mut current = LocationId(0);
        for (i, chosen) in order.iter().enumerate() {
            let chosen_distance = line(current, chosen.location).unwrap();
            for later in &order[i + 1..] {
                prop_assert!(
                    line(current, later.location).unwrap() >= chosen_distance
                        || later.deadline > chosen.deadline
                );
            }
            current = chosen.location;
        }

        let mut got: Vec<u32> = order.iter().map(|s| s.package).collect();
        got.sort_unstable();
        prop_assert_eq!(got, (0..stops.len() as u32).collect::<Vec<_>>());
    }
}

#[test]
fn shuffled_inserts_survive_many_rehashes() {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let mut keys: Vec<u32> = (0..5_000).collect();
    keys.shuffle(&mut rng);

    let mut store: KeyedStore<u32, u64> = KeyedStore::new();
    for &k in &keys {
        store.insert(k, u64::from(k) * 3);
    }
    assert_eq!(store.len(), 5_000);
    assert!(store.load_factor() <= 0.5);
    assert!(store.bucket_count().is_power_of_two());

    keys.shuffle(&mut rng);
    for &k in keys.iter().take(2_500) {
        assert_eq!(store.remove(k).unwrap(), u64::from(k) * 3);
    }
    let buckets = store.bucket_count();
    assert_eq!(store.len(), 2_500);
    for &k in keys.iter().skip(2_500) {
        assert_eq!(*store.get(k).unwrap(), u64::from(k) * 3);
    }
    assert!(store.get(keys[0]).is_err());
    assert_eq!(store.bucket_count(), buckets);
}
