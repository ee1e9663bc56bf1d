// StripedHashMap property tests (consolidated).
//
// Property 1: sequential op-stream equivalence with std::HashMap.
//  - Model: a std::collections::HashMap mutated in lockstep.
//  - Invariant: after every op, contains/count/len and the visited
//    value agree with the model.
//  - Operations: insert, insert_or_visit, erase, visit (mutating),
//    clear.
//
// Property 2: whole-table scans match the model snapshot.
//  - After a random op stream, visit_all collects exactly the model's
//    pairs and bulk_visit over a random key list finds exactly the
//    present entries, once per occurrence.
use proptest::prelude::*;
use std::collections::HashMap;
use striped_hashmap::StripedHashMap;

#[derive(Clone, Debug)]
enum Op {
    Insert(u8, u16),
    Upsert(u8, u16),
    Erase(u8),
    Bump(u8),
    Clear,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        8 => (any::<u8>(), any::<u16>()).prop_map(|(k, v)| Op::Insert(k, v)),
        8 => (any::<u8>(), any::<u16>()).prop_map(|(k, v)| Op::Upsert(k, v)),
        4 => any::<u8>().prop_map(Op::Erase),
        4 => any::<u8>().prop_map(Op::Bump),
        1 => Just(Op::Clear),
    ]
}

proptest! {
    // Property 1: op-for-op agreement with the std model.
    #[test]
    fn prop_matches_std_hashmap(ops in proptest::collection::vec(op_strategy(), 1..300)) {
        let m: StripedHashMap<u8, u32> = StripedHashMap::new();
        let mut model: HashMap<u8, u32> = HashMap::new();

        for op in ops {
            match op {
                Op::Insert(k, v) => {
                    let inserted = m.insert(k, u32::from(v)).unwrap();
                    let model_inserted = !model.contains_key(&k);
                    if model_inserted {
                        model.insert(k, u32::from(v));
                    }
                    prop_assert_eq!(inserted, model_inserted);
                }
                Op::Upsert(k, v) => {
                    let inserted = m.insert_or_visit(k, u32::from(v), |_, cur| *cur += 1).unwrap();
                    match model.get_mut(&k) {
                        Some(cur) => {
                            *cur += 1;
                            prop_assert!(!inserted);
                        }
                        None => {
                            model.insert(k, u32::from(v));
                            prop_assert!(inserted);
                        }
                    }
                }
                Op::Erase(k) => {
                    let erased = m.erase(&k);
                    let model_erased = model.remove(&k);
                    prop_assert_eq!(erased.map(|(_, v)| v), model_erased);
                }
                Op::Bump(k) => {
                    let visited = m.visit(&k, |_, v| *v = v.wrapping_add(7));
                    match model.get_mut(&k) {
                        Some(v) => {
                            *v = v.wrapping_add(7);
                            prop_assert_eq!(visited, 1);
                        }
                        None => prop_assert_eq!(visited, 0),
                    }
                }
                Op::Clear => {
                    m.clear();
                    model.clear();
                }
            }

            prop_assert_eq!(m.len(), model.len());
        }

        // Final per-key agreement across the whole key space.
        for k in 0..=u8::MAX {
            prop_assert_eq!(m.contains(&k), model.contains_key(&k));
            prop_assert_eq!(m.count(&k), usize::from(model.contains_key(&k)));
            let mut got = None;
            m.cvisit(&k, |_, v| got = Some(*v));
            prop_assert_eq!(got, model.get(&k).copied());
        }
    }

    // Property 2: scans and bulk lookups reproduce the model exactly.
    #[test]
    fn prop_scans_match_model(
        ops in proptest::collection::vec(op_strategy(), 1..200),
        probe in proptest::collection::vec(any::<u8>(), 0..100),
    ) {
        let m: StripedHashMap<u8, u32> = StripedHashMap::new();
        let mut model: HashMap<u8, u32> = HashMap::new();
        for op in ops {
            match op {
                Op::Insert(k, v) => {
                    if m.insert(k, u32::from(v)).unwrap() {
                        model.insert(k, u32::from(v));
                    }
                }
                Op::Upsert(k, v) => {
                    if !m.insert_or_visit(k, u32::from(v), |_, cur| *cur += 1).unwrap() {
                        *model.get_mut(&k).unwrap() += 1;
                    } else {
                        model.insert(k, u32::from(v));
                    }
                }
                Op::Erase(k) => {
                    let _ = m.erase(&k);
                    model.remove(&k);
                }
                Op::Bump(k) => {
                    m.visit(&k, |_, v| *v = v.wrapping_add(7));
                    if let Some(v) = model.get_mut(&k) {
                        *v = v.wrapping_add(7);
                    }
                }
                Op::Clear => {
                    m.clear();
                    model.clear();
                }
            }
        }

        // visit_all yields exactly the model's pairs.
        let mut scanned = Vec::new();
        let visited = m.cvisit_all(|k, v| scanned.push((*k, *v)));
        prop_assert_eq!(visited, model.len());
        scanned.sort_unstable();
        let mut expected: Vec<(u8, u32)> = model.iter().map(|(k, v)| (*k, *v)).collect();
        expected.sort_unstable();
        prop_assert_eq!(scanned, expected);

        // bulk_visit finds every present probe, once per occurrence
        // (repeated keys in the request are looked up independently).
        let mut present: Vec<u8> = probe.iter().copied().filter(|k| model.contains_key(k)).collect();
        present.sort_unstable();
        let mut found = Vec::new();
        let n = m.bulk_cvisit(&probe, |k, _| found.push(*k));
        prop_assert_eq!(n, present.len());
        found.sort_unstable();
        prop_assert_eq!(found, present);
    }

    // Property 3: visit_while completes iff the predicate never fails,
    // and visits at most (failures allowed + 1) elements otherwise.
    #[test]
    fn prop_visit_while_bounds(keys in proptest::collection::btree_set(any::<u8>(), 0..50), stop_after in 0usize..60) {
        let m: StripedHashMap<u8, u32> = StripedHashMap::new();
        for &k in &keys {
            m.insert(k, 0).unwrap();
        }

        let mut visits = 0usize;
        let complete = m.cvisit_while(|_, _| {
            visits += 1;
            visits <= stop_after
        });
        if stop_after >= keys.len() {
            prop_assert!(complete);
            prop_assert_eq!(visits, keys.len());
        } else {
            prop_assert!(!complete);
            prop_assert_eq!(visits, stop_after + 1);
        }
    }
}
