#![cfg(test)]

// Property tests for the HashTable engine kept inside the crate so they can
// check free-list and bucket-chain bookkeeping directly.

use crate::error::Error;
use crate::hash_table::{HashTable, InsertOutcome};
use proptest::prelude::*;
use std::collections::{BTreeSet, HashMap};
use std::collections::hash_map::RandomState;
use std::hash::BuildHasher;

// Pool-indexed operations so shrinking moves toward earlier keys.
#[derive(Clone, Debug)]
enum Op {
    Insert(usize, i32),
    Set(usize, i32),
    Remove(usize),
    Find(usize),
    Retain(i32),
    Clear,
    Trim,
    Iterate,
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<Op>)> {
    proptest::collection::vec("[a-z]{0,4}", 1..=12).prop_flat_map(|pool| {
        let idx = 0..pool.len();
        let op = prop_oneof![
            4 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| Op::Insert(i, v)),
            2 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| Op::Set(i, v)),
            3 => idx.clone().prop_map(Op::Remove),
            2 => idx.clone().prop_map(Op::Find),
            1 => (1..5i32).prop_map(Op::Retain),
            1 => Just(Op::Clear),
            1 => Just(Op::Trim),
            1 => Just(Op::Iterate),
        ];
        proptest::collection::vec(op, 1..80).prop_map(move |ops| (pool.clone(), ops))
    })
}

fn run(pool: &[String], ops: Vec<Op>, hash: impl Fn(&str) -> u64) -> Result<(), TestCaseError> {
    let mut sut: HashTable<String, i32> = HashTable::new();
    let mut model: HashMap<String, i32> = HashMap::new();
    let eq = |a: &String, b: &String| a == b;

    for op in ops {
        match op {
            Op::Insert(i, v) => {
                let k = pool[i].clone();
                let already = model.contains_key(&k);
                match sut.insert(hash(k.as_str()), k.clone(), v, false, eq) {
                    Ok(InsertOutcome::Inserted(_)) => {
                        prop_assert!(!already);
                        model.insert(k, v);
                    }
                    Err(Error::DuplicateKey) => prop_assert!(already),
                    other => prop_assert!(false, "unexpected insert outcome {:?}", other),
                }
            }
            Op::Set(i, v) => {
                let k = pool[i].clone();
                let prev = model.insert(k.clone(), v);
                match sut.insert(hash(k.as_str()), k, v, true, eq) {
                    Ok(InsertOutcome::Inserted(_)) => prop_assert!(prev.is_none()),
                    Ok(InsertOutcome::Overwritten(old)) => prop_assert_eq!(Some(old), prev),
                    Err(e) => prop_assert!(false, "set failed: {}", e),
                }
            }
            Op::Remove(i) => {
                let k = &pool[i];
                let removed = sut.remove(hash(k.as_str()), |stored| stored == k);
                prop_assert_eq!(removed.map(|(_, v)| v), model.remove(k));
            }
            Op::Find(i) => {
                let k = &pool[i];
                let found = sut
                    .find(hash(k.as_str()), |stored| stored == k)
                    .and_then(|at| sut.entry_at(at))
                    .map(|(_, v)| *v);
                prop_assert_eq!(found, model.get(k).copied());
            }
            Op::Retain(m) => {
                let removed = sut.retain(|_, v| v % m == 0);
                let before = model.len();
                model.retain(|_, v| *v % m == 0);
                prop_assert_eq!(removed, before - model.len());
            }
            Op::Clear => {
                let cap = sut.capacity();
                sut.clear();
                model.clear();
                prop_assert_eq!(sut.capacity(), cap);
            }
            Op::Trim => {
                sut.trim_excess();
                prop_assert!(sut.capacity() >= sut.len());
            }
            Op::Iterate => {
                let s_keys: BTreeSet<_> = sut.iter().map(|(_, k, _)| k.clone()).collect();
                let m_keys: BTreeSet<_> = model.keys().cloned().collect();
                prop_assert_eq!(s_keys, m_keys);
            }
        }

        // Bookkeeping holds after every operation.
        prop_assert_eq!(sut.len(), model.len());
        prop_assert_eq!(sut.chained_len(), sut.len());
        prop_assert_eq!(sut.free_list_len(), sut.slot_count() - sut.len());
        prop_assert!(sut.len() <= sut.capacity());
    }
    Ok(())
}

// Property: state-machine equivalence against std::collections::HashMap.
// - Duplicate inserts are rejected without touching storage; overwrite
//   returns the previous value.
// - Every live slot is reachable from exactly one bucket chain.
// - The free list holds exactly the vacated slots below the high-water mark.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario()) {
        let state = RandomState::new();
        run(&pool, ops, |k| state.hash_one(k))?;
    }

    // Same invariants with every key in one chain.
    #[test]
    fn prop_state_machine_with_collisions((pool, ops) in arb_scenario()) {
        run(&pool, ops, |_| 0)?;
    }

    // Hashes that differ but share buckets after the modulo.
    #[test]
    fn prop_state_machine_with_bucket_sharing((pool, ops) in arb_scenario()) {
        run(&pool, ops, |k| k.len() as u64 * 3)?;
    }
}
