//! Randomized checks of the tree against `BTreeMap`.

use std::collections::BTreeMap;

use pagetree::{BPlusTree, PageId, TreeConfig};
use proptest::prelude::*;

#[derive(Clone, Debug)]
enum Op {
    Insert(i32, i32),
    Remove(i32),
    Compact,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    let key = -64i32..64;
    prop_oneof![
        6 => (key.clone(), any::<i32>()).prop_map(|(k, v)| Op::Insert(k, v)),
        2 => key.prop_map(Op::Remove),
        1 => Just(Op::Compact),
    ]
}

/// Structural checks that hold after any operation sequence.
fn check_structure(tree: &BPlusTree) -> Result<(), TestCaseError> {
    let max_keys = tree.max_keys();
    for level in tree.levels().unwrap() {
        for node in level {
            prop_assert!(node.keys.len() <= max_keys);
            prop_assert!(node.keys.windows(2).all(|w| w[0] < w[1]));
        }
    }

    let chain = tree.leaf_chain().unwrap();
    let mut prev = PageId::INVALID;
    for &page_id in &chain {
        prop_assert_eq!(tree.summarize(page_id).unwrap().prev, prev);
        prev = page_id;
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn matches_btreemap(
        order in 3usize..9,
        ops in prop::collection::vec(op_strategy(), 1..300),
    ) {
        let mut tree = BPlusTree::in_memory(TreeConfig::default().with_order(order)).unwrap();
        let mut model = BTreeMap::new();

        for op in ops {
            match op {
                Op::Insert(k, v) => {
                    tree.insert(k, v).unwrap();
                    model.insert(k, v);
                }
                Op::Remove(k) => {
                    prop_assert_eq!(tree.remove(k).unwrap(), model.remove(&k));
                }
                Op::Compact => {
                    tree.compact_leaves().unwrap();
                }
            }
        }

        for k in -64..64 {
            prop_assert_eq!(tree.search(k).unwrap(), model.get(&k).copied());
        }
        let expected: Vec<(i32, i32)> = model.iter().map(|(&k, &v)| (k, v)).collect();
        prop_assert_eq!(tree.range_query(i32::MIN, i32::MAX).unwrap(), expected);
        prop_assert_eq!(tree.len().unwrap(), model.len());
        check_structure(&tree)?;
    }

    #[test]
    fn range_query_matches_model(
        keys in prop::collection::btree_set(-500i32..500, 0..200),
        a in -600i32..600,
        b in -600i32..600,
    ) {
        let mut tree = BPlusTree::in_memory(TreeConfig::default().with_order(4)).unwrap();
        for &k in &keys {
            tree.insert(k, k.wrapping_mul(31)).unwrap();
        }

        let expected: Vec<(i32, i32)> = if a <= b {
            keys.range(a..=b).map(|&k| (k, k.wrapping_mul(31))).collect()
        } else {
            Vec::new()
        };
        prop_assert_eq!(tree.range_query(a, b).unwrap(), expected);
    }
}
