extern crate std;

use std::{collections::BTreeSet, ops::Range, prelude::v1::*};

use cordyceps::Linked;
use proptest::prelude::*;

use crate::model::{self, TestNode};

use super::*;

fn insert_find_all(keys: &[u32]) {
    let mut tree: AvlTree<TestNode> = AvlTree::new();

    for &key in keys {
        tree.insert(TestNode::new(key)).expect("keys are distinct");
        tree.assert_invariants();
    }

    for key in keys {
        let node = tree.get(key).expect("item not found");
        assert_eq!(node.key, *key);
    }
}

#[test]
fn zero_elems_find() {
    insert_find_all(&[]);
}

#[test]
fn single_elem_find() {
    insert_find_all(&[0]);
}

#[test]
fn two_elems_find() {
    insert_find_all(&[0, 1]);
    insert_find_all(&[1, 0]);
}

#[test]
fn three_elems_find() {
    insert_find_all(&[0, 1, 2]);
    insert_find_all(&[0, 2, 1]);
    insert_find_all(&[1, 0, 2]);
    insert_find_all(&[1, 2, 0]);
    insert_find_all(&[2, 0, 1]);
    insert_find_all(&[2, 1, 0]);
}

#[test]
fn four_elems_find() {
    insert_find_all(&[0, 1, 2, 3]);
    insert_find_all(&[0, 1, 3, 2]);
    insert_find_all(&[0, 2, 1, 3]);
    insert_find_all(&[0, 2, 3, 1]);
    insert_find_all(&[0, 3, 1, 2]);
    insert_find_all(&[0, 3, 2, 1]);

    insert_find_all(&[1, 0, 2, 3]);
    insert_find_all(&[1, 0, 3, 2]);
    insert_find_all(&[1, 2, 0, 3]);
    insert_find_all(&[1, 2, 3, 0]);
    insert_find_all(&[1, 3, 0, 2]);
    insert_find_all(&[1, 3, 2, 0]);

    insert_find_all(&[2, 0, 1, 3]);
    insert_find_all(&[2, 0, 3, 1]);
    insert_find_all(&[2, 1, 0, 3]);
    insert_find_all(&[2, 1, 3, 0]);
    insert_find_all(&[2, 3, 0, 1]);
    insert_find_all(&[2, 3, 1, 0]);

    insert_find_all(&[3, 0, 1, 2]);
    insert_find_all(&[3, 0, 2, 1]);
    insert_find_all(&[3, 1, 0, 2]);
    insert_find_all(&[3, 1, 2, 0]);
    insert_find_all(&[3, 2, 0, 1]);
    insert_find_all(&[3, 2, 1, 0]);
}

fn insert_remove_all(keys: &[u32]) {
    let mut tree: AvlTree<TestNode> = AvlTree::new();

    for &key in keys {
        tree.insert(TestNode::new(key)).expect("keys are distinct");
        tree.assert_invariants();
    }

    for key in keys {
        let node = tree.remove(key).expect("item not found");
        assert_eq!(node.key, *key);
        tree.assert_invariants();
    }

    for &key in keys {
        tree.insert(TestNode::new(key)).expect("tree was emptied");
        tree.assert_invariants();
    }

    for key in keys.iter().rev() {
        tree.remove(key).expect("item not found");
        tree.assert_invariants();
    }
}

#[test]
fn remove_one() {
    insert_remove_all(&[0]);
}

#[test]
fn remove_two() {
    insert_remove_all(&[0, 1]);
    insert_remove_all(&[1, 0]);
}

#[test]
fn remove_three() {
    insert_remove_all(&[0, 1, 2]);
    insert_remove_all(&[0, 2, 1]);
    insert_remove_all(&[1, 0, 2]);
    insert_remove_all(&[1, 2, 0]);
    insert_remove_all(&[2, 0, 1]);
    insert_remove_all(&[2, 1, 0]);
}

#[test]
fn remove_four() {
    insert_remove_all(&[0, 1, 2, 3]);
    insert_remove_all(&[0, 1, 3, 2]);
    insert_remove_all(&[0, 2, 1, 3]);
    insert_remove_all(&[0, 2, 3, 1]);
    insert_remove_all(&[0, 3, 1, 2]);
    insert_remove_all(&[0, 3, 2, 1]);

    insert_remove_all(&[1, 0, 2, 3]);
    insert_remove_all(&[1, 0, 3, 2]);
    insert_remove_all(&[1, 2, 0, 3]);
    insert_remove_all(&[1, 2, 3, 0]);
    insert_remove_all(&[1, 3, 0, 2]);
    insert_remove_all(&[1, 3, 2, 0]);

    insert_remove_all(&[2, 0, 1, 3]);
    insert_remove_all(&[2, 0, 3, 1]);
    insert_remove_all(&[2, 1, 0, 3]);
    insert_remove_all(&[2, 1, 3, 0]);
    insert_remove_all(&[2, 3, 0, 1]);
    insert_remove_all(&[2, 3, 1, 0]);

    insert_remove_all(&[3, 0, 1, 2]);
    insert_remove_all(&[3, 0, 2, 1]);
    insert_remove_all(&[3, 1, 0, 2]);
    insert_remove_all(&[3, 1, 2, 0]);
    insert_remove_all(&[3, 2, 0, 1]);
    insert_remove_all(&[3, 2, 1, 0]);
}

// The hand-built tree the fixture tests below operate on:
//
//         6
//        / \
//       4   7
//      /     \
//     1       9
//    / \       \
//   0   3       12
fn fixture_shape() -> Shape<u32> {
    shape!(6, (4, (1, (0, _, _), (3, _, _)), _), (7, _, (9, _, (12, _, _))))
}

fn raw_fixture() -> AvlTree<TestNode> {
    AvlTree::from_shape(Balance::Off, &fixture_shape(), TestNode::new)
}

#[test]
fn raw_build_round_trips() {
    let tree = raw_fixture();

    assert_eq!(tree.len(), 8);
    assert_eq!(tree.height(), 4);
    assert_eq!(tree.to_shape(), Some(fixture_shape()));
    tree.assert_invariants();
}

#[test]
fn search_hit_and_miss_anchor() {
    let tree = raw_fixture();

    let node = tree.search(&12).expect("key is present");
    assert_eq!(node.key, 12);

    // 12 hangs off 9's right arm.
    let map = tree.to_map();
    let parent = unsafe { TestNode::links(map[&12]).as_ref().parent() };
    assert_eq!(parent, Some(map[&9]));

    // A miss hands back the node an insertion would attach under.
    let miss = tree.search(&5).unwrap_err();
    let anchor = miss.last_visited().expect("tree is not empty");
    assert_eq!(unsafe { anchor.as_ref().key }, 4);

    let miss = tree.search(&8).unwrap_err();
    let anchor = miss.last_visited().expect("tree is not empty");
    assert_eq!(unsafe { anchor.as_ref().key }, 9);

    let empty: AvlTree<TestNode> = AvlTree::new();
    let miss = empty.search(&1).unwrap_err();
    assert!(miss.last_visited().is_none());
}

#[test]
fn sequential_insert_builds_fixture_shape() {
    let tree: AvlTree<TestNode> = AvlTree::from_keys(Balance::Off, [6, 4, 7, 9, 12, 1, 0, 3], TestNode::new)
        .expect("keys are distinct");

    assert_eq!(tree.to_shape(), Some(fixture_shape()));
    tree.assert_invariants();
}

#[test]
fn remove_splices_and_updates_balance() {
    let mut tree = raw_fixture();

    tree.remove(&12).expect("key is present");
    assert_eq!(
        tree.to_shape(),
        Some(shape!(6, (4, (1, (0, _, _), (3, _, _)), _), (7, _, (9, _, _))))
    );
    tree.assert_invariants();

    tree.remove(&7).expect("key is present");
    assert_eq!(
        tree.to_shape(),
        Some(shape!(6, (4, (1, (0, _, _), (3, _, _)), _), (9, _, _)))
    );
    tree.assert_invariants();

    // Removal of an absent key fails without touching the tree.
    tree.remove(&7).unwrap_err();
    tree.assert_invariants();

    // 1 has two children; its key slot is taken over by its in-order
    // predecessor 0.
    tree.remove(&1).expect("key is present");
    assert_eq!(
        tree.to_shape(),
        Some(shape!(6, (4, (0, _, (3, _, _)), _), (9, _, _)))
    );
    tree.assert_invariants();

    tree.remove(&6).expect("key is present");
    assert_eq!(tree.to_shape(), Some(shape!(4, (0, _, (3, _, _)), (9, _, _))));
    tree.assert_invariants();

    tree.remove(&9).expect("key is present");
    assert_eq!(tree.to_shape(), Some(shape!(4, (0, _, (3, _, _)), _)));
    tree.assert_invariants();
}

#[test]
fn remove_unary_nodes() {
    let mut tree: AvlTree<TestNode> = AvlTree::from_shape(
        Balance::Off,
        &shape!(150, (130, _, _), (170, _, (190, _, (210, _, _)))),
        TestNode::new,
    );

    tree.remove(&170).expect("key is present");
    assert_eq!(
        tree.to_shape(),
        Some(shape!(150, (130, _, _), (190, _, (210, _, _))))
    );
    tree.assert_invariants();

    tree.remove(&210).expect("key is present");
    assert_eq!(tree.to_shape(), Some(shape!(150, (130, _, _), (190, _, _))));
    tree.assert_invariants();

    tree.remove(&150).expect("key is present");
    assert_eq!(tree.to_shape(), Some(shape!(130, _, (190, _, _))));
    tree.assert_invariants();

    tree.remove(&130).expect("key is present");
    assert_eq!(tree.to_shape(), Some(shape!(190)));
    tree.assert_invariants();
}

#[test]
fn removing_last_node_empties_the_tree() {
    let mut tree: AvlTree<TestNode> = AvlTree::new();
    tree.insert(TestNode::new(190)).expect("tree is empty");

    let node = tree.remove(&190).expect("key is present");
    assert_eq!(node.key, 190);
    assert!(tree.is_empty());
    assert_eq!(tree.to_shape(), None);
    tree.assert_invariants();

    // The emptied tree is fully usable again.
    tree.insert(TestNode::new(7)).expect("tree is empty");
    assert_eq!(tree.to_shape(), Some(shape!(7)));
    tree.assert_invariants();
}

#[test]
fn first_and_last() {
    let tree = raw_fixture();

    assert_eq!(tree.first().expect("tree is not empty").key, 0);
    assert_eq!(tree.last().expect("tree is not empty").key, 12);

    let mut tree = tree;
    assert_eq!(tree.pop_first().expect("tree is not empty").key, 0);
    assert_eq!(tree.pop_last().expect("tree is not empty").key, 12);
    tree.assert_invariants();
    assert_eq!(tree.len(), 6);
}

#[test]
fn duplicate_insert_is_rejected() {
    let mut tree: AvlTree<TestNode> = AvlTree::from_keys(Balance::Avl, [10, 5], TestNode::new).expect("distinct");

    let dup = tree.insert(TestNode::new(5)).unwrap_err();
    assert_eq!(unsafe { dup.existing().as_ref().key }, 5);
    assert_eq!(dup.rejected.key, 5);

    assert_eq!(tree.len(), 2);
    tree.assert_invariants();
}

// Rotating by hand on the unbalanced build of
// [100, 50, 40, 60, 150, 170, 190, 200]:
//
//        100                          100
//       /   \                        /   \
//      50    150        cw(40)     40     150
//     /  \     \        =====>      \       \
//    40   60    170                  50      170
//                 \                    \       \
//                  190                  60      190
//                    \                            \
//                     200                          200
fn manual_rotation_fixture() -> AvlTree<TestNode> {
    AvlTree::from_keys(
        Balance::Off,
        [100, 50, 40, 60, 150, 170, 190, 200],
        TestNode::new,
    )
    .expect("keys are distinct")
}

#[test]
fn manual_rotations_adjust_structure_and_balance() {
    let mut tree = manual_rotation_fixture();

    let pivot = tree.get_raw(&40).expect("key is present");
    unsafe { tree.rotate_cw_at(pivot) }.expect("40 is a left child");
    assert_eq!(
        tree.to_shape(),
        Some(shape!(
            100,
            (40, _, (50, _, (60, _, _))),
            (150, _, (170, _, (190, _, (200, _, _))))
        ))
    );
    tree.assert_invariants();

    let pivot = tree.get_raw(&170).expect("key is present");
    unsafe { tree.rotate_ccw_at(pivot) }.expect("170 is a right child");
    assert_eq!(
        tree.to_shape(),
        Some(shape!(
            100,
            (40, _, (50, _, (60, _, _))),
            (170, (150, _, _), (190, _, (200, _, _)))
        ))
    );
    tree.assert_invariants();
}

#[test]
fn rotation_of_raw_built_subtree() {
    let mut tree: AvlTree<TestNode> = AvlTree::from_shape(
        Balance::Off,
        &shape!(32, (23, _, _), (48, _, (59, _, _))),
        TestNode::new,
    );

    let pivot = tree.get_raw(&48).expect("key is present");
    unsafe { tree.rotate_ccw_at(pivot) }.expect("48 is a right child");
    assert_eq!(tree.to_shape(), Some(shape!(48, (32, (23, _, _), _), (59, _, _))));
    tree.assert_invariants();
}

#[test]
fn wrong_side_rotations_fail_without_mutation() {
    let mut tree = manual_rotation_fixture();
    let before = tree.to_shape();

    // 40 hangs off 50's left arm; only a clockwise rotation fits.
    let pivot = tree.get_raw(&40).expect("key is present");
    assert_eq!(
        unsafe { tree.rotate_ccw_at(pivot) },
        Err(RotateError::WrongSide)
    );

    // 200 hangs off 190's right arm; only counter-clockwise fits.
    let pivot = tree.get_raw(&200).expect("key is present");
    assert_eq!(
        unsafe { tree.rotate_cw_at(pivot) },
        Err(RotateError::WrongSide)
    );

    // The root has no parent edge to rotate around.
    let pivot = tree.get_raw(&100).expect("key is present");
    assert_eq!(unsafe { tree.rotate_cw_at(pivot) }, Err(RotateError::Root));
    assert_eq!(unsafe { tree.rotate_ccw_at(pivot) }, Err(RotateError::Root));

    assert_eq!(tree.to_shape(), before);
    tree.assert_invariants();

    let mut tree: AvlTree<TestNode> = AvlTree::from_keys(Balance::Off, [100, 30, 20, 50], TestNode::new)
        .expect("keys are distinct");
    let before = tree.to_shape();

    let pivot = tree.get_raw(&20).expect("key is present");
    assert_eq!(
        unsafe { tree.rotate_ccw_at(pivot) },
        Err(RotateError::WrongSide)
    );

    let pivot = tree.get_raw(&50).expect("key is present");
    assert_eq!(
        unsafe { tree.rotate_cw_at(pivot) },
        Err(RotateError::WrongSide)
    );

    assert_eq!(tree.to_shape(), before);
    tree.assert_invariants();
}

#[test]
fn height_counts_levels() {
    let mut tree: AvlTree<TestNode> = AvlTree::unbalanced();
    assert_eq!(tree.height(), 0);

    tree.insert(TestNode::new(100)).unwrap();
    assert_eq!(tree.height(), 1);
    tree.insert(TestNode::new(50)).unwrap();
    assert_eq!(tree.height(), 2);
    tree.insert(TestNode::new(30)).unwrap();
    assert_eq!(tree.height(), 3);
    tree.insert(TestNode::new(60)).unwrap();
    assert_eq!(tree.height(), 3);
    tree.insert(TestNode::new(70)).unwrap();
    assert_eq!(tree.height(), 4);
}

#[test]
fn maintained_bf_tracks_the_structure() {
    let mut tree: AvlTree<TestNode> = AvlTree::unbalanced();
    tree.insert(TestNode::new(100)).unwrap();

    let root_bf = |tree: &AvlTree<TestNode>| {
        let root = tree.get_raw(&100).expect("root is present");
        unsafe { TestNode::links(root).as_ref().bf() }
    };

    for (key, expected) in [(50, 1), (30, 2), (60, 2), (150, 1), (170, 0), (130, 0)] {
        tree.insert(TestNode::new(key)).expect("keys are distinct");
        assert_eq!(root_bf(&tree), expected, "root bf after inserting {key}");
        tree.assert_invariants();
    }
}

#[test]
fn bf_stays_accurate_through_mixed_operations() {
    let keys = [100, 50, 30, 60, 150, 170, 130, 190, 210, 15, 10];
    let mut tree: AvlTree<TestNode> =
        AvlTree::from_keys(Balance::Off, keys, TestNode::new).expect("keys are distinct");
    tree.assert_invariants();

    for key in [60, 170, 210, 15] {
        tree.remove(&key).expect("key is present");
        tree.assert_invariants();
    }
}

#[test]
fn avl_insert_into_raw_built_tree() {
    let mut tree: AvlTree<TestNode> = AvlTree::from_shape(
        Balance::Avl,
        &shape!(68, (58, (49, _, _), (65, _, _)), (74, _, _)),
        TestNode::new,
    );
    tree.assert_invariants();

    tree.insert(TestNode::new(60)).expect("key is absent");
    tree.assert_invariants();
}

#[test]
fn avl_stress() {
    let l = [
        88, 69, 68, 83, 24, 37, 96, 38, 53, 31, 4, 82, 10, 77, 59, 79, 32, 65, 23, 48,
    ];
    let mut tree: AvlTree<TestNode> = AvlTree::from_keys(Balance::Avl, l, TestNode::new).expect("keys are distinct");
    tree.assert_invariants();

    for key in &l[..l.len() - 1] {
        tree.remove(key).expect("key is present");
        tree.assert_invariants();
    }
    assert_eq!(tree.len(), 1);

    let l2 = [
        25, 94, 43, 82, 11, 32, 14, 22, 74, 65, 5, 0, 2, 68, 89, 40, 19, 31, 8, 49, 96, 58, 10, 1,
        36, 60, 28, 41, 84, 30, 83, 12, 77, 86, 18, 45, 26, 44, 53, 66,
    ];
    let mut expected = BTreeSet::from([48]);

    for &key in &l2[..30] {
        tree.insert(TestNode::new(key)).expect("key is absent");
        expected.insert(key);
        tree.assert_invariants();
        assert!(tree.to_map().keys().eq(expected.iter()));
    }

    for key in &l2[10..30] {
        expected.remove(key);
        tree.remove(key).expect("key is present");
        tree.assert_invariants();
        assert!(tree.to_map().keys().eq(expected.iter()));
    }

    for &key in &l2[30..] {
        tree.insert(TestNode::new(key)).expect("key is absent");
        expected.insert(key);
        tree.assert_invariants();
        assert!(tree.to_map().keys().eq(expected.iter()));
    }

    for key in l2[..10].iter().chain(&l2[30..]) {
        assert!(tree.contains_key(key));
    }
}

#[test]
fn insert_then_remove_restores_the_key_set() {
    let mut tree: AvlTree<TestNode> =
        AvlTree::from_keys(Balance::Avl, [10, 5, 15, 3, 8], TestNode::new).expect("distinct");
    let before: Vec<u32> = tree.to_map().keys().copied().collect();

    tree.insert(TestNode::new(7)).expect("key is absent");
    tree.assert_invariants();
    tree.remove(&7).expect("key is present");
    tree.assert_invariants();

    let after: Vec<u32> = tree.to_map().keys().copied().collect();
    assert_eq!(before, after);
}

#[test]
fn iterates_in_order() {
    let tree: AvlTree<TestNode> = AvlTree::from_keys(Balance::Avl, [5, 3, 8, 1, 4, 9], TestNode::new)
        .expect("keys are distinct");

    let keys: Vec<u32> = tree.iter().map(|node| node.key).collect();
    assert_eq!(keys, [1, 3, 4, 5, 8, 9]);
    assert_eq!(tree.iter().len(), 6);
}

#[test]
fn traverses_in_preorder() {
    let tree = raw_fixture();

    let mut keys = Vec::new();
    tree.traverse(|node| keys.push(node.key));
    assert_eq!(keys, [6, 4, 1, 0, 3, 7, 9, 12]);
}

#[test]
fn dotgraph_renders() {
    let tree: AvlTree<TestNode> = AvlTree::from_keys(Balance::Avl, [2, 1, 3], TestNode::new).expect("distinct");

    let mut out = String::new();
    tree.dotgraph::<_, &u32>("demo", &mut out).expect("write to a String");
    assert!(out.starts_with("digraph"));
    assert!(out.contains("\"graphdemo-2\" [label=\"2:0\"]"));
}

#[test]
fn map_basic_operations() {
    let mut map: AvlMap<u32, &str> = AvlMap::new();
    assert!(map.is_empty());

    map.insert(2, "two").expect("key is absent");
    map.insert(1, "one").expect("key is absent");
    map.insert(3, "three").expect("key is absent");

    assert_eq!(map.len(), 3);
    assert!(map.contains_key(&1));
    assert_eq!(map.get(&2), Some(&"two"));

    // Keys are never overwritten in place.
    assert_eq!(map.insert(2, "again"), Err((2, "again")));
    assert_eq!(map.get(&2), Some(&"two"));

    if let Some(value) = map.get_mut(&3) {
        *value = "THREE";
    }
    assert_eq!(map.get(&3), Some(&"THREE"));

    assert_eq!(map.first_key_value(), Some((&1, &"one")));
    assert_eq!(map.last_key_value(), Some((&3, &"THREE")));

    let entries: Vec<(u32, &str)> = map.iter().map(|(&k, &v)| (k, v)).collect();
    assert_eq!(entries, [(1, "one"), (2, "two"), (3, "THREE")]);

    assert_eq!(map.remove(&2), Some("two"));
    assert_eq!(map.remove(&2), None);
    assert_eq!(map.pop_first(), Some((1, "one")));
    assert_eq!(map.pop_last(), Some((3, "THREE")));
    assert!(map.is_empty());
}

#[cfg(miri)]
const FUZZ_RANGE: Range<usize> = 0..10;

#[cfg(not(miri))]
const FUZZ_RANGE: Range<usize> = 0..1000;

proptest::proptest! {
    #![proptest_config(ProptestConfig {
        max_shrink_iters: 65536,
        .. ProptestConfig::default()
    })]

    #[test]
    fn btree_equivalence(ops in proptest::collection::vec(model::op_strategy(), FUZZ_RANGE)) {
        model::run_btree_equivalence(ops);
    }

    #[test]
    fn btree_equivalence_unbalanced(ops in proptest::collection::vec(model::op_strategy(), FUZZ_RANGE)) {
        model::run_btree_equivalence_in(Balance::Off, ops);
    }
}
