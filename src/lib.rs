//! An intrusive AVL tree.

// Conventions used in comments:
// - The balance factor of a node `x`, written `bf(x)`, is the height of its
//   left subtree minus the height of its right subtree.
// - A height change on a node's left arm moves its bf by +1 per level, on
//   its right arm by -1 per level; `Dir::place` is that sign.
//
// The fundamental invariants of the tree are:
// 1. BST order: left.key < key < right.key, no duplicates.
// 2. Every child's parent pointer names the node holding it.
// 3. The maintained bf of every node equals the true height difference.
// 4. Under `Balance::Avl`, additionally |bf| <= 1 everywhere.
//
// Invariants 1-3 hold for both policies after every completed public
// operation; insert and delete keep (3) current by walking deltas up the
// parent chain rather than recounting. The root's parent link is `None`:
// the tree handle itself stands in as the super-parent, and the walk and
// rotation code route root-slot replacement through `AvlTree::root`
// exactly where a node would update a child link.

use core::{
    cell::UnsafeCell, cmp::Ordering, fmt, marker::PhantomPinned, mem, pin::Pin, ptr::NonNull,
};
use std::{borrow::Borrow, collections::BTreeMap};

use cordyceps::Linked;

mod debug;
mod error;
mod iter;
mod map;
mod shape;

#[cfg(any(test, feature = "model"))]
pub mod model;
#[cfg(test)]
mod tests;

pub use error::{KeyNotFound, KeyPresent, RotateError};
pub use iter::Iter;
pub use map::AvlMap;
pub use shape::Shape;

pub trait TreeNode<L>: Linked<L> {
    type Key: Ord + fmt::Debug;

    fn key(&self) -> &Self::Key;
}

/// Rebalancing policy of a tree, fixed at construction.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Balance {
    /// Balance factors are maintained but never acted on; the tree keeps
    /// whatever shape the insertion order produces.
    Off,
    /// Every insertion or removal that pushes a node's balance factor to
    /// ±2 triggers a rotation restoring |bf| ≤ 1.
    Avl,
}

/// An intrusive AVL tree.
///
/// Nodes are allocated by the caller and linked into the tree through
/// their [`Links`]. Each node records the height difference of its
/// subtrees as a balance factor, updated incrementally as the tree
/// changes; with [`Balance::Avl`] (the default) the factors also drive
/// rotations that keep every lookup path logarithmic.
pub struct AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    root: Link<T>,
    len: usize,
    balance: Balance,
}

pub struct Links<T: ?Sized> {
    inner: UnsafeCell<LinksInner<T>>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Dir {
    Left = 0,
    Right = 1,
}

impl Dir {
    // The sign a height change on this arm contributes to
    // bf = height(left) - height(right).
    fn place(self) -> i32 {
        match self {
            Dir::Left => 1,
            Dir::Right => -1,
        }
    }
}

#[repr(C)]
struct LinksInner<T: ?Sized> {
    parent: Link<T>,
    children: [Link<T>; 2],
    bf: i32,
    _unpin: PhantomPinned,
}

type Link<T> = Option<NonNull<T>>;

// The propagation stop conditions compare the sign of a node's bf with
// the sign of the delta just applied; zero counts as positive.
fn sign(n: i32) -> i32 {
    if n < 0 {
        -1
    } else {
        1
    }
}

impl<T> AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    /// Returns a new empty tree with the AVL policy.
    pub const fn new() -> AvlTree<T> {
        AvlTree::with_balance(Balance::Avl)
    }

    /// Returns a new empty tree that never rebalances.
    ///
    /// Balance factors are still tracked, so the shape produced by the
    /// insertion order can be inspected and rotated by hand.
    pub const fn unbalanced() -> AvlTree<T> {
        AvlTree::with_balance(Balance::Off)
    }

    /// Returns a new empty tree with the given rebalancing policy.
    pub const fn with_balance(balance: Balance) -> AvlTree<T> {
        AvlTree {
            root: None,
            len: 0,
            balance,
        }
    }

    /// Returns the tree's rebalancing policy.
    pub const fn balance(&self) -> Balance {
        self.balance
    }

    /// Returns `true` if the tree contains no elements.
    pub const fn is_empty(&self) -> bool {
        let empty = self.len() == 0;

        if cfg!(debug_assertions) {
            // Can't use assert_eq!() in const fn.
            assert!(empty == self.root.is_none());
        }

        empty
    }

    /// Returns the number of elements in the tree.
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Verifies the tree's structural invariants, panicking on the first
    /// violation: BST key order, parent/child link consistency, the
    /// maintained balance factor of every node against a full recount,
    /// the element count, and (under [`Balance::Avl`]) |bf| ≤ 1.
    pub fn assert_invariants(&self) {
        let mut count = 0;

        if let Some(root) = self.root {
            assert!(
                unsafe { T::links(root).as_ref().parent() }.is_none(),
                "the root must not have a parent node"
            );
            unsafe { self.assert_invariants_at(root, &mut count) };
        }

        assert_eq!(count, self.len, "node count must match the maintained len");
    }

    // Returns the height of the subtree, checking every node on the way.
    unsafe fn assert_invariants_at(&self, node: NonNull<T>, count: &mut usize) -> usize {
        unsafe {
            *count += 1;

            let mut heights = [0usize; 2];

            for dir in [Dir::Left, Dir::Right] {
                if let Some(child) = T::links(node).as_ref().child(dir) {
                    let parent = T::links(child)
                        .as_ref()
                        .parent()
                        .expect("child parent pointer not set");
                    assert_eq!(parent, node, "child parent pointer points elsewhere");

                    match dir {
                        Dir::Left => assert!(
                            child.as_ref().key() < node.as_ref().key(),
                            "left child key out of order"
                        ),
                        Dir::Right => assert!(
                            child.as_ref().key() > node.as_ref().key(),
                            "right child key out of order"
                        ),
                    }

                    heights[dir as usize] = self.assert_invariants_at(child, count);
                }
            }

            let bf = heights[0] as i32 - heights[1] as i32;
            assert_eq!(
                T::links(node).as_ref().bf(),
                bf,
                "maintained bf diverges from the recounted height difference at key {:?}",
                node.as_ref().key(),
            );

            if self.balance == Balance::Avl {
                assert!(bf.abs() <= 1, "AVL invariant violated: bf = {bf}");
            }

            1 + heights[0].max(heights[1])
        }
    }

    /// Returns the height of the tree, recounted from its structure in
    /// O(n). An empty tree has height 0, a sole root height 1.
    pub fn height(&self) -> usize {
        match self.root {
            Some(root) => unsafe { self.height_at(root) },
            None => 0,
        }
    }

    unsafe fn height_at(&self, node: NonNull<T>) -> usize {
        unsafe {
            let left = T::links(node)
                .as_ref()
                .left()
                .map_or(0, |l| self.height_at(l));
            let right = T::links(node)
                .as_ref()
                .right()
                .map_or(0, |r| self.height_at(r));

            1 + left.max(right)
        }
    }

    /// Returns a reference to the node holding `key`.
    ///
    /// On failure the error carries the last node visited on the search
    /// path, under which an insertion of `key` would attach.
    pub fn search<Q>(&self, key: &Q) -> Result<Pin<&T>, KeyNotFound<T>>
    where
        T::Key: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        let ptr = self.search_raw(key)?;
        unsafe { Ok(Pin::new_unchecked(ptr.as_ref())) }
    }

    /// Returns a reference to the node holding `key`, or `None`.
    pub fn get<Q>(&self, key: &Q) -> Option<Pin<&T>>
    where
        T::Key: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        self.search(key).ok()
    }

    /// Returns a mutable reference to the node holding `key`.
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<Pin<&mut T>>
    where
        T::Key: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        let mut ptr = self.get_raw(key)?;
        unsafe { Some(Pin::new_unchecked(ptr.as_mut())) }
    }

    /// Returns `true` if the tree holds `key`.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        T::Key: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        self.get_raw(key).is_some()
    }

    fn get_raw<Q>(&self, key: &Q) -> Link<T>
    where
        T::Key: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        self.search_raw(key).ok()
    }

    fn search_raw<Q>(&self, key: &Q) -> Result<NonNull<T>, KeyNotFound<T>>
    where
        T::Key: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        let mut last = None;
        let mut opt_cur = self.root;

        while let Some(cur) = opt_cur {
            last = Some(cur);

            unsafe {
                match key.cmp(cur.as_ref().key().borrow()) {
                    Ordering::Less => opt_cur = T::links(cur).as_ref().left(),
                    Ordering::Equal => return Ok(cur),
                    Ordering::Greater => opt_cur = T::links(cur).as_ref().right(),
                }
            }
        }

        Err(KeyNotFound::new(last))
    }

    fn first_raw(&self) -> Link<T> {
        let mut cur = self.root?;

        unsafe {
            while let Some(left) = T::links(cur).as_ref().left() {
                cur = left;
            }
        }

        Some(cur)
    }

    fn last_raw(&self) -> Link<T> {
        let mut cur = self.root?;

        unsafe {
            while let Some(right) = T::links(cur).as_ref().right() {
                cur = right;
            }
        }

        Some(cur)
    }

    /// Returns the minimum element of the tree.
    pub fn first(&self) -> Option<Pin<&T>> {
        self.first_raw()
            .map(|first| unsafe { Pin::new_unchecked(first.as_ref()) })
    }

    /// Returns the maximum element of the tree.
    pub fn last(&self) -> Option<Pin<&T>> {
        self.last_raw()
            .map(|last| unsafe { Pin::new_unchecked(last.as_ref()) })
    }

    /// Removes and returns the minimum element of the tree.
    pub fn pop_first(&mut self) -> Option<T::Handle> {
        let first = self.first_raw()?;
        Some(unsafe { self.remove_at(first) })
    }

    /// Removes and returns the maximum element of the tree.
    pub fn pop_last(&mut self) -> Option<T::Handle> {
        let last = self.last_raw()?;
        Some(unsafe { self.remove_at(last) })
    }

    /// Inserts an item into the tree.
    ///
    /// The new node always attaches as a leaf; the balance update then
    /// climbs the ancestor chain, rotating under [`Balance::Avl`] if a
    /// node tips past ±1.
    ///
    /// Keys are unique: if an equal key is already present the tree is
    /// left untouched and the error hands `item` back alongside a pointer
    /// to the node holding the key.
    ///
    /// This operation completes in _O(log(n))_ time under
    /// [`Balance::Avl`].
    pub fn insert(&mut self, item: T::Handle) -> Result<(), KeyPresent<T>> {
        let ptr = T::into_ptr(item);

        // A handle may have been linked into a tree before; start from a
        // clean slate.
        unsafe {
            let links = T::links(ptr).as_mut();
            links.set_parent(None);
            links.set_left(None);
            links.set_right(None);
            links.set_bf(0);
        }

        let anchor = match self.search_raw(unsafe { ptr.as_ref().key() }) {
            Err(miss) => miss.into_last(),
            Ok(existing) => {
                return Err(KeyPresent::new(existing, unsafe { T::from_ptr(ptr) }));
            }
        };

        let Some(parent) = anchor else {
            // Tree is empty; `item` becomes the root.
            self.root = Some(ptr);
            self.len += 1;
            return Ok(());
        };

        let dir = match unsafe { ptr.as_ref().key().cmp(parent.as_ref().key()) } {
            Ordering::Less => Dir::Left,
            Ordering::Greater => Dir::Right,
            Ordering::Equal => unreachable!("equal key was ruled out by the descent"),
        };

        unsafe {
            T::links(parent).as_mut().set_child(dir, Some(ptr));
            T::links(ptr).as_mut().set_parent(Some(parent));
        }

        self.len += 1;
        self.propagate_growth(parent, dir.place());

        Ok(())
    }

    /// Removes the node holding `key` and returns its handle.
    ///
    /// On failure the error carries the last node visited, as for
    /// [`search`](Self::search). Removing the last element leaves an
    /// empty tree.
    pub fn remove<Q>(&mut self, key: &Q) -> Result<T::Handle, KeyNotFound<T>>
    where
        T::Key: Borrow<Q> + Ord,
        Q: Ord + ?Sized,
    {
        let node = self.search_raw(key)?;
        Ok(unsafe { self.remove_at(node) })
    }

    /// Removes an arbitrary node from the tree.
    ///
    /// # Safety
    ///
    /// It is the caller's responsibility to ensure that `node` is an
    /// element of `self`, and not any other tree.
    pub unsafe fn remove_at(&mut self, node: NonNull<T>) -> T::Handle {
        unsafe {
            let parent = T::links(node).as_ref().parent();
            let left = T::links(node).as_ref().left();
            let right = T::links(node).as_ref().right();

            // The node whose subtree lost a level, and the arm it lost it
            // from; the shrink walk starts there.
            let update: Option<(NonNull<T>, Dir)>;

            match (left, right) {
                (Some(left), Some(right)) => {
                    // Two children: the in-order predecessor (the
                    // rightmost node of the left subtree) is spliced into
                    // the removed node's place, assuming its links and
                    // bf. The predecessor has no right child, so cutting
                    // it out of its old position is the unary case in
                    // miniature.
                    let (pred, pred_parent) = self.max_in_subtree(left);
                    let pred_left = T::links(pred).as_ref().left();

                    if let Some(pred_parent) = pred_parent {
                        // The predecessor sits deeper in the left
                        // subtree; elevate its left child to replace it.
                        self.replace_child(pred_parent, pred, pred_left);
                        T::links(pred).as_mut().set_left(Some(left));
                        T::links(left).as_mut().set_parent(Some(pred));
                    }

                    let node_bf = T::links(node).as_ref().bf();

                    self.replace_child_or_set_root(parent, node, Some(pred));
                    T::links(pred).as_mut().set_parent(parent);
                    T::links(pred).as_mut().set_bf(node_bf);
                    T::links(pred).as_mut().set_right(Some(right));
                    T::links(right).as_mut().set_parent(Some(pred));
                    // Left link is updated above iff pred != left.

                    update = Some(match pred_parent {
                        Some(pred_parent) => (pred_parent, Dir::Right),
                        None => (pred, Dir::Left),
                    });
                }

                (Some(child), None) | (None, Some(child)) => {
                    // Unary node: its sole child is elevated into its
                    // place.
                    update = parent.map(|p| (p, self.which_child(p, node)));
                    self.replace_child_or_set_root(parent, node, Some(child));
                }

                (None, None) => {
                    // Leaf: the parent simply drops the link. Removing
                    // the last node this way empties the tree.
                    update = parent.map(|p| (p, self.which_child(p, node)));
                    self.replace_child_or_set_root(parent, node, None);
                }
            }

            self.len -= 1;

            if let Some((start, dir)) = update {
                self.propagate_shrink(start, -dir.place());
            }

            T::from_ptr(node)
        }
    }

    // Applies a height-increase report to `start` and walks it up the
    // ancestor chain.
    //
    // Each step folds the delta into the node's bf. The walk stops once a
    // node absorbs the change: its bf hits zero, or the delta landed on
    // its shorter side. The first node pushed past |bf| = 1 is rebalanced
    // after the walk completes; nodes above it were updated against the
    // pre-rotation height, and the rotation's own report walks the
    // surplus back.
    fn propagate_growth(&mut self, start: NonNull<T>, mut delta: i32) {
        let mut node = start;
        let mut needs_rebalance = None;

        loop {
            let links = unsafe { T::links(node).as_mut() };
            let bf = links.bf() + delta;
            links.set_bf(bf);

            if bf == 0 || sign(bf) != sign(delta) {
                // Subtree height did not change.
                break;
            }

            if bf.abs() > 1 && needs_rebalance.is_none() {
                needs_rebalance = Some(node);
            }

            match links.parent() {
                Some(parent) => {
                    delta = unsafe { self.which_child(parent, node) }.place();
                    node = parent;
                }
                None => break,
            }
        }

        if let Some(node) = needs_rebalance {
            self.rebalance(node);
        }
    }

    // Applies a height-decrease report to `start` and walks it up the
    // ancestor chain.
    //
    // The stop condition is the inverse of the growth walk's: climbing
    // continues while the subtree's height is still shrinking (bf hit
    // zero or the delta landed on the shorter side). A node left at
    // |bf| = 2 ends the walk and is rebalanced; if its rotation shrinks
    // the subtree further, the rotation reports that shrink upward and
    // the climb resumes from there.
    fn propagate_shrink(&mut self, start: NonNull<T>, mut delta: i32) {
        let mut node = start;
        let mut needs_rebalance = None;

        loop {
            let links = unsafe { T::links(node).as_mut() };
            let bf = links.bf() + delta;
            links.set_bf(bf);

            if bf.abs() > 1 && needs_rebalance.is_none() {
                needs_rebalance = Some(node);
            }

            if bf != 0 && sign(bf) == sign(delta) {
                // The taller side is intact; the subtree kept its height.
                break;
            }

            match links.parent() {
                Some(parent) => {
                    delta = -unsafe { self.which_child(parent, node) }.place();
                    node = parent;
                }
                None => break,
            }
        }

        if let Some(node) = needs_rebalance {
            self.rebalance(node);
        }
    }

    // Rebalance hook, invoked once per propagation pass on the first node
    // whose |bf| exceeded 1.
    fn rebalance(&mut self, node: NonNull<T>) {
        match self.balance {
            Balance::Off => {}
            Balance::Avl => self.rebalance_avl(node),
        }
    }

    // Restores |bf| <= 1 at `node` with one of the four AVL rotation
    // patterns, selected by the signs of the node's and the relevant
    // child's balance factors.
    fn rebalance_avl(&mut self, node: NonNull<T>) {
        unsafe {
            match T::links(node).as_ref().bf() {
                2 => {
                    let left = T::links(node)
                        .as_ref()
                        .left()
                        .expect("a bf = 2 node has a left subtree of height >= 2");

                    if T::links(left).as_ref().bf() >= 0 {
                        // Left-left: a single clockwise rotation.
                        self.rotate_cw_at(left)
                            .expect("the left child rotates clockwise");
                    } else {
                        // Left-right: rotate the left child's right child
                        // up first, then rotate it over this node.
                        let inner = T::links(left)
                            .as_ref()
                            .right()
                            .expect("a bf < 0 node has a right child");
                        self.rotate_ccw_at(inner)
                            .expect("a right child rotates counter-clockwise");

                        let left = T::links(node)
                            .as_ref()
                            .left()
                            .expect("the rotated-up child took the left slot");
                        self.rotate_cw_at(left)
                            .expect("the left child rotates clockwise");
                    }
                }

                -2 => {
                    let right = T::links(node)
                        .as_ref()
                        .right()
                        .expect("a bf = -2 node has a right subtree of height >= 2");

                    if T::links(right).as_ref().bf() <= 0 {
                        // Right-right: a single counter-clockwise
                        // rotation.
                        self.rotate_ccw_at(right)
                            .expect("the right child rotates counter-clockwise");
                    } else {
                        // Right-left: mirror of left-right.
                        let inner = T::links(right)
                            .as_ref()
                            .left()
                            .expect("a bf > 0 node has a left child");
                        self.rotate_cw_at(inner)
                            .expect("a left child rotates clockwise");

                        let right = T::links(node)
                            .as_ref()
                            .right()
                            .expect("the rotated-up child took the right slot");
                        self.rotate_ccw_at(right)
                            .expect("the right child rotates counter-clockwise");
                    }
                }

                bf => unreachable!(
                    "rebalance invoked with bf = {bf}; the balance bookkeeping is corrupt"
                ),
            }
        }
    }

    /// Rotates `pivot` clockwise over its parent: the pivot takes its
    /// parent's place, its right subtree crosses over to become the
    /// parent's left subtree, and the parent descends to the pivot's
    /// right.
    ///
    /// The rotation preserves the in-order key sequence, recomputes both
    /// nodes' balance factors in place, and reports any net height change
    /// of the subtree to the ancestors. It fails, leaving the tree
    /// untouched, if the pivot is not its parent's left child
    /// ([`RotateError::WrongSide`]) or has no parent at all
    /// ([`RotateError::Root`]).
    ///
    /// # Safety
    ///
    /// It is the caller's responsibility to ensure that `pivot` is an
    /// element of `self`, and not any other tree.
    pub unsafe fn rotate_cw_at(&mut self, pivot: NonNull<T>) -> Result<(), RotateError> {
        unsafe {
            let Some(down) = T::links(pivot).as_ref().parent() else {
                return Err(RotateError::Root);
            };

            if T::links(down).as_ref().left() != Some(pivot) {
                return Err(RotateError::WrongSide);
            }

            let old_bf = T::links(down).as_ref().bf();
            let grand = T::links(down).as_ref().parent();
            let across = T::links(pivot).as_ref().right();

            T::links(down).as_mut().set_left(across);
            self.maybe_set_parent(across, Some(down));
            T::links(pivot).as_mut().set_right(Some(down));
            T::links(down).as_mut().set_parent(Some(pivot));
            T::links(pivot).as_mut().set_parent(grand);
            match grand {
                Some(grand) => self.replace_child(grand, down, Some(pivot)),
                None => self.root = Some(pivot),
            }

            // Closed-form bf update. The parent lost the pivot from its
            // left arm, plus the pivot's left surplus if the pivot leaned
            // left; the pivot gained the parent on its right arm,
            // extended by the parent's new right surplus if the parent
            // now leans right.
            let pivot_bf = T::links(pivot).as_ref().bf();

            let mut down_bf = old_bf - 1;
            if pivot_bf > 0 {
                down_bf -= pivot_bf;
            }
            T::links(down).as_mut().set_bf(down_bf);

            let mut new_pivot_bf = pivot_bf - 1;
            if down_bf < 0 {
                new_pivot_bf += down_bf;
            }
            T::links(pivot).as_mut().set_bf(new_pivot_bf);

            self.report_height_shift(grand, pivot, new_pivot_bf.abs() - old_bf.abs());

            Ok(())
        }
    }

    /// Rotates `pivot` counter-clockwise over its parent; the mirror
    /// image of [`rotate_cw_at`](Self::rotate_cw_at). Fails with
    /// [`RotateError::WrongSide`] if the pivot is not its parent's right
    /// child, or [`RotateError::Root`] if it has no parent.
    ///
    /// # Safety
    ///
    /// It is the caller's responsibility to ensure that `pivot` is an
    /// element of `self`, and not any other tree.
    pub unsafe fn rotate_ccw_at(&mut self, pivot: NonNull<T>) -> Result<(), RotateError> {
        unsafe {
            let Some(down) = T::links(pivot).as_ref().parent() else {
                return Err(RotateError::Root);
            };

            if T::links(down).as_ref().right() != Some(pivot) {
                return Err(RotateError::WrongSide);
            }

            let old_bf = T::links(down).as_ref().bf();
            let grand = T::links(down).as_ref().parent();
            let across = T::links(pivot).as_ref().left();

            T::links(down).as_mut().set_right(across);
            self.maybe_set_parent(across, Some(down));
            T::links(pivot).as_mut().set_left(Some(down));
            T::links(down).as_mut().set_parent(Some(pivot));
            T::links(pivot).as_mut().set_parent(grand);
            match grand {
                Some(grand) => self.replace_child(grand, down, Some(pivot)),
                None => self.root = Some(pivot),
            }

            let pivot_bf = T::links(pivot).as_ref().bf();

            let mut down_bf = old_bf + 1;
            if pivot_bf < 0 {
                down_bf -= pivot_bf;
            }
            T::links(down).as_mut().set_bf(down_bf);

            let mut new_pivot_bf = pivot_bf + 1;
            if down_bf > 0 {
                new_pivot_bf += down_bf;
            }
            T::links(pivot).as_mut().set_bf(new_pivot_bf);

            self.report_height_shift(grand, pivot, new_pivot_bf.abs() - old_bf.abs());

            Ok(())
        }
    }

    // Reports a rotation's net height change to the rotated subtree's new
    // parent. `bf_swing` is the new pivot bf magnitude minus the old
    // subtree-root bf magnitude; every level of height change swings it
    // by two, so the truncated half is the signed number of levels the
    // subtree grew or shrank. A swing of ±1 means the height is unchanged
    // and nothing is reported.
    fn report_height_shift(&mut self, parent: Link<T>, pivot: NonNull<T>, bf_swing: i32) {
        let Some(parent) = parent else {
            return;
        };

        let shift = bf_swing / 2;
        let place = unsafe { self.which_child(parent, pivot) }.place();

        match shift {
            0 => {}
            s if s > 0 => self.propagate_growth(parent, s * place),
            s => self.propagate_shrink(parent, s * place),
        }
    }

    /// Clears the tree, dropping all elements.
    pub fn clear(&mut self) {
        let mut opt_cur = self.root;

        while let Some(cur) = opt_cur {
            unsafe {
                // Descend to the maximum node.
                let (cur, parent) = self.max_in_subtree(cur);
                let parent = parent.or_else(|| T::links(cur).as_ref().parent());

                let left = T::links(cur).as_ref().left();

                // Elevate the node's left child (which may be None).
                self.replace_child_or_set_root(parent, cur, left);

                // Drop the node.
                drop(T::from_ptr(cur));
                self.len -= 1;

                // If the node had no left child, climb to the parent. If
                // the node had no parent, the tree is empty.
                opt_cur = left.or(parent);
            }
        }

        debug_assert!(self.root.is_none());
        debug_assert_eq!(self.len(), 0);
    }

    /// Returns an in-order iterator over the tree's elements.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter::new(self)
    }

    /// Visits every node in pre-order.
    pub fn traverse<F>(&self, mut visit: F)
    where
        F: FnMut(&T),
    {
        if let Some(root) = self.root {
            unsafe { self.traverse_at(root, &mut visit) };
        }
    }

    unsafe fn traverse_at<F>(&self, node: NonNull<T>, visit: &mut F)
    where
        F: FnMut(&T),
    {
        unsafe {
            visit(node.as_ref());

            if let Some(left) = T::links(node).as_ref().left() {
                self.traverse_at(left, visit);
            }
            if let Some(right) = T::links(node).as_ref().right() {
                self.traverse_at(right, visit);
            }
        }
    }

    /// Returns a key → node index of the whole tree, for diagnostics and
    /// testing.
    ///
    /// The pointers are valid for as long as the nodes remain in the
    /// tree.
    pub fn to_map(&self) -> BTreeMap<T::Key, NonNull<T>>
    where
        T::Key: Clone,
    {
        let mut map = BTreeMap::new();
        self.traverse(|node| {
            map.insert(node.key().clone(), NonNull::from(node));
        });
        map
    }

    // Returns the maximum node in the subtree.
    //
    // If the subtree root is not the maximum, also returns the maximum
    // node's parent.
    #[inline]
    unsafe fn max_in_subtree(&self, root: NonNull<T>) -> (NonNull<T>, Option<NonNull<T>>) {
        let mut parent = None;
        let mut cur = root;

        while let Some(right) = unsafe { T::links(cur).as_ref().right() } {
            parent = Some(cur);
            cur = right;
        }

        (cur, parent)
    }

    unsafe fn maybe_set_parent(&mut self, opt_node: Link<T>, parent: Link<T>) {
        let Some(node) = opt_node else {
            return;
        };

        unsafe { T::links(node).as_mut().set_parent(parent) };
    }

    // Replaces the child pointer of `parent` pointing at `old_child` with
    // `new_child`, updating `new_child`'s parent pointer to match.
    //
    // # Safety
    //
    // The caller must ensure that `old_child` is a child node of
    // `parent`.
    unsafe fn replace_child(
        &mut self,
        parent: NonNull<T>,
        old_child: NonNull<T>,
        new_child: Link<T>,
    ) {
        unsafe {
            if T::links(parent).as_ref().left() == Some(old_child) {
                T::links(parent).as_mut().set_left(new_child);
            } else {
                debug_assert_eq!(
                    T::links(parent).as_ref().right(),
                    Some(old_child),
                    "`old_child` must be a child of `parent`"
                );
                T::links(parent).as_mut().set_right(new_child);
            }

            self.maybe_set_parent(new_child, Some(parent));
        }
    }

    #[inline]
    unsafe fn replace_child_or_set_root(
        &mut self,
        parent: Link<T>,
        old_child: NonNull<T>,
        new_child: Link<T>,
    ) {
        match parent {
            Some(parent) => unsafe { self.replace_child(parent, old_child, new_child) },
            None => {
                self.root = new_child;
                unsafe { self.maybe_set_parent(new_child, None) };
            }
        }
    }

    unsafe fn which_child(&self, parent: NonNull<T>, child: NonNull<T>) -> Dir {
        if unsafe { T::links(parent).as_ref().left() } == Some(child) {
            Dir::Left
        } else {
            Dir::Right
        }
    }
}

impl<T> Drop for AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    fn drop(&mut self) {
        self.clear();
    }
}

impl<T: ?Sized> Links<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            inner: UnsafeCell::new(LinksInner {
                parent: None,
                children: [None; 2],
                bf: 0,
                _unpin: PhantomPinned,
            }),
        }
    }

    #[inline]
    fn bf(&self) -> i32 {
        unsafe { (*self.inner.get()).bf }
    }

    #[inline]
    fn parent(&self) -> Link<T> {
        unsafe { (*self.inner.get()).parent }
    }

    #[inline]
    fn child(&self, dir: Dir) -> Link<T> {
        unsafe { (*self.inner.get()).children[dir as usize] }
    }

    #[inline]
    fn left(&self) -> Link<T> {
        self.child(Dir::Left)
    }

    #[inline]
    fn right(&self) -> Link<T> {
        self.child(Dir::Right)
    }

    #[inline]
    fn set_parent(&mut self, parent: Link<T>) -> Link<T> {
        mem::replace(&mut self.inner.get_mut().parent, parent)
    }

    #[inline]
    fn set_child(&mut self, dir: Dir, child: Link<T>) -> Link<T> {
        mem::replace(&mut self.inner.get_mut().children[dir as usize], child)
    }

    #[inline]
    fn set_left(&mut self, left: Link<T>) -> Link<T> {
        self.set_child(Dir::Left, left)
    }

    #[inline]
    fn set_right(&mut self, right: Link<T>) -> Link<T> {
        self.set_child(Dir::Right, right)
    }

    #[inline]
    fn set_bf(&mut self, bf: i32) {
        self.inner.get_mut().bf = bf;
    }
}

impl<T: ?Sized> Default for Links<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> fmt::Debug for Links<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Links")
            .field("bf", &self.bf())
            .field("left", &self.left().is_some())
            .field("right", &self.right().is_some())
            .finish()
    }
}
