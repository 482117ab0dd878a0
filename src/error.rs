use core::{fmt, ptr::NonNull};

use thiserror::Error;

use crate::{Link, Links, TreeNode};

/// Error returned when a key is absent from the tree.
///
/// Search and removal fail before touching the tree, so it is guaranteed
/// unmodified when this error is returned.
#[derive(Error)]
#[error("key not found")]
pub struct KeyNotFound<T: ?Sized> {
    last: Link<T>,
}

impl<T: ?Sized> KeyNotFound<T> {
    pub(crate) fn new(last: Link<T>) -> KeyNotFound<T> {
        KeyNotFound { last }
    }

    /// The last node visited before the search ran out of tree, or `None`
    /// if the tree was empty.
    ///
    /// An insertion of the missing key would attach under this node, so a
    /// caller holding it can place the key without searching again.
    ///
    /// The pointer is valid for as long as the node remains in the tree.
    pub fn last_visited(&self) -> Option<NonNull<T>> {
        self.last
    }

    pub(crate) fn into_last(self) -> Link<T> {
        self.last
    }
}

impl<T: ?Sized> fmt::Debug for KeyNotFound<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyNotFound")
            .field("last", &self.last)
            .finish()
    }
}

/// Error returned when inserting a key the tree already holds.
///
/// Keys are never overwritten in place; ownership of the rejected item is
/// handed back through [`rejected`](KeyPresent::rejected).
#[derive(Error)]
#[error("key already present")]
pub struct KeyPresent<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    existing: NonNull<T>,
    /// The item whose insertion was rejected.
    pub rejected: T::Handle,
}

impl<T> KeyPresent<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    pub(crate) fn new(existing: NonNull<T>, rejected: T::Handle) -> KeyPresent<T> {
        KeyPresent { existing, rejected }
    }

    /// The node already holding the key.
    ///
    /// The pointer is valid for as long as the node remains in the tree.
    pub fn existing(&self) -> NonNull<T> {
        self.existing
    }
}

impl<T> fmt::Debug for KeyPresent<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPresent")
            .field("existing", &self.existing)
            .finish_non_exhaustive()
    }
}

/// Error returned when a rotation's structural precondition does not
/// hold. The check runs before any mutation, so the tree is unchanged.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Error)]
pub enum RotateError {
    /// The pivot is not on the side of its parent that the requested
    /// direction rotates around.
    #[error("pivot is not on the rotation side of its parent")]
    WrongSide,
    /// The pivot is the tree root; there is no parent edge to rotate
    /// around.
    #[error("cannot rotate the tree root")]
    Root,
}
