use crate::{AvlTree, Dir, Link, Links, TreeNode};

enum CameFrom {
    Parent,
    LeftChild,
    Here,
    RightChild,
}

/// An in-order iterator over an [`AvlTree`].
///
/// Advances in O(1) space by walking the nodes' parent links instead of
/// keeping an explicit stack.
pub struct Iter<'tree, T: TreeNode<Links<T>> + ?Sized> {
    tree: &'tree AvlTree<T>,

    cur: Link<T>,
    from: CameFrom,

    len: usize,
}

impl<'tree, T: TreeNode<Links<T>> + ?Sized> Iter<'tree, T> {
    pub(crate) fn new(tree: &'tree AvlTree<T>) -> Self {
        Iter {
            tree,

            cur: tree.root,
            from: CameFrom::Parent,
            len: tree.len(),
        }
    }
}

impl<'tree, T: TreeNode<Links<T>> + ?Sized> Iterator for Iter<'tree, T> {
    type Item = &'tree T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.len == 0 {
            return None;
        }

        let mut cur = self.cur?;

        loop {
            match self.from {
                CameFrom::Parent => {
                    // Upon entering a new subtree, find the minimum
                    // element.
                    while let Some(left) = unsafe { T::links(cur).as_ref().left() } {
                        cur = left;
                    }

                    // Once the minimum is found, its (empty) left subtree
                    // has been exhausted.
                    self.from = CameFrom::LeftChild;
                }

                CameFrom::LeftChild => {
                    // The left subtree has been exhausted, so this node
                    // is up next. Save off the iterator state and return
                    // it.
                    self.cur = Some(cur);
                    self.from = CameFrom::Here;
                    self.len -= 1;

                    return Some(unsafe { cur.as_ref() });
                }

                CameFrom::Here => {
                    // The current node was just yielded.
                    if let Some(right) = unsafe { T::links(cur).as_ref().right() } {
                        // If the right subtree is not empty, go there.
                        self.from = CameFrom::Parent;

                        cur = right;
                    } else if let Some(parent) = unsafe { T::links(cur).as_ref().parent() } {
                        // Otherwise, ascend one level.
                        self.from = match unsafe { self.tree.which_child(parent, cur) } {
                            Dir::Left => CameFrom::LeftChild,
                            Dir::Right => CameFrom::RightChild,
                        };

                        cur = parent;
                    } else {
                        unreachable!()
                    }
                }

                CameFrom::RightChild => {
                    // Ascend until the walk comes up a left edge; that
                    // parent is the successor.
                    while let Some(parent) = unsafe { T::links(cur).as_ref().parent() } {
                        let dir = unsafe { self.tree.which_child(parent, cur) };
                        cur = parent;

                        if dir == Dir::Left {
                            break;
                        }
                    }

                    self.from = CameFrom::LeftChild;
                }
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.len, Some(self.len))
    }
}

impl<'tree, T: TreeNode<Links<T>> + ?Sized> ExactSizeIterator for Iter<'tree, T> {}
