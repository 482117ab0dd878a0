use core::ptr::NonNull;

use crate::{AvlTree, Balance, KeyPresent, Links, TreeNode};

/// The structural form of a subtree: a key and the shapes hanging off
/// either arm.
///
/// This is the crate's fixture and debug format. [`AvlTree::to_shape`]
/// emits it, and [`AvlTree::from_shape`] rebuilds a tree of exactly the
/// described shape, so the two round-trip losslessly. The [`shape!`]
/// macro writes the nested triples compactly.
///
/// [`shape!`]: crate::shape!
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Shape<K> {
    pub key: K,
    pub left: Option<Box<Shape<K>>>,
    pub right: Option<Box<Shape<K>>>,
}

impl<K> Shape<K> {
    /// A shape with no subtrees.
    pub fn leaf(key: K) -> Shape<K> {
        Shape {
            key,
            left: None,
            right: None,
        }
    }

    /// A shape with the given subtrees.
    pub fn branch(key: K, left: Option<Shape<K>>, right: Option<Shape<K>>) -> Shape<K> {
        Shape {
            key,
            left: left.map(Box::new),
            right: right.map(Box::new),
        }
    }
}

/// Builds a [`Shape`] from nested `(key, left, right)` triples, writing
/// `_` for an absent subtree:
///
/// ```
/// use cordyceps_avl::shape;
///
/// let fixture = shape!(6, (4, (1, _, _), _), (7, _, (9, _, _)));
/// ```
#[macro_export]
macro_rules! shape {
    (@opt _) => {
        ::core::option::Option::None
    };
    (@opt ($($sub:tt)*)) => {
        ::core::option::Option::Some($crate::shape!($($sub)*))
    };
    ($key:expr, $left:tt, $right:tt) => {
        $crate::Shape::branch($key, $crate::shape!(@opt $left), $crate::shape!(@opt $right))
    };
    ($key:expr) => {
        $crate::Shape::leaf($key)
    };
}

impl<T> AvlTree<T>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    /// Serializes the tree's structure, or `None` for an empty tree.
    pub fn to_shape(&self) -> Option<Shape<T::Key>>
    where
        T::Key: Clone,
    {
        self.root.map(|root| unsafe { Self::shape_at(root) })
    }

    unsafe fn shape_at(node: NonNull<T>) -> Shape<T::Key>
    where
        T::Key: Clone,
    {
        unsafe {
            Shape {
                key: node.as_ref().key().clone(),
                left: T::links(node)
                    .as_ref()
                    .left()
                    .map(|left| Box::new(Self::shape_at(left))),
                right: T::links(node)
                    .as_ref()
                    .right()
                    .map(|right| Box::new(Self::shape_at(right))),
            }
        }
    }

    /// Builds a tree of exactly the given shape, allocating each node
    /// with `make`.
    ///
    /// Balance factors are recomputed bottom-up from the structure; no
    /// rebalancing is applied, so a shape violating the AVL bound is
    /// reproduced verbatim even under [`Balance::Avl`]. Useful for
    /// constructing precisely-shaped fixtures.
    pub fn from_shape<F>(balance: Balance, shape: &Shape<T::Key>, mut make: F) -> AvlTree<T>
    where
        T::Key: Clone,
        F: FnMut(T::Key) -> T::Handle,
    {
        let mut tree = AvlTree::with_balance(balance);

        let mut len = 0;
        let (root, _) = Self::build_shape(shape, &mut make, &mut len);

        tree.root = Some(root);
        tree.len = len;
        tree
    }

    // Returns the built subtree and its height.
    fn build_shape<F>(shape: &Shape<T::Key>, make: &mut F, len: &mut usize) -> (NonNull<T>, usize)
    where
        T::Key: Clone,
        F: FnMut(T::Key) -> T::Handle,
    {
        let node = T::into_ptr(make(shape.key.clone()));
        *len += 1;

        unsafe {
            let links = T::links(node).as_mut();
            links.set_parent(None);
            links.set_left(None);
            links.set_right(None);
        }

        let mut heights = [0usize; 2];

        if let Some(sub) = &shape.left {
            let (child, height) = Self::build_shape(sub, make, len);
            unsafe {
                T::links(node).as_mut().set_left(Some(child));
                T::links(child).as_mut().set_parent(Some(node));
            }
            heights[0] = height;
        }

        if let Some(sub) = &shape.right {
            let (child, height) = Self::build_shape(sub, make, len);
            unsafe {
                T::links(node).as_mut().set_right(Some(child));
                T::links(child).as_mut().set_parent(Some(node));
            }
            heights[1] = height;
        }

        unsafe {
            T::links(node)
                .as_mut()
                .set_bf(heights[0] as i32 - heights[1] as i32);
        }

        (node, 1 + heights[0].max(heights[1]))
    }

    /// Builds a tree by inserting `keys` in order, allocating each node
    /// with `make`.
    ///
    /// Under [`Balance::Avl`] the tree rebalances as it grows, so the
    /// result is independent of the insertion order up to rotation
    /// history; under [`Balance::Off`] the order dictates the shape.
    pub fn from_keys<I, F>(balance: Balance, keys: I, mut make: F) -> Result<AvlTree<T>, KeyPresent<T>>
    where
        I: IntoIterator<Item = T::Key>,
        F: FnMut(T::Key) -> T::Handle,
    {
        let mut tree = AvlTree::with_balance(balance);

        for key in keys {
            tree.insert(make(key))?;
        }

        Ok(tree)
    }
}
