use std::ptr::NonNull;

use cordyceps::Linked;
use cordyceps_avl::{AvlTree, Links, TreeNode};

#[derive(Debug)]
#[repr(C)]
struct DemoNode {
    links: Links<DemoNode>,
    key: u32,
}

impl DemoNode {
    fn new(key: u32) -> Box<DemoNode> {
        Box::new(DemoNode {
            links: Links::new(),
            key,
        })
    }
}

unsafe impl Linked<Links<DemoNode>> for DemoNode {
    type Handle = Box<DemoNode>;

    fn into_ptr(r: Self::Handle) -> NonNull<Self> {
        NonNull::new(Box::into_raw(r)).unwrap()
    }

    unsafe fn from_ptr(ptr: NonNull<Self>) -> Self::Handle {
        unsafe { Box::from_raw(ptr.as_ptr()) }
    }

    unsafe fn links(ptr: NonNull<Self>) -> NonNull<Links<DemoNode>> {
        // SAFETY: Self is #[repr(C)] and `links` is first field
        ptr.cast()
    }
}

impl TreeNode<Links<DemoNode>> for DemoNode {
    type Key = u32;

    fn key(&self) -> &Self::Key {
        &self.key
    }
}

fn main() {
    let mut tree: AvlTree<DemoNode> = AvlTree::new();

    for key in [2, 0, 3, 4, 5, 1, 6] {
        tree.insert(DemoNode::new(key)).expect("keys are distinct");
        tree.assert_invariants();
        println!("{:?}", tree.iter().map(|node| node.key).collect::<Vec<_>>());
    }

    let zero = tree.pop_first().unwrap().key;
    assert_eq!(zero, 0);
    tree.assert_invariants();

    let mut graph = String::new();
    tree.dotgraph::<_, &u32>("demo", &mut graph)
        .expect("writing to a String cannot fail");
    println!("{graph}");

    drop(tree);
}
