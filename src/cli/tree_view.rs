//! Entity trees rendered with termtree.

use generational_arena::Index;
use termtree::Tree;

use crate::domain::{Entity, TreeArena};

pub trait TreeView {
    fn to_tree_string(&self) -> Tree<String>;
}

impl TreeView for TreeArena {
    fn to_tree_string(&self) -> Tree<String> {
        let Some(root) = self.root_node() else {
            return Tree::new("(no nodes)".to_string());
        };
        let mut tree = Tree::new(root.data.to_string());

        fn build_tree(arena: &TreeArena, node_idx: Index, parent_tree: &mut Tree<String>) {
            if let Some(node) = arena.get_node(node_idx) {
                for &child_idx in &node.children {
                    if let Some(child) = arena.get_node(child_idx) {
                        let mut child_tree = Tree::new(child.data.to_string());
                        build_tree(arena, child_idx, &mut child_tree);
                        parent_tree.push(child_tree);
                    }
                }
            }
        }

        if let Some(root_idx) = self.root() {
            build_tree(self, root_idx, &mut tree);
        }
        tree
    }
}

impl TreeView for Entity {
    /// Entity header with the node tree as its single leaf.
    fn to_tree_string(&self) -> Tree<String> {
        let label = format!("{} ({} nodes)", self, self.node_count());
        Tree::new(label).with_leaves([self.tree.to_tree_string()])
    }
}
