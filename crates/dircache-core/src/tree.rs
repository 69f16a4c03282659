//! Generic immutable named trees.

use compact_str::CompactString;
use serde::Serialize;

/// A node with a name and an ordered list of children of its own type.
///
/// Implementors are immutable once built: a node owns its children outright,
/// there are no parent links, and a node with no children is a leaf.
pub trait TreeNode: Sized {
    /// Identifier of this node among its siblings. Never empty.
    fn name(&self) -> &str;

    /// Ordered children; empty for leaves.
    fn children(&self) -> &[Self];

    /// Whether this node has no children.
    fn is_leaf(&self) -> bool {
        self.children().is_empty()
    }

    /// Pre-order, depth-first iteration starting with this node.
    fn iter(&self) -> DepthFirst<'_, Self> {
        DepthFirst { stack: vec![self] }
    }

    /// Number of nodes in this subtree, including this one.
    fn node_count(&self) -> usize {
        self.iter().count()
    }
}

/// Pre-order iterator over a tree.
#[derive(Debug)]
pub struct DepthFirst<'a, N> {
    stack: Vec<&'a N>,
}

impl<'a, N> DepthFirst<'a, N> {
    pub(crate) fn over(nodes: &'a [N]) -> Self {
        Self {
            stack: nodes.iter().rev().collect(),
        }
    }
}

impl<'a, N: TreeNode> Iterator for DepthFirst<'a, N> {
    type Item = &'a N;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children().iter().rev());
        Some(node)
    }
}

/// General-purpose tree node carrying an arbitrary payload.
///
/// Used to project a snapshot into another shape, typically through
/// [`Directory::fold`](crate::Directory::fold).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamedNode<T> {
    name: CompactString,
    value: T,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    children: Vec<NamedNode<T>>,
}

impl<T> NamedNode<T> {
    /// Create a node without children.
    pub fn leaf(name: impl Into<CompactString>, value: T) -> Self {
        Self::branch(name, value, Vec::new())
    }

    /// Create a node owning the given children.
    pub fn branch(name: impl Into<CompactString>, value: T, children: Vec<NamedNode<T>>) -> Self {
        let name = name.into();
        debug_assert!(!name.is_empty(), "tree node names must not be empty");
        Self {
            name,
            value,
            children,
        }
    }

    /// Payload of this node.
    pub fn value(&self) -> &T {
        &self.value
    }
}

impl<T> TreeNode for NamedNode<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn children(&self) -> &[Self] {
        &self.children
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> NamedNode<u32> {
        NamedNode::branch(
            "root",
            0,
            vec![
                NamedNode::branch("a", 1, vec![NamedNode::leaf("a1", 2)]),
                NamedNode::leaf("b", 3),
            ],
        )
    }

    #[test]
    fn test_leaf() {
        let leaf = NamedNode::leaf("x", ());
        assert!(leaf.is_leaf());
        assert_eq!(leaf.name(), "x");
        assert!(leaf.children().is_empty());
    }

    #[test]
    fn test_depth_first_order() {
        let tree = sample();
        let names: Vec<&str> = tree.iter().map(|n| n.name()).collect();
        assert_eq!(names, ["root", "a", "a1", "b"]);
        assert_eq!(tree.node_count(), 4);
    }

    #[test]
    fn test_branch_is_not_leaf() {
        let tree = sample();
        assert!(!tree.is_leaf());
        assert_eq!(*tree.children()[0].value(), 1);
    }
}
