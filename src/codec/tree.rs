//! The inferred type tree.
//!
//! Encoder and decoder each walk one of these in lockstep with the value
//! tree. Every structural position gets a node; the node's tag starts
//! `UNDEFINED`, is assigned when the first value occupies the position, and
//! from then on sibling occurrences carry no tag byte on the wire.
//!
//! Nodes live in a vector-backed arena addressed by index, which sidesteps
//! the cycles the structure needs: the single element node under an array
//! is its own `next`, so every element of the array shares one position.

use crate::wire::tag;

pub(crate) type NodeId = usize;

#[derive(Debug)]
struct Node {
    tag: u8,
    /// Struct field count; 0 means not yet recorded.
    n: u64,
    parent: Option<NodeId>,
    child: Option<NodeId>,
    next: Option<NodeId>,
}

#[derive(Debug)]
pub(crate) struct TypeTree {
    nodes: Vec<Node>,
}

impl TypeTree {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                tag: tag::UNDEFINED,
                n: 0,
                parent: None,
                child: None,
                next: None,
            }],
        }
    }

    /// The first position of the root level.
    pub fn root(&self) -> NodeId {
        0
    }

    pub fn tag(&self, id: NodeId) -> u8 {
        self.nodes[id].tag
    }

    pub fn is_undefined(&self, id: NodeId) -> bool {
        self.nodes[id].tag == tag::UNDEFINED
    }

    pub fn field_count(&self, id: NodeId) -> u64 {
        self.nodes[id].n
    }

    pub fn set_field_count(&mut self, id: NodeId, n: u64) {
        self.nodes[id].n = n;
    }

    /// Records the inferred tag for a position. A position that already has
    /// a tag keeps it; null variants never overwrite an inference.
    pub fn assign(&mut self, id: NodeId, t: u8) {
        if self.nodes[id].tag == tag::UNDEFINED {
            self.nodes[id].tag = t;
        }
    }

    /// Moves to the next sibling position, creating it on first visit. An
    /// array element node links to itself, so this keeps returning the same
    /// position there.
    pub fn advance(&mut self, id: NodeId) -> NodeId {
        if let Some(next) = self.nodes[id].next {
            return next;
        }
        let parent = self.nodes[id].parent;
        let next = self.alloc(parent);
        self.nodes[id].next = Some(next);
        next
    }

    /// Assigns a tag and moves to the next sibling position.
    pub fn advance_with(&mut self, id: NodeId, t: u8) -> NodeId {
        self.assign(id, t);
        self.advance(id)
    }

    /// Descends into the child subtree of a struct position, creating it on
    /// first visit. Also guarantees the position's own `next` exists so the
    /// walk can resume after the struct completes.
    pub fn child(&mut self, id: NodeId, t: u8) -> NodeId {
        self.assign(id, t);
        let _ = self.advance(id);
        if let Some(child) = self.nodes[id].child {
            return child;
        }
        let child = self.alloc(Some(id));
        self.nodes[id].child = Some(child);
        child
    }

    /// Like [`TypeTree::child`], but the created element node is its own
    /// sibling: array elements all share one position.
    pub fn child_self_linked(&mut self, id: NodeId, t: u8) -> NodeId {
        let had_child = self.nodes[id].child.is_some();
        let child = self.child(id, t);
        if !had_child {
            self.nodes[child].next = Some(child);
        }
        child
    }

    /// Resumes the parent level after a container completes: the position
    /// after the container itself.
    pub fn parent_next(&mut self, id: NodeId) -> NodeId {
        match self.nodes[id].parent {
            Some(parent) => self.advance(parent),
            // The root level has no parent; the drivers never pop past it.
            None => id,
        }
    }

    fn alloc(&mut self, parent: Option<NodeId>) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node {
            tag: tag::UNDEFINED,
            n: 0,
            parent,
            child: None,
            next: None,
        });
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sibling_positions_keep_their_tags() {
        let mut tree = TypeTree::new();
        let first = tree.root();
        assert!(tree.is_undefined(first));

        let second = tree.advance_with(first, tag::NUMBER);
        assert_eq!(tree.tag(first), tag::NUMBER);
        assert!(tree.is_undefined(second));

        // Advancing again lands on the same node.
        assert_eq!(tree.advance(first), second);
    }

    #[test]
    fn null_variants_do_not_overwrite() {
        let mut tree = TypeTree::new();
        let id = tree.root();
        tree.assign(id, tag::STRING);
        tree.assign(id, tag::UNDEFINED);
        tree.assign(id, tag::NUMBER);
        assert_eq!(tree.tag(id), tag::STRING);
    }

    #[test]
    fn array_child_is_its_own_sibling() {
        let mut tree = TypeTree::new();
        let array = tree.root();
        let element = tree.child_self_linked(array, tag::ARRAY);
        let next = tree.advance_with(element, tag::BOOL);
        assert_eq!(next, element);
        assert_eq!(tree.tag(element), tag::BOOL);
    }

    #[test]
    fn pop_resumes_after_the_container() {
        let mut tree = TypeTree::new();
        let strukt = tree.root();
        let field0 = tree.child(strukt, tag::STRUCT);
        let field1 = tree.advance_with(field0, tag::NUMBER);
        assert_ne!(field1, field0);

        let after = tree.parent_next(field1);
        assert_eq!(after, tree.advance(strukt));
        assert!(tree.is_undefined(after));
    }

    #[test]
    fn struct_field_count_is_sticky() {
        let mut tree = TypeTree::new();
        let id = tree.root();
        assert_eq!(tree.field_count(id), 0);
        tree.set_field_count(id, 3);
        assert_eq!(tree.field_count(id), 3);
    }
}
