//! Structural rewrites
//!
//! - nest / unnest: grouping inside a binary chain, expressed as a
//!   right-leaning nested binary node
//! - root normalizers: bring a loaded tree into a trigger-legal root shape
//! - trigger editing: OR branches and AND conditions of a Root-Or-of-And
//!
//! Every function is pure and returns a new tree; untouched subtrees are
//! shared with the input.

use std::sync::Arc;

use crate::ast::names::{AND, EQUAL, OR};
use crate::ast::node::Node;
use crate::classify::is_binary_shape;
use crate::path::{self, NodePath, Segment, StalePath};

// ============ Nesting ============

/// `l op r` becomes `l op (r op _)`. None unless `node` is a binary line.
pub fn nest(node: &Arc<Node>) -> Option<Arc<Node>> {
    if !is_binary_shape(node) {
        return None;
    }
    let operator = node.function_name()?;
    let right = node.children[1].clone();
    let mut copy = Node::clone(node);
    copy.children[1] = Node::binary(operator, right, Node::undefined());
    Some(Arc::new(copy))
}

/// `l op (r op' x)` becomes `l op r`. None unless the right operand is a
/// binary line.
pub fn unnest(node: &Arc<Node>) -> Option<Arc<Node>> {
    if !is_binary_shape(node) || !is_binary_shape(&node.children[1]) {
        return None;
    }
    let inner_left = node.children[1].children[0].clone();
    let mut copy = Node::clone(node);
    copy.children[1] = inner_left;
    Some(Arc::new(copy))
}

// ============ Root normalizers ============

/// Comparison with both operands still to choose
pub fn new_empty_condition() -> Arc<Node> {
    Node::binary(EQUAL, Node::undefined(), Node::undefined())
}

/// Root-And form: an AND root is kept, a placeholder becomes an empty AND,
/// anything else becomes the only condition.
pub fn wrap_in_root_and(root: &Arc<Node>) -> Arc<Node> {
    if root.has_name(AND) {
        root.clone()
    } else if root.is_undefined() {
        Node::n_ary(AND, Vec::new())
    } else {
        Node::n_ary(AND, vec![root.clone()])
    }
}

/// Root-Or-of-And form: each OR child that is not an AND becomes a
/// single-condition branch; any other root becomes the only branch.
pub fn wrap_in_or_and_groups(root: &Arc<Node>) -> Arc<Node> {
    if root.has_name(OR) {
        if root.children.iter().all(|c| c.has_name(AND)) {
            return root.clone();
        }
        let mut copy = Node::clone(root);
        copy.children = root.children.iter().map(wrap_in_root_and).collect();
        return Arc::new(copy);
    }
    Node::n_ary(OR, vec![wrap_in_root_and(root)])
}

fn is_or_of_and(root: &Node) -> bool {
    root.has_name(OR) && root.children.iter().all(|c| c.has_name(AND))
}

// ============ Trigger editing ============

/// Append a new OR branch seeded with one empty condition.
/// None unless `root` is an OR of ANDs.
pub fn add_or_branch(root: &Arc<Node>) -> Option<Arc<Node>> {
    if !is_or_of_and(root) {
        return None;
    }
    let branch = Node::n_ary(AND, vec![new_empty_condition()]);
    path::append_child(root, &NodePath::root(), branch).ok()
}

/// Append an empty condition to OR branch `branch`
pub fn add_and_condition(root: &Arc<Node>, branch: usize) -> Option<Arc<Node>> {
    if !is_or_of_and(root) || branch >= root.children.len() {
        return None;
    }
    path::append_child(root, &NodePath::root().child(branch), new_empty_condition()).ok()
}

/// Remove a node; when it was the last condition of an OR branch, the
/// branch goes with it.
pub fn remove_condition(root: &Arc<Node>, target: &NodePath) -> Result<Arc<Node>, StalePath> {
    let updated = path::remove_at(root, target)?;
    let [Segment::Child(branch), Segment::Child(_)] = target.segments() else {
        return Ok(updated);
    };
    if !is_or_of_and(root) || !is_or_of_and(&updated) {
        return Ok(updated);
    }
    let emptied = updated
        .children
        .get(*branch)
        .is_some_and(|b| b.children.is_empty());
    if emptied {
        return path::remove_at(&updated, &NodePath::root().child(*branch));
    }
    Ok(updated)
}
