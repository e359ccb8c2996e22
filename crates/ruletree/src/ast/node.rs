//! The expression tree element
//!
//! A node is either positional (operator with ordered operands) or
//! named-slot based (function call with typed arguments). Both collections
//! always exist so traversal code stays total.

use std::sync::Arc;

use indexmap::IndexMap;

use super::names;
use super::{Constant, NodeId, NodeName};

#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub name: NodeName,
    pub constant: Option<Constant>,
    pub children: Vec<Arc<Node>>,
    pub named_children: IndexMap<String, Arc<Node>>,
}

/// Structural equality: ids are ignored, named-child order is irrelevant.
///
/// Use [`Node::same_node`] for identity across renders.
impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.constant == other.constant
            && self.children == other.children
            && self.named_children == other.named_children
    }
}

impl Node {
    fn with_name(name: NodeName) -> Self {
        Self {
            id: NodeId::fresh(),
            name,
            constant: None,
            children: Vec::new(),
            named_children: IndexMap::new(),
        }
    }

    /// Literal leaf
    pub fn constant(value: impl Into<Constant>) -> Arc<Node> {
        let mut node = Self::with_name(NodeName::Constant);
        node.constant = Some(value.into());
        Arc::new(node)
    }

    /// Placeholder for an operand that has not been chosen yet
    pub fn undefined() -> Arc<Node> {
        Arc::new(Self::with_name(NodeName::Undefined))
    }

    pub fn binary(name: impl Into<String>, left: Arc<Node>, right: Arc<Node>) -> Arc<Node> {
        Self::n_ary(name, vec![left, right])
    }

    pub fn n_ary(name: impl Into<String>, children: Vec<Arc<Node>>) -> Arc<Node> {
        let mut node = Self::with_name(NodeName::function(name));
        node.children = children;
        Arc::new(node)
    }

    pub fn call<K: Into<String>>(
        name: impl Into<String>,
        named_children: impl IntoIterator<Item = (K, Arc<Node>)>,
    ) -> Arc<Node> {
        let mut node = Self::with_name(NodeName::function(name));
        node.named_children = named_children
            .into_iter()
            .map(|(k, v)| (k.into(), v))
            .collect();
        Arc::new(node)
    }

    /// `Payload(field)` accessor into the trigger object
    pub fn payload(field: impl Into<String>) -> Arc<Node> {
        Self::n_ary(names::PAYLOAD, vec![Self::constant(Constant::String(field.into()))])
    }

    /// `DatabaseAccess` reading `field_name` from `table_name` through `path` links
    pub fn database_access(
        table_name: impl Into<String>,
        path: Vec<String>,
        field_name: impl Into<String>,
    ) -> Arc<Node> {
        Self::call(
            names::DATABASE_ACCESS,
            [
                (names::SLOT_TABLE_NAME, Self::constant(Constant::String(table_name.into()))),
                (names::SLOT_FIELD_NAME, Self::constant(Constant::String(field_name.into()))),
                (names::SLOT_PATH, Self::constant(path)),
            ],
        )
    }

    pub fn custom_list(list_id: impl Into<String>) -> Arc<Node> {
        Self::call(
            names::CUSTOM_LIST_ACCESS,
            [(names::SLOT_CUSTOM_LIST_ID, Self::constant(Constant::String(list_id.into())))],
        )
    }

    pub fn function_name(&self) -> Option<&str> {
        self.name.as_function()
    }

    pub fn has_name(&self, name: &str) -> bool {
        self.function_name() == Some(name)
    }

    pub fn is_undefined(&self) -> bool {
        self.name == NodeName::Undefined
    }

    pub fn is_constant(&self) -> bool {
        self.name == NodeName::Constant
    }

    /// Constant string payload, for configuration slots such as `tableName`
    pub fn constant_str(&self) -> Option<&str> {
        self.constant.as_ref().and_then(Constant::as_str)
    }

    pub fn child(&self, index: usize) -> Option<&Arc<Node>> {
        self.children.get(index)
    }

    pub fn named(&self, key: &str) -> Option<&Arc<Node>> {
        self.named_children.get(key)
    }

    /// Identity check: is this the same node (possibly a newer version of it)
    pub fn same_node(&self, other: &Node) -> bool {
        self.id == other.id
    }

    /// Same node under a different name, operands untouched
    pub fn renamed(&self, name: impl Into<String>) -> Arc<Node> {
        let mut node = self.clone();
        node.name = NodeName::function(name);
        Arc::new(node)
    }

    /// Deep copy with fresh ids, for duplicating a subtree into another slot
    pub fn recreate(&self) -> Arc<Node> {
        Arc::new(Node {
            id: NodeId::fresh(),
            name: self.name.clone(),
            constant: self.constant.clone(),
            children: self.children.iter().map(|c| c.recreate()).collect(),
            named_children: self
                .named_children
                .iter()
                .map(|(k, v)| (k.clone(), v.recreate()))
                .collect(),
        })
    }

    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(|c| c.node_count()).sum::<usize>()
            + self
                .named_children
                .values()
                .map(|c| c.node_count())
                .sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::names::{AND, GREATER};

    #[test]
    fn constructors_keep_collections_total() {
        let leaf = Node::constant(1000);
        assert!(leaf.is_constant());
        assert!(leaf.children.is_empty());
        assert!(leaf.named_children.is_empty());

        let placeholder = Node::undefined();
        assert!(placeholder.is_undefined());
        assert_eq!(placeholder.constant, None);
    }

    #[test]
    fn undefined_is_distinct_from_null_constant() {
        assert_ne!(*Node::undefined(), *Node::constant(Constant::Null));
    }

    #[test]
    fn structural_equality_ignores_ids() {
        let a = Node::binary(GREATER, Node::payload("amount"), Node::constant(1000));
        let b = Node::binary(GREATER, Node::payload("amount"), Node::constant(1000));
        assert!(!a.same_node(&b));
        assert_eq!(a, b);
    }

    #[test]
    fn structural_equality_ignores_named_child_order() {
        let a = Node::call(
            "F",
            [("x", Node::constant(1)), ("y", Node::constant(2))],
        );
        let b = Node::call(
            "F",
            [("y", Node::constant(2)), ("x", Node::constant(1))],
        );
        assert_eq!(a, b);
    }

    #[test]
    fn recreate_assigns_fresh_ids() {
        let tree = Node::n_ary(AND, vec![Node::constant(true)]);
        let copy = tree.recreate();
        assert_eq!(tree, copy);
        assert!(!tree.same_node(&copy));
        assert!(!tree.children[0].same_node(&copy.children[0]));
    }

    #[test]
    fn renamed_keeps_identity_and_operands() {
        let cmp = Node::binary(GREATER, Node::payload("amount"), Node::constant(1));
        let renamed = cmp.renamed("<");
        assert!(renamed.same_node(&cmp));
        assert!(Arc::ptr_eq(&renamed.children[0], &cmp.children[0]));
        assert!(renamed.has_name("<"));
    }

    #[test]
    fn node_count_covers_named_children() {
        let access = Node::database_access("accounts", vec!["account".into()], "balance");
        assert_eq!(access.node_count(), 4);
    }
}
