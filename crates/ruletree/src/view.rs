//! View-model overlay
//!
//! A tree mirroring the node tree 1:1, each entry carrying the node, its
//! path in the current snapshot, and the merged validation annotations for
//! that path. It is rebuilt from scratch whenever the tree or the
//! annotations change and is never edited in place.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::ast::NodeId;
use crate::ast::node::Node;
use crate::path::{NodePath, Segment};
use crate::validate::{EvaluationError, NodeEvaluation, PathErrors, PathEvaluations};

#[derive(Debug, Clone, PartialEq)]
pub struct ViewNode {
    pub node: Arc<Node>,
    pub path: NodePath,
    pub errors: Vec<EvaluationError>,
    pub evaluation: Option<NodeEvaluation>,
    pub children: Vec<ViewNode>,
    pub named_children: IndexMap<String, ViewNode>,
}

/// Overlay `errors` and `evaluations` onto the tree rooted at `root`.
///
/// Total: every node gets a view node. Annotations whose path does not
/// resolve in this tree are ignored.
pub fn build_view_model(root: &Arc<Node>, errors: &PathErrors, evaluations: &PathEvaluations) -> ViewNode {
    build_at(root, NodePath::root(), errors, evaluations)
}

fn build_at(node: &Arc<Node>, path: NodePath, errors: &PathErrors, evaluations: &PathEvaluations) -> ViewNode {
    let children = node
        .children
        .iter()
        .enumerate()
        .map(|(i, child)| build_at(child, path.child(i), errors, evaluations))
        .collect();
    let named_children = node
        .named_children
        .iter()
        .map(|(key, child)| (key.clone(), build_at(child, path.named(key), errors, evaluations)))
        .collect();
    ViewNode {
        node: node.clone(),
        errors: errors.get(&path).cloned().unwrap_or_default(),
        evaluation: evaluations.get(&path).cloned(),
        path,
        children,
        named_children,
    }
}

impl ViewNode {
    /// Mirrors the id of the underlying node
    pub fn node_id(&self) -> NodeId {
        self.node.id
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// View node at `path`, None when stale
    pub fn get(&self, path: &NodePath) -> Option<&ViewNode> {
        path.segments().iter().try_fold(self, |view, segment| match segment {
            Segment::Child(index) => view.children.get(*index),
            Segment::Named(key) => view.named_children.get(key),
        })
    }

    fn descendants(&self) -> impl Iterator<Item = &ViewNode> {
        self.children.iter().chain(self.named_children.values())
    }

    /// Any error strictly below this node
    pub fn has_nested_errors(&self) -> bool {
        self.descendants()
            .any(|child| child.has_errors() || child.has_nested_errors())
    }

    /// Errors of this node and every node below it, pre-order
    pub fn errors_in_subtree(&self) -> Vec<(&NodePath, &EvaluationError)> {
        let mut out = Vec::new();
        self.collect_errors(&mut out);
        out
    }

    fn collect_errors<'a>(&'a self, out: &mut Vec<(&'a NodePath, &'a EvaluationError)>) {
        out.extend(self.errors.iter().map(|e| (&self.path, e)));
        for child in self.descendants() {
            child.collect_errors(out);
        }
    }

    pub fn node_count(&self) -> usize {
        1 + self.descendants().map(ViewNode::node_count).sum::<usize>()
    }
}
