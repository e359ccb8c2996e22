//! Structural classification of nodes into editing layouts
//!
//! The same node shape is edited differently depending on where it sits and
//! what it is named. Classification happens once per render, in one place:
//! [`CLASSIFIERS`] is tried in order and the first match wins. Name checks
//! come before child counts, so an `AND` with two children at the root is a
//! Root-And, never a binary line.
//!
//! Roots that match neither trigger shape fall through to the generic
//! layout without an error; whether that is acceptable is decided by local
//! validation for the root kind being edited.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::aggregation::Aggregation;
use crate::ast::names::{self, AGGREGATION, AND, OR};
use crate::ast::node::Node;
use crate::operand::{OperandKind, operand_kind};
use crate::path::NodePath;

/// What the edited tree is the root of
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RootKind {
    /// Rule formula: any expression
    #[default]
    Rule,
    /// Trigger condition: must be a Root-And or a Root-Or-of-And
    Trigger,
}

/// One AND group of a Root-Or-of-And
#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    pub path: NodePath,
    pub conditions: Vec<NodePath>,
}

/// `left <operator> right`
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryLine {
    pub path: NodePath,
    pub operator: String,
    pub left: NodePath,
    pub right: NodePath,
    /// Right operand is itself a binary line (grouping shown as nesting)
    pub nested: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Layout {
    RootOrOfAnd { branches: Vec<Branch> },
    RootAnd { conditions: Vec<NodePath> },
    BinaryLine(BinaryLine),
    AggregationCall { path: NodePath, aggregation: Aggregation },
    Generic { path: NodePath, operand: OperandKind },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayoutKind {
    RootOrOfAnd,
    RootAnd,
    BinaryLine,
    AggregationCall,
    Generic,
}

impl Layout {
    pub fn kind(&self) -> LayoutKind {
        match self {
            Layout::RootOrOfAnd { .. } => LayoutKind::RootOrOfAnd,
            Layout::RootAnd { .. } => LayoutKind::RootAnd,
            Layout::BinaryLine(_) => LayoutKind::BinaryLine,
            Layout::AggregationCall { .. } => LayoutKind::AggregationCall,
            Layout::Generic { .. } => LayoutKind::Generic,
        }
    }

    /// True for the two trigger-legal root shapes
    pub fn is_trigger_root(&self) -> bool {
        matches!(self.kind(), LayoutKind::RootOrOfAnd | LayoutKind::RootAnd)
    }
}

type Classifier = fn(&Arc<Node>, &NodePath) -> Option<Layout>;

/// Classifiers in priority order
pub const CLASSIFIERS: &[(LayoutKind, Classifier)] = &[
    (LayoutKind::RootOrOfAnd, root_or_of_and),
    (LayoutKind::RootAnd, root_and),
    (LayoutKind::BinaryLine, binary_line),
    (LayoutKind::AggregationCall, aggregation_call),
];

/// Layout of the node at `path`. Total: unmatched nodes are generic operands.
pub fn classify(node: &Arc<Node>, path: &NodePath) -> Layout {
    CLASSIFIERS
        .iter()
        .find_map(|(_, classifier)| classifier(node, path))
        .unwrap_or_else(|| Layout::Generic {
            path: path.clone(),
            operand: operand_kind(node),
        })
}

fn child_paths(node: &Node, path: &NodePath) -> Vec<NodePath> {
    (0..node.children.len()).map(|i| path.child(i)).collect()
}

fn root_or_of_and(node: &Arc<Node>, path: &NodePath) -> Option<Layout> {
    if !path.is_root() || !node.has_name(OR) {
        return None;
    }
    if !node.children.iter().all(|child| child.has_name(AND)) {
        return None;
    }
    let branches = node
        .children
        .iter()
        .enumerate()
        .map(|(i, branch)| {
            let branch_path = path.child(i);
            Branch {
                conditions: child_paths(branch, &branch_path),
                path: branch_path,
            }
        })
        .collect();
    Some(Layout::RootOrOfAnd { branches })
}

fn root_and(node: &Arc<Node>, path: &NodePath) -> Option<Layout> {
    if !path.is_root() || !node.has_name(AND) {
        return None;
    }
    Some(Layout::RootAnd {
        conditions: child_paths(node, path),
    })
}

/// Binary operator with exactly two operands and no named children
pub fn is_binary_shape(node: &Node) -> bool {
    node.function_name().is_some_and(names::is_binary_operator)
        && node.children.len() == 2
        && node.named_children.is_empty()
}

fn binary_line(node: &Arc<Node>, path: &NodePath) -> Option<Layout> {
    if !is_binary_shape(node) {
        return None;
    }
    let operator = node.function_name()?.to_string();
    Some(Layout::BinaryLine(BinaryLine {
        path: path.clone(),
        operator,
        left: path.child(0),
        right: path.child(1),
        nested: is_binary_shape(&node.children[1]),
    }))
}

fn aggregation_call(node: &Arc<Node>, path: &NodePath) -> Option<Layout> {
    if !node.has_name(AGGREGATION) {
        return None;
    }
    Some(Layout::AggregationCall {
        path: path.clone(),
        aggregation: Aggregation::read(node)?,
    })
}
