//! Path addressing for nodes in one tree snapshot
//!
//! A path is a sequence of segments from the root: a positional child index
//! or a named-child key. The dotted string form
//! (`root.children.0.namedChildren.value`) only exists at the serialization
//! boundary, see [`crate::parse`].
//!
//! Paths are only valid for the snapshot they were computed on. Inserting or
//! removing a positional sibling renumbers every later index; named keys are
//! stable. Callers recompute paths after every structural edit and treat a
//! failed resolution as "stale, re-derive".
//!
//! All edits are copy-on-write: the nodes on the way from the root to the
//! edited position are replaced, every other subtree is shared with the
//! previous snapshot (`Arc::ptr_eq` holds for it).

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::ast::names::{self, Arity};
use crate::ast::node::Node;
use crate::parse::{PathParseError, parse_path};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Segment {
    Child(usize),
    Named(String),
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Child(index) => write!(f, "children.{index}"),
            Segment::Named(key) => write!(f, "namedChildren.{key}"),
        }
    }
}

/// Address of one node, relative to the root of a tree
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodePath {
    segments: Vec<Segment>,
}

impl NodePath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn from_segments(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    pub fn child(&self, index: usize) -> Self {
        self.append(Segment::Child(index))
    }

    pub fn named(&self, key: impl Into<String>) -> Self {
        self.append(Segment::Named(key.into()))
    }

    pub fn append(&self, segment: Segment) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment);
        Self { segments }
    }

    /// Parent path, None for the root
    pub fn parent(&self) -> Option<Self> {
        let (_, init) = self.segments.split_last()?;
        Some(Self {
            segments: init.to_vec(),
        })
    }

    pub fn last(&self) -> Option<&Segment> {
        self.segments.last()
    }

    pub fn starts_with(&self, prefix: &NodePath) -> bool {
        self.segments.starts_with(&prefix.segments)
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "root")?;
        for segment in &self.segments {
            write!(f, ".{segment}")?;
        }
        Ok(())
    }
}

impl FromStr for NodePath {
    type Err = PathParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_path(s)
    }
}

impl Serialize for NodePath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for NodePath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse_path(&s).map_err(serde::de::Error::custom)
    }
}

/// A path that does not resolve in the tree it was applied to
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("stale path: {path}")]
pub struct StalePath {
    pub path: NodePath,
}

impl StalePath {
    fn at(path: &NodePath) -> Self {
        Self { path: path.clone() }
    }
}

// ============ Resolution ============

fn step<'a>(node: &'a Arc<Node>, segment: &Segment) -> Option<&'a Arc<Node>> {
    match segment {
        Segment::Child(index) => node.children.get(*index),
        Segment::Named(key) => node.named_children.get(key),
    }
}

/// Find the node at `path`. None means the path is stale for this tree.
pub fn resolve<'a>(root: &'a Arc<Node>, path: &NodePath) -> Option<&'a Arc<Node>> {
    path.segments
        .iter()
        .try_fold(root, |node, segment| step(node, segment))
}

/// Every node of the tree with its path, in pre-order
/// (positional children before named children).
pub fn walk(root: &Arc<Node>) -> Vec<(NodePath, &Arc<Node>)> {
    let mut out = Vec::new();
    collect(root, NodePath::root(), &mut out);
    out
}

fn collect<'a>(node: &'a Arc<Node>, path: NodePath, out: &mut Vec<(NodePath, &'a Arc<Node>)>) {
    out.push((path.clone(), node));
    for (index, child) in node.children.iter().enumerate() {
        collect(child, path.child(index), out);
    }
    for (key, child) in &node.named_children {
        collect(child, path.named(key), out);
    }
}

// ============ Copy-on-write edits ============

/// Rebuild the spine from the root to `path`, replacing the node found there
/// with `f(node)`.
pub fn update_at<E, F>(root: &Arc<Node>, path: &NodePath, f: F) -> Result<Arc<Node>, E>
where
    F: FnOnce(&Arc<Node>) -> Result<Arc<Node>, E>,
    E: From<StalePath>,
{
    update_segments(root, path.segments(), path, f)
}

fn update_segments<E, F>(
    node: &Arc<Node>,
    segments: &[Segment],
    full_path: &NodePath,
    f: F,
) -> Result<Arc<Node>, E>
where
    F: FnOnce(&Arc<Node>) -> Result<Arc<Node>, E>,
    E: From<StalePath>,
{
    let Some((segment, rest)) = segments.split_first() else {
        return f(node);
    };
    let child = step(node, segment).ok_or_else(|| StalePath::at(full_path))?;
    let replaced = update_segments(child, rest, full_path, f)?;

    // Shallow copy: siblings stay shared
    let mut copy = Node::clone(node);
    match segment {
        Segment::Child(index) => copy.children[*index] = replaced,
        Segment::Named(key) => {
            if let Some(slot) = copy.named_children.get_mut(key) {
                *slot = replaced;
            }
        }
    }
    Ok(Arc::new(copy))
}

/// New tree with the node at `path` replaced by `new_node`
pub fn set_at(root: &Arc<Node>, path: &NodePath, new_node: Arc<Node>) -> Result<Arc<Node>, StalePath> {
    update_at(root, path, |_| Ok(new_node))
}

/// New tree with `child` appended to the positional children at `parent_path`
pub fn append_child(
    root: &Arc<Node>,
    parent_path: &NodePath,
    child: Arc<Node>,
) -> Result<Arc<Node>, StalePath> {
    update_at(root, parent_path, |parent: &Arc<Node>| {
        let mut copy = Node::clone(parent);
        copy.children.push(child);
        Ok(Arc::new(copy))
    })
}

/// New tree with the node at `path` removed.
///
/// Slots that carry meaning by position or by key are kept and filled with
/// an `Undefined` placeholder: named children, operands of fixed-arity
/// operators (a comparison always has two operands) and the root itself.
/// Only operands of variadic nodes (`AND`, `OR`, `List`) are deleted.
pub fn remove_at(root: &Arc<Node>, path: &NodePath) -> Result<Arc<Node>, StalePath> {
    let (Some(parent_path), Some(last)) = (path.parent(), path.last()) else {
        return Ok(Node::undefined());
    };
    let Segment::Child(index) = last else {
        return set_at(root, path, Node::undefined());
    };
    let index = *index;

    update_at(root, &parent_path, |parent: &Arc<Node>| {
        if index >= parent.children.len() {
            return Err(StalePath::at(path));
        }
        let mut copy = Node::clone(parent);
        let variadic = parent
            .function_name()
            .is_some_and(|name| names::arity(name) == Arity::Variadic);
        if variadic {
            copy.children.remove(index);
        } else {
            copy.children[index] = Node::undefined();
        }
        Ok(Arc::new(copy))
    })
}
