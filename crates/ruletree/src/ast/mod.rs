//! AST types for rule expressions
//!
//! Split into:
//! - `node`: the expression tree element and its structural constructors
//! - `names`: reserved function names, named-child slots and the operator catalogue

pub mod names;
pub mod node;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

// Shared types used by the node model, the wire format and the view model

/// Opaque identifier of one node within a tree instance.
///
/// Ids are transient: they are reassigned whenever nodes are recreated
/// (including on deserialization) and are only meaningful for "is this the
/// same node across renders".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

impl NodeId {
    /// Allocate an id no other node in this process has been given
    pub fn fresh() -> Self {
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Literal payload of a constant node
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Plain strings and ISO date strings alike
    String(String),
    List(Vec<Constant>),
}

impl Constant {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Constant::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Constant::Null)
    }
}

impl From<&str> for Constant {
    fn from(s: &str) -> Self {
        Constant::String(s.to_string())
    }
}

impl From<String> for Constant {
    fn from(s: String) -> Self {
        Constant::String(s)
    }
}

impl From<i64> for Constant {
    fn from(n: i64) -> Self {
        Constant::Int(n)
    }
}

impl From<i32> for Constant {
    fn from(n: i32) -> Self {
        Constant::Int(i64::from(n))
    }
}

impl From<f64> for Constant {
    fn from(n: f64) -> Self {
        Constant::Float(n)
    }
}

impl From<bool> for Constant {
    fn from(b: bool) -> Self {
        Constant::Bool(b)
    }
}

impl<T: Into<Constant>> From<Vec<T>> for Constant {
    fn from(items: Vec<T>) -> Self {
        Constant::List(items.into_iter().map(Into::into).collect())
    }
}

/// Discriminator of a node
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeName {
    /// Operand not yet chosen. Distinct from a deliberate null constant.
    Undefined,
    /// Literal node; the value lives in `Node::constant`
    Constant,
    /// Operator symbol (`=`, `AND`, ...) or named function (`Aggregation`, `Payload`, ...)
    Function(String),
}

impl NodeName {
    pub fn function(name: impl Into<String>) -> Self {
        NodeName::Function(name.into())
    }

    pub fn as_function(&self) -> Option<&str> {
        match self {
            NodeName::Function(name) => Some(name),
            _ => None,
        }
    }
}
