//! Persisted form of the expression tree
//!
//! JSON-shaped: `{id, name, constant, children: [...], namedChildren: {...}}`.
//! This is what the rule storage and the validation endpoint exchange.
//!
//! - constants carry no name (`name` absent or null) and a `constant` value
//! - the placeholder is `name: "Undefined"`
//! - ids are emitted as strings and ignored on input: every deserialized
//!   node gets a fresh id

use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value as JsonValue};
use thiserror::Error;

use crate::ast::names::UNDEFINED;
use crate::ast::node::Node;
use crate::ast::{Constant, NodeId, NodeName};

#[derive(Error, Debug)]
pub enum WireError {
    #[error("Unsupported constant literal at {location}: {value}")]
    UnsupportedConstant { location: String, value: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constant: Option<JsonValue>,
    #[serde(default)]
    pub children: Vec<WireNode>,
    #[serde(default)]
    pub named_children: IndexMap<String, WireNode>,
}

// ============ Node -> wire ============

/// Wire form of `node`. Fails on float constants JSON cannot carry (NaN, infinities).
pub fn to_wire(node: &Node) -> Result<WireNode, WireError> {
    to_wire_at(node, "root")
}

fn to_wire_at(node: &Node, location: &str) -> Result<WireNode, WireError> {
    let name = match &node.name {
        NodeName::Undefined => Some(UNDEFINED.to_string()),
        NodeName::Constant => None,
        NodeName::Function(name) => Some(name.clone()),
    };
    let constant = match (&node.name, &node.constant) {
        // A constant node always serializes its value, null included
        (NodeName::Constant, value) => Some(constant_to_json(value.as_ref().unwrap_or(&Constant::Null), location)?),
        (_, Some(value)) => Some(constant_to_json(value, location)?),
        (_, None) => None,
    };
    let children = node
        .children
        .iter()
        .enumerate()
        .map(|(i, c)| to_wire_at(c, &format!("{location}.children.{i}")))
        .collect::<Result<Vec<_>, _>>()?;
    let named_children = node
        .named_children
        .iter()
        .map(|(k, v)| Ok((k.clone(), to_wire_at(v, &format!("{location}.namedChildren.{k}"))?)))
        .collect::<Result<IndexMap<_, _>, WireError>>()?;
    Ok(WireNode {
        id: Some(node.id.to_string()),
        name,
        constant,
        children,
        named_children,
    })
}

fn constant_to_json(constant: &Constant, location: &str) -> Result<JsonValue, WireError> {
    Ok(match constant {
        Constant::Null => JsonValue::Null,
        Constant::Bool(b) => JsonValue::Bool(*b),
        Constant::Int(n) => JsonValue::Number((*n).into()),
        Constant::Float(n) => match Number::from_f64(*n) {
            Some(number) => JsonValue::Number(number),
            None => {
                return Err(WireError::UnsupportedConstant {
                    location: location.to_string(),
                    value: n.to_string(),
                });
            }
        },
        Constant::String(s) => JsonValue::String(s.clone()),
        Constant::List(items) => JsonValue::Array(
            items
                .iter()
                .map(|item| constant_to_json(item, location))
                .collect::<Result<Vec<_>, _>>()?,
        ),
    })
}

// ============ wire -> Node ============

pub fn from_wire(wire: &WireNode) -> Result<Arc<Node>, WireError> {
    from_wire_at(wire, "root")
}

fn from_wire_at(wire: &WireNode, location: &str) -> Result<Arc<Node>, WireError> {
    let name = match wire.name.as_deref() {
        None => NodeName::Constant,
        Some(UNDEFINED) => NodeName::Undefined,
        Some(name) => NodeName::function(name),
    };
    let constant = match (&name, &wire.constant) {
        (NodeName::Constant, value) => Some(json_to_constant(value.as_ref().unwrap_or(&JsonValue::Null), location)?),
        (_, Some(JsonValue::Null)) | (_, None) => None,
        (_, Some(value)) => Some(json_to_constant(value, location)?),
    };

    let children = wire
        .children
        .iter()
        .enumerate()
        .map(|(i, c)| from_wire_at(c, &format!("{location}.children.{i}")))
        .collect::<Result<Vec<_>, _>>()?;
    let named_children = wire
        .named_children
        .iter()
        .map(|(k, v)| Ok((k.clone(), from_wire_at(v, &format!("{location}.namedChildren.{k}"))?)))
        .collect::<Result<IndexMap<_, _>, WireError>>()?;

    Ok(Arc::new(Node {
        id: NodeId::fresh(),
        name,
        constant,
        children,
        named_children,
    }))
}

fn json_to_constant(value: &JsonValue, location: &str) -> Result<Constant, WireError> {
    match value {
        JsonValue::Null => Ok(Constant::Null),
        JsonValue::Bool(b) => Ok(Constant::Bool(*b)),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => Ok(Constant::Int(i)),
            None => n.as_f64().map(Constant::Float).ok_or_else(|| unsupported(value, location)),
        },
        JsonValue::String(s) => Ok(Constant::String(s.clone())),
        JsonValue::Array(items) => items
            .iter()
            .map(|item| json_to_constant(item, location))
            .collect::<Result<Vec<_>, _>>()
            .map(Constant::List),
        JsonValue::Object(_) => Err(unsupported(value, location)),
    }
}

fn unsupported(value: &JsonValue, location: &str) -> WireError {
    WireError::UnsupportedConstant {
        location: location.to_string(),
        value: value.to_string(),
    }
}

// ============ String form ============

pub fn serialize(node: &Node) -> Result<String, WireError> {
    Ok(serde_json::to_string(&to_wire(node)?)?)
}

pub fn deserialize(json: &str) -> Result<Arc<Node>, WireError> {
    let wire: WireNode = serde_json::from_str(json)?;
    from_wire(&wire)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::names::{AGGREGATION, AND, GREATER, IS_IN_LIST};
    use serde_json::json;

    #[test]
    fn constant_node_has_no_name() {
        let wire = to_wire(&Node::constant(1000)).unwrap();
        assert_eq!(wire.name, None);
        assert_eq!(wire.constant, Some(json!(1000)));
    }

    #[test]
    fn null_constant_keeps_explicit_null() {
        let json = serialize(&Node::constant(Constant::Null)).unwrap();
        let value: JsonValue = serde_json::from_str(&json).unwrap();
        assert_eq!(value["constant"], JsonValue::Null);
        assert!(value.as_object().unwrap().contains_key("constant"));
    }

    #[test]
    fn placeholder_round_trips_as_undefined() {
        let wire = to_wire(&Node::undefined()).unwrap();
        assert_eq!(wire.name.as_deref(), Some("Undefined"));
        let back = from_wire(&wire).unwrap();
        assert!(back.is_undefined());
    }

    #[test]
    fn storage_json_parses() {
        let json = r#"{
            "name": "AND",
            "children": [
                {
                    "id": "a1",
                    "name": ">",
                    "children": [
                        {"name": "Payload", "children": [{"constant": "amount"}]},
                        {"constant": 1000}
                    ]
                }
            ]
        }"#;
        let node = deserialize(json).unwrap();
        assert!(node.has_name(AND));
        let cmp = &node.children[0];
        assert!(cmp.has_name(GREATER));
        assert_eq!(cmp.children[1].constant, Some(Constant::Int(1000)));
        assert!(cmp.named_children.is_empty());
    }

    #[test]
    fn reject_object_constants() {
        let json = r#"{"name": "=", "children": [{"constant": {"a": 1}}, {"constant": 1}]}"#;
        match deserialize(json) {
            Err(WireError::UnsupportedConstant { location, .. }) => {
                assert_eq!(location, "root.children.0");
            }
            other => panic!("expected UnsupportedConstant, got {:?}", other),
        }
    }

    #[test]
    fn reject_non_finite_floats() {
        let tree = Node::binary(GREATER, Node::payload("score"), Node::constant(f64::NAN));
        match serialize(&tree) {
            Err(WireError::UnsupportedConstant { location, value }) => {
                assert_eq!(location, "root.children.1");
                assert_eq!(value, "NaN");
            }
            other => panic!("expected UnsupportedConstant, got {:?}", other),
        }

        let listed = Node::constant(Constant::List(vec![Constant::Float(f64::INFINITY)]));
        assert!(matches!(to_wire(&listed), Err(WireError::UnsupportedConstant { .. })));
    }

    #[test]
    fn deserialize_assigns_fresh_ids() {
        let tree = Node::binary(IS_IN_LIST, Node::payload("country"), Node::constant(vec!["FR"]));
        let json = serialize(&tree).unwrap();
        let a = deserialize(&json).unwrap();
        let b = deserialize(&json).unwrap();
        assert_eq!(a, tree);
        assert!(!a.same_node(&b));
    }

    #[test]
    fn named_children_keep_storage_order() {
        let json = r#"{"name": "Aggregation", "namedChildren": {
            "tableName": {"constant": "transactions"},
            "aggregator": {"constant": "SUM"}
        }}"#;
        let node = deserialize(json).unwrap();
        assert!(node.has_name(AGGREGATION));
        let keys: Vec<&str> = node.named_children.keys().map(String::as_str).collect();
        assert_eq!(keys, ["tableName", "aggregator"]);
        let wire = to_wire(&node).unwrap();
        let keys: Vec<&str> = wire.named_children.keys().map(String::as_str).collect();
        assert_eq!(keys, ["tableName", "aggregator"]);
    }

    #[test]
    fn floats_and_nested_lists() {
        let tree = Node::constant(Constant::List(vec![
            Constant::Float(1.5),
            Constant::List(vec![Constant::Bool(true), Constant::Null]),
        ]));
        let back = deserialize(&serialize(&tree).unwrap()).unwrap();
        assert_eq!(back, tree);
    }
}
