//! Local structural validation
//!
//! Runs synchronously after every edit, offline. Only tree shape is checked:
//! the root shape for the root kind, operand counts, placeholders left in
//! operand slots, required named children, and (when a context is given)
//! references to fields and lists that do not exist.

use std::sync::Arc;

use crate::ast::names::{
    self, AGGREGATION, Aggregator, Arity, CUSTOM_LIST_ACCESS, DATABASE_ACCESS, FILTER, PAYLOAD,
    SLOT_AGGREGATOR, SLOT_CUSTOM_LIST_ID, SLOT_FIELD_NAME, SLOT_OPERATOR, SLOT_PATH,
    SLOT_TABLE_NAME, SLOT_VALUE,
};
use crate::ast::node::Node;
use crate::ast::{Constant, NodeName};
use crate::classify::{RootKind, classify};
use crate::context::EditorContext;
use crate::path::{NodePath, walk};

use super::{ErrorCode, EvaluationError, PathErrors};

/// Structural errors of `root`, keyed by the path of the offending node
pub fn validate_local(
    root: &Arc<Node>,
    root_kind: RootKind,
    context: Option<&EditorContext>,
) -> PathErrors {
    let mut errors = PathErrors::new();
    let mut push = |path: &NodePath, error: EvaluationError| {
        errors.entry(path.clone()).or_default().push(error);
    };

    match root_kind {
        RootKind::Trigger => {
            if !classify(root, &NodePath::root()).is_trigger_root() {
                push(
                    &NodePath::root(),
                    EvaluationError::new(ErrorCode::RootShapeUnresolved)
                        .with_message("trigger condition must be an AND or an OR of ANDs"),
                );
            }
        }
        RootKind::Rule => {
            if root.is_undefined() {
                push(&NodePath::root(), EvaluationError::new(ErrorCode::ArgumentRequired));
            }
        }
    }

    let context = context.filter(|ctx| !ctx.is_empty());
    for (path, node) in walk(root) {
        let NodeName::Function(name) = &node.name else {
            continue;
        };
        check_arity(name, node, &path, &mut push);
        check_operands(node, &path, &mut push);
        check_named_children(name, node, &path, &mut push);
        if name == AGGREGATION {
            check_aggregator(node, &path, &mut push);
        }
        if let Some(ctx) = context {
            check_references(name, node, ctx, &path, &mut push);
        }
    }
    errors
}

fn check_arity(
    name: &str,
    node: &Node,
    path: &NodePath,
    push: &mut impl FnMut(&NodePath, EvaluationError),
) {
    if let Arity::Fixed(expected) = names::arity(name)
        && node.children.len() != expected
    {
        push(
            path,
            EvaluationError::new(ErrorCode::WrongNumberOfArguments)
                .with_message(format!("{name} takes {expected}, got {}", node.children.len())),
        );
    }
}

fn check_operands(node: &Node, path: &NodePath, push: &mut impl FnMut(&NodePath, EvaluationError)) {
    for (index, child) in node.children.iter().enumerate() {
        if child.is_undefined() {
            push(
                &path.child(index),
                EvaluationError::new(ErrorCode::ArgumentRequired).with_argument_index(index),
            );
        }
    }
}

fn check_named_children(
    name: &str,
    node: &Node,
    path: &NodePath,
    push: &mut impl FnMut(&NodePath, EvaluationError),
) {
    for &slot in names::required_named_children(name) {
        if name == FILTER && slot == SLOT_VALUE && !filter_needs_value(node) {
            continue;
        }
        match node.named(slot) {
            None => push(
                path,
                EvaluationError::new(ErrorCode::MissingNamedArgument).with_argument_name(slot),
            ),
            Some(child) if child.is_undefined() => push(
                &path.named(slot),
                EvaluationError::new(ErrorCode::ArgumentRequired).with_argument_name(slot),
            ),
            Some(_) => {}
        }
    }
}

fn filter_needs_value(filter: &Node) -> bool {
    !filter
        .named(SLOT_OPERATOR)
        .and_then(|op| op.constant_str())
        .is_some_and(names::is_unary_operator)
}

fn check_aggregator(node: &Node, path: &NodePath, push: &mut impl FnMut(&NodePath, EvaluationError)) {
    let Some(value) = node.named(SLOT_AGGREGATOR).and_then(|n| n.constant_str()) else {
        return;
    };
    if value.parse::<Aggregator>().is_err() {
        push(
            &path.named(SLOT_AGGREGATOR),
            EvaluationError::new(ErrorCode::ArgumentInvalidType)
                .with_message(format!("unknown aggregator {value}")),
        );
    }
}

fn check_references(
    name: &str,
    node: &Node,
    ctx: &EditorContext,
    path: &NodePath,
    push: &mut impl FnMut(&NodePath, EvaluationError),
) {
    match name {
        PAYLOAD => {
            let Some(field) = node.child(0).and_then(|n| n.constant_str()) else {
                return;
            };
            if ctx.payload_field(field).is_none() {
                push(
                    path,
                    EvaluationError::new(ErrorCode::PayloadFieldNotFound)
                        .with_message(format!("no payload field {field}")),
                );
            }
        }
        DATABASE_ACCESS => {
            let slot = |key: &str| node.named(key).and_then(|n| n.constant_str());
            let (Some(table), Some(field)) = (slot(SLOT_TABLE_NAME), slot(SLOT_FIELD_NAME)) else {
                return;
            };
            let links = link_path(node);
            if ctx.database_field(table, &links, field).is_none() {
                let mut chain = vec![table.to_string()];
                chain.extend(links);
                chain.push(field.to_string());
                push(
                    path,
                    EvaluationError::new(ErrorCode::DatabaseAccessNotFound)
                        .with_message(format!("no field {}", chain.join("."))),
                );
            }
        }
        CUSTOM_LIST_ACCESS => {
            let Some(id) = node.named(SLOT_CUSTOM_LIST_ID).and_then(|n| n.constant_str()) else {
                return;
            };
            if ctx.custom_list(id).is_none() {
                push(
                    path,
                    EvaluationError::new(ErrorCode::ListNotFound).with_message(format!("no list {id}")),
                );
            }
        }
        _ => {}
    }
}

fn link_path(node: &Node) -> Vec<String> {
    match node.named(SLOT_PATH).and_then(|n| n.constant.as_ref()) {
        Some(Constant::List(items)) => items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::{Aggregation, FilterRow};
    use crate::ast::names::{AND, EQUAL, GREATER, IS_EMPTY, IS_IN_LIST, OR};
    use crate::context::{DataType, Table};

    fn codes_at(errors: &PathErrors, path: &NodePath) -> Vec<ErrorCode> {
        errors
            .get(path)
            .map(|list| list.iter().map(|e| e.code.clone()).collect())
            .unwrap_or_default()
    }

    fn cmp() -> Arc<Node> {
        Node::binary(GREATER, Node::payload("amount"), Node::constant(1000))
    }

    #[test]
    fn complete_rule_is_clean() {
        let tree = Node::n_ary(AND, vec![cmp()]);
        assert!(validate_local(&tree, RootKind::Trigger, None).is_empty());
        assert!(validate_local(&tree, RootKind::Rule, None).is_empty());
    }

    #[test]
    fn empty_root_and_is_not_an_error() {
        let tree = Node::n_ary(AND, vec![]);
        assert!(validate_local(&tree, RootKind::Trigger, None).is_empty());
    }

    #[test]
    fn trigger_root_must_be_and_or_or_of_and() {
        let errors = validate_local(&cmp(), RootKind::Trigger, None);
        assert_eq!(codes_at(&errors, &NodePath::root()), [ErrorCode::RootShapeUnresolved]);

        let or_of_and = Node::n_ary(OR, vec![Node::n_ary(AND, vec![cmp()])]);
        assert!(validate_local(&or_of_and, RootKind::Trigger, None).is_empty());

        // Any expression is a legal rule root
        assert!(validate_local(&cmp(), RootKind::Rule, None).is_empty());
    }

    #[test]
    fn undefined_rule_root_is_required() {
        let errors = validate_local(&Node::undefined(), RootKind::Rule, None);
        assert_eq!(codes_at(&errors, &NodePath::root()), [ErrorCode::ArgumentRequired]);
    }

    #[test]
    fn placeholder_operand_is_flagged_at_its_slot() {
        let tree = Node::n_ary(AND, vec![Node::binary(EQUAL, Node::payload("a"), Node::undefined())]);
        let errors = validate_local(&tree, RootKind::Trigger, None);
        let slot = NodePath::root().child(0).child(1);
        assert_eq!(codes_at(&errors, &slot), [ErrorCode::ArgumentRequired]);
        assert_eq!(errors[&slot][0].argument_index, Some(1));
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn wrong_operand_count() {
        let tree = Node::n_ary(IS_IN_LIST, vec![Node::payload("country")]);
        let errors = validate_local(&tree, RootKind::Rule, None);
        assert_eq!(codes_at(&errors, &NodePath::root()), [ErrorCode::WrongNumberOfArguments]);
    }

    #[test]
    fn missing_and_placeholder_named_children() {
        let node = Node::call(
            AGGREGATION,
            [
                ("aggregator", Node::constant("SUM")),
                ("tableName", Node::undefined()),
                ("filters", Node::n_ary(names::LIST, vec![])),
            ],
        );
        let errors = validate_local(&node, RootKind::Rule, None);
        assert_eq!(codes_at(&errors, &NodePath::root()), [ErrorCode::MissingNamedArgument]);
        assert_eq!(errors[&NodePath::root()][0].argument_name.as_deref(), Some("fieldName"));
        assert_eq!(
            codes_at(&errors, &NodePath::root().named("tableName")),
            [ErrorCode::ArgumentRequired]
        );
    }

    #[test]
    fn unary_filter_needs_no_value() {
        let agg = Aggregation {
            aggregator: Some(Aggregator::Count),
            table_name: Some("transactions".into()),
            field_name: Some("id".into()),
            label: None,
            filters: vec![FilterRow::new(IS_EMPTY, "transactions", "label", Node::undefined())],
        };
        assert!(validate_local(&agg.to_node(), RootKind::Rule, None).is_empty());
    }

    #[test]
    fn unknown_aggregator() {
        let node = Aggregation {
            aggregator: Some(Aggregator::Sum),
            table_name: Some("t".into()),
            field_name: Some("f".into()),
            ..Default::default()
        }
        .to_node();
        let mut copy = Node::clone(&node);
        copy.named_children.insert(SLOT_AGGREGATOR.to_string(), Node::constant("MEDIAN"));
        let errors = validate_local(&Arc::new(copy), RootKind::Rule, None);
        assert_eq!(
            codes_at(&errors, &NodePath::root().named("aggregator")),
            [ErrorCode::ArgumentInvalidType]
        );
    }

    #[test]
    fn references_checked_against_context() {
        let ctx = EditorContext::new()
            .with_table(
                Table::new("transactions")
                    .with_field("amount", DataType::Float)
                    .with_link("account", "accounts"),
            )
            .with_table(Table::new("accounts").with_field("balance", DataType::Float))
            .with_trigger_object("transactions")
            .with_custom_list("l1", "Blocked");

        let tree = Node::n_ary(
            AND,
            vec![
                Node::binary(GREATER, Node::payload("amount"), Node::constant(1)),
                Node::binary(GREATER, Node::payload("missing"), Node::constant(1)),
                Node::binary(
                    GREATER,
                    Node::database_access("transactions", vec!["account".into()], "balance"),
                    Node::constant(1),
                ),
                Node::binary(
                    GREATER,
                    Node::database_access("transactions", vec!["account".into()], "nope"),
                    Node::constant(1),
                ),
                Node::binary(IS_IN_LIST, Node::payload("amount"), Node::custom_list("l2")),
            ],
        );
        let errors = validate_local(&tree, RootKind::Trigger, Some(&ctx));
        assert_eq!(errors.len(), 3);
        assert_eq!(
            codes_at(&errors, &NodePath::root().child(1).child(0)),
            [ErrorCode::PayloadFieldNotFound]
        );
        assert_eq!(
            codes_at(&errors, &NodePath::root().child(3).child(0)),
            [ErrorCode::DatabaseAccessNotFound]
        );
        assert_eq!(
            codes_at(&errors, &NodePath::root().child(4).child(1)),
            [ErrorCode::ListNotFound]
        );

        // Without a data model nothing can be checked
        assert!(validate_local(&tree, RootKind::Trigger, Some(&EditorContext::new())).is_empty());
    }
}
