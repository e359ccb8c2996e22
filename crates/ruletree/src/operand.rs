//! Operand kinds for the generic editor, and the operands a picker offers
//!
//! Anything no specialised layout claims is edited as one opaque operand.
//! The kind decides which picker is shown; `operand_options` lists what the
//! pickers can insert, derived from the editing context.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::ast::names::{self, AGGREGATION, CUSTOM_LIST_ACCESS, DATABASE_ACCESS, PAYLOAD};
use crate::ast::node::Node;
use crate::ast::NodeName;
use crate::context::{DataType, EditorContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperandKind {
    Undefined,
    Constant,
    Payload,
    DatabaseAccess,
    CustomList,
    Aggregation,
    /// Named function other than the accessors (`TimeAdd`, `TimeNow`, ...)
    Function,
    /// Operator expression (logical, comparison, arithmetic, unary)
    Formula,
}

pub fn operand_kind(node: &Node) -> OperandKind {
    match &node.name {
        NodeName::Undefined => OperandKind::Undefined,
        NodeName::Constant => OperandKind::Constant,
        NodeName::Function(name) => match name.as_str() {
            PAYLOAD => OperandKind::Payload,
            DATABASE_ACCESS => OperandKind::DatabaseAccess,
            CUSTOM_LIST_ACCESS => OperandKind::CustomList,
            AGGREGATION => OperandKind::Aggregation,
            name if names::is_logical(name)
                || names::is_binary_operator(name)
                || names::is_unary_operator(name) =>
            {
                OperandKind::Formula
            }
            _ => OperandKind::Function,
        },
    }
}

/// One entry of an operand picker
#[derive(Debug, Clone, PartialEq)]
pub struct OperandOption {
    pub kind: OperandKind,
    /// Human label (`amount`, `transactions.account.balance`, list name)
    pub label: String,
    pub data_type: Option<DataType>,
    /// Node inserted when the option is picked
    pub node: Arc<Node>,
}

/// Every accessor and list reference the context makes available.
///
/// Payload fields of the trigger table come first, then database fields
/// reachable from the trigger table through single links, then custom lists.
pub fn operand_options(context: &EditorContext) -> Vec<OperandOption> {
    let mut options = Vec::new();

    if let Some(trigger) = context.trigger_table() {
        for field in trigger.fields.values() {
            options.push(OperandOption {
                kind: OperandKind::Payload,
                label: field.name.clone(),
                data_type: Some(field.data_type),
                node: Node::payload(field.name.clone()),
            });
        }
        let mut visited = vec![trigger.name.clone()];
        collect_linked(context, &trigger.name, &trigger.name, &mut Vec::new(), &mut visited, &mut options);
    }

    for list in &context.custom_lists {
        options.push(OperandOption {
            kind: OperandKind::CustomList,
            label: list.name.clone(),
            data_type: None,
            node: Node::custom_list(list.id.clone()),
        });
    }
    options
}

// Depth-first over single links; a table already on the current link chain
// is not entered again
fn collect_linked(
    context: &EditorContext,
    root_table: &str,
    table_name: &str,
    link_path: &mut Vec<String>,
    visited: &mut Vec<String>,
    options: &mut Vec<OperandOption>,
) {
    let Some(table) = context.table(table_name) else {
        return;
    };
    for (link_name, link) in &table.links_to_single {
        if visited.contains(&link.linked_table_name) {
            continue;
        }
        let Some(linked) = context.table(&link.linked_table_name) else {
            continue;
        };
        link_path.push(link_name.clone());
        for field in linked.fields.values() {
            options.push(OperandOption {
                kind: OperandKind::DatabaseAccess,
                label: format!("{}.{}.{}", root_table, link_path.join("."), field.name),
                data_type: Some(field.data_type),
                node: Node::database_access(root_table, link_path.clone(), field.name.clone()),
            });
        }
        visited.push(linked.name.clone());
        collect_linked(context, root_table, &linked.name, link_path, visited, options);
        visited.pop();
        link_path.pop();
    }
}
