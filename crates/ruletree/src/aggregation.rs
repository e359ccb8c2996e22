//! Aggregation calls and their draft editor
//!
//! An aggregation is a named-child node:
//!
//! ```text
//! Aggregation {
//!     aggregator: "SUM",
//!     tableName:  "transactions",
//!     fieldName:  "amount",
//!     filters:    List[Filter { operator, tableName, fieldName, value }, ...],
//!     label:      "..."            (optional)
//! }
//! ```
//!
//! Unlike every other edit, changes to an aggregation are staged in an
//! [`AggregationDraft`] and only reach the tree on commit.

use std::sync::Arc;

use thiserror::Error;

use crate::ast::names::{
    self, AGGREGATION, Aggregator, FILTER, LIST, SLOT_AGGREGATOR, SLOT_FIELD_NAME, SLOT_FILTERS,
    SLOT_LABEL, SLOT_OPERATOR, SLOT_TABLE_NAME, SLOT_VALUE,
};
use crate::ast::node::Node;

/// One row of an aggregation's filter list
#[derive(Debug, Clone, PartialEq)]
pub struct FilterRow {
    pub operator: Option<String>,
    pub table_name: Option<String>,
    pub field_name: Option<String>,
    /// Compared value; `Undefined` until chosen
    pub value: Arc<Node>,
}

impl Default for FilterRow {
    fn default() -> Self {
        Self {
            operator: None,
            table_name: None,
            field_name: None,
            value: Node::undefined(),
        }
    }
}

impl FilterRow {
    pub fn new(
        operator: impl Into<String>,
        table_name: impl Into<String>,
        field_name: impl Into<String>,
        value: Arc<Node>,
    ) -> Self {
        Self {
            operator: Some(operator.into()),
            table_name: Some(table_name.into()),
            field_name: Some(field_name.into()),
            value,
        }
    }

    fn read(node: &Node) -> Self {
        Self {
            operator: slot_str(node, SLOT_OPERATOR),
            table_name: slot_str(node, SLOT_TABLE_NAME),
            field_name: slot_str(node, SLOT_FIELD_NAME),
            value: node.named(SLOT_VALUE).cloned().unwrap_or_else(Node::undefined),
        }
    }

    /// Unary filter operators (`IsEmpty`, ...) take no value
    pub fn needs_value(&self) -> bool {
        !self.operator.as_deref().is_some_and(names::is_unary_operator)
    }

    pub fn is_complete(&self) -> bool {
        self.operator.is_some()
            && self.table_name.is_some()
            && self.field_name.is_some()
            && (!self.needs_value() || !self.value.is_undefined())
    }

    pub fn to_node(&self) -> Arc<Node> {
        Node::call(
            FILTER,
            [
                (SLOT_OPERATOR, str_node(&self.operator)),
                (SLOT_TABLE_NAME, str_node(&self.table_name)),
                (SLOT_FIELD_NAME, str_node(&self.field_name)),
                (SLOT_VALUE, self.value.clone()),
            ],
        )
    }
}

/// Typed view of an `Aggregation` node
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregation {
    pub aggregator: Option<Aggregator>,
    pub table_name: Option<String>,
    pub field_name: Option<String>,
    pub label: Option<String>,
    pub filters: Vec<FilterRow>,
}

impl Aggregation {
    /// Read an aggregation node. None when the node is not an aggregation.
    ///
    /// Missing or malformed slots read as `None`; they are reported by local
    /// validation, not here.
    pub fn read(node: &Node) -> Option<Self> {
        if !node.has_name(AGGREGATION) {
            return None;
        }
        let filters: Vec<FilterRow> = node
            .named(SLOT_FILTERS)
            .map(|list| list.children.iter().map(|f| FilterRow::read(f)).collect())
            .unwrap_or_default();
        Some(Self {
            aggregator: slot_str(node, SLOT_AGGREGATOR).and_then(|s| s.parse().ok()),
            table_name: slot_str(node, SLOT_TABLE_NAME),
            field_name: slot_str(node, SLOT_FIELD_NAME),
            label: slot_str(node, SLOT_LABEL),
            filters,
        })
    }

    pub fn to_node(&self) -> Arc<Node> {
        let aggregator = match self.aggregator {
            Some(aggregator) => Node::constant(aggregator.as_str()),
            None => Node::undefined(),
        };
        let filters = Node::n_ary(LIST, self.filters.iter().map(FilterRow::to_node).collect());
        let mut slots = vec![
            (SLOT_AGGREGATOR, aggregator),
            (SLOT_TABLE_NAME, str_node(&self.table_name)),
            (SLOT_FIELD_NAME, str_node(&self.field_name)),
            (SLOT_FILTERS, filters),
        ];
        if let Some(label) = &self.label {
            slots.push((SLOT_LABEL, Node::constant(label.as_str())));
        }
        Node::call(AGGREGATION, slots)
    }

    pub fn draft(&self) -> AggregationDraft {
        AggregationDraft::new(self.clone())
    }
}

fn slot_str(node: &Node, slot: &str) -> Option<String> {
    node.named(slot)?.constant_str().map(str::to_string)
}

fn str_node(value: &Option<String>) -> Arc<Node> {
    match value {
        Some(s) => Node::constant(s.as_str()),
        None => Node::undefined(),
    }
}

// ============ Draft ============

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DraftError {
    #[error("Aggregator is required")]
    MissingAggregator,

    #[error("Table is required")]
    MissingTable,

    #[error("Field is required")]
    MissingField,

    #[error("Filter {index} is incomplete")]
    IncompleteFilter { index: usize },

    #[error("No filter at index {index}")]
    NoSuchFilter { index: usize },
}

/// Staged edits of one aggregation. Dropping the draft discards them.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationDraft {
    original: Aggregation,
    current: Aggregation,
}

impl AggregationDraft {
    pub fn new(original: Aggregation) -> Self {
        Self {
            current: original.clone(),
            original,
        }
    }

    /// Draft of a fresh aggregation with nothing chosen
    pub fn empty() -> Self {
        Self::new(Aggregation::default())
    }

    pub fn current(&self) -> &Aggregation {
        &self.current
    }

    pub fn is_modified(&self) -> bool {
        self.current != self.original
    }

    pub fn set_aggregator(&mut self, aggregator: Aggregator) -> &mut Self {
        self.current.aggregator = Some(aggregator);
        self
    }

    /// Choosing another table invalidates the chosen field
    pub fn set_table(&mut self, table_name: impl Into<String>) -> &mut Self {
        let table_name = table_name.into();
        if self.current.table_name.as_deref() != Some(table_name.as_str()) {
            self.current.field_name = None;
        }
        self.current.table_name = Some(table_name);
        self
    }

    pub fn set_field(&mut self, field_name: impl Into<String>) -> &mut Self {
        self.current.field_name = Some(field_name.into());
        self
    }

    pub fn set_label(&mut self, label: Option<String>) -> &mut Self {
        self.current.label = label.filter(|l| !l.is_empty());
        self
    }

    pub fn add_filter(&mut self, filter: FilterRow) -> &mut Self {
        self.current.filters.push(filter);
        self
    }

    pub fn update_filter(&mut self, index: usize, filter: FilterRow) -> Result<(), DraftError> {
        let slot = self
            .current
            .filters
            .get_mut(index)
            .ok_or(DraftError::NoSuchFilter { index })?;
        *slot = filter;
        Ok(())
    }

    pub fn remove_filter(&mut self, index: usize) -> Result<FilterRow, DraftError> {
        if index >= self.current.filters.len() {
            return Err(DraftError::NoSuchFilter { index });
        }
        Ok(self.current.filters.remove(index))
    }

    /// Every problem with the draft, in form order
    pub fn validate(&self) -> Vec<DraftError> {
        let mut errors = Vec::new();
        if self.current.aggregator.is_none() {
            errors.push(DraftError::MissingAggregator);
        }
        if self.current.table_name.is_none() {
            errors.push(DraftError::MissingTable);
        }
        if self.current.field_name.is_none() {
            errors.push(DraftError::MissingField);
        }
        for (index, filter) in self.current.filters.iter().enumerate() {
            if !filter.is_complete() {
                errors.push(DraftError::IncompleteFilter { index });
            }
        }
        errors
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }

    /// Build the aggregation node to write back into the tree
    pub fn commit(&self) -> Result<Arc<Node>, DraftError> {
        match self.validate().into_iter().next() {
            Some(error) => Err(error),
            None => Ok(self.current.to_node()),
        }
    }
}
