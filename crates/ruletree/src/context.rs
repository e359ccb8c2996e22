//! Read-only editing context
//!
//! Fetched by a collaborator at session start and handed to the editor: the
//! object data model, the trigger object type, the custom lists, and the
//! operator catalogue. Nothing in here changes during an edit session.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::ast::names;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum DataType {
    Bool,
    Int,
    Float,
    String,
    Timestamp,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub name: String,
    pub data_type: DataType,
    #[serde(default)]
    pub nullable: bool,
}

/// Link from one table to exactly one row of another
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkToSingle {
    pub linked_table_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    pub name: String,
    #[serde(default)]
    pub fields: IndexMap<String, Field>,
    #[serde(default)]
    pub links_to_single: IndexMap<String, LinkToSingle>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: IndexMap::new(),
            links_to_single: IndexMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        let name = name.into();
        self.fields.insert(
            name.clone(),
            Field {
                name,
                data_type,
                nullable: false,
            },
        );
        self
    }

    pub fn with_link(mut self, link_name: impl Into<String>, linked_table: impl Into<String>) -> Self {
        self.links_to_single.insert(
            link_name.into(),
            LinkToSingle {
                linked_table_name: linked_table.into(),
            },
        );
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomList {
    pub id: String,
    pub name: String,
}

/// Operators offered per node kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatorCatalogue {
    pub binary: Vec<String>,
    pub unary: Vec<String>,
    pub filter: Vec<String>,
    pub aggregators: Vec<String>,
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for OperatorCatalogue {
    fn default() -> Self {
        let mut binary = owned(names::COMPARISON_OPERATORS);
        binary.extend(owned(names::ARITHMETIC_OPERATORS));
        binary.extend(owned(names::LIST_AND_STRING_OPERATORS));
        Self {
            binary,
            unary: owned(names::UNARY_OPERATORS),
            filter: owned(names::FILTER_OPERATORS),
            aggregators: names::Aggregator::ALL
                .iter()
                .map(|a| a.as_str().to_string())
                .collect(),
        }
    }
}

impl OperatorCatalogue {
    /// Operators a node named `name` may be switched to; empty for functions
    pub fn alternatives(&self, name: &str) -> Vec<String> {
        if names::is_logical(name) {
            owned(&[names::AND, names::OR])
        } else if names::is_binary_operator(name) {
            self.binary.clone()
        } else if names::is_unary_operator(name) {
            self.unary.clone()
        } else {
            Vec::new()
        }
    }
}

/// Everything the editor may reference, fixed for one edit session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorContext {
    /// Tables by name
    #[serde(default)]
    pub data_model: IndexMap<String, Table>,
    /// Table whose rows are the trigger payload
    #[serde(default)]
    pub trigger_object: Option<String>,
    #[serde(default)]
    pub custom_lists: Vec<CustomList>,
    #[serde(default)]
    pub operators: OperatorCatalogue,
}

impl EditorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, table: Table) -> Self {
        self.data_model.insert(table.name.clone(), table);
        self
    }

    pub fn with_trigger_object(mut self, table_name: impl Into<String>) -> Self {
        self.trigger_object = Some(table_name.into());
        self
    }

    pub fn with_custom_list(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.custom_lists.push(CustomList {
            id: id.into(),
            name: name.into(),
        });
        self
    }

    /// True when no data model was provided; reference checks are skipped then
    pub fn is_empty(&self) -> bool {
        self.data_model.is_empty() && self.custom_lists.is_empty()
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.data_model.get(name)
    }

    pub fn trigger_table(&self) -> Option<&Table> {
        self.trigger_object.as_deref().and_then(|name| self.table(name))
    }

    /// Field of the trigger object read by a `Payload` accessor
    pub fn payload_field(&self, field_name: &str) -> Option<&Field> {
        self.trigger_table()?.fields.get(field_name)
    }

    /// Field reached from `table_name` by following `path` single links
    pub fn database_field(&self, table_name: &str, path: &[String], field_name: &str) -> Option<&Field> {
        let mut table = self.table(table_name)?;
        for link in path {
            let linked = table.links_to_single.get(link)?;
            table = self.table(&linked.linked_table_name)?;
        }
        table.fields.get(field_name)
    }

    pub fn custom_list(&self, id: &str) -> Option<&CustomList> {
        self.custom_lists.iter().find(|list| list.id == id)
    }
}
