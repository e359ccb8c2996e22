//! Human-readable rendering of rule trees
//!
//! `Display` gives a single line (`amount > 1000 AND country IsInList ["FR"]`);
//! [`pretty`] breaks logical connectives one condition per line when the
//! single line exceeds a width.

use std::fmt::{self, Display};

use crate::aggregation::Aggregation;
use crate::ast::names::{
    self, CUSTOM_LIST_ACCESS, DATABASE_ACCESS, PAYLOAD, SLOT_CUSTOM_LIST_ID, SLOT_FIELD_NAME,
    SLOT_PATH, SLOT_TABLE_NAME,
};
use crate::ast::node::Node;
use crate::ast::{Constant, NodeName};

// ============ Display (single-line) ============

impl Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Null => write!(f, "null"),
            Constant::Bool(b) => write!(f, "{}", b),
            Constant::Int(n) => write!(f, "{}", n),
            Constant::Float(n) => {
                if n.is_finite() && n.fract() == 0.0 {
                    write!(f, "{n:.1}")
                } else {
                    write!(f, "{}", n)
                }
            }
            Constant::String(s) => write!(f, "\"{}\"", escape_string(s)),
            Constant::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

impl Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match &self.name {
            NodeName::Undefined => return write!(f, "_"),
            NodeName::Constant => {
                return match &self.constant {
                    Some(value) => write!(f, "{}", value),
                    None => write!(f, "null"),
                };
            }
            NodeName::Function(name) => name.as_str(),
        };

        if names::is_logical(name) {
            if self.children.is_empty() {
                return write!(f, "{}()", name);
            }
            for (i, child) in self.children.iter().enumerate() {
                if i > 0 {
                    write!(f, " {} ", name)?;
                }
                write_operand(f, child)?;
            }
            return Ok(());
        }
        if names::is_binary_operator(name) && self.children.len() == 2 {
            write_operand(f, &self.children[0])?;
            write!(f, " {} ", name)?;
            return write_operand(f, &self.children[1]);
        }
        if names::is_unary_operator(name) && self.children.len() == 1 {
            write!(f, "{} ", name)?;
            return write_operand(f, &self.children[0]);
        }
        if let Some(accessor) = accessor_label(self) {
            return write!(f, "{}", accessor);
        }
        if let Some(aggregation) = Aggregation::read(self) {
            return write_aggregation(f, &aggregation);
        }
        write_call(f, name, self)
    }
}

// Compound operands are parenthesised so grouping survives the single line
fn write_operand(f: &mut fmt::Formatter<'_>, node: &Node) -> fmt::Result {
    let compound = node.function_name().is_some_and(|name| {
        names::is_logical(name) || names::is_binary_operator(name) || names::is_unary_operator(name)
    });
    if compound {
        write!(f, "({})", node)
    } else {
        write!(f, "{}", node)
    }
}

fn accessor_label(node: &Node) -> Option<String> {
    match node.function_name()? {
        PAYLOAD => Some(format!("Payload.{}", node.child(0)?.constant_str()?)),
        DATABASE_ACCESS => {
            let slot = |key: &str| node.named(key).and_then(|n| n.constant_str());
            let mut parts = vec![slot(SLOT_TABLE_NAME)?.to_string()];
            if let Some(Constant::List(links)) = node.named(SLOT_PATH).and_then(|n| n.constant.as_ref()) {
                parts.extend(links.iter().filter_map(|l| l.as_str().map(str::to_string)));
            }
            parts.push(slot(SLOT_FIELD_NAME)?.to_string());
            Some(parts.join("."))
        }
        CUSTOM_LIST_ACCESS => Some(format!(
            "CustomList({})",
            node.named(SLOT_CUSTOM_LIST_ID)?.constant_str()?
        )),
        _ => None,
    }
}

fn write_aggregation(f: &mut fmt::Formatter<'_>, aggregation: &Aggregation) -> fmt::Result {
    let or_blank = |value: &Option<String>| value.clone().unwrap_or_else(|| "_".to_string());
    match aggregation.aggregator {
        Some(aggregator) => write!(f, "{}", aggregator)?,
        None => write!(f, "_")?,
    }
    write!(
        f,
        "({}.{}",
        or_blank(&aggregation.table_name),
        or_blank(&aggregation.field_name)
    )?;
    for (i, filter) in aggregation.filters.iter().enumerate() {
        write!(f, "{}", if i == 0 { " where " } else { ", " })?;
        write!(
            f,
            "{}.{} {}",
            or_blank(&filter.table_name),
            or_blank(&filter.field_name),
            or_blank(&filter.operator)
        )?;
        if filter.needs_value() {
            write!(f, " ")?;
            write_operand(f, &filter.value)?;
        }
    }
    write!(f, ")")
}

fn write_call(f: &mut fmt::Formatter<'_>, name: &str, node: &Node) -> fmt::Result {
    write!(f, "{}(", name)?;
    let mut first = true;
    for child in &node.children {
        if !first {
            write!(f, ", ")?;
        }
        first = false;
        write!(f, "{}", child)?;
    }
    for (key, child) in &node.named_children {
        if !first {
            write!(f, ", ")?;
        }
        first = false;
        write!(f, "{}: {}", key, child)?;
    }
    write!(f, ")")
}

fn escape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out
}

// ============ Line breaking ============

/// Render with logical connectives broken one condition per line once the
/// single-line form exceeds `width`. Nested groups are indented by two.
pub fn pretty(node: &Node, width: usize) -> String {
    let mut out = String::new();
    pretty_into(node, width, 0, &mut out);
    out
}

fn pretty_into(node: &Node, width: usize, indent: usize, out: &mut String) {
    let one_line = node.to_string();
    let logical = node.function_name().filter(|name| names::is_logical(name));
    let Some(operator) = logical else {
        out.push_str(&one_line);
        return;
    };
    if indent + one_line.len() <= width || node.children.is_empty() {
        out.push_str(&one_line);
        return;
    }

    for (i, child) in node.children.iter().enumerate() {
        if i > 0 {
            out.push('\n');
            push_indent(out, indent);
            out.push_str(operator);
            out.push(' ');
        }
        let child_logical = child.function_name().is_some_and(names::is_logical);
        if !child_logical {
            out.push_str(&child.to_string());
            continue;
        }
        let inline = format!("({})", child);
        if indent + operator.len() + 1 + inline.len() <= width {
            out.push_str(&inline);
            continue;
        }
        out.push_str("(\n");
        push_indent(out, indent + 2);
        pretty_into(child, width, indent + 2, out);
        out.push('\n');
        push_indent(out, indent);
        out.push(')');
    }
}

fn push_indent(out: &mut String, indent: usize) {
    out.extend(std::iter::repeat_n(' ', indent));
}

impl Node {
    /// Pretty print with line breaking at the given width
    pub fn pretty(&self, width: usize) -> String {
        pretty(self, width)
    }
}
