//! ruletree - editing core for rule expression trees
//!
//! Fraud rules and trigger conditions are stored as expression trees of
//! operators, accessors, literals and aggregations. This crate holds the
//! editable representation: the node model, typed paths with copy-on-write
//! edits, structural classification into editing layouts, local validation,
//! and the merge of server validation results onto the tree.
//!
//! ## Quick Start
//!
//! ```ignore
//! use ruletree::{Editor, EditorConfig, EditIntent, Node, NodePath, RootKind};
//! use ruletree::names::{AND, GREATER};
//!
//! let root = Node::n_ary(AND, vec![
//!     Node::binary(GREATER, Node::payload("amount"), Node::constant(1000)),
//! ]);
//! let mut editor = Editor::new(root, EditorConfig::new().with_root_kind(RootKind::Trigger));
//!
//! editor.apply(EditIntent::Remove { path: NodePath::root().child(0) })?;
//!
//! // Hand the snapshot to the validator, merge the answer back
//! let request = editor.begin_validation()?;
//! editor.accept_validation(request.revision, &response);
//!
//! let view = editor.view();
//! ```
//!
//! ## Layouts
//!
//! - Root-Or-of-And: `OR` root whose children are all `AND` groups
//! - Root-And: `AND` root, one condition per child
//! - Binary line: `left <op> right`, optionally nested to the right
//! - Aggregation call: edited through a staged draft
//! - Generic: one opaque operand
//!
//! The asynchronous side (debounced revalidation, stale-response filtering
//! over a real transport) lives in the `ruletree-session` crate.

pub mod aggregation;
pub mod ast;
pub mod classify;
pub mod context;
pub mod editor;
pub mod operand;
pub mod parse;
pub mod path;
pub mod pretty;
pub mod transform;
pub mod validate;
pub mod view;
pub mod wire;

use thiserror::Error;

// ============ Primary Public API ============

pub use ast::node::Node;
pub use ast::{Constant, NodeId, NodeName, names};
pub use classify::{Layout, LayoutKind, RootKind, classify};
pub use context::EditorContext;
pub use editor::{EditError, EditIntent, Editor, EditorConfig, EditorMode, IntentBuilder, ValidationRequest};
pub use path::{NodePath, Segment, StalePath};
pub use validate::merge::ValidationStatus;
pub use validate::response::ValidationResponse;
pub use validate::{ErrorCode, EvaluationError, NodeEvaluation, Revision};
pub use view::{ViewNode, build_view_model};
pub use wire::{WireError, WireNode};

// ============ Errors ============

#[derive(Error, Debug)]
pub enum RuletreeError {
    #[error("Path error: {0}")]
    Path(#[from] parse::PathParseError),
    #[error("Stale path: {0}")]
    Stale(#[from] StalePath),
    #[error("Wire error: {0}")]
    Wire(#[from] WireError),
    #[error("Edit error: {0}")]
    Edit(#[from] EditError),
}

pub use parse::PathParseError;

/// Parse a stored tree, apply one edit addressed by a dotted path, and
/// serialize the result. `intent` builds the edit from the parsed path.
pub fn apply_to_json(
    json: &str,
    config: EditorConfig,
    path: &str,
    intent: impl FnOnce(NodePath) -> EditIntent,
) -> Result<String, RuletreeError> {
    let path: NodePath = path.parse()?;
    let mut editor = Editor::from_json(json, config)?;
    editor.apply(intent(path))?;
    Ok(editor.to_json()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_to_json_removes_condition() {
        let json = r#"{"name": "AND", "children": [
            {"name": ">", "children": [{"name": "Payload", "children": [{"constant": "amount"}]}, {"constant": 1}]},
            {"name": "IsEmpty", "children": [{"name": "Payload", "children": [{"constant": "label"}]}]}
        ]}"#;
        let out = apply_to_json(
            json,
            EditorConfig::new().with_root_kind(RootKind::Trigger),
            "root.children.0",
            |path| EditIntent::Remove { path },
        )
        .unwrap();
        let tree = wire::deserialize(&out).unwrap();
        assert_eq!(tree.children.len(), 1);
        assert!(tree.children[0].has_name(names::IS_EMPTY));
    }

    #[test]
    fn errors_convert_into_crate_error() {
        let err = apply_to_json("{}", EditorConfig::new(), "nope", |path| EditIntent::Remove { path })
            .unwrap_err();
        assert!(matches!(err, RuletreeError::Path(_)));

        let err = apply_to_json(
            r#"{"name": "AND"}"#,
            EditorConfig::new(),
            "root",
            |path| EditIntent::Nest { path },
        )
        .unwrap_err();
        assert!(matches!(err, RuletreeError::Edit(EditError::NotApplicable { .. })));
    }
}
