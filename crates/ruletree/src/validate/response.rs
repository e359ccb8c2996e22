//! Server validation response
//!
//! The validation endpoint annotates nodes by dotted path. It may answer in
//! the flat form (`errors` / `evaluation` lists) or hand back the evaluation
//! as a tree mirroring the submitted expression; [`flatten_evaluation`]
//! brings the latter into the flat form.

use indexmap::IndexMap;
use log::warn;
use serde::{Deserialize, Serialize};

use super::{EvaluationError, NodeEvaluation, PathErrors, PathEvaluations};
use crate::path::NodePath;

/// One error entry: `{"path": "root.children.0", "error": "ARGUMENT_REQUIRED", ...}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathError {
    pub path: String,
    #[serde(flatten)]
    pub error: EvaluationError,
}

/// One evaluation entry: `{"path": "root", "returnValue": true, "errors": []}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathEvaluation {
    pub path: String,
    #[serde(flatten)]
    pub evaluation: NodeEvaluation,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationResponse {
    #[serde(default)]
    pub errors: Vec<PathError>,
    #[serde(default)]
    pub evaluation: Vec<PathEvaluation>,
}

/// Nested evaluation, shaped like the expression it was computed on
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationTree {
    #[serde(default)]
    pub return_value: Option<serde_json::Value>,
    #[serde(default)]
    pub errors: Vec<EvaluationError>,
    #[serde(default)]
    pub children: Vec<EvaluationTree>,
    #[serde(default)]
    pub named_children: IndexMap<String, EvaluationTree>,
}

/// Server annotations with their paths parsed, ready to merge
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServerAnnotations {
    pub errors: PathErrors,
    pub evaluations: PathEvaluations,
}

impl ServerAnnotations {
    pub fn error_count(&self) -> usize {
        self.errors.values().map(Vec::len).sum()
    }
}

impl ValidationResponse {
    /// Response built from a nested evaluation tree: every node error becomes
    /// an error entry, every node becomes an evaluation entry carrying its
    /// return value.
    pub fn from_evaluation_tree(tree: &EvaluationTree) -> Self {
        let mut response = Self::default();
        for (path, evaluation) in flatten_evaluation(tree) {
            let path = path.to_string();
            response.errors.extend(evaluation.errors.iter().map(|error| PathError {
                path: path.clone(),
                error: error.clone(),
            }));
            response.evaluation.push(PathEvaluation {
                path,
                evaluation: NodeEvaluation {
                    return_value: evaluation.return_value,
                    errors: Vec::new(),
                },
            });
        }
        response
    }

    /// Parse every entry's path. Entries with a malformed path are dropped
    /// with a warning; the rest of the response still applies.
    ///
    /// Errors reported inside evaluation entries join the error list of
    /// their path, unless the flat list already carries them.
    pub fn annotations(&self) -> ServerAnnotations {
        let mut annotations = ServerAnnotations::default();
        for entry in &self.errors {
            let Some(path) = parse_entry_path(&entry.path) else {
                continue;
            };
            annotations
                .errors
                .entry(path)
                .or_default()
                .push(entry.error.clone());
        }
        for entry in &self.evaluation {
            let Some(path) = parse_entry_path(&entry.path) else {
                continue;
            };
            if !entry.evaluation.errors.is_empty() {
                let errors = annotations.errors.entry(path.clone()).or_default();
                for error in &entry.evaluation.errors {
                    if !errors.contains(error) {
                        errors.push(error.clone());
                    }
                }
            }
            annotations.evaluations.insert(path, entry.evaluation.clone());
        }
        annotations
    }
}

fn parse_entry_path(raw: &str) -> Option<NodePath> {
    match raw.parse::<NodePath>() {
        Ok(path) => Some(path),
        Err(e) => {
            warn!("Dropping validation entry with malformed path: {}", e);
            None
        }
    }
}

/// Flatten a nested evaluation tree into path-keyed entries, pre-order
pub fn flatten_evaluation(tree: &EvaluationTree) -> PathEvaluations {
    let mut out = IndexMap::new();
    flatten_into(tree, NodePath::root(), &mut out);
    out
}

fn flatten_into(tree: &EvaluationTree, path: NodePath, out: &mut PathEvaluations) {
    out.insert(
        path.clone(),
        NodeEvaluation {
            return_value: tree.return_value.clone(),
            errors: tree.errors.clone(),
        },
    );
    for (index, child) in tree.children.iter().enumerate() {
        flatten_into(child, path.child(index), out);
    }
    for (key, child) in &tree.named_children {
        flatten_into(child, path.named(key), out);
    }
}
