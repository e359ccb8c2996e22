//! Merge of local structural errors with server annotations
//!
//! Local errors are recomputed on every edit and always come first at a
//! path. Server annotations are replaced wholesale by each accepted
//! response; a response only replaces them when its revision is at least
//! the revision of what is currently merged, so a slow reply for an old
//! tree can never overwrite a newer one.
//!
//! Server annotations are pinned to the node ids of the tree they were
//! computed on. After an edit an annotation is shown only while the node at
//! its path is still the same node, so renumbered siblings never pick up
//! each other's errors.

use std::collections::BTreeMap;
use std::sync::Arc;

use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};

use super::response::{ServerAnnotations, ValidationResponse};
use super::{EvaluationError, NodeEvaluation, PathErrors, PathEvaluations, Revision};
use crate::ast::NodeId;
use crate::ast::node::Node;
use crate::path::{NodePath, resolve};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    /// Nothing requested for the current tree yet
    Idle,
    /// A request for a newer tree than the merged one is in flight
    Pending,
    /// Server annotations match the current tree
    Validated,
    /// The latest request failed; last-known annotations are kept
    Failed,
}

#[derive(Debug, Clone)]
struct MergedServer {
    revision: Revision,
    annotations: ServerAnnotations,
    /// Node id at each annotated path in the tree that was validated
    anchors: IndexMap<NodePath, NodeId>,
}

impl MergedServer {
    fn new(revision: Revision, annotations: ServerAnnotations, tree: &Arc<Node>) -> Self {
        let anchors = annotations
            .errors
            .keys()
            .chain(annotations.evaluations.keys())
            .filter_map(|path| resolve(tree, path).map(|node| (path.clone(), node.id)))
            .collect();
        Self {
            revision,
            annotations,
            anchors,
        }
    }

    /// Annotations whose node is still at the same path in `root`
    fn anchored_to(&self, root: &Arc<Node>) -> ServerAnnotations {
        let same_node = |path: &NodePath| {
            self.anchors
                .get(path)
                .is_some_and(|id| resolve(root, path).is_some_and(|node| node.id == *id))
        };
        ServerAnnotations {
            errors: self
                .annotations
                .errors
                .iter()
                .filter(|&(path, _)| same_node(path))
                .map(|(path, errors)| (path.clone(), errors.clone()))
                .collect(),
            evaluations: self
                .annotations
                .evaluations
                .iter()
                .filter(|&(path, _)| same_node(path))
                .map(|(path, evaluation)| (path.clone(), evaluation.clone()))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ValidationState {
    current: Revision,
    root: Option<Arc<Node>>,
    local: PathErrors,
    requested: Option<Revision>,
    failed: Option<Revision>,
    /// Trees sent for validation and not yet answered
    submitted: BTreeMap<Revision, Arc<Node>>,
    server: Option<MergedServer>,
    /// Merged server annotations that still apply to the current tree
    visible: ServerAnnotations,
}

impl ValidationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `root` at `revision` the current tree, with its local errors
    pub fn set_current(&mut self, revision: Revision, root: &Arc<Node>, errors: PathErrors) {
        self.current = revision;
        self.root = Some(root.clone());
        self.local = errors;
        self.refresh_visible();
    }

    pub fn current(&self) -> Revision {
        self.current
    }

    pub fn local(&self) -> &PathErrors {
        &self.local
    }

    /// A request for the tree at `revision` was issued. The current tree is
    /// kept until its answer arrives.
    pub fn mark_pending(&mut self, revision: Revision) {
        if self.requested.is_none_or(|r| revision > r) {
            self.requested = Some(revision);
        }
        if revision == self.current
            && let Some(root) = &self.root
        {
            self.submitted.insert(revision, root.clone());
        }
    }

    /// Merge a server response for the tree at `revision`.
    ///
    /// Returns false, leaving the state untouched, when a response for a
    /// newer revision is already merged or the tree at `revision` is unknown.
    pub fn accept(&mut self, revision: Revision, response: &ValidationResponse) -> bool {
        if self.is_superseded(revision) {
            debug!(
                "Dropping validation response for {} (merged {:?})",
                revision,
                self.server_revision()
            );
            return false;
        }
        let tree = match self.submitted.get(&revision) {
            Some(tree) => tree.clone(),
            None => match &self.root {
                Some(root) if revision == self.current => root.clone(),
                _ => {
                    debug!("Dropping validation response for unknown tree {}", revision);
                    return false;
                }
            },
        };
        self.server = Some(MergedServer::new(revision, response.annotations(), &tree));
        self.submitted.retain(|r, _| *r > revision);
        if self.failed.is_some_and(|f| f <= revision) {
            self.failed = None;
        }
        self.refresh_visible();
        true
    }

    /// The request for `revision` failed in transport. Known annotations stay.
    ///
    /// Returns false without recording anything when an answer for
    /// `revision` or a newer tree is already merged, or a newer tree has
    /// been sent since.
    pub fn record_failure(&mut self, revision: Revision) -> bool {
        self.submitted.remove(&revision);
        let superseded = self.server_revision().is_some_and(|merged| merged >= revision)
            || self.requested.is_some_and(|requested| requested > revision);
        if superseded {
            debug!("Ignoring transport failure for superseded {}", revision);
            return false;
        }
        if self.failed.is_none_or(|f| revision > f) {
            self.failed = Some(revision);
        }
        true
    }

    /// An answer for a newer tree than `revision` is already merged
    pub fn is_superseded(&self, revision: Revision) -> bool {
        self.server_revision().is_some_and(|merged| revision < merged)
    }

    fn refresh_visible(&mut self) {
        self.visible = match (&self.server, &self.root) {
            (Some(merged), Some(root)) => merged.anchored_to(root),
            _ => ServerAnnotations::default(),
        };
    }

    /// Revision of the merged server annotations, if any
    pub fn server_revision(&self) -> Option<Revision> {
        self.server.as_ref().map(|s| s.revision)
    }

    /// Everything the merged response reported, for the tree it was computed on
    pub fn server_annotations(&self) -> Option<&ServerAnnotations> {
        self.server.as_ref().map(|s| &s.annotations)
    }

    /// Merged server annotations whose node is still where it was validated
    pub fn visible_annotations(&self) -> &ServerAnnotations {
        &self.visible
    }

    pub fn status(&self) -> ValidationStatus {
        if self.server_revision() == Some(self.current) {
            return ValidationStatus::Validated;
        }
        let Some(requested) = self.requested else {
            return ValidationStatus::Idle;
        };
        if self.failed.is_some_and(|f| f >= requested) {
            return ValidationStatus::Failed;
        }
        if self.server_revision().is_none_or(|s| s < requested) {
            ValidationStatus::Pending
        } else {
            ValidationStatus::Idle
        }
    }

    /// Errors at one path: local errors, then server errors
    pub fn errors_at(&self, path: &NodePath) -> Vec<EvaluationError> {
        let mut errors = self.local.get(path).cloned().unwrap_or_default();
        if let Some(remote) = self.visible.errors.get(path) {
            errors.extend(remote.iter().cloned());
        }
        errors
    }

    /// Every annotated path with its merged error list
    pub fn merged_errors(&self) -> PathErrors {
        let mut merged = self.local.clone();
        for (path, remote) in &self.visible.errors {
            merged
                .entry(path.clone())
                .or_default()
                .extend(remote.iter().cloned());
        }
        merged
    }

    pub fn evaluations(&self) -> PathEvaluations {
        self.visible.evaluations.clone()
    }

    pub fn evaluation_at(&self, path: &NodePath) -> Option<&NodeEvaluation> {
        self.visible.evaluations.get(path)
    }

    pub fn has_local_errors(&self) -> bool {
        self.local.values().any(|errors| !errors.is_empty())
    }

    /// Saving needs a clean local tree and a clean server answer for exactly
    /// the current revision
    pub fn can_save(&self) -> bool {
        if self.has_local_errors() {
            return false;
        }
        match &self.server {
            Some(merged) => merged.revision == self.current && merged.annotations.error_count() == 0,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::names::{AND, GREATER, IS_IN_LIST};
    use crate::path;
    use crate::validate::ErrorCode;
    use crate::validate::response::PathError;

    fn error(code: ErrorCode) -> EvaluationError {
        EvaluationError::new(code)
    }

    fn response_with(path: &str, code: ErrorCode) -> ValidationResponse {
        ValidationResponse {
            errors: vec![PathError {
                path: path.to_string(),
                error: error(code),
            }],
            evaluation: Vec::new(),
        }
    }

    fn tree() -> Arc<Node> {
        Node::n_ary(
            AND,
            vec![
                Node::binary(GREATER, Node::payload("amount"), Node::constant(1000)),
                Node::binary(IS_IN_LIST, Node::payload("country"), Node::constant(vec!["FR"])),
            ],
        )
    }

    fn state_at(revision: Revision, root: &Arc<Node>) -> ValidationState {
        let mut state = ValidationState::new();
        state.set_current(revision, root, PathErrors::new());
        state
    }

    #[test]
    fn local_errors_come_first() {
        let root = tree();
        let path = NodePath::root().child(0);
        let mut state = ValidationState::new();
        let mut local = PathErrors::new();
        local.insert(path.clone(), vec![error(ErrorCode::ArgumentRequired)]);
        state.set_current(Revision(1), &root, local);
        state.mark_pending(Revision(1));
        assert!(state.accept(
            Revision(1),
            &response_with("root.children.0", ErrorCode::ArgumentMustBeBoolean)
        ));

        let codes: Vec<ErrorCode> = state.errors_at(&path).into_iter().map(|e| e.code).collect();
        assert_eq!(codes, [ErrorCode::ArgumentRequired, ErrorCode::ArgumentMustBeBoolean]);
        assert_eq!(state.merged_errors()[&path].len(), 2);
    }

    #[test]
    fn older_response_is_dropped() {
        let mut state = state_at(Revision(2), &tree());
        assert!(state.accept(Revision(2), &ValidationResponse::default()));
        assert!(!state.accept(
            Revision(1),
            &response_with("root", ErrorCode::UnexpectedError)
        ));
        assert_eq!(state.server_revision(), Some(Revision(2)));
        assert!(state.errors_at(&NodePath::root()).is_empty());
    }

    #[test]
    fn equal_revision_replaces_merged_state() {
        let mut state = state_at(Revision(1), &tree());
        assert!(state.accept(Revision(1), &response_with("root", ErrorCode::UnexpectedError)));
        assert!(state.accept(Revision(1), &ValidationResponse::default()));
        assert!(state.errors_at(&NodePath::root()).is_empty());
    }

    #[test]
    fn response_for_an_unsent_tree_is_dropped() {
        let mut state = state_at(Revision(3), &tree());
        assert!(!state.accept(Revision(2), &response_with("root", ErrorCode::UnexpectedError)));
        assert_eq!(state.server_revision(), None);
    }

    #[test]
    fn status_transitions() {
        let root = tree();
        let mut state = ValidationState::new();
        assert_eq!(state.status(), ValidationStatus::Idle);

        state.set_current(Revision(1), &root, PathErrors::new());
        state.mark_pending(Revision(1));
        assert_eq!(state.status(), ValidationStatus::Pending);

        state.accept(Revision(1), &ValidationResponse::default());
        assert_eq!(state.status(), ValidationStatus::Validated);
        assert!(state.can_save());

        state.set_current(Revision(2), &root, PathErrors::new());
        assert!(!state.can_save());
        state.mark_pending(Revision(2));
        assert!(state.record_failure(Revision(2)));
        assert_eq!(state.status(), ValidationStatus::Failed);
    }

    #[test]
    fn failure_keeps_last_known_errors() {
        let root = tree();
        let mut state = state_at(Revision(1), &root);
        state.accept(Revision(1), &response_with("root", ErrorCode::UnexpectedError));
        state.set_current(Revision(2), &root, PathErrors::new());
        state.mark_pending(Revision(2));
        state.record_failure(Revision(2));
        assert_eq!(state.errors_at(&NodePath::root()).len(), 1);
    }

    #[test]
    fn failure_for_a_superseded_tree_is_ignored() {
        let root = tree();
        let mut state = state_at(Revision(1), &root);
        state.mark_pending(Revision(1));
        state.set_current(Revision(2), &root, PathErrors::new());
        state.mark_pending(Revision(2));
        assert!(state.accept(Revision(2), &ValidationResponse::default()));

        assert!(!state.record_failure(Revision(1)));
        assert_eq!(state.status(), ValidationStatus::Validated);
        assert!(state.can_save());
    }

    #[test]
    fn failure_while_a_newer_tree_is_in_flight_is_ignored() {
        let root = tree();
        let mut state = state_at(Revision(1), &root);
        state.mark_pending(Revision(1));
        state.set_current(Revision(2), &root, PathErrors::new());
        state.mark_pending(Revision(2));

        assert!(!state.record_failure(Revision(1)));
        assert_eq!(state.status(), ValidationStatus::Pending);
    }

    #[test]
    fn annotations_follow_node_identity() {
        let before = tree();
        let mut state = state_at(Revision(1), &before);
        state.mark_pending(Revision(1));
        let response = ValidationResponse {
            errors: vec![
                PathError {
                    path: "root.children.0".to_string(),
                    error: error(ErrorCode::PayloadFieldNotFound),
                },
                PathError {
                    path: "root".to_string(),
                    error: error(ErrorCode::UnexpectedError),
                },
            ],
            evaluation: Vec::new(),
        };
        assert!(state.accept(Revision(1), &response));

        // Removing the first condition moves the second one to its path
        let after = path::remove_at(&before, &NodePath::root().child(0)).unwrap();
        state.set_current(Revision(2), &after, PathErrors::new());

        assert!(state.errors_at(&NodePath::root().child(0)).is_empty());
        assert!(!state.merged_errors().contains_key(&NodePath::root().child(0)));
        // The root was copied on write and is still the same node
        assert_eq!(state.errors_at(&NodePath::root()).len(), 1);
        assert_eq!(state.server_annotations().map(ServerAnnotations::error_count), Some(2));
    }

    #[test]
    fn server_errors_block_save() {
        let mut state = state_at(Revision(1), &tree());
        state.accept(Revision(1), &response_with("root", ErrorCode::FormulaIncorrectReturnType));
        assert_eq!(state.status(), ValidationStatus::Validated);
        assert!(!state.can_save());
    }
}
