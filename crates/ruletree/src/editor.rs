//! Rule tree editor
//!
//! Owns one tree for one edit session. Edits arrive as path-addressed
//! [`EditIntent`]s, are applied in order as copy-on-write rewrites, and each
//! successful edit bumps the [`Revision`]. The view model and the layout are
//! derived on demand from the current tree plus the merged validation state.
//!
//! Server validation is driven from outside: take a [`ValidationRequest`]
//! with [`Editor::begin_validation`], send it, and hand the answer back to
//! [`Editor::accept_validation`] with the revision it was issued for.
//!
//! # Example
//!
//! ```ignore
//! let mut editor = Editor::new(root, EditorConfig::default());
//! let intents = editor.intents().ok_or(EditError::ReadOnly)?;
//! let intent = intents.remove(NodePath::root().child(0)).ok_or(...)?;
//! editor.apply(intent)?;
//!
//! let request = editor.begin_validation()?;
//! let response = validator.validate(request.tree).await?;
//! editor.accept_validation(request.revision, &response);
//! ```

use std::sync::Arc;

use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::aggregation::{AggregationDraft, DraftError};
use crate::ast::NodeName;
use crate::ast::names::{self, AGGREGATION, Arity};
use crate::ast::node::Node;
use crate::classify::{Layout, LayoutKind, RootKind, classify, is_binary_shape};
use crate::context::{EditorContext, OperatorCatalogue};
use crate::path::{self, NodePath, Segment, StalePath, resolve};
use crate::transform;
use crate::validate::local::validate_local;
use crate::validate::merge::{ValidationState, ValidationStatus};
use crate::validate::response::ValidationResponse;
use crate::validate::Revision;
use crate::view::{ViewNode, build_view_model};
use crate::wire::{self, WireError, WireNode};

// ============ Configuration ============

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditorMode {
    /// Read-only: no intents are offered
    View,
    #[default]
    Edit,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub root_kind: RootKind,
    pub mode: EditorMode,
}

impl EditorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root_kind(mut self, root_kind: RootKind) -> Self {
        self.root_kind = root_kind;
        self
    }

    pub fn with_mode(mut self, mode: EditorMode) -> Self {
        self.mode = mode;
        self
    }
}

// ============ Intents ============

#[derive(Debug, Clone, PartialEq)]
pub enum EditIntent {
    /// Replace the node at `path`
    SetOperand { path: NodePath, node: Arc<Node> },
    /// Rename the operator at `path`, keeping (and conforming) its operands
    SetOperator { path: NodePath, name: String },
    /// Append an operand to the variadic node at `path`
    AppendChild { path: NodePath, node: Arc<Node> },
    Remove { path: NodePath },
    Nest { path: NodePath },
    Unnest { path: NodePath },
    AddOrBranch,
    AddAndCondition { branch: usize },
    /// Write a staged aggregation back at `path`
    CommitAggregation { path: NodePath, draft: AggregationDraft },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntentKind {
    SetOperand,
    SetOperator,
    AppendChild,
    Remove,
    Nest,
    Unnest,
    AddOrBranch,
    AddAndCondition,
    CommitAggregation,
}

impl EditIntent {
    pub fn kind(&self) -> IntentKind {
        match self {
            EditIntent::SetOperand { .. } => IntentKind::SetOperand,
            EditIntent::SetOperator { .. } => IntentKind::SetOperator,
            EditIntent::AppendChild { .. } => IntentKind::AppendChild,
            EditIntent::Remove { .. } => IntentKind::Remove,
            EditIntent::Nest { .. } => IntentKind::Nest,
            EditIntent::Unnest { .. } => IntentKind::Unnest,
            EditIntent::AddOrBranch => IntentKind::AddOrBranch,
            EditIntent::AddAndCondition { .. } => IntentKind::AddAndCondition,
            EditIntent::CommitAggregation { .. } => IntentKind::CommitAggregation,
        }
    }

    /// Node the intent is addressed to
    pub fn target(&self) -> NodePath {
        match self {
            EditIntent::SetOperand { path, .. }
            | EditIntent::SetOperator { path, .. }
            | EditIntent::AppendChild { path, .. }
            | EditIntent::Remove { path }
            | EditIntent::Nest { path }
            | EditIntent::Unnest { path }
            | EditIntent::CommitAggregation { path, .. } => path.clone(),
            EditIntent::AddOrBranch => NodePath::root(),
            EditIntent::AddAndCondition { branch } => NodePath::root().child(*branch),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EditError {
    #[error("Editor is read-only")]
    ReadOnly,

    #[error(transparent)]
    StalePath(#[from] StalePath),

    #[error("{kind:?} does not apply to the node at {path}")]
    NotApplicable { kind: IntentKind, path: NodePath },

    #[error("Invalid aggregation: {0}")]
    InvalidDraft(#[from] DraftError),
}

fn not_applicable(kind: IntentKind, path: &NodePath) -> EditError {
    EditError::NotApplicable {
        kind,
        path: path.clone(),
    }
}

/// Tree snapshot to submit for server validation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationRequest {
    pub revision: Revision,
    pub tree: WireNode,
}

// ============ Editor ============

pub struct Editor {
    config: EditorConfig,
    context: Option<Arc<EditorContext>>,
    root: Arc<Node>,
    revision: Revision,
    validation: ValidationState,
}

impl Editor {
    pub fn new(root: Arc<Node>, config: EditorConfig) -> Self {
        let mut editor = Self {
            config,
            context: None,
            root,
            revision: Revision::default(),
            validation: ValidationState::new(),
        };
        editor.refresh_local();
        editor
    }

    /// Editor over a tree in storage form
    pub fn from_json(json: &str, config: EditorConfig) -> Result<Self, WireError> {
        Ok(Self::new(wire::deserialize(json)?, config))
    }

    /// Attach the read-only editing context; references are checked against it
    pub fn with_context(mut self, context: Arc<EditorContext>) -> Self {
        self.context = Some(context);
        self.refresh_local();
        self
    }

    /// Replace the whole tree, e.g. after reloading from storage
    pub fn load(&mut self, root: Arc<Node>) -> Revision {
        self.root = root;
        self.bump();
        self.revision
    }

    pub fn root(&self) -> &Arc<Node> {
        &self.root
    }

    pub fn revision(&self) -> Revision {
        self.revision
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn context(&self) -> Option<&EditorContext> {
        self.context.as_deref()
    }

    pub fn set_mode(&mut self, mode: EditorMode) {
        self.config.mode = mode;
    }

    pub fn to_json(&self) -> Result<String, WireError> {
        wire::serialize(&self.root)
    }

    /// Overlay of the current tree with merged annotations
    pub fn view(&self) -> ViewNode {
        build_view_model(
            &self.root,
            &self.validation.merged_errors(),
            &self.validation.evaluations(),
        )
    }

    pub fn layout(&self) -> Layout {
        classify(&self.root, &NodePath::root())
    }

    /// Layout of the node at `path`, None when stale
    pub fn layout_at(&self, path: &NodePath) -> Option<Layout> {
        resolve(&self.root, path).map(|node| classify(node, path))
    }

    /// Intent capability; None in view mode
    pub fn intents(&self) -> Option<IntentBuilder<'_>> {
        match self.config.mode {
            EditorMode::Edit => Some(IntentBuilder { editor: self }),
            EditorMode::View => None,
        }
    }

    /// Apply one edit. On success the tree has a new revision and the local
    /// errors are recomputed; on failure nothing changes.
    pub fn apply(&mut self, intent: EditIntent) -> Result<Revision, EditError> {
        if self.config.mode == EditorMode::View {
            return Err(EditError::ReadOnly);
        }
        let kind = intent.kind();
        let target = intent.target();
        let root = match self.reduce(intent) {
            Ok(root) => root,
            Err(EditError::StalePath(stale)) => {
                debug!("Stale path {} for {:?}, view must be rebuilt", stale.path, kind);
                return Err(EditError::StalePath(stale));
            }
            Err(e) => return Err(e),
        };
        self.root = root;
        self.bump();
        debug!("Applied {:?} at {} -> {}", kind, target, self.revision);
        Ok(self.revision)
    }

    fn bump(&mut self) {
        self.revision = self.revision.next();
        self.refresh_local();
    }

    fn refresh_local(&mut self) {
        let errors = validate_local(&self.root, self.config.root_kind, self.context.as_deref());
        self.validation.set_current(self.revision, &self.root, errors);
    }

    fn reduce(&self, intent: EditIntent) -> Result<Arc<Node>, EditError> {
        let root = &self.root;
        match intent {
            EditIntent::SetOperand { path, node } => Ok(path::set_at(root, &path, node)?),
            EditIntent::SetOperator { path, name } => path::update_at(root, &path, |node: &Arc<Node>| {
                if !matches!(node.name, NodeName::Function(_)) {
                    return Err(not_applicable(IntentKind::SetOperator, &path));
                }
                Ok(with_operator(node, &name))
            }),
            EditIntent::AppendChild { path, node } => {
                let parent = resolve(root, &path).ok_or_else(|| StalePath { path: path.clone() })?;
                if !is_variadic(parent) {
                    return Err(not_applicable(IntentKind::AppendChild, &path));
                }
                Ok(path::append_child(root, &path, node)?)
            }
            EditIntent::Remove { path } => {
                if self.layout().kind() == LayoutKind::RootOrOfAnd {
                    Ok(transform::remove_condition(root, &path)?)
                } else {
                    Ok(path::remove_at(root, &path)?)
                }
            }
            EditIntent::Nest { path } => path::update_at(root, &path, |node: &Arc<Node>| {
                transform::nest(node).ok_or_else(|| not_applicable(IntentKind::Nest, &path))
            }),
            EditIntent::Unnest { path } => path::update_at(root, &path, |node: &Arc<Node>| {
                transform::unnest(node).ok_or_else(|| not_applicable(IntentKind::Unnest, &path))
            }),
            EditIntent::AddOrBranch => transform::add_or_branch(root)
                .ok_or_else(|| not_applicable(IntentKind::AddOrBranch, &NodePath::root())),
            EditIntent::AddAndCondition { branch } => transform::add_and_condition(root, branch)
                .ok_or_else(|| not_applicable(IntentKind::AddAndCondition, &NodePath::root().child(branch))),
            EditIntent::CommitAggregation { path, draft } => {
                let node = draft.commit()?;
                Ok(path::set_at(root, &path, node)?)
            }
        }
    }

    // ============ Validation ============

    /// Snapshot of the current tree for the validator; marks it pending.
    ///
    /// A tree with no wire form counts as a failed request.
    pub fn begin_validation(&mut self) -> Result<ValidationRequest, WireError> {
        self.validation.mark_pending(self.revision);
        match wire::to_wire(&self.root) {
            Ok(tree) => Ok(ValidationRequest {
                revision: self.revision,
                tree,
            }),
            Err(e) => {
                self.validation.record_failure(self.revision);
                Err(e)
            }
        }
    }

    /// Merge a response for the tree at `revision`. False when dropped as stale.
    pub fn accept_validation(&mut self, revision: Revision, response: &ValidationResponse) -> bool {
        self.validation.accept(revision, response)
    }

    /// The request for `revision` failed; last-known annotations stay.
    /// False when a newer tree has been sent or merged since.
    pub fn validation_failed(&mut self, revision: Revision) -> bool {
        self.validation.record_failure(revision)
    }

    pub fn validation(&self) -> &ValidationState {
        &self.validation
    }

    pub fn status(&self) -> ValidationStatus {
        self.validation.status()
    }

    pub fn can_save(&self) -> bool {
        self.validation.can_save()
    }

    /// Has the tree changed structurally since `saved`
    pub fn is_dirty(&self, saved: &Node) -> bool {
        *self.root != *saved
    }
}

fn is_variadic(node: &Node) -> bool {
    node.function_name()
        .is_some_and(|name| names::arity(name) == Arity::Variadic)
}

/// Rename keeping operands; operands are padded with placeholders or
/// truncated when the new operator has a different fixed arity
fn with_operator(node: &Node, name: &str) -> Arc<Node> {
    let mut copy = node.clone();
    copy.name = NodeName::function(name);
    if let Arity::Fixed(n) = names::arity(name) {
        copy.children.truncate(n);
        while copy.children.len() < n {
            copy.children.push(Node::undefined());
        }
    }
    Arc::new(copy)
}

// ============ Capability ============

/// Hands out the intents that apply to a node. Only exists in edit mode.
pub struct IntentBuilder<'a> {
    editor: &'a Editor,
}

impl IntentBuilder<'_> {
    /// Intents applicable to the node at `path`; empty when stale
    pub fn offered(&self, path: &NodePath) -> Vec<IntentKind> {
        let root = &self.editor.root;
        let Some(node) = resolve(root, path) else {
            return Vec::new();
        };
        let mut kinds = vec![IntentKind::SetOperand, IntentKind::Remove];
        if let Some(name) = node.function_name()
            && (names::is_logical(name) || names::is_binary_operator(name) || names::is_unary_operator(name))
        {
            kinds.push(IntentKind::SetOperator);
        }
        if is_variadic(node) {
            kinds.push(IntentKind::AppendChild);
        }
        if is_binary_shape(node) {
            kinds.push(IntentKind::Nest);
            if is_binary_shape(&node.children[1]) {
                kinds.push(IntentKind::Unnest);
            }
        }
        if node.has_name(AGGREGATION) || node.is_undefined() {
            kinds.push(IntentKind::CommitAggregation);
        }
        if self.editor.layout().kind() == LayoutKind::RootOrOfAnd {
            match path.segments() {
                [] => kinds.push(IntentKind::AddOrBranch),
                [Segment::Child(_)] => kinds.push(IntentKind::AddAndCondition),
                _ => {}
            }
        }
        kinds
    }

    fn offers(&self, path: &NodePath, kind: IntentKind) -> bool {
        self.offered(path).contains(&kind)
    }

    pub fn set_operand(&self, path: NodePath, node: Arc<Node>) -> Option<EditIntent> {
        self.offers(&path, IntentKind::SetOperand)
            .then_some(EditIntent::SetOperand { path, node })
    }

    /// Operators the node at `path` may be switched to, from the context's
    /// catalogue (the built-in one without a context)
    pub fn operator_choices(&self, path: &NodePath) -> Vec<String> {
        let Some(name) = resolve(&self.editor.root, path).and_then(|node| node.function_name()) else {
            return Vec::new();
        };
        match self.editor.context() {
            Some(context) => context.operators.alternatives(name),
            None => OperatorCatalogue::default().alternatives(name),
        }
    }

    pub fn set_operator(&self, path: NodePath, name: impl Into<String>) -> Option<EditIntent> {
        let name = name.into();
        let allowed = self.offers(&path, IntentKind::SetOperator) && self.operator_choices(&path).contains(&name);
        allowed.then_some(EditIntent::SetOperator { path, name })
    }

    pub fn append_child(&self, path: NodePath, node: Arc<Node>) -> Option<EditIntent> {
        self.offers(&path, IntentKind::AppendChild)
            .then_some(EditIntent::AppendChild { path, node })
    }

    pub fn remove(&self, path: NodePath) -> Option<EditIntent> {
        self.offers(&path, IntentKind::Remove)
            .then_some(EditIntent::Remove { path })
    }

    pub fn nest(&self, path: NodePath) -> Option<EditIntent> {
        self.offers(&path, IntentKind::Nest)
            .then_some(EditIntent::Nest { path })
    }

    pub fn unnest(&self, path: NodePath) -> Option<EditIntent> {
        self.offers(&path, IntentKind::Unnest)
            .then_some(EditIntent::Unnest { path })
    }

    pub fn add_or_branch(&self) -> Option<EditIntent> {
        self.offers(&NodePath::root(), IntentKind::AddOrBranch)
            .then_some(EditIntent::AddOrBranch)
    }

    pub fn add_and_condition(&self, branch: usize) -> Option<EditIntent> {
        self.offers(&NodePath::root().child(branch), IntentKind::AddAndCondition)
            .then_some(EditIntent::AddAndCondition { branch })
    }

    pub fn commit_aggregation(&self, path: NodePath, draft: AggregationDraft) -> Option<EditIntent> {
        self.offers(&path, IntentKind::CommitAggregation)
            .then_some(EditIntent::CommitAggregation { path, draft })
    }
}
