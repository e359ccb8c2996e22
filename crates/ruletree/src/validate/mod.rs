//! Validation: local structural checks, server responses, and their merge
//!
//! - `local`: synchronous tree-shape checks, computed on every edit
//! - `response`: the path-keyed shape the validation endpoint returns
//! - `merge`: per-path combination of both, with stale-response rejection

pub mod local;
pub mod merge;
pub mod response;

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::path::NodePath;

/// Errors keyed by the path of the node they belong to, in tree order
pub type PathErrors = IndexMap<NodePath, Vec<EvaluationError>>;

/// Server evaluation keyed by node path
pub type PathEvaluations = IndexMap<NodePath, NodeEvaluation>;

/// Reason code of a validation error.
///
/// Serialized with the engine's SCREAMING_SNAKE_CASE names. Codes this crate
/// does not know are kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ErrorCode {
    UnexpectedError,
    UndefinedFunction,
    WrongNumberOfArguments,
    MissingNamedArgument,
    ArgumentsMustBeIntOrFloat,
    ArgumentMustBeInteger,
    ArgumentMustBeString,
    ArgumentMustBeBoolean,
    ArgumentMustBeList,
    ArgumentMustBeTime,
    ArgumentRequired,
    ArgumentInvalidType,
    ListNotFound,
    DatabaseAccessNotFound,
    PayloadFieldNotFound,
    FormulaIncorrectReturnType,
    RootShapeUnresolved,
    Other(String),
}

const KNOWN_CODES: &[(ErrorCode, &str)] = &[
    (ErrorCode::UnexpectedError, "UNEXPECTED_ERROR"),
    (ErrorCode::UndefinedFunction, "UNDEFINED_FUNCTION"),
    (ErrorCode::WrongNumberOfArguments, "WRONG_NUMBER_OF_ARGUMENTS"),
    (ErrorCode::MissingNamedArgument, "MISSING_NAMED_ARGUMENT"),
    (ErrorCode::ArgumentsMustBeIntOrFloat, "ARGUMENTS_MUST_BE_INT_OR_FLOAT"),
    (ErrorCode::ArgumentMustBeInteger, "ARGUMENT_MUST_BE_INTEGER"),
    (ErrorCode::ArgumentMustBeString, "ARGUMENT_MUST_BE_STRING"),
    (ErrorCode::ArgumentMustBeBoolean, "ARGUMENT_MUST_BE_BOOLEAN"),
    (ErrorCode::ArgumentMustBeList, "ARGUMENT_MUST_BE_LIST"),
    (ErrorCode::ArgumentMustBeTime, "ARGUMENT_MUST_BE_TIME"),
    (ErrorCode::ArgumentRequired, "ARGUMENT_REQUIRED"),
    (ErrorCode::ArgumentInvalidType, "ARGUMENT_INVALID_TYPE"),
    (ErrorCode::ListNotFound, "LIST_NOT_FOUND"),
    (ErrorCode::DatabaseAccessNotFound, "DATABASE_ACCESS_NOT_FOUND"),
    (ErrorCode::PayloadFieldNotFound, "PAYLOAD_FIELD_NOT_FOUND"),
    (ErrorCode::FormulaIncorrectReturnType, "FORMULA_INCORRECT_RETURN_TYPE"),
    (ErrorCode::RootShapeUnresolved, "ROOT_SHAPE_UNRESOLVED"),
];

impl ErrorCode {
    pub fn as_str(&self) -> &str {
        if let ErrorCode::Other(code) = self {
            return code;
        }
        KNOWN_CODES
            .iter()
            .find(|(known, _)| known == self)
            .map_or("UNEXPECTED_ERROR", |(_, name)| name)
    }
}

impl From<String> for ErrorCode {
    fn from(s: String) -> Self {
        KNOWN_CODES
            .iter()
            .find(|(_, name)| *name == s)
            .map_or(ErrorCode::Other(s), |(code, _)| code.clone())
    }
}

impl From<ErrorCode> for String {
    fn from(code: ErrorCode) -> Self {
        code.as_str().to_string()
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One validation error attached to a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationError {
    #[serde(rename = "error")]
    pub code: ErrorCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub argument_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub argument_name: Option<String>,
}

impl EvaluationError {
    pub fn new(code: ErrorCode) -> Self {
        Self {
            code,
            message: None,
            argument_index: None,
            argument_name: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_argument_index(mut self, index: usize) -> Self {
        self.argument_index = Some(index);
        self
    }

    pub fn with_argument_name(mut self, name: impl Into<String>) -> Self {
        self.argument_name = Some(name.into());
        self
    }
}

impl fmt::Display for EvaluationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code)?;
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        Ok(())
    }
}

/// Evaluation the server reported for one node. Display data only: it never
/// feeds back into structural decisions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeEvaluation {
    #[serde(default)]
    pub return_value: Option<serde_json::Value>,
    #[serde(default)]
    pub errors: Vec<EvaluationError>,
}

/// Monotonic edit-sequence counter.
///
/// Every successful edit produces the next revision; validation responses
/// are tagged with the revision of the tree they were computed on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Revision(pub u64);

impl Revision {
    pub fn next(self) -> Self {
        Revision(self.0 + 1)
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}
