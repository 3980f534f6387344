//! Validation Issues
//!
//! Findings produced by the validators, the hallucination detector and the
//! answer verifier. Issues are plain data: they are collected into lists and
//! handed upward, never raised as errors.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Issue classification tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    UnknownFunction,
    NonExistentTable,
    NonExistentColumn,
    SchemaError,
    SyntaxError,
    SemanticError,
    ContextIgnored,
    UnsupportedTable,
    UnsupportedColumn,
    LowConfidence,
}

impl IssueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueKind::UnknownFunction => "unknown_function",
            IssueKind::NonExistentTable => "non_existent_table",
            IssueKind::NonExistentColumn => "non_existent_column",
            IssueKind::SchemaError => "schema_error",
            IssueKind::SyntaxError => "syntax_error",
            IssueKind::SemanticError => "semantic_error",
            IssueKind::ContextIgnored => "context_ignored",
            IssueKind::UnsupportedTable => "unsupported_table",
            IssueKind::UnsupportedColumn => "unsupported_column",
            IssueKind::LowConfidence => "low_confidence",
        }
    }

    /// Kinds emitted by the hallucination detector
    pub fn is_hallucination(&self) -> bool {
        matches!(
            self,
            IssueKind::NonExistentTable
                | IssueKind::NonExistentColumn
                | IssueKind::SchemaError
                | IssueKind::UnknownFunction
        )
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    High,
    Medium,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Critical => write!(f, "critical"),
            Severity::High => write!(f, "high"),
            Severity::Medium => write!(f, "medium"),
        }
    }
}

/// A single validation finding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    #[serde(rename = "type")]
    pub kind: IssueKind,
    pub severity: Severity,
    pub details: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    /// The element an issue is about (unsupported table/column name, tier name)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
}

impl ValidationIssue {
    pub fn new(kind: IssueKind, severity: Severity, details: impl Into<String>) -> Self {
        Self {
            kind,
            severity,
            details: details.into(),
            suggestion: None,
            subject: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Value used when logging which issues a correction attempt addressed
    pub fn label(&self) -> &str {
        self.subject.as_deref().unwrap_or(&self.details)
    }
}
