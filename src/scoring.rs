//! Confidence Scorer
//!
//! Combines the syntax, schema, semantic and context validators into one
//! weighted confidence value and a recommendation tier.

use crate::collaborators::{ScoreReport, Scorer};
use crate::error::Result;
use crate::issues::{IssueKind, Severity, ValidationIssue};
use crate::schema::Schema;
use crate::validation::{
    ContextAlignmentChecker, HallucinationDetector, SchemaValidator, SemanticValidator,
    SyntaxValidator,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Placeholder business-logic signal; kept so the other weights stay normalized
pub const BUSINESS_LOGIC_SCORE: f64 = 1.0;

const SCHEMA_WEIGHT: f64 = 0.30;
const SYNTAX_WEIGHT: f64 = 0.25;
const SEMANTIC_WEIGHT: f64 = 0.20;
const CONTEXT_WEIGHT: f64 = 0.15;
const BUSINESS_LOGIC_WEIGHT: f64 = 0.10;

/// Context alignment below this adds a `context_ignored` issue
const CONTEXT_ALIGNMENT_FLOOR: f64 = 0.5;

const UNRESOLVED_RELATIONS: &str = "No referenced relation exists in the schema.";

/// Round to two decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Action tier derived from overall confidence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Recommendation {
    Execute,
    Review,
    Correct,
    Reject,
}

impl Recommendation {
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= 0.85 {
            Recommendation::Execute
        } else if confidence >= 0.70 {
            Recommendation::Review
        } else if confidence >= 0.50 {
            Recommendation::Correct
        } else {
            Recommendation::Reject
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Recommendation::Execute => "EXECUTE",
            Recommendation::Review => "REVIEW",
            Recommendation::Correct => "CORRECT",
            Recommendation::Reject => "REJECT",
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionScores {
    pub schema: f64,
    pub syntax: f64,
    pub semantic: f64,
    pub context: f64,
    pub business_logic: f64,
}

impl DimensionScores {
    pub fn weighted_total(&self) -> f64 {
        round2(
            SCHEMA_WEIGHT * self.schema
                + SYNTAX_WEIGHT * self.syntax
                + SEMANTIC_WEIGHT * self.semantic
                + CONTEXT_WEIGHT * self.context
                + BUSINESS_LOGIC_WEIGHT * self.business_logic,
        )
    }
}

/// Full result of evaluating one SQL candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub overall_confidence: f64,
    pub dimension_scores: DimensionScores,
    pub recommendation: Recommendation,
    pub issues: Vec<ValidationIssue>,
    pub hallucinations_detected: bool,
}

pub struct ConfidenceScorer {
    schema_validator: SchemaValidator,
    syntax_validator: SyntaxValidator,
    semantic_validator: SemanticValidator,
    context_checker: ContextAlignmentChecker,
    hallucination_detector: HallucinationDetector,
}

impl ConfidenceScorer {
    pub fn new(schema: Schema) -> Self {
        Self {
            schema_validator: SchemaValidator::new(schema),
            syntax_validator: SyntaxValidator::new(),
            semantic_validator: SemanticValidator::new(),
            context_checker: ContextAlignmentChecker::new(),
            hallucination_detector: HallucinationDetector::default(),
        }
    }

    pub fn schema(&self) -> &Schema {
        self.schema_validator.schema()
    }

    /// Score `sql` against the schema and business context.
    ///
    /// Departs from the plain dimension formula in one place: when tables are
    /// referenced but none of them exists in the schema, one extra semantic
    /// issue ("No referenced relation exists in the schema.") is counted. This
    /// lowers e.g. `SELECT * FROM orders` with no context from 0.70 to 0.60.
    pub fn evaluate<S: AsRef<str>>(&self, sql: &str, context: &[S]) -> Evaluation {
        let syntax = self.syntax_validator.check(sql);
        let schema_check = self.schema_validator.validate(sql);
        let semantic_check = self.semantic_validator.validate(sql);

        let mut semantic_messages = semantic_check.messages();
        // A query whose every relation is unknown cannot be meaningful
        if !schema_check.referenced_tables.is_empty() && schema_check.resolved_tables.is_empty() {
            semantic_messages.push(UNRESOLVED_RELATIONS.to_string());
        }

        let context_score = self.context_checker.check(sql, context);

        let dimension_scores = DimensionScores {
            schema: if schema_check.is_valid { 1.0 } else { 0.0 },
            syntax: if syntax.is_ok() { 1.0 } else { 0.0 },
            semantic: match semantic_messages.len() {
                0 => 1.0,
                1 => 0.5,
                _ => 0.0,
            },
            context: context_score,
            business_logic: BUSINESS_LOGIC_SCORE,
        };
        let overall_confidence = dimension_scores.weighted_total();
        let recommendation = Recommendation::from_confidence(overall_confidence);

        let mut issues = Vec::new();
        if let Err(e) = &syntax {
            issues.push(ValidationIssue::new(
                IssueKind::SyntaxError,
                Severity::Critical,
                e.to_string(),
            ));
        }

        issues.extend(
            self.hallucination_detector
                .detect(sql, &schema_check.errors, self.schema()),
        );

        issues.extend(semantic_messages.into_iter().map(|message| {
            ValidationIssue::new(IssueKind::SemanticError, Severity::High, message)
        }));

        if context_score < CONTEXT_ALIGNMENT_FLOOR && !context.is_empty() {
            issues.push(ValidationIssue::new(
                IssueKind::ContextIgnored,
                Severity::Medium,
                "Low alignment with business context.",
            ));
        }

        let hallucinations_detected = issues.iter().any(|issue| issue.kind.is_hallucination());

        debug!(
            "Evaluated SQL: confidence={} recommendation={} issues={}",
            overall_confidence,
            recommendation,
            issues.len()
        );

        Evaluation {
            overall_confidence,
            dimension_scores,
            recommendation,
            issues,
            hallucinations_detected,
        }
    }
}

impl Scorer for ConfidenceScorer {
    /// Chunks serve as the business context
    fn score(&self, sql: &str, _query: &str, chunks: &[String]) -> Result<ScoreReport> {
        let evaluation = self.evaluate(sql, chunks);
        Ok(ScoreReport {
            overall_confidence: evaluation.overall_confidence,
            recommendation: evaluation.recommendation,
        })
    }
}
