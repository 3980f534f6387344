//! Rule-based SQL corrector
//!
//! Applies textual fixes for issues that carry enough information to be
//! repaired mechanically. Fixes run in issue order and each one sees the
//! output of the previous one.

use crate::issues::{IssueKind, ValidationIssue};
use crate::validation::sql_text::contains_aggregate_call;
use crate::validation::SemanticViolation;
use lazy_static::lazy_static;
use regex::{NoExpand, Regex};
use tracing::debug;

lazy_static! {
    static ref QUOTED: Regex = Regex::new(r"'([^']*)'").unwrap();
    static ref QUOTED_ORIGINAL: Regex = Regex::new(r"(?:Table|Column) '([^']*)'").unwrap();
    static ref WHERE_BEFORE_GROUP_BY: Regex = Regex::new(
        r"(?is)WHERE\s+(.*?)\s+GROUP\s+BY\s+(.*?)(?:\s+(?:ORDER|LIMIT)\b|$)"
    )
    .unwrap();
}

/// Outcome of a correction pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Correction {
    Corrected(String),
    Unchanged,
}

impl Correction {
    pub fn into_sql(self) -> Option<String> {
        match self {
            Correction::Corrected(sql) => Some(sql),
            Correction::Unchanged => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SyntacticCorrector;

impl SyntacticCorrector {
    pub fn new() -> Self {
        Self
    }

    pub fn correct(&self, sql: &str, issues: &[ValidationIssue]) -> Correction {
        let mut corrected = sql.to_string();

        for issue in issues {
            match issue.kind {
                IssueKind::NonExistentTable | IssueKind::NonExistentColumn => {
                    if let Some(fixed) = replace_named_element(&corrected, issue) {
                        corrected = fixed;
                    }
                }
                IssueKind::SemanticError
                    if SemanticViolation::from_message(&issue.details)
                        == Some(SemanticViolation::AggregateInFilter) =>
                {
                    if let Some(fixed) = move_filter_to_having(&corrected) {
                        corrected = fixed;
                    }
                }
                _ => {}
            }
        }

        if corrected == sql {
            Correction::Unchanged
        } else {
            debug!("Corrected SQL: {}", corrected);
            Correction::Corrected(corrected)
        }
    }
}

/// Whole-word swap of the quoted original (from details) for the first quoted
/// term of the suggestion
fn replace_named_element(sql: &str, issue: &ValidationIssue) -> Option<String> {
    let suggestion = issue.suggestion.as_deref()?;
    let replacement = QUOTED.captures(suggestion)?.get(1)?.as_str();
    let original = QUOTED_ORIGINAL.captures(&issue.details)?.get(1)?.as_str();

    let word = Regex::new(&format!(r"\b{}\b", regex::escape(original))).ok()?;
    Some(word.replace_all(sql, NoExpand(replacement)).into_owned())
}

/// `WHERE <agg cond> GROUP BY <cols>` → `GROUP BY <cols> HAVING <agg cond>`;
/// nothing to do without a GROUP BY
fn move_filter_to_having(sql: &str) -> Option<String> {
    let caps = WHERE_BEFORE_GROUP_BY.captures(sql)?;
    let condition = caps.get(1)?;
    let columns = caps.get(2)?;
    if !contains_aggregate_call(condition.as_str()) {
        return None;
    }

    let start = caps.get(0)?.start();
    Some(format!(
        "{}GROUP BY {} HAVING {}{}",
        &sql[..start],
        columns.as_str(),
        condition.as_str(),
        &sql[columns.end()..]
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issues::Severity;

    fn aggregate_issue() -> ValidationIssue {
        ValidationIssue::new(
            IssueKind::SemanticError,
            Severity::High,
            SemanticViolation::AggregateInFilter.to_string(),
        )
    }

    #[test]
    fn test_moves_aggregate_filter_to_having() {
        let sql = "SELECT region, SUM(net_revenue) FROM sales WHERE SUM(net_revenue) > 1000 GROUP BY region";
        let corrected = SyntacticCorrector::new()
            .correct(sql, &[aggregate_issue()])
            .into_sql()
            .unwrap();
        assert!(corrected.contains("HAVING SUM(net_revenue) > 1000"));
        assert!(!corrected.contains("WHERE SUM(net_revenue) > 1000"));
    }

    #[test]
    fn test_having_move_keeps_trailing_clauses() {
        let sql = "SELECT region FROM sales WHERE COUNT(*) > 2 GROUP BY region ORDER BY region";
        let corrected = SyntacticCorrector::new().correct(sql, &[aggregate_issue()]);
        assert_eq!(
            corrected,
            Correction::Corrected(
                "SELECT region FROM sales GROUP BY region HAVING COUNT(*) > 2 ORDER BY region"
                    .to_string()
            )
        );
    }

    #[test]
    fn test_aggregate_fix_skipped_without_group_by() {
        let sql = "SELECT region FROM sales WHERE SUM(net_revenue) > 1000";
        assert_eq!(
            SyntacticCorrector::new().correct(sql, &[aggregate_issue()]),
            Correction::Unchanged
        );
    }

    #[test]
    fn test_replaces_whole_words_only() {
        let issue = ValidationIssue::new(
            IssueKind::NonExistentColumn,
            Severity::Critical,
            "Column 'revenue' does not exist in the schema (referenced tables: sales).",
        )
        .with_suggestion("Use 'net_revenue' instead of 'revenue' (closest match in schema).");

        let corrected = SyntacticCorrector::new()
            .correct("SELECT revenue, gross_revenue FROM sales", &[issue]);
        assert_eq!(
            corrected,
            Correction::Corrected("SELECT net_revenue, gross_revenue FROM sales".to_string())
        );
    }

    #[test]
    fn test_unchanged_without_actionable_pairing() {
        let corrector = SyntacticCorrector::new();
        let no_suggestion = ValidationIssue::new(
            IssueKind::NonExistentTable,
            Severity::Critical,
            "Table 'orders' does not exist in the schema.",
        );
        let unrelated = ValidationIssue::new(IssueKind::ContextIgnored, Severity::Medium, "x");
        assert_eq!(
            corrector.correct("SELECT * FROM orders", &[no_suggestion, unrelated]),
            Correction::Unchanged
        );
        assert_eq!(corrector.correct("SELECT 1", &[]), Correction::Unchanged);
    }
}
