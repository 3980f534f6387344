//! Semantic Validator
//!
//! Aggregate-usage rules: aggregates may not filter rows in WHERE, and a
//! select list that mixes aggregates with bare columns needs GROUP BY.

use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;

use super::sql_text::{
    contains_aggregate_call, has_group_by, select_segment, strip_string_literals, where_segment,
};

lazy_static! {
    static ref AGGREGATE_EXPR: Regex = Regex::new(r"(?i)\b(?:SUM|AVG|COUNT|MAX|MIN)\s*\(.*?\)").unwrap();
    static ref AS_ALIAS: Regex = Regex::new(r"(?i)\s+AS\s+\w+").unwrap();
    static ref WORD: Regex = Regex::new(r"\b[A-Za-z_][A-Za-z0-9_]*\b").unwrap();
}

/// Words in a select list that are never bare columns
const NON_COLUMN_WORDS: &[&str] = &[
    "DISTINCT", "ALL", "CASE", "WHEN", "THEN", "ELSE", "END", "AND", "OR", "NOT", "NULL", "IS",
    "IN", "TRUE", "FALSE",
];

/// A violated aggregate rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SemanticViolation {
    AggregateInFilter,
    MissingGroupBy,
}

impl SemanticViolation {
    /// Recover a violation from its message text
    pub fn from_message(message: &str) -> Option<Self> {
        if message.contains("Aggregate function found in WHERE clause") {
            Some(SemanticViolation::AggregateInFilter)
        } else if message.contains("missing GROUP BY") {
            Some(SemanticViolation::MissingGroupBy)
        } else {
            None
        }
    }
}

impl fmt::Display for SemanticViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SemanticViolation::AggregateInFilter => {
                write!(f, "Aggregate function found in WHERE clause. Use HAVING instead.")
            }
            SemanticViolation::MissingGroupBy => write!(
                f,
                "Selects aggregate and non-aggregate columns but missing GROUP BY clause."
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SemanticCheck {
    pub is_valid: bool,
    pub violations: Vec<SemanticViolation>,
}

impl SemanticCheck {
    pub fn messages(&self) -> Vec<String> {
        self.violations.iter().map(|v| v.to_string()).collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SemanticValidator;

impl SemanticValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate(&self, sql: &str) -> SemanticCheck {
        let clean = strip_string_literals(sql);
        let mut violations = Vec::new();

        if where_segment(&clean).map_or(false, contains_aggregate_call) {
            violations.push(SemanticViolation::AggregateInFilter);
        }

        if let Some(select_list) = select_segment(&clean) {
            if contains_aggregate_call(select_list)
                && !has_group_by(&clean)
                && has_bare_column(select_list)
            {
                violations.push(SemanticViolation::MissingGroupBy);
            }
        }

        SemanticCheck {
            is_valid: violations.is_empty(),
            violations,
        }
    }
}

/// True if the select list still names a column once aggregate calls,
/// aliases and function names are removed
fn has_bare_column(select_list: &str) -> bool {
    let without_aggregates = AGGREGATE_EXPR.replace_all(select_list, "");
    let without_aliases = AS_ALIAS.replace_all(&without_aggregates, "");
    let text = without_aliases.as_ref();

    WORD.find_iter(text).any(|m| {
        let upper = m.as_str().to_uppercase();
        !NON_COLUMN_WORDS.contains(&upper.as_str()) && !text[m.end()..].trim_start().starts_with('(')
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_in_where() {
        let check = SemanticValidator::new()
            .validate("SELECT region FROM sales WHERE SUM(net_revenue) > 1000 GROUP BY region");
        assert!(!check.is_valid);
        assert_eq!(check.violations, vec![SemanticViolation::AggregateInFilter]);
        assert!(check.messages()[0].contains("Use HAVING instead"));
    }

    #[test]
    fn test_missing_group_by() {
        let check = SemanticValidator::new().validate("SELECT region, SUM(net_revenue) FROM sales");
        assert_eq!(check.violations, vec![SemanticViolation::MissingGroupBy]);
    }

    #[test]
    fn test_valid_aggregation() {
        let validator = SemanticValidator::new();
        assert!(validator
            .validate("SELECT region, SUM(net_revenue) FROM sales GROUP BY region")
            .is_valid);
        assert!(validator.validate("SELECT COUNT(*) FROM sales").is_valid);
        assert!(validator
            .validate("SELECT ROUND(SUM(net_revenue), 2) AS total FROM sales")
            .is_valid);
        assert!(validator
            .validate("SELECT region FROM sales WHERE note = 'SUM(x) > 1'")
            .is_valid);
    }

    #[test]
    fn test_violation_round_trips_through_message() {
        for violation in [SemanticViolation::AggregateInFilter, SemanticViolation::MissingGroupBy] {
            assert_eq!(
                SemanticViolation::from_message(&violation.to_string()),
                Some(violation)
            );
        }
        assert_eq!(SemanticViolation::from_message("something else"), None);
    }
}
