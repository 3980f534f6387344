//! Hallucination Detector
//!
//! Turns raw schema-validator messages into structured hallucination
//! records and flags calls to functions outside the standard SQL set.

use crate::issues::{IssueKind, Severity, ValidationIssue};
use crate::schema::Schema;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;
use strsim::jaro_winkler;

use super::sql_text::strip_string_literals;

lazy_static! {
    static ref MISSING_TABLE: Regex = Regex::new(r"Table '([^']*)' does not exist").unwrap();
    static ref MISSING_COLUMN: Regex = Regex::new(r"Column '([^']*)' does not exist").unwrap();
    static ref FUNCTION_CALL: Regex = Regex::new(r"\b([a-zA-Z_][a-zA-Z0-9_]*)\s*\(").unwrap();

    /// Standard PostgreSQL functions and call-like keywords
    pub static ref STANDARD_FUNCTIONS: HashSet<&'static str> = [
        // math
        "ABS", "ACOS", "ASIN", "ATAN", "ATAN2", "CEIL", "CEILING", "COS", "COT", "DEGREES", "EXP",
        "FLOOR", "LN", "LOG", "MOD", "PI", "POWER", "RADIANS", "ROUND", "SIGN", "SIN", "SQRT",
        "TAN", "TRUNC",
        // string
        "ASCII", "BTRIM", "CHR", "CONCAT", "CONCAT_WS", "FORMAT", "INITCAP", "LEFT", "LENGTH",
        "LOWER", "LPAD", "LTRIM", "MD5", "POSITION", "REPEAT", "REPLACE", "REVERSE", "RIGHT",
        "RPAD", "RTRIM", "SPLIT_PART", "STRPOS", "SUBSTR", "SUBSTRING", "TO_ASCII", "TO_HEX",
        "TRANSLATE", "TRIM", "UPPER",
        // date/time
        "CURRENT_DATE", "CURRENT_TIME", "CURRENT_TIMESTAMP", "DATE_PART", "DATE_TRUNC", "EXTRACT",
        "ISFINITE", "JUSTIFY_DAYS", "JUSTIFY_HOURS", "JUSTIFY_INTERVAL", "LOCALTIME",
        "LOCALTIMESTAMP", "NOW", "TIMEOFDAY",
        // aggregate
        "AVG", "BIT_AND", "BIT_OR", "BOOL_AND", "BOOL_OR", "COUNT", "EVERY", "MAX", "MIN", "SUM",
        // conditional and misc
        "COALESCE", "NULLIF", "GREATEST", "LEAST", "CAST", "CASE", "WHEN", "THEN", "ELSE", "END",
        "DISTINCT", "EXISTS", "IN", "ANY", "ALL", "SOME",
    ]
    .into_iter()
    .collect();

    /// Clause keywords that may be followed by `(` without being calls
    static ref CALL_LIKE_KEYWORDS: HashSet<&'static str> = [
        "SELECT", "FROM", "JOIN", "AS", "ON", "AND", "OR", "NOT", "WHERE", "USING", "VALUES",
        "OVER", "WITH", "INTO", "HAVING", "UNION",
    ]
    .into_iter()
    .collect();
}

pub struct HallucinationDetector {
    /// Minimum similarity for a "did you mean" suggestion
    pub similarity_threshold: f64,
}

impl Default for HallucinationDetector {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.8,
        }
    }
}

impl HallucinationDetector {
    /// Schema-message records followed by unknown-function records
    pub fn detect(&self, sql: &str, schema_errors: &[String], schema: &Schema) -> Vec<ValidationIssue> {
        let mut issues = self.classify_schema_errors(schema_errors, schema);
        issues.extend(self.unknown_functions(sql));
        issues
    }

    pub fn classify_schema_errors(&self, schema_errors: &[String], schema: &Schema) -> Vec<ValidationIssue> {
        schema_errors
            .iter()
            .map(|message| {
                if let Some(caps) = MISSING_TABLE.captures(message) {
                    let table = &caps[1];
                    let candidates = schema.business_tables().iter().map(|t| t.as_str());
                    ValidationIssue::new(IssueKind::NonExistentTable, Severity::Critical, message.clone())
                        .with_suggestion(self.suggest("table", table, candidates))
                        .with_subject(table)
                } else if let Some(caps) = MISSING_COLUMN.captures(message) {
                    let column = &caps[1];
                    let columns = schema.business_columns();
                    ValidationIssue::new(IssueKind::NonExistentColumn, Severity::Critical, message.clone())
                        .with_suggestion(self.suggest("column", column, columns.into_iter()))
                        .with_subject(column)
                } else {
                    ValidationIssue::new(IssueKind::SchemaError, Severity::High, message.clone())
                }
            })
            .collect()
    }

    /// One record per distinct non-standard function name
    pub fn unknown_functions(&self, sql: &str) -> Vec<ValidationIssue> {
        let clean = strip_string_literals(sql);
        let mut seen = HashSet::new();

        FUNCTION_CALL
            .captures_iter(&clean)
            .map(|caps| caps[1].to_uppercase())
            .filter(|name| {
                !STANDARD_FUNCTIONS.contains(name.as_str())
                    && !CALL_LIKE_KEYWORDS.contains(name.as_str())
            })
            .filter(|name| seen.insert(name.clone()))
            .map(|name| {
                ValidationIssue::new(
                    IssueKind::UnknownFunction,
                    Severity::Medium,
                    format!("Function '{}' is not a standard SQL function.", name),
                )
                .with_suggestion("Verify if this function exists in the database.")
                .with_subject(name)
            })
            .collect()
    }

    fn suggest<'a>(&self, element: &str, name: &str, candidates: impl Iterator<Item = &'a str>) -> String {
        let needle = name.to_lowercase();
        let best = candidates
            .map(|c| (c, jaro_winkler(&needle, c)))
            .filter(|(_, score)| *score >= self.similarity_threshold)
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

        match best {
            Some((candidate, _)) => format!(
                "Use '{}' instead of '{}' (closest match in schema).",
                candidate, name
            ),
            None => format!(
                "Check schema for correct {} name similar to '{}'.",
                element, name
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_schema() -> Schema {
        Schema::new(vec![
            ("sales", vec!["region", "net_revenue", "fiscal_year"]),
            ("customers", vec!["id", "name", "segment"]),
        ])
    }

    #[test]
    fn test_classifies_missing_table() {
        let detector = HallucinationDetector::default();
        let errors = vec!["Table 'orders' does not exist in the schema.".to_string()];
        let issues = detector.detect("SELECT * FROM orders", &errors, &sample_schema());

        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, IssueKind::NonExistentTable);
        assert_eq!(issues[0].severity, Severity::Critical);
        assert_eq!(
            issues[0].suggestion.as_deref(),
            Some("Check schema for correct table name similar to 'orders'.")
        );
    }

    #[test]
    fn test_close_column_gets_named_suggestion() {
        let detector = HallucinationDetector::default();
        let errors = vec![
            "Column 'total_revenue' does not exist in the schema (referenced tables: sales)."
                .to_string(),
        ];
        let issues = detector.classify_schema_errors(&errors, &sample_schema());
        assert_eq!(issues[0].kind, IssueKind::NonExistentColumn);
        assert_eq!(
            issues[0].suggestion.as_deref(),
            Some("Use 'net_revenue' instead of 'total_revenue' (closest match in schema).")
        );
    }

    #[test]
    fn test_unmatched_message_is_generic_schema_error() {
        let detector = HallucinationDetector::default();
        let issues = detector.classify_schema_errors(&["boom".to_string()], &sample_schema());
        assert_eq!(issues[0].kind, IssueKind::SchemaError);
        assert_eq!(issues[0].severity, Severity::High);
    }

    #[test]
    fn test_unknown_functions() {
        let detector = HallucinationDetector::default();
        let sql = "SELECT MAGIC_SUM(net_revenue), magic_sum(x), ROUND(AVG(net_revenue), 2) \
                   FROM sales WHERE region IN ('a') AND note = 'fake(1)'";
        let issues = detector.unknown_functions(sql);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, IssueKind::UnknownFunction);
        assert_eq!(issues[0].severity, Severity::Medium);
        assert_eq!(
            issues[0].details,
            "Function 'MAGIC_SUM' is not a standard SQL function."
        );
    }

    #[test]
    fn test_subquery_is_not_a_call() {
        let detector = HallucinationDetector::default();
        let sql = "WITH t AS (SELECT region FROM sales) SELECT * FROM (SELECT region FROM t) s";
        assert!(detector.unknown_functions(sql).is_empty());
    }
}
