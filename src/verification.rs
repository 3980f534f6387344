//! Answer Verifier
//!
//! Checks that the tables and columns a SQL answer uses are supported by the
//! retrieved context. An element is supported when it is a system-catalog
//! name or appears (case-insensitively) inside any chunk.

use crate::issues::{IssueKind, Severity, ValidationIssue};
use crate::schema::is_catalog_element;
use crate::validation::sql_text::AGGREGATES;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Minimum faithfulness for an answer to count as verified
pub const FAITHFULNESS_THRESHOLD: f64 = 0.8;

lazy_static! {
    static ref TABLE_REFERENCE: Regex = Regex::new(r"FROM\s+([A-Z0-9_]+)|JOIN\s+([A-Z0-9_]+)").unwrap();
    static ref SELECT_LIST: Regex = Regex::new(r"(?s)SELECT\s+(.+?)\s+FROM").unwrap();
    static ref AGGREGATE_WRAPPER: Regex = Regex::new(r"(SUM|AVG|COUNT|MAX|MIN)\((.+?)\)").unwrap();
    static ref AS_SPLIT: Regex = Regex::new(r"\s+AS\s+").unwrap();
    static ref FILTER_CLAUSE: Regex =
        Regex::new(r"(?s)WHERE\s+(.+?)(?:$|\bGROUP\b|\bORDER\b|\bLIMIT\b)").unwrap();
    static ref COMPARISON_OPERAND: Regex = Regex::new(r"([A-Z0-9_]+)\s*[=<>!]").unwrap();
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub verified: bool,
    pub faithfulness_score: f64,
    pub issues: Vec<ValidationIssue>,
    pub unsupported_elements: Vec<String>,
    pub needs_correction: bool,
}

/// Tables and columns referenced by a query, upper-cased and deduplicated
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SqlElements {
    pub tables: Vec<String>,
    pub columns: Vec<String>,
}

impl SqlElements {
    pub fn total(&self) -> usize {
        self.tables.len() + self.columns.len()
    }
}

/// Anything that can check an answer against its context
pub trait Verifier: Send + Sync {
    fn verify(&self, sql: &str, query: &str, chunks: &[String]) -> VerificationResult;
}

#[derive(Debug, Clone, Default)]
pub struct AnswerVerifier;

impl AnswerVerifier {
    pub fn new() -> Self {
        Self
    }

    pub fn extract_elements(&self, sql: &str) -> SqlElements {
        let sql = sql.to_uppercase();
        let mut elements = SqlElements::default();

        for caps in TABLE_REFERENCE.captures_iter(&sql) {
            if let Some(table) = caps.get(1).or_else(|| caps.get(2)) {
                push_unique(&mut elements.tables, table.as_str());
            }
        }

        if let Some(select_list) = SELECT_LIST.captures(&sql).and_then(|c| c.get(1)) {
            for raw in select_list.as_str().split(',') {
                let unwrapped = AGGREGATE_WRAPPER.replace_all(raw.trim(), "$2");
                let before_alias = AS_SPLIT.split(&unwrapped).next().unwrap_or_default();
                let without_distinct = before_alias.replace("DISTINCT ", "");
                let column = without_distinct.rsplit('.').next().unwrap_or_default().trim();
                if is_element(column) {
                    push_unique(&mut elements.columns, column);
                }
            }
        }

        if let Some(filter) = FILTER_CLAUSE.captures(&sql).and_then(|c| c.get(1)) {
            for caps in COMPARISON_OPERAND.captures_iter(filter.as_str()) {
                if is_element(&caps[1]) {
                    push_unique(&mut elements.columns, &caps[1]);
                }
            }
        }

        elements
    }

    fn is_supported(element: &str, chunks: &[String]) -> bool {
        if is_catalog_element(element) {
            return true;
        }
        let needle = element.to_lowercase();
        chunks.iter().any(|chunk| chunk.to_lowercase().contains(&needle))
    }
}

impl Verifier for AnswerVerifier {
    fn verify(&self, sql: &str, _query: &str, chunks: &[String]) -> VerificationResult {
        let elements = self.extract_elements(sql);
        let mut unsupported = Vec::new();
        let mut issues = Vec::new();

        for table in &elements.tables {
            if !Self::is_supported(table, chunks) {
                unsupported.push(format!("Table: {}", table));
                issues.push(
                    ValidationIssue::new(
                        IssueKind::UnsupportedTable,
                        Severity::High,
                        format!("Table '{}' is not supported by the retrieved context.", table),
                    )
                    .with_subject(table.clone()),
                );
            }
        }

        for column in &elements.columns {
            // Wildcards and bare aggregate names still count toward the total
            if column == "*" || AGGREGATES.contains(&column.as_str()) {
                continue;
            }
            if !Self::is_supported(column, chunks) {
                unsupported.push(format!("Column: {}", column));
                issues.push(
                    ValidationIssue::new(
                        IssueKind::UnsupportedColumn,
                        Severity::High,
                        format!("Column '{}' is not supported by the retrieved context.", column),
                    )
                    .with_subject(column.clone()),
                );
            }
        }

        let total = elements.total();
        let faithfulness_score = if total == 0 {
            1.0
        } else {
            (total - unsupported.len()) as f64 / total as f64
        };
        let verified = faithfulness_score >= FAITHFULNESS_THRESHOLD && issues.is_empty();

        VerificationResult {
            verified,
            faithfulness_score,
            issues,
            unsupported_elements: unsupported,
            needs_correction: !verified,
        }
    }
}

/// Empty strings and numeric literals are not schema elements
fn is_element(token: &str) -> bool {
    !token.is_empty() && !token.chars().all(|c| c.is_ascii_digit())
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|v| v == value) {
        list.push(value.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_unsupported_column_is_reported() {
        let result = AnswerVerifier::new().verify(
            "SELECT secret_code FROM users",
            "",
            &context(&["We represent users by email only."]),
        );
        assert!(!result.verified);
        assert!(result.needs_correction);
        assert!(result
            .unsupported_elements
            .contains(&"Column: SECRET_CODE".to_string()));
        assert_eq!(result.faithfulness_score, 0.5);
        assert_eq!(result.issues[0].kind, IssueKind::UnsupportedColumn);
        assert_eq!(result.issues[0].subject.as_deref(), Some("SECRET_CODE"));
    }

    #[test]
    fn test_extracts_select_and_filter_elements() {
        let elements = AnswerVerifier::new().extract_elements(
            "SELECT s.region, SUM(net_revenue) AS total, DISTINCT segment FROM sales s \
             JOIN customers c ON s.id = c.id WHERE fiscal_year = 2023 GROUP BY s.region",
        );
        assert_eq!(elements.tables, vec!["SALES".to_string(), "CUSTOMERS".to_string()]);
        assert_eq!(
            elements.columns,
            vec![
                "REGION".to_string(),
                "NET_REVENUE".to_string(),
                "SEGMENT".to_string(),
                "FISCAL_YEAR".to_string(),
            ]
        );
    }

    #[test]
    fn test_wildcard_counts_but_is_never_unsupported() {
        let result = AnswerVerifier::new().verify(
            "SELECT COUNT(*) FROM sales",
            "",
            &context(&["sales table"]),
        );
        assert!(result.verified);
        assert_eq!(result.faithfulness_score, 1.0);
    }

    #[test]
    fn test_catalog_and_empty_queries_are_faithful() {
        let verifier = AnswerVerifier::new();
        let result = verifier.verify("SELECT tablename FROM pg_tables", "", &[]);
        assert!(result.verified);

        let result = verifier.verify("SELECT 1", "", &[]);
        assert_eq!(result.faithfulness_score, 1.0);
        assert!(result.verified);
    }
}
