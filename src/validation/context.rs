//! Context Alignment
//!
//! Scores how many business-context items the SQL visibly honours. An item
//! counts as satisfied when one of its significant tokens appears in the SQL
//! text, or when it has no significant tokens at all.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;

lazy_static! {
    static ref TOKEN: Regex = Regex::new(r"\b[a-zA-Z_][a-zA-Z0-9_]*\b").unwrap();
    static ref STOPLIST: HashSet<&'static str> = [
        "check", "use", "for", "with", "from", "where", "select", "group", "order", "having",
        "revenue", "column", "table", "query", "queries", "clause",
    ]
    .into_iter()
    .collect();
}

#[derive(Debug, Clone, Default)]
pub struct ContextAlignmentChecker;

impl ContextAlignmentChecker {
    pub fn new() -> Self {
        Self
    }

    /// Fraction of context items satisfied by the SQL, in [0, 1]
    pub fn check<S: AsRef<str>>(&self, sql: &str, context: &[S]) -> f64 {
        if context.is_empty() {
            return 1.0;
        }

        let sql_lower = sql.to_lowercase();
        let satisfied = context
            .iter()
            .filter(|item| {
                let tokens = significant_tokens(item.as_ref());
                tokens.is_empty() || tokens.iter().any(|t| sql_lower.contains(t.as_str()))
            })
            .count();

        satisfied as f64 / context.len() as f64
    }
}

fn significant_tokens(item: &str) -> Vec<String> {
    let lower = item.to_lowercase();
    TOKEN
        .find_iter(&lower)
        .map(|m| m.as_str())
        .filter(|t| t.len() > 3 && !STOPLIST.contains(t))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_context_is_fully_aligned() {
        let checker = ContextAlignmentChecker::new();
        assert_eq!(checker.check("SELECT 1", &[] as &[&str]), 1.0);
    }

    #[test]
    fn test_partial_alignment() {
        let checker = ContextAlignmentChecker::new();
        let context = ["Revenue = net_revenue column", "Use fiscal_year for year queries"];
        assert_eq!(
            checker.check("SELECT SUM(net_revenue) FROM sales", &context),
            0.5
        );
        assert_eq!(
            checker.check("SELECT SUM(net_revenue) FROM sales WHERE fiscal_year = 2023", &context),
            1.0
        );
        assert_eq!(checker.check("SELECT customer_name FROM orders", &context), 0.0);
    }

    #[test]
    fn test_item_without_significant_tokens_is_satisfied() {
        let checker = ContextAlignmentChecker::new();
        assert_eq!(checker.check("SELECT 1", &["use the table"]), 1.0);
    }
}
