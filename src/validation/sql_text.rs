//! SQL Text Helpers
//!
//! Bounded textual slicing shared by the validators. None of this is a
//! parser: clauses are located by keyword search over the raw text, and
//! nested queries are not tracked.

use lazy_static::lazy_static;
use regex::Regex;

/// Aggregate functions recognized by the semantic checks and the verifier
pub const AGGREGATES: &[&str] = &["SUM", "AVG", "COUNT", "MAX", "MIN"];

lazy_static! {
    static ref STRING_LITERAL: Regex = Regex::new(r"'[^']*'").unwrap();
    static ref AGGREGATE_CALL: Regex =
        Regex::new(r"(?i)\b(?:SUM|AVG|COUNT|MAX|MIN)\s*\(").unwrap();
    static ref WHERE_KEYWORD: Regex = Regex::new(r"(?i)\bWHERE\b").unwrap();
    static ref WHERE_END: Regex =
        Regex::new(r"(?i)\b(?:GROUP\s+BY|ORDER\s+BY|HAVING|LIMIT|OFFSET|UNION)\b").unwrap();
    static ref GROUP_BY: Regex = Regex::new(r"(?i)\bGROUP\s+BY\b").unwrap();
    static ref SELECT_SEGMENT: Regex = Regex::new(r"(?is)SELECT\s+(.*?)\s+(?:FROM|$)").unwrap();
}

/// Remove single-quoted string literals so their contents never match keywords
pub fn strip_string_literals(sql: &str) -> String {
    STRING_LITERAL.replace_all(sql, "").into_owned()
}

/// True if the text contains an aggregate call such as `SUM(`
pub fn contains_aggregate_call(text: &str) -> bool {
    AGGREGATE_CALL.is_match(text)
}

pub fn has_group_by(sql: &str) -> bool {
    GROUP_BY.is_match(sql)
}

/// The filter clause: text after WHERE up to the next clause keyword
pub fn where_segment(sql: &str) -> Option<&str> {
    let start = WHERE_KEYWORD.find(sql)?.end();
    let rest = &sql[start..];
    let end = WHERE_END.find(rest).map(|m| m.start()).unwrap_or(rest.len());
    Some(rest[..end].trim())
}

/// The select list: text between SELECT and FROM (or the end of the query)
pub fn select_segment(sql: &str) -> Option<&str> {
    SELECT_SEGMENT
        .captures(sql)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_string_literals() {
        assert_eq!(
            strip_string_literals("SELECT a FROM t WHERE b = 'FROM x'"),
            "SELECT a FROM t WHERE b = "
        );
    }

    #[test]
    fn test_where_segment_stops_at_group_by() {
        let sql = "SELECT region FROM sales WHERE fiscal_year = 2023 GROUP BY region";
        assert_eq!(where_segment(sql), Some("fiscal_year = 2023"));
        assert_eq!(where_segment("SELECT 1"), None);
    }

    #[test]
    fn test_select_segment() {
        let sql = "SELECT region, SUM(net_revenue) FROM sales";
        assert_eq!(select_segment(sql), Some("region, SUM(net_revenue)"));
    }

    #[test]
    fn test_aggregate_call_detection() {
        assert!(contains_aggregate_call("count (*) > 3"));
        assert!(!contains_aggregate_call("discount > 3"));
    }
}
