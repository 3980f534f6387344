//! Schema Validator
//!
//! Checks that the tables and columns a query references exist in the
//! business schema (or the system catalog).
//!
//! Extraction is a bounded heuristic, not a parse tree: tables are the
//! identifiers that follow FROM/JOIN, and column candidates are every other
//! identifier left after removing keywords, table names, aliases, function
//! names and cast targets. Subqueries and derived tables are not resolved.

use crate::schema::Schema;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;

use super::sql_text::strip_string_literals;

lazy_static! {
    static ref TABLE_REFERENCE: Regex =
        Regex::new(r"(?i)\b(?:FROM|JOIN)\s+([A-Za-z0-9_]+(?:\.[A-Za-z0-9_]+)?)").unwrap();
    static ref TABLE_ALIAS: Regex =
        Regex::new(r"(?i)^\s+(?:AS\s+)?([A-Za-z_][A-Za-z0-9_]*)").unwrap();
    static ref IDENTIFIER: Regex =
        Regex::new(r"\b[A-Za-z_][A-Za-z0-9_]*(?:\.(?:[A-Za-z_][A-Za-z0-9_]*|\*))*").unwrap();
    static ref COLUMN_ALIAS: Regex = Regex::new(r"(?i)\bAS\s+([A-Za-z_][A-Za-z0-9_]*)").unwrap();

    /// Words that can follow FROM/JOIN without being a table name
    static ref NOT_A_TABLE: HashSet<&'static str> =
        ["SELECT", "WHERE", "GROUP", "ORDER", "LIMIT", "OFFSET", "HAVING"].into_iter().collect();

    /// Words never treated as column references
    static ref SQL_KEYWORDS: HashSet<&'static str> = [
        "SELECT", "FROM", "WHERE", "GROUP", "BY", "HAVING", "ORDER", "LIMIT", "OFFSET", "AND",
        "OR", "NOT", "IN", "IS", "NULL", "LIKE", "ILIKE", "AS", "JOIN", "ON", "INNER", "LEFT",
        "RIGHT", "OUTER", "FULL", "CROSS", "USING", "ASC", "DESC", "DISTINCT", "COUNT", "SUM",
        "AVG", "MAX", "MIN", "CASE", "WHEN", "THEN", "ELSE", "END", "BETWEEN", "EXISTS",
        "UNION", "ALL", "WITH", "TRUE", "FALSE", "INTERVAL", "YEAR", "QUARTER", "MONTH", "WEEK",
        "DAY", "HOUR", "MINUTE", "SECOND", "EPOCH",
    ]
    .into_iter()
    .collect();
}

/// Outcome of a schema check; `errors` are raw messages for the hallucination detector
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaCheck {
    pub is_valid: bool,
    pub errors: Vec<String>,
    /// Referenced tables that exist in the schema, lower-cased
    pub resolved_tables: Vec<String>,
    /// All tables the query reads from, as written
    pub referenced_tables: Vec<String>,
}

pub struct SchemaValidator {
    schema: Schema,
}

impl SchemaValidator {
    pub fn new(schema: Schema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn validate(&self, sql: &str) -> SchemaCheck {
        let mut errors = Vec::new();
        let clean = strip_string_literals(sql);

        let (tables, table_aliases) = extract_tables(&clean);

        for table in &tables {
            if !self.schema.contains_table(table) {
                errors.push(format!("Table '{}' does not exist in the schema.", table));
            }
        }

        let resolved_tables: Vec<String> = tables
            .iter()
            .map(|t| t.to_lowercase())
            .filter(|t| self.schema.contains_table(t))
            .collect();

        // Columns are only checked against tables that actually exist
        if !resolved_tables.is_empty() {
            let valid_columns: HashSet<&str> = resolved_tables
                .iter()
                .filter_map(|t| self.schema.columns(t))
                .flatten()
                .map(|c| c.as_str())
                .collect();

            for column in extract_columns(&clean, &tables, &table_aliases) {
                if let Some((qualifier, name)) = split_qualified(&column) {
                    let name = name.to_lowercase();
                    if name == "*" {
                        continue;
                    }
                    let qualifier = qualifier.to_lowercase();
                    match self.schema.columns(&qualifier) {
                        Some(columns) => {
                            if !columns.contains(&name) {
                                errors.push(format!(
                                    "Column '{}' does not exist in table '{}'.",
                                    name, qualifier
                                ));
                            }
                        }
                        None => {
                            if !valid_columns.contains(name.as_str()) {
                                errors.push(format!(
                                    "Column '{}' does not exist in the schema.",
                                    name
                                ));
                            }
                        }
                    }
                } else if column != "*" && !valid_columns.contains(column.to_lowercase().as_str()) {
                    errors.push(format!(
                        "Column '{}' does not exist in the schema (referenced tables: {}).",
                        column,
                        resolved_tables.join(", ")
                    ));
                }
            }
        }

        SchemaCheck {
            is_valid: errors.is_empty(),
            errors,
            resolved_tables,
            referenced_tables: tables,
        }
    }
}

/// Tables after FROM/JOIN (first occurrence order) and their aliases
fn extract_tables(clean_sql: &str) -> (Vec<String>, HashSet<String>) {
    let mut tables: Vec<String> = Vec::new();
    let mut aliases = HashSet::new();

    for caps in TABLE_REFERENCE.captures_iter(clean_sql) {
        let Some(name) = caps.get(1) else { continue };
        let table = name.as_str();
        if NOT_A_TABLE.contains(table.to_uppercase().as_str())
            || inside_function_call(clean_sql, name.start())
        {
            continue;
        }
        if !tables.iter().any(|t| t == table) {
            tables.push(table.to_string());
        }
        if let Some(alias) = TABLE_ALIAS.captures(&clean_sql[name.end()..]) {
            let alias = alias[1].to_uppercase();
            if !SQL_KEYWORDS.contains(alias.as_str()) && !NOT_A_TABLE.contains(alias.as_str()) {
                aliases.insert(alias.to_lowercase());
            }
        }
    }

    (tables, aliases)
}

/// True when `pos` sits inside a parenthesized argument list such as
/// `EXTRACT(YEAR FROM order_date)` rather than a subquery
fn inside_function_call(sql: &str, pos: usize) -> bool {
    let mut depth = 0i32;
    for (i, ch) in sql[..pos].char_indices().rev() {
        match ch {
            ')' => depth += 1,
            '(' if depth == 0 => return !sql[i..pos].to_uppercase().contains("SELECT"),
            '(' => depth -= 1,
            _ => {}
        }
    }
    false
}

/// Column candidates: identifiers that are not keywords, tables, aliases,
/// function names or cast targets
fn extract_columns(clean_sql: &str, tables: &[String], table_aliases: &HashSet<String>) -> Vec<String> {
    let table_names: HashSet<String> = tables.iter().map(|t| t.to_lowercase()).collect();
    let column_aliases: HashSet<String> = COLUMN_ALIAS
        .captures_iter(clean_sql)
        .map(|caps| caps[1].to_lowercase())
        .collect();

    let mut seen = HashSet::new();
    let mut columns = Vec::new();

    for m in IDENTIFIER.find_iter(clean_sql) {
        let word = m.as_str();
        let lower = word.to_lowercase();

        if SQL_KEYWORDS.contains(word.to_uppercase().as_str())
            || table_names.contains(&lower)
            || table_aliases.contains(&lower)
            || column_aliases.contains(&lower)
        {
            continue;
        }
        if clean_sql[m.end()..].trim_start().starts_with('(') {
            continue;
        }
        if clean_sql[..m.start()].ends_with("::") {
            continue;
        }
        if seen.insert(word.to_string()) {
            columns.push(word.to_string());
        }
    }

    columns
}

/// `alias.column` → (alias, column); longer paths keep the last two parts
fn split_qualified(reference: &str) -> Option<(&str, &str)> {
    let mut parts = reference.rsplitn(3, '.');
    let column = parts.next()?;
    let qualifier = parts.next()?;
    Some((qualifier, column))
}
