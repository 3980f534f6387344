//! Syntax Validator
//!
//! Confirms the SQL text is parseable and has a recognizable statement type.
//! A strict `sqlparser` parse is tried first; generated SQL often uses dialect
//! features the strict parser rejects, so a failed parse falls back to a
//! lenient token-level check on the leading keyword.

use sqlparser::ast::Statement;
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use sqlparser::tokenizer::{Token, Tokenizer, Whitespace};
use thiserror::Error;
use tracing::debug;

const DML_KEYWORDS: &[&str] = &["SELECT", "INSERT", "UPDATE", "DELETE", "UPSERT", "REPLACE", "MERGE"];
const DDL_KEYWORDS: &[&str] = &["CREATE", "ALTER", "DROP", "TRUNCATE"];

/// Why a statement failed the syntax check
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyntaxError {
    #[error("Empty SQL query")]
    Empty,

    #[error("Failed to parse SQL: {0}")]
    ParseFailure(String),

    #[error("Statement type unknown or invalid start of query")]
    UnknownStatementType,
}

#[derive(Debug, Clone, Default)]
pub struct SyntaxValidator;

impl SyntaxValidator {
    pub fn new() -> Self {
        Self
    }

    /// Check the SQL and return its statement type (e.g. `SELECT`)
    pub fn check(&self, sql: &str) -> Result<&'static str, SyntaxError> {
        if sql.trim().is_empty() {
            return Err(SyntaxError::Empty);
        }

        let dialect = GenericDialect {};
        match Parser::parse_sql(&dialect, sql) {
            Ok(statements) if !statements.is_empty() => match statement_type(&statements[0]) {
                Some(kind) => return Ok(kind),
                None => debug!("Parsed statement is neither DML nor DDL, using keyword fallback"),
            },
            Ok(_) => debug!("Parser produced no statements, using keyword fallback"),
            Err(e) => debug!("Strict SQL parse failed: {}, using keyword fallback", e),
        }

        let tokens = Tokenizer::new(&dialect, sql)
            .tokenize()
            .map_err(|e| SyntaxError::ParseFailure(e.to_string()))?;

        let tokens: Vec<&Token> = tokens
            .iter()
            .filter(|t| {
                !matches!(
                    t,
                    Token::Whitespace(Whitespace::Space)
                        | Token::Whitespace(Whitespace::Newline)
                        | Token::Whitespace(Whitespace::Tab)
                )
            })
            .collect();
        if tokens.is_empty() {
            return Err(SyntaxError::ParseFailure("no statement found".to_string()));
        }

        if let Some(kind) = leading_statement_type(&tokens) {
            return Ok(kind);
        }

        // Undeterminable type: the first token itself must still be DML
        match tokens.first().and_then(|t| keyword_in(t, DML_KEYWORDS)) {
            Some(kind) => Ok(kind),
            None => Err(SyntaxError::UnknownStatementType),
        }
    }
}

/// None for statements outside DML/DDL (EXPLAIN, SHOW, SET, COMMIT, ...)
fn statement_type(statement: &Statement) -> Option<&'static str> {
    match statement {
        Statement::Query(_) => Some("SELECT"),
        Statement::Insert { .. } => Some("INSERT"),
        Statement::Update { .. } => Some("UPDATE"),
        Statement::Delete { .. } => Some("DELETE"),
        Statement::CreateTable { .. } => Some("CREATE"),
        Statement::AlterTable { .. } => Some("ALTER"),
        Statement::Drop { .. } => Some("DROP"),
        _ => None,
    }
}

/// Statement type from the first non-comment keyword; `WITH` defers to the
/// first DML keyword that follows it.
fn leading_statement_type(tokens: &[&Token]) -> Option<&'static str> {
    let mut significant = tokens
        .iter()
        .filter(|t| !matches!(t, Token::Whitespace(_)));

    let first = significant.next()?;
    if let Some(kind) = keyword_in(first, DML_KEYWORDS).or_else(|| keyword_in(first, DDL_KEYWORDS)) {
        return Some(kind);
    }
    if keyword_in(first, &["WITH"]).is_some() {
        return significant.find_map(|t| keyword_in(t, DML_KEYWORDS));
    }
    None
}

fn keyword_in(token: &Token, keywords: &[&'static str]) -> Option<&'static str> {
    match token {
        Token::Word(word) if word.quote_style.is_none() => {
            let upper = word.value.to_uppercase();
            keywords.iter().copied().find(|k| *k == upper)
        }
        _ => None,
    }
}
