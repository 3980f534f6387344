//! Collaborator Traits - capabilities the pipeline is wired with
//!
//! Implementations:
//! - KeywordRetriever: term-overlap ranking over a local document corpus
//! - LlmSqlGenerator: chat-completions backed SQL generation
//! - ConfidenceScorer: rule-based four-dimension validation

use crate::error::Result;
use crate::scoring::Recommendation;
use serde::{Deserialize, Serialize};

/// Fetches context chunks for a query
pub trait Retriever: Send + Sync {
    /// Up to `k` chunks; may be shorter and may repeat earlier results
    fn retrieve_context(&self, query: &str, k: usize) -> Result<Vec<String>>;
}

/// Produces SQL from a question and its context
pub trait Generator: Send + Sync {
    fn generate(&self, query: &str, chunks: &[String]) -> Result<String>;
}

/// Rates a SQL candidate; must be side-effect free
pub trait Scorer: Send + Sync {
    fn score(&self, sql: &str, query: &str, chunks: &[String]) -> Result<ScoreReport>;
}

/// What the pipeline needs back from a scorer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreReport {
    pub overall_confidence: f64,
    pub recommendation: Recommendation,
}

impl ScoreReport {
    pub fn new(overall_confidence: f64) -> Self {
        Self {
            overall_confidence,
            recommendation: Recommendation::from_confidence(overall_confidence),
        }
    }
}
