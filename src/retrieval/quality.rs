//! Retrieval Quality Assessment
//!
//! Scores a set of retrieved chunks against the query on four lexical
//! dimensions and decides whether more retrieval is needed.

use crate::scoring::round2;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Overall confidence below this asks for more retrieval
pub const SUFFICIENT_CONFIDENCE: f64 = 0.70;

/// Words per chunk considered a decent amount of content
const DECENT_CHUNK_WORDS: f64 = 50.0;

/// A dimension below this is named in the reasoning
const WEAK_DIMENSION: f64 = 0.5;

lazy_static! {
    static ref TERM: Regex = Regex::new(r"\w+").unwrap();
    static ref QUERY_STOPWORDS: HashSet<&'static str> = [
        "the", "a", "an", "is", "are", "was", "were", "of", "for", "in", "on", "at", "to", "by",
        "show", "calculate", "get", "list", "what", "how", "when", "where", "who", "why",
    ]
    .into_iter()
    .collect();
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalDimensions {
    pub relevance: f64,
    pub coverage: f64,
    pub coherence: f64,
    pub sufficiency: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalAssessment {
    pub overall_confidence: f64,
    pub dimension_scores: RetrievalDimensions,
    pub needs_more_retrieval: bool,
    pub reasoning: String,
}

impl RetrievalAssessment {
    /// Assessment for an empty retrieval
    pub fn empty() -> Self {
        Self {
            overall_confidence: 0.0,
            dimension_scores: RetrievalDimensions::default(),
            needs_more_retrieval: true,
            reasoning: "No chunks retrieved.".to_string(),
        }
    }

    /// Assessment carrying only an overall confidence
    pub fn with_confidence(overall_confidence: f64) -> Self {
        Self {
            overall_confidence,
            dimension_scores: RetrievalDimensions::default(),
            needs_more_retrieval: overall_confidence < SUFFICIENT_CONFIDENCE,
            reasoning: String::new(),
        }
    }
}

/// Anything that can rate a retrieval
pub trait QualityAssessor: Send + Sync {
    fn assess(&self, query: &str, chunks: &[String]) -> RetrievalAssessment;
}

#[derive(Debug, Clone, Default)]
pub struct RetrievalQualityAssessor;

impl RetrievalQualityAssessor {
    pub fn new() -> Self {
        Self
    }

    /// Mean share of query terms found in each chunk
    pub fn relevance(&self, query: &str, chunks: &[String]) -> f64 {
        let query_terms = terms(query);
        if query_terms.is_empty() || chunks.is_empty() {
            return 0.0;
        }

        let total: f64 = chunks
            .iter()
            .map(|chunk| {
                let chunk_terms = terms(chunk);
                if chunk_terms.is_empty() {
                    0.0
                } else {
                    query_terms.intersection(&chunk_terms).count() as f64 / query_terms.len() as f64
                }
            })
            .sum();
        total / chunks.len() as f64
    }

    /// Share of significant query terms found anywhere in the chunks
    pub fn coverage(&self, query: &str, chunks: &[String]) -> f64 {
        let query_terms: HashSet<String> = terms(query)
            .into_iter()
            .filter(|t| !QUERY_STOPWORDS.contains(t.as_str()))
            .collect();
        if query_terms.is_empty() {
            return 1.0;
        }

        let chunk_terms = terms(&chunks.join(" "));
        query_terms.intersection(&chunk_terms).count() as f64 / query_terms.len() as f64
    }

    /// Lenient mapping of mean pairwise Jaccard similarity
    pub fn coherence(&self, chunks: &[String]) -> f64 {
        if chunks.len() <= 1 {
            return 1.0;
        }

        let term_sets: Vec<HashSet<String>> = chunks.iter().map(|c| terms(c)).collect();
        let mut scores = Vec::new();
        for i in 0..term_sets.len() {
            for j in (i + 1)..term_sets.len() {
                let (a, b) = (&term_sets[i], &term_sets[j]);
                if a.is_empty() || b.is_empty() {
                    scores.push(0.0);
                } else {
                    scores.push(a.intersection(b).count() as f64 / a.union(b).count() as f64);
                }
            }
        }

        let avg = scores.iter().sum::<f64>() / scores.len() as f64;
        (avg * 2.0 + 0.5).min(1.0)
    }

    pub fn sufficiency(&self, query: &str, chunks: &[String]) -> f64 {
        let relevance = self.relevance(query, chunks);
        let coverage = self.coverage(query, chunks);
        let avg_words = if chunks.is_empty() {
            0.0
        } else {
            chunks.iter().map(|c| c.split_whitespace().count()).sum::<usize>() as f64
                / chunks.len() as f64
        };
        let length_score = (avg_words / DECENT_CHUNK_WORDS).min(1.0);

        0.4 * relevance + 0.4 * coverage + 0.2 * length_score
    }
}

impl QualityAssessor for RetrievalQualityAssessor {
    fn assess(&self, query: &str, chunks: &[String]) -> RetrievalAssessment {
        if chunks.is_empty() {
            return RetrievalAssessment::empty();
        }

        let relevance = self.relevance(query, chunks);
        let coverage = self.coverage(query, chunks);
        let coherence = self.coherence(chunks);
        let sufficiency = self.sufficiency(query, chunks);

        let overall_confidence =
            round2(0.35 * relevance + 0.30 * coverage + 0.20 * coherence + 0.15 * sufficiency);

        let mut reasoning = Vec::new();
        if relevance < WEAK_DIMENSION {
            reasoning.push("Low relevance");
        }
        if coverage < WEAK_DIMENSION {
            reasoning.push("Missing key aspects");
        }
        if coherence < WEAK_DIMENSION {
            reasoning.push("Conflicting info");
        }
        if sufficiency < WEAK_DIMENSION {
            reasoning.push("Insufficient info");
        }

        RetrievalAssessment {
            overall_confidence,
            dimension_scores: RetrievalDimensions {
                relevance: round2(relevance),
                coverage: round2(coverage),
                coherence: round2(coherence),
                sufficiency: round2(sufficiency),
            },
            needs_more_retrieval: overall_confidence < SUFFICIENT_CONFIDENCE,
            reasoning: if reasoning.is_empty() {
                "Good quality retrieval".to_string()
            } else {
                reasoning.join(", ")
            },
        }
    }
}

fn terms(text: &str) -> HashSet<String> {
    let lower = text.to_lowercase();
    TERM.find_iter(&lower).map(|m| m.as_str().to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunks(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_empty_chunks() {
        let assessment = RetrievalQualityAssessor::new().assess("total revenue", &[]);
        assert_eq!(assessment.overall_confidence, 0.0);
        assert!(assessment.needs_more_retrieval);
        assert_eq!(assessment.reasoning, "No chunks retrieved.");
    }

    #[test]
    fn test_dimensions() {
        let assessor = RetrievalQualityAssessor::new();
        let retrieved = chunks(&["revenue by region", "region names"]);

        // query terms {revenue, by, region}: 3/3 and 1/3
        assert!((assessor.relevance("revenue by region", &retrieved) - 2.0 / 3.0).abs() < 1e-9);
        // "show" and "by" are stopwords
        assert_eq!(assessor.coverage("show revenue by year", &retrieved), 0.5);
        assert_eq!(assessor.coverage("show the", &retrieved), 1.0);
        // jaccard {region} / {revenue, by, region, names} = 0.25 -> 1.0
        assert_eq!(assessor.coherence(&retrieved), 1.0);
        assert_eq!(assessor.coherence(&chunks(&["a b", "c d"])), 0.5);
        assert_eq!(assessor.relevance("", &retrieved), 0.0);
    }

    #[test]
    fn test_sparse_retrieval_needs_more() {
        let assessment = RetrievalQualityAssessor::new()
            .assess("quarterly churn by segment", &chunks(&["unrelated text"]));
        assert!(assessment.needs_more_retrieval);
        assert!(assessment.reasoning.contains("Low relevance"));
        assert!(assessment.reasoning.contains("Missing key aspects"));
    }

    #[test]
    fn test_overall_is_rounded_and_bounded() {
        let assessment = RetrievalQualityAssessor::new().assess(
            "net revenue per region",
            &chunks(&["net revenue per region is stored in sales.net_revenue"]),
        );
        assert!(assessment.overall_confidence >= 0.0 && assessment.overall_confidence <= 1.0);
        assert_eq!(
            assessment.overall_confidence,
            (assessment.overall_confidence * 100.0).round() / 100.0
        );
        assert!(!assessment.needs_more_retrieval);
    }
}
