//! Keyword Retriever
//!
//! In-memory retriever over a document corpus. Documents are ranked by how
//! many distinct query terms they contain; ties keep corpus order and
//! documents sharing no term with the query are never returned.

use crate::collaborators::Retriever;
use crate::error::Result;
use itertools::Itertools;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;
use tracing::debug;

lazy_static! {
    static ref TERM: Regex = Regex::new(r"\w+").unwrap();
}

pub struct KeywordRetriever {
    documents: Vec<String>,
    term_sets: Vec<HashSet<String>>,
}

impl KeywordRetriever {
    pub fn new(documents: Vec<String>) -> Self {
        let term_sets = documents.iter().map(|d| terms(d)).collect();
        Self {
            documents,
            term_sets,
        }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl Retriever for KeywordRetriever {
    fn retrieve_context(&self, query: &str, k: usize) -> Result<Vec<String>> {
        let query_terms = terms(query);

        let ranked: Vec<String> = self
            .term_sets
            .iter()
            .enumerate()
            .map(|(idx, doc_terms)| (idx, doc_terms.intersection(&query_terms).count()))
            .filter(|(_, overlap)| *overlap > 0)
            .sorted_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)))
            .take(k)
            .map(|(idx, _)| self.documents[idx].clone())
            .collect();

        debug!("Keyword retrieval: k={} matched={}", k, ranked.len());
        Ok(ranked)
    }
}

fn terms(text: &str) -> HashSet<String> {
    let lower = text.to_lowercase();
    TERM.find_iter(&lower).map(|m| m.as_str().to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> KeywordRetriever {
        KeywordRetriever::new(vec![
            "Customers are identified by email.".to_string(),
            "Revenue is stored in sales.net_revenue per region.".to_string(),
            "Fiscal year is sales.fiscal_year; revenue reporting uses it.".to_string(),
        ])
    }

    #[test]
    fn test_ranks_by_term_overlap() {
        let chunks = corpus().retrieve_context("revenue per region", 2).unwrap();
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].contains("per region"));
        assert!(chunks[1].contains("Fiscal year"));
    }

    #[test]
    fn test_no_overlap_returns_nothing() {
        assert!(corpus().retrieve_context("zebra", 5).unwrap().is_empty());
        assert_eq!(corpus().len(), 3);
    }
}
