//! Adaptive Retrieval
//!
//! Bounded loop that widens `k` until the accumulated chunks are judged
//! sufficient or the iteration budget runs out.

use crate::collaborators::Retriever;
use crate::retrieval::chunks::ChunkSet;
use crate::retrieval::quality::{QualityAssessor, RetrievalAssessment, SUFFICIENT_CONFIDENCE};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

pub const MAX_RETRIEVAL_ITERATIONS: usize = 5;
pub const INITIAL_K: usize = 3;

/// Confidence below this widens `k` by the large step
const VERY_LOW_CONFIDENCE: f64 = 0.40;
const LARGE_K_STEP: usize = 5;
const SMALL_K_STEP: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalStatus {
    Sufficient,
    MaxIterationsReached,
}

/// One pass of the retrieval loop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalIteration {
    pub iteration: usize,
    pub k_requested: usize,
    pub new_unique_chunks: usize,
    pub total_chunks: usize,
    pub confidence: f64,
    pub assessment: RetrievalAssessment,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptiveRetrieval {
    pub chunks: Vec<String>,
    pub final_confidence: f64,
    pub iterations: usize,
    pub total_chunks_retrieved: usize,
    pub status: RetrievalStatus,
    pub retrieval_log: Vec<RetrievalIteration>,
}

pub struct AdaptiveRetriever {
    retriever: Arc<dyn Retriever>,
    assessor: Arc<dyn QualityAssessor>,
    max_iterations: usize,
    confidence_threshold: f64,
}

impl AdaptiveRetriever {
    pub fn new(retriever: Arc<dyn Retriever>, assessor: Arc<dyn QualityAssessor>) -> Self {
        Self {
            retriever,
            assessor,
            max_iterations: MAX_RETRIEVAL_ITERATIONS,
            confidence_threshold: SUFFICIENT_CONFIDENCE,
        }
    }

    /// The underlying retriever, shared with the reflective corrector
    pub fn retriever(&self) -> &Arc<dyn Retriever> {
        &self.retriever
    }

    pub fn retrieve_adaptively(&self, query: &str) -> AdaptiveRetrieval {
        let mut current_k = INITIAL_K;
        let mut chunks = ChunkSet::new();
        let mut retrieval_log = Vec::new();
        let mut confidence = 0.0;
        let mut status = RetrievalStatus::MaxIterationsReached;

        for iteration in 1..=self.max_iterations {
            let batch = match self.retriever.retrieve_context(query, current_k) {
                Ok(batch) => batch,
                Err(e) => {
                    warn!("Retriever failed on iteration {}: {}, treating as empty batch", iteration, e);
                    Vec::new()
                }
            };
            let new_unique_chunks = chunks.extend_unique(batch);

            // Assess everything gathered so far, not just the new batch
            let assessment = self.assessor.assess(query, chunks.as_slice());
            confidence = assessment.overall_confidence;

            info!(
                "Retrieval iteration {} of {}: k={}, new={}, total={}, confidence={:.2}",
                iteration,
                self.max_iterations,
                current_k,
                new_unique_chunks,
                chunks.len(),
                confidence
            );

            retrieval_log.push(RetrievalIteration {
                iteration,
                k_requested: current_k,
                new_unique_chunks,
                total_chunks: chunks.len(),
                confidence,
                assessment,
            });

            if confidence >= self.confidence_threshold {
                status = RetrievalStatus::Sufficient;
                break;
            }

            current_k += if confidence < VERY_LOW_CONFIDENCE {
                LARGE_K_STEP
            } else {
                SMALL_K_STEP
            };
        }

        if status == RetrievalStatus::MaxIterationsReached {
            warn!(
                "Retrieval stopped after {} iterations at confidence {:.2}",
                self.max_iterations, confidence
            );
        }

        AdaptiveRetrieval {
            total_chunks_retrieved: chunks.len(),
            chunks: chunks.into_vec(),
            final_confidence: confidence,
            iterations: retrieval_log.len(),
            status,
            retrieval_log,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ReflectError, Result};
    use std::sync::Mutex;

    struct CountingRetriever {
        requested: Mutex<Vec<usize>>,
    }

    impl Retriever for CountingRetriever {
        fn retrieve_context(&self, _query: &str, k: usize) -> Result<Vec<String>> {
            self.requested.lock().unwrap().push(k);
            Ok((0..k).map(|i| format!("chunk {}", i)).collect())
        }
    }

    struct FailingRetriever;

    impl Retriever for FailingRetriever {
        fn retrieve_context(&self, _query: &str, _k: usize) -> Result<Vec<String>> {
            Err(ReflectError::Retrieval("index offline".to_string()))
        }
    }

    struct FixedAssessor(f64);

    impl QualityAssessor for FixedAssessor {
        fn assess(&self, _query: &str, _chunks: &[String]) -> RetrievalAssessment {
            RetrievalAssessment::with_confidence(self.0)
        }
    }

    #[test]
    fn test_k_grows_by_confidence_band() {
        let retriever = Arc::new(CountingRetriever {
            requested: Mutex::new(Vec::new()),
        });
        let adaptive = AdaptiveRetriever::new(retriever.clone(), Arc::new(FixedAssessor(0.1)));
        let result = adaptive.retrieve_adaptively("revenue");

        assert_eq!(result.iterations, MAX_RETRIEVAL_ITERATIONS);
        assert_eq!(result.status, RetrievalStatus::MaxIterationsReached);
        assert_eq!(*retriever.requested.lock().unwrap(), vec![3, 8, 13, 18, 23]);
        // Batches overlap, so only the widest one determines the total
        assert_eq!(result.total_chunks_retrieved, 23);
        assert_eq!(result.retrieval_log[1].new_unique_chunks, 5);

        let retriever = Arc::new(CountingRetriever {
            requested: Mutex::new(Vec::new()),
        });
        let adaptive = AdaptiveRetriever::new(retriever.clone(), Arc::new(FixedAssessor(0.5)));
        adaptive.retrieve_adaptively("revenue");
        assert_eq!(*retriever.requested.lock().unwrap(), vec![3, 5, 7, 9, 11]);
    }

    #[test]
    fn test_retriever_failure_is_an_empty_batch() {
        let adaptive = AdaptiveRetriever::new(Arc::new(FailingRetriever), Arc::new(FixedAssessor(0.9)));
        let result = adaptive.retrieve_adaptively("revenue");
        assert!(result.chunks.is_empty());
        assert_eq!(result.iterations, 1);
        assert_eq!(result.status, RetrievalStatus::Sufficient);
    }
}
