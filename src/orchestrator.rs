//! Self-Reflective Orchestrator
//!
//! Runs one question through retrieval, generation, scoring, verification
//! and (when needed) reflective correction. Collaborator failures never abort
//! a run: each one is replaced by a fallback value and the run continues.

use crate::collaborators::{Generator, Retriever, ScoreReport, Scorer};
use crate::correction::ReflectiveCorrector;
use crate::issues::{IssueKind, Severity, ValidationIssue};
use crate::retrieval::{AdaptiveRetriever, QualityAssessor, RetrievalQualityAssessor};
use crate::scoring::Recommendation;
use crate::verification::{AnswerVerifier, Verifier};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, info_span, warn};
use uuid::Uuid;

/// SQL substituted when generation fails
pub const GENERATION_FALLBACK_SQL: &str = "SELECT 'Error in generation' AS error";

/// Confidence assumed when scoring the first candidate fails
const SCORING_FALLBACK_CONFIDENCE: f64 = 0.5;

/// Confidence assumed when re-scoring a corrected candidate fails
const RESCORE_FALLBACK_CONFIDENCE: f64 = 0.8;

/// Below this the candidate is corrected and the run reports low confidence
pub const ACCEPTABLE_CONFIDENCE: f64 = 0.70;

/// One entry of the per-run reflection log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum PhaseRecord {
    AdaptiveRetrieval {
        confidence: f64,
        chunks_retrieved: usize,
        iterations: usize,
    },
    Generation {
        sql: String,
        fallback: bool,
    },
    SqlValidation {
        confidence: f64,
        recommendation: Recommendation,
    },
    Verification {
        verified: bool,
        faithfulness: f64,
    },
    SelfCorrection {
        success: bool,
        attempts: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    LowConfidence,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReflectionOutcome {
    pub invocation_id: String,
    pub status: RunStatus,
    pub sql: String,
    pub sql_confidence: f64,
    pub retrieval_confidence: f64,
    pub chunks_used: usize,
    pub retrieval_iterations: usize,
    pub correction_attempts: usize,
    pub total_time_ms: f64,
    pub self_reflection_log: Vec<PhaseRecord>,
    pub recommendation: Recommendation,
}

pub struct SelfReflectiveOrchestrator {
    adaptive: Arc<AdaptiveRetriever>,
    generator: Arc<dyn Generator>,
    scorer: Arc<dyn Scorer>,
    verifier: Arc<dyn Verifier>,
    corrector: ReflectiveCorrector,
}

impl SelfReflectiveOrchestrator {
    /// Wire the pipeline with the built-in assessor and verifier
    pub fn new(
        retriever: Arc<dyn Retriever>,
        generator: Arc<dyn Generator>,
        scorer: Arc<dyn Scorer>,
    ) -> Self {
        Self::with_components(
            retriever,
            Arc::new(RetrievalQualityAssessor::new()),
            generator,
            scorer,
            Arc::new(AnswerVerifier::new()),
        )
    }

    pub fn with_components(
        retriever: Arc<dyn Retriever>,
        assessor: Arc<dyn QualityAssessor>,
        generator: Arc<dyn Generator>,
        scorer: Arc<dyn Scorer>,
        verifier: Arc<dyn Verifier>,
    ) -> Self {
        let adaptive = Arc::new(AdaptiveRetriever::new(retriever, assessor));
        let corrector = ReflectiveCorrector::new(
            Arc::clone(&adaptive),
            Arc::clone(&generator),
            Arc::clone(&verifier),
        );
        Self {
            adaptive,
            generator,
            scorer,
            verifier,
            corrector,
        }
    }

    pub fn query_with_reflection(&self, user_query: &str) -> ReflectionOutcome {
        let invocation_id = Uuid::new_v4().to_string();
        let span = info_span!("reflection", invocation_id = %invocation_id);
        let _guard = span.enter();

        let start = Instant::now();
        let mut log = Vec::new();

        // Retrieving
        let retrieval = self.adaptive.retrieve_adaptively(user_query);
        let chunks = retrieval.chunks;
        let retrieval_confidence = retrieval.final_confidence;
        info!(
            "Retrieved {} chunks with confidence {:.2}",
            chunks.len(),
            retrieval_confidence
        );
        log.push(PhaseRecord::AdaptiveRetrieval {
            confidence: retrieval_confidence,
            chunks_retrieved: chunks.len(),
            iterations: retrieval.iterations,
        });

        // Generating
        let (sql, fallback) = match self.generator.generate(user_query, &chunks) {
            Ok(sql) => (sql, false),
            Err(e) => {
                warn!("SQL generation failed: {}, using fallback SQL", e);
                (GENERATION_FALLBACK_SQL.to_string(), true)
            }
        };
        info!("Generated SQL: {}", sql);
        log.push(PhaseRecord::Generation {
            sql: sql.clone(),
            fallback,
        });

        // Scoring
        let report = match self.scorer.score(&sql, user_query, &chunks) {
            Ok(report) => report,
            Err(e) => {
                warn!("Scoring failed: {}, defaulting to REVIEW", e);
                ScoreReport {
                    overall_confidence: SCORING_FALLBACK_CONFIDENCE,
                    recommendation: Recommendation::Review,
                }
            }
        };
        let mut sql_confidence = report.overall_confidence;
        let mut recommendation = report.recommendation;
        info!("SQL confidence {:.2}, recommendation {}", sql_confidence, recommendation);
        log.push(PhaseRecord::SqlValidation {
            confidence: sql_confidence,
            recommendation,
        });

        // Verifying
        let verification = self.verifier.verify(&sql, user_query, &chunks);
        info!(
            "Verified: {}, faithfulness {:.2}",
            verification.verified, verification.faithfulness_score
        );
        log.push(PhaseRecord::Verification {
            verified: verification.verified,
            faithfulness: verification.faithfulness_score,
        });

        // Correcting
        let mut final_sql = sql;
        let mut correction_attempts = 0;
        if !verification.verified || sql_confidence < ACCEPTABLE_CONFIDENCE {
            let mut issues = verification.issues.clone();
            if sql_confidence < ACCEPTABLE_CONFIDENCE {
                issues.push(
                    ValidationIssue::new(
                        IssueKind::LowConfidence,
                        Severity::Medium,
                        format!("SQL confidence {:.2} is below {:.2}", sql_confidence, ACCEPTABLE_CONFIDENCE),
                    )
                    .with_subject(recommendation.as_str()),
                );
            }

            let correction = self.corrector.correct(&final_sql, user_query, &issues, &chunks);
            correction_attempts = correction.attempts;

            if correction.success {
                final_sql = correction.corrected_sql;
                let rescored = match self.scorer.score(&final_sql, user_query, &chunks) {
                    Ok(report) => report,
                    Err(e) => {
                        warn!("Re-scoring failed: {}, assuming {:.2}", e, RESCORE_FALLBACK_CONFIDENCE);
                        ScoreReport::new(RESCORE_FALLBACK_CONFIDENCE)
                    }
                };
                sql_confidence = rescored.overall_confidence;
                recommendation = rescored.recommendation;
                info!(
                    "Corrected after {} attempts, new confidence {:.2}",
                    correction_attempts, sql_confidence
                );
            } else {
                // Unverified candidates were never scored; the first SQL and its score stand
                warn!(
                    "Correction failed after {} attempts, keeping the generated SQL",
                    correction_attempts
                );
            }

            log.push(PhaseRecord::SelfCorrection {
                success: correction.success,
                attempts: correction_attempts,
            });
        }

        let status = if sql_confidence >= ACCEPTABLE_CONFIDENCE {
            RunStatus::Success
        } else {
            RunStatus::LowConfidence
        };

        ReflectionOutcome {
            invocation_id,
            status,
            sql: final_sql,
            sql_confidence,
            retrieval_confidence,
            chunks_used: chunks.len(),
            retrieval_iterations: retrieval.iterations,
            correction_attempts,
            total_time_ms: start.elapsed().as_secs_f64() * 1000.0,
            self_reflection_log: log,
            recommendation,
        }
    }
}
