//! Reflective Corrector
//!
//! Bounded regenerate-and-verify loop. Each attempt looks up context for the
//! elements the verifier could not support, regenerates SQL with the widened
//! context and verifies the new candidate.

use crate::collaborators::Generator;
use crate::issues::{IssueKind, ValidationIssue};
use crate::retrieval::{AdaptiveRetriever, ChunkSet};
use crate::verification::{VerificationResult, Verifier};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

pub const MAX_CORRECTION_ATTEMPTS: usize = 3;

/// Chunks fetched per lookup query
const LOOKUP_K: usize = 1;

/// One regenerate-and-verify cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrectionAttempt {
    pub attempt: usize,
    pub issues_addressed: Vec<String>,
    pub new_sql: String,
    pub verification: VerificationResult,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReflectiveCorrection {
    pub success: bool,
    pub corrected_sql: String,
    pub attempts: usize,
    pub final_verification: Option<VerificationResult>,
    pub correction_log: Vec<CorrectionAttempt>,
}

pub struct ReflectiveCorrector {
    adaptive: Arc<AdaptiveRetriever>,
    generator: Arc<dyn Generator>,
    verifier: Arc<dyn Verifier>,
    max_attempts: usize,
}

impl ReflectiveCorrector {
    pub fn new(
        adaptive: Arc<AdaptiveRetriever>,
        generator: Arc<dyn Generator>,
        verifier: Arc<dyn Verifier>,
    ) -> Self {
        Self {
            adaptive,
            generator,
            verifier,
            max_attempts: MAX_CORRECTION_ATTEMPTS,
        }
    }

    pub fn correct(
        &self,
        sql: &str,
        query: &str,
        issues: &[ValidationIssue],
        chunks: &[String],
    ) -> ReflectiveCorrection {
        let mut current_sql = sql.to_string();
        let mut current_issues = issues.to_vec();
        let mut working_chunks: ChunkSet = chunks.iter().cloned().collect();
        let mut correction_log = Vec::new();
        let mut last_verification = None;

        for attempt in 1..=self.max_attempts {
            info!("Correction attempt {} of {}", attempt, self.max_attempts);

            for lookup in lookup_queries(query, &current_issues) {
                match self.adaptive.retriever().retrieve_context(&lookup, LOOKUP_K) {
                    Ok(found) => {
                        working_chunks.extend_unique(found);
                    }
                    Err(e) => warn!("Lookup '{}' failed: {}, skipping", lookup, e),
                }
            }

            let new_sql = match self.generator.generate(query, working_chunks.as_slice()) {
                Ok(sql) => sql,
                Err(e) => {
                    warn!("Regeneration failed: {}, keeping previous SQL", e);
                    current_sql.clone()
                }
            };

            let verification = self.verifier.verify(&new_sql, query, working_chunks.as_slice());

            correction_log.push(CorrectionAttempt {
                attempt,
                issues_addressed: current_issues.iter().map(|i| i.label().to_string()).collect(),
                new_sql: new_sql.clone(),
                verification: verification.clone(),
            });

            if verification.verified {
                info!("Correction succeeded on attempt {}", attempt);
                return ReflectiveCorrection {
                    success: true,
                    corrected_sql: new_sql,
                    attempts: attempt,
                    final_verification: Some(verification),
                    correction_log,
                };
            }

            current_sql = new_sql;
            current_issues = verification.issues.clone();
            last_verification = Some(verification);
        }

        warn!("Correction failed after {} attempts", self.max_attempts);
        ReflectiveCorrection {
            success: false,
            corrected_sql: current_sql,
            attempts: self.max_attempts,
            final_verification: last_verification,
            correction_log,
        }
    }
}

/// One lookup per unsupported element, or the user query when there are none
fn lookup_queries(query: &str, issues: &[ValidationIssue]) -> Vec<String> {
    let lookups: Vec<String> = issues
        .iter()
        .filter_map(|issue| match issue.kind {
            IssueKind::UnsupportedTable => {
                Some(format!("What is the correct table for {}?", issue.label()))
            }
            IssueKind::UnsupportedColumn => {
                Some(format!("What is the correct column for {}?", issue.label()))
            }
            _ => None,
        })
        .collect();

    if lookups.is_empty() {
        vec![query.to_string()]
    } else {
        lookups
    }
}
