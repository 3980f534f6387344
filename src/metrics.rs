//! Reflection Metrics
//!
//! Aggregate statistics over a batch of pipeline runs: retrieval volume
//! against a fixed-k baseline, how often correction fired and worked, and
//! how well confidence tracks outcome.

use crate::orchestrator::{ReflectionOutcome, RunStatus};
use serde::{Deserialize, Serialize};

/// Chunks a fixed-k retriever would fetch per query
pub const BASELINE_K: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalEfficiency {
    pub avg_chunks_retrieved: f64,
    pub avg_iterations: f64,
    /// Negative when adaptive retrieval used more than the baseline
    pub chunks_saved_total: i64,
    pub efficiency_gain_pct: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorrectionStats {
    pub trigger_rate: f64,
    pub success_rate: f64,
    pub avg_attempts: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceCalibration {
    /// Pearson correlation between confidence and success
    pub correlation: f64,
    pub avg_confidence: f64,
    pub avg_success_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReflectionMetrics {
    pub retrieval_efficiency: RetrievalEfficiency,
    pub self_correction: CorrectionStats,
    pub confidence_calibration: ConfidenceCalibration,
    pub total_queries: usize,
}

impl ReflectionMetrics {
    /// None for an empty batch
    pub fn calculate(outcomes: &[ReflectionOutcome]) -> Option<Self> {
        if outcomes.is_empty() {
            return None;
        }

        Some(Self {
            retrieval_efficiency: retrieval_efficiency(outcomes),
            self_correction: correction_stats(outcomes),
            confidence_calibration: calibration(outcomes),
            total_queries: outcomes.len(),
        })
    }
}

fn retrieval_efficiency(outcomes: &[ReflectionOutcome]) -> RetrievalEfficiency {
    let count = outcomes.len();
    let total_chunks: usize = outcomes.iter().map(|o| o.chunks_used).sum();
    let total_iterations: usize = outcomes.iter().map(|o| o.retrieval_iterations).sum();

    let baseline = (count * BASELINE_K) as i64;
    let saved = baseline - total_chunks as i64;

    RetrievalEfficiency {
        avg_chunks_retrieved: total_chunks as f64 / count as f64,
        avg_iterations: total_iterations as f64 / count as f64,
        chunks_saved_total: saved,
        efficiency_gain_pct: if baseline == 0 {
            0.0
        } else {
            saved as f64 / baseline as f64 * 100.0
        },
    }
}

fn correction_stats(outcomes: &[ReflectionOutcome]) -> CorrectionStats {
    let corrected: Vec<&ReflectionOutcome> = outcomes
        .iter()
        .filter(|o| o.correction_attempts > 0)
        .collect();
    if corrected.is_empty() {
        return CorrectionStats::default();
    }

    let successes = corrected
        .iter()
        .filter(|o| o.status == RunStatus::Success)
        .count();
    let attempts: usize = corrected.iter().map(|o| o.correction_attempts).sum();

    CorrectionStats {
        trigger_rate: corrected.len() as f64 / outcomes.len() as f64,
        success_rate: successes as f64 / corrected.len() as f64,
        avg_attempts: attempts as f64 / corrected.len() as f64,
    }
}

fn calibration(outcomes: &[ReflectionOutcome]) -> ConfidenceCalibration {
    let confidences: Vec<f64> = outcomes.iter().map(|o| o.sql_confidence).collect();
    let successes: Vec<f64> = outcomes
        .iter()
        .map(|o| if o.status == RunStatus::Success { 1.0 } else { 0.0 })
        .collect();

    let n = outcomes.len() as f64;
    let mean_confidence = confidences.iter().sum::<f64>() / n;
    let mean_success = successes.iter().sum::<f64>() / n;

    let correlation = if outcomes.len() < 2 {
        0.0
    } else {
        let numerator: f64 = confidences
            .iter()
            .zip(&successes)
            .map(|(c, s)| (c - mean_confidence) * (s - mean_success))
            .sum();
        let confidence_var: f64 = confidences.iter().map(|c| (c - mean_confidence).powi(2)).sum();
        let success_var: f64 = successes.iter().map(|s| (s - mean_success).powi(2)).sum();
        let denominator = (confidence_var * success_var).sqrt();
        if denominator == 0.0 {
            0.0
        } else {
            numerator / denominator
        }
    };

    ConfidenceCalibration {
        correlation,
        avg_confidence: mean_confidence,
        avg_success_rate: mean_success,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::Recommendation;

    fn outcome(confidence: f64, chunks: usize, iterations: usize, attempts: usize) -> ReflectionOutcome {
        ReflectionOutcome {
            invocation_id: "test".to_string(),
            status: if confidence >= 0.70 {
                RunStatus::Success
            } else {
                RunStatus::LowConfidence
            },
            sql: "SELECT 1".to_string(),
            sql_confidence: confidence,
            retrieval_confidence: 0.8,
            chunks_used: chunks,
            retrieval_iterations: iterations,
            correction_attempts: attempts,
            total_time_ms: 1.0,
            self_reflection_log: Vec::new(),
            recommendation: Recommendation::from_confidence(confidence),
        }
    }

    #[test]
    fn test_empty_batch() {
        assert!(ReflectionMetrics::calculate(&[]).is_none());
    }

    #[test]
    fn test_batch_metrics() {
        let outcomes = vec![
            outcome(0.9, 3, 1, 0),
            outcome(0.8, 5, 2, 1),
            outcome(0.4, 13, 5, 3),
            outcome(0.3, 3, 1, 0),
        ];
        let metrics = ReflectionMetrics::calculate(&outcomes).unwrap();

        assert_eq!(metrics.total_queries, 4);
        assert_eq!(metrics.retrieval_efficiency.avg_chunks_retrieved, 6.0);
        assert_eq!(metrics.retrieval_efficiency.avg_iterations, 2.25);
        assert_eq!(metrics.retrieval_efficiency.chunks_saved_total, -4);
        assert_eq!(metrics.retrieval_efficiency.efficiency_gain_pct, -20.0);

        assert_eq!(metrics.self_correction.trigger_rate, 0.5);
        assert_eq!(metrics.self_correction.success_rate, 0.5);
        assert_eq!(metrics.self_correction.avg_attempts, 2.0);

        assert!(metrics.confidence_calibration.correlation > 0.8);
        assert_eq!(metrics.confidence_calibration.avg_success_rate, 0.5);
    }

    #[test]
    fn test_single_outcome_has_zero_correlation() {
        let metrics = ReflectionMetrics::calculate(&[outcome(0.9, 3, 1, 0)]).unwrap();
        assert_eq!(metrics.confidence_calibration.correlation, 0.0);
        assert_eq!(metrics.self_correction, CorrectionStats::default());
    }
}
