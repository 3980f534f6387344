pub mod collaborators;
pub mod config;
pub mod correction;
pub mod error;
pub mod issues;
pub mod llm;
pub mod metrics;
pub mod orchestrator;
pub mod retrieval;
pub mod schema;
pub mod scoring;
pub mod validation;
pub mod verification;

pub use collaborators::{Generator, Retriever, ScoreReport, Scorer};
pub use error::{ReflectError, Result};
pub use orchestrator::{ReflectionOutcome, RunStatus, SelfReflectiveOrchestrator};
pub use schema::Schema;
pub use scoring::{ConfidenceScorer, Evaluation, Recommendation};
