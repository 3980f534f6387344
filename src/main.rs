use sql_reflect::config::{AppConfig, LlmConfig};
use sql_reflect::correction::{Correction, SyntacticCorrector};
use sql_reflect::llm::{LlmClient, LlmSqlGenerator};
use sql_reflect::metrics::ReflectionMetrics;
use sql_reflect::retrieval::{KeywordRetriever, QualityAssessor, RetrievalQualityAssessor};
use sql_reflect::{ConfidenceScorer, Retriever, SelfReflectiveOrchestrator};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sql-reflect")]
#[command(about = "SQL confidence scoring and self-reflective retrieval for NL-to-SQL")]
#[command(version)]
struct Args {
    /// Workspace file with schema, documents and default context
    #[arg(short, long, global = true, default_value = "workspace.json")]
    workspace: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score a SQL query against the workspace schema
    Score {
        sql: String,

        /// Business context item (repeatable); defaults to the workspace context
        #[arg(short, long)]
        context: Vec<String>,
    },
    /// Score a SQL query and apply rule-based fixes for its issues
    Correct {
        sql: String,

        #[arg(short, long)]
        context: Vec<String>,
    },
    /// Answer questions with the full self-reflective pipeline
    Query {
        /// One or more natural-language questions
        #[arg(required = true)]
        questions: Vec<String>,

        /// OpenAI API key (or set OPENAI_API_KEY env var)
        #[arg(long)]
        api_key: Option<String>,
    },
    /// Assess how well the document corpus covers a question
    Assess {
        question: String,

        /// Number of chunks to retrieve
        #[arg(short, long, default_value_t = 3)]
        k: usize,
    },
}

fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = AppConfig::load(&args.workspace)
        .with_context(|| format!("Failed to load workspace {}", args.workspace.display()))?;

    match args.command {
        Commands::Score { sql, context } => run_score(&config, &sql, context),
        Commands::Correct { sql, context } => run_correct(&config, &sql, context),
        Commands::Query { questions, api_key } => run_query(&config, questions, api_key),
        Commands::Assess { question, k } => run_assess(&config, &question, k),
    }
}

fn context_or_default(config: &AppConfig, context: Vec<String>) -> Vec<String> {
    if context.is_empty() {
        config.context.clone()
    } else {
        context
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run_score(config: &AppConfig, sql: &str, context: Vec<String>) -> Result<()> {
    let scorer = ConfidenceScorer::new(config.schema());
    let evaluation = scorer.evaluate(sql, &context_or_default(config, context));
    print_json(&evaluation)
}

#[derive(Serialize)]
struct CorrectionReport {
    original_confidence: f64,
    corrected_sql: Option<String>,
    corrected_confidence: Option<f64>,
}

fn run_correct(config: &AppConfig, sql: &str, context: Vec<String>) -> Result<()> {
    let context = context_or_default(config, context);
    let scorer = ConfidenceScorer::new(config.schema());
    let evaluation = scorer.evaluate(sql, &context);

    let report = match SyntacticCorrector::new().correct(sql, &evaluation.issues) {
        Correction::Corrected(fixed) => {
            let rescored = scorer.evaluate(&fixed, &context);
            info!(
                "Confidence {:.2} -> {:.2}",
                evaluation.overall_confidence, rescored.overall_confidence
            );
            CorrectionReport {
                original_confidence: evaluation.overall_confidence,
                corrected_confidence: Some(rescored.overall_confidence),
                corrected_sql: Some(fixed),
            }
        }
        Correction::Unchanged => {
            info!("No rule-based fix applies");
            CorrectionReport {
                original_confidence: evaluation.overall_confidence,
                corrected_sql: None,
                corrected_confidence: None,
            }
        }
    };
    print_json(&report)
}

fn run_query(config: &AppConfig, questions: Vec<String>, api_key: Option<String>) -> Result<()> {
    let llm_config = LlmConfig::from_env(api_key)?;
    let client = LlmClient::new(llm_config)?;

    let orchestrator = SelfReflectiveOrchestrator::new(
        Arc::new(KeywordRetriever::new(config.documents.clone())),
        Arc::new(LlmSqlGenerator::new(client)),
        Arc::new(ConfidenceScorer::new(config.schema())),
    );

    let outcomes: Vec<_> = questions
        .iter()
        .map(|question| orchestrator.query_with_reflection(question))
        .collect();

    for outcome in &outcomes {
        print_json(outcome)?;
    }

    if outcomes.len() > 1 {
        if let Some(metrics) = ReflectionMetrics::calculate(&outcomes) {
            print_json(&metrics)?;
        }
    }
    Ok(())
}

fn run_assess(config: &AppConfig, question: &str, k: usize) -> Result<()> {
    let retriever = KeywordRetriever::new(config.documents.clone());
    let chunks = retriever.retrieve_context(question, k)?;
    let assessment = RetrievalQualityAssessor::new().assess(question, &chunks);
    print_json(&assessment)
}
