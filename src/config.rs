//! Configuration
//!
//! The workspace file (JSON) carries the business schema, the document corpus
//! the keyword retriever searches, and optional default business context.
//! LLM settings come from the environment.

use crate::error::{ReflectError, Result};
use crate::schema::Schema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// table name -> column names
    pub schema: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub documents: Vec<String>,
    #[serde(default)]
    pub context: Vec<String>,
}

impl AppConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config = Self::from_json(&raw)?;
        info!(
            "Loaded workspace {}: {} tables, {} documents",
            path.display(),
            config.schema.len(),
            config.documents.len()
        );
        Ok(config)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let config: AppConfig = serde_json::from_str(raw)?;
        if let Some((table, _)) = config.schema.iter().find(|(_, columns)| columns.is_empty()) {
            return Err(ReflectError::Config(format!(
                "table '{}' has no columns",
                table
            )));
        }
        Ok(config)
    }

    pub fn schema(&self) -> Schema {
        Schema::new(self.schema.iter())
    }
}

/// Connection settings for an OpenAI-compatible endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    60
}

impl LlmConfig {
    /// Read OPENAI_API_KEY, OPENAI_MODEL, OPENAI_BASE_URL and OPENAI_TIMEOUT_SECS;
    /// an explicit key wins over the environment
    pub fn from_env(api_key: Option<String>) -> Result<Self> {
        Self::from_lookup(api_key, |name| std::env::var(name).ok())
    }

    fn from_lookup(api_key: Option<String>, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_key = match api_key.or_else(|| lookup("OPENAI_API_KEY")) {
            Some(key) => key,
            None => return Err(ReflectError::Config("OPENAI_API_KEY is not set".to_string())),
        };
        let model = lookup("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let base_url = lookup("OPENAI_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let timeout_secs = match lookup("OPENAI_TIMEOUT_SECS") {
            Some(raw) => raw.parse().map_err(|_| {
                ReflectError::Config(format!("OPENAI_TIMEOUT_SECS is not a number: {}", raw))
            })?,
            None => default_timeout_secs(),
        };

        Ok(Self {
            api_key,
            model,
            base_url,
            timeout_secs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_workspace() {
        let config = AppConfig::from_json(
            r#"{
                "schema": {"Sales": ["region", "net_revenue"]},
                "documents": ["Revenue is net_revenue."]
            }"#,
        )
        .unwrap();
        assert_eq!(config.documents.len(), 1);
        assert!(config.context.is_empty());

        let schema = config.schema();
        assert!(schema.contains_table("sales"));
        assert_eq!(schema.business_tables(), &["sales".to_string()]);
    }

    #[test]
    fn test_rejects_table_without_columns() {
        let err = AppConfig::from_json(r#"{"schema": {"sales": []}}"#).unwrap_err();
        assert!(matches!(err, ReflectError::Config(_)));
    }

    #[test]
    fn test_rejects_malformed_json() {
        assert!(matches!(
            AppConfig::from_json("{ not json"),
            Err(ReflectError::Json(_))
        ));
    }

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: Vec<(String, String)> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name| vars.iter().find(|(k, _)| k == name).map(|(_, v)| v.clone())
    }

    #[test]
    fn test_explicit_api_key_wins() {
        let config = LlmConfig::from_lookup(
            Some("sk-flag".to_string()),
            env(&[("OPENAI_API_KEY", "sk-env")]),
        )
        .unwrap();
        assert_eq!(config.api_key, "sk-flag");
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.timeout_secs, 60);
    }

    #[test]
    fn test_llm_settings_from_environment() {
        let config = LlmConfig::from_lookup(
            None,
            env(&[
                ("OPENAI_API_KEY", "sk-env"),
                ("OPENAI_MODEL", "gpt-4o"),
                ("OPENAI_TIMEOUT_SECS", "5"),
            ]),
        )
        .unwrap();
        assert_eq!(config.api_key, "sk-env");
        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.timeout_secs, 5);
    }

    #[test]
    fn test_missing_key_and_bad_timeout_are_config_errors() {
        assert!(matches!(
            LlmConfig::from_lookup(None, env(&[])),
            Err(ReflectError::Config(_))
        ));
        assert!(matches!(
            LlmConfig::from_lookup(
                Some("sk".to_string()),
                env(&[("OPENAI_TIMEOUT_SECS", "soon")])
            ),
            Err(ReflectError::Config(_))
        ));
    }
}
