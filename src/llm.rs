//! LLM client and SQL generator
//!
//! Blocking chat-completions client plus the `Generator` implementation that
//! turns a question and its context chunks into a PostgreSQL query.

use crate::collaborators::Generator;
use crate::config::LlmConfig;
use crate::error::{ReflectError, Result};
use std::time::Duration;
use tracing::{debug, warn};

const SQL_SYSTEM_PROMPT: &str = "You are a senior PostgreSQL engineer. \
Write one valid PostgreSQL 14 query that answers the question using only the tables and \
columns named in the context. Use double quotes for case-sensitive identifiers, never backticks. \
Return the SQL only, with no explanation.";

pub struct LlmClient {
    config: LlmConfig,
    http: reqwest::blocking::Client,
}

impl LlmClient {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ReflectError::Llm(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { config, http })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Send one system + user exchange and return the reply text
    pub fn call_llm(&self, system: &str, prompt: &str) -> Result<String> {
        let mut body = serde_json::json!({
            "model": self.config.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": prompt}
            ],
            "temperature": 0.0,
        });

        // Newer models reject max_tokens
        if self.config.model.starts_with("gpt-4") || self.config.model.starts_with("gpt-5") {
            body["max_completion_tokens"] = serde_json::json!(800);
        } else {
            body["max_tokens"] = serde_json::json!(800);
        }

        let response = self
            .http
            .post(format!("{}/chat/completions", self.config.base_url.trim_end_matches('/')))
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .map_err(|e| ReflectError::Llm(format!("LLM API call failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ReflectError::Llm(format!("LLM API error ({}): {}", status, error_text)));
        }

        let response_json: serde_json::Value = response
            .json()
            .map_err(|e| ReflectError::Llm(format!("Failed to parse LLM response: {}", e)))?;

        extract_content(&response_json)
    }
}

/// Pull `choices[0].message.content` out of a chat-completions response
fn extract_content(response: &serde_json::Value) -> Result<String> {
    if let Some(error) = response.get("error") {
        return Err(ReflectError::Llm(format!("LLM API error: {}", error)));
    }

    let choice = response
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .ok_or_else(|| ReflectError::Llm("No choices in LLM response".to_string()))?;

    match choice.get("finish_reason").and_then(|r| r.as_str()) {
        Some("length") => warn!("LLM response was truncated due to length limit"),
        Some("content_filter") => {
            return Err(ReflectError::Llm(
                "LLM response was filtered by content policy".to_string(),
            ))
        }
        _ => {}
    }

    let content = choice["message"]["content"]
        .as_str()
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| ReflectError::Llm("Empty content in LLM response".to_string()))?;

    Ok(content.to_string())
}

/// Remove markdown code fences around generated SQL
pub fn strip_code_fences(reply: &str) -> String {
    reply.replace("```sql", "").replace("```", "").trim().to_string()
}

/// `Generator` backed by an LLM
pub struct LlmSqlGenerator {
    client: LlmClient,
}

impl LlmSqlGenerator {
    pub fn new(client: LlmClient) -> Self {
        Self { client }
    }

    fn build_prompt(query: &str, chunks: &[String]) -> String {
        format!(
            "Context:\n{}\n\nQuestion: {}\n\nSQL:",
            chunks.join("\n\n"),
            query
        )
    }
}

impl Generator for LlmSqlGenerator {
    fn generate(&self, query: &str, chunks: &[String]) -> Result<String> {
        let prompt = Self::build_prompt(query, chunks);
        debug!("Generating SQL with {} using {} chunks", self.client.model(), chunks.len());

        let reply = self
            .client
            .call_llm(SQL_SYSTEM_PROMPT, &prompt)
            .map_err(|e| ReflectError::Generation(e.to_string()))?;

        let sql = strip_code_fences(&reply);
        if sql.is_empty() {
            return Err(ReflectError::Generation("LLM returned no SQL".to_string()));
        }
        Ok(sql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(
            strip_code_fences("```sql\nSELECT region FROM sales\n```"),
            "SELECT region FROM sales"
        );
        assert_eq!(strip_code_fences("  SELECT 1 "), "SELECT 1");
    }

    #[test]
    fn test_extract_content() {
        let response = serde_json::json!({
            "choices": [{"message": {"content": "SELECT 1"}, "finish_reason": "stop"}]
        });
        assert_eq!(extract_content(&response).unwrap(), "SELECT 1");

        let filtered = serde_json::json!({
            "choices": [{"message": {"content": "x"}, "finish_reason": "content_filter"}]
        });
        assert!(matches!(extract_content(&filtered), Err(ReflectError::Llm(_))));

        let error = serde_json::json!({"error": {"message": "bad key"}});
        assert!(extract_content(&error).is_err());
        assert!(extract_content(&serde_json::json!({"choices": []})).is_err());
    }

    #[test]
    fn test_prompt_includes_context_and_question() {
        let prompt = LlmSqlGenerator::build_prompt(
            "total revenue",
            &["Revenue is net_revenue".to_string()],
        );
        assert!(prompt.contains("Revenue is net_revenue"));
        assert!(prompt.ends_with("Question: total revenue\n\nSQL:"));
    }
}
