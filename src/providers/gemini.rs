use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::StatusCode;
use serde_json::Value;

use crate::core::errors::{AppError, AppResult};
use crate::core::types::PageAnalysis;
use crate::providers::layout_schema::{parse_page_analysis, strip_code_fence};
use crate::providers::prompts::{layout_prompt, ranking_prompt, summary_prompt};
use crate::providers::{LayoutAnalyzer, PageDescriptor, PageRanker, Summarizer};

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    model: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(model: impl Into<String>, api_key: impl Into<String>) -> AppResult<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(AppError::Configuration(
                "Gemini API key is empty".to_string(),
            ));
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|err| AppError::Network(err.to_string()))?;
        Ok(Self {
            http,
            model: model.into(),
            api_key,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn generate_content(
        &self,
        parts: Vec<Value>,
        temperature: f64,
        json_output: bool,
    ) -> AppResult<String> {
        let endpoint = format!(
            "{}/models/{}:generateContent?key={}",
            BASE_URL, self.model, self.api_key
        );
        let mut generation_config = serde_json::json!({ "temperature": temperature });
        if json_output {
            generation_config["responseMimeType"] = Value::from("application/json");
        }
        let payload = serde_json::json!({
            "contents": [
                {
                    "role": "user",
                    "parts": parts
                }
            ],
            "generationConfig": generation_config
        });

        let response = self
            .http
            .post(endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    AppError::ProviderTimeout
                } else {
                    AppError::Network(err.to_string())
                }
            })?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => return Err(AppError::ProviderAuth),
            StatusCode::TOO_MANY_REQUESTS => return Err(AppError::ProviderRateLimited),
            status if status.is_server_error() => {
                return Err(AppError::Network(format!("gemini returned {status}")));
            }
            status if !status.is_success() => {
                let body = response.text().await.unwrap_or_default();
                return Err(AppError::ProviderInvalidResponse(format!(
                    "status {status} body {body}"
                )));
            }
            _ => {}
        }

        let body: Value = response
            .json()
            .await
            .map_err(|err| AppError::ProviderInvalidResponse(err.to_string()))?;

        if let Some(usage) = body.get("usageMetadata") {
            let prompt_tokens = token_count(usage, "promptTokenCount");
            let output_tokens = token_count(usage, "candidatesTokenCount");
            tracing::debug!(model = %self.model, prompt_tokens, output_tokens, "gemini usage");
        }

        body.get("candidates")
            .and_then(Value::as_array)
            .and_then(|items: &Vec<Value>| items.first())
            .and_then(|item: &Value| item.get("content"))
            .and_then(|content: &Value| content.get("parts"))
            .and_then(Value::as_array)
            .and_then(|parts: &Vec<Value>| parts.first())
            .and_then(|part: &Value| part.get("text"))
            .and_then(Value::as_str)
            .map(ToString::to_string)
            .ok_or_else(|| AppError::ProviderInvalidResponse("missing text candidate".to_string()))
    }
}

#[async_trait]
impl LayoutAnalyzer for GeminiClient {
    async fn analyze(&self, raster: &[u8], mime: &str, language: &str) -> AppResult<PageAnalysis> {
        let data = base64::engine::general_purpose::STANDARD.encode(raster);
        let parts = vec![
            serde_json::json!({ "inline_data": { "mime_type": mime, "data": data } }),
            serde_json::json!({ "text": layout_prompt(language) }),
        ];
        let text = self.generate_content(parts, 0.1, true).await?;
        parse_page_analysis(&text)
    }
}

#[async_trait]
impl PageRanker for GeminiClient {
    async fn rank(&self, pages: &[PageDescriptor]) -> AppResult<Vec<i64>> {
        let pages_json = serde_json::to_string_pretty(pages)?;
        let parts = vec![serde_json::json!({ "text": ranking_prompt(&pages_json) })];
        let text = self.generate_content(parts, 0.0, true).await?;
        parse_rank_response(&text)
    }
}

#[async_trait]
impl Summarizer for GeminiClient {
    async fn summarize(&self, text: &str, language: &str) -> AppResult<String> {
        let parts = vec![serde_json::json!({ "text": summary_prompt(text, language) })];
        self.generate_content(parts, 0.3, false).await
    }
}

fn token_count(usage: &Value, field: &str) -> u64 {
    usage.get(field).and_then(Value::as_u64).unwrap_or(0)
}

/// Accepts a bare JSON array of integers or an object with an `order` array.
pub fn parse_rank_response(raw: &str) -> AppResult<Vec<i64>> {
    let value: Value = serde_json::from_str(strip_code_fence(raw))
        .map_err(|err| AppError::ProviderInvalidResponse(format!("ranking output not JSON: {err}")))?;
    let items = match &value {
        Value::Array(items) => items,
        Value::Object(map) => map
            .get("order")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                AppError::ProviderInvalidResponse("ranking object has no order array".to_string())
            })?,
        _ => {
            return Err(AppError::ProviderInvalidResponse(
                "ranking output is not an array".to_string(),
            ))
        }
    };
    items
        .iter()
        .map(|item| {
            item.as_i64().ok_or_else(|| {
                AppError::ProviderInvalidResponse(format!("ranking entry {item} is not an integer"))
            })
        })
        .collect()
}
