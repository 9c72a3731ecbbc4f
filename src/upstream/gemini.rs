use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::error::{GatewayError, GatewayResult};
use crate::metrics::{UPSTREAM_FAILURES, UPSTREAM_LATENCY};

// generateContent request format
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    pub generation_config: GenerationConfig,
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct Part {
    #[serde(default)]
    pub text: String,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_mime_type: String,
}

// generateContent response format, only the bits we read
#[derive(Deserialize, Debug, Default)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Deserialize, Debug, Default)]
pub struct Candidate {
    #[serde(default)]
    pub content: Content,
}

impl GenerateContentResponse {
    /// Text of the first part of the first candidate, empty if absent.
    pub fn first_text(&self) -> &str {
        self.candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.as_str())
            .unwrap_or("")
    }
}

#[derive(Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl GeminiClient {
    pub fn new(
        client: reqwest::Client,
        base_url: &str,
        model: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key,
            timeout,
        }
    }

    /// Sends `prompt` and returns the model's raw text answer.
    pub async fn generate(&self, prompt: &str) -> GatewayResult<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| GatewayError::inference("GEMINI_API_KEY not configured"))?;

        let body = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
            },
        };

        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, self.model, api_key
        );

        let start = Instant::now();
        let result = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await;
        UPSTREAM_LATENCY.observe(start.elapsed().as_secs_f64());

        let res = result.map_err(|e| {
            UPSTREAM_FAILURES.inc();
            // reqwest errors carry the url, which carries the key
            GatewayError::inference(e.without_url().to_string())
        })?;

        let status = res.status();
        if !status.is_success() {
            UPSTREAM_FAILURES.inc();
            let detail = res.text().await.unwrap_or_default();
            warn!(%status, "Gemini API returned an error");
            return Err(GatewayError::inference(format!("status {status}: {detail}")));
        }

        let parsed: GenerateContentResponse = res.json().await.map_err(|e| {
            UPSTREAM_FAILURES.inc();
            GatewayError::UpstreamFormat(e.without_url().to_string())
        })?;

        let text = parsed.first_text().to_string();
        debug!(chars = text.len(), "Gemini answered");
        Ok(text)
    }
}
