use anyhow::{anyhow, Result};
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::prompt::GenerationConfig;

/// Anything that can turn a prompt into generated markdown.
///
/// Failures are uniform: callers only learn that the attempt did not succeed.
pub trait Generator: Send + Sync {
    fn generate<'a>(
        &'a self,
        prompt: &'a str,
        config: &'a GenerationConfig,
    ) -> BoxFuture<'a, Result<String, Error>>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: &'a GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

impl GenerateContentResponse {
    /// Answer text of the first candidate, skipping thought summaries.
    fn text(self) -> Option<String> {
        let content = self.candidates.into_iter().next()?.content?;
        let text: String = content
            .parts
            .into_iter()
            .filter(|part| !part.thought)
            .filter_map(|part| part.text)
            .collect();

        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

pub struct GeminiClient {
    base_url: String,
    model: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn with_config(base_url: String, model: String, api_key: Option<String>) -> Self {
        GeminiClient {
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            api_key,
            client: reqwest::Client::new(),
        }
    }

    pub fn get_model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model)
    }

    async fn generate_content(&self, prompt: &str, config: &GenerationConfig) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow!("no API key configured"))?;

        let request = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![RequestPart { text: prompt }],
            }],
            generation_config: config,
        };

        tracing::debug!(
            model = %self.model,
            thinking = config.thinking_config.is_some(),
            prompt_len = prompt.len(),
            "sending generateContent request"
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Gemini API error ({}): {}", status, body));
        }

        let response: GenerateContentResponse = response.json().await?;
        response
            .text()
            .ok_or_else(|| anyhow!("Gemini response contained no text"))
    }
}

impl Generator for GeminiClient {
    fn generate<'a>(
        &'a self,
        prompt: &'a str,
        config: &'a GenerationConfig,
    ) -> BoxFuture<'a, Result<String, Error>> {
        Box::pin(async move {
            match self.generate_content(prompt, config).await {
                Ok(text) => Ok(text),
                Err(e) => {
                    let chain = format!("{:#}", e);
                    tracing::error!(error = %chain, model = %self.model, "generation failed");
                    Err(Error::GenerationFailed)
                }
            }
        })
    }
}
