//! Google Generative Language API provider.
//!
//! Covers the generation capability via `models/{model}:generateContent` and,
//! when a Serper-style search endpoint is configured, the lookup capability.

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::config::{NewsroomConfig, SearchConfig};
use crate::provider::{Capability, CapabilityProvider, GenerationRequest, SearchHit};
use crate::security::SecretValue;

const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";
const TEMPERATURE: f32 = 0.5;

pub struct GeminiProvider {
    client: reqwest::Client,
    api_base: String,
    model: String,
    api_key: SecretValue,
    search: Option<SearchConfig>,
}

impl GeminiProvider {
    pub fn new(model: impl Into<String>, api_key: SecretValue) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: DEFAULT_API_BASE.to_string(),
            model: model.into(),
            api_key,
            search: None,
        }
    }

    pub fn from_config(config: &NewsroomConfig) -> Self {
        let mut provider = Self::new(config.model.clone(), config.api_key.clone());
        provider.search = config.search.clone();
        provider
    }

    /// Enable the lookup capability against a Serper-compatible endpoint.
    pub fn with_search(mut self, search: SearchConfig) -> Self {
        self.search = Some(search);
        self
    }

    /// Override the API base URL (test servers).
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    fn build_prompt(request: &GenerationRequest) -> String {
        let mut prompt = format!(
            "You are {role}. {backstory}\nYour goal: {goal}\n\nTask: {description}\n",
            role = request.role,
            backstory = request.backstory,
            goal = request.goal,
            description = request.description,
        );

        if !request.prior_outputs.is_empty() {
            prompt.push_str("\nWork completed so far:\n");
            for output in &request.prior_outputs {
                prompt.push_str(output);
                prompt.push('\n');
            }
        }

        if !request.sources.is_empty() {
            prompt.push_str("\nSearch results:\n");
            for hit in &request.sources {
                prompt.push_str(&format!(
                    "- {} ({}){}\n",
                    hit.title,
                    hit.link,
                    hit.snippet
                        .as_deref()
                        .map(|s| format!(": {s}"))
                        .unwrap_or_default()
                ));
            }
        }

        if request.allow_delegation {
            prompt.push_str("\nYou may hand off subtasks to other specialists when useful.\n");
        }

        prompt.push_str(&format!("\nExpected output: {}\n", request.expected_output));
        prompt
    }
}

#[async_trait]
impl CapabilityProvider for GeminiProvider {
    #[instrument(name = "provider.generate", skip(self, request), fields(role = %request.role))]
    async fn generate(&self, request: GenerationRequest) -> Result<String> {
        let prompt = Self::build_prompt(&request);
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.api_base,
            self.model,
            self.api_key.expose()
        );

        let payload = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: TEMPERATURE,
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .context("generation request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("generation request returned {status}: {body}");
        }

        let body: GenerateContentResponse = response
            .json()
            .await
            .context("malformed generation response")?;

        let text = body
            .candidates
            .into_iter()
            .next()
            .map(|candidate| {
                candidate
                    .content
                    .parts
                    .into_iter()
                    .map(|part| part.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| anyhow!("generation response contained no candidates"))?;

        debug!(chars = text.len(), "generation completed");
        Ok(text)
    }

    #[instrument(name = "provider.lookup", skip(self))]
    async fn lookup(&self, query: &str) -> Result<Vec<SearchHit>> {
        let search = self
            .search
            .as_ref()
            .ok_or_else(|| anyhow!("lookup capability not configured"))?;

        let response = self
            .client
            .post(&search.endpoint)
            .header("X-API-KEY", search.api_key.expose())
            .json(&serde_json::json!({ "q": query }))
            .send()
            .await
            .context("lookup request failed")?;

        let status = response.status();
        if !status.is_success() {
            bail!("lookup request returned {status}");
        }

        let body: SearchResponse = response.json().await.context("malformed lookup response")?;
        Ok(body.organic)
    }

    fn capabilities(&self) -> Vec<Capability> {
        let mut capabilities = vec![Capability::Generation];
        if self.search.is_some() {
            capabilities.push(Capability::Lookup);
        }
        capabilities
    }
}

#[derive(Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Content,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    organic: Vec<SearchHit>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret(value: &str) -> SecretValue {
        unsafe {
            std::env::set_var("GEMINI_TEST_KEY", value);
        }
        crate::require_env("GEMINI_TEST_KEY").expect("test secret")
    }

    #[test]
    fn prompt_includes_persona_and_sources() {
        let request = GenerationRequest {
            role: "Senior Researcher".into(),
            goal: "Uncover ground breaking technologies in quantum sensors".into(),
            backstory: "Driven by curiosity.".into(),
            description: "Identify the next big trend in quantum sensors.".into(),
            expected_output: "A comprehensive 3 paragraphs long report".into(),
            prior_outputs: vec!["earlier findings".into()],
            sources: vec![SearchHit {
                title: "Quantum leap".into(),
                link: "https://example.com/q".into(),
                snippet: Some("sensors everywhere".into()),
            }],
            allow_delegation: true,
        };

        let prompt = GeminiProvider::build_prompt(&request);
        assert!(prompt.contains("You are Senior Researcher"));
        assert!(prompt.contains("quantum sensors"));
        assert!(prompt.contains("earlier findings"));
        assert!(prompt.contains("Quantum leap"));
        assert!(prompt.contains("Expected output:"));
    }

    #[test]
    fn lookup_capability_tracks_search_config() {
        let provider = GeminiProvider::new("gemini-1.5-flash", secret("key"));
        assert_eq!(provider.capabilities(), vec![Capability::Generation]);

        let provider = provider.with_search(SearchConfig {
            endpoint: "https://google.serper.dev/search".into(),
            api_key: secret("search-key"),
        });
        assert!(provider.supports(Capability::Lookup));
    }
}
