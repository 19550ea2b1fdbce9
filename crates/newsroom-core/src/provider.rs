//! Capability provider seam.
//!
//! Agents never talk to a model backend directly; they go through a
//! [`CapabilityProvider`] supplying text generation and an external lookup
//! action. Latency and correctness of these calls are owned entirely by the
//! provider; the pipeline treats them as opaque blocking calls.

use std::collections::VecDeque;
use std::sync::Mutex;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Capability handles an actor may require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Generation,
    Lookup,
}

/// Everything a provider needs to produce text for one stage.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub role: String,
    pub goal: String,
    pub backstory: String,
    /// Fully rendered task description (topic already substituted).
    pub description: String,
    pub expected_output: String,
    /// Outputs of previously completed stages, oldest first.
    pub prior_outputs: Vec<String>,
    /// Lookup results gathered before generation, possibly empty.
    pub sources: Vec<SearchHit>,
    pub allow_delegation: bool,
}

/// One result from the lookup capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub link: String,
    #[serde(default)]
    pub snippet: Option<String>,
}

/// External collaborator supplying generation and lookup to actors.
#[async_trait]
pub trait CapabilityProvider: Send + Sync {
    /// Generate text for a stage. Blocking from the pipeline's point of view.
    async fn generate(&self, request: GenerationRequest) -> Result<String>;

    /// Perform an external lookup for supporting material.
    async fn lookup(&self, query: &str) -> Result<Vec<SearchHit>>;

    /// Capabilities this provider supports.
    fn capabilities(&self) -> Vec<Capability>;

    fn supports(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }
}

/// Deterministic provider returning queued responses.
///
/// Used by tests and offline demos; `generate` fails once the script is
/// exhausted, which doubles as a provider-failure fixture.
#[derive(Default)]
pub struct ScriptedProvider {
    responses: Mutex<VecDeque<String>>,
    hits: Vec<SearchHit>,
}

impl ScriptedProvider {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
            hits: Vec::new(),
        }
    }

    /// Provider whose first `generate` call fails.
    pub fn failing() -> Self {
        Self::new(Vec::<String>::new())
    }

    pub fn with_hits(mut self, hits: Vec<SearchHit>) -> Self {
        self.hits = hits;
        self
    }
}

#[async_trait]
impl CapabilityProvider for ScriptedProvider {
    async fn generate(&self, request: GenerationRequest) -> Result<String> {
        self.responses
            .lock()
            .expect("script lock poisoned")
            .pop_front()
            .ok_or_else(|| anyhow!("scripted provider exhausted for role '{}'", request.role))
    }

    async fn lookup(&self, _query: &str) -> Result<Vec<SearchHit>> {
        Ok(self.hits.clone())
    }

    fn capabilities(&self) -> Vec<Capability> {
        vec![Capability::Generation, Capability::Lookup]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> GenerationRequest {
        GenerationRequest {
            role: "Writer".into(),
            goal: "goal".into(),
            backstory: "backstory".into(),
            description: "description".into(),
            expected_output: "shape".into(),
            prior_outputs: vec![],
            sources: vec![],
            allow_delegation: false,
        }
    }

    #[tokio::test]
    async fn scripted_provider_returns_responses_in_order() {
        let provider = ScriptedProvider::new(["R-OUT", "W-OUT"]);
        assert_eq!(provider.generate(request()).await.unwrap(), "R-OUT");
        assert_eq!(provider.generate(request()).await.unwrap(), "W-OUT");
        assert!(provider.generate(request()).await.is_err());
    }

    #[tokio::test]
    async fn failing_provider_errors_immediately() {
        let provider = ScriptedProvider::failing();
        assert!(provider.generate(request()).await.is_err());
        assert!(provider.supports(Capability::Lookup));
    }
}
