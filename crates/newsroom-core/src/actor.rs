//! Actor personas and their execution against the capability provider.

use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info, instrument};

use crate::context::RunContext;
use crate::provider::{Capability, CapabilityProvider, GenerationRequest, SearchHit};
use crate::render::render_topic;
use crate::{NewsroomError, stage::StageSpec};

/// Persona definition: role, goal template, backstory and the capabilities
/// the actor uses when executing a stage. Immutable after construction.
#[derive(Debug, Clone)]
pub struct ActorSpec {
    pub role: String,
    pub goal: String,
    pub backstory: String,
    pub capabilities: Vec<Capability>,
    pub allow_delegation: bool,
}

impl ActorSpec {
    pub fn new(
        role: impl Into<String>,
        goal: impl Into<String>,
        backstory: impl Into<String>,
    ) -> Self {
        Self {
            role: role.into(),
            goal: goal.into(),
            backstory: backstory.into(),
            capabilities: vec![Capability::Generation],
            allow_delegation: false,
        }
    }

    pub fn with_capability(mut self, capability: Capability) -> Self {
        if !self.capabilities.contains(&capability) {
            self.capabilities.push(capability);
        }
        self
    }

    pub fn with_delegation(mut self, allowed: bool) -> Self {
        self.allow_delegation = allowed;
        self
    }
}

/// An [`ActorSpec`] bound to a capability provider.
pub struct Actor {
    spec: ActorSpec,
    provider: Arc<dyn CapabilityProvider>,
}

impl Actor {
    pub fn new(spec: ActorSpec, provider: Arc<dyn CapabilityProvider>) -> Self {
        Self { spec, provider }
    }

    pub fn role(&self) -> &str {
        &self.spec.role
    }

    pub fn spec(&self) -> &ActorSpec {
        &self.spec
    }

    /// Verify the bound provider supports every capability this actor uses.
    pub fn validate(&self) -> Result<(), NewsroomError> {
        for capability in &self.spec.capabilities {
            if !self.provider.supports(*capability) {
                return Err(NewsroomError::InvalidConfiguration(format!(
                    "actor '{}' requires capability {capability:?} the provider does not supply",
                    self.spec.role
                )));
            }
        }
        Ok(())
    }

    /// Execute one stage: optional lookup, then generation.
    #[instrument(name = "actor.execute", skip(self, stage, context), fields(role = %self.spec.role, stage = %stage.id))]
    pub async fn execute(
        &self,
        stage: &StageSpec,
        rendered_description: &str,
        context: &RunContext,
    ) -> Result<String> {
        let topic = context.topic();

        let sources = if self.spec.capabilities.contains(&Capability::Lookup) {
            let hits = self.provider.lookup(&topic).await?;
            debug!(hits = hits.len(), "lookup completed");
            hits
        } else {
            Vec::<SearchHit>::new()
        };

        let request = GenerationRequest {
            role: self.spec.role.clone(),
            goal: render_topic(&self.spec.goal, &topic)?,
            backstory: self.spec.backstory.clone(),
            description: rendered_description.to_string(),
            expected_output: render_topic(&stage.expected_output, &topic)?,
            prior_outputs: context.prior_outputs(),
            sources,
            allow_delegation: self.spec.allow_delegation,
        };

        let output = self.provider.generate(request).await?;
        info!(chars = output.len(), "actor produced output");
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ScriptedProvider;
    use crate::stage::StageSpec;

    #[tokio::test]
    async fn actor_executes_stage_through_provider() {
        let provider = Arc::new(ScriptedProvider::new(["R-OUT"]));
        let spec = ActorSpec::new(
            "Senior Researcher",
            "Uncover ground breaking technologies in {topic}",
            "Driven by curiosity.",
        )
        .with_capability(Capability::Lookup)
        .with_delegation(true);

        let actor = Actor::new(spec, provider);
        actor.validate().expect("capabilities supported");

        let stage = StageSpec::new(
            "research",
            "Identify the next big trend in {topic}.",
            "A comprehensive 3 paragraphs long report on {topic}",
            "Senior Researcher",
        );
        let context = RunContext::new("quantum sensors");
        let output = actor
            .execute(&stage, "Identify the next big trend in quantum sensors.", &context)
            .await
            .expect("execution succeeds");
        assert_eq!(output, "R-OUT");
    }

    #[test]
    fn validate_rejects_unsupported_capability() {
        struct GenerationOnly;

        #[async_trait::async_trait]
        impl CapabilityProvider for GenerationOnly {
            async fn generate(
                &self,
                _request: crate::provider::GenerationRequest,
            ) -> anyhow::Result<String> {
                Ok("text".into())
            }

            async fn lookup(&self, _query: &str) -> anyhow::Result<Vec<SearchHit>> {
                anyhow::bail!("unsupported")
            }

            fn capabilities(&self) -> Vec<Capability> {
                vec![Capability::Generation]
            }
        }

        let spec = ActorSpec::new("Writer", "goal", "story").with_capability(Capability::Lookup);
        let actor = Actor::new(spec, Arc::new(GenerationOnly));
        let err = actor.validate().unwrap_err();
        assert!(matches!(err, NewsroomError::InvalidConfiguration(_)));
    }
}
