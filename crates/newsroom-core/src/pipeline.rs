//! Sequential stage pipeline.
//!
//! Runs stages strictly in declared order against a shared topic, emitting
//! one `Started` and one terminal event per stage to the injected observer
//! sink. Stage N+1 never starts before stage N's output has been committed.

use std::collections::HashMap;
use std::fs;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::NewsroomError;
use crate::actor::{Actor, ActorSpec};
use crate::context::RunContext;
use crate::events::{NullSink, ObserverSink, StageEvent};
use crate::provider::CapabilityProvider;
use crate::render::render_topic;
use crate::stage::StageSpec;

/// Result of a completed pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutcome {
    pub run_id: String,
    /// Output text of the final stage.
    pub result: String,
    /// Output of every stage in execution order.
    pub stage_outputs: Vec<(String, String)>,
}

pub struct PipelineBuilder {
    provider: Arc<dyn CapabilityProvider>,
    actors: Vec<ActorSpec>,
    stages: Vec<StageSpec>,
    sink: Arc<dyn ObserverSink>,
}

impl PipelineBuilder {
    pub fn new(provider: Arc<dyn CapabilityProvider>) -> Self {
        Self {
            provider,
            actors: Vec::new(),
            stages: Vec::new(),
            sink: Arc::new(NullSink),
        }
    }

    pub fn add_actor(mut self, actor: ActorSpec) -> Self {
        self.actors.push(actor);
        self
    }

    pub fn add_stage(mut self, stage: StageSpec) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn ObserverSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Validate wiring and produce a runnable pipeline.
    ///
    /// Fails before any stage runs when a stage references an unknown actor
    /// or an actor requires a capability the provider does not supply.
    pub fn build(self) -> Result<Pipeline, NewsroomError> {
        if self.stages.is_empty() {
            return Err(NewsroomError::InvalidConfiguration(
                "pipeline must hold at least one stage".into(),
            ));
        }

        let mut actors: HashMap<String, Arc<Actor>> = HashMap::new();
        for spec in self.actors {
            let actor = Actor::new(spec, self.provider.clone());
            actor.validate()?;
            actors.insert(actor.role().to_string(), Arc::new(actor));
        }

        for stage in &self.stages {
            if !actors.contains_key(&stage.actor) {
                return Err(NewsroomError::InvalidConfiguration(format!(
                    "stage '{}' references unknown actor '{}'",
                    stage.id, stage.actor
                )));
            }
        }

        Ok(Pipeline {
            actors,
            stages: self.stages,
            sink: self.sink,
        })
    }
}

/// Ordered list of stages plus the actors that execute them.
pub struct Pipeline {
    actors: HashMap<String, Arc<Actor>>,
    stages: Vec<StageSpec>,
    sink: Arc<dyn ObserverSink>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("actors", &self.actors.keys())
            .field("stages", &self.stages)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Execute all stages in declared order for the given topic.
    ///
    /// A provider failure aborts the remaining stages; there are no retries
    /// and no partial result. Earlier stages' transcript entries stay
    /// committed.
    #[instrument(name = "pipeline.run", skip(self), fields(stages = self.stages.len()))]
    pub async fn run(&self, topic: &str) -> Result<PipelineOutcome, NewsroomError> {
        if topic.trim().is_empty() {
            return Err(NewsroomError::InvalidConfiguration(
                "topic must be non-empty".into(),
            ));
        }

        let run_id = Uuid::new_v4().to_string();
        let context = RunContext::new(topic);
        let mut stage_outputs: Vec<(String, String)> = Vec::new();

        for stage in &self.stages {
            let actor = self
                .actors
                .get(&stage.actor)
                .cloned()
                .ok_or_else(|| {
                    // Unreachable after build-time validation.
                    NewsroomError::InvalidConfiguration(format!(
                        "stage '{}' references unknown actor '{}'",
                        stage.id, stage.actor
                    ))
                })?;

            let rendered = render_topic(&stage.description, topic)?;
            self.sink
                .notify(StageEvent::started(&stage.id, actor.role(), rendered.clone()));

            let start = Instant::now();
            let output = match actor.execute(stage, &rendered, &context).await {
                Ok(output) => output,
                Err(err) => {
                    error!(stage = %stage.id, error = %err, "stage failed; aborting run");
                    self.sink
                        .notify(StageEvent::failed(&stage.id, actor.role(), err.to_string()));
                    return Err(NewsroomError::stage_execution(&stage.id, err.to_string()));
                }
            };
            let duration_ms = start.elapsed().as_millis() as u64;

            self.sink.notify(StageEvent::ended(
                &stage.id,
                actor.role(),
                output.clone(),
                duration_ms,
            ));

            if let Some(path) = &stage.output_sink {
                fs::write(path, &output)
                    .map_err(|err| NewsroomError::artifact_io(path.clone(), err))?;
                info!(stage = %stage.id, path = %path.display(), "stage output persisted");
            }

            context.record_stage_output(&stage.id, &output);
            stage_outputs.push((stage.id.clone(), output));
        }

        let result = stage_outputs
            .last()
            .map(|(_, output)| output.clone())
            .unwrap_or_default();

        info!(%run_id, stages = stage_outputs.len(), "pipeline run completed");

        Ok(PipelineOutcome {
            run_id,
            result,
            stage_outputs,
        })
    }
}
