//! Newsroom core: a sequential two-stage "research then write" pipeline with
//! human-visible progress streaming.
//!
//! The pipeline executes stages strictly in declared order against a shared
//! topic, emitting lifecycle events to an injected observer sink that
//! projects them into an append-only transcript. Text generation and search
//! are delegated to an external capability provider.

mod actor;
mod config;
mod context;
mod error;
mod events;
mod gemini;
mod logging;
mod pipeline;
mod provider;
mod render;
mod security;
mod session;
mod stage;
mod transcript;

pub use actor::{Actor, ActorSpec};
pub use config::{NewsroomConfig, SearchConfig};
pub use context::RunContext;
pub use error::NewsroomError;
pub use events::{EventCollector, NullSink, ObserverSink, StageEvent, TranscriptSink};
pub use gemini::GeminiProvider;
pub use logging::{SessionLogInput, log_session_completion};
pub use pipeline::{Pipeline, PipelineBuilder, PipelineOutcome};
pub use provider::{Capability, CapabilityProvider, GenerationRequest, ScriptedProvider, SearchHit};
pub use render::{render, render_topic};
pub use security::{SecretValue, require_env};
pub use session::{
    GREETING, RESULT_HEADING, SessionOptions, SessionOutcome, run_blog_session,
};
pub use stage::StageSpec;
pub use transcript::{EntryTone, Speaker, Transcript, TranscriptEntry};
