//! News-blogging session wiring.
//!
//! Assembles the concrete two-stage pipeline (Senior Researcher then Writer)
//! around a shared transcript and runs it end-to-end for one topic.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{info, warn};

use crate::NewsroomError;
use crate::actor::ActorSpec;
use crate::config::NewsroomConfig;
use crate::events::{ObserverSink, TranscriptSink};
use crate::gemini::GeminiProvider;
use crate::logging::{SessionLogInput, log_session_completion};
use crate::pipeline::{PipelineBuilder, PipelineOutcome};
use crate::provider::{Capability, CapabilityProvider};
use crate::stage::StageSpec;
use crate::transcript::{Speaker, Transcript};

pub const GREETING: &str = "What News do you want us to write?";
pub const RESULT_HEADING: &str = "## Here is the Final Result";

const RESEARCHER_ROLE: &str = "Senior Researcher";
const WRITER_ROLE: &str = "Writer";

const RESEARCHER_AVATAR: &str = "https://cdn-icons-png.freepik.com/512/9408/9408201.png";
const WRITER_AVATAR: &str = "https://cdn-icons-png.flaticon.com/512/320/320336.png";

const DEFAULT_ARTICLE_PATH: &str = "new-blog-post.md";

/// Options for running a blogging session.
pub struct SessionOptions {
    pub topic: String,
    pub session_id: Option<String>,
    /// Provider override; defaults to a Gemini client built from the
    /// environment configuration.
    pub provider: Option<Arc<dyn CapabilityProvider>>,
    /// Destination of the composed article; defaults to `new-blog-post.md`.
    pub article_path: Option<PathBuf>,
    /// Transcript to append to; a fresh greeted transcript is created
    /// otherwise.
    pub transcript: Option<Arc<Transcript>>,
    /// Extra observer notified after each transcript append.
    pub observer: Option<Arc<dyn ObserverSink>>,
}

impl SessionOptions {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            session_id: None,
            provider: None,
            article_path: None,
            transcript: None,
            observer: None,
        }
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_provider(mut self, provider: Arc<dyn CapabilityProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn with_article_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.article_path = Some(path.into());
        self
    }

    pub fn with_transcript(mut self, transcript: Arc<Transcript>) -> Self {
        self.transcript = Some(transcript);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn ObserverSink>) -> Self {
        self.observer = Some(observer);
        self
    }
}

/// Outcome of a completed blogging session.
#[derive(Debug)]
pub struct SessionOutcome {
    pub session_id: String,
    pub topic: String,
    /// Raw output of the compose stage.
    pub result: String,
    pub article_path: PathBuf,
    pub transcript: Arc<Transcript>,
    pub pipeline: PipelineOutcome,
}

fn new_session_id() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    format!("session-{}", nanos)
}

/// Run the blogging workflow end-to-end for the provided topic.
pub async fn run_blog_session(options: SessionOptions) -> Result<SessionOutcome, NewsroomError> {
    let session_id = options.session_id.unwrap_or_else(new_session_id);

    // Resolve the provider before touching the transcript so a missing
    // credential fails while the greeting is still the only entry.
    let (provider, article_path): (Arc<dyn CapabilityProvider>, PathBuf) = match options.provider {
        Some(provider) => (
            provider,
            options
                .article_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_ARTICLE_PATH)),
        ),
        None => {
            let config = NewsroomConfig::from_env()?;
            let article_path = options
                .article_path
                .unwrap_or_else(|| config.article_path.clone());
            (Arc::new(GeminiProvider::from_config(&config)), article_path)
        }
    };

    let transcript = options
        .transcript
        .unwrap_or_else(|| Arc::new(Transcript::with_greeting(GREETING)));
    transcript.append(Speaker::User, options.topic.clone());

    let mut sink = TranscriptSink::new(transcript.clone())
        .with_avatar(RESEARCHER_ROLE, RESEARCHER_AVATAR)
        .with_avatar(WRITER_ROLE, WRITER_AVATAR);
    if let Some(observer) = options.observer {
        sink = sink.with_forward(observer);
    }

    let mut researcher = ActorSpec::new(
        RESEARCHER_ROLE,
        "Uncover ground breaking technologies in {topic}",
        "Driven by curiosity, you're at the forefront of innovation, eager to \
         explore and share knowledge that could change the world.",
    )
    .with_delegation(true);
    if provider.supports(Capability::Lookup) {
        researcher = researcher.with_capability(Capability::Lookup);
    }

    let writer = ActorSpec::new(
        WRITER_ROLE,
        "Narrate compelling tech stories about {topic}",
        "With a flair for simplifying complex topics, you craft engaging \
         narratives that captivate and educate, bringing new discoveries to \
         light in an accessible manner.",
    )
    .with_delegation(false);

    let pipeline = PipelineBuilder::new(provider)
        .add_actor(researcher)
        .add_actor(writer)
        .add_stage(StageSpec::new(
            "research",
            "Identify the next big trend in {topic}. Focus on identifying pros \
             and cons and the overall narrative. Your final report should \
             clearly articulate the key points, its market opportunities, and \
             the potential risks.",
            "A comprehensive 3 paragraphs long report on {topic}",
            RESEARCHER_ROLE,
        ))
        .add_stage(
            StageSpec::new(
                "compose",
                "Compose an insightful article on {topic}. Focus on the latest \
                 trends and how it's impacting the industry. This article \
                 should be easy to understand, engaging, and positive.",
                "A 4 paragraph article on {topic} advancements formatted as markdown",
                WRITER_ROLE,
            )
            .with_output_sink(article_path.clone()),
        )
        .with_sink(Arc::new(sink))
        .build()?;

    let outcome = pipeline.run(&options.topic).await?;

    let framed = format!("{RESULT_HEADING}\n\n{}", outcome.result);
    transcript.append(Speaker::Assistant, framed);

    if let Err(err) = log_session_completion(SessionLogInput {
        session_id: session_id.clone(),
        topic: options.topic.clone(),
        result: outcome.result.clone(),
        stages: outcome
            .stage_outputs
            .iter()
            .map(|(id, _)| id.clone())
            .collect(),
        article_path: Some(article_path.display().to_string()),
    }) {
        warn!(session_id = %session_id, error = %err, "failed to append session log");
    }

    info!(session_id = %session_id, topic = %options.topic, "blog session completed");

    Ok(SessionOutcome {
        session_id,
        topic: options.topic,
        result: outcome.result.clone(),
        article_path,
        transcript,
        pipeline: outcome,
    })
}
