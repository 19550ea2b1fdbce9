//! Stage definitions.

use std::path::PathBuf;

/// One unit of delegated work: a description template, the expected output
/// shape, the actor that executes it and an optional output destination.
/// Created at pipeline-build time and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct StageSpec {
    pub id: String,
    /// Description template parameterised by `{topic}`.
    pub description: String,
    /// Expected-output template parameterised by `{topic}`.
    pub expected_output: String,
    /// Role name of the actor assigned to this stage.
    pub actor: String,
    /// File the stage's output is written to, overwriting prior content.
    pub output_sink: Option<PathBuf>,
}

impl StageSpec {
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        expected_output: impl Into<String>,
        actor: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            expected_output: expected_output.into(),
            actor: actor.into(),
            output_sink: None,
        }
    }

    pub fn with_output_sink(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_sink = Some(path.into());
        self
    }
}
