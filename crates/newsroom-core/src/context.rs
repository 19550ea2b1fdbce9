//! Shared run context.
//!
//! Inter-stage data flow is explicit: every completed stage records its
//! output here and later stages read it back, rather than relying on hidden
//! conversational memory inside the provider.

use dashmap::DashMap;
use serde::{Serialize, de::DeserializeOwned};

const TOPIC_KEY: &str = "topic";
const OUTPUTS_KEY: &str = "stage.outputs";

/// Key/value store shared by all stages of one pipeline run.
#[derive(Debug, Default)]
pub struct RunContext {
    values: DashMap<String, serde_json::Value>,
}

impl RunContext {
    pub fn new(topic: &str) -> Self {
        let context = Self::default();
        context.set(TOPIC_KEY, topic.to_string());
        context
    }

    pub fn set<T: Serialize>(&self, key: &str, value: T) {
        match serde_json::to_value(value) {
            Ok(value) => {
                self.values.insert(key.to_string(), value);
            }
            Err(err) => tracing::warn!(key, error = %err, "failed to store context value"),
        }
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.values
            .get(key)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    pub fn topic(&self) -> String {
        self.get(TOPIC_KEY).unwrap_or_default()
    }

    /// Record a completed stage's output for subsequent stages.
    pub fn record_stage_output(&self, stage_id: &str, output: &str) {
        let mut outputs: Vec<(String, String)> = self.get(OUTPUTS_KEY).unwrap_or_default();
        outputs.push((stage_id.to_string(), output.to_string()));
        self.set(OUTPUTS_KEY, outputs);
    }

    /// Outputs of completed stages, oldest first.
    pub fn prior_outputs(&self) -> Vec<String> {
        self.get::<Vec<(String, String)>>(OUTPUTS_KEY)
            .unwrap_or_default()
            .into_iter()
            .map(|(_, output)| output)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_is_seeded() {
        let context = RunContext::new("quantum sensors");
        assert_eq!(context.topic(), "quantum sensors");
    }

    #[test]
    fn stage_outputs_accumulate_in_order() {
        let context = RunContext::new("topic");
        context.record_stage_output("research", "R-OUT");
        context.record_stage_output("compose", "W-OUT");
        assert_eq!(context.prior_outputs(), vec!["R-OUT", "W-OUT"]);
    }

    #[test]
    fn typed_round_trip() {
        let context = RunContext::new("topic");
        context.set("count", 3usize);
        assert_eq!(context.get::<usize>("count"), Some(3));
        assert_eq!(context.get::<usize>("missing"), None);
    }
}
