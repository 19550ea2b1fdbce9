//! Prompt template rendering.
//!
//! Templates use `{name}` placeholders. Rendering is a pure step performed
//! before a stage executes, never deferred to execution time.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::HashMap;

use crate::NewsroomError;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([a-zA-Z_][a-zA-Z0-9_]*)\}").expect("invalid placeholder regex"));

/// Substitute every `{name}` placeholder in `template` with its value.
///
/// An unresolved placeholder is a wiring mistake and fails the render rather
/// than leaking braces into a prompt.
pub fn render(template: &str, vars: &HashMap<String, String>) -> Result<String, NewsroomError> {
    let mut missing: Option<String> = None;

    let output = PLACEHOLDER.replace_all(template, |caps: &Captures| {
        let name = &caps[1];
        match vars.get(name) {
            Some(value) => value.clone(),
            None => {
                missing.get_or_insert_with(|| name.to_string());
                String::new()
            }
        }
    });

    match missing {
        Some(name) => Err(NewsroomError::InvalidConfiguration(format!(
            "template references unknown placeholder '{{{name}}}'"
        ))),
        None => Ok(output.into_owned()),
    }
}

/// Convenience for the common single-variable case.
pub fn render_topic(template: &str, topic: &str) -> Result<String, NewsroomError> {
    let mut vars = HashMap::new();
    vars.insert("topic".to_string(), topic.to_string());
    render(template, &vars)
}
