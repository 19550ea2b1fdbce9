use std::env;

use crate::NewsroomError;

/// Wrapper around sensitive values to reduce accidental logging.
#[derive(Clone)]
pub struct SecretValue(String);

impl SecretValue {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "***redacted***")
    }
}

/// Require that a given environment variable is set and non-empty.
pub fn require_env(var: &str) -> Result<SecretValue, NewsroomError> {
    match env::var(var) {
        Ok(value) if !value.trim().is_empty() => Ok(SecretValue(value)),
        _ => Err(NewsroomError::MissingSecret(var.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_env_success() {
        unsafe {
            std::env::set_var("NEWSROOM_TEST_SECRET", "value");
        }
        let secret = require_env("NEWSROOM_TEST_SECRET").expect("secret should load");
        assert_eq!(secret.expose(), "value");
    }

    #[test]
    fn require_env_missing() {
        unsafe {
            std::env::remove_var("NEWSROOM_TEST_SECRET_MISSING");
        }
        let err = require_env("NEWSROOM_TEST_SECRET_MISSING").unwrap_err();
        assert!(matches!(err, NewsroomError::MissingSecret(_)));
    }

    #[test]
    fn debug_output_is_redacted() {
        unsafe {
            std::env::set_var("NEWSROOM_TEST_SECRET_DEBUG", "sk-visible");
        }
        let secret = require_env("NEWSROOM_TEST_SECRET_DEBUG").expect("secret should load");
        assert_eq!(format!("{secret:?}"), "***redacted***");
    }
}
