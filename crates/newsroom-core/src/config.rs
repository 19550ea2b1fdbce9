use std::{env, path::PathBuf};

use crate::{NewsroomError, SecretValue, require_env};

const MODEL_ENV: &str = "NEWSROOM_MODEL";
const API_KEY_ENV: &str = "GOOGLE_API_KEY";
const SEARCH_URL_ENV: &str = "NEWSROOM_SEARCH_URL";
const SEARCH_KEY_ENV: &str = "SERPER_API_KEY";
const ARTICLE_PATH_ENV: &str = "NEWSROOM_ARTICLE_PATH";
const LOG_DIR_ENV: &str = "NEWSROOM_LOG_DIR";

const DEFAULT_MODEL: &str = "gemini-1.5-flash";
const DEFAULT_ARTICLE_PATH: &str = "new-blog-post.md";
const DEFAULT_LOG_DIR: &str = "data/logs";

/// Runtime configuration for a blogging session.
///
/// The generation credential is resolved eagerly so a missing key fails the
/// session before any stage runs.
#[derive(Debug, Clone)]
pub struct NewsroomConfig {
    pub model: String,
    pub api_key: SecretValue,
    pub search: Option<SearchConfig>,
    pub article_path: PathBuf,
    pub log_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub endpoint: String,
    pub api_key: SecretValue,
}

impl NewsroomConfig {
    /// Load configuration from the environment.
    ///
    /// `GOOGLE_API_KEY` is mandatory; the search endpoint is optional and the
    /// lookup capability is simply absent without it.
    pub fn from_env() -> Result<Self, NewsroomError> {
        let model = env::var(MODEL_ENV)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let api_key = require_env(API_KEY_ENV)?;

        let search = match env::var(SEARCH_URL_ENV) {
            Ok(endpoint) if !endpoint.trim().is_empty() => Some(SearchConfig {
                endpoint: endpoint.trim().to_string(),
                api_key: require_env(SEARCH_KEY_ENV)?,
            }),
            _ => None,
        };

        let article_path = env::var(ARTICLE_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_ARTICLE_PATH));

        let log_dir = env::var(LOG_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_LOG_DIR));

        Ok(Self {
            model,
            api_key,
            search,
            article_path,
            log_dir,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Single test to avoid racing on shared environment variables.
    #[test]
    fn config_resolution_from_env() {
        unsafe {
            std::env::remove_var(API_KEY_ENV);
        }
        let err = NewsroomConfig::from_env().unwrap_err();
        assert!(matches!(err, NewsroomError::MissingSecret(_)));

        unsafe {
            std::env::set_var(API_KEY_ENV, "test-key");
            std::env::set_var(SEARCH_URL_ENV, "https://google.serper.dev/search");
            std::env::remove_var(SEARCH_KEY_ENV);
        }
        let err = NewsroomConfig::from_env().unwrap_err();
        assert!(matches!(err, NewsroomError::MissingSecret(_)));

        unsafe {
            std::env::remove_var(SEARCH_URL_ENV);
        }
        let config = NewsroomConfig::from_env().expect("config should load");
        assert!(config.search.is_none());
        assert_eq!(config.model, DEFAULT_MODEL);
    }
}
