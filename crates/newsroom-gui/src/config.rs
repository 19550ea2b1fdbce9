use anyhow::Result;
use std::env;
use std::path::PathBuf;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub listen_addr: String,
    pub max_concurrency: usize,
    pub assets_dir: PathBuf,
    pub gui_enabled: bool,
    pub auth_token: Option<String>,
    /// Destination of the composed article; the core default applies when
    /// unset.
    pub article_path: Option<PathBuf>,
}

impl AppConfig {
    const DEFAULT_LISTEN_ADDR: &'static str = "0.0.0.0:8080";
    const DEFAULT_ASSETS_DIR: &'static str = "crates/newsroom-gui/web/dist";

    pub fn from_env() -> Result<Self> {
        let listen_addr =
            env::var("GUI_LISTEN_ADDR").unwrap_or_else(|_| Self::DEFAULT_LISTEN_ADDR.to_string());

        let max_concurrency = env::var("GUI_MAX_CONCURRENCY")
            .ok()
            .and_then(|value| value.parse::<usize>().ok())
            .filter(|value| *value > 0)
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|nz| nz.get())
                    .unwrap_or(4)
            });

        let assets_dir = env::var("GUI_ASSETS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(Self::DEFAULT_ASSETS_DIR));
        let assets_dir = if assets_dir.is_relative() {
            env::current_dir()
                .map(|cwd| cwd.join(assets_dir))
                .unwrap_or_else(|_| PathBuf::from(Self::DEFAULT_ASSETS_DIR))
        } else {
            assets_dir
        };

        let gui_enabled = env::var("GUI_ENABLE_GUI")
            .ok()
            .and_then(|value| parse_bool(&value))
            .unwrap_or(false);

        let auth_token = env::var("GUI_AUTH_TOKEN")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());

        let article_path = env::var("GUI_ARTICLE_PATH")
            .ok()
            .map(PathBuf::from)
            .filter(|path| !path.as_os_str().is_empty());

        let gui_enabled = gui_enabled || auth_token.is_some();

        Ok(Self {
            listen_addr,
            max_concurrency,
            assets_dir,
            gui_enabled,
            auth_token,
            article_path,
        })
    }
}

fn parse_bool(input: &str) -> Option<bool> {
    match input.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
