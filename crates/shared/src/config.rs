use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_SUMMARIZATION_MODEL: &str = "Falconsai/text_summarization";
pub const DEFAULT_OLLAMA_HOST: &str = "http://localhost:11434";
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3.2:3b";

#[derive(Debug, Clone)]
pub struct Config {
    pub huggingface_api_token: Option<String>,
    pub summarization_model: String,
    pub ollama_host: String,
    pub ollama_model: String,
    pub cache_dir: PathBuf,
    pub audio_cache_dir: PathBuf,
    pub fetch_ttl: Duration,
    pub summary_ttl: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        // Try to load .env from multiple locations
        Self::try_load_dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let base_cache_dir = match var("NEWSBREEZE_CACHE_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => dirs::cache_dir()
                .context("Could not determine cache directory. Set NEWSBREEZE_CACHE_DIR.")?
                .join("newsbreeze")
                .join("cache"),
        };

        let audio_cache_dir = match var("NEWSBREEZE_AUDIO_CACHE_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => base_cache_dir
                .parent()
                .map(|p| p.join("audio_cache"))
                .unwrap_or_else(|| PathBuf::from("audio_cache")),
        };

        Ok(Self {
            huggingface_api_token: var("HUGGINGFACE_API_TOKEN"),
            summarization_model: var("SUMMARIZATION_MODEL")
                .unwrap_or_else(|| DEFAULT_SUMMARIZATION_MODEL.to_string()),
            ollama_host: var("OLLAMA_HOST").unwrap_or_else(|| DEFAULT_OLLAMA_HOST.to_string()),
            ollama_model: var("OLLAMA_MODEL").unwrap_or_else(|| DEFAULT_OLLAMA_MODEL.to_string()),
            cache_dir: base_cache_dir,
            audio_cache_dir,
            fetch_ttl: parse_secs(var("NEWSBREEZE_FETCH_TTL_SECS"), "NEWSBREEZE_FETCH_TTL_SECS", 300)?,
            summary_ttl: parse_secs(
                var("NEWSBREEZE_SUMMARY_TTL_SECS"),
                "NEWSBREEZE_SUMMARY_TTL_SECS",
                600,
            )?,
        })
    }

    fn try_load_dotenv() {
        // Try locations in order of preference:

        // 1. Current directory (for development)
        if dotenvy::dotenv().is_ok() {
            return;
        }

        // 2. ~/.config/newsbreeze/.env (standard config location)
        if let Some(config_dir) = dirs::config_dir() {
            let config_path = config_dir.join("newsbreeze").join(".env");
            if config_path.exists() && dotenvy::from_path(&config_path).is_ok() {
                return;
            }
        }

        // 3. ~/.env (home directory)
        if let Some(home_dir) = dirs::home_dir() {
            let home_path = home_dir.join(".env");
            if home_path.exists() {
                let _ = dotenvy::from_path(&home_path);
            }
        }

        // If none found, that's okay - environment variables might be set system-wide
    }
}

fn parse_secs(value: Option<String>, key: &str, default: u64) -> Result<Duration> {
    let secs = match value {
        Some(v) => v
            .trim()
            .parse::<u64>()
            .with_context(|| format!("{} must be a whole number of seconds, got '{}'", key, v))?,
        None => default,
    };
    Ok(Duration::from_secs(secs))
}
