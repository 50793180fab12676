use crate::llm_adapter::BackendConfig;
use crate::sources::github::DEFAULT_API_URL;
use crate::types::{InterestProfile, Result, ScoutError};
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

pub const GITHUB_TOKEN_ENV: &str = "GITHUB_TOKEN";
pub const LLM_API_KEY_ENV: &str = "LLM_API_KEY";
pub const DISCORD_WEBHOOK_ENV: &str = "DISCORD_WEBHOOK_URL";

/// Contents of `config.json`. Loaded once per run and never mutated after validation.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub github: GitHubConfig,
    pub llm: BackendConfig,
    #[serde(default)]
    pub discord: DiscordConfig,
    #[serde(default)]
    pub settings: Settings,
}

#[derive(Clone, Deserialize)]
pub struct GitHubConfig {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default = "default_api_url")]
    pub api_url: String,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            keywords: Vec::new(),
            api_url: default_api_url(),
        }
    }
}

impl fmt::Debug for GitHubConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitHubConfig")
            .field("token", &if self.token.is_empty() { "<empty>" } else { "<redacted>" })
            .field("keywords", &self.keywords)
            .field("api_url", &self.api_url)
            .finish()
    }
}

#[derive(Clone, Default, Deserialize)]
pub struct DiscordConfig {
    #[serde(default)]
    pub webhook_url: String,
}

impl fmt::Debug for DiscordConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiscordConfig")
            .field("webhook_url", &if self.webhook_url.is_empty() { "<empty>" } else { "<redacted>" })
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default = "default_max_repos")]
    pub max_repos: usize,
    #[serde(default = "default_readme_max_chars")]
    pub readme_max_chars: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_cache_days")]
    pub cache_days: i64,
    #[serde(default)]
    pub min_stars: u64,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_evaluation_retries")]
    pub evaluation_retries: u32,
    #[serde(default = "default_embeds_per_message")]
    pub embeds_per_message: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_repos: default_max_repos(),
            readme_max_chars: default_readme_max_chars(),
            batch_size: default_batch_size(),
            cache_days: default_cache_days(),
            min_stars: 0,
            max_concurrency: default_max_concurrency(),
            evaluation_retries: default_evaluation_retries(),
            embeds_per_message: default_embeds_per_message(),
        }
    }
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_max_repos() -> usize {
    100
}

fn default_readme_max_chars() -> usize {
    500
}

fn default_batch_size() -> usize {
    10
}

fn default_cache_days() -> i64 {
    crate::seen_store::DEFAULT_EXPIRY_DAYS
}

fn default_max_concurrency() -> usize {
    crate::enricher::DEFAULT_MAX_CONCURRENCY
}

fn default_evaluation_retries() -> u32 {
    crate::evaluator::DEFAULT_EVALUATION_RETRIES
}

fn default_embeds_per_message() -> usize {
    crate::sinks::discord::MAX_EMBEDS_PER_MESSAGE
}

impl Config {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| ScoutError::Config(format!("invalid config: {}", e)))
    }

    /// Fill empty secrets from the environment.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let fill = |field: &mut String, var: &str| {
            if field.trim().is_empty() {
                if let Some(value) = lookup(var).filter(|v| !v.trim().is_empty()) {
                    debug!("Using {} from the environment", var);
                    *field = value;
                }
            }
        };

        fill(&mut self.github.token, GITHUB_TOKEN_ENV);
        fill(&mut self.llm.api_key, LLM_API_KEY_ENV);
        fill(&mut self.discord.webhook_url, DISCORD_WEBHOOK_ENV);
    }

    /// Check ranges and required secrets. The webhook is only needed when delivering.
    pub fn validate(&self, dry_run: bool) -> Result<()> {
        let s = &self.settings;
        let positive = [
            ("settings.max_repos", s.max_repos),
            ("settings.readme_max_chars", s.readme_max_chars),
            ("settings.batch_size", s.batch_size),
            ("settings.max_concurrency", s.max_concurrency),
            ("settings.embeds_per_message", s.embeds_per_message),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(ScoutError::Config(format!("{} must be greater than zero", name)));
            }
        }
        if s.cache_days <= 0 {
            return Err(ScoutError::Config("settings.cache_days must be greater than zero".to_string()));
        }
        if s.cache_days > crate::seen_store::MAX_EXPIRY_DAYS {
            return Err(ScoutError::Config(format!(
                "settings.cache_days must be at most {}",
                crate::seen_store::MAX_EXPIRY_DAYS
            )));
        }
        if s.embeds_per_message > crate::sinks::discord::MAX_EMBEDS_PER_MESSAGE {
            return Err(ScoutError::Config(format!(
                "settings.embeds_per_message must be at most {}",
                crate::sinks::discord::MAX_EMBEDS_PER_MESSAGE
            )));
        }

        url::Url::parse(&self.github.api_url)
            .map_err(|e| ScoutError::Config(format!("github.api_url is invalid: {}", e)))?;

        if self.llm.api_key.trim().is_empty() {
            return Err(ScoutError::Config(format!(
                "llm.api_key is empty (set it in the config or {})",
                LLM_API_KEY_ENV
            )));
        }

        if !dry_run {
            if self.discord.webhook_url.trim().is_empty() {
                return Err(ScoutError::Config(format!(
                    "discord.webhook_url is empty (set it in the config or {})",
                    DISCORD_WEBHOOK_ENV
                )));
            }
            url::Url::parse(&self.discord.webhook_url)
                .map_err(|_| ScoutError::Config("discord.webhook_url is not a valid URL".to_string()))?;
        }

        Ok(())
    }
}

/// Read, fill from the environment, and validate the configuration file.
pub fn load_config(path: impl AsRef<Path>, dry_run: bool) -> Result<Config> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ScoutError::FileNotFound {
            path: path.display().to_string(),
        });
    }

    let json = std::fs::read_to_string(path)?;
    let mut config = Config::from_json(&json)?;
    config.apply_env(|var| std::env::var(var).ok());
    config.validate(dry_run)?;

    info!(
        "Loaded config from {} (provider {}, {} keywords)",
        path.display(),
        config.llm.provider,
        config.github.keywords.len()
    );
    Ok(config)
}

/// Load the interest profile Markdown file, trimmed.
pub fn load_profile(path: impl AsRef<Path>) -> Result<InterestProfile> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ScoutError::FileNotFound {
            path: path.display().to_string(),
        });
    }

    let text = std::fs::read_to_string(path)?.trim().to_string();
    if text.is_empty() {
        return Err(ScoutError::Config(format!("interest profile {} is empty", path.display())));
    }

    Ok(InterestProfile {
        uri: path.display().to_string(),
        text,
    })
}
