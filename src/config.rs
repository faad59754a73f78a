use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GrokConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    /// Omitted from the request when unset, letting the API pick its default.
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GrokConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_model(),
            base_url: default_base_url(),
            system_prompt: default_system_prompt(),
            max_tokens: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl GrokConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Base URL without a trailing slash.
    pub fn effective_base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RelayConfig {
    /// Max characters kept from a replied-to message when quoting it.
    #[serde(default = "default_max_snippet_len")]
    pub max_snippet_len: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            max_snippet_len: default_max_snippet_len(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub grok: GrokConfig,
    #[serde(default)]
    pub relay: RelayConfig,
}

fn default_model() -> String {
    "grok-4".to_string()
}

fn default_base_url() -> String {
    "https://api.x.ai/v1".to_string()
}

fn default_system_prompt() -> String {
    "You are Grok integrated into a Telegram group chat. \
     Respond concisely and helpfully using the context."
        .to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_max_snippet_len() -> usize {
    160
}

impl Config {
    /// Load the configuration the way the binary does: optional TOML file,
    /// then process environment on top, then validation.
    pub fn load() -> Result<Self> {
        let file = match std::env::var("GROKBOT_CONFIG") {
            Ok(path) => Some(PathBuf::from(path)),
            Err(_) => {
                let default = PathBuf::from("config.toml");
                default.exists().then_some(default)
            }
        };

        let mut config = match file {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Overlay values from an environment-like lookup. Blank values are
    /// treated as unset.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("BOT_TOKEN") {
            self.telegram.bot_token = v;
        }
        if let Some(v) = get("XAI_API_KEY") {
            self.grok.api_key = v;
        }
        if let Some(v) = get("GROK_MODEL") {
            self.grok.model = v;
        }
        if let Some(v) = get("GROK_BASE_URL") {
            self.grok.base_url = v;
        }
        if let Some(v) = get("GROK_SYSTEM_PROMPT") {
            self.grok.system_prompt = v;
        }
        if let Some(v) = get("GROK_MAX_TOKENS") {
            self.grok.max_tokens = Some(parse_number("GROK_MAX_TOKENS", &v)?);
        }
        if let Some(v) = get("GROK_TIMEOUT_SECS") {
            self.grok.timeout_secs = parse_number("GROK_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = get("MAX_SNIPPET_LEN") {
            self.relay.max_snippet_len = parse_number("MAX_SNIPPET_LEN", &v)?;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.telegram.bot_token.trim().is_empty() {
            anyhow::bail!("BOT_TOKEN missing - set it in the environment, .env or [telegram] bot_token");
        }
        if self.grok.api_key.trim().is_empty() {
            anyhow::bail!("XAI_API_KEY missing - set it in the environment, .env or [grok] api_key");
        }
        if self.grok.timeout_secs == 0 {
            anyhow::bail!("GROK_TIMEOUT_SECS must be greater than zero");
        }
        if self.relay.max_snippet_len == 0 {
            anyhow::bail!("MAX_SNIPPET_LEN must be greater than zero");
        }
        Ok(())
    }
}

fn parse_number<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse()
        .with_context(|| format!("{} must be a number, got {:?}", key, value))
}
