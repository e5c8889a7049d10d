//! Service configuration: TOML file, environment overlay, CLI overrides.
//!
//! Everything has a default, so the service starts with no config file at
//! all. Secrets come from the `[slack]` table or the `SLACK_SIGNING_SECRET` /
//! `SLACK_BOT_TOKEN` environment variables; the environment wins so deployments
//! can keep tokens out of files.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Config file consulted when no `--config` flag is given.
pub const DEFAULT_CONFIG_PATH: &str = "wintally.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Listen port for the HTTP surface.
    pub port: u16,
    /// Path to the JSON win log. `~` expands to the home directory.
    pub store_path: String,
    pub slack: SlackConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SlackConfig {
    /// Signing secret for slash-command verification. Without it the
    /// `/logthiswin` endpoint refuses every request.
    pub signing_secret: Option<String>,
    /// Bot token for DM delivery. Without it summaries cannot be sent.
    pub bot_token: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8000,
            store_path: "win_logs.json".to_string(),
            slack: SlackConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration with the usual precedence: an explicit `--config`
    /// path must exist; otherwise `./wintally.toml` is used when present, and
    /// defaults when not. Environment secrets overlay whatever was read.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_PATH);
                if fallback.exists() {
                    Self::from_file(fallback)?
                } else {
                    Self::default()
                }
            }
        };
        config.overlay_env();
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read config: {}", path.display()))?;
        let config = toml::from_str(&raw).context("failed to parse config TOML")?;
        Ok(config)
    }

    fn overlay_env(&mut self) {
        if let Ok(secret) = std::env::var("SLACK_SIGNING_SECRET") {
            if !secret.is_empty() {
                self.slack.signing_secret = Some(secret);
            }
        }
        if let Ok(token) = std::env::var("SLACK_BOT_TOKEN") {
            if !token.is_empty() {
                self.slack.bot_token = Some(token);
            }
        }
    }

    /// Win log path with `~` expanded.
    pub fn store_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.store_path).into_owned())
    }
}
