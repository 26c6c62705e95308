//! Provider configuration and the on-disk settings file.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{LlmProvider, MockProvider, RemoteProvider, validate_request};
use crate::error::{Error, Result};

/// Environment variable consulted for the remote API key.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

pub const DEFAULT_MODEL: &str = "gpt-4";
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

/// Which backend to construct.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    #[default]
    Mock,
    Remote,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Mock => write!(f, "mock"),
            ProviderKind::Remote => write!(f, "remote"),
        }
    }
}

impl FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mock" => Ok(ProviderKind::Mock),
            "remote" | "openai" => Ok(ProviderKind::Remote),
            other => Err(Error::Configuration(format!(
                "unknown provider type '{other}' (expected 'mock' or 'remote')"
            ))),
        }
    }
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_temperature() -> f64 {
    DEFAULT_TEMPERATURE
}

/// Provider selection plus default sampling parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(rename = "type", default)]
    pub kind: ProviderKind,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::Mock,
            model: default_model(),
            api_key: None,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: None,
            base_url: None,
        }
    }
}

impl ProviderConfig {
    /// Check sampling parameters. Out-of-range values are rejected, never clamped.
    pub fn validate(&self) -> Result<()> {
        validate_request(&self.model, self.temperature, self.max_tokens)
            .map_err(|e| Error::Configuration(e.to_string()))
    }

    /// The API key that applies to this configuration.
    ///
    /// Precedence: `explicit`, then `OPENAI_API_KEY`, then the stored key.
    pub fn resolve_api_key(&self, explicit: Option<&str>) -> Option<String> {
        let env = std::env::var(API_KEY_ENV).ok();
        resolve_credential(explicit, env.as_deref(), self.api_key.as_deref())
    }
}

/// First non-empty credential among call-time, environment and file values.
pub fn resolve_credential(
    explicit: Option<&str>,
    env: Option<&str>,
    file: Option<&str>,
) -> Option<String> {
    [explicit, env, file]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

/// Construct the provider a configuration describes.
///
/// Fails with a configuration error before any network activity when the
/// parameters are invalid or a remote provider has no credential.
pub fn build_provider(
    config: &ProviderConfig,
    explicit_key: Option<&str>,
) -> Result<Arc<dyn LlmProvider>> {
    config.validate()?;

    match config.kind {
        ProviderKind::Mock => Ok(Arc::new(MockProvider::new())),
        ProviderKind::Remote => {
            let key = config.resolve_api_key(explicit_key).ok_or_else(|| {
                Error::Configuration(format!(
                    "remote provider requires an API key (pass --api-key, set {API_KEY_ENV}, or store one in the config file)"
                ))
            })?;
            let provider = RemoteProvider::new(key, config.base_url.as_deref(), config.model.clone())?;
            Ok(Arc::new(provider))
        }
    }
}

/// Contents of the settings file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub provider: ProviderConfig,
}

impl Settings {
    /// `~/.promptbook/config.json`, when a home directory is known.
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".promptbook").join("config.json"))
    }

    /// Load settings. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no settings file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(Error::Configuration(format!(
                    "failed to read {}: {e}",
                    path.display()
                )));
            }
        };

        let settings: Settings = serde_json::from_str(&text).map_err(|e| {
            Error::Configuration(format!("malformed settings file {}: {e}", path.display()))
        })?;
        settings.provider.validate()?;
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.provider.validate()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::persistence(parent, e))?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| Error::persistence(path, e))?;
        fs::write(path, json).map_err(|e| Error::persistence(path, e))?;
        tracing::info!(path = %path.display(), "saved settings");
        Ok(())
    }
}
