//! Provider settings commands.

use std::path::{Path, PathBuf};

use promptbook_core::llm::API_KEY_ENV;
use promptbook_core::{ProviderConfig, Settings, build_provider};

use crate::colors;

/// Resolve the settings file location.
pub fn settings_path(config: Option<&Path>) -> anyhow::Result<PathBuf> {
    config
        .map(Path::to_path_buf)
        .or_else(Settings::default_path)
        .ok_or_else(|| anyhow::anyhow!("cannot determine the home directory; pass --config"))
}

pub fn load_settings(config: Option<&Path>) -> anyhow::Result<Settings> {
    Ok(Settings::load(&settings_path(config)?)?)
}

fn describe_key(config: &ProviderConfig) -> &'static str {
    if std::env::var(API_KEY_ENV).is_ok_and(|v| !v.trim().is_empty()) {
        "from environment"
    } else if config.api_key.is_some() {
        "stored in settings"
    } else {
        "not set"
    }
}

pub fn show(config: Option<&Path>) -> anyhow::Result<()> {
    let path = settings_path(config)?;
    let provider = Settings::load(&path)?.provider;

    println!("{}Provider settings{} {}({}){}", colors::BOLD, colors::RESET, colors::DIM, path.display(), colors::RESET);
    println!("  type:        {}", provider.kind);
    println!("  model:       {}", provider.model);
    println!("  temperature: {}", provider.temperature);
    match provider.max_tokens {
        Some(max) => println!("  max_tokens:  {max}"),
        None => println!("  max_tokens:  (provider default)"),
    }
    if let Some(url) = &provider.base_url {
        println!("  base_url:    {url}");
    }
    println!("  api key:     {}", describe_key(&provider));
    Ok(())
}

/// Requested changes to the stored provider configuration.
pub struct ProviderChanges {
    pub kind: String,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    pub base_url: Option<String>,
}

impl ProviderChanges {
    fn apply(self, mut config: ProviderConfig) -> anyhow::Result<ProviderConfig> {
        config.kind = self.kind.parse()?;
        if let Some(model) = self.model {
            config.model = model;
        }
        if self.api_key.is_some() {
            config.api_key = self.api_key;
        }
        if let Some(temperature) = self.temperature {
            config.temperature = temperature;
        }
        if self.max_tokens.is_some() {
            config.max_tokens = self.max_tokens;
        }
        if self.base_url.is_some() {
            config.base_url = self.base_url;
        }
        Ok(config)
    }
}

/// Switch provider. The new configuration must build a working provider
/// before anything is written.
pub fn set(config: Option<&Path>, changes: ProviderChanges) -> anyhow::Result<()> {
    let path = settings_path(config)?;
    let mut settings = Settings::load(&path)?;
    let next = changes.apply(settings.provider.clone())?;

    let provider = build_provider(&next, None)?;
    settings.provider = next;
    settings.save(&path)?;

    println!(
        "{}Switched{} to {} provider (models: {})",
        colors::GREEN,
        colors::RESET,
        provider.name(),
        provider.available_models().join(", ")
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use promptbook_core::ProviderKind;
    use tempfile::TempDir;

    fn changes(kind: &str) -> ProviderChanges {
        ProviderChanges {
            kind: kind.into(),
            model: None,
            api_key: None,
            temperature: None,
            max_tokens: None,
            base_url: None,
        }
    }

    #[test]
    fn test_set_persists_valid_switch() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");

        let mut request = changes("remote");
        request.api_key = Some("sk-stored".into());
        request.model = Some("gpt-4o".into());
        set(Some(&path), request).unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.provider.kind, ProviderKind::Remote);
        assert_eq!(settings.provider.model, "gpt-4o");
    }

    #[test]
    fn test_invalid_switch_leaves_file_untouched() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        set(Some(&path), changes("mock")).unwrap();
        let before = std::fs::read_to_string(&path).unwrap();

        let mut request = changes("mock");
        request.temperature = Some(3.0);
        assert!(set(Some(&path), request).is_err());
        assert!(set(Some(&path), changes("llama")).is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
    }
}
