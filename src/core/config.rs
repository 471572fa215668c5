use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const CONFIG_FILE: &str = "config.yml";

/// Environment variables checked for the Gemini key, in order.
pub const API_KEY_VARS: [&str; 2] = ["API_KEY", "GEMINI_API_KEY"];

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_output")]
    pub output_folder: String,

    #[serde(default)]
    pub llm: LlmConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_text_model")]
    pub text_model: String,
    #[serde(default = "default_image_model")]
    pub image_model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_folder: default_output(),
            llm: LlmConfig::default(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            text_model: default_text_model(),
            image_model: default_image_model(),
            base_url: default_base_url(),
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_output() -> String {
    "output".to_string()
}
fn default_text_model() -> String {
    "gemini-2.5-flash".to_string()
}
fn default_image_model() -> String {
    "gemini-2.5-flash-image".to_string()
}
fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}
fn default_timeout() -> u64 {
    120
}

impl Config {
    /// Loads `config.yml` from the working directory, or the defaults when
    /// there is none, then applies the API key from the environment.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(Path::new(CONFIG_FILE))?;
        config.apply_api_key(|name| std::env::var(name).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("{} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = serde_yaml_ng::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// The environment wins over the file; blank values count as unset.
    pub fn apply_api_key<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let from_env = API_KEY_VARS
            .iter()
            .filter_map(|name| lookup(name))
            .find(|v| !v.trim().is_empty());

        if let Some(key) = from_env {
            self.llm.api_key = Some(key);
        } else if self
            .llm
            .api_key
            .as_deref()
            .map_or(false, |k| k.trim().is_empty())
        {
            self.llm.api_key = None;
        }
    }

    pub fn ensure_directories(&self) -> Result<()> {
        fs::create_dir_all(&self.output_folder)
            .with_context(|| format!("Failed to create {}", self.output_folder))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_missing_file_uses_defaults() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let config = Config::load_from(&dir.path().join("config.yml"))?;

        assert_eq!(config.output_folder, "output");
        assert_eq!(config.llm.text_model, "gemini-2.5-flash");
        assert_eq!(config.llm.image_model, "gemini-2.5-flash-image");
        assert_eq!(config.llm.timeout_seconds, 120);
        assert!(config.llm.api_key.is_none());
        Ok(())
    }

    #[test]
    fn test_partial_file_keeps_defaults() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("config.yml");
        fs::write(&path, "output_folder: panels\nllm:\n  timeout_seconds: 30\n")?;

        let config = Config::load_from(&path)?;
        assert_eq!(config.output_folder, "panels");
        assert_eq!(config.llm.timeout_seconds, 30);
        assert_eq!(config.llm.text_model, "gemini-2.5-flash");
        Ok(())
    }

    #[test]
    fn test_invalid_file_is_an_error() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("config.yml");
        fs::write(&path, "llm: [not, a, map]\n")?;

        assert!(Config::load_from(&path).is_err());
        Ok(())
    }

    #[test]
    fn test_env_key_overrides_file_key() {
        let mut config = Config::default();
        config.llm.api_key = Some("from-file".to_string());

        let env: HashMap<&str, &str> = [("GEMINI_API_KEY", "from-env")].into();
        config.apply_api_key(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(config.llm.api_key.as_deref(), Some("from-env"));
    }

    #[test]
    fn test_api_key_var_takes_precedence() {
        let mut config = Config::default();
        let env: HashMap<&str, &str> = [("API_KEY", "primary"), ("GEMINI_API_KEY", "secondary")].into();
        config.apply_api_key(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(config.llm.api_key.as_deref(), Some("primary"));
    }

    #[test]
    fn test_blank_key_counts_as_missing() {
        let mut config = Config::default();
        config.llm.api_key = Some("   ".to_string());
        config.apply_api_key(|_| Some(String::new()));

        assert!(config.llm.api_key.is_none());
    }
}
