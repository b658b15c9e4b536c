use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub const ENV_ENVIRONMENT: &str = "AUTHFETCH_ENV";
pub const ENV_BASE_URL: &str = "AUTHFETCH_BASE_URL";

const DEFAULT_PRODUCTION_URL: &str = "https://prod.example.com/";
const DEFAULT_TEST_URL: &str = "https://test.example.com/";
const DEFAULT_REFRESH_PATH: &str = "auth/refresh-token/";

#[derive(Debug, Error)]
pub enum SettingsError {
  #[error("failed to read settings: {0}")]
  Io(#[from] std::io::Error),
  #[error("invalid settings json")]
  Json(#[from] serde_json::Error),
  #[error("invalid base url: {0}")]
  BaseUrl(String),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
  Production,
  #[default]
  Test,
}

impl Environment {
  fn parse(value: &str) -> Self {
    if value.trim().eq_ignore_ascii_case("production") {
      Self::Production
    } else {
      Self::Test
    }
  }
}

/// What to send as `Authorization` when no access token is held.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AnonymousAuth {
  #[default]
  Omit,
  Empty,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientSettings {
  pub environment: Environment,
  pub production_url: String,
  pub test_url: String,
  /// Overrides the environment-selected address when set.
  pub base_url: Option<String>,
  /// Refresh endpoint path. Any request url containing it is treated as the refresh endpoint.
  pub refresh_path: String,
  pub expiry_statuses: Vec<u16>,
  pub anonymous_auth: AnonymousAuth,
  pub timeout_seconds: Option<u64>,
  pub user_agent: Option<String>,
}

impl Default for ClientSettings {
  fn default() -> Self {
    Self {
      environment: Environment::default(),
      production_url: DEFAULT_PRODUCTION_URL.to_string(),
      test_url: DEFAULT_TEST_URL.to_string(),
      base_url: None,
      refresh_path: DEFAULT_REFRESH_PATH.to_string(),
      expiry_statuses: vec![401],
      anonymous_auth: AnonymousAuth::default(),
      timeout_seconds: None,
      user_agent: None,
    }
  }
}

impl ClientSettings {
  /// Reads settings from a JSON file. A missing file yields the defaults.
  pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
    let path = path.as_ref();
    if !path.exists() {
      tracing::debug!(path = %path.display(), "settings file not found; using defaults");
      return Ok(Self::default());
    }
    let data = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&data)?)
  }

  pub fn with_env_overrides(self) -> Self {
    self.with_overrides(|key| std::env::var(key).ok())
  }

  fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
    if let Some(env) = lookup(ENV_ENVIRONMENT) {
      self.environment = Environment::parse(&env);
    }
    if let Some(url) = lookup(ENV_BASE_URL).filter(|u| !u.trim().is_empty()) {
      self.base_url = Some(url.trim().to_string());
    }
    self
  }

  pub fn base_url(&self) -> Result<Url, SettingsError> {
    let raw = match (&self.base_url, self.environment) {
      (Some(url), _) => url.as_str(),
      (None, Environment::Production) => self.production_url.as_str(),
      (None, Environment::Test) => self.test_url.as_str(),
    };
    Url::parse(raw.trim()).map_err(|e| SettingsError::BaseUrl(format!("{raw}: {e}")))
  }

  pub fn timeout(&self) -> Option<Duration> {
    self.timeout_seconds.map(Duration::from_secs)
  }
}
