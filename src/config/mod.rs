//! Configuration system (layered: code > env > config file).

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use bon::Builder;
use serde::{Deserialize, Serialize};

use crate::api::CredentialTransport;
use crate::error::{GateError, Result};
use crate::util::fs::default_state_dir;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
const ENV_PREFIX: &str = "STATEMENT_GATE_";

/// Site paths, timeouts and storage locations for the web client.
///
/// # Example
/// ```
/// use statement_gate::config::GateConfig;
///
/// let config = GateConfig::builder()
///     .base_url("https://app.example.com")
///     .ready_timeout_ms(2_000)
///     .build();
/// assert_eq!(config.login_path, "/login.html");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Builder, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    #[builder(into, default = DEFAULT_BASE_URL.to_string())]
    pub base_url: String,
    #[builder(into, default = "/login.html".to_string())]
    pub login_path: String,
    #[builder(into, default = "/signup.html".to_string())]
    pub signup_path: String,
    #[builder(into, default = "/dashboard.html".to_string())]
    pub dashboard_path: String,
    #[builder(into, default = "/pricing.html".to_string())]
    pub pricing_path: String,
    #[builder(default)]
    pub transport: CredentialTransport,
    /// Upper bound on waiting for the session to finish initializing.
    #[builder(default = 5_000)]
    pub ready_timeout_ms: u64,
    #[builder(default = 30_000)]
    pub request_timeout_ms: u64,
    /// Pending intents older than this are never replayed.
    #[builder(default = 3_600)]
    pub intent_ttl_secs: u64,
    #[builder(default = default_plans())]
    pub plans: Vec<String>,
    pub state_dir: Option<PathBuf>,
    #[builder(into, default = "default".to_string())]
    pub namespace: String,
}

fn default_plans() -> Vec<String> {
    ["starter", "professional", "business"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for GateConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl GateConfig {
    /// Default config file path (`~/.statement-gate/config.toml`).
    pub fn default_path() -> PathBuf {
        default_state_dir().join("config.toml")
    }

    /// Load from a TOML file; a missing file yields the defaults.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = match std::fs::read_to_string(path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => return Err(GateError::Io(err)),
        };
        let config: Self = toml::from_str(&raw).map_err(|e| {
            GateError::Configuration(format!("invalid config {}: {e}", path.display()))
        })?;
        config.validate()
    }

    /// Defaults overridden by `STATEMENT_GATE_*` variables (and `.env`).
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        Self::default().with_env_overrides(|key| std::env::var(key).ok())
    }

    /// File at `path` (or the default path), then env overrides on top.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let _ = dotenvy::dotenv();
        let file = match path {
            Some(path) => Self::load_from_path(path)?,
            None => Self::load_from_path(Self::default_path())?,
        };
        file.with_env_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`, which receives full variable names.
    pub fn with_env_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

        if let Some(value) = var("BASE_URL") {
            self.base_url = value;
        }
        if let Some(value) = var("LOGIN_PATH") {
            self.login_path = value;
        }
        if let Some(value) = var("SIGNUP_PATH") {
            self.signup_path = value;
        }
        if let Some(value) = var("DASHBOARD_PATH") {
            self.dashboard_path = value;
        }
        if let Some(value) = var("PRICING_PATH") {
            self.pricing_path = value;
        }
        if let Some(value) = var("TRANSPORT") {
            self.transport = CredentialTransport::from_str(&value).map_err(|_| {
                GateError::Configuration(format!(
                    "{ENV_PREFIX}TRANSPORT must be bearer, cookie or both (got {value})"
                ))
            })?;
        }
        if let Some(value) = var("READY_TIMEOUT_MS") {
            self.ready_timeout_ms = parse_number("READY_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = var("REQUEST_TIMEOUT_MS") {
            self.request_timeout_ms = parse_number("REQUEST_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = var("INTENT_TTL_SECS") {
            self.intent_ttl_secs = parse_number("INTENT_TTL_SECS", &value)?;
        }
        if let Some(value) = var("PLANS") {
            self.plans = value
                .split(',')
                .map(|plan| plan.trim().to_string())
                .filter(|plan| !plan.is_empty())
                .collect();
        }
        if let Some(value) = var("STATE_DIR") {
            self.state_dir = Some(PathBuf::from(value));
        }
        if let Some(value) = var("NAMESPACE") {
            self.namespace = value;
        }
        self.validate()
    }

    /// Reject settings that would make every redirect or request fail.
    pub fn validate(self) -> Result<Self> {
        reqwest::Url::parse(&self.base_url).map_err(|e| {
            GateError::Configuration(format!("invalid base_url {}: {e}", self.base_url))
        })?;
        for (name, path) in [
            ("login_path", &self.login_path),
            ("signup_path", &self.signup_path),
            ("dashboard_path", &self.dashboard_path),
            ("pricing_path", &self.pricing_path),
        ] {
            if !path.starts_with('/') {
                return Err(GateError::Configuration(format!(
                    "{name} must start with '/' (got {path})"
                )));
            }
        }
        if self.plans.is_empty() {
            return Err(GateError::Configuration(
                "at least one plan must be configured".to_string(),
            ));
        }
        Ok(self)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn intent_ttl(&self) -> chrono::Duration {
        i64::try_from(self.intent_ttl_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or(chrono::Duration::MAX)
    }

    pub fn state_dir(&self) -> PathBuf {
        self.state_dir.clone().unwrap_or_else(default_state_dir)
    }

    pub fn is_known_plan(&self, plan: &str) -> bool {
        self.plans.iter().any(|known| known.eq_ignore_ascii_case(plan))
    }
}

fn parse_number(name: &str, value: &str) -> Result<u64> {
    value.trim().parse().map_err(|_| {
        GateError::Configuration(format!("{ENV_PREFIX}{name} must be a number (got {value})"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_site_layout() {
        let config = GateConfig::default();
        assert_eq!(config.login_path, "/login.html");
        assert_eq!(config.dashboard_path, "/dashboard.html");
        assert_eq!(config.transport, CredentialTransport::Bearer);
        assert_eq!(config.ready_timeout(), Duration::from_secs(5));
        assert!(config.is_known_plan("Professional"));
    }

    #[test]
    fn env_overrides_apply() {
        let config = GateConfig::default()
            .with_env_overrides(lookup(&[
                ("STATEMENT_GATE_BASE_URL", "https://app.example.com"),
                ("STATEMENT_GATE_TRANSPORT", "both"),
                ("STATEMENT_GATE_READY_TIMEOUT_MS", "250"),
                ("STATEMENT_GATE_PLANS", "basic, premium"),
            ]))
            .unwrap();
        assert_eq!(config.base_url, "https://app.example.com");
        assert_eq!(config.transport, CredentialTransport::Both);
        assert_eq!(config.ready_timeout_ms, 250);
        assert_eq!(config.plans, vec!["basic", "premium"]);
    }

    #[test]
    fn invalid_env_number_is_configuration_error() {
        let err = GateConfig::default()
            .with_env_overrides(lookup(&[("STATEMENT_GATE_READY_TIMEOUT_MS", "soon")]))
            .unwrap_err();
        assert!(matches!(err, GateError::Configuration(_)));
    }

    #[test]
    fn relative_paths_are_rejected() {
        let err = GateConfig::builder()
            .login_path("login.html")
            .build()
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("login_path"));
    }
}
