use std::path::Path;
use std::sync::Arc;

use log::LevelFilter;
use serde::Deserialize;
use validator::{Validate, ValidationError};

use crate::error::ExchangeError;

/// Query parameter used for JSONP when `jsonp = true`.
pub const DEFAULT_JSONP_PARAM: &str = "jsonp";

/// Loads an [`ExchangeConfig`] from TOML and validates it.
pub struct ConfigLoader {
    config: Arc<ExchangeConfig>,
}

impl ConfigLoader {
    pub fn load_from_str(contents: &str) -> Result<Self, ExchangeError> {
        let config: ExchangeConfig =
            toml::from_str(contents).map_err(|err| ExchangeError::config(err.to_string()))?;
        config
            .validate()
            .map_err(|err| ExchangeError::config(err.to_string()))?;
        Ok(Self {
            config: Arc::new(config),
        })
    }

    pub fn from_path(path: &Path) -> Result<Self, ExchangeError> {
        let contents = std::fs::read_to_string(path).map_err(|err| {
            ExchangeError::config(format!("failed to read {}: {err}", path.display()))
        })?;
        Self::load_from_str(&contents)
    }

    pub fn config(&self) -> &ExchangeConfig {
        &self.config
    }

    pub fn shared(&self) -> Arc<ExchangeConfig> {
        Arc::clone(&self.config)
    }
}

/// Process-wide options, fixed once the [`crate::Enhancer`] is built.
///
/// ```toml
/// domain = ["example.com", "localhost"]
/// use-proxy = true
/// capitalize = true
/// cookie-secret = "change-me"
/// jsonp = "callback"
///
/// [logging]
/// level = "debug"
/// ```
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(rename_all = "kebab-case")]
pub struct ExchangeConfig {
    /// Base domains used to split `hostname` into domain and subdomain, tried in order.
    #[serde(default, deserialize_with = "one_or_many")]
    #[validate(custom(function = "validate_domains"))]
    pub domain: Vec<String>,
    /// Trust `X-Forwarded-Proto` and `X-Forwarded-Host`.
    #[serde(default)]
    pub use_proxy: bool,
    /// Title-case outgoing header names.
    #[serde(default = "default_capitalize")]
    pub capitalize: bool,
    /// Enables cookie signing and verification.
    #[serde(default)]
    #[validate(length(min = 1))]
    pub cookie_secret: Option<String>,
    #[serde(default)]
    pub jsonp: Jsonp,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            domain: Vec::new(),
            use_proxy: false,
            capitalize: default_capitalize(),
            cookie_secret: None,
            jsonp: Jsonp::Disabled,
            logging: LoggingConfig::default(),
        }
    }
}

impl ExchangeConfig {
    #[must_use]
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain.push(domain.into());
        self
    }

    #[must_use]
    pub fn with_use_proxy(mut self, use_proxy: bool) -> Self {
        self.use_proxy = use_proxy;
        self
    }

    #[must_use]
    pub fn with_capitalize(mut self, capitalize: bool) -> Self {
        self.capitalize = capitalize;
        self
    }

    #[must_use]
    pub fn with_cookie_secret(mut self, secret: impl Into<String>) -> Self {
        self.cookie_secret = Some(secret.into());
        self
    }

    #[must_use]
    pub fn with_jsonp(mut self, jsonp: Jsonp) -> Self {
        self.jsonp = jsonp;
        self
    }

    pub fn cookie_secret(&self) -> Option<&str> {
        self.cookie_secret.as_deref()
    }

    /// Name of the JSONP query parameter, if JSONP is enabled.
    pub fn jsonp_param(&self) -> Option<&str> {
        match &self.jsonp {
            Jsonp::Disabled => None,
            Jsonp::Param(name) => Some(name),
        }
    }
}

fn default_capitalize() -> bool {
    true
}

fn validate_domains(domains: &[String]) -> Result<(), ValidationError> {
    if domains.iter().any(|domain| domain.trim().is_empty()) {
        return Err(ValidationError::new("empty_domain"));
    }
    Ok(())
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(domain) => vec![domain],
        OneOrMany::Many(domains) => domains,
    })
}

/// JSONP setting: `false`, `true` (parameter `jsonp`) or an explicit parameter name.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub enum Jsonp {
    #[default]
    Disabled,
    Param(String),
}

impl Jsonp {
    pub fn enabled() -> Self {
        Jsonp::Param(DEFAULT_JSONP_PARAM.to_string())
    }
}

impl<'de> Deserialize<'de> for Jsonp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Flag(bool),
            Name(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Flag(true) => Ok(Jsonp::enabled()),
            Raw::Flag(false) => Ok(Jsonp::Disabled),
            Raw::Name(name) if name.trim().is_empty() => Err(serde::de::Error::custom(
                "jsonp parameter name must not be empty",
            )),
            Raw::Name(name) => Ok(Jsonp::Param(name.trim().to_string())),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LoggingConfig {
    #[serde(default = "default_level", deserialize_with = "deserialize_level")]
    pub level: LevelFilter,
    #[serde(default)]
    pub echo_stdout: Option<bool>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            echo_stdout: None,
        }
    }
}

impl LoggingConfig {
    /// Effective filter: `echo-stdout = false` silences the logger entirely.
    pub fn level_filter(&self) -> LevelFilter {
        if self.echo_stdout.unwrap_or(true) {
            self.level
        } else {
            LevelFilter::Off
        }
    }
}

fn default_level() -> LevelFilter {
    LevelFilter::Info
}

fn deserialize_level<'de, D>(deserializer: D) -> Result<LevelFilter, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    value.trim().parse().map_err(|_| {
        serde::de::Error::custom(format!("unknown logging level `{}`", value.trim()))
    })
}
