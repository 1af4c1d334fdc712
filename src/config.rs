//! Process configuration
//!
//! Settings come from the environment (a `.env` file is honoured for local
//! runs). The clinic directory itself lives in a separate JSON document whose
//! path is one of these settings.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_API_BASE: &str = "https://graph.facebook.com/v21.0";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_THINK_DELAY_MIN_MS: u64 = 4000;
const DEFAULT_THINK_DELAY_MAX_MS: u64 = 10_000;

/// Fatal startup errors: bad environment or bad clinic document
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    MissingEnv(&'static str),
    #[error("Invalid value for {name}: {value:?}")]
    InvalidEnv { name: &'static str, value: String },
    #[error("Failed to read clinic config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed clinic config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Clinic config is missing clinic_name")]
    MissingClinicName,
}

/// Credentials and endpoint for the WhatsApp Cloud API
#[derive(Debug, Clone)]
pub struct WhatsAppConfig {
    pub api_base: String,
    pub token: String,
    pub phone_number_id: String,
    pub verify_token: String,
}

/// Bounds for the simulated "typing" pause before each reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThinkDelay {
    pub min: Duration,
    pub max: Duration,
}

impl ThinkDelay {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self { min, max }
    }

    /// No pause at all (tests)
    #[allow(dead_code)] // Used by runtime tests
    pub fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    /// Pick a uniformly random pause within the bounds
    pub fn sample(&self) -> Duration {
        use rand::Rng;

        if self.max <= self.min {
            return self.min;
        }
        let min_ms = u64::try_from(self.min.as_millis()).unwrap_or(u64::MAX);
        let max_ms = u64::try_from(self.max.as_millis()).unwrap_or(u64::MAX);
        Duration::from_millis(rand::thread_rng().gen_range(min_ms..=max_ms))
    }
}

impl Default for ThinkDelay {
    fn default() -> Self {
        Self::new(
            Duration::from_millis(DEFAULT_THINK_DELAY_MIN_MS),
            Duration::from_millis(DEFAULT_THINK_DELAY_MAX_MS),
        )
    }
}

/// Everything the bot needs to start serving
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub clinic_config_path: PathBuf,
    pub port: u16,
    pub think_delay: ThinkDelay,
    pub whatsapp: WhatsAppConfig,
}

impl BotConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the config from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::MissingEnv(name))
        };

        let port = parse_or(&lookup, "PORT", DEFAULT_PORT)?;
        let min_ms = parse_or(&lookup, "THINK_DELAY_MIN_MS", DEFAULT_THINK_DELAY_MIN_MS)?;
        let max_ms = parse_or(&lookup, "THINK_DELAY_MAX_MS", DEFAULT_THINK_DELAY_MAX_MS)?;
        if max_ms < min_ms {
            return Err(ConfigError::InvalidEnv {
                name: "THINK_DELAY_MAX_MS",
                value: max_ms.to_string(),
            });
        }

        Ok(Self {
            clinic_config_path: PathBuf::from(required("CLINIC_CONFIG_PATH")?),
            port,
            think_delay: ThinkDelay::new(
                Duration::from_millis(min_ms),
                Duration::from_millis(max_ms),
            ),
            whatsapp: WhatsAppConfig {
                api_base: lookup("WHATSAPP_API_BASE")
                    .filter(|v| !v.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
                token: required("WHATSAPP_TOKEN")?,
                phone_number_id: required("WHATSAPP_PHONE_NUMBER_ID")?,
                verify_token: required("WHATSAPP_VERIFY_TOKEN")?,
            },
        })
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidEnv { name, value }),
    }
}
