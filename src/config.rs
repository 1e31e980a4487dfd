use std::path::PathBuf;

use chrono::{Datelike, Local, Month};

use crate::error::ConfigError;

pub const DEFAULT_REGION: &str = "US";

pub const ENV_API_KEY: &str = "CLIMATIQ_API_KEY";
pub const ENV_DEFAULT_REGION: &str = "CARBON_DEFAULT_REGION";
pub const ENV_MONTH: &str = "CARBON_MONTH";
pub const ENV_PARALLEL: &str = "CARBON_PARALLEL";
pub const ENV_FACTOR_FILE: &str = "CARBON_FACTOR_FILE";

/// Everything the engine would otherwise pick up from globals: the seasonal
/// month, the default region, and the boundary credential.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub default_region: String,
    pub month: Month,
    /// Fan activities out over worker threads. Output is identical.
    pub parallel: bool,
    pub credential: Option<String>,
    pub factor_file: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_region: DEFAULT_REGION.to_string(),
            month: current_month(),
            parallel: false,
            credential: None,
            factor_file: None,
        }
    }
}

impl EngineConfig {
    pub fn with_month(mut self, month: Month) -> Self {
        self.month = month;
        self
    }

    pub fn with_default_region(mut self, region: impl Into<String>) -> Self {
        self.default_region = region.into();
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = Some(credential.into());
        self
    }

    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build from any variable lookup. Blank values count as unset.
    pub fn from_vars<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let mut config = Self::default();

        if let Some(region) = get(ENV_DEFAULT_REGION) {
            config.default_region = region;
        }
        if let Some(raw) = get(ENV_MONTH) {
            config.month = parse_month(&raw)?;
        }
        if let Some(raw) = get(ENV_PARALLEL) {
            config.parallel = parse_flag(ENV_PARALLEL, &raw)?;
        }
        config.credential = get(ENV_API_KEY);
        config.factor_file = get(ENV_FACTOR_FILE).map(PathBuf::from);

        Ok(config)
    }
}

/// Month of the local calendar right now.
pub fn current_month() -> Month {
    Month::try_from(Local::now().month() as u8).unwrap_or(Month::January)
}

pub fn parse_month(raw: &str) -> Result<Month, ConfigError> {
    raw.parse::<u8>()
        .ok()
        .and_then(|n| Month::try_from(n).ok())
        .ok_or_else(|| ConfigError::InvalidMonth {
            var: ENV_MONTH,
            value: raw.to_string(),
        })
}

fn parse_flag(var: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidFlag {
            var,
            value: raw.to_string(),
        }),
    }
}
