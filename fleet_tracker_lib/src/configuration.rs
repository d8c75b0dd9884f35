use std::path::Path;

use serde::Deserialize;

use crate::{error::ConfigError, route::TravelMode, services::location_watcher::PositionOptions};

pub const DEFAULT_ROUTING_URL: &str = "https://router.project-osrm.org";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Configuration {
    pub routing_url: String,
    pub routing_profile: TravelMode,

    pub backend_url: Option<String>,
    pub api_token: Option<String>,
    pub driver_id: Option<String>,

    pub enable_high_accuracy: bool,
    pub timeout_ms: u32,
    pub max_sample_age_ms: u32,

    pub telemetry_queue: usize,
    /// Upper bound for a single telemetry request, after which the report is given up.
    pub telemetry_timeout_ms: u64,
    pub arrival_radius_m: f64,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            routing_url: DEFAULT_ROUTING_URL.to_string(),
            routing_profile: TravelMode::Driving,
            backend_url: None,
            api_token: None,
            driver_id: None,
            enable_high_accuracy: true,
            timeout_ms: 10_000,
            max_sample_age_ms: 0,
            telemetry_queue: 64,
            telemetry_timeout_ms: 10_000,
            arrival_radius_m: 30.0,
        }
    }
}

impl Configuration {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Reads a YAML mapping. Missing keys keep their defaults, an empty
    /// document yields the defaults.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let value: serde_yaml::Value = serde_yaml::from_str(text)?;
        if value.is_null() {
            return Ok(Self::default());
        }

        let mut config: Configuration = serde_yaml::from_value(value)?;
        config.routing_url = config.routing_url.trim_end_matches('/').to_string();
        config.backend_url = config
            .backend_url
            .map(|url| url.trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty());
        config.api_token = config.api_token.filter(|token| !token.is_empty());
        config.driver_id = config.driver_id.filter(|id| !id.is_empty());

        Ok(config)
    }

    pub fn position_options(&self) -> PositionOptions {
        PositionOptions {
            enable_high_accuracy: self.enable_high_accuracy,
            timeout_ms: self.timeout_ms,
            max_sample_age_ms: self.max_sample_age_ms,
        }
    }

    pub fn telemetry_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.telemetry_timeout_ms)
    }
}
