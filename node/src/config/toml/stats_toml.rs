use crate::stats::StatsConfig;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct StatsToml {
    pub max_samples: Option<usize>,
    pub log_headers: Option<bool>,
}

impl Default for StatsToml {
    fn default() -> Self {
        let config = StatsConfig::default();
        (&config).into()
    }
}

impl From<&StatsConfig> for StatsToml {
    fn from(config: &StatsConfig) -> Self {
        Self {
            max_samples: Some(config.max_samples),
            log_headers: Some(config.log_headers),
        }
    }
}

impl From<&StatsToml> for StatsConfig {
    fn from(toml: &StatsToml) -> Self {
        let mut config = StatsConfig::default();
        if let Some(max_samples) = toml.max_samples {
            config.max_samples = max_samples;
        }
        if let Some(log_headers) = toml.log_headers {
            config.log_headers = log_headers;
        }
        config
    }
}
