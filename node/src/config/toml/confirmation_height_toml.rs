use crate::cementation::ConfirmationHeightConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct ConfirmationHeightToml {
    /// Milliseconds
    pub batch_separate_pending_min_time: Option<u64>,
    /// Milliseconds
    pub batch_write_budget: Option<u64>,
    pub min_batch_size: Option<usize>,
    pub max_pending_writes: Option<usize>,
}

impl Default for ConfirmationHeightToml {
    fn default() -> Self {
        let config = ConfirmationHeightConfig::default();
        (&config).into()
    }
}

impl From<&ConfirmationHeightConfig> for ConfirmationHeightToml {
    fn from(config: &ConfirmationHeightConfig) -> Self {
        Self {
            batch_separate_pending_min_time: Some(
                config.batch_separate_pending_min_time.as_millis() as u64,
            ),
            batch_write_budget: Some(config.batch_write_budget.as_millis() as u64),
            min_batch_size: Some(config.min_batch_size),
            max_pending_writes: Some(config.max_pending_writes),
        }
    }
}

impl From<&ConfirmationHeightToml> for ConfirmationHeightConfig {
    fn from(toml: &ConfirmationHeightToml) -> Self {
        let mut config = ConfirmationHeightConfig::default();

        if let Some(millis) = toml.batch_separate_pending_min_time {
            config.batch_separate_pending_min_time = Duration::from_millis(millis);
        }
        if let Some(millis) = toml.batch_write_budget {
            config.batch_write_budget = Duration::from_millis(millis);
        }
        if let Some(min_batch_size) = toml.min_batch_size {
            config.min_batch_size = min_batch_size;
        }
        if let Some(max_pending_writes) = toml.max_pending_writes {
            config.max_pending_writes = max_pending_writes;
        }
        config
    }
}
