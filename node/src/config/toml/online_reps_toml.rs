use crate::representatives::OnlineRepsConfig;
use lattice_core::Amount;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct OnlineRepsToml {
    /// Raw amount as a decimal string
    pub online_weight_minimum: Option<Amount>,
    pub quorum_percent: Option<u8>,
    /// Seconds
    pub weight_period: Option<u64>,
}

impl Default for OnlineRepsToml {
    fn default() -> Self {
        let config = OnlineRepsConfig::default();
        (&config).into()
    }
}

impl From<&OnlineRepsConfig> for OnlineRepsToml {
    fn from(config: &OnlineRepsConfig) -> Self {
        Self {
            online_weight_minimum: Some(config.online_weight_minimum),
            quorum_percent: Some(config.quorum_percent),
            weight_period: Some(config.weight_period.as_secs()),
        }
    }
}

impl OnlineRepsConfig {
    pub fn merge_toml(&mut self, toml: &OnlineRepsToml) {
        if let Some(minimum) = toml.online_weight_minimum {
            self.online_weight_minimum = minimum;
        }
        if let Some(percent) = toml.quorum_percent {
            self.quorum_percent = percent.min(100);
        }
        if let Some(secs) = toml.weight_period {
            self.weight_period = Duration::from_secs(secs);
        }
    }
}
