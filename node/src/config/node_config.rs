use super::{NetworkConstants, NodeToml};
use crate::{
    cementation::ConfirmationHeightConfig,
    consensus::{ActiveElectionsConfig, VoteCacheConfig},
    representatives::OnlineRepsConfig,
    stats::StatsConfig,
};
use lattice_core::Amount;

#[derive(Clone, Debug, PartialEq)]
pub struct NodeConfig {
    pub background_threads: usize,
    pub active_elections: ActiveElectionsConfig,
    pub vote_cache: VoteCacheConfig,
    pub confirmation_height: ConfirmationHeightConfig,
    pub online_reps: OnlineRepsConfig,
    pub stats: StatsConfig,
}

impl NodeConfig {
    pub fn new(network: &NetworkConstants) -> Self {
        let mut online_reps = OnlineRepsConfig::default();
        if network.is_dev {
            online_reps.online_weight_minimum = Amount::zero();
        }
        Self {
            background_threads: std::thread::available_parallelism()
                .map(|i| i.get())
                .unwrap_or(4),
            active_elections: ActiveElectionsConfig::default(),
            vote_cache: VoteCacheConfig::default(),
            confirmation_height: ConfirmationHeightConfig::default(),
            online_reps,
            stats: StatsConfig::default(),
        }
    }

    pub fn new_test_instance() -> Self {
        let mut config = Self::new(&NetworkConstants::dev());
        config.background_threads = 2;
        config
    }

    pub fn merge_toml(&mut self, toml: &NodeToml) {
        if let Some(background_threads) = toml.background_threads {
            self.background_threads = background_threads;
        }
        if let Some(active_elections) = &toml.active_elections {
            self.active_elections = active_elections.into();
        }
        if let Some(vote_cache) = &toml.vote_cache {
            self.vote_cache = vote_cache.into();
        }
        if let Some(confirmation_height) = &toml.confirmation_height {
            self.confirmation_height = confirmation_height.into();
        }
        if let Some(online_reps) = &toml.online_reps {
            self.online_reps.merge_toml(online_reps);
        }
        if let Some(stats) = &toml.statistics {
            self.stats = stats.into();
        }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self::new(&NetworkConstants::default())
    }
}
