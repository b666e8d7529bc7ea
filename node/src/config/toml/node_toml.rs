use super::{
    ActiveElectionsToml, ConfirmationHeightToml, OnlineRepsToml, StatsToml, VoteCacheToml,
};
use crate::config::NodeConfig;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct NodeToml {
    pub background_threads: Option<usize>,
    pub active_elections: Option<ActiveElectionsToml>,
    pub vote_cache: Option<VoteCacheToml>,
    pub confirmation_height: Option<ConfirmationHeightToml>,
    pub online_reps: Option<OnlineRepsToml>,
    pub statistics: Option<StatsToml>,
}

impl From<&NodeConfig> for NodeToml {
    fn from(config: &NodeConfig) -> Self {
        Self {
            background_threads: Some(config.background_threads),
            active_elections: Some((&config.active_elections).into()),
            vote_cache: Some((&config.vote_cache).into()),
            confirmation_height: Some((&config.confirmation_height).into()),
            online_reps: Some((&config.online_reps).into()),
            statistics: Some((&config.stats).into()),
        }
    }
}
