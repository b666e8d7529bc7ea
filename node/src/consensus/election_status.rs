use crate::stats::DetailType;
use lattice_core::{Account, Amount, Block, BlockHash};
use serde::Serialize;
use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};

/// How an election ended, or that it is still running
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ElectionStatusType {
    Ongoing = 0,
    /// Confirmed by votes while the election was active
    ActiveConfirmedQuorum = 1,
    /// The election was active when its block was cemented by a dependent block
    ActiveConfirmationHeight = 2,
    /// Cemented without an election
    InactiveConfirmationHeight = 3,
    Stopped = 5,
}

impl ElectionStatusType {
    pub fn as_str(&self) -> &'static str {
        serde_variant::to_variant_name(self).unwrap_or_default()
    }
}

impl From<ElectionStatusType> for DetailType {
    fn from(value: ElectionStatusType) -> Self {
        match value {
            ElectionStatusType::Ongoing => DetailType::Ongoing,
            ElectionStatusType::ActiveConfirmedQuorum => DetailType::ActiveConfirmedQuorum,
            ElectionStatusType::ActiveConfirmationHeight => DetailType::ActiveConfirmationHeight,
            ElectionStatusType::InactiveConfirmationHeight => DetailType::InactiveConfirmationHeight,
            ElectionStatusType::Stopped => DetailType::Stopped,
        }
    }
}

/// Outcome of an election, handed to cementing observers
#[derive(Clone, Debug)]
pub struct ElectionStatus {
    pub winner: Option<Arc<Block>>,
    pub tally: Amount,
    pub final_tally: Amount,
    pub confirmation_request_count: u32,
    pub block_count: u32,
    pub voter_count: u32,
    pub election_end: SystemTime,
    pub election_duration: Duration,
    pub election_status_type: ElectionStatusType,
}

impl Default for ElectionStatus {
    fn default() -> Self {
        Self {
            winner: None,
            tally: Amount::zero(),
            final_tally: Amount::zero(),
            confirmation_request_count: 0,
            block_count: 0,
            voter_count: 0,
            election_end: SystemTime::now(),
            election_duration: Duration::ZERO,
            election_status_type: ElectionStatusType::InactiveConfirmationHeight,
        }
    }
}

impl ElectionStatus {
    pub fn winner_hash(&self) -> BlockHash {
        self.winner
            .as_ref()
            .map(|block| block.hash())
            .unwrap_or_default()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VoteWithWeightInfo {
    pub representative: Account,
    pub timestamp: u64,
    pub hash: BlockHash,
    pub weight: Amount,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_type_names() {
        assert_eq!(
            ElectionStatusType::ActiveConfirmedQuorum.as_str(),
            "active_confirmed_quorum"
        );
        assert_eq!(ElectionStatusType::Stopped.as_str(), "stopped");
    }

    #[test]
    fn default_status_has_no_winner() {
        let status = ElectionStatus::default();
        assert_eq!(status.winner_hash(), BlockHash::zero());
    }
}
