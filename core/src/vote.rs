use crate::{Account, BlockHash};

/// A representative's statement that it approves the given block hashes.
/// Signatures are verified before a vote reaches consensus.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Vote {
    pub voting_account: Account,
    /// Monotonically increasing per representative. `u64::MAX` marks a final vote.
    pub timestamp: u64,
    pub hashes: Vec<BlockHash>,
}

impl Vote {
    pub const FINAL_TIMESTAMP: u64 = u64::MAX;

    pub fn new(voting_account: Account, timestamp: u64, hashes: Vec<BlockHash>) -> Self {
        Self {
            voting_account,
            timestamp,
            hashes,
        }
    }

    pub fn new_final(voting_account: Account, hashes: Vec<BlockHash>) -> Self {
        Self::new(voting_account, Self::FINAL_TIMESTAMP, hashes)
    }

    pub fn is_final(&self) -> bool {
        self.timestamp == Self::FINAL_TIMESTAMP
    }
}

/// Outcome of processing a vote for a single block hash
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum VoteCode {
    /// Vote is valid and was added to an election
    Vote,
    /// Vote is older than or equal to one already seen from this representative
    Replay,
    /// No election exists for the hash
    Indeterminate,
    /// Vote was valid but arrived too soon after the previous one
    Ignored,
}

impl VoteCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteCode::Vote => "vote",
            VoteCode::Replay => "replay",
            VoteCode::Indeterminate => "indeterminate",
            VoteCode::Ignored => "ignored",
        }
    }
}

/// Where a vote came from
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum VoteSource {
    /// Received from the network just now
    Live,
    /// Replayed from the vote cache
    Cache,
}

impl VoteSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteSource::Live => "live",
            VoteSource::Cache => "cache",
        }
    }
}
