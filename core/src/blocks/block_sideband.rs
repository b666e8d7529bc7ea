use super::BlockDetails;
use crate::{Account, Amount, BlockHash, Epoch};

/// Data about a block that is only known once it is stored in the ledger
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct BlockSideband {
    pub height: u64,
    /// Seconds since posix epoch
    pub timestamp: u64,
    /// Zero if this is the frontier of its chain
    pub successor: BlockHash,
    pub account: Account,
    pub balance: Amount,
    pub details: BlockDetails,
    pub source_epoch: Epoch,
}

impl BlockSideband {
    pub fn new(
        account: Account,
        successor: BlockHash,
        balance: Amount,
        height: u64,
        timestamp: u64,
        details: BlockDetails,
        source_epoch: Epoch,
    ) -> Self {
        Self {
            height,
            timestamp,
            successor,
            account,
            balance,
            details,
            source_epoch,
        }
    }
}
