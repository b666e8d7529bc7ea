use crate::{Account, BlockHash};

/// A contiguous run of blocks in one account chain that is written
/// to the ledger as cemented in a single step
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockChainSection {
    pub account: Account,
    pub bottom_hash: BlockHash,
    pub bottom_height: u64,
    pub top_hash: BlockHash,
    pub top_height: u64,
}

impl BlockChainSection {
    pub fn block_count(&self) -> u64 {
        self.top_height - self.bottom_height + 1
    }
}
