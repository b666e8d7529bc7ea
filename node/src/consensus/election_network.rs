use lattice_core::{Account, Block, BlockHash, Root};
use lattice_output_tracker::{OutputListenerMt, OutputTrackerMt};
use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
};

/// Outgoing traffic of elections. Delivery is best effort.
pub trait ElectionNetwork: Send + Sync {
    /// Random flood for block propagation
    fn flood_block(&self, block: &Block);
    /// Directed broadcast to a representative
    fn send_block(&self, representative: &Account, block: &Block);
    /// Ask a representative to vote on the given blocks
    fn send_confirm_req(&self, representative: &Account, roots_hashes: Vec<(BlockHash, Root)>);
    fn is_queue_full(&self, representative: &Account) -> bool;
    /// Number of peers a flood reaches
    fn fanout(&self) -> usize;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ElectionNetworkAction {
    FloodBlock(BlockHash),
    SendBlock(Account, BlockHash),
    ConfirmReq(Account, Vec<(BlockHash, Root)>),
}

/// Network that sends nothing and records what would have been sent
pub struct NullElectionNetwork {
    listener: OutputListenerMt<ElectionNetworkAction>,
    full_queues: Mutex<HashSet<Account>>,
    fanout: usize,
}

impl NullElectionNetwork {
    pub fn new() -> Self {
        Self {
            listener: OutputListenerMt::new(),
            full_queues: Mutex::new(HashSet::new()),
            fanout: 8,
        }
    }

    pub fn track(&self) -> Arc<OutputTrackerMt<ElectionNetworkAction>> {
        self.listener.track()
    }

    pub fn set_queue_full(&self, representative: Account) {
        self.full_queues.lock().unwrap().insert(representative);
    }
}

impl Default for NullElectionNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl ElectionNetwork for NullElectionNetwork {
    fn flood_block(&self, block: &Block) {
        self.listener
            .emit(ElectionNetworkAction::FloodBlock(block.hash()));
    }

    fn send_block(&self, representative: &Account, block: &Block) {
        self.listener
            .emit(ElectionNetworkAction::SendBlock(*representative, block.hash()));
    }

    fn send_confirm_req(&self, representative: &Account, roots_hashes: Vec<(BlockHash, Root)>) {
        self.listener
            .emit(ElectionNetworkAction::ConfirmReq(*representative, roots_hashes));
    }

    fn is_queue_full(&self, representative: &Account) -> bool {
        self.full_queues.lock().unwrap().contains(representative)
    }

    fn fanout(&self) -> usize {
        self.fanout
    }
}
