mod accounts_confirmed_map;
mod batch_write_size_manager;
mod block_cementer_logic;
mod cementation_queue;
mod cementation_walker;
mod confirmation_height_processor;
mod ledger_data_requester;
mod write_batcher;

pub(crate) use accounts_confirmed_map::*;
pub(crate) use batch_write_size_manager::*;
pub(crate) use block_cementer_logic::*;
pub(crate) use cementation_queue::*;
pub(crate) use cementation_walker::*;
pub use confirmation_height_processor::*;
pub(crate) use ledger_data_requester::*;
pub(crate) use write_batcher::*;

use lattice_core::{BlockHash, SavedBlock};
use std::time::Duration;

#[derive(Clone, Debug, PartialEq)]
pub struct ConfirmationHeightConfig {
    /// Pending writes are bundled for at least this long while more blocks are awaiting processing
    pub batch_separate_pending_min_time: Duration,
    /// A write batch that takes longer than this shrinks the next batch
    pub batch_write_budget: Duration,
    pub min_batch_size: usize,
    pub max_pending_writes: usize,
}

impl Default for ConfirmationHeightConfig {
    fn default() -> Self {
        Self {
            batch_separate_pending_min_time: Duration::from_millis(50),
            batch_write_budget: BatchWriteSizeManagerOptions::DEFAULT_BUDGET,
            min_batch_size: BatchWriteSizeManagerOptions::DEFAULT_MIN_SIZE,
            max_pending_writes: WriteBatcherOptions::DEFAULT_MAX_PENDING_WRITES,
        }
    }
}

pub(crate) struct CementCallbackRefs<'a> {
    pub block_cemented: &'a mut dyn FnMut(&SavedBlock),
    pub block_already_cemented: &'a mut dyn FnMut(BlockHash),
}

#[cfg(test)]
pub(crate) struct CementCallbacks {
    pub block_cemented: Box<dyn FnMut(&SavedBlock)>,
    pub block_already_cemented: Box<dyn FnMut(BlockHash)>,
}

#[cfg(test)]
impl CementCallbacks {
    pub fn as_refs(&mut self) -> CementCallbackRefs {
        CementCallbackRefs {
            block_cemented: &mut self.block_cemented,
            block_already_cemented: &mut self.block_already_cemented,
        }
    }
}

#[cfg(test)]
impl Default for CementCallbacks {
    fn default() -> Self {
        Self {
            block_cemented: Box::new(|_| {}),
            block_already_cemented: Box::new(|_| {}),
        }
    }
}
