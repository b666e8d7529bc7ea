use lattice_core::BlockChainSection;
use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

/// Sections that are fully resolved and wait to be written to the ledger
pub(crate) struct CementationQueue {
    queue: VecDeque<BlockChainSection>,
    queue_len: Arc<AtomicUsize>,
}

impl CementationQueue {
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            queue_len: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn push_back(&mut self, section: BlockChainSection) {
        self.queue.push_back(section);
        self.queue_len.fetch_add(1, Ordering::Relaxed);
    }

    pub fn pop_front(&mut self) -> Option<BlockChainSection> {
        let item = self.queue.pop_front();
        if item.is_some() {
            self.queue_len.fetch_sub(1, Ordering::Relaxed);
        }
        item
    }

    pub fn total_pending_blocks(&self) -> usize {
        self.queue.iter().map(|i| i.block_count() as usize).sum()
    }

    pub fn len_handle(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.queue_len)
    }
}
