use super::{
    BatchWriteSizeManager, BatchWriteSizeManagerOptions, CementationQueue, LedgerDataRequester,
};
use lattice_core::{BlockChainSection, BlockHash, ConfirmationHeightInfo, SavedBlock};
use std::{
    sync::{atomic::AtomicUsize, Arc},
    time::Duration,
};

#[derive(Clone)]
pub(crate) struct WriteBatcherOptions {
    pub max_pending_writes: usize,
    pub min_batch_size: usize,
    pub batch_write_budget: Duration,
}

impl WriteBatcherOptions {
    pub const DEFAULT_MAX_PENDING_WRITES: usize = 0x20000;
}

impl Default for WriteBatcherOptions {
    fn default() -> Self {
        Self {
            max_pending_writes: Self::DEFAULT_MAX_PENDING_WRITES,
            min_batch_size: BatchWriteSizeManagerOptions::DEFAULT_MIN_SIZE,
            batch_write_budget: BatchWriteSizeManagerOptions::DEFAULT_BUDGET,
        }
    }
}

/// Turns the queued sections into the writes of the current batch.
/// A section that is larger than the remaining batch gets sliced, so that
/// the write transaction is not held open for too long.
pub(crate) struct WriteBatcher {
    /// Will contain all blocks that have been cemented (bounded by batch_write_size)
    /// and will get run through the cemented observer callback
    cemented_blocks: Vec<SavedBlock>,
    pending_writes: CementationQueue,
    pub batch_write_size: Arc<BatchWriteSizeManager>,
    max_pending_writes: usize,

    section_to_cement: Option<BlockChainSection>,
    confirmation_height_info: ConfirmationHeightInfo,
    is_initialized: bool,
    /// The total number of blocks to cement
    num_blocks_to_cement: u64,
    total_blocks_cemented_for_current_account: u64,
    /// The block height of the first block to cement
    start_height: u64,
    next_block_index: u64,
    new_cemented_frontier_hash: BlockHash,
    new_cemented_frontier_block: Option<SavedBlock>,
    bottom_hash: BlockHash,
    bottom_height: u64,
}

impl Default for WriteBatcher {
    fn default() -> Self {
        Self::new(Default::default())
    }
}

impl WriteBatcher {
    pub fn new(options: WriteBatcherOptions) -> Self {
        Self {
            cemented_blocks: Vec::new(),
            pending_writes: CementationQueue::new(),
            batch_write_size: Arc::new(BatchWriteSizeManager::new(BatchWriteSizeManagerOptions {
                min_size: options.min_batch_size,
                budget: options.batch_write_budget,
            })),
            max_pending_writes: options.max_pending_writes,

            section_to_cement: None,
            confirmation_height_info: Default::default(),
            is_initialized: false,
            num_blocks_to_cement: 0,
            total_blocks_cemented_for_current_account: 0,
            start_height: 0,
            next_block_index: 0,
            new_cemented_frontier_hash: BlockHash::zero(),
            new_cemented_frontier_block: None,
            bottom_hash: BlockHash::zero(),
            bottom_height: 0,
        }
    }

    pub fn max_batch_size_reached(&self) -> bool {
        self.pending_writes.total_pending_blocks() >= self.batch_write_size.current_size()
    }

    pub fn max_pending_writes_reached(&self) -> bool {
        self.pending_writes.len() >= self.max_pending_writes
    }

    pub fn has_pending_writes(&self) -> bool {
        !self.pending_writes.is_empty()
    }

    pub fn enqueue(&mut self, section: BlockChainSection) {
        self.pending_writes.push_back(section);
    }

    /// The next section to write. Sections that turn out to be cemented
    /// already are skipped.
    pub fn next_write<T: LedgerDataRequester>(
        &mut self,
        data_requester: &T,
    ) -> Option<BlockChainSection> {
        loop {
            if self.is_current_account_done() {
                let pending = self.pending_writes.pop_front()?;
                self.init_account(data_requester, pending);
            }

            if let Some(slice) = self.next_batch(data_requester) {
                return Some(slice);
            }

            if !self.is_current_account_done() {
                return None;
            }
        }
    }

    fn init_account<T: LedgerDataRequester>(
        &mut self,
        data_requester: &T,
        pending: BlockChainSection,
    ) {
        self.confirmation_height_info = data_requester
            .get_confirmation_height(&pending.account)
            .unwrap_or_default();
        self.section_to_cement = Some(pending);
        self.is_initialized = false;
        self.num_blocks_to_cement = 0;
        self.total_blocks_cemented_for_current_account = 0;
        self.start_height = 0;
        self.next_block_index = 0;
        self.new_cemented_frontier_hash = BlockHash::zero();
        self.new_cemented_frontier_block = None;
    }

    pub fn is_done(&self) -> bool {
        self.is_current_account_done() && self.pending_writes.is_empty()
    }

    pub fn batch_completed(
        &mut self,
        time_spent_cementing: Duration,
        block_cemented: &mut dyn FnMut(&SavedBlock),
    ) {
        self.batch_write_size
            .adjust_size(time_spent_cementing, self.cemented_blocks.len());
        for block in self.cemented_blocks.drain(..) {
            block_cemented(&block);
        }
    }

    pub fn pending_writes_len(&self) -> Arc<AtomicUsize> {
        self.pending_writes.len_handle()
    }

    fn next_batch<T: LedgerDataRequester>(
        &mut self,
        data_requester: &T,
    ) -> Option<BlockChainSection> {
        if !self.is_initialized {
            self.initialize(data_requester);
            self.is_initialized = true;
        }

        // Cementing starts from the bottom of the chain and works upwards. This is because chains can have effectively
        // an infinite number of send/change blocks in a row. We don't want to hold the write transaction open for too long.
        for i in self.next_block_index..self.num_blocks_to_cement {
            self.next_block_index = i + 1;
            let Some(new_frontier) = &self.new_cemented_frontier_block else {
                break;
            };
            if self.bottom_height == 0 {
                self.bottom_height = new_frontier.height();
                self.bottom_hash = new_frontier.hash();
            }
            self.cemented_blocks.push(new_frontier.clone());
            self.total_blocks_cemented_for_current_account += 1;

            // Flush these callbacks and continue as we write in batches (ideally maximum 250ms) to not hold write db transaction for too long.
            let slice = self.create_slice();

            self.load_next_block_to_cement(data_requester);

            if slice.is_some() {
                return slice;
            }
        }

        self.create_slice()
    }

    fn initialize<T: LedgerDataRequester>(&mut self, data_requester: &T) {
        if let Some(hash) = self.get_first_block_to_cement(data_requester) {
            let new_frontier = load_block(&hash, data_requester);
            self.new_cemented_frontier_hash = hash;
            self.start_height = new_frontier.height();
            self.num_blocks_to_cement = self.section().top_height - self.start_height + 1;
            self.new_cemented_frontier_block = Some(new_frontier);
        }
    }

    fn section(&self) -> &BlockChainSection {
        self.section_to_cement
            .as_ref()
            .unwrap_or_else(|| panic!("no section to cement"))
    }

    fn get_first_block_to_cement<T: LedgerDataRequester>(
        &self,
        data_requester: &T,
    ) -> Option<BlockHash> {
        let section = self.section();
        if section.top_height <= self.confirmation_height_info.height {
            // all blocks are cemented already
            None
        } else if self.confirmation_height_info.height >= section.bottom_height {
            // We have to adjust our starting point
            let current_frontier =
                load_block(&self.confirmation_height_info.frontier, data_requester);
            current_frontier.successor()
        } else {
            // This is the usual case where pending.bottom_height is the first uncemented block
            if section.bottom_height != self.confirmation_height_info.height + 1 {
                panic!("pending.bottom_height should be exactly 1 block above the cemented frontier!");
            }
            Some(section.bottom_hash)
        }
    }

    /// Get the next block in the chain until we have reached the final desired one
    fn load_next_block_to_cement<T: LedgerDataRequester>(&mut self, data_requester: &T) {
        if !self.is_current_account_done() {
            let Some(current) = &self.new_cemented_frontier_block else {
                panic!("no current block loaded!")
            };
            let Some(successor) = current.successor() else {
                panic!(
                    "Next block to cement not found after {} for account {}",
                    self.new_cemented_frontier_hash,
                    current.account()
                );
            };
            self.new_cemented_frontier_hash = successor;
            self.new_cemented_frontier_block = Some(load_block(&successor, data_requester));
        } else if self.new_cemented_frontier_hash != self.section().top_hash {
            panic!("Last iteration reached, but top_hash does not match cemented frontier!")
        }
    }

    fn is_current_account_done(&self) -> bool {
        self.total_blocks_cemented_for_current_account == self.num_blocks_to_cement
    }

    fn create_slice(&mut self) -> Option<BlockChainSection> {
        if self.should_create_slice() {
            let section = BlockChainSection {
                account: self.section().account,
                top_hash: self.new_cemented_frontier_hash,
                top_height: self.start_height + self.total_blocks_cemented_for_current_account - 1,
                bottom_hash: self.bottom_hash,
                bottom_height: self.bottom_height,
            };
            self.bottom_hash = BlockHash::zero();
            self.bottom_height = 0;
            Some(section)
        } else {
            None
        }
    }

    fn should_create_slice(&self) -> bool {
        self.bottom_height > 0
            && (self.is_current_account_done()
                || self.cemented_blocks.len()
                    >= self.batch_write_size.current_size_with_tolerance())
    }

    pub fn unpublished_cemented_blocks_len(&self) -> usize {
        self.cemented_blocks.len()
    }

    pub fn should_start_new_batch(&self) -> bool {
        self.cemented_blocks.len() >= self.batch_write_size.current_size_with_tolerance()
            && !self.is_done()
    }
}

fn load_block<T: LedgerDataRequester>(hash: &BlockHash, data_requester: &T) -> SavedBlock {
    match data_requester.get_block(hash) {
        Some(block) => block,
        None => panic!("Could not load block {} to cement", hash),
    }
}
