use super::{
    AccountsConfirmedMap, BatchWriteSizeManager, BatchWriteSizeManagerOptions, CementCallbackRefs,
    CementationWalker, LedgerDataRequester, WriteBatcher, WriteBatcherOptions,
};
use lattice_core::{utils::ContainerInfo, BlockChainSection, Epochs, SavedBlock};
use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

/// Sizes of the internal queues which can be read while the cementer thread is busy
#[derive(Clone)]
pub(crate) struct BlockCementerContainerInfo {
    pending_writes: Arc<AtomicUsize>,
    accounts_confirmed: Arc<AtomicUsize>,
}

impl BlockCementerContainerInfo {
    pub fn collect(&self) -> ContainerInfo {
        ContainerInfo::builder()
            .leaf(
                "pending_writes",
                self.pending_writes.load(Ordering::Relaxed),
                std::mem::size_of::<BlockChainSection>(),
            )
            .leaf(
                "accounts_confirmed",
                self.accounts_confirmed.load(Ordering::Relaxed),
                AccountsConfirmedMap::ELEMENT_SIZE,
            )
            .finish()
    }
}

/// Combines the walk over the unconfirmed chains with the batched writes.
/// Contains no I/O, the driver decides when to open a write transaction.
pub(crate) struct BlockCementerLogic {
    cementation_walker: CementationWalker,
    write_batcher: WriteBatcher,
    min_batch_separation: Duration,
}

#[derive(PartialEq, Eq, Debug)]
pub(crate) enum FlushDecision {
    DontFlush,
    /// Write if the write lock is available right now
    TryFlush,
    /// Queues are full, wait for the write lock
    ForceFlush,
}

pub(crate) struct BlockCementerLogicOptions {
    pub epochs: Epochs,
    pub stopped: Arc<AtomicBool>,
    pub min_batch_separation: Duration,
    pub min_batch_size: usize,
    pub batch_write_budget: Duration,
    pub max_pending_writes: usize,
}

impl Default for BlockCementerLogicOptions {
    fn default() -> Self {
        Self {
            epochs: Default::default(),
            stopped: Default::default(),
            min_batch_separation: Duration::from_millis(50),
            min_batch_size: BatchWriteSizeManagerOptions::DEFAULT_MIN_SIZE,
            batch_write_budget: BatchWriteSizeManagerOptions::DEFAULT_BUDGET,
            max_pending_writes: WriteBatcherOptions::DEFAULT_MAX_PENDING_WRITES,
        }
    }
}

impl BlockCementerLogic {
    pub fn new(options: BlockCementerLogicOptions) -> Self {
        let cementation_walker = CementationWalker::builder()
            .epochs(options.epochs)
            .stopped(options.stopped)
            .build();

        let write_batcher = WriteBatcher::new(WriteBatcherOptions {
            min_batch_size: options.min_batch_size,
            max_pending_writes: options.max_pending_writes,
            batch_write_budget: options.batch_write_budget,
        });

        Self {
            cementation_walker,
            write_batcher,
            min_batch_separation: options.min_batch_separation,
        }
    }

    pub fn set_current_block(&mut self, original_block: SavedBlock) {
        self.cementation_walker.initialize(original_block);
    }

    /// Enqueues the next resolved section. Returns false once the current block is fully walked.
    pub fn process_current_block<T: LedgerDataRequester>(
        &mut self,
        data_requester: &mut T,
        callbacks: &mut CementCallbackRefs,
    ) -> bool {
        if let Some(section) = self.cementation_walker.next_cementation(data_requester) {
            self.write_batcher.enqueue(section);
            true
        } else {
            self.cementation_walker
                .notify_block_already_cemented(callbacks.block_already_cemented);
            false
        }
    }

    pub fn is_current_block_done(&self) -> bool {
        self.cementation_walker.is_done()
    }

    pub fn get_flush_decision(
        &self,
        awaiting_processing: u64,
        processing_time: Duration,
    ) -> FlushDecision {
        if self.should_flush(
            awaiting_processing,
            self.cementation_walker.is_done(),
            processing_time,
        ) {
            if self.is_write_queue_full() {
                FlushDecision::ForceFlush
            } else {
                FlushDecision::TryFlush
            }
        } else {
            FlushDecision::DontFlush
        }
    }

    pub(crate) fn batch_write_size(&self) -> &Arc<BatchWriteSizeManager> {
        &self.write_batcher.batch_write_size
    }

    pub fn has_pending_writes(&self) -> bool {
        self.write_batcher.has_pending_writes()
    }

    pub fn clear_cached_accounts(&mut self) {
        self.cementation_walker.clear_all_cached_accounts();
    }

    fn is_write_queue_full(&self) -> bool {
        self.write_batcher.max_pending_writes_reached()
            || self.cementation_walker.is_accounts_cache_full()
    }

    fn is_min_processing_time_exceeded(&self, processing_time: Duration) -> bool {
        processing_time >= self.min_batch_separation
    }

    fn should_flush(
        &self,
        awaiting_processing: u64,
        current_process_done: bool,
        processing_time: Duration,
    ) -> bool {
        if !self.write_batcher.has_pending_writes() {
            return false;
        }

        // When there are a lot of pending confirmation height blocks, it is more efficient to
        // bulk some of them up to enable better write performance which becomes the bottleneck.
        let is_done_processing = current_process_done
            && (awaiting_processing == 0 || self.is_min_processing_time_exceeded(processing_time));

        is_done_processing
            || self.write_batcher.max_batch_size_reached()
            || self.is_write_queue_full()
    }

    pub fn next_write<T: LedgerDataRequester>(
        &mut self,
        data_requester: &T,
    ) -> Option<BlockChainSection> {
        let next_write = self.write_batcher.next_write(data_requester);
        if let Some(section) = &next_write {
            self.cementation_walker
                .section_cemented(&section.account, section.top_height);
        }
        next_write
    }

    pub fn batch_completed(
        &mut self,
        time_spent_cementing: Duration,
        callbacks: &mut CementCallbackRefs,
    ) {
        self.write_batcher
            .batch_completed(time_spent_cementing, callbacks.block_cemented);
    }

    pub(crate) fn container_info(&self) -> BlockCementerContainerInfo {
        BlockCementerContainerInfo {
            pending_writes: self.write_batcher.pending_writes_len(),
            accounts_confirmed: self.cementation_walker.accounts_confirmed_len(),
        }
    }

    pub fn unpublished_cemented_blocks_len(&self) -> usize {
        self.write_batcher.unpublished_cemented_blocks_len()
    }

    pub fn should_start_new_batch(&self) -> bool {
        self.write_batcher.should_start_new_batch()
    }
}

impl Default for BlockCementerLogic {
    fn default() -> Self {
        Self::new(Default::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cementation::{CementCallbacks, LedgerDataRequesterStub};
    use lattice_core::{Amount, BlockHash, TestAccountChain};
    use std::{cell::RefCell, rc::Rc};

    static TEST_MIN_BATCH_SEPARATION: Duration = Duration::from_millis(50);
    const TEST_MIN_BATCH_SIZE: usize = 100;

    #[test]
    fn flush_block_if_it_is_the_only_one() {
        let mut data_requester = LedgerDataRequesterStub::new();
        let mut genesis_chain = data_requester.add_genesis_block();
        genesis_chain.add_legacy_send();
        data_requester.add_uncemented(&genesis_chain);

        let mut logic = BlockCementerLogic::new(test_options());
        logic.set_current_block(genesis_chain.latest_block().clone());
        let mut callbacks = CementCallbacks::default();
        assert!(logic.process_current_block(&mut data_requester, &mut callbacks.as_refs()));
        assert_eq!(
            logic.get_flush_decision(0, Duration::ZERO),
            FlushDecision::TryFlush
        );
        let next_write = logic.next_write(&data_requester).unwrap();
        assert_eq!(next_write, genesis_chain.frontier_section());
        assert_eq!(logic.should_start_new_batch(), false);
        logic.batch_completed(Duration::ZERO, &mut callbacks.as_refs());

        assert_eq!(
            logic.process_current_block(&mut data_requester, &mut callbacks.as_refs()),
            false
        );
        assert_eq!(logic.unpublished_cemented_blocks_len(), 0);
        assert_eq!(logic.has_pending_writes(), false);
        assert_eq!(logic.batch_write_size().current_size(), TEST_MIN_BATCH_SIZE);
    }

    #[test]
    fn flush_two_blocks_in_one_batch() {
        let mut data_requester = LedgerDataRequesterStub::new();
        let mut genesis_chain = data_requester.add_genesis_block();
        genesis_chain.add_legacy_send();
        genesis_chain.add_legacy_send();
        data_requester.add_uncemented(&genesis_chain);

        let mut logic = BlockCementerLogic::new(test_options());
        logic.set_current_block(genesis_chain.latest_block().clone());
        let mut callbacks = CementCallbacks::default();
        assert!(logic.process_current_block(&mut data_requester, &mut callbacks.as_refs()));
        // the walk only knows it is finished after revisiting the original block
        assert_eq!(logic.is_current_block_done(), false);
        assert_eq!(
            logic.get_flush_decision(0, Duration::ZERO),
            FlushDecision::DontFlush
        );
        assert_eq!(
            logic.process_current_block(&mut data_requester, &mut callbacks.as_refs()),
            false
        );
        assert_eq!(
            logic.get_flush_decision(0, Duration::ZERO),
            FlushDecision::TryFlush
        );

        let next_write = logic.next_write(&data_requester).unwrap();
        assert_eq!(next_write, genesis_chain.section(2, 3));
        assert_eq!(logic.should_start_new_batch(), false);
        logic.batch_completed(Duration::ZERO, &mut callbacks.as_refs());

        assert_eq!(logic.unpublished_cemented_blocks_len(), 0);
        assert_eq!(logic.has_pending_writes(), false);
    }

    #[test]
    fn dont_flush_if_there_are_more_blocks_awaiting_processing_and_processing_time_is_low() {
        let mut data_requester = LedgerDataRequesterStub::new();
        let mut genesis_chain = data_requester.add_genesis_block();
        genesis_chain.add_legacy_send();
        data_requester.add_uncemented(&genesis_chain);

        let mut logic = BlockCementerLogic::new(test_options());
        logic.set_current_block(genesis_chain.latest_block().clone());
        let mut callbacks = CementCallbacks::default();
        assert!(logic.process_current_block(&mut data_requester, &mut callbacks.as_refs()));
        let still_awaiting_processing = 1;
        assert_eq!(
            logic.get_flush_decision(still_awaiting_processing, Duration::ZERO),
            FlushDecision::DontFlush
        );
    }

    #[test]
    fn flush_if_there_are_more_blocks_awaiting_processing_but_processing_time_is_high() {
        let mut data_requester = LedgerDataRequesterStub::new();
        let mut genesis_chain = data_requester.add_genesis_block();
        genesis_chain.add_legacy_send();
        data_requester.add_uncemented(&genesis_chain);

        let mut logic = BlockCementerLogic::new(test_options());
        logic.set_current_block(genesis_chain.latest_block().clone());
        let mut callbacks = CementCallbacks::default();
        assert!(logic.process_current_block(&mut data_requester, &mut callbacks.as_refs()));

        let still_awaiting_processing = 1;
        assert_eq!(
            logic.get_flush_decision(still_awaiting_processing, TEST_MIN_BATCH_SEPARATION),
            FlushDecision::TryFlush
        );
    }

    #[test]
    fn flush_if_max_batch_size_reached() {
        let mut data_requester = LedgerDataRequesterStub::new();
        let mut genesis_chain = data_requester.add_genesis_block();
        genesis_chain.add_legacy_send();
        genesis_chain.add_legacy_send();
        genesis_chain.add_legacy_send();
        data_requester.add_uncemented(&genesis_chain);

        let mut logic = BlockCementerLogic::new(BlockCementerLogicOptions {
            min_batch_size: 2,
            ..test_options()
        });

        logic.set_current_block(genesis_chain.latest_block().clone());
        let mut callbacks = CementCallbacks::default();
        assert!(logic.process_current_block(&mut data_requester, &mut callbacks.as_refs()));
        let still_awaiting_processing = 1;
        assert_eq!(
            logic.get_flush_decision(still_awaiting_processing, Duration::ZERO),
            FlushDecision::TryFlush
        );

        let next_write = logic.next_write(&data_requester).unwrap();
        assert_eq!(next_write, genesis_chain.section(2, 3));
        assert_eq!(logic.should_start_new_batch(), true);
        logic.batch_completed(Duration::ZERO, &mut callbacks.as_refs());

        let next_write = logic.next_write(&data_requester).unwrap();
        assert_eq!(next_write, genesis_chain.section(4, 4));
        assert_eq!(logic.should_start_new_batch(), false);
    }

    #[test]
    fn force_flush_if_write_queue_is_full() {
        let mut data_requester = LedgerDataRequesterStub::new();
        let mut genesis_chain = data_requester.add_genesis_block();
        genesis_chain.add_legacy_send();
        data_requester.add_uncemented(&genesis_chain);

        let mut logic = BlockCementerLogic::new(BlockCementerLogicOptions {
            max_pending_writes: 1,
            ..test_options()
        });

        logic.set_current_block(genesis_chain.latest_block().clone());
        let mut callbacks = CementCallbacks::default();
        assert!(logic.process_current_block(&mut data_requester, &mut callbacks.as_refs()));
        let still_awaiting_processing = 1;
        assert_eq!(
            logic.get_flush_decision(still_awaiting_processing, Duration::ZERO),
            FlushDecision::ForceFlush
        );

        let next_write = logic.next_write(&data_requester).unwrap();
        assert_eq!(next_write, genesis_chain.section(2, 2));
        assert_eq!(logic.should_start_new_batch(), false);
    }

    #[test]
    fn flush_when_batch_is_full() {
        let mut data_requester = LedgerDataRequesterStub::new();
        let mut dest_chain = TestAccountChain::new();
        let mut genesis_chain = data_requester.add_genesis_block();
        genesis_chain.add_legacy_send_to(dest_chain.account(), Amount::raw(1));
        dest_chain.add_legacy_open_from_account(&genesis_chain);
        genesis_chain.add_legacy_send();
        data_requester.add_uncemented(&genesis_chain);
        data_requester.add_uncemented(&dest_chain);

        let mut logic = BlockCementerLogic::new(BlockCementerLogicOptions {
            min_batch_size: 3,
            ..test_options()
        });
        logic.set_current_block(dest_chain.latest_block().clone());
        let mut callbacks = CementCallbacks::default();
        let still_awaiting_processing = 1;

        // genesis send, then the dest open
        assert!(logic.process_current_block(&mut data_requester, &mut callbacks.as_refs()));
        assert_eq!(
            logic.get_flush_decision(still_awaiting_processing, Duration::ZERO),
            FlushDecision::DontFlush
        );
        assert!(logic.process_current_block(&mut data_requester, &mut callbacks.as_refs()));
        assert_eq!(
            logic.process_current_block(&mut data_requester, &mut callbacks.as_refs()),
            false
        );

        logic.set_current_block(genesis_chain.latest_block().clone());
        assert!(logic.process_current_block(&mut data_requester, &mut callbacks.as_refs()));
        assert_eq!(
            logic.get_flush_decision(still_awaiting_processing, Duration::ZERO),
            FlushDecision::TryFlush
        );

        let next_write = logic.next_write(&data_requester).unwrap();
        assert_eq!(next_write, genesis_chain.section(2, 2));
        data_requester.cement(genesis_chain.block(2));

        let next_write = logic.next_write(&data_requester).unwrap();
        assert_eq!(next_write, dest_chain.section(1, 1));
        data_requester.cement(dest_chain.block(1));

        let next_write = logic.next_write(&data_requester).unwrap();
        assert_eq!(next_write, genesis_chain.section(3, 3));
        data_requester.cement(genesis_chain.block(3));

        assert_eq!(logic.next_write(&data_requester), None);
        assert_eq!(logic.unpublished_cemented_blocks_len(), 3);
    }

    #[test]
    fn notify_already_cemented_block() {
        let mut data_requester = LedgerDataRequesterStub::new();
        let genesis_chain = data_requester.add_genesis_block();

        let mut logic = BlockCementerLogic::new(test_options());
        logic.set_current_block(genesis_chain.latest_block().clone());

        let already_cemented = Rc::new(RefCell::new(Vec::<BlockHash>::new()));
        let already_cemented_clone = Rc::clone(&already_cemented);
        let mut callbacks = CementCallbacks {
            block_already_cemented: Box::new(move |hash| {
                already_cemented_clone.borrow_mut().push(hash)
            }),
            ..Default::default()
        };

        assert_eq!(
            logic.process_current_block(&mut data_requester, &mut callbacks.as_refs()),
            false
        );
        assert_eq!(*already_cemented.borrow(), vec![genesis_chain.frontier()]);
        assert_eq!(logic.has_pending_writes(), false);
    }

    #[test]
    fn container_info_reports_queue_sizes() {
        let mut data_requester = LedgerDataRequesterStub::new();
        let mut genesis_chain = data_requester.add_genesis_block();
        genesis_chain.add_legacy_send();
        data_requester.add_uncemented(&genesis_chain);

        let mut logic = BlockCementerLogic::new(test_options());
        let info = logic.container_info();
        logic.set_current_block(genesis_chain.latest_block().clone());
        let mut callbacks = CementCallbacks::default();
        logic.process_current_block(&mut data_requester, &mut callbacks.as_refs());

        let collected = info.collect();
        assert_eq!(collected.leaf_count("pending_writes"), Some(1));
        assert_eq!(collected.leaf_count("accounts_confirmed"), Some(1));
    }

    fn test_options() -> BlockCementerLogicOptions {
        BlockCementerLogicOptions {
            min_batch_separation: TEST_MIN_BATCH_SEPARATION,
            min_batch_size: TEST_MIN_BATCH_SIZE,
            ..Default::default()
        }
    }
}
