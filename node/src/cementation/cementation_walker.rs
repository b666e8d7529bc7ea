use super::{AccountsConfirmedMap, ConfirmedInfo, LedgerDataRequester};
use bounded_vec_deque::BoundedVecDeque;
use lattice_core::{
    Account, BlockChainSection, BlockHash, ConfirmationHeightInfo, Epochs, SavedBlock,
};
use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
};
use tracing::error;

/** The maximum number of various containers to keep the memory bounded */
pub(crate) const MAX_ITEMS: usize = 131072;

/** The maximum number of blocks to be read in while iterating over a long account chain */
const BATCH_READ_SIZE: u64 = 65536;

#[derive(Clone, Debug)]
struct TopAndNextHash {
    /// Highest block that needs to be cemented in the chain being processed
    top: BlockHash,
    next: Option<BlockHash>,
    next_height: u64,
}

#[derive(Clone, Debug)]
struct ReceiveChainDetails {
    account: Account,
    height: u64,
    hash: BlockHash,
    top_level: BlockHash,
    /// Block after the receive, if it is not the top level block
    next: Option<BlockHash>,
    bottom_height: u64,
    bottom_most: BlockHash,
}

struct ReceiveSourcePair {
    receive_details: ReceiveChainDetails,
    source_hash: BlockHash,
}

/// The part of an account chain that was walked in one step
struct IteratedChain {
    account: Account,
    confirmed_height: u64,
    already_cemented: bool,
    bottom_hash: BlockHash,
    bottom_height: u64,
    top_most_non_receive: BlockHash,
    top_most_non_receive_height: u64,
}

#[derive(Default)]
pub(crate) struct CementationWalkerBuilder {
    epochs: Option<Epochs>,
    stopped: Option<Arc<AtomicBool>>,
    max_items: Option<usize>,
}

impl CementationWalkerBuilder {
    pub fn epochs(mut self, epochs: Epochs) -> Self {
        self.epochs = Some(epochs);
        self
    }

    pub fn stopped(mut self, stopped: Arc<AtomicBool>) -> Self {
        self.stopped = Some(stopped);
        self
    }

    pub fn max_items(mut self, max: usize) -> Self {
        self.max_items = Some(max);
        self
    }

    pub fn build(self) -> CementationWalker {
        let epochs = self.epochs.unwrap_or_default();
        let stopped = self
            .stopped
            .unwrap_or_else(|| Arc::new(AtomicBool::new(false)));

        CementationWalker::new(epochs, stopped, self.max_items.unwrap_or(MAX_ITEMS))
    }
}

/// Walks from a confirmed block down to the lowest uncemented blocks of its
/// account and, via receive blocks, of all source accounts. Emits the
/// sections to cement in an order that never cements a receive before
/// its source. Memory stays bounded: receive/source pairs that fall out of
/// the bounded buffer are found again from the checkpoints.
pub(crate) struct CementationWalker {
    stopped: Arc<AtomicBool>,
    epochs: Epochs,
    max_items: usize,
    original_block: Option<SavedBlock>,
    original_hash: BlockHash,
    next_in_receive_chain: Option<TopAndNextHash>,
    checkpoints: BoundedVecDeque<BlockHash>,
    receive_source_pairs: BoundedVecDeque<ReceiveSourcePair>,
    accounts_confirmed: AccountsConfirmedMap,
    ready: VecDeque<BlockChainSection>,
    first_iter: bool,
    finished: bool,
    original_already_cemented: bool,
}

impl CementationWalker {
    pub fn new(epochs: Epochs, stopped: Arc<AtomicBool>, max_items: usize) -> Self {
        Self {
            stopped,
            epochs,
            max_items,
            original_block: None,
            original_hash: BlockHash::zero(),
            next_in_receive_chain: None,
            checkpoints: BoundedVecDeque::new(max_items),
            receive_source_pairs: BoundedVecDeque::new(max_items),
            accounts_confirmed: AccountsConfirmedMap::new(),
            ready: VecDeque::new(),
            first_iter: true,
            finished: true,
            original_already_cemented: false,
        }
    }

    pub fn builder() -> CementationWalkerBuilder {
        Default::default()
    }

    /// Starts a new walk. Cached confirmation heights of previous walks are kept
    /// until `clear_all_cached_accounts` is called.
    pub fn initialize(&mut self, original_block: SavedBlock) {
        self.original_hash = original_block.hash();
        self.original_block = Some(original_block);
        self.next_in_receive_chain = None;
        self.checkpoints.clear();
        self.receive_source_pairs.clear();
        self.ready.clear();
        self.first_iter = true;
        self.finished = false;
        self.original_already_cemented = false;
    }

    pub fn next_cementation<T: LedgerDataRequester>(
        &mut self,
        data_requester: &mut T,
    ) -> Option<BlockChainSection> {
        loop {
            if let Some(section) = self.ready.pop_front() {
                return Some(section);
            }

            if self.finished {
                return None;
            }

            if self.stopped.load(Ordering::SeqCst) {
                self.finished = true;
                return None;
            }

            self.step(data_requester);
        }
    }

    pub fn is_done(&self) -> bool {
        self.finished && self.ready.is_empty()
    }

    pub fn is_accounts_cache_full(&self) -> bool {
        self.accounts_confirmed.len() >= self.max_items
    }

    pub fn clear_all_cached_accounts(&mut self) {
        self.accounts_confirmed.clear();
    }

    /// The section was written, so the ledger knows the height from now on
    pub fn section_cemented(&mut self, account: &Account, height: u64) {
        if let Some(found_info) = self.accounts_confirmed.get(account) {
            if found_info.confirmed_height == height {
                self.accounts_confirmed.remove(account);
            }
        }
    }

    pub fn notify_block_already_cemented(&self, callback: &mut dyn FnMut(BlockHash)) {
        if self.original_already_cemented {
            callback(self.original_hash);
        }
    }

    pub fn accounts_confirmed_len(&self) -> Arc<AtomicUsize> {
        self.accounts_confirmed.len_handle()
    }

    fn step<T: LedgerDataRequester>(&mut self, data_requester: &mut T) {
        let mut receive_details = None;
        let hash_to_process = self.get_next_block(&mut receive_details);
        let top_level = hash_to_process.top;

        let Some(block) = self.load_block(&top_level, data_requester) else {
            if data_requester.was_pruned(&top_level) {
                self.next_in_receive_chain = None;
                self.receive_source_pairs.pop_back();
                self.first_iter = false;
                self.finished =
                    self.receive_source_pairs.is_empty() && top_level == self.original_hash;
                return;
            }
            ledger_mismatch(&top_level);
        };

        let account = block.account();
        let mut block_height = block.height();
        let confirmation_height = match self.accounts_confirmed.get(&account) {
            Some(info) => ConfirmationHeightInfo::new(info.confirmed_height, info.iterated_frontier),
            None => {
                let info = data_requester
                    .get_confirmation_height(&account)
                    .unwrap_or_default();
                // The block was handed to the processor but was cemented before
                if self.first_iter && info.height >= block_height && top_level == self.original_hash
                {
                    self.original_already_cemented = true;
                }
                info
            }
        };

        let already_cemented = confirmation_height.height >= block_height;
        let mut current = top_level;
        if !already_cemented && block_height - confirmation_height.height > 1 {
            if block_height - confirmation_height.height == 2 {
                // Only one uncemented block in between, which is the previous one
                current = block.previous();
                block_height -= 1;
            } else if let Some(next) = self.next_in_receive_chain.as_ref().and_then(|n| n.next) {
                // The successor of the last receive is known already, no need to read the ledger
                current = next;
                block_height = hash_to_process.next_height;
            } else {
                (current, block_height) = self.get_least_unconfirmed_hash_from_top_level(
                    &account,
                    &confirmation_height,
                    data_requester,
                );
            }
        }

        let mut chain = IteratedChain {
            account,
            confirmed_height: confirmation_height.height,
            already_cemented,
            bottom_hash: current,
            bottom_height: block_height,
            top_most_non_receive: current,
            top_most_non_receive_height: block_height,
        };

        let hit_receive = if already_cemented {
            false
        } else {
            self.iterate(&mut chain, top_level, data_requester)
        };

        if self.stopped.load(Ordering::SeqCst) {
            // Unresolved sections are found again by the next walk
            self.finished = true;
            return;
        }

        // next_in_receive_chain gets modified when preparing the sections, so remember it here
        let is_set = self.next_in_receive_chain.take().is_some();

        // Also handle the case where a receive was hit but the blocks below it can be cemented already
        if !hit_receive
            || (self.receive_source_pairs.len() == 1 && chain.top_most_non_receive != current)
        {
            self.prepare_iterated_blocks_for_cementing(&chain, receive_details);

            // If the top level was used, the pair was not
            if !is_set {
                self.receive_source_pairs.pop_back();
            }
        }

        self.first_iter = false;
        data_requester.refresh_transaction();
        self.finished = self.receive_source_pairs.is_empty() && current == self.original_hash;
    }

    /// The next block to process. The priority is:
    /// 1. The next block in the account chain of the last processed receive
    /// 2. The source of the latest receive that was hit
    /// 3. The last checkpoint
    /// 4. The original block. Either all checkpoints were used up
    ///    or all other blocks were processed
    fn get_next_block(
        &mut self,
        receive_details: &mut Option<ReceiveChainDetails>,
    ) -> TopAndNextHash {
        if let Some(next_in_chain) = &self.next_in_receive_chain {
            next_in_chain.clone()
        } else if let Some(pair) = self.receive_source_pairs.back() {
            *receive_details = Some(pair.receive_details.clone());
            TopAndNextHash {
                top: pair.source_hash,
                next: pair.receive_details.next,
                next_height: pair.receive_details.height + 1,
            }
        } else if let Some(checkpoint) = self.checkpoints.back() {
            TopAndNextHash {
                top: *checkpoint,
                next: None,
                next_height: 0,
            }
        } else {
            TopAndNextHash {
                top: self.original_hash,
                next: None,
                next_height: 0,
            }
        }
    }

    fn get_least_unconfirmed_hash_from_top_level<T: LedgerDataRequester>(
        &self,
        account: &Account,
        confirmation_height: &ConfirmationHeightInfo,
        data_requester: &T,
    ) -> (BlockHash, u64) {
        if confirmation_height.height != 0 {
            let frontier = self.load_existing_block(&confirmation_height.frontier, data_requester);
            (
                frontier.successor().unwrap_or_default(),
                frontier.height() + 1,
            )
        } else {
            // Nothing is cemented yet, so start at the open block
            let Some(info) = data_requester.get_account_info(account) else {
                error!(%account, "Account info missing while cementing");
                panic!("Could not load account info for {}", account);
            };
            (info.open_block, 1)
        }
    }

    /// Walks upwards until either the top level block or a receive is reached.
    /// Returns true if a receive was hit.
    fn iterate<T: LedgerDataRequester>(
        &mut self,
        chain: &mut IteratedChain,
        top_level: BlockHash,
        data_requester: &mut T,
    ) -> bool {
        let mut hash = chain.bottom_hash;
        let mut num_blocks = 0;
        while !self.stopped.load(Ordering::SeqCst) {
            num_blocks += 1;
            let block = self.load_existing_block(&hash, data_requester);

            if self.is_receive(&block, data_requester) {
                // The source has to be cemented first. Everything above this receive
                // up to the next receive can be cemented together with it later.
                self.receive_source_pairs.push_back(ReceiveSourcePair {
                    receive_details: ReceiveChainDetails {
                        account: chain.account,
                        height: block.height(),
                        hash,
                        top_level,
                        next: block.successor().filter(|s| *s != top_level),
                        bottom_height: chain.bottom_height,
                        bottom_most: chain.bottom_hash,
                    },
                    source_hash: block.source_or_link(),
                });

                // Store a checkpoint every max_items so that we can always find our way back
                if self.receive_source_pairs.len() % self.max_items == 0 {
                    self.checkpoints.push_back(top_level);
                }
                return true;
            }

            chain.top_most_non_receive = hash;
            chain.top_most_non_receive_height = block.height();
            if hash == top_level {
                break;
            }

            let Some(successor) = block.successor() else {
                break;
            };
            hash = successor;

            if num_blocks % BATCH_READ_SIZE == 0 {
                data_requester.refresh_transaction();
            }
        }
        false
    }

    fn is_receive<T: LedgerDataRequester>(&self, block: &SavedBlock, data_requester: &T) -> bool {
        let source = block.source_or_link();
        !source.is_zero()
            && !self.epochs.is_epoch_link(&source.into())
            && data_requester.block_exists(&source)
    }

    fn prepare_iterated_blocks_for_cementing(
        &mut self,
        chain: &IteratedChain,
        receive_details: Option<ReceiveChainDetails>,
    ) {
        if !chain.already_cemented && chain.top_most_non_receive_height > chain.confirmed_height {
            self.accounts_confirmed.insert(
                chain.account,
                ConfirmedInfo {
                    confirmed_height: chain.top_most_non_receive_height,
                    iterated_frontier: chain.top_most_non_receive,
                },
            );
            self.remove_checkpoint(&chain.top_most_non_receive);
            self.ready.push_back(BlockChainSection {
                account: chain.account,
                bottom_hash: chain.bottom_hash,
                bottom_height: chain.bottom_height,
                top_hash: chain.top_most_non_receive,
                top_height: chain.top_most_non_receive_height,
            });
        }

        // The receive block and all non-receive blocks below it
        if let Some(receive) = receive_details {
            self.accounts_confirmed.insert(
                receive.account,
                ConfirmedInfo {
                    confirmed_height: receive.height,
                    iterated_frontier: receive.hash,
                },
            );

            match receive.next {
                Some(next) => {
                    self.next_in_receive_chain = Some(TopAndNextHash {
                        top: receive.top_level,
                        next: Some(next),
                        next_height: receive.height + 1,
                    });
                }
                None => self.remove_checkpoint(&receive.hash),
            }

            self.ready.push_back(BlockChainSection {
                account: receive.account,
                bottom_hash: receive.bottom_most,
                bottom_height: receive.bottom_height,
                top_hash: receive.hash,
                top_height: receive.height,
            });
        }
    }

    fn remove_checkpoint(&mut self, hash: &BlockHash) {
        if !self.checkpoints.iter().any(|h| h == hash) {
            return;
        }
        let remaining: Vec<BlockHash> = self
            .checkpoints
            .iter()
            .filter(|h| *h != hash)
            .copied()
            .collect();
        self.checkpoints.clear();
        for checkpoint in remaining {
            self.checkpoints.push_back(checkpoint);
        }
    }

    fn load_block<T: LedgerDataRequester>(
        &self,
        block_hash: &BlockHash,
        data_requester: &T,
    ) -> Option<SavedBlock> {
        if *block_hash == self.original_hash {
            if let Some(original) = &self.original_block {
                return Some(original.clone());
            }
        }
        data_requester.get_block(block_hash)
    }

    fn load_existing_block<T: LedgerDataRequester>(
        &self,
        block_hash: &BlockHash,
        data_requester: &T,
    ) -> SavedBlock {
        match self.load_block(block_hash, data_requester) {
            Some(block) => block,
            None => ledger_mismatch(block_hash),
        }
    }
}

fn ledger_mismatch(block_hash: &BlockHash) -> ! {
    error!(%block_hash, "Ledger mismatch while cementing");
    panic!(
        "Ledger mismatch trying to set confirmation height for block {} (bounded processor)",
        block_hash
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cementation::LedgerDataRequesterStub;
    use lattice_core::{Amount, TestAccountChain};

    #[test]
    #[should_panic(expected = "Ledger mismatch")]
    fn block_not_found() {
        let mut data_requester = LedgerDataRequesterStub::new();
        let mut sut = CementationWalker::builder().build();
        let mut genesis_chain = data_requester.add_genesis_block();
        genesis_chain.add_legacy_send();
        genesis_chain.add_legacy_send();
        sut.initialize(genesis_chain.latest_block().clone());

        sut.next_cementation(&mut data_requester);
    }

    #[test]
    fn stopped() {
        let mut data_requester = LedgerDataRequesterStub::new();
        let stopped = Arc::new(AtomicBool::new(false));
        let mut sut = CementationWalker::builder()
            .stopped(stopped.clone())
            .build();

        let mut genesis_chain = data_requester.add_genesis_block();
        genesis_chain.add_legacy_send();
        data_requester.add_uncemented(&genesis_chain);
        sut.initialize(genesis_chain.latest_block().clone());

        stopped.store(true, Ordering::Relaxed);

        assert_eq!(sut.next_cementation(&mut data_requester), None);
        assert!(sut.is_done());
    }

    #[test]
    fn cement_first_send_from_genesis() {
        let mut data_requester = LedgerDataRequesterStub::new();
        let mut genesis_chain = data_requester.add_genesis_block();
        genesis_chain.add_legacy_send();
        data_requester.add_uncemented(&genesis_chain);

        assert_write_steps(
            &mut data_requester,
            genesis_chain.latest_block().clone(),
            &[genesis_chain.frontier_section()],
        );
        assert_eq!(data_requester.refresh_count(), 1);
    }

    #[test]
    fn cement_two_blocks_in_one_go() {
        let mut data_requester = LedgerDataRequesterStub::new();
        let mut genesis_chain = data_requester.add_genesis_block();
        genesis_chain.add_legacy_send();
        genesis_chain.add_legacy_send();
        let second_send = genesis_chain.block(3).clone();
        data_requester.add_uncemented(&genesis_chain);

        assert_write_steps(
            &mut data_requester,
            second_send,
            &[genesis_chain.section(2, 3)],
        );
    }

    #[test]
    fn cement_three_blocks_in_one_go() {
        let mut data_requester = LedgerDataRequesterStub::new();
        let mut genesis_chain = data_requester.add_genesis_block();
        genesis_chain.add_legacy_send();
        genesis_chain.add_legacy_send();
        genesis_chain.add_legacy_send();
        data_requester.add_uncemented(&genesis_chain);

        assert_write_steps(
            &mut data_requester,
            genesis_chain.latest_block().clone(),
            &[genesis_chain.section(2, 4)],
        );
    }

    #[test]
    fn cement_whole_uncemented_chain() {
        let mut data_requester = LedgerDataRequesterStub::new();
        let mut genesis_chain = TestAccountChain::genesis();
        for _ in 0..4 {
            genesis_chain.add_legacy_send();
        }
        data_requester.add_uncemented(&genesis_chain);

        assert_write_steps(
            &mut data_requester,
            genesis_chain.latest_block().clone(),
            &[genesis_chain.section(1, 5)],
        );
    }

    #[test]
    fn cement_open_block() {
        let mut data_requester = LedgerDataRequesterStub::new();
        let mut dest_chain = TestAccountChain::new();
        let mut genesis_chain = data_requester.add_genesis_block();
        genesis_chain.add_legacy_send_to(dest_chain.account(), Amount::raw(10));
        dest_chain.add_legacy_open_from_account(&genesis_chain);
        data_requester.add_cemented(&genesis_chain);
        data_requester.add_uncemented(&dest_chain);

        assert_write_steps(
            &mut data_requester,
            dest_chain.latest_block().clone(),
            &[dest_chain.frontier_section()],
        );
    }

    #[test]
    fn cement_open_block_and_successor() {
        let mut data_requester = LedgerDataRequesterStub::new();
        let mut dest_chain = TestAccountChain::new();
        let mut genesis_chain = data_requester.add_genesis_block();
        genesis_chain.add_legacy_send_to(dest_chain.account(), Amount::raw(5));
        dest_chain.add_legacy_open_from_account(&genesis_chain);
        dest_chain.add_legacy_send();
        data_requester.add_cemented(&genesis_chain);
        data_requester.add_uncemented(&dest_chain);

        assert_write_steps(
            &mut data_requester,
            dest_chain.latest_block().clone(),
            &[dest_chain.section(1, 1), dest_chain.section(2, 2)],
        );
    }

    #[test]
    fn cement_receive_block() {
        let mut data_requester = LedgerDataRequesterStub::new();
        let mut dest_chain = TestAccountChain::new();
        let mut genesis_chain = data_requester.add_genesis_block();
        genesis_chain.add_legacy_send_to(dest_chain.account(), Amount::raw(1));
        genesis_chain.add_legacy_send_to(dest_chain.account(), Amount::raw(1));
        dest_chain.add_legacy_open_from_account_block(&genesis_chain, 2);
        data_requester.add_cemented(&genesis_chain);
        data_requester.add_cemented(&dest_chain);

        dest_chain.add_legacy_receive_from_account(&genesis_chain);
        data_requester.add_uncemented(&dest_chain);

        assert_write_steps(
            &mut data_requester,
            dest_chain.latest_block().clone(),
            &[dest_chain.frontier_section()],
        );
    }

    #[test]
    fn cement_source_account_before_receiving_account() {
        let mut data_requester = LedgerDataRequesterStub::new();
        let mut genesis_chain = data_requester.add_genesis_block();
        genesis_chain.add_legacy_send();
        data_requester.add_cemented(&genesis_chain);

        let mut dest_chain = TestAccountChain::new();
        genesis_chain.add_legacy_send_to(dest_chain.account(), Amount::raw(10));
        dest_chain.add_legacy_open_from_account(&genesis_chain);
        data_requester.add_uncemented(&genesis_chain);
        data_requester.add_uncemented(&dest_chain);

        assert_write_steps(
            &mut data_requester,
            dest_chain.latest_block().clone(),
            &[genesis_chain.section(3, 3), dest_chain.section(1, 1)],
        );
    }

    #[test]
    fn cement_two_accounts() {
        let mut data_requester = LedgerDataRequesterStub::new();
        let mut genesis_chain = data_requester.add_genesis_block();
        let mut dest_1 = TestAccountChain::new();
        let mut dest_2 = TestAccountChain::new();
        genesis_chain.add_legacy_send_to(dest_1.account(), Amount::raw(5));

        dest_1.add_legacy_open_from_account(&genesis_chain);
        dest_1.add_legacy_send();
        dest_1.add_legacy_send();
        dest_1.add_legacy_send_to(dest_2.account(), Amount::raw(3));

        dest_2.add_legacy_open_from_account(&dest_1);
        dest_2.add_legacy_send();
        dest_2.add_legacy_send();
        dest_2.add_legacy_send();

        data_requester.add_cemented(&genesis_chain);
        data_requester.add_uncemented(&dest_1);
        data_requester.add_uncemented(&dest_2);

        assert_write_steps(
            &mut data_requester,
            dest_2.latest_block().clone(),
            &[
                dest_1.section(1, 1),
                dest_1.section(2, 4),
                dest_2.section(1, 1),
                dest_2.section(2, 4),
            ],
        );
    }

    #[test]
    fn send_to_self() {
        let mut data_requester = LedgerDataRequesterStub::new();
        let mut chain = data_requester.add_genesis_block();
        let account = chain.account();
        chain.add_legacy_send_to(account, Amount::raw(10));
        chain.add_legacy_receive_from_self();
        data_requester.add_uncemented(&chain);

        // The overlapping receive section gets trimmed by the write batcher
        assert_write_steps(
            &mut data_requester,
            chain.latest_block().clone(),
            &[chain.section(2, 2), chain.section(2, 3)],
        );
    }

    #[test]
    fn state_blocks() {
        let mut data_requester = LedgerDataRequesterStub::new();
        let mut genesis_chain = data_requester.add_genesis_block();
        let mut dest_chain = TestAccountChain::new();
        genesis_chain.add_state_send_to(dest_chain.account(), Amount::raw(10));
        dest_chain.add_state_receive_from(&genesis_chain, 2);
        dest_chain.add_state();
        data_requester.add_uncemented(&genesis_chain);
        data_requester.add_uncemented(&dest_chain);

        assert_write_steps(
            &mut data_requester,
            dest_chain.latest_block().clone(),
            &[
                genesis_chain.section(2, 2),
                dest_chain.section(1, 1),
                dest_chain.section(2, 2),
            ],
        );
    }

    #[test]
    fn block_already_cemented() {
        let mut sut = CementationWalker::builder().build();
        let mut data_requester = LedgerDataRequesterStub::new();
        let genesis_chain = data_requester.add_genesis_block();

        sut.initialize(genesis_chain.latest_block().clone());
        let step = sut.next_cementation(&mut data_requester);
        assert_eq!(step, None);

        let mut notified = Vec::new();
        sut.notify_block_already_cemented(&mut |hash| notified.push(hash));
        assert_eq!(notified, vec![genesis_chain.frontier()]);
    }

    #[test]
    fn cached_height_is_not_reported_as_already_cemented() {
        let mut sut = CementationWalker::builder().build();
        let mut data_requester = LedgerDataRequesterStub::new();
        let mut genesis_chain = data_requester.add_genesis_block();
        genesis_chain.add_legacy_send();
        data_requester.add_uncemented(&genesis_chain);

        sut.initialize(genesis_chain.latest_block().clone());
        assert!(sut.next_cementation(&mut data_requester).is_some());
        assert_eq!(sut.next_cementation(&mut data_requester), None);

        // Not written yet, so the cache knows the height but the ledger does not
        sut.initialize(genesis_chain.latest_block().clone());
        assert_eq!(sut.next_cementation(&mut data_requester), None);
        let mut notified = Vec::new();
        sut.notify_block_already_cemented(&mut |hash| notified.push(hash));
        assert!(notified.is_empty());
    }

    #[test]
    fn section_cemented_clears_cache_entry() {
        let mut sut = CementationWalker::builder().build();
        let mut data_requester = LedgerDataRequesterStub::new();
        let mut genesis_chain = data_requester.add_genesis_block();
        genesis_chain.add_legacy_send();
        genesis_chain.add_legacy_send();
        data_requester.add_uncemented(&genesis_chain);

        sut.initialize(genesis_chain.latest_block().clone());
        sut.next_cementation(&mut data_requester);
        let len = sut.accounts_confirmed_len();
        assert_eq!(len.load(Ordering::Relaxed), 1);

        sut.section_cemented(&genesis_chain.account(), 2);
        assert_eq!(len.load(Ordering::Relaxed), 1);
        sut.section_cemented(&genesis_chain.account(), 3);
        assert_eq!(len.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn use_checkpoints() {
        let mut data_requester = LedgerDataRequesterStub::new();
        let mut account1 = TestAccountChain::new();
        let mut account2 = TestAccountChain::new();
        let mut account3 = TestAccountChain::new();
        let mut genesis_chain = data_requester.add_genesis_block();
        genesis_chain.add_legacy_send_to(account1.account(), Amount::raw(5));

        account1.add_legacy_open_from_account(&genesis_chain);
        account1.add_legacy_send_to(account2.account(), Amount::raw(4));

        account2.add_legacy_open_from_account(&account1);
        account2.add_legacy_send_to(account3.account(), Amount::raw(3));

        account3.add_legacy_open_from_account(&account2);
        account3.add_legacy_send();

        data_requester.add_cemented(&genesis_chain);
        data_requester.add_uncemented(&account1);
        data_requester.add_uncemented(&account2);
        data_requester.add_uncemented(&account3);

        let expected = [
            account1.section(1, 1),
            account1.section(2, 2),
            account2.section(1, 1),
            account2.section(2, 2),
            account3.section(1, 1),
            account3.section(2, 2),
        ];

        // Receive/source pairs get evicted and are found again via the checkpoints
        assert_write_steps_with_max_items(
            2,
            &mut data_requester,
            account3.latest_block().clone(),
            &expected,
        );
        assert_write_steps(
            &mut data_requester,
            account3.latest_block().clone(),
            &expected,
        );
    }

    mod pruning {
        use super::*;

        #[test]
        fn send_block_pruned() {
            let mut data_requester = LedgerDataRequesterStub::new();
            let mut dest_chain = TestAccountChain::new();
            let mut genesis_chain = data_requester.add_genesis_block();
            genesis_chain.add_legacy_send_to(dest_chain.account(), Amount::raw(1));
            dest_chain.add_legacy_open_from_account(&genesis_chain);
            data_requester.add_cemented(&genesis_chain);
            data_requester.add_uncemented(&dest_chain);
            data_requester.prune(genesis_chain.frontier());

            assert_write_steps(
                &mut data_requester,
                dest_chain.latest_block().clone(),
                &[dest_chain.frontier_section()],
            );
        }
    }

    fn assert_write_steps(
        data_requester: &mut LedgerDataRequesterStub,
        block_to_cement: SavedBlock,
        expected: &[BlockChainSection],
    ) {
        assert_write_steps_with_max_items(MAX_ITEMS, data_requester, block_to_cement, expected)
    }

    fn assert_write_steps_with_max_items(
        max_items: usize,
        data_requester: &mut LedgerDataRequesterStub,
        block_to_cement: SavedBlock,
        expected: &[BlockChainSection],
    ) {
        let mut sut = CementationWalker::builder().max_items(max_items).build();
        sut.initialize(block_to_cement);

        let mut actual = Vec::new();
        while let Some(section) = sut.next_cementation(data_requester) {
            actual.push(section);
        }

        for (i, (act, exp)) in actual.iter().zip(expected).enumerate() {
            assert_eq!(act, exp, "Unexpected section at index {}", i);
        }

        if actual.len() < expected.len() {
            panic!(
                "actual has too few elements. These are missing: {:?}",
                &expected[actual.len()..]
            );
        }

        if actual.len() > expected.len() {
            panic!(
                "actual has too many elements. These are too many: {:?}",
                &actual[expected.len()..]
            );
        }

        assert!(sut.is_done());
        assert_eq!(sut.checkpoints.len(), 0);
    }
}
