use crate::store::{LedgerCache, StoreTables};
use lattice_core::{Account, AccountInfo, BlockHash, ConfirmationHeightInfo, SavedBlock};
use std::{
    collections::{HashMap, HashSet},
    sync::{atomic::Ordering, Arc},
    time::{Duration, Instant},
};

pub trait Transaction {
    /// Writes made in this transaction that are not committed yet
    fn pending_writes(&self) -> Option<&PendingWrites> {
        None
    }

    /// Releases and reacquires the transaction so it observes the latest committed state
    fn refresh(&mut self);

    fn refresh_if_needed(&mut self, max_age: Duration) {
        if self.elapsed() > max_age {
            self.refresh();
        }
    }

    fn elapsed(&self) -> Duration;
}

pub struct ReadTransaction {
    start: Instant,
    refresh_count: u64,
}

impl ReadTransaction {
    pub(crate) fn new() -> Self {
        Self {
            start: Instant::now(),
            refresh_count: 0,
        }
    }

    pub fn refresh_count(&self) -> u64 {
        self.refresh_count
    }
}

impl Transaction for ReadTransaction {
    fn refresh(&mut self) {
        self.start = Instant::now();
        self.refresh_count += 1;
    }

    fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

#[derive(Default)]
pub struct PendingWrites {
    pub(crate) blocks: HashMap<BlockHash, SavedBlock>,
    pub(crate) deleted_blocks: HashSet<BlockHash>,
    pub(crate) accounts: HashMap<Account, AccountInfo>,
    pub(crate) confirmation_heights: HashMap<Account, ConfirmationHeightInfo>,
    pub(crate) pruned: HashSet<BlockHash>,
    /// Counter deltas, published to the `LedgerCache` on commit
    pub(crate) blocks_added: u64,
    pub(crate) accounts_added: u64,
    pub(crate) pruned_added: u64,
    pub(crate) cemented_added: u64,
}

impl PendingWrites {
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
            && self.deleted_blocks.is_empty()
            && self.accounts.is_empty()
            && self.confirmation_heights.is_empty()
            && self.pruned.is_empty()
            && self.blocks_added == 0
            && self.accounts_added == 0
            && self.pruned_added == 0
            && self.cemented_added == 0
    }
}

/// Buffers all writes until `commit`. Reads through this transaction
/// observe its own uncommitted writes. Dropping it commits.
pub struct WriteTransaction {
    tables: Arc<StoreTables>,
    cache: Arc<LedgerCache>,
    pending: PendingWrites,
    start: Instant,
    commit_count: u64,
}

impl WriteTransaction {
    pub(crate) fn new(tables: Arc<StoreTables>, cache: Arc<LedgerCache>) -> Self {
        Self {
            tables,
            cache,
            pending: PendingWrites::default(),
            start: Instant::now(),
            commit_count: 0,
        }
    }

    pub(crate) fn pending_mut(&mut self) -> &mut PendingWrites {
        &mut self.pending
    }

    pub fn commit(&mut self) {
        let pending = std::mem::take(&mut self.pending);
        if !pending.is_empty() {
            let counters = [
                (&self.cache.block_count, pending.blocks_added),
                (&self.cache.account_count, pending.accounts_added),
                (&self.cache.pruned_count, pending.pruned_added),
                (&self.cache.cemented_count, pending.cemented_added),
            ];
            self.tables.apply(pending);
            // Counters follow the tables so readers never see them ahead of storage
            for (counter, added) in counters {
                counter.fetch_add(added, Ordering::SeqCst);
            }
        }
        self.commit_count += 1;
    }

    pub fn renew(&mut self) {
        self.start = Instant::now();
    }

    /// Number of times `commit` was called. Used by tests to observe batching
    pub fn commit_count(&self) -> u64 {
        self.commit_count
    }
}

impl Transaction for WriteTransaction {
    fn pending_writes(&self) -> Option<&PendingWrites> {
        Some(&self.pending)
    }

    fn refresh(&mut self) {
        self.commit();
        self.renew();
    }

    fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for WriteTransaction {
    fn drop(&mut self) {
        if !self.pending.is_empty() {
            self.commit();
        }
    }
}
