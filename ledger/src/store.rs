use crate::transaction::{PendingWrites, ReadTransaction, Transaction, WriteTransaction};
use lattice_core::{Account, AccountInfo, BlockHash, ConfirmationHeightInfo, SavedBlock};
use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, RwLock,
    },
};

/// Counters that are kept in memory to avoid expensive table scans
#[derive(Default)]
pub struct LedgerCache {
    pub cemented_count: AtomicU64,
    pub block_count: AtomicU64,
    pub account_count: AtomicU64,
    pub pruned_count: AtomicU64,
}

impl LedgerCache {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn cemented_count(&self) -> u64 {
        self.cemented_count.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
pub(crate) struct StoreTables {
    blocks: RwLock<HashMap<BlockHash, SavedBlock>>,
    accounts: RwLock<HashMap<Account, AccountInfo>>,
    confirmation_heights: RwLock<HashMap<Account, ConfirmationHeightInfo>>,
    pruned: RwLock<HashSet<BlockHash>>,
}

impl StoreTables {
    pub(crate) fn apply(&self, pending: PendingWrites) {
        {
            let mut blocks = self.blocks.write().unwrap();
            for hash in &pending.deleted_blocks {
                blocks.remove(hash);
            }
            blocks.extend(pending.blocks);
        }
        self.accounts.write().unwrap().extend(pending.accounts);
        self.confirmation_heights
            .write()
            .unwrap()
            .extend(pending.confirmation_heights);
        self.pruned.write().unwrap().extend(pending.pruned);
    }
}

/// In-memory ledger storage. Reads go through a transaction so that
/// a write transaction observes its own uncommitted writes.
pub struct LedgerStore {
    pub cache: Arc<LedgerCache>,
    tables: Arc<StoreTables>,
    pub block: BlockStore,
    pub account: AccountStore,
    pub confirmation_height: ConfirmationHeightStore,
    pub pruned: PrunedStore,
}

impl LedgerStore {
    pub fn new() -> Self {
        let tables = Arc::new(StoreTables::default());
        Self {
            cache: Arc::new(LedgerCache::new()),
            block: BlockStore(tables.clone()),
            account: AccountStore(tables.clone()),
            confirmation_height: ConfirmationHeightStore(tables.clone()),
            pruned: PrunedStore(tables.clone()),
            tables,
        }
    }

    pub fn tx_begin_read(&self) -> ReadTransaction {
        ReadTransaction::new()
    }

    pub fn tx_begin_write(&self) -> WriteTransaction {
        WriteTransaction::new(self.tables.clone(), self.cache.clone())
    }
}

impl Default for LedgerStore {
    fn default() -> Self {
        Self::new()
    }
}

pub struct BlockStore(Arc<StoreTables>);

impl BlockStore {
    pub fn get(&self, txn: &dyn Transaction, hash: &BlockHash) -> Option<SavedBlock> {
        if let Some(pending) = txn.pending_writes() {
            if pending.deleted_blocks.contains(hash) {
                return None;
            }
            if let Some(block) = pending.blocks.get(hash) {
                return Some(block.clone());
            }
        }
        self.0.blocks.read().unwrap().get(hash).cloned()
    }

    pub fn exists(&self, txn: &dyn Transaction, hash: &BlockHash) -> bool {
        if let Some(pending) = txn.pending_writes() {
            if pending.deleted_blocks.contains(hash) {
                return false;
            }
            if pending.blocks.contains_key(hash) {
                return true;
            }
        }
        self.0.blocks.read().unwrap().contains_key(hash)
    }

    pub fn put(&self, txn: &mut WriteTransaction, block: &SavedBlock) {
        let pending = txn.pending_mut();
        pending.deleted_blocks.remove(&block.hash());
        pending.blocks.insert(block.hash(), block.clone());
    }

    pub fn del(&self, txn: &mut WriteTransaction, hash: &BlockHash) {
        let pending = txn.pending_mut();
        pending.blocks.remove(hash);
        pending.deleted_blocks.insert(*hash);
    }

    pub fn count(&self) -> u64 {
        self.0.blocks.read().unwrap().len() as u64
    }
}

pub struct AccountStore(Arc<StoreTables>);

impl AccountStore {
    pub fn get(&self, txn: &dyn Transaction, account: &Account) -> Option<AccountInfo> {
        if let Some(info) = txn.pending_writes().and_then(|p| p.accounts.get(account)) {
            return Some(info.clone());
        }
        self.0.accounts.read().unwrap().get(account).cloned()
    }

    pub fn put(&self, txn: &mut WriteTransaction, account: &Account, info: &AccountInfo) {
        txn.pending_mut().accounts.insert(*account, info.clone());
    }

    pub fn count(&self) -> u64 {
        self.0.accounts.read().unwrap().len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.0.accounts.read().unwrap().is_empty()
    }
}

pub struct ConfirmationHeightStore(Arc<StoreTables>);

impl ConfirmationHeightStore {
    pub fn get(&self, txn: &dyn Transaction, account: &Account) -> Option<ConfirmationHeightInfo> {
        if let Some(info) = txn
            .pending_writes()
            .and_then(|p| p.confirmation_heights.get(account))
        {
            return Some(info.clone());
        }
        self.0
            .confirmation_heights
            .read()
            .unwrap()
            .get(account)
            .cloned()
    }

    pub fn put(&self, txn: &mut WriteTransaction, account: &Account, info: &ConfirmationHeightInfo) {
        txn.pending_mut()
            .confirmation_heights
            .insert(*account, info.clone());
    }

    /// Sum of all committed confirmation heights
    pub fn total_height(&self) -> u64 {
        self.0
            .confirmation_heights
            .read()
            .unwrap()
            .values()
            .map(|i| i.height)
            .sum()
    }
}

pub struct PrunedStore(Arc<StoreTables>);

impl PrunedStore {
    pub fn exists(&self, txn: &dyn Transaction, hash: &BlockHash) -> bool {
        if txn
            .pending_writes()
            .map(|p| p.pruned.contains(hash))
            .unwrap_or(false)
        {
            return true;
        }
        self.0.pruned.read().unwrap().contains(hash)
    }

    pub fn put(&self, txn: &mut WriteTransaction, hash: &BlockHash) {
        txn.pending_mut().pruned.insert(*hash);
    }

    pub fn count(&self) -> u64 {
        self.0.pruned.read().unwrap().len() as u64
    }
}
