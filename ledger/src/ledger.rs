use crate::{
    LedgerConstants, LedgerStore, RepWeightCache, ReadTransaction, Transaction, WriteGuard,
    WriteQueue, WriteTransaction,
};
use lattice_core::{
    utils::{seconds_since_epoch, ContainerInfo},
    Account, AccountInfo, Amount, BlockChainSection, BlockHash, ConfirmationHeightInfo, Link,
    PublicKey, SavedBlock,
};
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use tracing::debug;

pub struct Ledger {
    pub store: Arc<LedgerStore>,
    pub rep_weights: Arc<RepWeightCache>,
    pub constants: LedgerConstants,
    pruning: AtomicBool,
    pub write_queue: Arc<WriteQueue>,
}

pub struct NullLedgerBuilder {
    blocks: Vec<SavedBlock>,
    confirmation_heights: Vec<(Account, ConfirmationHeightInfo)>,
    pruned: Vec<BlockHash>,
    rep_weights: Vec<(PublicKey, Amount)>,
    bootstrap_weights: Option<(HashMap<PublicKey, Amount>, u64)>,
    pruning: bool,
}

impl NullLedgerBuilder {
    fn new() -> Self {
        Self {
            blocks: Vec::new(),
            confirmation_heights: Vec::new(),
            pruned: Vec::new(),
            rep_weights: Vec::new(),
            bootstrap_weights: None,
            pruning: false,
        }
    }

    pub fn block(mut self, block: &SavedBlock) -> Self {
        self.blocks.push(block.clone());
        self
    }

    pub fn blocks<'a>(mut self, blocks: impl IntoIterator<Item = &'a SavedBlock>) -> Self {
        self.blocks.extend(blocks.into_iter().cloned());
        self
    }

    pub fn confirmation_height(mut self, account: &Account, info: &ConfirmationHeightInfo) -> Self {
        self.confirmation_heights.push((*account, info.clone()));
        self
    }

    pub fn pruned(mut self, hash: &BlockHash) -> Self {
        self.pruned.push(*hash);
        self.pruning = true;
        self
    }

    pub fn rep_weight(mut self, rep: impl Into<PublicKey>, weight: Amount) -> Self {
        self.rep_weights.push((rep.into(), weight));
        self
    }

    pub fn bootstrap_weights(
        mut self,
        weights: HashMap<PublicKey, Amount>,
        bootstrap_weight_max_blocks: u64,
    ) -> Self {
        self.bootstrap_weights = Some((weights, bootstrap_weight_max_blocks));
        self
    }

    pub fn finish(self) -> Ledger {
        let store = Arc::new(LedgerStore::new());
        {
            let mut txn = store.tx_begin_write();
            let mut accounts: HashMap<Account, AccountInfo> = HashMap::new();
            for block in &self.blocks {
                store.block.put(&mut txn, block);
                let info = accounts.entry(block.account()).or_default();
                if block.height() > info.block_count {
                    *info = AccountInfo {
                        head: block.hash(),
                        representative: block
                            .representative_field()
                            .unwrap_or(info.representative),
                        open_block: if block.height() == 1 {
                            block.hash()
                        } else {
                            info.open_block
                        },
                        balance: block.balance(),
                        modified: seconds_since_epoch(),
                        block_count: block.height(),
                        epoch: block.epoch(),
                    };
                }
            }
            for (account, info) in &accounts {
                store.account.put(&mut txn, account, info);
            }
            for (account, info) in &self.confirmation_heights {
                store.confirmation_height.put(&mut txn, account, info);
            }
            for hash in &self.pruned {
                store.pruned.put(&mut txn, hash);
            }
            txn.commit();
        }

        let rep_weights = match self.bootstrap_weights {
            Some((weights, max_blocks)) => {
                RepWeightCache::with_bootstrap_weights(weights, max_blocks, store.cache.clone())
            }
            None => RepWeightCache::new(),
        };
        for (rep, weight) in self.rep_weights {
            rep_weights.set(rep, weight);
        }

        let ledger = Ledger::new(store, LedgerConstants::unit_test(), Arc::new(rep_weights))
            .expect("null ledger should initialize");
        if self.pruning {
            ledger.enable_pruning();
        }
        ledger
    }
}

impl Ledger {
    pub fn new_null() -> Self {
        Self::new(
            Arc::new(LedgerStore::new()),
            LedgerConstants::unit_test(),
            Arc::new(RepWeightCache::new()),
        )
        .expect("empty ledger should initialize")
    }

    pub fn new_null_builder() -> NullLedgerBuilder {
        NullLedgerBuilder::new()
    }

    pub fn new(
        store: Arc<LedgerStore>,
        constants: LedgerConstants,
        rep_weights: Arc<RepWeightCache>,
    ) -> anyhow::Result<Self> {
        let ledger = Self {
            store,
            rep_weights,
            constants,
            pruning: AtomicBool::new(false),
            write_queue: Arc::new(WriteQueue::new(false)),
        };
        ledger.initialize()?;
        Ok(ledger)
    }

    fn initialize(&self) -> anyhow::Result<()> {
        if self.store.block.count() == 0 {
            self.add_genesis_block(&mut self.rw_txn())?;
        }

        let cache = &self.store.cache;
        cache
            .block_count
            .store(self.store.block.count(), Ordering::SeqCst);
        cache
            .account_count
            .store(self.store.account.count(), Ordering::SeqCst);
        cache.cemented_count.store(
            self.store.confirmation_height.total_height(),
            Ordering::SeqCst,
        );
        cache
            .pruned_count
            .store(self.store.pruned.count(), Ordering::SeqCst);
        Ok(())
    }

    fn add_genesis_block(&self, txn: &mut WriteTransaction) -> anyhow::Result<()> {
        let genesis = &self.constants.genesis;
        let genesis_hash = genesis.hash();
        let genesis_account = self.constants.genesis_account;
        self.store.block.put(txn, genesis);
        self.store.confirmation_height.put(
            txn,
            &genesis_account,
            &ConfirmationHeightInfo::new(1, genesis_hash),
        );
        self.store.account.put(
            txn,
            &genesis_account,
            &AccountInfo {
                head: genesis_hash,
                representative: genesis_account.into(),
                open_block: genesis_hash,
                balance: self.constants.genesis_amount,
                modified: seconds_since_epoch(),
                block_count: 1,
                epoch: genesis.epoch(),
            },
        );
        txn.commit();
        self.rep_weights
            .set(genesis_account.into(), self.constants.genesis_amount);
        Ok(())
    }

    pub fn read_txn(&self) -> ReadTransaction {
        self.store.tx_begin_read()
    }

    pub fn rw_txn(&self) -> WriteTransaction {
        self.store.tx_begin_write()
    }

    /// Commits and renews the transaction if it is open for too long.
    /// Other writers get the chance to write in between.
    pub fn refresh_if_needed(
        &self,
        write_guard: WriteGuard,
        mut tx: WriteTransaction,
    ) -> (WriteGuard, WriteTransaction) {
        if tx.elapsed() > Duration::from_millis(500) {
            let writer = write_guard.writer;
            tx.commit();
            drop(write_guard);

            let write_guard = self.write_queue.wait(writer);
            tx.renew();
            (write_guard, tx)
        } else {
            (write_guard, tx)
        }
    }

    pub fn pruning_enabled(&self) -> bool {
        self.pruning.load(Ordering::SeqCst)
    }

    pub fn enable_pruning(&self) {
        self.pruning.store(true, Ordering::SeqCst);
    }

    pub fn bootstrap_weight_max_blocks(&self) -> u64 {
        self.rep_weights.bootstrap_weight_max_blocks()
    }

    /// True once enough blocks are cemented that the node is considered caught up
    pub fn cemented_bootstrap_count_reached(&self) -> bool {
        self.cemented_count() >= self.bootstrap_weight_max_blocks()
    }

    pub fn weight(&self, rep: &PublicKey) -> Amount {
        self.rep_weights.weight(rep)
    }

    pub fn is_epoch_link(&self, link: &Link) -> bool {
        self.constants.epochs.is_epoch_link(link)
    }

    pub fn get_block(&self, txn: &dyn Transaction, hash: &BlockHash) -> Option<SavedBlock> {
        self.store.block.get(txn, hash)
    }

    pub fn block_exists(&self, txn: &dyn Transaction, hash: &BlockHash) -> bool {
        self.store.block.exists(txn, hash)
    }

    pub fn block_exists_or_pruned(&self, txn: &dyn Transaction, hash: &BlockHash) -> bool {
        self.store.pruned.exists(txn, hash) || self.store.block.exists(txn, hash)
    }

    pub fn pruned_exists(&self, txn: &dyn Transaction, hash: &BlockHash) -> bool {
        self.store.pruned.exists(txn, hash)
    }

    /// A block is confirmed if its height is at or below the confirmation height of its account
    pub fn block_confirmed(&self, txn: &dyn Transaction, hash: &BlockHash) -> bool {
        if self.store.pruned.exists(txn, hash) {
            return true;
        }
        match self.store.block.get(txn, hash) {
            Some(block) => {
                let conf_height = self
                    .get_confirmation_height(txn, &block.account())
                    .unwrap_or_default();
                conf_height.height >= block.height()
            }
            None => false,
        }
    }

    /// The amount sent or received by the block. `None` if the previous block is unknown.
    pub fn block_amount(&self, txn: &dyn Transaction, block: &SavedBlock) -> Option<Amount> {
        let previous_balance = if block.previous().is_zero() {
            Amount::zero()
        } else {
            self.store.block.get(txn, &block.previous())?.balance()
        };
        let balance = block.balance();
        Some(if balance > previous_balance {
            balance - previous_balance
        } else {
            previous_balance - balance
        })
    }

    pub fn account_info(&self, txn: &dyn Transaction, account: &Account) -> Option<AccountInfo> {
        self.store.account.get(txn, account)
    }

    pub fn get_confirmation_height(
        &self,
        txn: &dyn Transaction,
        account: &Account,
    ) -> Option<ConfirmationHeightInfo> {
        self.store.confirmation_height.get(txn, account)
    }

    /// Moves the cemented frontier of the section's account up to the section's top block.
    /// The section must start exactly one block above the current confirmation height.
    pub fn write_confirmation_height(&self, txn: &mut WriteTransaction, section: &BlockChainSection) {
        debug_assert_eq!(
            self.get_confirmation_height(txn, &section.account)
                .unwrap_or_default()
                .height
                + 1,
            section.bottom_height
        );
        self.store.confirmation_height.put(
            txn,
            &section.account,
            &ConfirmationHeightInfo::new(section.top_height, section.top_hash),
        );
        txn.pending_mut().cemented_added += section.block_count();
    }

    /// Appends an already validated block to its account chain
    pub fn insert_block(&self, txn: &mut WriteTransaction, block: &SavedBlock) -> anyhow::Result<()> {
        let hash = block.hash();
        if self.store.block.exists(txn, &hash) {
            bail!("block {} already exists", hash);
        }

        let account = block.account();
        let previous = block.previous();
        let mut info = match self.store.account.get(txn, &account) {
            Some(info) => {
                if info.head != previous {
                    bail!("block {} does not extend the frontier of {}", hash, account);
                }
                info
            }
            None => {
                if !previous.is_zero() {
                    bail!("gap previous for block {}", hash);
                }
                txn.pending_mut().accounts_added += 1;
                AccountInfo {
                    open_block: hash,
                    ..Default::default()
                }
            }
        };

        if !previous.is_zero() {
            if let Some(mut previous_block) = self.store.block.get(txn, &previous) {
                previous_block.set_successor(hash);
                self.store.block.put(txn, &previous_block);
            }
        }

        self.store.block.put(txn, block);
        info.head = hash;
        info.block_count = block.height();
        info.balance = block.balance();
        info.epoch = block.epoch();
        info.modified = seconds_since_epoch();
        if let Some(rep) = block.representative_field() {
            info.representative = rep;
        }
        self.store.account.put(txn, &account, &info);
        txn.pending_mut().blocks_added += 1;
        Ok(())
    }

    /// Removes the block body but remembers its hash
    pub fn prune(&self, txn: &mut WriteTransaction, hash: &BlockHash) {
        debug!("Pruning block {}", hash);
        self.store.block.del(txn, hash);
        self.store.pruned.put(txn, hash);
        txn.pending_mut().pruned_added += 1;
    }

    pub fn cemented_count(&self) -> u64 {
        self.store.cache.cemented_count.load(Ordering::SeqCst)
    }

    pub fn block_count(&self) -> u64 {
        self.store.cache.block_count.load(Ordering::SeqCst)
    }

    pub fn account_count(&self) -> u64 {
        self.store.cache.account_count.load(Ordering::SeqCst)
    }

    pub fn pruned_count(&self) -> u64 {
        self.store.cache.pruned_count.load(Ordering::SeqCst)
    }

    pub fn container_info(&self) -> ContainerInfo {
        ContainerInfo::builder()
            .node("rep_weights", self.rep_weights.container_info())
            .finish()
    }
}
