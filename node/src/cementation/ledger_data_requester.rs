use lattice_core::{Account, AccountInfo, BlockHash, ConfirmationHeightInfo, SavedBlock};
use lattice_ledger::{Ledger, Transaction};

/// The ledger reads the cementation needs. Makes the walk testable without a store.
pub(crate) trait LedgerDataRequester {
    fn get_block(&self, block_hash: &BlockHash) -> Option<SavedBlock>;
    fn block_exists(&self, block_hash: &BlockHash) -> bool;
    fn get_confirmation_height(&self, account: &Account) -> Option<ConfirmationHeightInfo>;
    fn get_account_info(&self, account: &Account) -> Option<AccountInfo>;
    fn was_pruned(&self, block_hash: &BlockHash) -> bool;
    /// Called while walking long chains so that no snapshot is held open for too long
    fn refresh_transaction(&mut self);
}

pub(crate) struct LedgerAdapter<'a> {
    txn: &'a mut dyn Transaction,
    ledger: &'a Ledger,
}

impl<'a> LedgerAdapter<'a> {
    pub fn new(txn: &'a mut dyn Transaction, ledger: &'a Ledger) -> Self {
        Self { txn, ledger }
    }
}

impl<'a> LedgerDataRequester for LedgerAdapter<'a> {
    fn get_block(&self, block_hash: &BlockHash) -> Option<SavedBlock> {
        self.ledger.get_block(&*self.txn, block_hash)
    }

    fn block_exists(&self, block_hash: &BlockHash) -> bool {
        self.ledger.block_exists(&*self.txn, block_hash)
    }

    fn get_confirmation_height(&self, account: &Account) -> Option<ConfirmationHeightInfo> {
        self.ledger.get_confirmation_height(&*self.txn, account)
    }

    fn get_account_info(&self, account: &Account) -> Option<AccountInfo> {
        self.ledger.account_info(&*self.txn, account)
    }

    fn was_pruned(&self, block_hash: &BlockHash) -> bool {
        self.ledger.pruning_enabled() && self.ledger.pruned_exists(&*self.txn, block_hash)
    }

    fn refresh_transaction(&mut self) {
        self.txn.refresh();
    }
}

#[cfg(test)]
pub(crate) use stub::LedgerDataRequesterStub;


#[cfg(test)]
mod tests {
    use super::*;
    use lattice_core::TestAccountChain;

    #[test]
    fn adapter_reads_through_transaction() {
        let mut chain = TestAccountChain::genesis();
        chain.add_legacy_send();
        let ledger = Ledger::new_null_builder()
            .blocks(chain.blocks())
            .confirmation_height(&chain.account(), &ConfirmationHeightInfo::new(1, chain.open()))
            .finish();
        let mut txn = ledger.read_txn();
        let mut adapter = LedgerAdapter::new(&mut txn, &ledger);

        assert_eq!(adapter.get_block(&chain.frontier()), Some(chain.block(2).clone()));
        assert!(adapter.block_exists(&chain.open()));
        assert_eq!(
            adapter.get_confirmation_height(&chain.account()),
            Some(ConfirmationHeightInfo::new(1, chain.open()))
        );
        assert_eq!(
            adapter.get_account_info(&chain.account()).map(|i| i.open_block),
            Some(chain.open())
        );
        assert!(!adapter.was_pruned(&chain.frontier()));

        adapter.refresh_transaction();
        drop(adapter);
        assert_eq!(txn.refresh_count(), 1);
    }

    #[test]
    fn adapter_reports_pruned_blocks() {
        let mut chain = TestAccountChain::genesis();
        chain.add_legacy_send();
        let ledger = Ledger::new_null_builder()
            .block(chain.block(2))
            .pruned(&chain.open())
            .finish();
        let mut txn = ledger.read_txn();
        let adapter = LedgerAdapter::new(&mut txn, &ledger);

        assert!(adapter.was_pruned(&chain.open()));
        assert_eq!(adapter.get_block(&chain.open()), None);
    }
}
