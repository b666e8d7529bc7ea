use lattice_core::{Account, BlockHash};
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

/// Cemented height of an account as far as the walk is concerned.
/// The ledger might still be behind until the pending writes are flushed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ConfirmedInfo {
    pub confirmed_height: u64,
    pub iterated_frontier: BlockHash,
}

/// Accounts which were iterated but whose confirmation height is not written yet
pub(crate) struct AccountsConfirmedMap {
    accounts: HashMap<Account, ConfirmedInfo>,
    len: Arc<AtomicUsize>,
}

impl AccountsConfirmedMap {
    pub fn new() -> Self {
        Self {
            accounts: HashMap::new(),
            len: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn get(&self, account: &Account) -> Option<&ConfirmedInfo> {
        self.accounts.get(account)
    }

    pub fn insert(&mut self, account: Account, info: ConfirmedInfo) {
        self.accounts.insert(account, info);
        self.len.store(self.accounts.len(), Ordering::Relaxed);
    }

    pub fn remove(&mut self, account: &Account) {
        self.accounts.remove(account);
        self.len.store(self.accounts.len(), Ordering::Relaxed);
    }

    pub fn clear(&mut self) {
        self.accounts.clear();
        self.len.store(0, Ordering::Relaxed);
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    /// A handle that reports the size from other threads
    pub fn len_handle(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.len)
    }

    pub const ELEMENT_SIZE: usize =
        std::mem::size_of::<Account>() + std::mem::size_of::<ConfirmedInfo>();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn len_handle_follows_changes() {
        let mut map = AccountsConfirmedMap::new();
        let handle = map.len_handle();
        let info = ConfirmedInfo {
            confirmed_height: 3,
            iterated_frontier: BlockHash::from(7u64),
        };
        map.insert(Account::from(1u64), info.clone());
        map.insert(Account::from(2u64), info.clone());
        map.insert(Account::from(2u64), info.clone());
        assert_eq!(handle.load(Ordering::Relaxed), 2);
        assert_eq!(map.get(&Account::from(1u64)), Some(&info));

        map.remove(&Account::from(1u64));
        assert_eq!(handle.load(Ordering::Relaxed), 1);

        map.clear();
        assert_eq!(handle.load(Ordering::Relaxed), 0);
        assert_eq!(map.len(), 0);
    }
}
