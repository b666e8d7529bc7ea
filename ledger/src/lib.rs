#[macro_use]
extern crate anyhow;

#[macro_use]
extern crate num_derive;

mod ledger;
mod ledger_constants;
mod rep_weight_cache;
mod store;
mod transaction;
mod write_queue;

pub use ledger::{Ledger, NullLedgerBuilder};
pub use ledger_constants::{LedgerConstants, DEV_GENESIS_HASH, LEDGER_CONSTANTS_STUB};
pub use rep_weight_cache::RepWeightCache;
pub use store::{
    AccountStore, BlockStore, ConfirmationHeightStore, LedgerCache, LedgerStore, PrunedStore,
};
pub use transaction::{PendingWrites, ReadTransaction, Transaction, WriteTransaction};
pub use write_queue::{WriteGuard, WriteQueue, Writer};
