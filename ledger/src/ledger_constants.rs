use lattice_core::{Account, Amount, BlockHash, Epochs, SavedBlock, TestAccountChain};
use once_cell::sync::Lazy;

pub static LEDGER_CONSTANTS_STUB: Lazy<LedgerConstants> = Lazy::new(LedgerConstants::unit_test);

pub static DEV_GENESIS_HASH: Lazy<BlockHash> = Lazy::new(|| LEDGER_CONSTANTS_STUB.genesis.hash());

#[derive(Clone)]
pub struct LedgerConstants {
    pub genesis: SavedBlock,
    pub genesis_account: Account,
    pub genesis_amount: Amount,
    pub burn_account: Account,
    pub epochs: Epochs,
}

impl LedgerConstants {
    pub fn new(genesis: SavedBlock) -> Self {
        let genesis_account = genesis.account();
        Self {
            genesis,
            genesis_account,
            genesis_amount: Amount::MAX,
            burn_account: Account::zero(),
            epochs: Epochs::with_default_links(genesis_account),
        }
    }

    /// Dev network constants: the genesis open block of the dev genesis account
    pub fn dev() -> Self {
        let genesis = TestAccountChain::genesis().take_blocks().remove(0);
        Self::new(genesis)
    }

    pub fn unit_test() -> Self {
        Self::dev()
    }
}
