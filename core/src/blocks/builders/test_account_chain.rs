use crate::{
    epoch_v1_link, epoch_v2_link, Account, AccountInfo, Amount, Block, BlockChainSection,
    BlockDetails, BlockHash, BlockSideband, ChangeBlock, Epoch, Link, OpenBlock, PublicKey, ReceiveBlock, SavedBlock,
    SendBlock, StateBlock, DEV_GENESIS_ACCOUNT,
};

/// Builds a consistent account chain of saved blocks for tests,
/// including sidebands with heights and successors
pub struct TestAccountChain {
    account: Account,
    balance: Amount,
    representative: PublicKey,
    blocks: Vec<SavedBlock>,
    epoch: Epoch,
}

impl TestAccountChain {
    pub fn new() -> Self {
        Self::with_account(Account::random())
    }

    pub fn with_account(account: Account) -> Self {
        Self {
            account,
            balance: Amount::zero(),
            representative: PublicKey::zero(),
            blocks: Vec::new(),
            epoch: Epoch::Epoch0,
        }
    }

    pub fn genesis() -> Self {
        let mut result = Self::with_account(*DEV_GENESIS_ACCOUNT);
        result.balance = Amount::MAX;
        let account = result.account;
        result.add_block(
            Block::LegacyOpen(OpenBlock::new(account.into(), account.into(), account)),
            Epoch::Epoch0,
        );
        result
    }

    pub fn new_opened_chain() -> Self {
        let mut result = Self::new();
        result.add_random_open_block();
        result
    }

    pub fn add_random_open_block(&mut self) -> &SavedBlock {
        assert_eq!(self.height(), 0);
        self.balance = Amount::nano(1);
        let block = OpenBlock::new(BlockHash::from(123u64), PublicKey::from(456u64), self.account);
        self.add_block(Block::LegacyOpen(block), Epoch::Epoch0)
    }

    pub fn height(&self) -> u64 {
        self.blocks.len() as u64
    }

    pub fn open(&self) -> BlockHash {
        self.blocks[0].hash()
    }

    pub fn frontier(&self) -> BlockHash {
        self.blocks.last().map(|b| b.hash()).unwrap_or_default()
    }

    pub fn account(&self) -> Account {
        self.account
    }

    pub fn balance(&self) -> Amount {
        self.balance
    }

    pub fn blocks(&self) -> &[SavedBlock] {
        &self.blocks
    }

    pub fn block(&self, height: u64) -> &SavedBlock {
        &self.blocks[height as usize - 1]
    }

    pub fn try_get_block(&self, height: u64) -> Option<&SavedBlock> {
        if height == 0 {
            return None;
        }
        self.blocks.get(height as usize - 1)
    }

    pub fn latest_block(&self) -> &SavedBlock {
        self.blocks.last().unwrap()
    }

    pub fn take_blocks(self) -> Vec<SavedBlock> {
        self.blocks
    }

    /// The blocks from `bottom` to `top` height (inclusive) as one section
    pub fn section(&self, bottom: u64, top: u64) -> BlockChainSection {
        assert!(top >= bottom);
        BlockChainSection {
            account: self.account,
            bottom_hash: self.block(bottom).hash(),
            bottom_height: bottom,
            top_hash: self.block(top).hash(),
            top_height: top,
        }
    }

    pub fn frontier_section(&self) -> BlockChainSection {
        let height = self.height();
        self.section(height, height)
    }

    pub fn add_legacy_change(&mut self, representative: impl Into<PublicKey>) -> &SavedBlock {
        let block = ChangeBlock::new(self.frontier(), representative.into());
        self.add_block(Block::LegacyChange(block), Epoch::Epoch0)
    }

    pub fn add_legacy_send(&mut self) -> &SavedBlock {
        self.add_legacy_send_to(Account::from(42u64), Amount::raw(1))
    }

    pub fn add_legacy_send_to(&mut self, destination: Account, amount: Amount) -> &SavedBlock {
        let block = SendBlock::new(self.frontier(), destination, self.balance - amount);
        self.add_block(Block::LegacySend(block), Epoch::Epoch0)
    }

    pub fn add_legacy_open_from_account(&mut self, sender_chain: &TestAccountChain) -> &SavedBlock {
        self.add_legacy_open_from_account_block(sender_chain, sender_chain.height())
    }

    pub fn add_legacy_open_from_account_block(
        &mut self,
        sender_chain: &TestAccountChain,
        height: u64,
    ) -> &SavedBlock {
        let send_block = sender_chain.block(height);
        let amount = sender_chain.amount_of_block(height);
        assert_eq!(self.height(), 0);
        assert!(amount > Amount::zero());
        assert_eq!(send_block.destination_or_link(), self.account);
        self.balance = amount;
        let open = OpenBlock::new(send_block.hash(), PublicKey::from(456u64), self.account);
        let source_epoch = send_block.epoch();
        self.add_block(Block::LegacyOpen(open), source_epoch)
    }

    pub fn add_legacy_receive_from_account(
        &mut self,
        sender_chain: &TestAccountChain,
    ) -> &SavedBlock {
        self.add_legacy_receive_from_account_block(sender_chain, sender_chain.height())
    }

    pub fn add_legacy_receive_from_account_block(
        &mut self,
        sender: &TestAccountChain,
        height: u64,
    ) -> &SavedBlock {
        let send_block = sender.block(height);
        let amount = sender.amount_of_block(height);
        assert!(amount > Amount::zero());
        assert_eq!(send_block.destination_or_link(), self.account);
        let source_epoch = send_block.epoch();
        let receive = ReceiveBlock::new(self.frontier(), send_block.hash());
        self.balance += amount;
        self.add_block(Block::LegacyReceive(receive), source_epoch)
    }

    pub fn add_legacy_receive_from_self(&mut self) -> &SavedBlock {
        let height = self.height();
        let send_hash = self.block(height).hash();
        let amount = self.amount_of_block(height);
        assert_eq!(self.block(height).destination_or_link(), self.account);
        let receive = ReceiveBlock::new(self.frontier(), send_hash);
        self.balance += amount;
        self.add_block(Block::LegacyReceive(receive), Epoch::Epoch0)
    }

    /// A state block that keeps balance and representative unchanged
    pub fn add_state(&mut self) -> &SavedBlock {
        let block = self.new_state_block(self.balance, Link::zero());
        self.add_block(Block::State(block), Epoch::Epoch0)
    }

    pub fn add_state_send_to(&mut self, destination: Account, amount: Amount) -> &SavedBlock {
        let block = self.new_state_block(self.balance - amount, destination.into());
        self.add_block(Block::State(block), Epoch::Epoch0)
    }

    pub fn add_state_receive_from(&mut self, sender: &TestAccountChain, height: u64) -> &SavedBlock {
        let send_block = sender.block(height);
        let amount = sender.amount_of_block(height);
        assert!(amount > Amount::zero());
        assert_eq!(send_block.destination_or_link(), self.account);
        let source_epoch = send_block.epoch();
        let block = self.new_state_block(self.balance + amount, send_block.hash().into());
        self.add_block(Block::State(block), source_epoch)
    }

    pub fn add_epoch_v1(&mut self) -> &SavedBlock {
        let block = self.new_state_block(self.balance, epoch_v1_link());
        self.add_block(Block::State(block), Epoch::Epoch0)
    }

    pub fn add_epoch_v2(&mut self) -> &SavedBlock {
        let block = self.new_state_block(self.balance, epoch_v2_link());
        self.add_block(Block::State(block), Epoch::Epoch0)
    }

    fn new_state_block(&self, balance: Amount, link: Link) -> StateBlock {
        StateBlock::new(
            self.account,
            self.frontier(),
            self.representative,
            balance,
            link,
        )
    }

    pub fn account_info(&self) -> AccountInfo {
        AccountInfo {
            head: self.frontier(),
            representative: self.representative,
            open_block: self.open(),
            balance: self.latest_block().balance(),
            modified: 123,
            block_count: self.height(),
            epoch: self.epoch,
        }
    }

    pub fn amount_of_block(&self, height: u64) -> Amount {
        let balance = self.balance_on_height(height);
        let previous_balance = self.balance_on_height(height - 1);
        if balance > previous_balance {
            balance - previous_balance
        } else {
            previous_balance - balance
        }
    }

    fn balance_on_height(&self, height: u64) -> Amount {
        if height == 0 {
            Amount::zero()
        } else {
            self.blocks[height as usize - 1].balance()
        }
    }

    fn details_for(&self, block: &Block) -> BlockDetails {
        let previous_balance = self.balance_on_height(self.height());
        match block {
            Block::LegacySend(_) => BlockDetails::new(self.epoch, true, false, false),
            Block::LegacyReceive(_) | Block::LegacyOpen(_) => {
                BlockDetails::new(self.epoch, false, true, false)
            }
            Block::LegacyChange(_) => BlockDetails::new(self.epoch, false, false, false),
            Block::State(state) => {
                let link = state.link();
                let is_epoch_link = link == epoch_v1_link() || link == epoch_v2_link();
                let is_send = state.balance() < previous_balance;
                let is_epoch = is_epoch_link && state.balance() == previous_balance;
                let is_receive = state.balance() > previous_balance
                    || (state.previous().is_zero() && !link.is_zero() && !is_epoch);
                BlockDetails::new(self.epoch, is_send, is_receive, is_epoch)
            }
        }
    }

    pub fn add_block(&mut self, block: Block, source_epoch: Epoch) -> &SavedBlock {
        let link = block.link_field().unwrap_or_default();
        if link == epoch_v1_link() {
            self.epoch = Epoch::Epoch1;
        } else if link == epoch_v2_link() {
            self.epoch = Epoch::Epoch2;
        }

        if let Some(new_balance) = block.balance_field() {
            self.balance = new_balance;
        }

        let details = self.details_for(&block);
        let sideband = BlockSideband {
            height: self.height() + 1,
            timestamp: 1,
            successor: BlockHash::zero(),
            account: self.account,
            balance: self.balance,
            details,
            source_epoch,
        };

        if let Some(previous) = self.blocks.last_mut() {
            previous.set_successor(block.hash());
        }

        if let Some(rep) = block.representative_field() {
            self.representative = rep;
        }

        self.blocks.push(SavedBlock::new(block, sideband));
        self.blocks.last().unwrap()
    }

    pub fn representative_at_height(&self, height: u64) -> Option<PublicKey> {
        self.blocks[..height as usize]
            .iter()
            .rev()
            .filter_map(|b| b.representative_field())
            .next()
    }
}

impl Default for TestAccountChain {
    fn default() -> Self {
        Self::new()
    }
}
