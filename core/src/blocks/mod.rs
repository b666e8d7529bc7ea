mod block_details;
pub use block_details::BlockDetails;

mod block_sideband;
pub use block_sideband::BlockSideband;

mod change_block;
pub use change_block::ChangeBlock;

mod open_block;
pub use open_block::OpenBlock;

mod receive_block;
pub use receive_block::ReceiveBlock;

mod send_block;
pub use send_block::SendBlock;

mod state_block;
pub use state_block::StateBlock;

mod builders;
pub use builders::*;

use crate::{Account, Amount, BlockHash, Epoch, Link, PublicKey, QualifiedRoot, Root};
use num_traits::FromPrimitive;
use std::ops::Deref;

#[repr(u8)]
#[derive(PartialEq, Eq, Debug, Clone, Copy, FromPrimitive)]
pub enum BlockType {
    Invalid = 0,
    NotABlock = 1,
    LegacySend = 2,
    LegacyReceive = 3,
    LegacyOpen = 4,
    LegacyChange = 5,
    State = 6,
}

impl TryFrom<u8> for BlockType {
    type Error = anyhow::Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        FromPrimitive::from_u8(value).ok_or_else(|| anyhow!("invalid block type value"))
    }
}

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum BlockSubType {
    Send,
    Receive,
    Open,
    Change,
    Epoch,
}

impl BlockSubType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockSubType::Send => "send",
            BlockSubType::Receive => "receive",
            BlockSubType::Open => "open",
            BlockSubType::Change => "change",
            BlockSubType::Epoch => "epoch",
        }
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Block {
    LegacySend(SendBlock),
    LegacyReceive(ReceiveBlock),
    LegacyOpen(OpenBlock),
    LegacyChange(ChangeBlock),
    State(StateBlock),
}

impl Block {
    pub fn new_test_instance() -> Self {
        Self::State(StateBlock::new(
            Account::from(1u64),
            BlockHash::from(2u64),
            PublicKey::from(3u64),
            Amount::raw(4),
            Link::from(5u64),
        ))
    }

    pub fn block_type(&self) -> BlockType {
        match self {
            Block::LegacySend(_) => BlockType::LegacySend,
            Block::LegacyReceive(_) => BlockType::LegacyReceive,
            Block::LegacyOpen(_) => BlockType::LegacyOpen,
            Block::LegacyChange(_) => BlockType::LegacyChange,
            Block::State(_) => BlockType::State,
        }
    }

    pub fn hash(&self) -> BlockHash {
        match self {
            Block::LegacySend(b) => b.hash(),
            Block::LegacyReceive(b) => b.hash(),
            Block::LegacyOpen(b) => b.hash(),
            Block::LegacyChange(b) => b.hash(),
            Block::State(b) => b.hash(),
        }
    }

    /// Zero for open blocks
    pub fn previous(&self) -> BlockHash {
        match self {
            Block::LegacySend(b) => b.previous(),
            Block::LegacyReceive(b) => b.previous(),
            Block::LegacyOpen(_) => BlockHash::zero(),
            Block::LegacyChange(b) => b.previous(),
            Block::State(b) => b.previous(),
        }
    }

    /// The previous block, or the account for the first block of a chain
    pub fn root(&self) -> Root {
        match self {
            Block::LegacyOpen(b) => b.account().into(),
            Block::State(b) if b.previous().is_zero() => b.account().into(),
            _ => self.previous().into(),
        }
    }

    pub fn qualified_root(&self) -> QualifiedRoot {
        QualifiedRoot::new(self.root(), self.previous())
    }

    pub fn account_field(&self) -> Option<Account> {
        match self {
            Block::LegacyOpen(b) => Some(b.account()),
            Block::State(b) => Some(b.account()),
            _ => None,
        }
    }

    pub fn balance_field(&self) -> Option<Amount> {
        match self {
            Block::LegacySend(b) => Some(b.balance()),
            Block::State(b) => Some(b.balance()),
            _ => None,
        }
    }

    /// Source block for open/receive blocks
    pub fn source_field(&self) -> Option<BlockHash> {
        match self {
            Block::LegacyOpen(b) => Some(b.source()),
            Block::LegacyReceive(b) => Some(b.source()),
            _ => None,
        }
    }

    pub fn link_field(&self) -> Option<Link> {
        match self {
            Block::State(b) => Some(b.link()),
            _ => None,
        }
    }

    pub fn representative_field(&self) -> Option<PublicKey> {
        match self {
            Block::LegacyOpen(b) => Some(b.representative()),
            Block::LegacyChange(b) => Some(b.representative()),
            Block::State(b) => Some(b.representative()),
            _ => None,
        }
    }

    pub fn destination_field(&self) -> Option<Account> {
        match self {
            Block::LegacySend(b) => Some(*b.destination()),
            _ => None,
        }
    }

    pub fn is_open(&self) -> bool {
        match self {
            Block::LegacyOpen(_) => true,
            Block::State(state) => state.previous().is_zero(),
            _ => false,
        }
    }

    pub fn is_legacy(&self) -> bool {
        !matches!(self, Block::State(_))
    }

    pub fn source_or_link(&self) -> BlockHash {
        self.source_field()
            .unwrap_or_else(|| self.link_field().unwrap_or_default().into())
    }

    pub fn destination_or_link(&self) -> Account {
        self.destination_field()
            .unwrap_or_else(|| self.link_field().unwrap_or_default().into())
    }
}

/// A block with additional data about that block (the "sideband")
/// which is only known when the block is saved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SavedBlock {
    block: Block,
    sideband: BlockSideband,
}

impl SavedBlock {
    pub fn new(block: Block, sideband: BlockSideband) -> Self {
        Self { block, sideband }
    }

    pub fn new_test_instance() -> Self {
        let block = Block::new_test_instance();
        let sideband = BlockSideband {
            height: 2,
            timestamp: 222222,
            successor: BlockHash::zero(),
            account: block.account_field().unwrap_or_default(),
            balance: block.balance_field().unwrap_or_default(),
            details: BlockDetails::new(Epoch::Epoch2, true, false, false),
            source_epoch: Epoch::Epoch0,
        };
        Self::new(block, sideband)
    }

    pub fn set_sideband(&mut self, sideband: BlockSideband) {
        self.sideband = sideband;
    }

    pub fn set_successor(&mut self, successor: BlockHash) {
        self.sideband.successor = successor;
    }

    pub fn account(&self) -> Account {
        match self.account_field() {
            Some(account) => account,
            None => self.sideband.account,
        }
    }

    pub fn height(&self) -> u64 {
        self.sideband.height
    }

    pub fn timestamp(&self) -> u64 {
        self.sideband.timestamp
    }

    pub fn subtype(&self) -> BlockSubType {
        if self.is_open() {
            BlockSubType::Open
        } else {
            self.sideband.details.subtype()
        }
    }

    pub fn successor(&self) -> Option<BlockHash> {
        if self.sideband.successor.is_zero() {
            None
        } else {
            Some(self.sideband.successor)
        }
    }

    pub fn epoch(&self) -> Epoch {
        self.sideband.details.epoch
    }

    pub fn is_epoch(&self) -> bool {
        self.sideband.details.is_epoch
    }

    pub fn is_receive(&self) -> bool {
        self.sideband.details.is_receive
    }

    pub fn is_send(&self) -> bool {
        match &self.block {
            Block::LegacySend(_) => true,
            Block::State(_) => self.sideband.details.is_send,
            _ => false,
        }
    }

    pub fn source(&self) -> Option<BlockHash> {
        match &self.block {
            Block::LegacyOpen(i) => Some(i.source()),
            Block::LegacyReceive(i) => Some(i.source()),
            Block::State(i) if self.sideband.details.is_receive => Some(i.link().into()),
            _ => None,
        }
    }

    pub fn source_epoch(&self) -> Epoch {
        self.sideband.source_epoch
    }

    pub fn destination(&self) -> Option<Account> {
        match &self.block {
            Block::LegacySend(i) => Some(*i.destination()),
            Block::State(i) if self.sideband.details.is_send => Some(i.link().into()),
            _ => None,
        }
    }

    pub fn balance(&self) -> Amount {
        match &self.block {
            Block::LegacySend(b) => b.balance(),
            Block::State(b) => b.balance(),
            _ => self.sideband.balance,
        }
    }

    pub fn details(&self) -> &BlockDetails {
        &self.sideband.details
    }

    pub fn sideband(&self) -> &BlockSideband {
        &self.sideband
    }
}

impl Deref for SavedBlock {
    type Target = Block;

    fn deref(&self) -> &Self::Target {
        &self.block
    }
}

impl From<SavedBlock> for Block {
    fn from(value: SavedBlock) -> Self {
        value.block
    }
}
