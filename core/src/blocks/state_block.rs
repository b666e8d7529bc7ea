use super::BlockType;
use crate::{Account, Amount, BlockHash, BlockHashBuilder, Link, PublicKey};

/// Universal block type. Whether it sends, receives, changes the representative
/// or upgrades the epoch is derived from the balance delta and the link.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct StateBlock {
    account: Account,
    previous: BlockHash,
    representative: PublicKey,
    balance: Amount,
    link: Link,
    hash: BlockHash,
}

impl StateBlock {
    pub fn new(
        account: Account,
        previous: BlockHash,
        representative: PublicKey,
        balance: Amount,
        link: Link,
    ) -> Self {
        let mut preamble = [0u8; 32];
        preamble[31] = BlockType::State as u8;
        let hash = BlockHashBuilder::new()
            .update(preamble)
            .update(account.as_bytes())
            .update(previous.as_bytes())
            .update(representative.as_bytes())
            .update(balance.to_be_bytes())
            .update(link.as_bytes())
            .build();
        Self {
            account,
            previous,
            representative,
            balance,
            link,
            hash,
        }
    }

    pub fn hash(&self) -> BlockHash {
        self.hash
    }

    pub fn account(&self) -> Account {
        self.account
    }

    pub fn previous(&self) -> BlockHash {
        self.previous
    }

    pub fn representative(&self) -> PublicKey {
        self.representative
    }

    pub fn balance(&self) -> Amount {
        self.balance
    }

    pub fn link(&self) -> Link {
        self.link
    }
}
