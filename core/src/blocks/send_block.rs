use crate::{Account, Amount, BlockHash, BlockHashBuilder};

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct SendBlock {
    previous: BlockHash,
    destination: Account,
    balance: Amount,
    hash: BlockHash,
}

impl SendBlock {
    pub fn new(previous: BlockHash, destination: Account, balance: Amount) -> Self {
        let hash = BlockHashBuilder::new()
            .update(previous.as_bytes())
            .update(destination.as_bytes())
            .update(balance.to_be_bytes())
            .build();
        Self {
            previous,
            destination,
            balance,
            hash,
        }
    }

    pub fn hash(&self) -> BlockHash {
        self.hash
    }

    pub fn previous(&self) -> BlockHash {
        self.previous
    }

    pub fn destination(&self) -> &Account {
        &self.destination
    }

    pub fn balance(&self) -> Amount {
        self.balance
    }
}
