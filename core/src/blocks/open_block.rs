use crate::{Account, BlockHash, BlockHashBuilder, PublicKey};

/// First block of a legacy account chain. It always receives `source`.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct OpenBlock {
    source: BlockHash,
    representative: PublicKey,
    account: Account,
    hash: BlockHash,
}

impl OpenBlock {
    pub fn new(source: BlockHash, representative: PublicKey, account: Account) -> Self {
        let hash = BlockHashBuilder::new()
            .update(source.as_bytes())
            .update(representative.as_bytes())
            .update(account.as_bytes())
            .build();
        Self {
            source,
            representative,
            account,
            hash,
        }
    }

    pub fn hash(&self) -> BlockHash {
        self.hash
    }

    pub fn source(&self) -> BlockHash {
        self.source
    }

    pub fn representative(&self) -> PublicKey {
        self.representative
    }

    pub fn account(&self) -> Account {
        self.account
    }
}
