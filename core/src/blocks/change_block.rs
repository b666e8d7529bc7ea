use crate::{BlockHash, BlockHashBuilder, PublicKey};

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ChangeBlock {
    previous: BlockHash,
    representative: PublicKey,
    hash: BlockHash,
}

impl ChangeBlock {
    pub fn new(previous: BlockHash, representative: PublicKey) -> Self {
        let hash = BlockHashBuilder::new()
            .update(previous.as_bytes())
            .update(representative.as_bytes())
            .build();
        Self {
            previous,
            representative,
            hash,
        }
    }

    pub fn hash(&self) -> BlockHash {
        self.hash
    }

    pub fn previous(&self) -> BlockHash {
        self.previous
    }

    pub fn representative(&self) -> PublicKey {
        self.representative
    }
}
