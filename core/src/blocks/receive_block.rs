use crate::{BlockHash, BlockHashBuilder};

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ReceiveBlock {
    previous: BlockHash,
    source: BlockHash,
    hash: BlockHash,
}

impl ReceiveBlock {
    pub fn new(previous: BlockHash, source: BlockHash) -> Self {
        let hash = BlockHashBuilder::new()
            .update(previous.as_bytes())
            .update(source.as_bytes())
            .build();
        Self {
            previous,
            source,
            hash,
        }
    }

    pub fn hash(&self) -> BlockHash {
        self.hash
    }

    pub fn previous(&self) -> BlockHash {
        self.previous
    }

    pub fn source(&self) -> BlockHash {
        self.source
    }
}
