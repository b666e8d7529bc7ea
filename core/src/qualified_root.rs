use crate::{BlockHash, Root};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Identifies a fork slot: the root of a block together with its previous hash.
/// Two blocks with the same qualified root are competing for the same position
/// in an account chain.
#[derive(Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub struct QualifiedRoot {
    pub root: Root,
    pub previous: BlockHash,
}

impl QualifiedRoot {
    pub fn new(root: Root, previous: BlockHash) -> Self {
        Self { root, previous }
    }

    pub fn new_test_instance() -> Self {
        Self::new(Root::from(111u64), BlockHash::from(222u64))
    }
}

impl Display for QualifiedRoot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.root, self.previous)
    }
}
