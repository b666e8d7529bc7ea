use crate::BlockHash;

/// Per-account cementing state. All blocks with height <= `height` are
/// irreversibly confirmed and `frontier` is the hash at that height.
#[derive(Default, PartialEq, Eq, Debug, Clone)]
pub struct ConfirmationHeightInfo {
    pub height: u64,
    pub frontier: BlockHash,
}

impl ConfirmationHeightInfo {
    pub fn new(height: u64, frontier: BlockHash) -> Self {
        Self { height, frontier }
    }

    pub fn new_test_instance() -> Self {
        Self::new(42, BlockHash::from(7u64))
    }
}
