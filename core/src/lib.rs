#[macro_use]
extern crate anyhow;

#[macro_use]
extern crate num_derive;

mod u256_struct;
pub use u256_struct::*;

mod amount;
pub use amount::Amount;

mod qualified_root;
pub use qualified_root::QualifiedRoot;

mod account_info;
pub use account_info::AccountInfo;

mod confirmation_height_info;
pub use confirmation_height_info::ConfirmationHeightInfo;

mod block_chain_section;
pub use block_chain_section::BlockChainSection;

mod epoch;
pub use epoch::{epoch_v1_link, epoch_v2_link, Epoch, Epochs};

mod vote;
pub use vote::{Vote, VoteCode, VoteSource};

mod blocks;
pub use blocks::*;

pub mod utils;

use blake2::{
    digest::{Update, VariableOutput},
    Blake2bVar,
};
use std::fmt::Write;

u256_struct!(BlockHash);
u256_struct!(Account);
u256_struct!(PublicKey);
u256_struct!(Link);
u256_struct!(Root);

u256_struct_conversion!(Account, BlockHash);
u256_struct_conversion!(Account, Link);
u256_struct_conversion!(Account, Root);
u256_struct_conversion!(Account, PublicKey);
u256_struct_conversion!(PublicKey, Account);
u256_struct_conversion!(BlockHash, Link);
u256_struct_conversion!(BlockHash, Root);
u256_struct_conversion!(Link, Account);
u256_struct_conversion!(Link, BlockHash);
u256_struct_conversion!(Root, Account);
u256_struct_conversion!(Root, BlockHash);

pub fn write_hex_bytes(bytes: &[u8], f: &mut std::fmt::Formatter) -> Result<(), std::fmt::Error> {
    for &byte in bytes {
        write!(f, "{:02X}", byte)?;
    }
    Ok(())
}

pub fn to_hex_string(i: u64) -> String {
    format!("{:016X}", i)
}

pub struct BlockHashBuilder {
    blake: Blake2bVar,
}

impl Default for BlockHashBuilder {
    fn default() -> Self {
        Self {
            blake: Blake2bVar::new(32).unwrap(),
        }
    }
}

impl BlockHashBuilder {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn update(mut self, data: impl AsRef<[u8]>) -> Self {
        self.blake.update(data.as_ref());
        self
    }

    pub fn build(self) -> BlockHash {
        let mut hash_bytes = [0u8; 32];
        self.blake.finalize_variable(&mut hash_bytes).unwrap();
        BlockHash::from_bytes(hash_bytes)
    }
}

/// The dev network's genesis account
pub static DEV_GENESIS_ACCOUNT: once_cell::sync::Lazy<Account> = once_cell::sync::Lazy::new(|| {
    Account::decode_hex("B0311EA55708D6A53C75CDBF88300259C6D018522FE3D4D0A242E431F9E8B6D0")
        .unwrap_or_default()
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_builder_is_deterministic() {
        let a = BlockHashBuilder::new().update([1, 2, 3]).build();
        let b = BlockHashBuilder::new().update([1, 2, 3]).build();
        let c = BlockHashBuilder::new().update([1, 2, 4]).build();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(!a.is_zero());
    }

    #[test]
    fn conversions_keep_bytes() {
        let hash = BlockHash::from(42u64);
        let root: Root = hash.into();
        let link: Link = hash.into();
        assert_eq!(root.as_bytes(), hash.as_bytes());
        assert_eq!(BlockHash::from(link), hash);
    }
}
