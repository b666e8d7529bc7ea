use crate::{Account, Link, PublicKey};
use num_traits::FromPrimitive;
use std::collections::HashMap;

/// Tag for which epoch an entry belongs to
#[repr(u8)]
#[derive(PartialEq, Eq, Debug, Clone, Copy, FromPrimitive, Hash, Default, PartialOrd, Ord)]
pub enum Epoch {
    Invalid = 0,
    #[default]
    Unspecified = 1,
    Epoch0 = 2,
    Epoch1 = 3,
    Epoch2 = 4,
}

impl Epoch {
    pub const EPOCH_BEGIN: Epoch = Epoch::Epoch0;
    pub const MAX: Epoch = Epoch::Epoch2;

    pub fn epoch_number(&self) -> u8 {
        match self {
            Epoch::Epoch1 => 1,
            Epoch::Epoch2 => 2,
            _ => 0,
        }
    }
}

impl TryFrom<u8> for Epoch {
    type Error = anyhow::Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        FromPrimitive::from_u8(value).ok_or_else(|| anyhow!("invalid epoch value"))
    }
}

fn epoch_link(text: &str) -> Link {
    let mut bytes = [0u8; 32];
    bytes[..text.len()].copy_from_slice(text.as_bytes());
    Link::from_bytes(bytes)
}

pub fn epoch_v1_link() -> Link {
    epoch_link("epoch v1 block")
}

pub fn epoch_v2_link() -> Link {
    epoch_link("epoch v2 block")
}

#[derive(Clone, Debug, PartialEq)]
struct EpochInfo {
    signer: PublicKey,
    link: Link,
}

#[derive(Clone, Default, Debug, PartialEq)]
pub struct Epochs {
    epochs: HashMap<Epoch, EpochInfo>,
}

impl Epochs {
    pub fn new() -> Self {
        Default::default()
    }

    /// Epoch v1 and v2 links, both signed by the given account
    pub fn with_default_links(signer: Account) -> Self {
        let mut epochs = Self::new();
        epochs.add(Epoch::Epoch1, signer.into(), epoch_v1_link());
        epochs.add(Epoch::Epoch2, signer.into(), epoch_v2_link());
        epochs
    }

    pub fn add(&mut self, epoch: Epoch, signer: PublicKey, link: Link) {
        self.epochs.insert(epoch, EpochInfo { signer, link });
    }

    /// Returns true if link matches one of the released epoch links.
    /// A link equal to an epoch link does not make a block an epoch block:
    /// anyone can send to an account whose bytes match an epoch link.
    pub fn is_epoch_link(&self, link: &Link) -> bool {
        self.epochs.values().any(|x| &x.link == link)
    }

    pub fn link(&self, epoch: Epoch) -> Option<&Link> {
        self.epochs.get(&epoch).map(|x| &x.link)
    }

    pub fn signer(&self, epoch: Epoch) -> Option<&PublicKey> {
        self.epochs.get(&epoch).map(|x| &x.signer)
    }

    pub fn epoch(&self, link: &Link) -> Option<Epoch> {
        self.epochs
            .iter()
            .find(|(_, info)| &info.link == link)
            .map(|(epoch, _)| *epoch)
    }

    /// Checks that new_epoch is 1 version higher than epoch
    pub fn is_sequential(epoch: Epoch, new_epoch: Epoch) -> bool {
        let epoch_id = epoch as u8;
        let new_epoch_id = new_epoch as u8;
        epoch_id >= Epoch::Epoch0 as u8 && new_epoch_id == epoch_id + 1
    }
}
