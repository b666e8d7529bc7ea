use super::BlockSubType;
use crate::Epoch;

#[derive(PartialEq, Eq, Debug, Clone, Copy, Default)]
pub struct BlockDetails {
    pub epoch: Epoch,
    pub is_send: bool,
    pub is_receive: bool,
    pub is_epoch: bool,
}

impl BlockDetails {
    pub fn new(epoch: Epoch, is_send: bool, is_receive: bool, is_epoch: bool) -> Self {
        Self {
            epoch,
            is_send,
            is_receive,
            is_epoch,
        }
    }

    pub fn subtype(&self) -> BlockSubType {
        if self.is_send {
            BlockSubType::Send
        } else if self.is_receive {
            BlockSubType::Receive
        } else if self.is_epoch {
            BlockSubType::Epoch
        } else {
            BlockSubType::Change
        }
    }
}
