use lattice_core::VoteCode;
use serde::Serialize;
use serde_variant::to_variant_name;

/// Primary statistics type
#[repr(u8)]
#[derive(FromPrimitive, Serialize, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug)]
#[serde(rename_all = "snake_case")]
pub enum StatType {
    Error,
    Ledger,
    Vote,
    Election,
    ElectionVote,
    ActiveElections,
    ActiveElectionsStarted,
    ActiveElectionsStopped,
    ActiveElectionsConfirmed,
    ActiveElectionsDropped,
    ActiveElectionsTimeout,
    ActiveElectionsCancelled,
    ConfirmationHeight,
    ConfirmationObserver,
    ConfirmationSolicitor,
    VoteCache,
    OnlineReps,
}

impl StatType {
    pub fn as_str(&self) -> &'static str {
        to_variant_name(self).unwrap_or_default()
    }
}

/// Optional detail type
#[repr(u16)]
#[derive(FromPrimitive, Serialize, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug)]
#[serde(rename_all = "snake_case")]
pub enum DetailType {
    // common
    All = 0,
    Loop,
    Total,
    Insert,
    Erase,

    // election specific
    VoteNew,
    VoteProcessed,
    VoteCached,
    ElectionBlockConflict,
    ElectionRestart,
    ElectionNotConfirmed,
    ElectionHintedOverflow,
    ElectionHintedConfirmed,
    ElectionHintedDrop,
    BroadcastVote,
    BroadcastBlockInitial,
    BroadcastBlockRepeat,
    ConfirmOnce,
    ConfirmOnceFailed,
    ConfirmationRequest,

    // election types
    Normal,
    Hinted,
    Optimistic,

    // election states
    Passive,
    Active,
    ExpiredConfirmed,
    ExpiredUnconfirmed,
    Cancelled,

    // election status type
    Ongoing,
    ActiveConfirmedQuorum,
    ActiveConfirmationHeight,
    InactiveConfirmationHeight,
    Stopped,

    // active elections
    Started,
    Confirmed,
    Dropped,
    Timeout,
    EraseOldest,
    Trim,
    Replaced,

    // vote codes
    Vote,
    Replay,
    Indeterminate,
    Ignored,

    // vote sources
    Live,
    Cache,

    // confirmation height
    BlocksConfirmed,
    BlocksConfirmedBounded,
    Cemented,
    AlreadyCemented,
    CementedHash,
    BatchSizeIncreased,
    BatchSizeDecreased,
    LedgerMismatch,

    // confirmation solicitor
    BroadcastBlock,
    SendConfirmReq,
    RequestsFull,

    // vote cache
    Update,
    NewVoter,
    Cleanup,
    Overfill,
}

impl DetailType {
    pub fn as_str(&self) -> &'static str {
        to_variant_name(self).unwrap_or_default()
    }
}

impl From<VoteCode> for DetailType {
    fn from(value: VoteCode) -> Self {
        match value {
            VoteCode::Vote => DetailType::Vote,
            VoteCode::Replay => DetailType::Replay,
            VoteCode::Indeterminate => DetailType::Indeterminate,
            VoteCode::Ignored => DetailType::Ignored,
        }
    }
}

/// Direction of the stat. If the direction is irrelevant, use In
#[derive(FromPrimitive, Serialize, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        to_variant_name(self).unwrap_or_default()
    }
}

#[derive(FromPrimitive, Serialize, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug)]
#[serde(rename_all = "snake_case")]
pub enum Sample {
    ActiveElectionDuration,
    CementingBatchSize,
    CementingBatchDuration,
}

impl Sample {
    pub fn as_str(&self) -> &'static str {
        to_variant_name(self).unwrap_or_default()
    }
}
