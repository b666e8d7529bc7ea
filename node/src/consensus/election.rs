use super::{ElectionStatus, ElectionStatusType};
use crate::stats::DetailType;
#[cfg(test)]
use mock_instant::thread_local::Instant;
use lattice_core::{Account, Amount, Block, BlockHash, QualifiedRoot, Root};
use serde::Serialize;
#[cfg(not(test))]
use std::time::Instant;
use std::{
    collections::HashMap,
    fmt::Debug,
    sync::{
        atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::{Duration, SystemTime},
};

/// Maximum number of candidate blocks an election keeps for its root
pub const MAX_BLOCKS: usize = 10;

/// Passive elections become active after `base_latency * PASSIVE_DURATION_FACTOR`
pub const PASSIVE_DURATION_FACTOR: u32 = 5;

static NEXT_ELECTION_ID: AtomicUsize = AtomicUsize::new(1);

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ElectionBehavior {
    Normal,
    /// Started because of votes seen in the vote cache
    Hinted,
    /// Started for accounts far ahead of their confirmation height
    Optimistic,
}

impl ElectionBehavior {
    pub fn as_str(&self) -> &'static str {
        serde_variant::to_variant_name(self).unwrap_or_default()
    }
}

impl From<ElectionBehavior> for DetailType {
    fn from(value: ElectionBehavior) -> Self {
        match value {
            ElectionBehavior::Normal => DetailType::Normal,
            ElectionBehavior::Hinted => DetailType::Hinted,
            ElectionBehavior::Optimistic => DetailType::Optimistic,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ElectionState {
    /// Only listening for incoming votes
    Passive,
    /// Actively requesting confirmations
    Active,
    Confirmed,
    ExpiredConfirmed,
    ExpiredUnconfirmed,
}

impl ElectionState {
    pub fn as_str(&self) -> &'static str {
        serde_variant::to_variant_name(self).unwrap_or_default()
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(
            self,
            ElectionState::Confirmed | ElectionState::ExpiredConfirmed
        )
    }
}

impl From<ElectionState> for DetailType {
    fn from(value: ElectionState) -> Self {
        match value {
            ElectionState::Passive => DetailType::Passive,
            ElectionState::Active => DetailType::Active,
            ElectionState::Confirmed => DetailType::Confirmed,
            ElectionState::ExpiredConfirmed => DetailType::ExpiredConfirmed,
            ElectionState::ExpiredUnconfirmed => DetailType::ExpiredUnconfirmed,
        }
    }
}

/// The last vote of a representative in an election
#[derive(Clone, Debug)]
pub struct VoteInfo {
    pub time: Instant,
    pub timestamp: u64,
    pub hash: BlockHash,
}

impl VoteInfo {
    pub fn new(timestamp: u64, hash: BlockHash) -> Self {
        Self {
            time: Instant::now(),
            timestamp,
            hash,
        }
    }

    /// A vote is a replay if it is older than this one. A vote with the same
    /// timestamp only counts if it switches to a greater hash.
    pub fn is_replay(&self, timestamp: u64, hash: &BlockHash) -> bool {
        if self.timestamp > timestamp {
            return true;
        }
        self.timestamp == timestamp && !(self.hash < *hash)
    }
}

/// Election for a single qualified root. All mutable state lives behind `mutex`.
pub struct Election {
    pub id: usize,
    pub mutex: Mutex<ElectionData>,
    pub root: Root,
    pub qualified_root: QualifiedRoot,
    pub behavior: ElectionBehavior,
    pub election_start: Instant,
    pub is_quorum: AtomicBool,
    pub confirmation_request_count: AtomicU32,
    live_vote_action: Box<dyn Fn(Account) + Send + Sync>,
}

impl Election {
    pub fn new(
        block: Arc<Block>,
        behavior: ElectionBehavior,
        live_vote_action: Box<dyn Fn(Account) + Send + Sync>,
    ) -> Self {
        let root = block.root();
        let qualified_root = block.qualified_root();
        let hash = block.hash();

        let data = ElectionData {
            status: ElectionStatus {
                winner: Some(Arc::clone(&block)),
                election_end: SystemTime::now(),
                block_count: 1,
                election_status_type: ElectionStatusType::Ongoing,
                ..Default::default()
            },
            state: ElectionState::Passive,
            state_start: Instant::now(),
            // Dummy vote so the initial block is always part of the tally
            last_votes: HashMap::from([(Account::zero(), VoteInfo::new(0, hash))]),
            last_blocks: HashMap::from([(hash, block)]),
            last_tally: HashMap::new(),
            last_final_tally: HashMap::new(),
            final_weight: Amount::zero(),
            last_block: None,
            last_block_hash: BlockHash::zero(),
            last_req: None,
            last_vote: None,
        };

        Self {
            id: NEXT_ELECTION_ID.fetch_add(1, Ordering::Relaxed),
            mutex: Mutex::new(data),
            root,
            qualified_root,
            behavior,
            election_start: Instant::now(),
            is_quorum: AtomicBool::new(false),
            confirmation_request_count: AtomicU32::new(0),
            live_vote_action,
        }
    }

    pub fn valid_change(expected: ElectionState, desired: ElectionState) -> bool {
        match expected {
            ElectionState::Passive => matches!(
                desired,
                ElectionState::Active
                    | ElectionState::Confirmed
                    | ElectionState::ExpiredUnconfirmed
            ),
            ElectionState::Active => matches!(
                desired,
                ElectionState::Confirmed | ElectionState::ExpiredUnconfirmed
            ),
            ElectionState::Confirmed => matches!(desired, ElectionState::ExpiredConfirmed),
            ElectionState::ExpiredConfirmed | ElectionState::ExpiredUnconfirmed => false,
        }
    }

    pub fn transition_active(&self) {
        let _ = self
            .mutex
            .lock()
            .unwrap()
            .state_change(ElectionState::Passive, ElectionState::Active);
    }

    pub fn state(&self) -> ElectionState {
        self.mutex.lock().unwrap().state
    }

    pub fn is_confirmed(&self) -> bool {
        self.mutex.lock().unwrap().is_confirmed()
    }

    pub fn failed(&self) -> bool {
        self.mutex.lock().unwrap().state == ElectionState::ExpiredUnconfirmed
    }

    pub fn winner_hash(&self) -> Option<BlockHash> {
        self.mutex
            .lock()
            .unwrap()
            .status
            .winner
            .as_ref()
            .map(|w| w.hash())
    }

    pub fn contains(&self, hash: &BlockHash) -> bool {
        self.mutex.lock().unwrap().last_blocks.contains_key(hash)
    }

    pub fn blocks(&self) -> HashMap<BlockHash, Arc<Block>> {
        self.mutex.lock().unwrap().last_blocks.clone()
    }

    pub fn votes(&self) -> HashMap<Account, VoteInfo> {
        self.mutex.lock().unwrap().last_votes.clone()
    }

    pub fn current_status(&self) -> ElectionStatus {
        let guard = self.mutex.lock().unwrap();
        let mut status = guard.status.clone();
        status.confirmation_request_count = self.confirmation_request_count.load(Ordering::SeqCst);
        status.block_count = guard.last_blocks.len() as u32;
        status.voter_count = guard.last_votes.len() as u32;
        status
    }

    pub fn duration(&self) -> Duration {
        self.election_start.elapsed()
    }

    pub fn time_to_live(&self) -> Duration {
        match self.behavior {
            ElectionBehavior::Normal => Duration::from_secs(5 * 60),
            ElectionBehavior::Hinted | ElectionBehavior::Optimistic => Duration::from_secs(30),
        }
    }

    /// Minimum time between confirmation requests
    pub fn confirm_req_time(&self, base_latency: Duration) -> Duration {
        match self.behavior {
            ElectionBehavior::Normal | ElectionBehavior::Hinted => base_latency * 5,
            ElectionBehavior::Optimistic => base_latency * 2,
        }
    }

    /// Calculates minimum time delay between subsequent votes when processing non-final votes
    pub fn cooldown_time(weight: Amount, trended_online_weight: Amount) -> Duration {
        let online_stake = trended_online_weight.number();
        if weight.number() > online_stake / 20 {
            // Reps with more than 5% weight
            Duration::from_secs(1)
        } else if weight.number() > online_stake / 100 {
            // Reps with more than 1% weight
            Duration::from_secs(5)
        } else {
            // The rest of smaller reps
            Duration::from_secs(15)
        }
    }

    pub(crate) fn live_vote_action(&self, representative: Account) {
        (self.live_vote_action)(representative);
    }
}

impl Debug for Election {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Election")
            .field("id", &self.id)
            .field("qualified_root", &self.qualified_root)
            .field("behavior", &self.behavior)
            .finish()
    }
}

pub struct ElectionData {
    pub status: ElectionStatus,
    pub state: ElectionState,
    pub state_start: Instant,
    pub last_blocks: HashMap<BlockHash, Arc<Block>>,
    pub last_votes: HashMap<Account, VoteInfo>,
    pub last_tally: HashMap<BlockHash, Amount>,
    pub last_final_tally: HashMap<BlockHash, Amount>,
    pub final_weight: Amount,
    pub last_block: Option<Instant>,
    pub last_block_hash: BlockHash,
    pub last_req: Option<Instant>,
    pub last_vote: Option<Instant>,
}

impl ElectionData {
    pub fn is_confirmed(&self) -> bool {
        self.state.is_confirmed()
    }

    pub fn state_change(
        &mut self,
        expected: ElectionState,
        desired: ElectionState,
    ) -> Result<(), ()> {
        if Election::valid_change(expected, desired) && self.state == expected {
            self.state = desired;
            self.state_start = Instant::now();
            Ok(())
        } else {
            Err(())
        }
    }

    pub fn state_elapsed(&self) -> Duration {
        self.state_start.elapsed()
    }

    pub fn winner_hash(&self) -> BlockHash {
        self.status.winner_hash()
    }

    /// Sums up the weight of the latest vote of every representative per block hash.
    /// Returns the candidates ordered by weight, highest first.
    pub fn tally_impl(&mut self, weight_of: impl Fn(&Account) -> Amount) -> Vec<(BlockHash, Amount)> {
        let mut block_weights: HashMap<BlockHash, Amount> = HashMap::new();
        let mut final_weights: HashMap<BlockHash, Amount> = HashMap::new();
        for (account, info) in &self.last_votes {
            let rep_weight = weight_of(account);
            let weight = block_weights.entry(info.hash).or_default();
            *weight = weight.saturating_add(rep_weight);
            if info.timestamp == u64::MAX {
                let final_weight = final_weights.entry(info.hash).or_default();
                *final_weight = final_weight.saturating_add(rep_weight);
            }
        }

        let mut result: Vec<(BlockHash, Amount)> = block_weights
            .iter()
            .filter(|(hash, _)| self.last_blocks.contains_key(hash))
            .map(|(hash, weight)| (*hash, *weight))
            .collect();
        result.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        self.last_tally = block_weights;
        self.last_final_tally = final_weights;
        result
    }

    pub fn tally_of(&self, hash: &BlockHash) -> Amount {
        self.last_tally.get(hash).copied().unwrap_or_default()
    }

    pub fn final_tally_of(&self, hash: &BlockHash) -> Amount {
        self.last_final_tally.get(hash).copied().unwrap_or_default()
    }

    pub fn update_status_to_confirmed(&mut self, election: &Election, status_type: ElectionStatusType) {
        self.status.election_end = SystemTime::now();
        self.status.election_duration = election.election_start.elapsed();
        self.status.confirmation_request_count =
            election.confirmation_request_count.load(Ordering::SeqCst);
        self.status.block_count = self.last_blocks.len() as u32;
        self.status.voter_count = self.last_votes.len() as u32;
        self.status.election_status_type = status_type;
    }

    pub fn last_req_elapsed(&self) -> Option<Duration> {
        self.last_req.map(|i| i.elapsed())
    }

    pub fn set_last_req(&mut self) {
        self.last_req = Some(Instant::now());
    }

    pub fn last_block_elapsed(&self) -> Option<Duration> {
        self.last_block.map(|i| i.elapsed())
    }

    pub fn set_last_block(&mut self) {
        self.last_block = Some(Instant::now());
    }

    pub fn last_vote_elapsed(&self) -> Option<Duration> {
        self.last_vote.map(|i| i.elapsed())
    }

    pub fn set_last_vote(&mut self) {
        self.last_vote = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lattice_core::{Link, PublicKey, StateBlock};
    use mock_instant::thread_local::MockClock;

    fn test_block(balance: u128) -> Arc<Block> {
        Arc::new(Block::State(StateBlock::new(
            Account::from(1u64),
            BlockHash::from(2u64),
            PublicKey::from(3u64),
            Amount::raw(balance),
            Link::from(4u64),
        )))
    }

    fn create_election(block: &Arc<Block>) -> Election {
        Election::new(Arc::clone(block), ElectionBehavior::Normal, Box::new(|_| {}))
    }

    #[test]
    fn new_election_is_passive_with_dummy_vote() {
        let block = test_block(100);
        let election = create_election(&block);

        assert_eq!(election.state(), ElectionState::Passive);
        assert_eq!(election.winner_hash(), Some(block.hash()));
        assert_eq!(election.qualified_root, block.qualified_root());
        let votes = election.votes();
        assert_eq!(votes.len(), 1);
        assert_eq!(votes[&Account::zero()].hash, block.hash());
        assert_eq!(votes[&Account::zero()].timestamp, 0);
    }

    #[test]
    fn state_transitions() {
        use ElectionState::*;
        assert!(Election::valid_change(Passive, Active));
        assert!(Election::valid_change(Passive, Confirmed));
        assert!(Election::valid_change(Passive, ExpiredUnconfirmed));
        assert!(Election::valid_change(Active, Confirmed));
        assert!(Election::valid_change(Active, ExpiredUnconfirmed));
        assert!(Election::valid_change(Confirmed, ExpiredConfirmed));

        assert!(!Election::valid_change(Passive, ExpiredConfirmed));
        assert!(!Election::valid_change(Active, Passive));
        assert!(!Election::valid_change(Confirmed, Active));
        assert!(!Election::valid_change(Confirmed, ExpiredUnconfirmed));
        assert!(!Election::valid_change(ExpiredConfirmed, Confirmed));
        assert!(!Election::valid_change(ExpiredUnconfirmed, Active));
    }

    #[test]
    fn state_change_requires_expected_state() {
        let election = create_election(&test_block(1));
        let mut guard = election.mutex.lock().unwrap();

        assert_eq!(
            guard.state_change(ElectionState::Active, ElectionState::Confirmed),
            Err(())
        );
        assert_eq!(
            guard.state_change(ElectionState::Passive, ElectionState::Confirmed),
            Ok(())
        );
        assert!(guard.is_confirmed());
    }

    #[test]
    fn transition_active() {
        let election = create_election(&test_block(1));
        election.transition_active();
        assert_eq!(election.state(), ElectionState::Active);
        // second call is a no-op
        election.transition_active();
        assert_eq!(election.state(), ElectionState::Active);
    }

    #[test]
    fn replay_detection() {
        let info = VoteInfo::new(100, BlockHash::from(5u64));
        assert!(info.is_replay(99, &BlockHash::from(5u64)));
        assert!(info.is_replay(100, &BlockHash::from(5u64)));
        assert!(info.is_replay(100, &BlockHash::from(4u64)));
        assert!(!info.is_replay(100, &BlockHash::from(6u64)));
        assert!(!info.is_replay(101, &BlockHash::from(1u64)));
    }

    #[test]
    fn cooldown_depends_on_weight_share() {
        let online = Amount::raw(10_000);
        assert_eq!(
            Election::cooldown_time(Amount::raw(501), online),
            Duration::from_secs(1)
        );
        assert_eq!(
            Election::cooldown_time(Amount::raw(101), online),
            Duration::from_secs(5)
        );
        assert_eq!(
            Election::cooldown_time(Amount::raw(100), online),
            Duration::from_secs(15)
        );
    }

    #[test]
    fn time_to_live_by_behavior() {
        let block = test_block(1);
        let normal = create_election(&block);
        let hinted = Election::new(Arc::clone(&block), ElectionBehavior::Hinted, Box::new(|_| {}));
        assert_eq!(normal.time_to_live(), Duration::from_secs(300));
        assert_eq!(hinted.time_to_live(), Duration::from_secs(30));
    }

    #[test]
    fn confirm_req_time_by_behavior() {
        let block = test_block(1);
        let base = Duration::from_millis(25);
        let normal = create_election(&block);
        let optimistic = Election::new(
            Arc::clone(&block),
            ElectionBehavior::Optimistic,
            Box::new(|_| {}),
        );
        assert_eq!(normal.confirm_req_time(base), Duration::from_millis(125));
        assert_eq!(optimistic.confirm_req_time(base), Duration::from_millis(50));
    }

    #[test]
    fn tally_sums_latest_vote_per_representative() {
        let block1 = test_block(1);
        let block2 = test_block(2);
        let election = create_election(&block1);
        let rep1 = Account::from(100u64);
        let rep2 = Account::from(200u64);
        let rep3 = Account::from(300u64);

        let mut guard = election.mutex.lock().unwrap();
        guard.last_blocks.insert(block2.hash(), Arc::clone(&block2));
        guard.last_votes.insert(rep1, VoteInfo::new(1, block1.hash()));
        guard.last_votes.insert(rep2, VoteInfo::new(1, block2.hash()));
        guard.last_votes.insert(rep3, VoteInfo::new(u64::MAX, block2.hash()));

        let weights = HashMap::from([
            (rep1, Amount::raw(50)),
            (rep2, Amount::raw(30)),
            (rep3, Amount::raw(40)),
        ]);
        let tally = guard.tally_impl(|rep| weights.get(rep).copied().unwrap_or_default());

        assert_eq!(
            tally,
            vec![
                (block2.hash(), Amount::raw(70)),
                (block1.hash(), Amount::raw(50))
            ]
        );
        assert_eq!(guard.tally_of(&block1.hash()), Amount::raw(50));
        assert_eq!(guard.final_tally_of(&block2.hash()), Amount::raw(40));
        assert_eq!(guard.final_tally_of(&block1.hash()), Amount::zero());
    }

    #[test]
    fn last_request_elapsed() {
        let election = create_election(&test_block(1));
        let mut guard = election.mutex.lock().unwrap();
        assert_eq!(guard.last_req_elapsed(), None);

        guard.set_last_req();
        MockClock::advance(Duration::from_millis(300));

        assert_eq!(guard.last_req_elapsed(), Some(Duration::from_millis(300)));
    }

    #[test]
    fn update_status_to_confirmed() {
        let block = test_block(1);
        let election = create_election(&block);
        election.confirmation_request_count.store(3, Ordering::SeqCst);
        MockClock::advance(Duration::from_secs(2));

        let mut guard = election.mutex.lock().unwrap();
        guard.update_status_to_confirmed(&election, ElectionStatusType::ActiveConfirmedQuorum);

        assert_eq!(guard.status.confirmation_request_count, 3);
        assert_eq!(guard.status.block_count, 1);
        assert_eq!(guard.status.voter_count, 1);
        assert_eq!(guard.status.election_duration, Duration::from_secs(2));
        assert_eq!(
            guard.status.election_status_type,
            ElectionStatusType::ActiveConfirmedQuorum
        );
    }
}
