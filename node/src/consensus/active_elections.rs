use super::{
    confirmation_solicitor::ConfirmationSolicitor, Election, ElectionBehavior, ElectionData,
    ElectionNetwork, ElectionScheduler, ElectionState, ElectionStatus, ElectionStatusType,
    RecentlyCementedCache, RecentlyConfirmedCache, VoteCache, VoteInfo, VoteWithWeightInfo,
    MAX_BLOCKS, PASSIVE_DURATION_FACTOR,
};
use crate::{
    cementation::ConfirmationHeightProcessor,
    config::{NetworkConstants, NodeConfig},
    representatives::OnlineReps,
    stats::{DetailType, StatType, Stats},
    utils::ThreadPool,
};
use lattice_core::{
    utils::ContainerInfo, Account, Amount, Block, BlockHash, BlockType, QualifiedRoot, Root,
    SavedBlock, Vote, VoteCode, VoteSource,
};
use lattice_ledger::Ledger;
use std::{
    cmp::max,
    collections::HashMap,
    mem::size_of,
    sync::{atomic::Ordering, Arc, Condvar, Mutex, MutexGuard},
    thread::JoinHandle,
    time::{Duration, Instant},
};
use tracing::{debug, trace};

/// Delay between attempts to hand a confirmed block that is not yet in the ledger to cementing
const PROCESS_CONFIRMED_INTERVAL: Duration = Duration::from_millis(50);
const PROCESS_CONFIRMED_MAX_ITERATIONS: u64 = 40;

#[derive(Clone, Debug, PartialEq)]
pub struct ActiveElectionsConfig {
    /// Maximum number of simultaneous active elections (AEC size)
    pub size: usize,
    /// Limit of hinted elections as percentage of `size`
    pub hinted_limit_percentage: usize,
    /// Limit of optimistic elections as percentage of `size`
    pub optimistic_limit_percentage: usize,
    /// Maximum confirmation history size
    pub confirmation_history_size: usize,
    /// Maximum cache size for recently_confirmed
    pub confirmation_cache: usize,
}

impl Default for ActiveElectionsConfig {
    fn default() -> Self {
        Self {
            size: 5000,
            hinted_limit_percentage: 20,
            optimistic_limit_percentage: 10,
            confirmation_history_size: 2048,
            confirmation_cache: 65536,
        }
    }
}

pub type VoteProcessedCallback =
    Box<dyn Fn(&Arc<Vote>, VoteSource, &HashMap<BlockHash, VoteCode>) + Send + Sync>;

pub type ElectionEndCallback = Box<
    dyn Fn(&ElectionStatus, &[VoteWithWeightInfo], Account, Amount, bool, bool) + Send + Sync,
>;

pub type AccountBalanceChangedCallback = Box<dyn Fn(&Account, bool) + Send + Sync>;

pub type ElectionEventCallback = Box<dyn Fn(BlockHash) + Send + Sync>;

/// Asks the local representatives to vote for an election winner. The flag requests a final vote.
pub type VoteGenerationCallback = Box<dyn Fn(&Root, &BlockHash, bool) + Send + Sync>;

#[derive(Default)]
struct Observers {
    election_started: Vec<ElectionEventCallback>,
    election_stopped: Vec<ElectionEventCallback>,
    block_cemented: Vec<ElectionEndCallback>,
    vote_processed: Vec<VoteProcessedCallback>,
    account_balance_changed: Vec<AccountBalanceChangedCallback>,
}

pub struct ActiveElections {
    pub mutex: Mutex<ActiveElectionsData>,
    pub condition: Condvar,
    network: NetworkConstants,
    config: NodeConfig,
    ledger: Arc<Ledger>,
    stats: Arc<Stats>,
    workers: Arc<dyn ThreadPool>,
    pub online_reps: Arc<Mutex<OnlineReps>>,
    pub vote_cache: Arc<Mutex<VoteCache>>,
    processor: Arc<ConfirmationHeightProcessor>,
    election_network: Arc<dyn ElectionNetwork>,
    scheduler: Arc<dyn ElectionScheduler>,
    /// Confirmed elections whose winner has not been cemented yet
    pub election_winner_details: Mutex<HashMap<BlockHash, Arc<Election>>>,
    pub recently_confirmed: Arc<RecentlyConfirmedCache>,
    pub recently_cemented: Arc<RecentlyCementedCache>,
    pub vacancy_update: Mutex<Box<dyn Fn() + Send + Sync>>,
    vote_generation: Mutex<Option<VoteGenerationCallback>>,
    observers: Mutex<Observers>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl ActiveElections {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        network: NetworkConstants,
        config: NodeConfig,
        ledger: Arc<Ledger>,
        stats: Arc<Stats>,
        workers: Arc<dyn ThreadPool>,
        online_reps: Arc<Mutex<OnlineReps>>,
        vote_cache: Arc<Mutex<VoteCache>>,
        processor: Arc<ConfirmationHeightProcessor>,
        election_network: Arc<dyn ElectionNetwork>,
        scheduler: Arc<dyn ElectionScheduler>,
    ) -> Self {
        Self {
            mutex: Mutex::new(ActiveElectionsData {
                roots: OrderedRoots::default(),
                stopped: false,
                normal_count: 0,
                hinted_count: 0,
                optimistic_count: 0,
                blocks: HashMap::new(),
            }),
            condition: Condvar::new(),
            recently_confirmed: Arc::new(RecentlyConfirmedCache::new(
                config.active_elections.confirmation_cache,
            )),
            recently_cemented: Arc::new(RecentlyCementedCache::new(
                config.active_elections.confirmation_history_size,
            )),
            network,
            config,
            ledger,
            stats,
            workers,
            online_reps,
            vote_cache,
            processor,
            election_network,
            scheduler,
            election_winner_details: Mutex::new(HashMap::new()),
            vacancy_update: Mutex::new(Box::new(|| {})),
            vote_generation: Mutex::new(None),
            observers: Mutex::new(Observers::default()),
            thread: Mutex::new(None),
        }
    }

    /*
     * Callbacks
     */
    pub fn on_election_started(&self, callback: ElectionEventCallback) {
        self.observers.lock().unwrap().election_started.push(callback);
    }

    pub fn on_election_stopped(&self, callback: ElectionEventCallback) {
        self.observers.lock().unwrap().election_stopped.push(callback);
    }

    pub fn on_block_cemented(&self, callback: ElectionEndCallback) {
        self.observers.lock().unwrap().block_cemented.push(callback);
    }

    pub fn on_vote_processed(&self, callback: VoteProcessedCallback) {
        self.observers.lock().unwrap().vote_processed.push(callback);
    }

    pub fn on_account_balance_changed(&self, callback: AccountBalanceChangedCallback) {
        self.observers
            .lock()
            .unwrap()
            .account_balance_changed
            .push(callback);
    }

    pub fn set_vacancy_update(&self, callback: Box<dyn Fn() + Send + Sync>) {
        *self.vacancy_update.lock().unwrap() = callback;
    }

    pub fn set_vote_generation(&self, callback: VoteGenerationCallback) {
        *self.vote_generation.lock().unwrap() = Some(callback);
    }

    //--------------------------------------------------------------------------------

    fn notify_observers(
        &self,
        block: &SavedBlock,
        status: &ElectionStatus,
        votes: &[VoteWithWeightInfo],
    ) {
        let account = block.account();
        let amount = {
            let txn = self.ledger.read_txn();
            self.ledger.block_amount(&txn, block).unwrap_or_default()
        };
        let is_state_send = block.block_type() == BlockType::State && block.is_send();
        let is_state_epoch = block.block_type() == BlockType::State && block.is_epoch();

        let observers = self.observers.lock().unwrap();
        for callback in &observers.block_cemented {
            callback(status, votes, account, amount, is_state_send, is_state_epoch);
        }

        if !amount.is_zero() {
            for callback in &observers.account_balance_changed {
                callback(&account, false);
            }
            if block.is_send() {
                if let Some(destination) = block.destination() {
                    for callback in &observers.account_balance_changed {
                        callback(&destination, true);
                    }
                }
            }
        }
    }

    fn notify_election_started(&self, hash: BlockHash) {
        let observers = self.observers.lock().unwrap();
        for callback in &observers.election_started {
            callback(hash);
        }
    }

    fn notify_election_stopped(&self, hash: BlockHash) {
        let observers = self.observers.lock().unwrap();
        for callback in &observers.election_stopped {
            callback(hash);
        }
    }

    /// Maximum number of elections that should be present in this container
    /// NOTE: This is only a soft limit, it is possible for this container to exceed this count
    pub fn limit(&self, behavior: ElectionBehavior) -> usize {
        let config = &self.config.active_elections;
        match behavior {
            ElectionBehavior::Normal => config.size,
            ElectionBehavior::Hinted => config.hinted_limit_percentage * config.size / 100,
            ElectionBehavior::Optimistic => {
                config.optimistic_limit_percentage * config.size / 100
            }
        }
    }

    /// How many election slots are available for specified election type
    pub fn vacancy(&self, behavior: ElectionBehavior) -> i64 {
        let guard = self.mutex.lock().unwrap();
        match behavior {
            ElectionBehavior::Normal => {
                self.limit(ElectionBehavior::Normal) as i64 - guard.roots.len() as i64
            }
            ElectionBehavior::Hinted | ElectionBehavior::Optimistic => {
                self.limit(behavior) as i64 - guard.count_by_behavior(behavior) as i64
            }
        }
    }

    /// Is the block hash a candidate of any active election
    pub fn active(&self, hash: &BlockHash) -> bool {
        self.mutex.lock().unwrap().blocks.contains_key(hash)
    }

    pub fn active_root(&self, root: &QualifiedRoot) -> bool {
        self.mutex.lock().unwrap().roots.get(root).is_some()
    }

    pub fn election(&self, root: &QualifiedRoot) -> Option<Arc<Election>> {
        self.mutex.lock().unwrap().roots.get(root).cloned()
    }

    pub fn len(&self) -> usize {
        self.mutex.lock().unwrap().roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn len_by_behavior(&self, behavior: ElectionBehavior) -> usize {
        self.mutex.lock().unwrap().count_by_behavior(behavior)
    }

    /// Oldest elections first
    pub fn list_active(&self, max: usize) -> Vec<Arc<Election>> {
        let guard = self.mutex.lock().unwrap();
        Self::list_active_impl(max, &guard)
    }

    fn list_active_impl(max: usize, guard: &ActiveElectionsData) -> Vec<Arc<Election>> {
        guard
            .roots
            .iter_sequenced()
            .map(|(_, election)| Arc::clone(election))
            .take(max)
            .collect()
    }

    pub fn erase_root(&self, root: &QualifiedRoot) -> bool {
        let guard = self.mutex.lock().unwrap();
        if let Some(election) = guard.roots.get(root) {
            let election = Arc::clone(election);
            self.cleanup_election(guard, &election);
            true
        } else {
            false
        }
    }

    pub fn erase(&self, block: &Block) -> bool {
        self.erase_root(&block.qualified_root())
    }

    pub fn clear(&self) {
        {
            let mut guard = self.mutex.lock().unwrap();
            guard.blocks.clear();
            guard.roots.clear();
            guard.normal_count = 0;
            guard.hinted_count = 0;
            guard.optimistic_count = 0;
        }
        (self.vacancy_update.lock().unwrap())()
    }

    /// Erase all blocks from active and notify observers about the blocks that lost
    fn cleanup_election(&self, mut guard: MutexGuard<ActiveElectionsData>, election: &Arc<Election>) {
        // Keep track of election count by election type
        let count = guard.count_by_behavior_mut(election.behavior);
        debug_assert!(*count > 0);
        *count = count.saturating_sub(1);

        let (hashes, winner) = {
            let election_guard = election.mutex.lock().unwrap();
            let hashes: Vec<BlockHash> = election_guard.last_blocks.keys().copied().collect();
            (hashes, election_guard.winner_hash())
        };

        for hash in &hashes {
            let erased = guard.blocks.remove(hash);
            debug_assert!(erased.is_some());
        }
        guard.roots.erase(&election.qualified_root);

        let confirmed = election.is_confirmed();
        self.stats
            .inc(self.completion_type(election), election.behavior.into());
        trace!(election = ?election, confirmed, "active stopped");

        drop(guard);

        (self.vacancy_update.lock().unwrap())();

        // Notify observers about dropped elections & blocks lost confirmed elections
        for hash in hashes {
            if !confirmed || hash != winner {
                self.notify_election_stopped(hash);
            }
        }
    }

    fn completion_type(&self, election: &Election) -> StatType {
        let state = election.state();
        if state.is_confirmed() {
            StatType::ActiveElectionsConfirmed
        } else if state == ElectionState::ExpiredUnconfirmed {
            StatType::ActiveElectionsTimeout
        } else {
            StatType::ActiveElectionsDropped
        }
    }

    /// Erases the oldest election of the given behavior. Normal means any election,
    /// because the normal limit bounds the whole container.
    fn erase_oldest_of(&self, behavior: ElectionBehavior) -> bool {
        let guard = self.mutex.lock().unwrap();
        let oldest = match behavior {
            ElectionBehavior::Normal => guard.roots.front().cloned(),
            _ => guard
                .roots
                .iter_sequenced()
                .map(|(_, election)| election)
                .find(|election| election.behavior == behavior)
                .cloned(),
        };
        match oldest {
            Some(election) => {
                self.cleanup_election(guard, &election);
                true
            }
            None => false,
        }
    }

    /// Erase elections if we're over capacity
    pub fn trim(&self) {
        /*
         * Well behaved schedulers check for vacancy before inserting new elections.
         * The container may still be temporarily overfilled by bursts, so each behavior
         * is allowed to grow to 125% of its limit before its oldest elections are erased.
         */
        for behavior in [
            ElectionBehavior::Normal,
            ElectionBehavior::Hinted,
            ElectionBehavior::Optimistic,
        ] {
            while self.vacancy(behavior) < -(self.limit(behavior) as i64 / 4) {
                self.stats
                    .inc(StatType::ActiveElections, DetailType::EraseOldest);
                if !self.erase_oldest_of(behavior) {
                    break;
                }
            }
        }
    }

    pub fn remove_election_winner_details(&self, hash: &BlockHash) -> Option<Arc<Election>> {
        self.election_winner_details.lock().unwrap().remove(hash)
    }

    pub fn election_winner_details_len(&self) -> usize {
        self.election_winner_details.lock().unwrap().len()
    }

    pub fn block_already_cemented_callback(&self, hash: &BlockHash) {
        // Depending on timing there is a situation where the election_winner_details is not reset.
        // This can happen when a block wins an election, and the block is confirmed + observer
        // called before the block hash gets added to election_winner_details. If the block is confirmed
        // callbacks have already been done, so we can safely just remove it.
        self.remove_election_winner_details(hash);
    }

    fn tally(&self, guard: &mut ElectionData) -> Vec<(BlockHash, Amount)> {
        guard.tally_impl(|rep| self.ledger.weight(&rep.into()))
    }

    /// Votes of all representatives except the dummy vote, heaviest first
    pub fn votes_with_weight(&self, election: &Election) -> Vec<VoteWithWeightInfo> {
        let guard = election.mutex.lock().unwrap();
        let mut result: Vec<VoteWithWeightInfo> = guard
            .last_votes
            .iter()
            .filter(|(representative, _)| !representative.is_zero())
            .map(|(representative, info)| VoteWithWeightInfo {
                representative: *representative,
                timestamp: info.timestamp,
                hash: info.hash,
                weight: self.ledger.weight(&representative.into()),
            })
            .collect();
        result.sort_by(|a, b| {
            b.weight
                .cmp(&a.weight)
                .then(a.representative.cmp(&b.representative))
        });
        result
    }

    fn remove_block(election_guard: &mut ElectionData, hash: &BlockHash) {
        if election_guard.winner_hash() != *hash
            && election_guard.last_blocks.remove(hash).is_some()
        {
            election_guard.last_votes.retain(|_, vote| vote.hash != *hash);
        }
    }

    /// Make room for `hash` in a full election by removing the candidate with the lowest tally.
    /// The winner is never removed.
    fn replace_by_weight<'a>(
        &self,
        election: &'a Election,
        election_guard: MutexGuard<'a, ElectionData>,
        hash: &BlockHash,
    ) -> (bool, MutexGuard<'a, ElectionData>) {
        let winner_hash = election_guard.winner_hash();
        let mut sorted: Vec<(BlockHash, Amount)> = election_guard
            .last_tally
            .iter()
            .map(|(hash, amount)| (*hash, *amount))
            .collect();
        drop(election_guard);

        // Sort in ascending order
        sorted.sort_by(|a, b| a.1.cmp(&b.1).then(a.0.cmp(&b.0)));

        // Replace if lowest tally is below inactive cache new block weight
        let inactive_tally = self.vote_cache.lock().unwrap().tally(hash);

        let mut replaced_block = None;
        if !inactive_tally.is_zero() {
            if sorted.len() < MAX_BLOCKS {
                // If count of tally items is less than 10, remove any block without tally
                let guard = election.mutex.lock().unwrap();
                replaced_block = guard
                    .last_blocks
                    .keys()
                    .find(|candidate| {
                        **candidate != winner_hash
                            && !sorted.iter().any(|(tallied, _)| tallied == *candidate)
                    })
                    .copied();
            } else if inactive_tally > sorted[0].1 {
                if sorted[0].0 != winner_hash {
                    replaced_block = Some(sorted[0].0);
                } else if sorted.len() > 1 && inactive_tally > sorted[1].1 {
                    // Avoid removing winner
                    replaced_block = Some(sorted[1].0);
                }
            }
        }

        match replaced_block {
            Some(replaced) => {
                self.mutex.lock().unwrap().blocks.remove(&replaced);
                let mut guard = election.mutex.lock().unwrap();
                Self::remove_block(&mut guard, &replaced);
                self.stats
                    .inc(StatType::ActiveElections, DetailType::Replaced);
                trace!(qualified_root = ?election.qualified_root, %replaced, new = %hash, "candidate replaced");
                (true, guard)
            }
            None => (false, election.mutex.lock().unwrap()),
        }
    }

    /// Adds a fork candidate to the election.
    /// Returns true if the block was NOT added: the election is over, it is full and the
    /// block has too little cached weight to replace a candidate, or it already is a candidate.
    pub fn publish(&self, block: &Arc<Block>, election: &Election) -> bool {
        let hash = block.hash();
        let mut election_guard = election.mutex.lock().unwrap();

        // Do not insert new blocks if already confirmed
        let mut result = election_guard.is_confirmed()
            || election_guard.state == ElectionState::ExpiredUnconfirmed;
        if !result
            && election_guard.last_blocks.len() >= MAX_BLOCKS
            && !election_guard.last_blocks.contains_key(&hash)
        {
            let (replaced, guard) = self.replace_by_weight(election, election_guard, &hash);
            election_guard = guard;
            if !replaced {
                result = true;
            }
        }

        if !result {
            if election_guard.last_blocks.contains_key(&hash) {
                result = true;
                election_guard.last_blocks.insert(hash, Arc::clone(block));
                if election_guard.winner_hash() == hash {
                    election_guard.status.winner = Some(Arc::clone(block));
                    self.election_network.flood_block(block);
                }
            } else {
                election_guard.last_blocks.insert(hash, Arc::clone(block));
            }
        }
        result
    }

    /// Request a vote for the current winner from the local representatives.
    /// A final vote is requested once the election reached quorum.
    fn broadcast_vote(&self, election: &Election, election_guard: &mut ElectionData) {
        let due = election_guard
            .last_vote_elapsed()
            .map(|elapsed| elapsed >= self.network.vote_broadcast_interval)
            .unwrap_or(true);
        if !due {
            return;
        }
        election_guard.set_last_vote();

        let generator = self.vote_generation.lock().unwrap();
        if let Some(generate) = generator.as_ref() {
            self.stats
                .inc(StatType::Election, DetailType::BroadcastVote);
            let is_final =
                election_guard.is_confirmed() || election.is_quorum.load(Ordering::SeqCst);
            let winner = election_guard.winner_hash();
            trace!(qualified_root = ?election.qualified_root, %winner, is_final, "broadcast vote");
            generate(&election.root, &winner, is_final);
        }
    }

    fn broadcast_block_predicate(&self, election_guard: &ElectionData) -> bool {
        match election_guard.last_block_elapsed() {
            // First broadcast
            None => true,
            Some(elapsed) if elapsed > self.network.block_broadcast_interval => true,
            // Or the current election winner has changed
            Some(_) => election_guard.winner_hash() != election_guard.last_block_hash,
        }
    }

    fn broadcast_block(
        &self,
        solicitor: &mut ConfirmationSolicitor,
        election_guard: &mut MutexGuard<ElectionData>,
    ) {
        if self.broadcast_block_predicate(election_guard) && solicitor.broadcast(election_guard).is_ok()
        {
            let detail = if election_guard.last_block_hash.is_zero() {
                DetailType::BroadcastBlockInitial
            } else {
                DetailType::BroadcastBlockRepeat
            };
            self.stats.inc(StatType::Election, detail);
            election_guard.set_last_block();
            election_guard.last_block_hash = election_guard.winner_hash();
        }
    }

    fn send_confirm_req(
        &self,
        solicitor: &mut ConfirmationSolicitor,
        election: &Election,
        election_guard: &mut MutexGuard<ElectionData>,
    ) {
        let confirm_req_time = election.confirm_req_time(self.network.base_latency);
        let due = election_guard
            .last_req_elapsed()
            .map(|elapsed| elapsed > confirm_req_time)
            .unwrap_or(true);
        if due && !solicitor.add(election, election_guard) {
            election_guard.set_last_req();
            election
                .confirmation_request_count
                .fetch_add(1, Ordering::SeqCst);
            self.stats
                .inc(StatType::Election, DetailType::ConfirmationRequest);
        }
    }

    /// Periodic heartbeat of a single election. Returns true if the election should be erased.
    fn transition_time(
        &self,
        solicitor: &mut ConfirmationSolicitor,
        election: &Arc<Election>,
    ) -> bool {
        let mut guard = election.mutex.lock().unwrap();
        let mut result = false;
        match guard.state {
            ElectionState::Passive => {
                if self.network.base_latency * PASSIVE_DURATION_FACTOR
                    < election.election_start.elapsed()
                {
                    let _ = guard.state_change(ElectionState::Passive, ElectionState::Active);
                }
            }
            ElectionState::Active => {
                self.broadcast_vote(election, &mut guard);
                self.broadcast_block(solicitor, &mut guard);
                self.send_confirm_req(solicitor, election, &mut guard);
            }
            ElectionState::Confirmed => {
                result = true; // Return true to indicate this election should be cleaned up
                self.broadcast_block(solicitor, &mut guard); // Ensure election winner is broadcasted
                let _ = guard.state_change(ElectionState::Confirmed, ElectionState::ExpiredConfirmed);
            }
            ElectionState::ExpiredConfirmed | ElectionState::ExpiredUnconfirmed => {
                result = true;
            }
        }

        if !guard.is_confirmed() && election.time_to_live() < election.election_start.elapsed() {
            // It is possible the election confirmed while acquiring the mutex
            // state_change returning Ok would indicate it
            let state = guard.state;
            if guard
                .state_change(state, ElectionState::ExpiredUnconfirmed)
                .is_ok()
            {
                trace!(qualified_root = ?election.qualified_root, "election expired");
                result = true; // Return true to indicate this election should be cleaned up
                guard.status.election_status_type = ElectionStatusType::Stopped;
            }
        }

        result
    }

    /// One pass over all elections. Network solicitation happens without holding the container lock.
    pub fn request_confirm<'a>(
        &'a self,
        guard: MutexGuard<'a, ActiveElectionsData>,
    ) -> MutexGuard<'a, ActiveElectionsData> {
        let this_loop_target = guard.roots.len();
        let elections = Self::list_active_impl(this_loop_target, &guard);
        drop(guard);

        let mut solicitor =
            ConfirmationSolicitor::new(&self.network, Arc::clone(&self.election_network));
        let representatives = self.online_reps.lock().unwrap().list();
        solicitor.prepare(&representatives);

        /*
         * Loop through active elections in insertion order, requesting confirmation.
         * Elections that are confirmed, expired or dropped are erased.
         */
        for election in elections {
            if self.transition_time(&mut solicitor, &election) {
                self.erase_root(&election.qualified_root);
            }
        }

        solicitor.flush();
        self.mutex.lock().unwrap()
    }

    fn request_loop(&self) {
        let mut guard = self.mutex.lock().unwrap();
        while !guard.stopped {
            let stamp = Instant::now();
            self.stats.inc(StatType::ActiveElections, DetailType::Loop);

            guard = self.request_confirm(guard);
            drop(guard);

            self.vote_cache.lock().unwrap().cleanup();

            guard = self.mutex.lock().unwrap();
            if !guard.stopped {
                let loop_interval = self.network.aec_loop_interval;
                let min_sleep = loop_interval / 2;
                let wait_duration = max(
                    min_sleep,
                    (stamp + loop_interval).saturating_duration_since(Instant::now()),
                );
                guard = self
                    .condition
                    .wait_timeout_while(guard, wait_duration, |data| !data.stopped)
                    .unwrap()
                    .0;
            }
        }
    }

    pub fn stop(&self) {
        self.mutex.lock().unwrap().stopped = true;
        self.condition.notify_all();
        let handle = self.thread.lock().unwrap().take();
        if let Some(handle) = handle {
            handle.join().unwrap();
        }
        self.clear();
    }

    fn activate_successors(&self, block: &SavedBlock) {
        let account = block.account();
        self.scheduler.activate(&account);

        // Start or vote for the next unconfirmed block in the destination account
        if block.is_send() {
            if let Some(destination) = block.destination() {
                if !destination.is_zero() && destination != account {
                    self.scheduler.activate(&destination);
                }
            }
        }
    }

    pub fn container_info(&self) -> ContainerInfo {
        let winner_details = self.election_winner_details_len();
        let guard = self.mutex.lock().unwrap();
        ContainerInfo::builder()
            .leaf("roots", guard.roots.len(), OrderedRoots::ELEMENT_SIZE)
            .leaf(
                "blocks",
                guard.blocks.len(),
                size_of::<BlockHash>() + size_of::<Arc<Election>>(),
            )
            .leaf(
                "election_winner_details",
                winner_details,
                size_of::<BlockHash>() + size_of::<Arc<Election>>(),
            )
            .leaf("normal", guard.normal_count, 0)
            .leaf("hinted", guard.hinted_count, 0)
            .leaf("optimistic", guard.optimistic_count, 0)
            .node("recently_confirmed", self.recently_confirmed.container_info())
            .node("recently_cemented", self.recently_cemented.container_info())
            .finish()
    }
}

impl Drop for ActiveElections {
    fn drop(&mut self) {
        // Thread must be stopped before destruction
        debug_assert!(self.thread.lock().unwrap().is_none());
    }
}

pub struct ActiveElectionsData {
    pub roots: OrderedRoots,
    pub stopped: bool,
    pub normal_count: usize,
    pub hinted_count: usize,
    pub optimistic_count: usize,
    pub blocks: HashMap<BlockHash, Arc<Election>>,
}

impl ActiveElectionsData {
    pub fn count_by_behavior(&self, behavior: ElectionBehavior) -> usize {
        match behavior {
            ElectionBehavior::Normal => self.normal_count,
            ElectionBehavior::Hinted => self.hinted_count,
            ElectionBehavior::Optimistic => self.optimistic_count,
        }
    }

    pub fn count_by_behavior_mut(&mut self, behavior: ElectionBehavior) -> &mut usize {
        match behavior {
            ElectionBehavior::Normal => &mut self.normal_count,
            ElectionBehavior::Hinted => &mut self.hinted_count,
            ElectionBehavior::Optimistic => &mut self.optimistic_count,
        }
    }
}

/// Elections by root, iterable in insertion order
#[derive(Default)]
pub struct OrderedRoots {
    by_root: HashMap<QualifiedRoot, Arc<Election>>,
    sequenced: Vec<QualifiedRoot>,
}

impl OrderedRoots {
    pub const ELEMENT_SIZE: usize = size_of::<QualifiedRoot>() * 2 + size_of::<Arc<Election>>();

    pub fn insert(&mut self, root: QualifiedRoot, election: Arc<Election>) {
        if self.by_root.insert(root, election).is_none() {
            self.sequenced.push(root);
        }
    }

    pub fn get(&self, root: &QualifiedRoot) -> Option<&Arc<Election>> {
        self.by_root.get(root)
    }

    /// The oldest election
    pub fn front(&self) -> Option<&Arc<Election>> {
        self.sequenced.first().and_then(|root| self.by_root.get(root))
    }

    pub fn erase(&mut self, root: &QualifiedRoot) {
        if self.by_root.remove(root).is_some() {
            self.sequenced.retain(|x| x != root)
        }
    }

    pub fn clear(&mut self) {
        self.sequenced.clear();
        self.by_root.clear();
    }

    pub fn len(&self) -> usize {
        self.sequenced.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequenced.is_empty()
    }

    pub fn iter_sequenced(&self) -> impl Iterator<Item = (&QualifiedRoot, &Arc<Election>)> {
        self.sequenced
            .iter()
            .filter_map(|root| self.by_root.get(root).map(|election| (root, election)))
    }
}

pub trait ActiveElectionsExt {
    fn start(&self);
    /// Confirm this block if quorum is met
    fn confirm_if_quorum(&self, election_lock: MutexGuard<ElectionData>, election: &Arc<Election>);
    fn confirm_once(&self, election_lock: MutexGuard<ElectionData>, election: &Arc<Election>);
    fn process_confirmed(&self, status: ElectionStatus, iteration: u64);
    fn force_confirm(&self, election: &Arc<Election>);
    fn try_confirm(&self, election: &Arc<Election>, hash: &BlockHash);
    /// Distinguishes replay votes, cannot be determined if the block is not in any election
    fn vote(&self, vote: &Arc<Vote>, source: VoteSource) -> HashMap<BlockHash, VoteCode>;
    fn vote2(
        &self,
        election: &Arc<Election>,
        rep: &Account,
        timestamp: u64,
        block_hash: &BlockHash,
        vote_source: VoteSource,
    ) -> VoteCode;
    fn block_cemented_callback(&self, block: &SavedBlock);
    fn trigger_vote_cache(&self, hash: &BlockHash) -> bool;
    fn publish_block(&self, block: &Arc<Block>) -> bool;
    fn insert(
        &self,
        block: &Arc<Block>,
        election_behavior: ElectionBehavior,
    ) -> (bool, Option<Arc<Election>>);
}

impl ActiveElectionsExt for Arc<ActiveElections> {
    fn start(&self) {
        debug_assert!(self.thread.lock().unwrap().is_none());
        let self_l = Arc::clone(self);
        *self.thread.lock().unwrap() = Some(
            std::thread::Builder::new()
                .name("Request loop".to_string())
                .spawn(move || {
                    self_l.request_loop();
                })
                .unwrap(),
        );
    }

    fn force_confirm(&self, election: &Arc<Election>) {
        assert!(self.network.is_dev);
        let guard = election.mutex.lock().unwrap();
        self.confirm_once(guard, election);
    }

    fn confirm_if_quorum(
        &self,
        mut election_lock: MutexGuard<ElectionData>,
        election: &Arc<Election>,
    ) {
        let tally = self.tally(&mut election_lock);
        let Some(&(top_hash, top_weight)) = tally.first() else {
            return;
        };

        let previous_winner = election_lock.winner_hash();
        if top_hash != previous_winner && top_weight > election_lock.tally_of(&previous_winner) {
            if let Some(block) = election_lock.last_blocks.get(&top_hash).cloned() {
                election_lock.status.winner = Some(block);
                debug!(qualified_root = ?election.qualified_root, winner = %top_hash, previous = %previous_winner, "election winner changed");
            }
        }

        let winner_hash = election_lock.winner_hash();
        let winner_tally = election_lock.tally_of(&winner_hash);
        election_lock.status.tally = winner_tally;
        election_lock.status.final_tally = election_lock.final_tally_of(&winner_hash);
        election_lock.final_weight = election_lock.status.final_tally;

        let quorum_delta = self.online_reps.lock().unwrap().quorum_delta();
        if !winner_tally.is_zero() && winner_tally >= quorum_delta {
            if !election.is_quorum.swap(true, Ordering::SeqCst) {
                self.broadcast_final_vote(election, &winner_hash);
            }
            self.confirm_once(election_lock, election);
        }
    }

    fn confirm_once(&self, mut election_lock: MutexGuard<ElectionData>, election: &Arc<Election>) {
        // This must be kept above the setting of election state, as dependent confirmed elections require up to date changes to election_winner_details
        let mut winners_guard = self.election_winner_details.lock().unwrap();
        let winner_hash = election_lock.winner_hash();
        let just_confirmed = election_lock.state != ElectionState::Confirmed;
        election_lock.state = ElectionState::Confirmed;
        if just_confirmed && !winners_guard.contains_key(&winner_hash) {
            winners_guard.insert(winner_hash, Arc::clone(election));
            drop(winners_guard);

            election_lock
                .update_status_to_confirmed(election, ElectionStatusType::ActiveConfirmedQuorum);
            let status = election_lock.status.clone();

            self.recently_confirmed
                .put(election.qualified_root, winner_hash);

            self.stats.inc(StatType::Election, DetailType::ConfirmOnce);
            trace!(
                qualified_root = ?election.qualified_root,
                winner = %winner_hash,
                "election confirmed"
            );
            drop(election_lock);

            let self_l = Arc::clone(self);
            self.workers.push_task(Box::new(move || {
                self_l.process_confirmed(status, 0);
            }));
        } else {
            self.stats
                .inc(StatType::Election, DetailType::ConfirmOnceFailed);
        }
    }

    fn process_confirmed(&self, status: ElectionStatus, mut iteration: u64) {
        let hash = status.winner_hash();
        let exists = {
            let txn = self.ledger.read_txn();
            self.ledger.block_exists(&txn, &hash)
        };
        if exists {
            trace!(%hash, "process confirmed");
            self.processor.add(hash);
        } else if iteration < PROCESS_CONFIRMED_MAX_ITERATIONS {
            iteration += 1;
            let self_w = Arc::downgrade(self);
            self.workers.add_delayed_task(
                PROCESS_CONFIRMED_INTERVAL,
                Box::new(move || {
                    if let Some(self_l) = self_w.upgrade() {
                        self_l.process_confirmed(status, iteration);
                    }
                }),
            );
        } else {
            // Do some cleanup due to this block never being processed by confirmation height processor
            debug!(%hash, "confirmed block never arrived in the ledger");
            self.remove_election_winner_details(&hash);
        }
    }

    fn try_confirm(&self, election: &Arc<Election>, hash: &BlockHash) {
        let guard = election.mutex.lock().unwrap();
        if guard.winner_hash() == *hash && !guard.is_confirmed() {
            self.confirm_once(guard, election);
        }
    }

    fn vote(&self, vote: &Arc<Vote>, source: VoteSource) -> HashMap<BlockHash, VoteCode> {
        let mut results = HashMap::new();
        let mut process = HashMap::new();
        {
            let guard = self.mutex.lock().unwrap();
            for hash in &vote.hashes {
                // Ignore duplicate hashes (should not happen with a well-behaved voting node)
                if results.contains_key(hash) || process.contains_key(hash) {
                    continue;
                }

                if let Some(existing) = guard.blocks.get(hash) {
                    process.insert(*hash, Arc::clone(existing));
                } else if self.recently_confirmed.hash_exists(hash) {
                    results.insert(*hash, VoteCode::Replay);
                } else {
                    results.insert(*hash, VoteCode::Indeterminate);
                }
            }
        }

        for (block_hash, election) in process {
            let vote_result = self.vote2(
                &election,
                &vote.voting_account,
                vote.timestamp,
                &block_hash,
                source,
            );
            results.insert(block_hash, vote_result);
        }

        for code in results.values() {
            self.stats.inc(StatType::ElectionVote, (*code).into());
        }

        // Live votes for unknown or active hashes are kept in case an election starts or restarts later
        if source == VoteSource::Live {
            let weight = self.ledger.weight(&vote.voting_account.into());
            self.vote_cache
                .lock()
                .unwrap()
                .insert(vote, weight, &results);
        }

        let observers = self.observers.lock().unwrap();
        for callback in &observers.vote_processed {
            callback(vote, source, &results);
        }

        results
    }

    fn vote2(
        &self,
        election: &Arc<Election>,
        rep: &Account,
        timestamp: u64,
        block_hash: &BlockHash,
        vote_source: VoteSource,
    ) -> VoteCode {
        let weight = self.ledger.weight(&rep.into());
        let mut guard = election.mutex.lock().unwrap();

        if let Some(last_vote) = guard.last_votes.get(rep) {
            if last_vote.is_replay(timestamp, block_hash) {
                return VoteCode::Replay;
            }

            let max_vote = timestamp == u64::MAX && last_vote.timestamp < timestamp;

            let mut past_cooldown = true;
            // Only cooldown live votes
            if vote_source == VoteSource::Live {
                let trended = self.online_reps.lock().unwrap().trended();
                let cooldown = Election::cooldown_time(weight, trended);
                past_cooldown = last_vote.time.elapsed() >= cooldown;
            }

            if !max_vote && !past_cooldown {
                return VoteCode::Ignored;
            }
        }
        guard
            .last_votes
            .insert(*rep, VoteInfo::new(timestamp, *block_hash));

        if vote_source == VoteSource::Live {
            election.live_vote_action(*rep);
        }

        self.stats.inc(
            StatType::Election,
            if vote_source == VoteSource::Live {
                DetailType::VoteNew
            } else {
                DetailType::VoteCached
            },
        );
        trace!(
            qualified_root = ?election.qualified_root,
            account = %rep,
            hash = %block_hash,
            timestamp,
            vote_source = vote_source.as_str(),
            %weight,
            "vote processed");

        if !guard.is_confirmed() {
            self.confirm_if_quorum(guard, election);
        }
        VoteCode::Vote
    }

    fn block_cemented_callback(&self, block: &SavedBlock) {
        let hash = block.hash();
        if let Some(election) = self.election(&block.qualified_root()) {
            self.try_confirm(&election, &hash);
        }

        let election = self.remove_election_winner_details(&hash);
        let (mut status, votes) = match &election {
            Some(election) => {
                let status = election.mutex.lock().unwrap().status.clone();
                (status, self.votes_with_weight(election))
            }
            None => (
                ElectionStatus {
                    winner: Some(Arc::new(Block::clone(block))),
                    ..Default::default()
                },
                Vec::new(),
            ),
        };

        status.election_status_type = if self.processor.is_processing_block(&hash) {
            ElectionStatusType::ActiveConfirmedQuorum
        } else if election.is_some() {
            ElectionStatusType::ActiveConfirmationHeight
        } else {
            ElectionStatusType::InactiveConfirmationHeight
        };

        // Only blocks decided by an election are part of the confirmation history
        if election.is_some() {
            self.recently_cemented.put(status.clone());
        }
        self.stats.inc(
            StatType::ConfirmationObserver,
            status.election_status_type.into(),
        );

        self.notify_observers(block, &status, &votes);

        // Successors are only activated for blocks with previously active elections,
        // and not while the node is still catching up with the network
        let was_active = matches!(
            status.election_status_type,
            ElectionStatusType::ActiveConfirmedQuorum
                | ElectionStatusType::ActiveConfirmationHeight
        );
        if self.ledger.cemented_bootstrap_count_reached() && was_active {
            self.activate_successors(block);
        }
    }

    fn trigger_vote_cache(&self, hash: &BlockHash) -> bool {
        let cached = self.vote_cache.lock().unwrap().find(hash);
        for cached_vote in &cached {
            self.vote(cached_vote, VoteSource::Cache);
        }
        !cached.is_empty()
    }

    fn publish_block(&self, block: &Arc<Block>) -> bool {
        let root = block.qualified_root();
        let Some(election) = self.election(&root) else {
            return true;
        };

        let result = self.publish(block, &election);
        if !result {
            self.mutex
                .lock()
                .unwrap()
                .blocks
                .insert(block.hash(), election);

            self.trigger_vote_cache(&block.hash());

            self.stats
                .inc(StatType::ActiveElections, DetailType::ElectionBlockConflict);
            debug!(hash = %block.hash(), qualified_root = ?root, "fork added to election");
        }
        result
    }

    fn insert(
        &self,
        block: &Arc<Block>,
        election_behavior: ElectionBehavior,
    ) -> (bool, Option<Arc<Election>>) {
        let mut guard = self.mutex.lock().unwrap();
        if guard.stopped {
            return (false, None);
        }

        let root = block.qualified_root();
        let hash = block.hash();
        let mut inserted = false;
        let existing = guard.roots.get(&root).cloned();
        let election = match existing {
            Some(existing) => Some(existing),
            // A late duplicate of an election that has just been confirmed
            None if self.recently_confirmed.exists(&root) => None,
            None => {
                inserted = true;
                let online_reps = Arc::clone(&self.online_reps);
                // Representative is defined as online if replying to live votes
                let observe_rep = Box::new(move |rep: Account| {
                    online_reps.lock().unwrap().observe(rep);
                });
                let election = Arc::new(Election::new(
                    Arc::clone(block),
                    election_behavior,
                    observe_rep,
                ));
                guard.roots.insert(root, Arc::clone(&election));
                guard.blocks.insert(hash, Arc::clone(&election));
                *guard.count_by_behavior_mut(election_behavior) += 1;

                self.stats
                    .inc(StatType::ActiveElectionsStarted, election_behavior.into());
                trace!(
                    behavior = election_behavior.as_str(),
                    election = ?election,
                    "active started"
                );
                Some(election)
            }
        };
        drop(guard);

        if inserted {
            self.trigger_vote_cache(&hash);
            self.notify_election_started(hash);
            (self.vacancy_update.lock().unwrap())();
        }

        // Votes are generated for inserted or ongoing elections
        if let Some(election) = &election {
            let mut election_guard = election.mutex.lock().unwrap();
            self.broadcast_vote(election, &mut election_guard);
        }

        self.trim();
        (inserted, election)
    }
}

impl ActiveElections {
    fn broadcast_final_vote(&self, election: &Election, winner: &BlockHash) {
        let generator = self.vote_generation.lock().unwrap();
        if let Some(generate) = generator.as_ref() {
            self.stats
                .inc(StatType::Election, DetailType::BroadcastVote);
            trace!(qualified_root = ?election.qualified_root, %winner, "broadcast final vote");
            generate(&election.root, winner, true);
        }
    }
}
