use crate::stats::{DetailType, StatType, Stats};
use lattice_core::{utils::ContainerInfo, Account, Amount, BlockHash, Vote, VoteCode};
#[cfg(test)]
use mock_instant::thread_local::Instant;
#[cfg(not(test))]
use std::time::Instant;
use std::{
    collections::{HashMap, VecDeque},
    mem::size_of,
    sync::Arc,
    time::Duration,
};

#[derive(Clone, Debug, PartialEq)]
pub struct VoteCacheConfig {
    pub max_size: usize,
    pub max_voters: usize,
    pub age_cutoff: Duration,
}

impl Default for VoteCacheConfig {
    fn default() -> Self {
        Self {
            max_size: 1024 * 64,
            max_voters: 64,
            age_cutoff: Duration::from_secs(15 * 60),
        }
    }
}

/// Live votes for hashes that have no election yet, or whose election may be dropped and restarted.
/// Replayed into an election when it starts.
pub struct VoteCache {
    config: VoteCacheConfig,
    entries: HashMap<BlockHash, CachedVotes>,
    /// Hashes in the order their entry was created
    arrival: VecDeque<BlockHash>,
    last_cleanup: Instant,
    stats: Arc<Stats>,
}

impl VoteCache {
    pub fn new(config: VoteCacheConfig, stats: Arc<Stats>) -> Self {
        Self {
            config,
            entries: HashMap::new(),
            arrival: VecDeque::new(),
            last_cleanup: Instant::now(),
            stats,
        }
    }

    /// Caches `vote` for every hash the election manager could not settle.
    /// An empty `results` map caches all hashes of the vote.
    pub fn insert(
        &mut self,
        vote: &Arc<Vote>,
        rep_weight: Amount,
        results: &HashMap<BlockHash, VoteCode>,
    ) {
        let hashes = vote.hashes.iter().filter(|hash| {
            results.is_empty()
                || matches!(
                    results.get(hash),
                    Some(VoteCode::Vote | VoteCode::Indeterminate)
                )
        });
        for hash in hashes {
            self.cache_for(*hash, vote, rep_weight);
        }
    }

    fn cache_for(&mut self, hash: BlockHash, vote: &Arc<Vote>, rep_weight: Amount) {
        let max_voters = self.config.max_voters;
        if let Some(entry) = self.entries.get_mut(&hash) {
            self.stats.inc(StatType::VoteCache, DetailType::Update);
            entry.add(vote, rep_weight, max_voters);
            return;
        }

        self.stats.inc(StatType::VoteCache, DetailType::Insert);
        let mut entry = CachedVotes::new();
        entry.add(vote, rep_weight, max_voters);
        self.entries.insert(hash, entry);
        self.arrival.push_back(hash);

        while self.entries.len() > self.config.max_size {
            let Some(oldest) = self.arrival.pop_front() else {
                break;
            };
            self.entries.remove(&oldest);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cached votes for `hash`, empty if there are none
    pub fn find(&self, hash: &BlockHash) -> Vec<Arc<Vote>> {
        self.entries
            .get(hash)
            .map(|entry| entry.votes())
            .unwrap_or_default()
    }

    pub fn erase(&mut self, hash: &BlockHash) -> bool {
        if self.entries.remove(hash).is_some() {
            self.arrival.retain(|h| h != hash);
            true
        } else {
            false
        }
    }

    /// Sum of the weights of the cached voters for `hash`
    pub fn tally(&self, hash: &BlockHash) -> Amount {
        self.entries
            .get(hash)
            .map(|entry| entry.tally())
            .unwrap_or_default()
    }

    /// Drops entries without a new vote for `age_cutoff`. Does nothing if the last
    /// cleanup happened less than `age_cutoff / 2` ago.
    pub fn cleanup(&mut self) {
        if self.last_cleanup.elapsed() < self.config.age_cutoff / 2 {
            return;
        }
        self.last_cleanup = Instant::now();
        self.stats.inc(StatType::VoteCache, DetailType::Cleanup);

        let cutoff = self.config.age_cutoff;
        self.entries
            .retain(|_, entry| entry.last_vote.elapsed() < cutoff);
        let entries = &self.entries;
        self.arrival.retain(|hash| entries.contains_key(hash));
    }

    pub fn container_info(&self) -> ContainerInfo {
        [(
            "cache",
            self.entries.len(),
            size_of::<BlockHash>() * 2 + size_of::<CachedVotes>(),
        )]
        .into()
    }
}

struct CachedVoter {
    weight: Amount,
    vote: Arc<Vote>,
}

/// Votes for one hash, at most one per representative
struct CachedVotes {
    voters: HashMap<Account, CachedVoter>,
    last_vote: Instant,
}

impl CachedVotes {
    fn new() -> Self {
        Self {
            voters: HashMap::new(),
            last_vote: Instant::now(),
        }
    }

    /// A full entry only admits a representative heavier than its lightest voter,
    /// which is then evicted.
    fn add(&mut self, vote: &Arc<Vote>, rep_weight: Amount, max_voters: usize) {
        let rep = vote.voting_account;
        if let Some(existing) = self.voters.get_mut(&rep) {
            if vote.timestamp > existing.vote.timestamp {
                existing.vote = Arc::clone(vote);
                existing.weight = rep_weight;
                self.last_vote = Instant::now();
            }
            return;
        }

        if self.voters.len() >= max_voters {
            let lightest = self
                .voters
                .iter()
                .min_by_key(|(_, voter)| voter.weight)
                .map(|(account, voter)| (*account, voter.weight));
            match lightest {
                Some((account, weight)) if rep_weight > weight => {
                    self.voters.remove(&account);
                }
                _ => return,
            }
        }

        self.voters.insert(
            rep,
            CachedVoter {
                weight: rep_weight,
                vote: Arc::clone(vote),
            },
        );
        self.last_vote = Instant::now();
    }

    fn tally(&self) -> Amount {
        self.voters.values().map(|voter| voter.weight).sum()
    }

    fn votes(&self) -> Vec<Arc<Vote>> {
        self.voters
            .values()
            .map(|voter| Arc::clone(&voter.vote))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::Direction;
    use mock_instant::thread_local::MockClock;

    const HASH: BlockHash = BlockHash::from_bytes([1; 32]);

    fn create_cache(max_size: usize, max_voters: usize) -> (VoteCache, Arc<Stats>) {
        let stats = Arc::new(Stats::new(Default::default()));
        let config = VoteCacheConfig {
            max_size,
            max_voters,
            age_cutoff: Duration::from_secs(5 * 60),
        };
        (VoteCache::new(config, Arc::clone(&stats)), stats)
    }

    fn vote(rep: u64, timestamp: u64, hash: BlockHash) -> Arc<Vote> {
        Arc::new(Vote::new(Account::from(rep), timestamp, vec![hash]))
    }

    fn cache_vote(cache: &mut VoteCache, rep: u64, weight: u128, hash: BlockHash) {
        cache.insert(&vote(rep, 1, hash), Amount::raw(weight), &HashMap::new());
    }

    fn voters(cache: &VoteCache, hash: &BlockHash) -> Vec<Account> {
        let mut reps: Vec<_> = cache
            .find(hash)
            .iter()
            .map(|vote| vote.voting_account)
            .collect();
        reps.sort();
        reps
    }

    #[test]
    fn unknown_hash_has_no_votes() {
        let (cache, _) = create_cache(10, 10);
        assert!(cache.is_empty());
        assert!(cache.find(&HASH).is_empty());
        assert_eq!(cache.tally(&HASH), Amount::zero());
    }

    #[test]
    fn votes_for_one_hash_share_an_entry() {
        let (mut cache, stats) = create_cache(10, 10);

        cache_vote(&mut cache, 1, 7, HASH);
        cache_vote(&mut cache, 2, 9, HASH);

        assert_eq!(cache.len(), 1);
        assert_eq!(voters(&cache, &HASH), vec![Account::from(1u64), Account::from(2u64)]);
        assert_eq!(cache.tally(&HASH), Amount::raw(16));
        assert_eq!(
            stats.count(StatType::VoteCache, DetailType::Insert, Direction::In),
            1
        );
        assert_eq!(
            stats.count(StatType::VoteCache, DetailType::Update, Direction::In),
            1
        );
    }

    #[test]
    fn multi_hash_vote_is_cached_per_hash() {
        let (mut cache, _) = create_cache(10, 10);
        let other = BlockHash::from(2u64);
        let vote = Arc::new(Vote::new(Account::from(1u64), 1, vec![HASH, other]));

        cache.insert(&vote, Amount::raw(5), &HashMap::new());

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.tally(&HASH), Amount::raw(5));
        assert_eq!(cache.tally(&other), Amount::raw(5));
    }

    #[test]
    fn newer_vote_from_same_rep_replaces_the_old_one() {
        let (mut cache, _) = create_cache(10, 10);
        cache.insert(&vote(1, 1, HASH), Amount::raw(5), &HashMap::new());

        let final_vote = Arc::new(Vote::new_final(Account::from(1u64), vec![HASH]));
        cache.insert(&final_vote, Amount::raw(6), &HashMap::new());

        let votes = cache.find(&HASH);
        assert_eq!(votes.len(), 1);
        assert!(votes[0].is_final());
        assert_eq!(cache.tally(&HASH), Amount::raw(6));
    }

    #[test]
    fn older_vote_from_same_rep_is_ignored() {
        let (mut cache, _) = create_cache(10, 10);
        cache.insert(&vote(1, 10, HASH), Amount::raw(5), &HashMap::new());

        cache.insert(&vote(1, 9, HASH), Amount::raw(8), &HashMap::new());

        let votes = cache.find(&HASH);
        assert_eq!(votes.len(), 1);
        assert_eq!(votes[0].timestamp, 10);
        assert_eq!(cache.tally(&HASH), Amount::raw(5));
    }

    #[test]
    fn full_entry_keeps_the_heaviest_voters() {
        let (mut cache, _) = create_cache(10, 2);
        cache_vote(&mut cache, 1, 10, HASH);
        cache_vote(&mut cache, 2, 20, HASH);

        // lighter than everyone present
        cache_vote(&mut cache, 3, 5, HASH);
        assert_eq!(voters(&cache, &HASH), vec![Account::from(1u64), Account::from(2u64)]);

        cache_vote(&mut cache, 4, 30, HASH);
        assert_eq!(voters(&cache, &HASH), vec![Account::from(2u64), Account::from(4u64)]);
        assert_eq!(cache.tally(&HASH), Amount::raw(50));
    }

    #[test]
    fn oldest_entry_is_evicted_when_full() {
        let (mut cache, _) = create_cache(2, 10);
        let hashes: Vec<_> = (1..=3u64).map(BlockHash::from).collect();
        cache_vote(&mut cache, 1, 1, hashes[0]);
        cache_vote(&mut cache, 1, 1, hashes[1]);
        // updating an entry does not refresh its position
        cache_vote(&mut cache, 2, 1, hashes[0]);

        cache_vote(&mut cache, 1, 1, hashes[2]);

        assert_eq!(cache.len(), 2);
        assert!(cache.find(&hashes[0]).is_empty());
        assert_eq!(cache.find(&hashes[1]).len(), 1);
        assert_eq!(cache.find(&hashes[2]).len(), 1);
    }

    #[test]
    fn only_unsettled_hashes_are_cached() {
        let (mut cache, _) = create_cache(10, 10);
        let hashes: Vec<_> = (1..=4u64).map(BlockHash::from).collect();
        let vote = Arc::new(Vote::new(Account::from(1u64), 1, hashes.clone()));
        let results = HashMap::from([
            (hashes[0], VoteCode::Indeterminate),
            (hashes[1], VoteCode::Replay),
            (hashes[2], VoteCode::Vote),
            (hashes[3], VoteCode::Ignored),
        ]);

        cache.insert(&vote, Amount::raw(1), &results);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.find(&hashes[0]).len(), 1);
        assert!(cache.find(&hashes[1]).is_empty());
        assert_eq!(cache.find(&hashes[2]).len(), 1);
        assert!(cache.find(&hashes[3]).is_empty());
    }

    #[test]
    fn erase() {
        let (mut cache, _) = create_cache(10, 10);
        cache_vote(&mut cache, 1, 1, HASH);

        assert!(cache.erase(&HASH));
        assert!(!cache.erase(&HASH));
        assert!(cache.is_empty());
    }

    #[test]
    fn erased_hash_does_not_count_towards_eviction() {
        let (mut cache, _) = create_cache(2, 10);
        let hashes: Vec<_> = (1..=3u64).map(BlockHash::from).collect();
        cache_vote(&mut cache, 1, 1, hashes[0]);
        cache_vote(&mut cache, 1, 1, hashes[1]);
        cache.erase(&hashes[0]);

        cache_vote(&mut cache, 1, 1, hashes[2]);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.find(&hashes[1]).len(), 1);
    }

    #[test]
    fn cleanup_drops_entries_without_recent_votes() {
        let (mut cache, stats) = create_cache(10, 10);
        let fresh = BlockHash::from(2u64);
        cache_vote(&mut cache, 1, 1, HASH);
        cache_vote(&mut cache, 1, 1, fresh);

        cache.cleanup();
        assert_eq!(
            stats.count(StatType::VoteCache, DetailType::Cleanup, Direction::In),
            0
        );

        MockClock::advance(Duration::from_secs(150));
        cache_vote(&mut cache, 2, 1, fresh);
        cache.cleanup();
        assert_eq!(cache.len(), 2);

        MockClock::advance(Duration::from_secs(150));
        cache.cleanup();
        assert!(cache.find(&HASH).is_empty());
        assert_eq!(cache.find(&fresh).len(), 2);
        assert_eq!(
            stats.count(StatType::VoteCache, DetailType::Cleanup, Direction::In),
            2
        );
    }
}
