use super::{Election, ElectionData, ElectionNetwork};
use crate::config::NetworkConstants;
use lattice_core::{Account, BlockHash, Root};
use std::{
    cmp::max,
    collections::{BTreeSet, HashMap},
    sync::{atomic::Ordering, Arc, MutexGuard},
};

/// Maximum number of (hash, root) pairs in a single confirmation request
pub const CONFIRM_REQ_HASHES_MAX: usize = 7;

/// This struct accepts elections that need further votes before they can be confirmed and bundles them in to single confirm_req packets
pub struct ConfirmationSolicitor {
    network: Arc<dyn ElectionNetwork>,
    /// Global maximum amount of block broadcasts
    max_block_broadcasts: usize,
    /// Maximum amount of requests to be sent per election, bypassed if an existing vote is for a different hash
    max_election_requests: usize,
    /// Maximum amount of directed broadcasts to be sent per election
    max_election_broadcasts: usize,
    representative_requests: Vec<Account>,
    representative_broadcasts: Vec<Account>,
    requests: HashMap<Account, Vec<(BlockHash, Root)>>,
    representatives: BTreeSet<Account>,
    prepared: bool,
    rebroadcasted: usize,
}

impl ConfirmationSolicitor {
    pub fn new(network_constants: &NetworkConstants, network: Arc<dyn ElectionNetwork>) -> Self {
        let max_election_broadcasts = max(network.fanout() / 2, 1);
        Self {
            network,
            max_block_broadcasts: if network_constants.is_dev { 4 } else { 30 },
            max_election_requests: 50,
            max_election_broadcasts,
            prepared: false,
            representative_requests: Vec::new(),
            representative_broadcasts: Vec::new(),
            requests: HashMap::new(),
            representatives: BTreeSet::new(),
            rebroadcasted: 0,
        }
    }

    /// Prepare object for batching election confirmation requests
    pub fn prepare(&mut self, representatives: &[Account]) {
        debug_assert!(!self.prepared);
        self.requests.clear();
        self.representatives.clear();
        self.rebroadcasted = 0;
        self.representative_requests = representatives.to_vec();
        self.representative_broadcasts = representatives.to_vec();
        self.prepared = true;
    }

    /// Broadcast the winner of an election if the broadcast limit has not been reached. Returns Err if the limit was reached
    pub fn broadcast(&mut self, guard: &MutexGuard<ElectionData>) -> Result<(), ()> {
        debug_assert!(self.prepared);
        self.rebroadcasted += 1;
        if self.rebroadcasted >= self.max_block_broadcasts {
            return Err(());
        }

        let Some(winner_block) = guard.status.winner.as_ref() else {
            return Err(());
        };
        let hash = winner_block.hash();
        let mut count = 0;
        // Directed broadcasting to principal representatives
        for rep in &self.representative_broadcasts {
            if count >= self.max_election_broadcasts {
                break;
            }
            let should_broadcast = if let Some(existing) = guard.last_votes.get(rep) {
                existing.hash != hash
            } else {
                count += 1;
                true
            };
            if should_broadcast {
                self.network.send_block(rep, winner_block);
            }
        }
        // Random flood for block propagation
        self.network.flood_block(winner_block);
        Ok(())
    }

    /// Add an election that needs to be confirmed. Returns false if successfully added
    pub fn add(&mut self, election: &Election, guard: &MutexGuard<ElectionData>) -> bool {
        debug_assert!(self.prepared);
        let Some(winner) = guard.status.winner.as_ref() else {
            return true;
        };
        let mut error = true;
        let mut count = 0;
        let hash = winner.hash();
        let mut to_remove = Vec::new();
        for rep in &self.representative_requests {
            if count >= self.max_election_requests {
                break;
            }
            let existing = guard.last_votes.get(rep);
            let exists = existing.is_some();
            let is_final = existing
                .map(|e| !election.is_quorum.load(Ordering::SeqCst) || e.timestamp == u64::MAX)
                .unwrap_or(false);
            let different = existing.map(|e| e.hash != hash).unwrap_or(false);
            if !exists || !is_final || different {
                if !self.network.is_queue_full(rep) {
                    self.requests
                        .entry(*rep)
                        .or_default()
                        .push((hash, winner.root()));
                    self.representatives.insert(*rep);
                    if !different {
                        count += 1;
                    }
                    error = false;
                } else {
                    to_remove.push(*rep);
                }
            }
        }

        if !to_remove.is_empty() {
            self.representative_requests
                .retain(|i| !to_remove.contains(i));
        }

        error
    }

    /// Dispatch bundled requests to each representative
    pub fn flush(&mut self) {
        debug_assert!(self.prepared);
        for rep in &self.representatives {
            if let Some(requests) = self.requests.get(rep) {
                for chunk in requests.chunks(CONFIRM_REQ_HASHES_MAX) {
                    self.network.send_confirm_req(rep, chunk.to_vec());
                }
            }
        }
        self.prepared = false;
    }
}
