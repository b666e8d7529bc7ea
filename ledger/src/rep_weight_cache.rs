use crate::LedgerCache;
use lattice_core::{utils::ContainerInfo, Amount, PublicKey};
use std::{
    collections::HashMap,
    mem::size_of,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, RwLock,
    },
};

/// Returns the cached vote weight for the given representative.
/// While the ledger holds fewer than `max_blocks` blocks it returns
/// the preconfigured bootstrap weights instead.
pub struct RepWeightCache {
    weights: RwLock<HashMap<PublicKey, Amount>>,
    bootstrap_weights: RwLock<HashMap<PublicKey, Amount>>,
    max_blocks: u64,
    ledger_cache: Arc<LedgerCache>,
    check_bootstrap_weights: AtomicBool,
}

impl RepWeightCache {
    pub fn new() -> Self {
        Self {
            weights: RwLock::new(HashMap::new()),
            bootstrap_weights: RwLock::new(HashMap::new()),
            max_blocks: 0,
            ledger_cache: Arc::new(LedgerCache::new()),
            check_bootstrap_weights: AtomicBool::new(false),
        }
    }

    pub fn with_bootstrap_weights(
        bootstrap_weights: HashMap<PublicKey, Amount>,
        max_blocks: u64,
        ledger_cache: Arc<LedgerCache>,
    ) -> Self {
        Self {
            weights: RwLock::new(HashMap::new()),
            check_bootstrap_weights: AtomicBool::new(!bootstrap_weights.is_empty()),
            bootstrap_weights: RwLock::new(bootstrap_weights),
            max_blocks,
            ledger_cache,
        }
    }

    pub fn use_bootstrap_weights(&self) -> bool {
        if self.check_bootstrap_weights.load(Ordering::SeqCst) {
            if self.ledger_cache.block_count.load(Ordering::SeqCst) < self.max_blocks {
                return true;
            } else {
                self.check_bootstrap_weights.store(false, Ordering::SeqCst);
            }
        }
        false
    }

    pub fn weight(&self, rep: &PublicKey) -> Amount {
        let weights = if self.use_bootstrap_weights() {
            &self.bootstrap_weights
        } else {
            &self.weights
        };

        weights
            .read()
            .unwrap()
            .get(rep)
            .cloned()
            .unwrap_or_default()
    }

    pub fn bootstrap_weight_max_blocks(&self) -> u64 {
        self.max_blocks
    }

    pub fn len(&self) -> usize {
        self.weights.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn set(&self, rep: PublicKey, weight: Amount) {
        self.weights.write().unwrap().insert(rep, weight);
    }

    pub fn container_info(&self) -> ContainerInfo {
        [("rep_weights", self.len(), size_of::<(PublicKey, Amount)>())].into()
    }
}

impl Default for RepWeightCache {
    fn default() -> Self {
        Self::new()
    }
}
