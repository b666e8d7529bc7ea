use crate::{
    cementation::ConfirmationHeightProcessor,
    config::{NetworkConstants, NodeConfig},
    consensus::{ActiveElections, ActiveElectionsExt, ElectionNetwork, ElectionScheduler, VoteCache},
    representatives::OnlineReps,
    stats::Stats,
    utils::{ThreadPool, ThreadPoolImpl},
};
use lattice_core::utils::ContainerInfo;
use lattice_ledger::Ledger;
use std::sync::{Arc, Mutex};
use tracing::info;

/// The consensus core of a node: elections and the cementing of their winners.
/// Network and scheduling are supplied by the caller.
pub struct Node {
    pub config: NodeConfig,
    pub network: NetworkConstants,
    pub stats: Arc<Stats>,
    pub ledger: Arc<Ledger>,
    pub workers: Arc<ThreadPoolImpl>,
    pub online_reps: Arc<Mutex<OnlineReps>>,
    pub vote_cache: Arc<Mutex<VoteCache>>,
    pub confirmation_height_processor: Arc<ConfirmationHeightProcessor>,
    pub active: Arc<ActiveElections>,
}

impl Node {
    pub fn new(
        network: NetworkConstants,
        config: NodeConfig,
        ledger: Arc<Ledger>,
        election_network: Arc<dyn ElectionNetwork>,
        scheduler: Arc<dyn ElectionScheduler>,
    ) -> Self {
        let stats = Arc::new(Stats::new(config.stats.clone()));
        let workers = Arc::new(ThreadPoolImpl::new(config.background_threads, "Worker"));

        let online_reps = Arc::new(Mutex::new(OnlineReps::new(
            config.online_reps.clone(),
            Arc::clone(&ledger.rep_weights),
        )));

        let vote_cache = Arc::new(Mutex::new(VoteCache::new(
            config.vote_cache.clone(),
            Arc::clone(&stats),
        )));

        let confirmation_height_processor = Arc::new(ConfirmationHeightProcessor::new(
            config.confirmation_height.clone(),
            Arc::clone(&ledger),
            Arc::clone(&stats),
        ));

        let active = Arc::new(ActiveElections::new(
            network.clone(),
            config.clone(),
            Arc::clone(&ledger),
            Arc::clone(&stats),
            Arc::clone(&workers) as Arc<dyn ThreadPool>,
            Arc::clone(&online_reps),
            Arc::clone(&vote_cache),
            Arc::clone(&confirmation_height_processor),
            election_network,
            scheduler,
        ));

        let active_w = Arc::downgrade(&active);
        confirmation_height_processor.add_cemented_observer(Box::new(move |block| {
            if let Some(active) = active_w.upgrade() {
                active.block_cemented_callback(block);
            }
        }));

        let active_w = Arc::downgrade(&active);
        confirmation_height_processor.add_already_cemented_observer(Box::new(move |hash| {
            if let Some(active) = active_w.upgrade() {
                active.block_already_cemented_callback(hash);
            }
        }));

        Self {
            config,
            network,
            stats,
            ledger,
            workers,
            online_reps,
            vote_cache,
            confirmation_height_processor,
            active,
        }
    }

    pub fn start(&self) {
        info!(
            blocks = self.ledger.block_count(),
            cemented = self.ledger.cemented_count(),
            "Starting node"
        );
        self.confirmation_height_processor.start();
        self.active.start();
    }

    pub fn stop(&self) {
        info!("Node stopping...");
        self.active.stop();
        self.confirmation_height_processor.stop();
        self.workers.stop();
    }

    pub fn container_info(&self) -> ContainerInfo {
        let online_reps = self.online_reps.lock().unwrap().container_info();
        let vote_cache = self.vote_cache.lock().unwrap().container_info();
        ContainerInfo::builder()
            .node("ledger", self.ledger.container_info())
            .node("active", self.active.container_info())
            .node(
                "confirmation_height",
                self.confirmation_height_processor.container_info(),
            )
            .node("online_reps", online_reps)
            .node("vote_cache", vote_cache)
            .finish()
    }
}
