use lattice_ledger::Ledger;
use lattice_node::{
    config::{NetworkConstants, NodeConfig},
    consensus::{ElectionNetwork, ElectionScheduler, NullElectionNetwork, NullElectionScheduler},
    Node,
};
use std::{
    sync::{Arc, OnceLock},
    thread::sleep,
    time::{Duration, Instant},
};
use tracing_subscriber::EnvFilter;

/// Owns the nodes of a test and stops them when dropped
pub struct System {
    network: NetworkConstants,
    nodes: Vec<Arc<Node>>,
}

impl System {
    pub fn new() -> Self {
        init_tracing();
        Self {
            network: NetworkConstants::dev(),
            nodes: Vec::new(),
        }
    }

    pub fn default_config() -> NodeConfig {
        NodeConfig::new_test_instance()
    }

    pub fn build_node(&mut self) -> NodeBuilder<'_> {
        NodeBuilder {
            system: self,
            config: None,
            ledger: None,
            election_network: None,
            scheduler: None,
        }
    }

    pub fn make_node(&mut self) -> Arc<Node> {
        self.build_node().finish()
    }

    fn stop(&mut self) {
        for node in &self.nodes {
            node.stop();
        }
    }
}

impl Default for System {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for System {
    fn drop(&mut self) {
        self.stop();
    }
}

pub struct NodeBuilder<'a> {
    system: &'a mut System,
    config: Option<NodeConfig>,
    ledger: Option<Arc<Ledger>>,
    election_network: Option<Arc<dyn ElectionNetwork>>,
    scheduler: Option<Arc<dyn ElectionScheduler>>,
}

impl<'a> NodeBuilder<'a> {
    pub fn config(mut self, cfg: NodeConfig) -> Self {
        self.config = Some(cfg);
        self
    }

    pub fn ledger(mut self, ledger: Ledger) -> Self {
        self.ledger = Some(Arc::new(ledger));
        self
    }

    pub fn election_network(mut self, network: Arc<dyn ElectionNetwork>) -> Self {
        self.election_network = Some(network);
        self
    }

    pub fn scheduler(mut self, scheduler: Arc<dyn ElectionScheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn finish(self) -> Arc<Node> {
        let config = self.config.unwrap_or_else(System::default_config);
        let ledger = self.ledger.unwrap_or_else(|| Arc::new(Ledger::new_null()));
        let election_network = self
            .election_network
            .unwrap_or_else(|| Arc::new(NullElectionNetwork::new()));
        let scheduler = self
            .scheduler
            .unwrap_or_else(|| Arc::new(NullElectionScheduler::new()));

        let node = Arc::new(Node::new(
            self.system.network.clone(),
            config,
            ledger,
            election_network,
            scheduler,
        ));
        node.start();
        self.system.nodes.push(Arc::clone(&node));
        node
    }
}

pub fn assert_never(duration: Duration, mut check: impl FnMut() -> bool) {
    let start = Instant::now();
    while start.elapsed() < duration {
        if check() {
            panic!("never check failed");
        }
        sleep(Duration::from_millis(50));
    }
}

pub fn assert_timely<F>(timeout: Duration, check: F)
where
    F: FnMut() -> bool,
{
    assert_timely_msg(timeout, check, "timeout");
}

pub fn assert_timely_msg<F>(timeout: Duration, mut check: F, error_message: &str)
where
    F: FnMut() -> bool,
{
    let start = Instant::now();
    while start.elapsed() < timeout {
        if check() {
            return;
        }
        sleep(Duration::from_millis(50));
    }
    panic!("{}", error_message);
}

pub fn assert_timely_eq<T, F>(timeout: Duration, mut check: F, expected: T)
where
    T: PartialEq + std::fmt::Debug + Clone,
    F: FnMut() -> T,
{
    let start = Instant::now();
    let mut actual = expected.clone();
    while start.elapsed() < timeout {
        actual = check();
        if actual == expected {
            return;
        }
        sleep(Duration::from_millis(50));
    }
    panic!("timeout. expected: {expected:?}, actual: {actual:?}");
}

pub fn assert_always_eq<T, F>(time: Duration, mut condition: F, expected: T)
where
    T: PartialEq + std::fmt::Debug,
    F: FnMut() -> T,
{
    let start = Instant::now();
    while start.elapsed() < time {
        assert_eq!(condition(), expected);
        sleep(Duration::from_millis(50));
    }
}

static TRACING_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Log output is controlled by RUST_LOG and off by default
pub fn init_tracing() {
    TRACING_INITIALIZED.get_or_init(|| {
        let dirs = std::env::var(EnvFilter::DEFAULT_ENV).unwrap_or(String::from("off"));
        let filter = EnvFilter::builder().parse_lossy(dirs);

        tracing_subscriber::fmt::fmt()
            .with_env_filter(filter)
            .with_ansi(true)
            .init();
    });
}
