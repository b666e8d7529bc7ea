use std::time::Duration;

/// Timings that differ between the dev network used by tests and the live network
#[derive(Clone, Debug, PartialEq)]
pub struct NetworkConstants {
    pub is_dev: bool,
    /// Expected round trip of a vote request. Election timings are multiples of it.
    pub base_latency: Duration,
    /// Period of the active elections request loop
    pub aec_loop_interval: Duration,
    /// Minimum time between rebroadcasts of the same election winner
    pub block_broadcast_interval: Duration,
    /// Minimum time between local vote broadcasts of the same election
    pub vote_broadcast_interval: Duration,
}

impl NetworkConstants {
    pub fn dev() -> Self {
        Self {
            is_dev: true,
            base_latency: Duration::from_millis(25),
            aec_loop_interval: Duration::from_millis(20),
            block_broadcast_interval: Duration::from_millis(500),
            vote_broadcast_interval: Duration::from_millis(500),
        }
    }

    pub fn live() -> Self {
        Self {
            is_dev: false,
            base_latency: Duration::from_millis(1000),
            aec_loop_interval: Duration::from_millis(300),
            block_broadcast_interval: Duration::from_secs(150),
            vote_broadcast_interval: Duration::from_secs(15),
        }
    }
}

impl Default for NetworkConstants {
    fn default() -> Self {
        Self::live()
    }
}
