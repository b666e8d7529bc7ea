use lattice_core::Account;
use lattice_output_tracker::{OutputListenerMt, OutputTrackerMt};
use std::sync::Arc;

/// Starts elections for the next unconfirmed block of an account
pub trait ElectionScheduler: Send + Sync {
    fn activate(&self, account: &Account);
}

/// Scheduler that starts nothing and records the activated accounts
pub struct NullElectionScheduler {
    listener: OutputListenerMt<Account>,
}

impl NullElectionScheduler {
    pub fn new() -> Self {
        Self {
            listener: OutputListenerMt::new(),
        }
    }

    pub fn track(&self) -> Arc<OutputTrackerMt<Account>> {
        self.listener.track()
    }
}

impl Default for NullElectionScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl ElectionScheduler for NullElectionScheduler {
    fn activate(&self, account: &Account) {
        self.listener.emit(*account);
    }
}
