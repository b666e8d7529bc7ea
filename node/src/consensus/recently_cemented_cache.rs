use super::ElectionStatus;
use bounded_vec_deque::BoundedVecDeque;
use lattice_core::utils::ContainerInfo;
use std::{mem::size_of, sync::Mutex};

/// Statuses of the most recently cemented elections, oldest first
pub struct RecentlyCementedCache {
    cemented: Mutex<BoundedVecDeque<ElectionStatus>>,
}

impl RecentlyCementedCache {
    pub fn new(max_len: usize) -> Self {
        Self {
            cemented: Mutex::new(BoundedVecDeque::new(max_len.max(1))),
        }
    }

    pub fn put(&self, election_status: ElectionStatus) {
        self.cemented.lock().unwrap().push_back(election_status);
    }

    pub fn list(&self) -> Vec<ElectionStatus> {
        self.cemented.lock().unwrap().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.cemented.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn container_info(&self) -> ContainerInfo {
        [("cemented", self.len(), size_of::<ElectionStatus>())].into()
    }
}
