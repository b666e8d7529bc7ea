use lattice_core::{utils::ContainerInfo, BlockHash, QualifiedRoot};
use std::{
    collections::{HashMap, VecDeque},
    mem::size_of,
    sync::Mutex,
};

/// Roots and winners of the most recently confirmed elections.
/// Used to classify late votes as replays and to refuse restarting finished elections.
pub struct RecentlyConfirmedCache {
    mutex: Mutex<RecentlyConfirmedData>,
    max_len: usize,
}

impl RecentlyConfirmedCache {
    pub fn new(max_len: usize) -> Self {
        Self {
            mutex: Mutex::new(RecentlyConfirmedData::default()),
            max_len,
        }
    }

    /// Returns false if the root or hash was already present
    pub fn put(&self, root: QualifiedRoot, hash: BlockHash) -> bool {
        let mut guard = self.mutex.lock().unwrap();
        if guard.by_root.contains_key(&root) || guard.by_hash.contains_key(&hash) {
            return false;
        }
        guard.sequential.push_back(hash);
        guard.by_root.insert(root, hash);
        guard.by_hash.insert(hash, root);
        if guard.sequential.len() > self.max_len {
            guard.pop_front();
        }
        true
    }

    pub fn erase(&self, hash: &BlockHash) {
        let mut guard = self.mutex.lock().unwrap();
        if let Some(root) = guard.by_hash.remove(hash) {
            guard.by_root.remove(&root);
            guard.sequential.retain(|i| i != hash);
        }
    }

    pub fn clear(&self) {
        let mut guard = self.mutex.lock().unwrap();
        guard.sequential.clear();
        guard.by_root.clear();
        guard.by_hash.clear();
    }

    pub fn exists(&self, root: &QualifiedRoot) -> bool {
        self.mutex.lock().unwrap().by_root.contains_key(root)
    }

    pub fn hash_exists(&self, hash: &BlockHash) -> bool {
        self.mutex.lock().unwrap().by_hash.contains_key(hash)
    }

    /// The most recently added entry
    pub fn back(&self) -> Option<(QualifiedRoot, BlockHash)> {
        let guard = self.mutex.lock().unwrap();
        guard
            .sequential
            .back()
            .and_then(|hash| guard.by_hash.get(hash).map(|root| (*root, *hash)))
    }

    pub fn len(&self) -> usize {
        self.mutex.lock().unwrap().sequential.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn container_info(&self) -> ContainerInfo {
        [(
            "confirmed",
            self.len(),
            size_of::<BlockHash>() * 2 + size_of::<QualifiedRoot>() * 2,
        )]
        .into()
    }
}

#[derive(Default)]
struct RecentlyConfirmedData {
    sequential: VecDeque<BlockHash>,
    by_root: HashMap<QualifiedRoot, BlockHash>,
    by_hash: HashMap<BlockHash, QualifiedRoot>,
}

impl RecentlyConfirmedData {
    fn pop_front(&mut self) {
        if let Some(hash) = self.sequential.pop_front() {
            if let Some(root) = self.by_hash.remove(&hash) {
                self.by_root.remove(&root);
            }
        }
    }
}
