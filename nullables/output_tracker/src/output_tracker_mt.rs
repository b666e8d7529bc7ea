use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex, Weak,
};

/// Records everything a nullable component emitted, so tests can assert on
/// the outgoing side effects without a real network or disk
pub struct OutputTrackerMt<T: Clone + 'static> {
    output: Mutex<Vec<T>>,
}

impl<T: Clone + 'static> OutputTrackerMt<T> {
    pub fn new() -> Self {
        Self {
            output: Mutex::new(Vec::new()),
        }
    }

    pub fn add(&self, t: T) {
        self.output.lock().unwrap().push(t);
    }

    pub fn output(&self) -> Vec<T> {
        self.output.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.output.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn last(&self) -> Option<T> {
        self.output.lock().unwrap().last().cloned()
    }

    pub fn clear(&self) {
        self.output.lock().unwrap().clear();
    }
}

impl<T: Clone + 'static> Default for OutputTrackerMt<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Fans emitted values out to all trackers that are still alive
pub struct OutputListenerMt<T: Clone + 'static> {
    trackers: Mutex<Vec<Weak<OutputTrackerMt<T>>>>,
    count: AtomicUsize,
}

impl<T: Clone + 'static> OutputListenerMt<T> {
    pub fn new() -> Self {
        Self {
            trackers: Mutex::new(Vec::new()),
            count: AtomicUsize::new(0),
        }
    }

    pub fn is_tracked(&self) -> bool {
        self.count.load(Ordering::SeqCst) > 0
    }

    pub fn track(&self) -> Arc<OutputTrackerMt<T>> {
        let tracker = Arc::new(OutputTrackerMt::new());
        let mut guard = self.trackers.lock().unwrap();
        guard.push(Arc::downgrade(&tracker));
        self.count.store(guard.len(), Ordering::SeqCst);
        tracker
    }

    pub fn emit(&self, t: T) {
        if !self.is_tracked() {
            return;
        }

        let mut guard = self.trackers.lock().unwrap();
        let mut should_clean = false;
        for tracker in guard.iter() {
            match tracker.upgrade() {
                Some(tracker) => tracker.add(t.clone()),
                None => should_clean = true,
            }
        }

        if should_clean {
            guard.retain(|t| t.strong_count() > 0);
            self.count.store(guard.len(), Ordering::SeqCst);
        }
    }

    pub fn tracker_count(&self) -> usize {
        self.trackers.lock().unwrap().len()
    }
}

impl<T: Clone + 'static> Default for OutputListenerMt<T> {
    fn default() -> Self {
        Self::new()
    }
}
