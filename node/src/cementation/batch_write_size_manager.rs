use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

#[derive(Clone, Debug)]
pub(crate) struct BatchWriteSizeManagerOptions {
    pub min_size: usize,
    /// Maximum time one write batch should hold the write lock
    pub budget: Duration,
}

impl BatchWriteSizeManagerOptions {
    pub const DEFAULT_MIN_SIZE: usize = 16384;
    pub const DEFAULT_BUDGET: Duration = Duration::from_millis(250);
}

impl Default for BatchWriteSizeManagerOptions {
    fn default() -> Self {
        Self {
            min_size: Self::DEFAULT_MIN_SIZE,
            budget: Self::DEFAULT_BUDGET,
        }
    }
}

/// Tunes the number of blocks that get cemented in one write transaction,
/// so that a batch takes roughly as long as the write budget.
pub(crate) struct BatchWriteSizeManager {
    size: AtomicUsize,
    options: BatchWriteSizeManagerOptions,
}

impl BatchWriteSizeManager {
    pub fn new(options: BatchWriteSizeManagerOptions) -> Self {
        Self {
            size: AtomicUsize::new(options.min_size),
            options,
        }
    }

    pub fn current_size(&self) -> usize {
        self.size.load(Ordering::Relaxed)
    }

    /// Include a tolerance to save having to potentially wait on the block processor if the number of blocks to cement is only a bit higher than the max.
    pub fn current_size_with_tolerance(&self) -> usize {
        let size = self.current_size();
        size + (size / 10)
    }

    /// Update the maximum amount of blocks to write next time based on the time it took to cement this batch.
    pub fn adjust_size(&self, time_spent_cementing: Duration, cemented_count: usize) {
        let size = self.current_size();
        let amount_to_change = std::cmp::max(size / 10, 1);
        let increase_cutoff = self.options.budget - (self.options.budget / 5);

        if time_spent_cementing > self.options.budget {
            // Reduce (unless we have hit a floor)
            let new_size = std::cmp::max(
                self.options.min_size,
                size.saturating_sub(amount_to_change),
            );
            self.size.store(new_size, Ordering::Relaxed);
        } else if time_spent_cementing < increase_cutoff && cemented_count >= size {
            // Only a full batch tells us that the writes are fast enough for more
            self.size.store(size + amount_to_change, Ordering::Relaxed);
        }
    }
}

impl Default for BatchWriteSizeManager {
    fn default() -> Self {
        Self::new(Default::default())
    }
}
