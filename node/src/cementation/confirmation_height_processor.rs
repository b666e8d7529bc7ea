use super::{
    BatchWriteSizeManager, BlockCementerContainerInfo, BlockCementerLogic,
    BlockCementerLogicOptions, CementCallbackRefs, ConfirmationHeightConfig, FlushDecision,
    LedgerAdapter,
};
use crate::stats::{DetailType, Sample, StatType, Stats};
use lattice_core::{utils::ContainerInfo, BlockHash, SavedBlock};
use lattice_ledger::{Ledger, WriteGuard, Writer};
use std::{
    collections::{HashSet, VecDeque},
    mem::size_of,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Condvar, Mutex,
    },
    thread::JoinHandle,
    time::{Duration, Instant},
};
use tracing::{debug, trace, warn};

pub type BlockCementedCallback = Box<dyn Fn(&SavedBlock) + Send + Sync>;
pub type AlreadyCementedCallback = Box<dyn Fn(&BlockHash) + Send + Sync>;

/// Durably advances the confirmation height of confirmed blocks and of
/// every block they depend on. Runs on its own thread and writes in batches.
pub struct ConfirmationHeightProcessor {
    thread: Arc<ProcessorThread>,
    join_handle: Mutex<Option<JoinHandle<()>>>,
    batch_write_size: Arc<BatchWriteSizeManager>,
    cementer_info: BlockCementerContainerInfo,
}

impl ConfirmationHeightProcessor {
    pub fn new(config: ConfirmationHeightConfig, ledger: Arc<Ledger>, stats: Arc<Stats>) -> Self {
        let stopped = Arc::new(AtomicBool::new(false));
        let logic = BlockCementerLogic::new(BlockCementerLogicOptions {
            epochs: ledger.constants.epochs.clone(),
            stopped: Arc::clone(&stopped),
            min_batch_separation: config.batch_separate_pending_min_time,
            min_batch_size: config.min_batch_size,
            batch_write_budget: config.batch_write_budget,
            max_pending_writes: config.max_pending_writes,
        });
        let batch_write_size = Arc::clone(logic.batch_write_size());
        let cementer_info = logic.container_info();

        Self {
            thread: Arc::new(ProcessorThread {
                mutex: Mutex::new(ProcessorData {
                    awaiting_processing: VecDeque::new(),
                    awaiting_set: HashSet::new(),
                    pending_originals: HashSet::new(),
                    current: None,
                    paused: false,
                }),
                condition: Condvar::new(),
                stopped,
                logic: Mutex::new(logic),
                ledger,
                stats,
                observers: Mutex::new(Observers::default()),
            }),
            join_handle: Mutex::new(None),
            batch_write_size,
            cementer_info,
        }
    }

    pub fn start(&self) {
        debug_assert!(self.join_handle.lock().unwrap().is_none());

        let thread = Arc::clone(&self.thread);
        *self.join_handle.lock().unwrap() = Some(
            std::thread::Builder::new()
                .name("Conf height".to_string())
                .spawn(move || thread.run())
                .unwrap(),
        );
    }

    pub fn stop(&self) {
        {
            let _guard = self.thread.mutex.lock().unwrap();
            self.thread.stopped.store(true, Ordering::SeqCst);
        }
        self.thread.condition.notify_all();
        let handle = self.join_handle.lock().unwrap().take();
        if let Some(handle) = handle {
            handle.join().unwrap();
        }
    }

    /// Queues a confirmed block for cementing. Duplicates are ignored.
    pub fn add(&self, hash: BlockHash) {
        let added = {
            let mut guard = self.thread.mutex.lock().unwrap();
            if guard.awaiting_set.insert(hash) {
                guard.awaiting_processing.push_back(hash);
                true
            } else {
                false
            }
        };
        if added {
            trace!(%hash, "queued for cementing");
            self.thread.condition.notify_all();
        }
    }

    /// True while the block waits in the queue or its cementing is not written yet
    pub fn is_processing_block(&self, hash: &BlockHash) -> bool {
        let guard = self.thread.mutex.lock().unwrap();
        guard.awaiting_set.contains(hash) || guard.pending_originals.contains(hash)
    }

    pub fn awaiting_processing_len(&self) -> usize {
        self.thread.awaiting_processing_len()
    }

    /// The original block the walk is currently working on
    pub fn current(&self) -> Option<BlockHash> {
        self.thread.mutex.lock().unwrap().current
    }

    pub fn batch_write_size(&self) -> usize {
        self.batch_write_size.current_size()
    }

    pub fn pause(&self) {
        self.thread.mutex.lock().unwrap().paused = true;
    }

    pub fn unpause(&self) {
        self.thread.mutex.lock().unwrap().paused = false;
        self.thread.condition.notify_all();
    }

    pub fn add_cemented_observer(&self, callback: BlockCementedCallback) {
        self.thread.observers.lock().unwrap().cemented.push(callback);
    }

    pub fn add_already_cemented_observer(&self, callback: AlreadyCementedCallback) {
        self.thread
            .observers
            .lock()
            .unwrap()
            .already_cemented
            .push(callback);
    }

    pub fn container_info(&self) -> ContainerInfo {
        let awaiting = self.awaiting_processing_len();
        ContainerInfo::builder()
            .leaf("awaiting_processing", awaiting, size_of::<BlockHash>())
            .node("bounded_mode", self.cementer_info.collect())
            .finish()
    }
}

impl Drop for ConfirmationHeightProcessor {
    fn drop(&mut self) {
        self.stop();
    }
}

struct ProcessorData {
    awaiting_processing: VecDeque<BlockHash>,
    awaiting_set: HashSet<BlockHash>,
    /// Originals which were walked but whose writes may still be pending
    pending_originals: HashSet<BlockHash>,
    current: Option<BlockHash>,
    paused: bool,
}

#[derive(Default)]
struct Observers {
    cemented: Vec<BlockCementedCallback>,
    already_cemented: Vec<AlreadyCementedCallback>,
}

struct ProcessorThread {
    mutex: Mutex<ProcessorData>,
    condition: Condvar,
    stopped: Arc<AtomicBool>,
    /// Only ever locked by the processing thread
    logic: Mutex<BlockCementerLogic>,
    ledger: Arc<Ledger>,
    stats: Arc<Stats>,
    observers: Mutex<Observers>,
}

impl ProcessorThread {
    fn awaiting_processing_len(&self) -> usize {
        self.mutex.lock().unwrap().awaiting_processing.len()
    }

    fn run(&self) {
        let mut logic = self.logic.lock().unwrap();
        let mut batch_timer = Instant::now();
        let mut guard = self.mutex.lock().unwrap();
        while !self.stopped.load(Ordering::SeqCst) {
            if !guard.paused && !guard.awaiting_processing.is_empty() {
                if !logic.has_pending_writes() {
                    guard.pending_originals.clear();
                }
                let Some(hash) = guard.awaiting_processing.pop_front() else {
                    continue;
                };
                guard.awaiting_set.remove(&hash);
                guard.pending_originals.insert(hash);
                guard.current = Some(hash);
                drop(guard);

                self.process(&mut logic, hash, &mut batch_timer);

                guard = self.mutex.lock().unwrap();
                guard.current = None;
            } else if logic.has_pending_writes() {
                // Nothing left to walk, so write out whatever is still pending
                drop(guard);
                let write_guard = self.ledger.write_queue.wait(Writer::ConfirmationHeight);
                self.cement_blocks(&mut logic, write_guard, &mut batch_timer);
                guard = self.mutex.lock().unwrap();
            } else {
                guard.pending_originals.clear();
                guard = self
                    .condition
                    .wait_while(guard, |i| {
                        (i.paused || i.awaiting_processing.is_empty())
                            && !self.stopped.load(Ordering::SeqCst)
                    })
                    .unwrap();
            }
        }
        drop(guard);

        // Resolved sections are still written, unresolved ones are found again on the next start
        if logic.has_pending_writes() {
            let write_guard = self.ledger.write_queue.wait(Writer::ConfirmationHeight);
            self.cement_blocks(&mut logic, write_guard, &mut batch_timer);
        }
    }

    fn process(&self, logic: &mut BlockCementerLogic, hash: BlockHash, batch_timer: &mut Instant) {
        if !logic.has_pending_writes() {
            logic.clear_cached_accounts();
            *batch_timer = Instant::now();
        }

        let mut txn = self.ledger.read_txn();
        let Some(block) = self.ledger.get_block(&txn, &hash) else {
            warn!(%hash, "Block to cement not found in ledger");
            return;
        };
        debug!(%hash, height = block.height(), "cementing");
        logic.set_current_block(block);

        loop {
            let more = {
                let mut adapter = LedgerAdapter::new(&mut txn, &self.ledger);
                let mut already_cemented = |hash: BlockHash| self.notify_already_cemented(&hash);
                let mut block_cemented = |block: &SavedBlock| self.notify_cemented(block);
                let mut callbacks = CementCallbackRefs {
                    block_cemented: &mut block_cemented,
                    block_already_cemented: &mut already_cemented,
                };
                logic.process_current_block(&mut adapter, &mut callbacks)
            };

            let awaiting = self.awaiting_processing_len() as u64;
            match logic.get_flush_decision(awaiting, batch_timer.elapsed()) {
                FlushDecision::DontFlush => {}
                FlushDecision::TryFlush => {
                    // Continue walking if another writer holds the lock
                    if let Some(write_guard) =
                        self.ledger.write_queue.try_lock(Writer::ConfirmationHeight)
                    {
                        self.cement_blocks(logic, write_guard, batch_timer);
                    }
                }
                FlushDecision::ForceFlush => {
                    let write_guard = self.ledger.write_queue.wait(Writer::ConfirmationHeight);
                    self.cement_blocks(logic, write_guard, batch_timer);
                }
            }

            if !more || self.stopped.load(Ordering::SeqCst) {
                break;
            }
        }
    }

    fn cement_blocks(
        &self,
        logic: &mut BlockCementerLogic,
        mut write_guard: WriteGuard,
        batch_timer: &mut Instant,
    ) {
        let mut txn = self.ledger.rw_txn();
        let mut cementing_started = Instant::now();

        loop {
            let next_write = {
                let adapter = LedgerAdapter::new(&mut txn, &self.ledger);
                logic.next_write(&adapter)
            };
            let Some(section) = next_write else {
                break;
            };

            self.ledger.write_confirmation_height(&mut txn, &section);
            let num_blocks = section.block_count();
            self.stats.add(
                StatType::ConfirmationHeight,
                DetailType::BlocksConfirmed,
                num_blocks,
            );
            self.stats.add(
                StatType::ConfirmationHeight,
                DetailType::BlocksConfirmedBounded,
                num_blocks,
            );
            trace!(
                account = %section.account,
                bottom = section.bottom_height,
                top = section.top_height,
                "confirmation height written"
            );

            if logic.should_start_new_batch() {
                // Give other writers a chance, then continue with the rest of the section
                txn.commit();
                write_guard.release();
                self.batch_completed(logic, cementing_started.elapsed());
                write_guard = self.ledger.write_queue.wait(Writer::ConfirmationHeight);
                txn.renew();
                cementing_started = Instant::now();
            }
        }

        txn.commit();
        write_guard.release();
        self.batch_completed(logic, cementing_started.elapsed());
        *batch_timer = Instant::now();
    }

    fn batch_completed(&self, logic: &mut BlockCementerLogic, time_spent: Duration) {
        let cemented = logic.unpublished_cemented_blocks_len();
        if cemented == 0 {
            return;
        }

        let size_before = logic.batch_write_size().current_size();
        let mut already_cemented = |hash: BlockHash| self.notify_already_cemented(&hash);
        let mut block_cemented = |block: &SavedBlock| self.notify_cemented(block);
        let mut callbacks = CementCallbackRefs {
            block_cemented: &mut block_cemented,
            block_already_cemented: &mut already_cemented,
        };
        logic.batch_completed(time_spent, &mut callbacks);

        let size_after = logic.batch_write_size().current_size();
        if size_after > size_before {
            self.stats
                .inc(StatType::ConfirmationHeight, DetailType::BatchSizeIncreased);
        } else if size_after < size_before {
            self.stats
                .inc(StatType::ConfirmationHeight, DetailType::BatchSizeDecreased);
        }

        self.stats.sample(
            Sample::CementingBatchSize,
            cemented as i64,
            (1, size_before as i64),
        );
        self.stats.sample(
            Sample::CementingBatchDuration,
            time_spent.as_millis() as i64,
            (0, 1000),
        );
        debug!(
            cemented,
            time_ms = time_spent.as_millis() as u64,
            batch_size = size_after,
            "cementing batch completed"
        );
    }

    fn notify_cemented(&self, block: &SavedBlock) {
        self.stats
            .inc(StatType::ConfirmationHeight, DetailType::Cemented);
        let observers = self.observers.lock().unwrap();
        for callback in &observers.cemented {
            callback(block);
        }
    }

    fn notify_already_cemented(&self, hash: &BlockHash) {
        self.stats
            .inc(StatType::ConfirmationHeight, DetailType::AlreadyCemented);
        let observers = self.observers.lock().unwrap();
        for callback in &observers.already_cemented {
            callback(hash);
        }
    }
}
