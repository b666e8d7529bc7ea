use super::{DetailType, Direction, Sample, StatType, StatsJsonWriter, StatsLogSink};
use anyhow::Result;
use bounded_vec_deque::BoundedVecDeque;
use lattice_core::utils::get_env_bool;
use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex, RwLock,
    },
    time::{Duration, Instant, SystemTime},
};
use tracing::debug;

#[derive(Clone, Debug, PartialEq)]
pub struct StatsConfig {
    /// How many samples to keep per sampler
    pub max_samples: usize,
    /// If true, counters and samples are written with a header containing the wall time
    pub log_headers: bool,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            max_samples: 1024 * 16,
            log_headers: true,
        }
    }
}

impl StatsConfig {
    pub fn new() -> Self {
        Default::default()
    }
}

/// Thread safe counters and samplers for operational monitoring
pub struct Stats {
    config: StatsConfig,
    mutables: RwLock<StatMutables>,
    enable_logging: bool,
}

impl Default for Stats {
    fn default() -> Self {
        Self::new(StatsConfig::default())
    }
}

impl Stats {
    pub fn new(config: StatsConfig) -> Self {
        Self {
            config,
            mutables: RwLock::new(StatMutables {
                counters: BTreeMap::new(),
                samplers: BTreeMap::new(),
                timestamp: Instant::now(),
            }),
            enable_logging: get_env_bool("LATTICE_LOG_STATS").unwrap_or(false),
        }
    }

    /// Add `value` to given counter
    pub fn add(&self, stat_type: StatType, detail: DetailType, value: u64) {
        self.add_dir(stat_type, detail, Direction::In, value)
    }

    /// Add `value` to the given counter and to the `All` counter of its type
    pub fn add_dir(&self, stat_type: StatType, detail: DetailType, dir: Direction, value: u64) {
        if value == 0 {
            return;
        }

        if self.enable_logging {
            debug!(
                "Stat: {:?}::{:?}::{:?} += {}",
                stat_type, detail, dir, value
            );
        }

        let key = CounterKey::new(stat_type, detail, dir);
        let all_key = CounterKey::new(stat_type, DetailType::All, dir);

        // Two steps, so the common case only needs the read lock
        {
            let lock = self.mutables.read().unwrap();
            if let (Some(counter), Some(all)) = (lock.counters.get(&key), lock.counters.get(&all_key))
            {
                counter.add(value);
                if key != all_key {
                    all.add(value);
                }
                return;
            }
        }

        let mut lock = self.mutables.write().unwrap();
        lock.counters.entry(key).or_default().add(value);
        if key != all_key {
            lock.counters.entry(all_key).or_default().add(value);
        }
    }

    pub fn inc(&self, stat_type: StatType, detail: DetailType) {
        self.add_dir(stat_type, detail, Direction::In, 1)
    }

    pub fn inc_dir(&self, stat_type: StatType, detail: DetailType, dir: Direction) {
        self.add_dir(stat_type, detail, dir, 1)
    }

    pub fn sample(&self, sample: Sample, value: i64, expected_min_max: (i64, i64)) {
        if self.enable_logging {
            debug!("Sample: {:?} -> {}", sample, value);
        }

        {
            let lock = self.mutables.read().unwrap();
            if let Some(sampler) = lock.samplers.get(&sample) {
                sampler.add(value);
                return;
            }
        }

        let mut lock = self.mutables.write().unwrap();
        lock.samplers
            .entry(sample)
            .or_insert_with(|| SamplerEntry::new(self.config.max_samples, expected_min_max))
            .add(value)
    }

    /// Drains the collected samples
    pub fn samples(&self, sample: Sample) -> Vec<i64> {
        let lock = self.mutables.read().unwrap();
        lock.samplers
            .get(&sample)
            .map(|s| s.collect())
            .unwrap_or_default()
    }

    /// Returns current value for the given counter
    pub fn count(&self, stat_type: StatType, detail: DetailType, dir: Direction) -> u64 {
        let key = CounterKey::new(stat_type, detail, dir);
        self.mutables
            .read()
            .unwrap()
            .counters
            .get(&key)
            .map(|i| i.value())
            .unwrap_or_default()
    }

    /// Returns the duration since `clear()` was last called, or since creation
    pub fn last_reset(&self) -> Duration {
        self.mutables.read().unwrap().timestamp.elapsed()
    }

    pub fn clear(&self) {
        let mut lock = self.mutables.write().unwrap();
        lock.counters.clear();
        lock.samplers.clear();
        lock.timestamp = Instant::now();
    }

    pub fn log_counters(&self, sink: &mut dyn StatsLogSink) -> Result<()> {
        let lock = self.mutables.read().unwrap();
        sink.begin()?;
        if self.config.log_headers {
            sink.write_header("counters", SystemTime::now())?;
        }
        let now = SystemTime::now();
        for (key, entry) in &lock.counters {
            sink.write_counter_entry(
                now,
                key.stat_type.as_str(),
                key.detail.as_str(),
                key.dir.as_str(),
                entry.value(),
            )?;
        }
        sink.finalize();
        Ok(())
    }

    pub fn log_samples(&self, sink: &mut dyn StatsLogSink) -> Result<()> {
        let lock = self.mutables.read().unwrap();
        sink.begin()?;
        if self.config.log_headers {
            sink.write_header("samples", SystemTime::now())?;
        }
        let now = SystemTime::now();
        for (sample, entry) in &lock.samplers {
            sink.write_sampler_entry(now, sample.as_str(), entry.collect(), entry.expected_min_max)?;
        }
        sink.finalize();
        Ok(())
    }

    pub fn dump(&self, category: StatCategory) -> Result<serde_json::Value> {
        let mut sink = StatsJsonWriter::new();
        match category {
            StatCategory::Counters => self.log_counters(&mut sink)?,
            StatCategory::Samples => self.log_samples(&mut sink)?,
        }
        Ok(sink.finish())
    }
}

#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
struct CounterKey {
    stat_type: StatType,
    detail: DetailType,
    dir: Direction,
}

impl CounterKey {
    fn new(stat_type: StatType, detail: DetailType, dir: Direction) -> Self {
        Self {
            stat_type,
            detail,
            dir,
        }
    }
}

pub enum StatCategory {
    Counters,
    Samples,
}

struct StatMutables {
    /// Sorted by key to keep the log output stable
    counters: BTreeMap<CounterKey, CounterEntry>,
    samplers: BTreeMap<Sample, SamplerEntry>,
    /// Time of last clear() call
    timestamp: Instant,
}

#[derive(Default)]
struct CounterEntry(AtomicU64);

impl CounterEntry {
    fn add(&self, value: u64) {
        self.0.fetch_add(value, Ordering::SeqCst);
    }

    fn value(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

struct SamplerEntry {
    samples: Mutex<BoundedVecDeque<i64>>,
    expected_min_max: (i64, i64),
}

impl SamplerEntry {
    fn new(max_samples: usize, expected_min_max: (i64, i64)) -> Self {
        Self {
            samples: Mutex::new(BoundedVecDeque::new(max_samples)),
            expected_min_max,
        }
    }

    fn add(&self, value: i64) {
        self.samples.lock().unwrap().push_back(value);
    }

    fn collect(&self) -> Vec<i64> {
        self.samples.lock().unwrap().drain(..).collect()
    }
}
