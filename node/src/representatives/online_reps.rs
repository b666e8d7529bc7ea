use bounded_vec_deque::BoundedVecDeque;
use lattice_core::{utils::ContainerInfo, Account, Amount};
use lattice_ledger::RepWeightCache;
#[cfg(test)]
use mock_instant::thread_local::Instant;
#[cfg(not(test))]
use std::time::Instant;
use std::{cmp::max, collections::HashMap, mem::size_of, sync::Arc, time::Duration};
use tracing::debug;

pub const DEFAULT_ONLINE_WEIGHT_MINIMUM: Amount = Amount::nano(60_000_000);

/// Number of online weight samples the trend is computed from
const MAX_SAMPLES: usize = 4032;

#[derive(Clone, Debug, PartialEq)]
pub struct OnlineRepsConfig {
    /// Quorum is never computed from less than this amount of stake
    pub online_weight_minimum: Amount,
    /// Percentage of online stake needed for quorum
    pub quorum_percent: u8,
    /// Representatives that did not vote within this period are offline
    pub weight_period: Duration,
}

impl Default for OnlineRepsConfig {
    fn default() -> Self {
        Self {
            online_weight_minimum: DEFAULT_ONLINE_WEIGHT_MINIMUM,
            quorum_percent: 67,
            weight_period: Duration::from_secs(5 * 60),
        }
    }
}

/// Track online representatives and trend online weight
pub struct OnlineReps {
    config: OnlineRepsConfig,
    rep_weights: Arc<RepWeightCache>,
    reps: HashMap<Account, Instant>,
    samples: BoundedVecDeque<Amount>,
    last_sample: Instant,
    trended: Amount,
    online: Amount,
}

impl OnlineReps {
    pub fn new(config: OnlineRepsConfig, rep_weights: Arc<RepWeightCache>) -> Self {
        Self {
            config,
            rep_weights,
            reps: HashMap::new(),
            samples: BoundedVecDeque::new(MAX_SAMPLES),
            last_sample: Instant::now(),
            trended: Amount::zero(),
            online: Amount::zero(),
        }
    }

    /// Add voting account `rep_account` to the set of online representatives
    pub fn observe(&mut self, rep_account: Account) {
        if self.rep_weights.weight(&rep_account.into()).is_zero() {
            return;
        }

        let new_insert = self.reps.insert(rep_account, Instant::now()).is_none();
        let trimmed = self.trim();
        if new_insert || trimmed {
            self.calculate_online();
        }

        if self.last_sample.elapsed() >= self.config.weight_period {
            self.sample();
        }
    }

    /// Records the current online weight and recalculates the trend from all samples
    pub fn sample(&mut self) {
        self.last_sample = Instant::now();
        self.samples.push_back(self.online);
        self.trended = self.calculate_trended();
        debug!(online = %self.online, trended = %self.trended, "Online weight sampled");
    }

    /// Returns the trended online stake
    pub fn trended(&self) -> Amount {
        self.trended
    }

    pub fn set_trended(&mut self, trended: Amount) {
        self.trended = trended;
    }

    /// Returns the current online stake
    pub fn online(&self) -> Amount {
        self.online
    }

    pub fn set_online(&mut self, amount: Amount) {
        self.online = amount;
    }

    /// Returns the quorum required for confirmation
    pub fn quorum_delta(&self) -> Amount {
        let weight = max(self.online, self.trended).number();
        let percent = self.config.quorum_percent.min(100) as u128;
        // Split the multiplication so that it cannot overflow
        let delta = (weight / 100) * percent + (weight % 100) * percent / 100;
        max(self.config.online_weight_minimum, Amount::raw(delta))
    }

    /// Representatives that voted within the weight period
    pub fn list(&self) -> Vec<Account> {
        self.reps.keys().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.reps.clear();
        self.online = Amount::zero();
    }

    pub fn len(&self) -> usize {
        self.reps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reps.is_empty()
    }

    fn trim(&mut self) -> bool {
        let period = self.config.weight_period;
        let old_len = self.reps.len();
        self.reps.retain(|_, last_vote| last_vote.elapsed() < period);
        self.reps.len() != old_len
    }

    fn calculate_online(&mut self) {
        self.online = self
            .reps
            .keys()
            .map(|account| self.rep_weights.weight(&(*account).into()))
            .sum();
    }

    fn calculate_trended(&self) -> Amount {
        let mut samples: Vec<Amount> = self.samples.iter().cloned().collect();
        if samples.is_empty() {
            return Amount::zero();
        }
        samples.sort();
        samples[samples.len() / 2]
    }

    pub fn container_info(&self) -> ContainerInfo {
        ContainerInfo::builder()
            .leaf(
                "reps",
                self.len(),
                size_of::<Account>() + size_of::<Instant>(),
            )
            .leaf("samples", self.samples.len(), size_of::<Amount>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lattice_core::PublicKey;
    use mock_instant::thread_local::MockClock;

    fn create_online_reps(weights: &[(Account, u128)]) -> OnlineReps {
        let rep_weights = Arc::new(RepWeightCache::new());
        for (account, weight) in weights {
            rep_weights.set(PublicKey::from(*account), Amount::raw(*weight));
        }
        let config = OnlineRepsConfig {
            online_weight_minimum: Amount::zero(),
            ..Default::default()
        };
        OnlineReps::new(config, rep_weights)
    }

    #[test]
    fn empty() {
        let reps = create_online_reps(&[]);
        assert!(reps.is_empty());
        assert_eq!(reps.online(), Amount::zero());
        assert_eq!(reps.quorum_delta(), Amount::zero());
    }

    #[test]
    fn observe_rep_with_weight() {
        let rep = Account::from(1u64);
        let mut reps = create_online_reps(&[(rep, 1000)]);

        reps.observe(rep);

        assert_eq!(reps.list(), vec![rep]);
        assert_eq!(reps.online(), Amount::raw(1000));
    }

    #[test]
    fn ignore_rep_without_weight() {
        let mut reps = create_online_reps(&[]);
        reps.observe(Account::from(1u64));
        assert!(reps.is_empty());
    }

    #[test]
    fn reps_go_offline_after_weight_period() {
        let rep1 = Account::from(1u64);
        let rep2 = Account::from(2u64);
        let mut reps = create_online_reps(&[(rep1, 1000), (rep2, 500)]);
        reps.observe(rep1);

        MockClock::advance(Duration::from_secs(5 * 60));
        reps.observe(rep2);

        assert_eq!(reps.list(), vec![rep2]);
        assert_eq!(reps.online(), Amount::raw(500));
    }

    #[test]
    fn quorum_delta_uses_highest_of_online_and_trended() {
        let mut reps = create_online_reps(&[]);
        reps.set_online(Amount::raw(1000));
        assert_eq!(reps.quorum_delta(), Amount::raw(670));

        reps.set_trended(Amount::raw(2000));
        assert_eq!(reps.quorum_delta(), Amount::raw(1340));
    }

    #[test]
    fn quorum_delta_has_a_minimum() {
        let rep_weights = Arc::new(RepWeightCache::new());
        let config = OnlineRepsConfig {
            online_weight_minimum: Amount::raw(5000),
            ..Default::default()
        };
        let mut reps = OnlineReps::new(config, rep_weights);
        reps.set_online(Amount::raw(1000));
        assert_eq!(reps.quorum_delta(), Amount::raw(5000));
    }

    #[test]
    fn quorum_delta_does_not_overflow() {
        let mut reps = create_online_reps(&[]);
        reps.set_online(Amount::MAX);
        assert!(reps.quorum_delta() < Amount::MAX);
        assert!(reps.quorum_delta() > Amount::raw(u128::MAX / 100 * 66));
    }

    #[test]
    fn trended_is_median_of_samples() {
        let mut reps = create_online_reps(&[]);
        for online in [100, 300, 200] {
            reps.set_online(Amount::raw(online));
            reps.sample();
        }
        assert_eq!(reps.trended(), Amount::raw(200));
    }

    #[test]
    fn observe_samples_after_weight_period() {
        let rep = Account::from(1u64);
        let mut reps = create_online_reps(&[(rep, 1000)]);
        MockClock::advance(Duration::from_secs(5 * 60));

        reps.observe(rep);

        assert_eq!(reps.trended(), Amount::raw(1000));
    }
}
