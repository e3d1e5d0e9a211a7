//! The tag throttling control loop.
//!
//! Quotas are specified in cost units per second -- cost being the
//! bytes-proportional scalar the storage engine attributes to each operation
//! -- but the limits handed to clients must be in transactions per second,
//! because throttling happens at the front of a transaction before its cost
//! is known. The controller bridges the two with the tag's observed average
//! cost per transaction, and reconciles four throughput notions:
//!
//! * **Desired TPS**: the rate the tag could sustain if it consumed its
//!   entire total quota at its current average transaction cost.
//! * **Reserved TPS**: the floor implied by the tag's reserved quota; below
//!   this rate the tag must not be throttled at all.
//! * **Limiting TPS**: the rate the unhealthiest storage server can bear.
//!   Each server publishes a throttling ratio -- the fraction of its current
//!   cost rate it can keep serving -- and the tag's share of that sustainable
//!   cost is apportioned by its share of total quota among the tags active
//!   on that server.
//! * **Per-client TPS**: the advertised limit. The target rate
//!   (`max(reserved, min(limiting, desired))`) is shared by every client of
//!   the tag, and all clients must receive the same number, so the
//!   advertisement is scaled by the ratio of target to observed arrival rate
//!   and smoothed to damp oscillation.

use std::sync::{Mutex, MutexGuard, PoisonError};

use metrics::{counter, gauge};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, info, warn};
use weir_smoother::{Clock, RealClock, seconds};

use crate::config::Config;
use crate::quota::{ServerId, Tag, TagQuota};
use crate::stats::{OpType, PerTagStatistics, ThroughputCounters};
use crate::store::{self, Database, Transaction};
use crate::telemetry::StorageQueueInfo;

/// Transaction priority classes addressed by published limits.
///
/// Batch and default priority transactions currently receive identical
/// limits; the map is keyed by priority so that they can diverge without a
/// wire change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Priority {
    /// Background work, first to be shed.
    Batch,
    /// Ordinary client transactions.
    Default,
}

/// Expiration marker on a published limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiration {
    /// The limit holds until replaced by a later advertisement.
    Never,
}

/// The advisory limit handed to each client of a tag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClientTagLimit {
    /// Transactions per second each client may start.
    pub tps: f64,
    /// How long the advice remains valid.
    pub expiration: Expiration,
}

/// Published limits: priority to tag to advisory limit. An empty map means
/// "no advice this cycle"; clients fall back to prior advice or run
/// unthrottled.
pub type ClientRateMap = FxHashMap<Priority, FxHashMap<Tag, ClientTagLimit>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LimitKind {
    Total,
    Reserved,
}

fn min_present(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, None) => a,
        (None, b) => b,
    }
}

fn max_present(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, None) => a,
        (None, b) => b,
    }
}

#[derive(Debug)]
struct Inner {
    folding_time: f64,
    change_id: u64,
    throttling_ratios: FxHashMap<ServerId, Option<f64>>,
    tag_statistics: FxHashMap<Tag, PerTagStatistics>,
    throughput: FxHashMap<ServerId, FxHashMap<Tag, ThroughputCounters>>,
}

impl Inner {
    /// Cost rate for the tag on one storage server.
    fn cost_on_server_for_tag(
        &self,
        now: f64,
        server: ServerId,
        tag: &Tag,
        op: OpType,
    ) -> Option<f64> {
        self.throughput
            .get(&server)?
            .get(tag)
            .map(|counters| counters.cost(now, op))
    }

    /// Cost rate on one storage server, summed across all tags.
    fn cost_on_server(&self, now: f64, server: ServerId, op: OpType) -> Option<f64> {
        let tags = self.throughput.get(&server)?;
        Some(tags.values().map(|counters| counters.cost(now, op)).sum())
    }

    /// Cost rate for the tag, summed across all storage servers.
    fn cost_for_tag(&self, now: f64, tag: &Tag, op: OpType) -> f64 {
        self.throughput
            .keys()
            .filter_map(|server| self.cost_on_server_for_tag(now, *server, tag, op))
            .sum()
    }

    fn transaction_rate(&self, now: f64, tag: &Tag) -> Option<f64> {
        self.tag_statistics
            .get(tag)
            .map(|stats| stats.transaction_rate(now))
    }

    /// Cluster-wide average cost a transaction with this tag incurs. Absent
    /// when no arrivals have been observed or the cost itself rounds to
    /// nothing; a zero average would make every quotient below meaningless.
    fn average_transaction_cost(&self, now: f64, tag: &Tag, op: OpType) -> Option<f64> {
        let rate = self.transaction_rate(now, tag)?;
        if rate <= 0.0 {
            return None;
        }
        let average = self.cost_for_tag(now, tag, op) / rate;
        (average > 0.0).then_some(average)
    }

    /// Average cost a transaction with this tag incurs on one server.
    fn average_transaction_cost_on_server(
        &self,
        now: f64,
        tag: &Tag,
        server: ServerId,
        op: OpType,
    ) -> Option<f64> {
        let cost = self.cost_on_server_for_tag(now, server, tag, op)?;
        let rate = self.transaction_rate(now, tag)?;
        if rate <= 0.0 {
            return None;
        }
        let average = cost / rate;
        (average > 0.0).then_some(average)
    }

    /// A quota field, absent when unset. Zero means "no such quota".
    fn quota_field(&self, tag: &Tag, op: OpType, kind: LimitKind) -> Option<f64> {
        let quota = self.tag_statistics.get(tag)?.quota()?;
        let value = match (kind, op) {
            (LimitKind::Total, OpType::Read) => quota.total_read,
            (LimitKind::Total, OpType::Write) => quota.total_write,
            (LimitKind::Reserved, OpType::Read) => quota.reserved_read,
            (LimitKind::Reserved, OpType::Write) => quota.reserved_write,
        };
        (value > 0.0).then_some(value)
    }

    /// Of all tags performing meaningful work on the given server, the share
    /// of total quota allocated to `tag`. Absent when the tag's own share is
    /// zero: a server cannot constrain a tag that holds no quota on it.
    fn quota_ratio(&self, tag: &Tag, server: ServerId, op: OpType) -> Option<f64> {
        let participating = self.throughput.get(&server)?;
        let mut sum_quota = 0.0;
        let mut tag_quota = 0.0;
        for t in participating.keys() {
            let q = self
                .quota_field(t, op, LimitKind::Total)
                .unwrap_or_default();
            sum_quota += q;
            if t == tag {
                tag_quota = q;
            }
        }
        if tag_quota <= 0.0 {
            return None;
        }
        debug_assert!(sum_quota > 0.0);
        Some(tag_quota / sum_quota)
    }

    /// The cost rate one server says it can keep serving: its throttling
    /// ratio applied to its current cost rate. Absent unless the server has
    /// published a ratio and has a current cost; healthy servers publish no
    /// ratio and constrain nothing.
    fn limiting_cost(&self, now: f64, server: ServerId, op: OpType) -> Option<f64> {
        let ratio = (*self.throttling_ratios.get(&server)?)?;
        let current = self.cost_on_server(now, server, op)?;
        Some(ratio * current)
    }

    fn limiting_tps_on_server(
        &self,
        now: f64,
        server: ServerId,
        tag: &Tag,
        op: OpType,
    ) -> Option<f64> {
        let limiting_cost = self.limiting_cost(now, server, op)?;
        let quota_ratio = self.quota_ratio(tag, server, op)?;
        let average_cost = self.average_transaction_cost_on_server(now, tag, server, op)?;
        Some(limiting_cost * quota_ratio / average_cost)
    }

    fn limiting_tps_for_op(&self, now: f64, tag: &Tag, op: OpType) -> Option<f64> {
        let mut result = None;
        for server in self.throttling_ratios.keys() {
            let tps = self.limiting_tps_on_server(now, *server, tag, op);
            result = min_present(result, tps);
        }
        result
    }

    fn limiting_tps(&self, now: f64, tag: &Tag) -> Option<f64> {
        min_present(
            self.limiting_tps_for_op(now, tag, OpType::Read),
            self.limiting_tps_for_op(now, tag, OpType::Write),
        )
    }

    fn desired_tps_for_op(&self, now: f64, tag: &Tag, op: OpType) -> Option<f64> {
        let total = self.quota_field(tag, op, LimitKind::Total)?;
        let average_cost = self.average_transaction_cost(now, tag, op)?;
        Some(total / average_cost)
    }

    fn desired_tps(&self, now: f64, tag: &Tag) -> Option<f64> {
        min_present(
            self.desired_tps_for_op(now, tag, OpType::Read),
            self.desired_tps_for_op(now, tag, OpType::Write),
        )
    }

    fn reserved_tps_for_op(&self, now: f64, tag: &Tag, op: OpType) -> Option<f64> {
        let reserved = self.quota_field(tag, op, LimitKind::Reserved)?;
        let average_cost = self.average_transaction_cost(now, tag, op)?;
        Some(reserved / average_cost)
    }

    /// The floor is the stricter of the two per-op reserves.
    fn reserved_tps(&self, now: f64, tag: &Tag) -> Option<f64> {
        max_present(
            self.reserved_tps_for_op(now, tag, OpType::Read),
            self.reserved_tps_for_op(now, tag, OpType::Write),
        )
    }

    /// Throughput target for the tag across all clients. Desired is
    /// mandatory: without a quota and an observed cost there is nothing to
    /// aim for. A missing limiting rate means no server is applying
    /// back-pressure, and a missing reserve means no floor.
    fn target_tps(&self, now: f64, tag: &Tag) -> Option<f64> {
        let desired = self.desired_tps(now, tag)?;
        let capped = self
            .limiting_tps(now, tag)
            .map_or(desired, |limiting| limiting.min(desired));
        Some(
            self.reserved_tps(now, tag)
                .map_or(capped, |reserved| capped.max(reserved)),
        )
    }

    /// Drop quotas on tags missing from the latest scan; drop the whole
    /// record once no telemetry mentions the tag either.
    fn reconcile_unseen_tags(&mut self, seen: &FxHashSet<Tag>) {
        let throughput = &self.throughput;
        self.tag_statistics.retain(|tag, stats| {
            if seen.contains(tag) {
                return true;
            }
            stats.clear_quota();
            throughput.values().any(|tags| tags.contains_key(tag))
        });
    }
}

/// The cluster-wide tag throttling controller.
///
/// One instance per process. Telemetry producers, the quota watcher and rate
/// consumers all call into the same instance; every operation locks the
/// internal tables, runs to completion without yielding and unlocks, so no
/// caller coordination is required.
#[derive(Debug)]
pub struct GlobalTagThrottler<C = RealClock> {
    clock: C,
    config: Config,
    inner: Mutex<Inner>,
}

impl GlobalTagThrottler<RealClock> {
    /// Create a controller driven by real-clock time.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self::with_clock(config, RealClock::default())
    }
}

impl<C> GlobalTagThrottler<C>
where
    C: Clock,
{
    /// Create a controller driven by the supplied clock.
    pub fn with_clock(config: Config, clock: C) -> Self {
        Self {
            clock,
            config,
            inner: Mutex::new(Inner {
                folding_time: config.smoothing_folding_time,
                change_id: 0,
                throttling_ratios: FxHashMap::default(),
                tag_statistics: FxHashMap::default(),
                throughput: FxHashMap::default(),
            }),
        }
    }

    fn now(&self) -> f64 {
        seconds(self.clock.ticks_elapsed())
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Upsert the tag's quota, creating its record if absent.
    pub fn set_quota(&self, tag: &Tag, quota: TagQuota) {
        let mut inner = self.lock();
        let folding_time = inner.folding_time;
        inner
            .tag_statistics
            .entry(tag.clone())
            .or_insert_with(|| PerTagStatistics::new(folding_time))
            .set_quota(quota);
    }

    /// Clear the quota on the tag. Statistics are retained until the next
    /// reconciliation pass decides their fate.
    pub fn remove_quota(&self, tag: &Tag) {
        let mut inner = self.lock();
        if let Some(stats) = inner.tag_statistics.get_mut(tag) {
            stats.clear_quota();
        }
    }

    /// Record `count` transaction arrivals for the tag, creating its record
    /// if absent.
    pub fn add_requests(&self, tag: &Tag, count: u32) {
        let now = self.now();
        let mut inner = self.lock();
        let folding_time = inner.folding_time;
        inner
            .tag_statistics
            .entry(tag.clone())
            .or_insert_with(|| PerTagStatistics::new(folding_time))
            .add_transactions(now, count);
    }

    /// Publish the latest health signal for one server. `None` means the
    /// server reports no back-pressure. Unknown servers are accepted; they
    /// become participants.
    pub fn set_throttling_ratio(&self, server: ServerId, ratio: Option<f64>) {
        let mut inner = self.lock();
        inner.throttling_ratios.insert(server, ratio);
    }

    /// Fold one storage server report into the throughput tables. Tags the
    /// server stops reporting are not zeroed; they retain their last
    /// absolute level.
    pub fn try_update_auto_throttling(&self, info: &StorageQueueInfo) {
        let now = self.now();
        let mut inner = self.lock();
        let folding_time = inner.folding_time;
        let by_tag = inner.throughput.entry(info.server_id).or_default();
        for report in &info.busiest_read_tags {
            by_tag
                .entry(report.tag.clone())
                .or_insert_with(|| ThroughputCounters::new(folding_time))
                .update_cost(now, report.rate, OpType::Read);
        }
        for report in &info.busiest_write_tags {
            by_tag
                .entry(report.tag.clone())
                .or_insert_with(|| ThroughputCounters::new(folding_time))
                .update_cost(now, report.rate, OpType::Write);
        }
        counter!("telemetry_reports_received").increment(1);
    }

    /// Compute the current advisory limits.
    ///
    /// All-or-nothing: if any tracked tag is missing a component of its
    /// target -- no quota, no telemetry, no observed arrivals -- the whole
    /// response is empty and clients keep their prior advice.
    pub fn get_client_rates(&self) -> ClientRateMap {
        let now = self.now();
        let mut inner = self.lock();
        let inner = &mut *inner;

        let mut targets = Vec::with_capacity(inner.tag_statistics.len());
        for tag in inner.tag_statistics.keys() {
            let Some(target) = inner.target_tps(now, tag) else {
                return ClientRateMap::default();
            };
            targets.push((tag.clone(), target));
        }

        let mut limits = FxHashMap::default();
        for (tag, target) in targets {
            let Some(stats) = inner.tag_statistics.get_mut(&tag) else {
                continue;
            };
            match stats.update_per_client_limit(now, target, self.config.min_per_client_rate) {
                Some(tps) => {
                    gauge!("per_client_tps", "tag" => tag.to_string()).set(tps);
                    limits.insert(
                        tag,
                        ClientTagLimit {
                            tps,
                            expiration: Expiration::Never,
                        },
                    );
                }
                None => return ClientRateMap::default(),
            }
        }

        if limits.is_empty() {
            return ClientRateMap::default();
        }
        let mut result = ClientRateMap::default();
        result.insert(Priority::Batch, limits.clone());
        result.insert(Priority::Default, limits);
        result
    }

    /// Epoch advanced each time the quota table is re-read. Observers use it
    /// to detect that published limits may have shifted.
    pub fn throttled_tag_change_id(&self) -> u64 {
        self.lock().change_id
    }

    /// Number of tracked tags.
    // TODO: count only tags that have a quota set.
    pub fn auto_throttle_count(&self) -> i64 {
        self.lock().tag_statistics.len() as i64
    }

    /// Reserved; busy-tag accounting is not performed by this controller.
    pub fn busy_read_tag_count(&self) -> u32 {
        0
    }

    /// Reserved; busy-tag accounting is not performed by this controller.
    pub fn busy_write_tag_count(&self) -> u32 {
        0
    }

    /// Manual throttles are not implemented by this controller.
    pub fn manual_throttle_count(&self) -> i64 {
        0
    }

    /// Quota-driven throttling is always on.
    pub fn is_auto_throttling_enabled(&self) -> bool {
        true
    }

    /// Watch the durable quota table, folding every change into the
    /// controller.
    ///
    /// Every poll period this scans the quota key range at system priority,
    /// upserts each decoded row, reconciles tags that have disappeared and
    /// advances the change epoch. Scan failures are routed through the
    /// transaction's retry protocol and the poll resumes; the task runs
    /// until `shutdown` fires.
    ///
    /// # Errors
    ///
    /// Returns an error only if the store's retry protocol gives up.
    pub async fn monitor_quota_changes<D>(
        &self,
        db: &D,
        shutdown: weir_signal::Watcher,
    ) -> Result<(), store::Error>
    where
        D: Database,
    {
        info!("quota monitor running");
        let shutdown_wait = shutdown.recv();
        tokio::pin!(shutdown_wait);
        loop {
            tokio::select! {
                result = self.poll_quotas_once(db) => { result?; }
                () = &mut shutdown_wait => {
                    info!("shutdown signal received");
                    return Ok(());
                }
            }
            tokio::select! {
                () = tokio::time::sleep(self.config.quota_poll_interval()) => {}
                () = &mut shutdown_wait => {
                    info!("shutdown signal received");
                    return Ok(());
                }
            }
        }
    }

    async fn poll_quotas_once<D>(&self, db: &D) -> Result<(), store::Error>
    where
        D: Database,
    {
        let mut tx = db.transaction();
        loop {
            match tx.read_quota_range(self.config.quota_scan_limit).await {
                Ok(entries) => {
                    debug!(rows = entries.len(), "read current tag quotas");
                    self.apply_quota_scan(entries);
                    counter!("quota_scan_cycles").increment(1);
                    debug!("tag quota change signaled");
                    return Ok(());
                }
                Err(error) => {
                    warn!(%error, "failed to read tag quotas");
                    counter!("quota_scan_failures").increment(1);
                    tx.on_error(error).await?;
                }
            }
        }
    }

    fn apply_quota_scan(&self, entries: Vec<(Tag, TagQuota)>) {
        let mut inner = self.lock();
        let folding_time = inner.folding_time;
        let mut seen = FxHashSet::default();
        seen.reserve(entries.len());
        for (tag, quota) in entries {
            seen.insert(tag.clone());
            inner
                .tag_statistics
                .entry(tag)
                .or_insert_with(|| PerTagStatistics::new(folding_time))
                .set_quota(quota);
        }
        inner.reconcile_unseen_tags(&seen);
        inner.change_id += 1;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};

    use weir_smoother::{Clock, TICKS_PER_SECOND};

    use super::{GlobalTagThrottler, Priority};
    use crate::config::Config;
    use crate::quota::{ServerId, Tag, TagQuota};
    use crate::telemetry::{StorageQueueInfo, TagCostReport};

    #[derive(Debug, Clone, Default)]
    struct ManualClock(Arc<AtomicU64>);

    impl ManualClock {
        fn advance_millis(&self, millis: u64) {
            self.0
                .fetch_add(millis * (TICKS_PER_SECOND / 1_000), Ordering::Relaxed);
        }
    }

    impl Clock for ManualClock {
        fn ticks_elapsed(&self) -> u64 {
            self.0.load(Ordering::Relaxed)
        }
    }

    fn read_report(server: ServerId, tag: &Tag, rate: f64) -> StorageQueueInfo {
        let mut info = StorageQueueInfo::new(server);
        info.busiest_read_tags.push(TagCostReport::new(tag.clone(), rate));
        info
    }

    /// Drive one client at 5 TPS and 6 cost units per transaction for
    /// `secs` seconds, ten steps per second to keep the arrival smoother's
    /// discretization ripple small.
    fn drive_simple_client(
        throttler: &GlobalTagThrottler<ManualClock>,
        clock: &ManualClock,
        tag: &Tag,
        server: ServerId,
        secs: u32,
    ) {
        for step in 1..=(secs * 10) {
            clock.advance_millis(100);
            throttler.add_requests(tag, step % 2);
            throttler.try_update_auto_throttling(&read_report(server, tag, 30.0));
            throttler.set_throttling_ratio(server, None);
            let _ = throttler.get_client_rates();
        }
    }

    #[test]
    fn limits_match_across_priorities() {
        let clock = ManualClock::default();
        let throttler = GlobalTagThrottler::with_clock(Config::default(), clock.clone());
        let server = ServerId::random();
        let tag = Tag::from("sampleTag1");
        throttler.set_quota(
            &tag,
            TagQuota {
                total_read: 100.0,
                ..TagQuota::default()
            },
        );

        // One client at 5 TPS, 6 cost units per transaction, against a quota
        // of 100: the advertised limit converges on 100/6.
        drive_simple_client(&throttler, &clock, &tag, server, 600);
        let rates = throttler.get_client_rates();
        let batch = rates.get(&Priority::Batch).expect("batch limits");
        let default = rates.get(&Priority::Default).expect("default limits");
        assert_eq!(batch, default);
        let limit = batch.get(&tag).expect("limit for tag");
        assert!(
            (limit.tps - 100.0 / 6.0).abs() < 1.0,
            "limit {} not near {}",
            limit.tps,
            100.0 / 6.0
        );
    }

    #[test]
    fn missing_telemetry_suppresses_all_limits() {
        let clock = ManualClock::default();
        let throttler = GlobalTagThrottler::with_clock(Config::default(), clock.clone());
        let tag = Tag::from("sampleTag1");
        throttler.set_quota(
            &tag,
            TagQuota {
                total_read: 100.0,
                ..TagQuota::default()
            },
        );
        for _ in 0..10 {
            clock.advance_millis(1_000);
            throttler.add_requests(&tag, 5);
        }
        assert!(throttler.get_client_rates().is_empty());
    }

    #[test]
    fn missing_arrivals_suppress_all_limits() {
        let clock = ManualClock::default();
        let throttler = GlobalTagThrottler::with_clock(Config::default(), clock.clone());
        let server = ServerId::random();
        let tag = Tag::from("sampleTag1");
        throttler.set_quota(
            &tag,
            TagQuota {
                total_read: 100.0,
                ..TagQuota::default()
            },
        );
        for _ in 0..10 {
            clock.advance_millis(1_000);
            throttler.try_update_auto_throttling(&read_report(server, &tag, 30.0));
        }
        assert!(throttler.get_client_rates().is_empty());
    }

    #[test]
    fn one_incomplete_tag_empties_the_whole_response() {
        let clock = ManualClock::default();
        let throttler = GlobalTagThrottler::with_clock(Config::default(), clock.clone());
        let server = ServerId::random();
        let healthy_tag = Tag::from("sampleTag1");
        let quotaless_tag = Tag::from("sampleTag2");
        throttler.set_quota(
            &healthy_tag,
            TagQuota {
                total_read: 100.0,
                ..TagQuota::default()
            },
        );
        for _ in 0..60 {
            clock.advance_millis(1_000);
            throttler.add_requests(&healthy_tag, 5);
            throttler.try_update_auto_throttling(&read_report(server, &healthy_tag, 30.0));
            let _ = throttler.get_client_rates();
        }
        assert!(!throttler.get_client_rates().is_empty());

        // The second tag arrives with no quota; the all-or-nothing policy
        // empties the response for both.
        throttler.add_requests(&quotaless_tag, 1);
        assert!(throttler.get_client_rates().is_empty());
    }

    #[test]
    fn ratio_only_servers_do_not_constrain() {
        let clock = ManualClock::default();
        let throttler = GlobalTagThrottler::with_clock(Config::default(), clock.clone());
        let server = ServerId::random();
        let idle_server = ServerId::random();
        let tag = Tag::from("sampleTag1");
        throttler.set_quota(
            &tag,
            TagQuota {
                total_read: 100.0,
                ..TagQuota::default()
            },
        );
        // A server we have never seen telemetry from reports distress; with
        // no cost on it, it cannot constrain anyone.
        throttler.set_throttling_ratio(idle_server, Some(0.1));
        drive_simple_client(&throttler, &clock, &tag, server, 600);
        let rates = throttler.get_client_rates();
        let limit = rates
            .get(&Priority::Default)
            .and_then(|limits| limits.get(&tag))
            .expect("limit for tag");
        assert!((limit.tps - 100.0 / 6.0).abs() < 1.0);
    }

    #[test]
    fn remove_quota_retains_statistics_until_reconcile() {
        let clock = ManualClock::default();
        let throttler = GlobalTagThrottler::with_clock(Config::default(), clock.clone());
        let tag = Tag::from("sampleTag1");
        throttler.set_quota(
            &tag,
            TagQuota {
                total_read: 100.0,
                ..TagQuota::default()
            },
        );
        throttler.add_requests(&tag, 1);
        throttler.remove_quota(&tag);
        assert_eq!(throttler.auto_throttle_count(), 1);
        assert!(throttler.get_client_rates().is_empty());
    }

    #[test]
    fn reserved_counters_hold_their_constants() {
        let throttler = GlobalTagThrottler::new(Config::default());
        assert_eq!(throttler.busy_read_tag_count(), 0);
        assert_eq!(throttler.busy_write_tag_count(), 0);
        assert_eq!(throttler.manual_throttle_count(), 0);
        assert!(throttler.is_auto_throttling_enabled());
        assert_eq!(throttler.throttled_tag_change_id(), 0);
        assert_eq!(throttler.auto_throttle_count(), 0);
    }
}
