//! Mutable statistics kept per tag and per (server, tag) pair.
//!
//! These are thin state holders over [`Smoother`]; all policy lives in the
//! controller. Missing entries mean "no data", never zero.

use weir_smoother::Smoother;

use crate::quota::TagQuota;

/// Which side of a storage operation a cost or quota refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OpType {
    Read,
    Write,
}

/// Smoothed read and write cost rates for one tag on one storage server.
///
/// Updated only through absolute levels: each telemetry report carries the
/// server's current measurement and overwrites the tracked level. Entries the
/// server stops reporting simply retain their last level.
#[derive(Debug)]
pub(crate) struct ThroughputCounters {
    read_cost: Smoother,
    write_cost: Smoother,
}

impl ThroughputCounters {
    pub(crate) fn new(folding_time: f64) -> Self {
        Self {
            read_cost: Smoother::new(folding_time),
            write_cost: Smoother::new(folding_time),
        }
    }

    pub(crate) fn update_cost(&mut self, now: f64, new_cost: f64, op: OpType) {
        match op {
            OpType::Read => self.read_cost.set_total(now, new_cost),
            OpType::Write => self.write_cost.set_total(now, new_cost),
        }
    }

    pub(crate) fn cost(&self, now: f64, op: OpType) -> f64 {
        match op {
            OpType::Read => self.read_cost.smooth_total(now),
            OpType::Write => self.write_cost.smooth_total(now),
        }
    }
}

/// Statistics for one tag, aggregated across all storage servers: its quota,
/// its transaction arrival rate and the per-client rate most recently
/// published for it.
#[derive(Debug)]
pub(crate) struct PerTagStatistics {
    quota: Option<TagQuota>,
    transaction_counter: Smoother,
    per_client_rate: Smoother,
}

impl PerTagStatistics {
    pub(crate) fn new(folding_time: f64) -> Self {
        Self {
            quota: None,
            transaction_counter: Smoother::new(folding_time),
            per_client_rate: Smoother::new(folding_time),
        }
    }

    pub(crate) fn quota(&self) -> Option<TagQuota> {
        self.quota
    }

    pub(crate) fn set_quota(&mut self, quota: TagQuota) {
        self.quota = Some(quota);
    }

    pub(crate) fn clear_quota(&mut self) {
        self.quota = None;
    }

    pub(crate) fn add_transactions(&mut self, now: f64, count: u32) {
        self.transaction_counter.add_delta(now, f64::from(count));
    }

    pub(crate) fn transaction_rate(&self, now: f64) -> f64 {
        self.transaction_counter.smooth_rate(now)
    }

    /// Fold `target_tps` into the published per-client rate and return the
    /// new advertisement.
    ///
    /// The target is shared by every client of the tag, and all clients must
    /// be handed the same number, so the published limit is scaled by the
    /// ratio of the target to the observed arrival rate, clamped to the
    /// target above and `min_rate` below. Returns `None` when no arrivals
    /// have been observed; with no arrival rate there is nothing to
    /// apportion.
    pub(crate) fn update_per_client_limit(
        &mut self,
        now: f64,
        target_tps: f64,
        min_rate: f64,
    ) -> Option<f64> {
        let transaction_rate = self.transaction_counter.smooth_rate(now);
        if transaction_rate <= 0.0 {
            return None;
        }
        let new_rate = min_rate
            .max(target_tps.min((target_tps / transaction_rate) * self.per_client_rate.smooth_total(now)));
        self.per_client_rate.set_total(now, new_rate);
        Some(self.per_client_rate.total())
    }
}

#[cfg(test)]
mod tests {
    use super::{OpType, PerTagStatistics, ThroughputCounters};
    use crate::quota::TagQuota;

    #[test]
    fn quota_set_and_clear() {
        let mut stats = PerTagStatistics::new(5.0);
        assert!(stats.quota().is_none());
        stats.set_quota(TagQuota {
            total_read: 100.0,
            ..TagQuota::default()
        });
        assert!(stats.quota().is_some());
        stats.clear_quota();
        assert!(stats.quota().is_none());
    }

    #[test]
    fn throughput_counters_track_sides_independently() {
        let mut counters = ThroughputCounters::new(1.0);
        counters.update_cost(0.0, 40.0, OpType::Read);
        counters.update_cost(0.0, 7.0, OpType::Write);
        assert!((counters.cost(20.0, OpType::Read) - 40.0).abs() < 1e-6);
        assert!((counters.cost(20.0, OpType::Write) - 7.0).abs() < 1e-6);
    }

    #[test]
    fn per_client_limit_absent_without_arrivals() {
        let mut stats = PerTagStatistics::new(5.0);
        assert!(stats.update_per_client_limit(1.0, 10.0, 1.0).is_none());
    }

    #[test]
    fn per_client_limit_starts_at_floor() {
        let mut stats = PerTagStatistics::new(5.0);
        let mut now = 0.0;
        for _ in 0..10 {
            now += 0.1;
            stats.add_transactions(now, 1);
        }
        // The rate smoother starts from zero, so the first advertisement is
        // the floor.
        let limit = stats
            .update_per_client_limit(now, 100.0, 1.0)
            .expect("arrivals observed");
        assert!((limit - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn per_client_limit_climbs_to_target() {
        let mut stats = PerTagStatistics::new(5.0);
        let mut limit = 0.0;
        // Five arrivals per second against a target of fifty: the published
        // limit must ratchet up from the floor to the full target.
        for step in 1_u32..=3_000 {
            let now = f64::from(step) * 0.1;
            stats.add_transactions(now, step % 2);
            limit = stats
                .update_per_client_limit(now, 50.0, 1.0)
                .expect("arrivals observed");
        }
        assert!((limit - 50.0).abs() < 1.0);
    }

    #[test]
    fn per_client_limit_never_exceeds_target() {
        let mut stats = PerTagStatistics::new(5.0);
        let mut now = 0.0;
        for _ in 0..200 {
            now += 0.1;
            stats.add_transactions(now, 3);
            let limit = stats
                .update_per_client_limit(now, 4.0, 1.0)
                .expect("arrivals observed");
            assert!(limit <= 4.0 + f64::EPSILON);
        }
    }
}
