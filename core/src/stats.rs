//! Per-minute operational counters
//!
//! Counters accumulate into one bucket per UTC wall-clock minute so traffic
//! can be charted without locking the hot path: the map is sharded
//! (dashmap) and every counter is a plain atomic. A pruner deletes buckets
//! older than 24 hours, so totals are computed over the retained window and
//! may decrease after pruning.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Timelike, Utc};
use dashmap::DashMap;
use serde::Serialize;

/// How often the pruner scans for expired buckets.
pub const PRUNE_INTERVAL: Duration = Duration::from_secs(10);

/// How long a minute bucket is retained.
pub fn bucket_retention() -> chrono::Duration { chrono::Duration::hours(24) }

#[derive(Default)]
struct MinuteBucket {
    reads: AtomicI64,
    writes: AtomicI64,
    begins: AtomicI64,
    commits: AtomicI64,
    rollbacks: AtomicI64,
    errors: AtomicI64,
    http_requests: AtomicI64,
}

/// Process-wide counters and gauges.
pub struct StatsRegistry {
    minutes: DashMap<String, MinuteBucket>,
    queued_writes: AtomicI64,
    queued_transactions: AtomicI64,
    queued_http_requests: AtomicI64,
    started_at: DateTime<Utc>,
}

impl Default for StatsRegistry {
    fn default() -> Self { Self::new() }
}

impl StatsRegistry {
    pub fn new() -> Self {
        Self {
            minutes: DashMap::new(),
            queued_writes: AtomicI64::new(0),
            queued_transactions: AtomicI64::new(0),
            queued_http_requests: AtomicI64::new(0),
            started_at: Utc::now(),
        }
    }

    fn with_bucket(&self, f: impl FnOnce(&MinuteBucket)) {
        let bucket = self.minutes.entry(minute_key(Utc::now())).or_default();
        f(&bucket);
    }

    pub fn inc_reads(&self) { self.with_bucket(|b| { b.reads.fetch_add(1, Ordering::Relaxed); }) }

    pub fn inc_writes(&self) { self.with_bucket(|b| { b.writes.fetch_add(1, Ordering::Relaxed); }) }

    pub fn inc_begins(&self) { self.with_bucket(|b| { b.begins.fetch_add(1, Ordering::Relaxed); }) }

    pub fn inc_commits(&self) { self.with_bucket(|b| { b.commits.fetch_add(1, Ordering::Relaxed); }) }

    pub fn inc_rollbacks(&self) { self.with_bucket(|b| { b.rollbacks.fetch_add(1, Ordering::Relaxed); }) }

    pub fn inc_errors(&self) { self.with_bucket(|b| { b.errors.fetch_add(1, Ordering::Relaxed); }) }

    pub fn inc_http_requests(&self) { self.with_bucket(|b| { b.http_requests.fetch_add(1, Ordering::Relaxed); }) }

    /// Raise the queued-writes gauge for the guard's lifetime.
    pub fn queued_writes_guard(&self) -> GaugeGuard<'_> { GaugeGuard::raise(&self.queued_writes) }

    /// Raise the queued-transactions gauge for the guard's lifetime.
    pub fn queued_transactions_guard(&self) -> GaugeGuard<'_> { GaugeGuard::raise(&self.queued_transactions) }

    /// Raise the queued-HTTP-requests gauge for the guard's lifetime.
    pub fn queued_http_guard(&self) -> GaugeGuard<'_> { GaugeGuard::raise(&self.queued_http_requests) }

    /// Delete buckets older than the retention window.
    pub fn prune(&self, now: DateTime<Utc>) {
        let cutoff = now - bucket_retention();
        self.minutes.retain(|minute, _| match DateTime::parse_from_rfc3339(minute) {
            Ok(parsed) => parsed.with_timezone(&Utc) >= cutoff,
            Err(_) => true,
        });
    }

    /// Snapshot every live bucket, newest first, with totals across the
    /// retained window.
    pub fn snapshot(&self) -> StatsSnapshot {
        let mut totals = Totals::default();
        let mut stats: Vec<MinuteStat> = Vec::with_capacity(self.minutes.len());

        for entry in self.minutes.iter() {
            let bucket = entry.value();
            let stat = MinuteStat {
                minute: entry.key().clone(),
                reads: bucket.reads.load(Ordering::Relaxed),
                writes: bucket.writes.load(Ordering::Relaxed),
                begins: bucket.begins.load(Ordering::Relaxed),
                commits: bucket.commits.load(Ordering::Relaxed),
                rollbacks: bucket.rollbacks.load(Ordering::Relaxed),
                errors: bucket.errors.load(Ordering::Relaxed),
                http_requests: bucket.http_requests.load(Ordering::Relaxed),
            };

            totals.reads += stat.reads;
            totals.writes += stat.writes;
            totals.begins += stat.begins;
            totals.commits += stat.commits;
            totals.rollbacks += stat.rollbacks;
            totals.errors += stat.errors;
            totals.http_requests += stat.http_requests;

            stats.push(stat);
        }

        stats.sort_by(|a, b| b.minute.cmp(&a.minute));

        let uptime = (Utc::now() - self.started_at).to_std().unwrap_or_default();
        StatsSnapshot {
            started_at: self.started_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            uptime: humantime::format_duration(Duration::from_secs(uptime.as_secs())).to_string(),
            queued_writes: self.queued_writes.load(Ordering::Relaxed),
            queued_http_requests: self.queued_http_requests.load(Ordering::Relaxed),
            totals,
            stats,
        }
    }
}

/// The current wall-clock minute, truncated, rendered RFC3339 UTC.
fn minute_key(now: DateTime<Utc>) -> String {
    let truncated = now.with_second(0).and_then(|t| t.with_nanosecond(0)).unwrap_or(now);
    truncated.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// RAII gauge increment; the decrement clamps at zero.
pub struct GaugeGuard<'a> {
    gauge: &'a AtomicI64,
}

impl<'a> GaugeGuard<'a> {
    fn raise(gauge: &'a AtomicI64) -> Self {
        gauge.fetch_add(1, Ordering::Relaxed);
        Self { gauge }
    }
}

impl Drop for GaugeGuard<'_> {
    fn drop(&mut self) {
        loop {
            let current = self.gauge.load(Ordering::Relaxed);
            if current <= 0 {
                return;
            }
            if self.gauge.compare_exchange(current, current - 1, Ordering::Relaxed, Ordering::Relaxed).is_ok() {
                return;
            }
        }
    }
}

/// The `/stats` response body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub started_at: String,
    pub uptime: String,
    pub queued_writes: i64,
    pub queued_http_requests: i64,
    pub totals: Totals,
    pub stats: Vec<MinuteStat>,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    pub reads: i64,
    pub writes: i64,
    pub begins: i64,
    pub commits: i64,
    pub rollbacks: i64,
    pub errors: i64,
    pub http_requests: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MinuteStat {
    pub minute: String,
    pub reads: i64,
    pub writes: i64,
    pub begins: i64,
    pub commits: i64,
    pub rollbacks: i64,
    pub errors: i64,
    pub http_requests: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_into_the_current_minute() {
        let stats = StatsRegistry::new();
        stats.inc_reads();
        stats.inc_reads();
        stats.inc_writes();
        stats.inc_errors();
        stats.inc_http_requests();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.totals.reads, 2);
        assert_eq!(snapshot.totals.writes, 1);
        assert_eq!(snapshot.totals.errors, 1);
        assert_eq!(snapshot.totals.http_requests, 1);
        assert_eq!(snapshot.stats.len(), 1);
        assert_eq!(snapshot.stats[0].reads, 2);
    }

    #[test]
    fn minute_keys_are_truncated_rfc3339() {
        let now = DateTime::parse_from_rfc3339("2026-08-02T10:15:42.123Z").unwrap().with_timezone(&Utc);
        assert_eq!(minute_key(now), "2026-08-02T10:15:00Z");
    }

    #[test]
    fn prune_drops_buckets_past_retention() {
        let stats = StatsRegistry::new();
        stats.inc_reads();
        assert_eq!(stats.snapshot().stats.len(), 1);

        // A day from now the bucket is outside the window.
        stats.prune(Utc::now() + chrono::Duration::hours(25));
        assert!(stats.snapshot().stats.is_empty());

        // Totals follow the retained window.
        assert_eq!(stats.snapshot().totals.reads, 0);
    }

    #[test]
    fn snapshot_sorts_newest_first() {
        let stats = StatsRegistry::new();
        stats.minutes.entry("2026-08-01T10:00:00Z".to_string()).or_default().reads.fetch_add(1, Ordering::Relaxed);
        stats.minutes.entry("2026-08-01T11:00:00Z".to_string()).or_default().reads.fetch_add(2, Ordering::Relaxed);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.stats[0].minute, "2026-08-01T11:00:00Z");
        assert_eq!(snapshot.stats[1].minute, "2026-08-01T10:00:00Z");
        assert_eq!(snapshot.totals.reads, 3);
    }

    #[test]
    fn gauges_clamp_at_zero() {
        let stats = StatsRegistry::new();
        {
            let _a = stats.queued_writes_guard();
            let _b = stats.queued_writes_guard();
            assert_eq!(stats.queued_writes.load(Ordering::Relaxed), 2);
        }
        assert_eq!(stats.queued_writes.load(Ordering::Relaxed), 0);

        // An extra decrement must not go negative.
        drop(GaugeGuard { gauge: &stats.queued_writes });
        assert_eq!(stats.queued_writes.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn snapshot_serializes_camel_case() {
        let stats = StatsRegistry::new();
        stats.inc_http_requests();
        let encoded = serde_json::to_value(stats.snapshot()).unwrap();
        assert!(encoded.get("startedAt").is_some());
        assert!(encoded.get("queuedHttpRequests").is_some());
        assert!(encoded["totals"].get("httpRequests").is_some());
        assert!(encoded["stats"][0].get("minute").is_some());
    }
}
