//! Process-wide counters and the periodic statistics reporter.
//!
//! The counters have a single writer (the stream processing flow) and any
//! number of readers. Readers only ever take snapshots.
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::info;

/// Host name used when a message does not carry a collector.
const UNKNOWN_HOST: &str = "unknown";

#[derive(Debug, Default)]
pub struct Counters {
    total_raw_messages: AtomicU64,
    notifications_sent: AtomicU64,
    filtered_by_host: DashMap<String, u64>,
}

impl Counters {
    /// Create counters pre-seeded with the configured collectors at zero.
    pub fn new<S: AsRef<str>>(collectors: &[S]) -> Self {
        let counters = Self::default();
        for c in collectors {
            counters.filtered_by_host.insert(c.as_ref().to_string(), 0);
        }
        counters
    }

    /// Count one BGP message received from the stream, before any filtering.
    pub fn record_raw_message(&self) {
        self.total_raw_messages.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one message from `host` that produced at least one match.
    ///
    /// Messages without a collector are not attributed to any host.
    pub fn record_filtered(&self, host: &str) {
        if let Some(mut count) = self.filtered_by_host.get_mut(host) {
            *count += 1;
            return;
        }
        if host == UNKNOWN_HOST {
            return;
        }
        info!("receiving filtered messages from new collector: {}", host);
        *self.filtered_by_host.entry(host.to_string()).or_insert(0) += 1;
    }

    pub fn record_notification_sent(&self) -> u64 {
        self.notifications_sent.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn total_raw_messages(&self) -> u64 {
        self.total_raw_messages.load(Ordering::Relaxed)
    }

    pub fn notifications_sent(&self) -> u64 {
        self.notifications_sent.load(Ordering::Relaxed)
    }

    pub fn filtered_count(&self, host: &str) -> u64 {
        self.filtered_by_host.get(host).map(|c| *c).unwrap_or(0)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total_raw_messages: self.total_raw_messages(),
            filtered_by_host: self
                .filtered_by_host
                .iter()
                .map(|e| (e.key().clone(), *e.value()))
                .collect(),
            notifications_sent: self.notifications_sent(),
        }
    }
}

/// Point-in-time copy of the [Counters].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub total_raw_messages: u64,
    pub filtered_by_host: BTreeMap<String, u64>,
    pub notifications_sent: u64,
}

impl StatsSnapshot {
    pub fn total_filtered(&self) -> u64 {
        self.filtered_by_host.values().sum()
    }

    /// Report lines suitable for info-level logging.
    pub fn report_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        lines.push("=== BGP Listener Statistics ===".to_string());
        lines.push(format!(
            "TOTAL BGP messages received: {}",
            self.total_raw_messages
        ));
        lines.push(format!(
            "Filtered messages (matching ASNs/prefixes): {}",
            self.total_filtered()
        ));
        for (host, count) in &self.filtered_by_host {
            lines.push(format!("  {}: {} filtered messages", host, count));
        }
        lines.push(format!("Notifications sent: {}", self.notifications_sent));
        lines.push("===============================".to_string());
        lines
    }
}

/// Background task logging a [StatsSnapshot] every interval.
pub struct StatsReporter {
    handle: JoinHandle<()>,
}

impl StatsReporter {
    /// Spawn the reporter. The first report is emitted one full interval
    /// after start.
    pub fn start(counters: Arc<Counters>, interval: Duration) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            loop {
                ticker.tick().await;
                for line in counters.snapshot().report_lines() {
                    info!("{}", line);
                }
            }
        });
        Self { handle }
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Cancel the reporter and wait for it to wind down.
    pub async fn stop(self) {
        self.handle.abort();
        let _ = self.handle.await;
    }
}
