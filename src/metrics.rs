use metrics::{counter, histogram};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::store::MergeResult;

/// Sync counters for one conversation driver.
///
/// Every record call bumps the local counter and also reports through the `metrics`
/// facade, which is a no-op until a recorder is installed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsCollector {
    /// Fetch-and-merge cycles run by the timer
    pub poll_cycles_total: u64,
    /// Merges that replaced the held snapshot
    pub merges_changed_total: u64,
    /// Merges that matched the held snapshot
    pub merges_unchanged_total: u64,
    /// Fetch results dropped because the counterpart changed or a newer fetch landed first
    pub stale_results_total: u64,
    /// Timer cycles that failed
    pub poll_failures_total: u64,
    /// Messages sent
    pub messages_sent_total: u64,
    /// Failures of any kind
    pub errors_total: u64,
    /// Failures keyed by error type
    pub errors_by_type: BTreeMap<&'static str, u64>,
}

impl MetricsCollector {
    /// Record one timer-driven cycle; `failure` carries the error type if it failed
    pub fn record_poll_cycle(&mut self, duration: Duration, failure: Option<&'static str>) {
        self.poll_cycles_total += 1;
        let status = if failure.is_none() { "success" } else { "error" };
        counter!("contact_messenger_poll_cycles_total", "status" => status).increment(1);
        histogram!("contact_messenger_poll_cycle_duration_seconds").record(duration.as_secs_f64());

        if let Some(error_type) = failure {
            self.poll_failures_total += 1;
            self.record_error(error_type, "poll");
        }
    }

    /// Record the outcome of a merge
    pub fn record_merge(&mut self, result: MergeResult) {
        let outcome = match result {
            MergeResult::Changed => {
                self.merges_changed_total += 1;
                "changed"
            },
            MergeResult::Unchanged => {
                self.merges_unchanged_total += 1;
                "unchanged"
            },
        };
        counter!("contact_messenger_merges_total", "outcome" => outcome).increment(1);
    }

    /// Record a fetch result discarded by the counterpart or sequence guard
    pub fn record_stale_result(&mut self) {
        self.stale_results_total += 1;
        counter!("contact_messenger_stale_results_total").increment(1);
    }

    /// Record a sent message
    pub fn record_message_sent(&mut self) {
        self.messages_sent_total += 1;
        counter!("contact_messenger_messages_sent_total").increment(1);
    }

    /// Record error metrics
    pub fn record_error(&mut self, error_type: &'static str, operation: &'static str) {
        self.errors_total += 1;
        *self.errors_by_type.entry(error_type).or_default() += 1;
        counter!("contact_messenger_errors_total", "type" => error_type, "operation" => operation).increment(1);
    }
}

/// Convenience macro for error metrics
#[macro_export]
macro_rules! record_error {
    ($collector:expr, $error_type:expr, $operation:expr) => {
        $collector.record_error($error_type, $operation);
    };
}
