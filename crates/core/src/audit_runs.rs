//! Audit-run trend/alert calculation (spec §4.5).
//!
//! Pure functions over already-fetched rows — the repository layer issues
//! the windowed queries; this module only does the arithmetic and the four
//! alert rules so they can be unit tested without a database.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use crate::domain::{AuditRun, AuditRunStatus};
use crate::error::{DomainError, Result};

pub const MAX_DETAILS_BYTES: usize = 100 * 1024;
pub const MAX_GUARANTEE_METADATA_BYTES: usize = 10 * 1024;
pub const MAX_GUARANTEE_ENTRIES: usize = 1000;
pub const MAX_HISTORY_LIMIT: i64 = 500;

pub fn validate_report_payload(details: &serde_json::Value) -> Result<()> {
    let serialized = serde_json::to_vec(details)
        .map_err(|e| DomainError::bad_request(format!("details not serializable: {e}")))?;
    if serialized.len() > MAX_DETAILS_BYTES {
        return Err(DomainError::bad_request(format!(
            "details exceeds {MAX_DETAILS_BYTES} bytes"
        )));
    }

    if let Some(results) = details.get("guarantee_results").and_then(|v| v.as_array()) {
        if results.len() > MAX_GUARANTEE_ENTRIES {
            return Err(DomainError::bad_request(format!(
                "at most {MAX_GUARANTEE_ENTRIES} per-guarantee entries are allowed"
            )));
        }
        for entry in results {
            let size = serde_json::to_vec(entry).map(|v| v.len()).unwrap_or(0);
            if size > MAX_GUARANTEE_METADATA_BYTES {
                return Err(DomainError::bad_request(format!(
                    "per-guarantee metadata exceeds {MAX_GUARANTEE_METADATA_BYTES} bytes"
                )));
            }
        }
    }
    Ok(())
}

/// Derive {checked, passed, failed} counts from `details.guarantee_results`
/// when the caller did not supply explicit counts.
pub fn derive_counts(details: &serde_json::Value) -> Option<(i32, i32, i32)> {
    let results = details.get("guarantee_results")?.as_array()?;
    let checked = results.len() as i32;
    let passed = results
        .iter()
        .filter(|r| r.get("passed").and_then(|v| v.as_bool()).unwrap_or(false))
        .count() as i32;
    Some((checked, passed, checked - passed))
}

pub fn failed_guarantee_names(details: &serde_json::Value) -> Vec<String> {
    details
        .get("guarantee_results")
        .and_then(|v| v.as_array())
        .map(|results| {
            results
                .iter()
                .filter(|r| !r.get("passed").and_then(|v| v.as_bool()).unwrap_or(true))
                .filter_map(|r| r.get("name").and_then(|v| v.as_str()).map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

#[derive(Debug, Clone, Default)]
pub struct WindowStats {
    pub total: i64,
    pub failed: i64,
    pub partial: i64,
}

impl WindowStats {
    pub fn failure_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.failed + self.partial) as f64 / self.total as f64
        }
    }
}

#[derive(Debug, Clone)]
pub struct Trends {
    pub window_24h: WindowStats,
    pub window_7d: WindowStats,
    pub window_30d: WindowStats,
    pub top_failed_guarantees: Vec<(String, i64)>,
    pub alerts: Vec<String>,
}

fn stats_for_window(runs: &[AuditRun], now: DateTime<Utc>, window: Duration) -> WindowStats {
    let cutoff = now - window;
    let mut stats = WindowStats::default();
    for run in runs {
        if run.run_at < cutoff {
            continue;
        }
        stats.total += 1;
        match run.status {
            AuditRunStatus::Failed => stats.failed += 1,
            AuditRunStatus::Partial => stats.partial += 1,
            AuditRunStatus::Passed => {}
        }
    }
    stats
}

fn guarantee_failure_counts(runs: &[AuditRun], now: DateTime<Utc>, window: Duration) -> HashMap<String, i64> {
    let cutoff = now - window;
    let mut counts: HashMap<String, i64> = HashMap::new();
    for run in runs {
        if run.run_at < cutoff {
            continue;
        }
        for name in failed_guarantee_names(&run.details) {
            *counts.entry(name).or_insert(0) += 1;
        }
    }
    counts
}

/// Compute the windowed trend report and alerts (spec §4.5).
///
/// `runs` should contain everything within the last 30 days, ordered
/// arbitrarily; `most_recent` is the single most recent run for the asset
/// (which may fall outside `runs` if it is older than 30 days, though in
/// practice it won't be).
pub fn compute_trends(runs: &[AuditRun], most_recent: Option<&AuditRun>, now: DateTime<Utc>) -> Trends {
    let window_24h = stats_for_window(runs, now, Duration::hours(24));
    let window_7d = stats_for_window(runs, now, Duration::days(7));
    let window_30d = stats_for_window(runs, now, Duration::days(30));

    let counts_7d = guarantee_failure_counts(runs, now, Duration::days(7));
    let mut top: Vec<(String, i64)> = counts_7d.iter().map(|(k, v)| (k.clone(), *v)).collect();
    top.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    top.truncate(10);

    let mut alerts = Vec::new();

    if window_24h.total >= 3 && window_24h.failure_rate() > 0.5 {
        alerts.push(format!(
            "24h failure rate {:.0}% exceeds 50% over {} runs",
            window_24h.failure_rate() * 100.0,
            window_24h.total
        ));
    }

    if window_7d.total >= 5 && window_30d.total >= 10 {
        let rate_7d = window_7d.failure_rate();
        let rate_30d = window_30d.failure_rate();
        if rate_30d > 0.0 && rate_7d > 1.5 * rate_30d {
            alerts.push(format!(
                "7d failure rate {:.0}% is more than 1.5x the 30d rate {:.0}%",
                rate_7d * 100.0,
                rate_30d * 100.0
            ));
        }
    }

    for (name, count) in counts_7d.iter() {
        if *count >= 5 {
            alerts.push(format!("guarantee '{name}' failed {count} times in the last 7 days"));
        }
    }

    if let Some(recent) = most_recent {
        if recent.status != AuditRunStatus::Passed {
            alerts.push("the most recent run did not pass".to_string());
        }
    }

    Trends {
        window_24h,
        window_7d,
        window_30d,
        top_failed_guarantees: top,
        alerts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn run(status: AuditRunStatus, run_at: DateTime<Utc>, guarantee_results: serde_json::Value) -> AuditRun {
        AuditRun {
            id: Uuid::new_v4(),
            asset_id: Uuid::new_v4(),
            contract_id: None,
            status,
            checked_count: 0,
            passed_count: 0,
            failed_count: 0,
            triggered_by: "ci".into(),
            external_run_id: None,
            run_at,
            details: serde_json::json!({ "guarantee_results": guarantee_results }),
        }
    }

    #[test]
    fn failure_rate_alert_needs_minimum_sample() {
        let now = Utc::now();
        let runs = vec![
            run(AuditRunStatus::Failed, now, serde_json::json!([])),
            run(AuditRunStatus::Failed, now, serde_json::json!([])),
        ];
        let trends = compute_trends(&runs, None, now);
        assert!(!trends
            .alerts
            .iter()
            .any(|a| a.contains("24h failure rate")));
    }

    #[test]
    fn failure_rate_alert_fires_with_enough_runs() {
        let now = Utc::now();
        let runs = vec![
            run(AuditRunStatus::Failed, now, serde_json::json!([])),
            run(AuditRunStatus::Failed, now, serde_json::json!([])),
            run(AuditRunStatus::Passed, now, serde_json::json!([])),
        ];
        let trends = compute_trends(&runs, None, now);
        assert!(trends.alerts.iter().any(|a| a.contains("24h failure rate")));
    }

    #[test]
    fn most_recent_failed_always_alerts() {
        let now = Utc::now();
        let recent = run(AuditRunStatus::Failed, now, serde_json::json!([]));
        let trends = compute_trends(&[], Some(&recent), now);
        assert!(trends.alerts.iter().any(|a| a.contains("most recent run")));
    }

    #[test]
    fn guarantee_failed_five_times_alerts() {
        let now = Utc::now();
        let failing_entry = serde_json::json!([{"name": "not_null_id", "passed": false}]);
        let runs: Vec<AuditRun> = (0..5)
            .map(|_| run(AuditRunStatus::Partial, now, failing_entry.clone()))
            .collect();
        let trends = compute_trends(&runs, None, now);
        assert!(trends
            .alerts
            .iter()
            .any(|a| a.contains("not_null_id") && a.contains("5 times")));
    }

    #[test]
    fn derive_counts_from_guarantee_results() {
        let details = serde_json::json!({
            "guarantee_results": [
                {"name": "a", "passed": true},
                {"name": "b", "passed": false},
            ]
        });
        assert_eq!(derive_counts(&details), Some((2, 1, 1)));
    }

    #[test]
    fn validate_report_payload_rejects_oversized_details() {
        let huge = serde_json::json!({ "blob": "x".repeat(MAX_DETAILS_BYTES + 1) });
        assert!(validate_report_payload(&huge).is_err());
    }
}
