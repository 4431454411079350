//! Risk violation log
//!
//! Every assessment at or above the warn threshold is recorded with a
//! severity derived from how far exposure overshoots it.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Violation severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Classify by `exposure / threshold_warn`
    pub fn from_ratio(ratio: Decimal) -> Self {
        if ratio >= Decimal::new(20, 1) {
            Severity::Critical
        } else if ratio >= Decimal::new(15, 1) {
            Severity::High
        } else if ratio >= Decimal::new(12, 1) {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    /// Contribution to the aggregate risk score
    pub fn weight(&self) -> f64 {
        match self {
            Severity::Critical => 1.0,
            Severity::High => 0.7,
            Severity::Medium => 0.4,
            Severity::Low => 0.1,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "LOW"),
            Severity::Medium => write!(f, "MEDIUM"),
            Severity::High => write!(f, "HIGH"),
            Severity::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// A recorded threshold breach
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub at: DateTime<Utc>,
    pub exposure: Decimal,
    pub threshold: Decimal,
    pub severity: Severity,
}

/// Bounded log of violations
#[derive(Debug, Clone)]
pub struct ViolationLog {
    entries: VecDeque<Violation>,
    capacity: usize,
}

impl ViolationLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Record a breach of `threshold_warn`; returns the severity assigned
    pub fn record(&mut self, exposure: Decimal, threshold_warn: Decimal, at: DateTime<Utc>) -> Severity {
        let severity = if threshold_warn > Decimal::ZERO {
            Severity::from_ratio(exposure / threshold_warn)
        } else {
            Severity::Critical
        };

        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(Violation {
            at,
            exposure,
            threshold: threshold_warn,
            severity,
        });
        severity
    }

    /// Aggregate score in [0, 1]; recent and severe violations weigh most
    ///
    /// Each violation contributes `severity × max(0.1, 1 − age_hours / 24)`,
    /// the sum is divided by 10 and capped at 1.
    pub fn risk_score(&self, now: DateTime<Utc>) -> f64 {
        let total: f64 = self
            .entries
            .iter()
            .map(|v| {
                let age_hours = (now - v.at).num_seconds() as f64 / 3600.0;
                let decay = (1.0 - age_hours / 24.0).max(0.1);
                v.severity.weight() * decay
            })
            .sum();
        (total / 10.0).min(1.0)
    }

    /// Drop violations older than `max_age`
    pub fn prune(&mut self, now: DateTime<Utc>, max_age: Duration) -> usize {
        let cutoff = now - max_age;
        let before = self.entries.len();
        self.entries.retain(|v| v.at >= cutoff);
        before - self.entries.len()
    }

    pub fn recent(&self, limit: usize) -> Vec<Violation> {
        self.entries.iter().rev().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ViolationLog {
    fn default() -> Self {
        Self::new(1000)
    }
}
