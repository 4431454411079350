//! Risk gate: exposure → safety mode
//!
//! `exposure < warn` is normal, `warn ≤ exposure < halt` is throttled,
//! `exposure ≥ halt` is emergency-stopped. Emergency stop is sticky until
//! [`RiskGate::acknowledge`] is called.

use chrono::{DateTime, Utc};
use meridian_common::{RevenueLedger, RiskMode, RiskState};
use rust_decimal::Decimal;
use tracing::{error, info, instrument, warn};

use crate::violations::{Severity, ViolationLog};
use crate::RiskConfig;

pub struct RiskGate {
    config: RiskConfig,
    state: RiskState,
    /// Agent-reported exposure accumulated since the last acknowledgment
    tracked_delta: Decimal,
    violations: ViolationLog,
    stop_reason: Option<String>,
}

impl RiskGate {
    pub fn new(config: RiskConfig) -> Self {
        let state = RiskState::new(config.threshold_warn, config.threshold_halt);
        Self {
            violations: ViolationLog::new(config.violation_capacity),
            config,
            state,
            tracked_delta: Decimal::ZERO,
            stop_reason: None,
        }
    }

    pub fn state(&self) -> &RiskState {
        &self.state
    }

    pub fn mode(&self) -> RiskMode {
        self.state.mode
    }

    pub fn violations(&self) -> &ViolationLog {
        &self.violations
    }

    pub fn stop_reason(&self) -> Option<&str> {
        self.stop_reason.as_deref()
    }

    pub fn tracked_delta(&self) -> Decimal {
        self.tracked_delta
    }

    /// Fold a cycle's agent-reported exposure change into tracking
    pub fn add_exposure_delta(&mut self, delta: Decimal) {
        self.tracked_delta += delta;
    }

    /// External reading plus tracked agent deltas, floored at zero
    pub fn effective_exposure(&self, external: Decimal) -> Decimal {
        (external + self.tracked_delta).max(Decimal::ZERO)
    }

    /// Step function on exposure alone
    pub fn classify(&self, exposure: Decimal) -> RiskMode {
        if exposure >= self.config.threshold_halt {
            RiskMode::EmergencyStopped
        } else if exposure >= self.config.threshold_warn {
            RiskMode::Throttled
        } else {
            RiskMode::Normal
        }
    }

    fn loss_limit_breached(&self, ledger: &RevenueLedger) -> bool {
        match self.config.max_daily_loss {
            Some(limit) => ledger.realized <= -limit,
            None => false,
        }
    }

    /// Decide the mode for this cycle
    #[instrument(skip(self, ledger), fields(exposure = %exposure))]
    pub fn assess(&mut self, exposure: Decimal, ledger: &RevenueLedger) -> RiskMode {
        self.assess_at(exposure, ledger, Utc::now())
    }

    pub fn assess_at(&mut self, exposure: Decimal, ledger: &RevenueLedger, now: DateTime<Utc>) -> RiskMode {
        self.state.exposure = exposure;

        if exposure >= self.config.threshold_warn {
            let severity = self.violations.record(exposure, self.config.threshold_warn, now);
            if severity >= Severity::High {
                warn!(%exposure, %severity, "Exposure well above warn threshold");
            }
        }

        let mut next = self.classify(exposure);
        if self.loss_limit_breached(ledger) {
            next = RiskMode::EmergencyStopped;
        }

        if self.state.mode == RiskMode::EmergencyStopped {
            return self.state.mode;
        }

        if next != self.state.mode {
            match next {
                RiskMode::EmergencyStopped => {
                    let reason = if self.loss_limit_breached(ledger) {
                        format!("daily loss limit reached (realized {})", ledger.realized)
                    } else {
                        format!("exposure {} ≥ halt threshold {}", exposure, self.config.threshold_halt)
                    };
                    error!(reason = %reason, "EMERGENCY STOP");
                    self.stop_reason = Some(reason);
                }
                RiskMode::Throttled => warn!(%exposure, "Risk mode throttled, spawning suspended"),
                RiskMode::Normal => info!(%exposure, "Risk mode back to normal"),
            }
            self.state.mode = next;
        }

        self.state.mode
    }

    /// Fail-safe assessment when the exposure source cannot be read
    pub fn assess_unavailable(&mut self, ledger: &RevenueLedger, cause: &str) -> RiskMode {
        warn!(cause, "Exposure source unavailable, assuming halt threshold");
        self.assess(self.config.threshold_halt, ledger)
    }

    /// Enter emergency stop from an external signal
    pub fn force_emergency(&mut self, reason: impl Into<String>) {
        if self.state.mode != RiskMode::EmergencyStopped {
            let reason = reason.into();
            error!(reason = %reason, "EMERGENCY STOP");
            self.state.mode = RiskMode::EmergencyStopped;
            self.stop_reason = Some(reason);
        }
    }

    /// Clear an emergency stop and reset exposure tracking
    ///
    /// Returns false if the gate was not stopped.
    pub fn acknowledge(&mut self) -> bool {
        if self.state.mode != RiskMode::EmergencyStopped {
            return false;
        }
        self.state.mode = RiskMode::Normal;
        self.state.exposure = Decimal::ZERO;
        self.tracked_delta = Decimal::ZERO;
        self.stop_reason = None;
        info!("Emergency stop acknowledged, exposure tracking reset");
        true
    }
}
