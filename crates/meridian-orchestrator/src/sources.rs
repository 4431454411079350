//! External collaborators: exposure source, volatility signal, revenue feed
//!
//! Each has a trait and concrete implementations chosen from configuration
//! at startup.

use std::path::PathBuf;

use async_trait::async_trait;
use meridian_common::{AgentOutcome, Result, SourceError};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;

use crate::config::{ExposureSourceKind, RevenueFeedKind, SourceSettings, VolatilitySourceKind};

/// Aggregate open-position exposure reported by the portfolio side
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExposureSource: Send + Sync {
    /// Called once per cycle before risk assessment
    async fn current_exposure(&self) -> Result<Decimal>;
}

/// Fixed baseline; agent-reported deltas are tracked by the risk gate
pub struct TrackedExposure {
    baseline: Decimal,
}

impl TrackedExposure {
    pub fn new(baseline: Decimal) -> Self {
        Self { baseline }
    }
}

#[async_trait]
impl ExposureSource for TrackedExposure {
    async fn current_exposure(&self) -> Result<Decimal> {
        Ok(self.baseline)
    }
}

/// Reads a decimal from a file every cycle
pub struct FileExposure {
    path: PathBuf,
}

impl FileExposure {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ExposureSource for FileExposure {
    async fn current_exposure(&self) -> Result<Decimal> {
        let raw = tokio::fs::read_to_string(&self.path).await?;
        let value: Decimal = raw
            .trim()
            .parse()
            .map_err(|_| SourceError::Malformed(format!("{}: {:?}", self.path.display(), raw.trim())))?;
        Ok(value)
    }
}

/// Market volatility signal sampled at cycle start
pub trait VolatilitySignal: Send {
    fn sample(&mut self) -> f64;
}

pub struct FixedVolatility(pub f64);

impl VolatilitySignal for FixedVolatility {
    fn sample(&mut self) -> f64 {
        self.0
    }
}

/// Bounded random walk on [0, 1]
pub struct RandomWalkVolatility {
    level: f64,
    step: f64,
    rng: StdRng,
}

impl RandomWalkVolatility {
    pub fn new(start: f64, step: f64, seed: u64) -> Self {
        Self {
            level: start.clamp(0.0, 1.0),
            step: step.abs(),
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl VolatilitySignal for RandomWalkVolatility {
    fn sample(&mut self) -> f64 {
        if self.step > 0.0 {
            let delta = self.rng.gen_range(-self.step..=self.step);
            self.level = (self.level + delta).clamp(0.0, 1.0);
        }
        self.level
    }
}

/// Supplies the monetary value folded into the revenue ledger each cycle
#[async_trait]
pub trait RevenueFeed: Send + Sync {
    async fn realized(&self, outcomes: &[AgentOutcome]) -> Result<Decimal>;
}

/// Sum of realized values reported by successful agents
pub struct ReportedRevenue;

#[async_trait]
impl RevenueFeed for ReportedRevenue {
    async fn realized(&self, outcomes: &[AgentOutcome]) -> Result<Decimal> {
        Ok(outcomes
            .iter()
            .filter(|o| o.report.is_success())
            .map(|o| o.report.realized_value)
            .sum())
    }
}

/// Collaborators selected by configuration
pub struct Collaborators {
    pub exposure: Box<dyn ExposureSource>,
    pub volatility: Box<dyn VolatilitySignal>,
    pub revenue: Box<dyn RevenueFeed>,
}

impl Collaborators {
    pub fn from_settings(settings: &SourceSettings) -> Self {
        let exposure: Box<dyn ExposureSource> = match (settings.exposure, &settings.exposure_file) {
            (ExposureSourceKind::File, Some(path)) => Box::new(FileExposure::new(path.clone())),
            _ => Box::new(TrackedExposure::new(settings.exposure_baseline)),
        };
        let volatility: Box<dyn VolatilitySignal> = match settings.volatility {
            VolatilitySourceKind::Fixed => Box::new(FixedVolatility(settings.volatility_level)),
            VolatilitySourceKind::RandomWalk => Box::new(RandomWalkVolatility::new(
                settings.volatility_level,
                settings.volatility_step,
                settings.seed,
            )),
        };
        let revenue: Box<dyn RevenueFeed> = match settings.revenue {
            RevenueFeedKind::Reported => Box::new(ReportedRevenue),
        };
        Self {
            exposure,
            volatility,
            revenue,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_common::{AgentKind, ExecutionReport, MeridianError};
    use rust_decimal_macros::dec;
    use std::time::Duration;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_file_exposure_reads_and_fails_on_missing_file() {
        let path = std::env::temp_dir().join(format!("meridian-exposure-{}", Uuid::new_v4()));
        tokio::fs::write(&path, "42.5\n").await.unwrap();
        let source = FileExposure::new(&path);
        assert_eq!(source.current_exposure().await.unwrap(), dec!(42.5));

        tokio::fs::write(&path, "not a number").await.unwrap();
        assert!(matches!(
            source.current_exposure().await,
            Err(MeridianError::Source(SourceError::Malformed(_)))
        ));

        tokio::fs::remove_file(&path).await.unwrap();
        assert!(matches!(
            source.current_exposure().await,
            Err(MeridianError::Source(SourceError::Unavailable(_)))
        ));
    }

    #[tokio::test]
    async fn test_mocked_exposure_source() {
        let mut mock = MockExposureSource::new();
        mock.expect_current_exposure()
            .times(1)
            .returning(|| Ok(dec!(77)));
        assert_eq!(mock.current_exposure().await.unwrap(), dec!(77));
    }

    #[test]
    fn test_random_walk_is_bounded_and_seeded() {
        let mut a = RandomWalkVolatility::new(0.5, 0.3, 1);
        let mut b = RandomWalkVolatility::new(0.5, 0.3, 1);
        for _ in 0..200 {
            let x = a.sample();
            assert!((0.0..=1.0).contains(&x));
            assert_eq!(x, b.sample());
        }
    }

    #[tokio::test]
    async fn test_reported_revenue_sums_successes() {
        let outcome = |report| AgentOutcome {
            agent_id: Uuid::new_v4(),
            kind: AgentKind::Trading,
            dna_id: Uuid::new_v4(),
            report,
            latency: Duration::from_millis(1),
            timed_out: false,
        };
        let outcomes = vec![
            outcome(ExecutionReport::success(dec!(12), dec!(0))),
            outcome(ExecutionReport::success(dec!(-2), dec!(0))),
            outcome(ExecutionReport::failure()),
        ];
        assert_eq!(ReportedRevenue.realized(&outcomes).await.unwrap(), dec!(10));
    }
}
