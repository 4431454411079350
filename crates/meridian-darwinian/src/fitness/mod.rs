//! Fitness observation and smoothing
pub mod calculator;

pub use self::calculator::{FitnessCalculator, FitnessSmoother};
