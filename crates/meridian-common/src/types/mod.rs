//! Core data types for the Meridian control core

pub mod agent;
pub mod cycle;
pub mod dna;
pub mod execution;
pub mod ledger;
pub mod risk;
pub mod telemetry;
