//! Genetic strategy evolution
pub mod engine;
pub mod operators;

pub use self::engine::EvolutionEngine;
