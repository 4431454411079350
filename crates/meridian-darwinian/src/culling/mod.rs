//! Retirement and failure policy
pub mod policy;

pub use self::policy::RetirementPolicy;
