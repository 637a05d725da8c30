//! The three independent policy evaluators
//!
//! Each policy turns its inputs into a bounded [`PolicyOutcome`] and never
//! fails: provider errors are mapped to the policy's own fallback outcome
//! at this layer.
//!
//! [`PolicyOutcome`]: risk_core::PolicyOutcome

pub mod amount;
pub mod reputation;
pub mod velocity;

pub use amount::AmountPolicy;
pub use reputation::ReputationPolicy;
pub use velocity::VelocityPolicy;
