//! # Risk Core
//!
//! Data models and scoring algorithms for the Risk Agent.
//!
//! Everything in this crate is pure: no I/O and no clocks. Callers pass the
//! transaction records and the reference time in, and get deterministic
//! statistics, detector results and decisions back. The service crate wraps
//! these with caching, chain-data retrieval and the HTTP boundary.

pub mod address;
pub mod decision;
pub mod error;
pub mod history;
pub mod models;
pub mod rules;
pub mod stats;
pub mod units;
pub mod velocity;

pub use decision::*;
pub use error::*;
pub use models::*;
