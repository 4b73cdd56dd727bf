//! Hivera bot — multi-account session runner with a bounded, fault-isolated
//! batch scheduler.

pub mod account;
pub mod client;
pub mod config;
pub mod error;
pub mod input;
pub mod worker;
