//! Worker system — bounded execution of account runs.
//!
//! Core components:
//! - `scheduler` — batches accounts under a concurrency cap, isolates each unit
//! - `cycle` — repeats the scheduler on a fixed interval until shutdown

pub mod cycle;
pub mod scheduler;

pub use cycle::CycleDriver;
pub use scheduler::{BatchScheduler, CycleReport};
