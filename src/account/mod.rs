//! Per-account session data and the state machine that drives it.
//!
//! - `session` — credential, identity, proxy assignment
//! - `state` — account states and transition tracking
//! - `runner` — the state machine itself
//! - `outcome` — what each run reports back to the scheduler

pub mod outcome;
pub mod runner;
pub mod session;
pub mod state;

pub use outcome::ExecutionOutcome;
pub use runner::AccountRunner;
pub use session::{AccountSession, Credential, Identity, UNKNOWN_IP, build_sessions};
pub use state::{AccountState, StateTracker};
