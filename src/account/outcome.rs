//! Typed result of one execution unit.

use crate::account::state::AccountState;

/// Produced exactly once per account per cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome {
    pub account_index: usize,
    pub success: bool,
    pub state: AccountState,
    pub error: Option<String>,
}

impl ExecutionOutcome {
    pub fn success(account_index: usize, state: AccountState) -> Self {
        Self {
            account_index,
            success: true,
            state,
            error: None,
        }
    }

    pub fn failure(account_index: usize, state: AccountState, error: impl Into<String>) -> Self {
        Self {
            account_index,
            success: false,
            state,
            error: Some(error.into()),
        }
    }

    /// The unit died before reporting (panic, dropped thread).
    pub fn crashed(account_index: usize, error: impl Into<String>) -> Self {
        Self::failure(account_index, AccountState::Failed, error)
    }
}
