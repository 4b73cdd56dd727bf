//! Account state machine.

use chrono::{DateTime, Utc};

/// Where an account is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccountState {
    /// Not started.
    Pending,
    /// Resolving the egress IP.
    ProbingIp,
    /// Extracting the display name from the credential.
    ParsingCredential,
    /// Startup jitter before the first remote call.
    Warmup,
    /// Referral, auth and power info calls.
    Authenticating,
    /// Completing outstanding tasks.
    TaskSweep,
    /// Contribute loop.
    Mining,
    /// Cycle finished.
    Done,
    /// Cycle aborted for this account.
    Failed,
}

impl AccountState {
    /// Check if this state allows transitioning to another state.
    pub fn can_transition_to(&self, target: AccountState) -> bool {
        use AccountState::*;

        if target == Failed {
            return !self.is_terminal();
        }

        matches!(
            (self, target),
            (Pending, ProbingIp)
                | (ProbingIp, ParsingCredential)
                | (ParsingCredential, Warmup)
                | (Warmup, Authenticating)
                | (Authenticating, TaskSweep)
                | (Authenticating, Mining)
                | (TaskSweep, Mining)
                | (Mining, Done)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl std::fmt::Display for AccountState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::ProbingIp => "probing_ip",
            Self::ParsingCredential => "parsing_credential",
            Self::Warmup => "warmup",
            Self::Authenticating => "authenticating",
            Self::TaskSweep => "task_sweep",
            Self::Mining => "mining",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// A state transition event.
#[derive(Debug, Clone)]
pub struct StateTransition {
    pub from: AccountState,
    pub to: AccountState,
    pub timestamp: DateTime<Utc>,
    pub reason: Option<String>,
}

/// Current state plus transition history for one account run.
#[derive(Debug, Clone)]
pub struct StateTracker {
    pub state: AccountState,
    pub transitions: Vec<StateTransition>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Default for StateTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl StateTracker {
    pub fn new() -> Self {
        Self {
            state: AccountState::Pending,
            transitions: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Transition to a new state.
    pub fn transition_to(
        &mut self,
        new_state: AccountState,
        reason: Option<String>,
    ) -> Result<(), String> {
        if !self.state.can_transition_to(new_state) {
            return Err(format!(
                "Cannot transition from {} to {}",
                self.state, new_state
            ));
        }

        self.transitions.push(StateTransition {
            from: self.state,
            to: new_state,
            timestamp: Utc::now(),
            reason,
        });
        self.state = new_state;

        if new_state.is_terminal() {
            self.finished_at = Some(Utc::now());
        }

        Ok(())
    }

    /// States visited so far, starting with `Pending`.
    pub fn path(&self) -> Vec<AccountState> {
        std::iter::once(AccountState::Pending)
            .chain(self.transitions.iter().map(|t| t.to))
            .collect()
    }
}
