//! Drives one account through a cycle:
//! egress probe → credential parse → jitter → auth/info → task sweep → mining.
//!
//! Every remote failure is recovered right here and degrades to a default
//! (unknown username, zero power, empty task list). Only a malformed
//! credential ends the account's cycle early.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, error, info, warn};

use crate::account::outcome::ExecutionOutcome;
use crate::account::session::{AccountSession, Identity, UNKNOWN_IP};
use crate::account::state::{AccountState, StateTracker};
use crate::client::{RemoteClient, ResourceState, Task};
use crate::config::BotConfig;
use crate::error::CredentialError;

/// Mining continues only while power is strictly above this.
pub const POWER_THRESHOLD: f64 = 500.0;

const UNKNOWN_USERNAME: &str = "Unknown";

/// The per-account state machine.
pub struct AccountRunner {
    config: Arc<BotConfig>,
    client: Arc<dyn RemoteClient>,
}

impl AccountRunner {
    pub fn new(config: Arc<BotConfig>, client: Arc<dyn RemoteClient>) -> Self {
        Self { config, client }
    }

    /// Run one full cycle for `session`. Never panics on remote failures.
    pub async fn run(&self, mut session: AccountSession) -> ExecutionOutcome {
        let mut tracker = StateTracker::new();
        let account = session.number();

        let outcome = match self.drive(&mut session, &mut tracker).await {
            Ok(()) => {
                self.advance(account, &mut tracker, AccountState::Done, None);
                info!(
                    account,
                    "User {} processed. Restarting after {} minutes...",
                    session
                        .identity
                        .as_ref()
                        .map(Identity::display_name)
                        .unwrap_or_default(),
                    self.config.cycle_interval.as_secs() / 60
                );
                ExecutionOutcome::success(session.index, tracker.state)
            }
            Err(e) => {
                let message = format!("Invalid credential: {e}");
                self.advance(
                    account,
                    &mut tracker,
                    AccountState::Failed,
                    Some(message.clone()),
                );
                ExecutionOutcome::failure(session.index, tracker.state, message)
            }
        };

        debug!(
            account,
            egress_ip = %session.egress_ip,
            path = ?tracker.path(),
            "Account run finished"
        );
        outcome
    }

    async fn drive(
        &self,
        session: &mut AccountSession,
        tracker: &mut StateTracker,
    ) -> Result<(), CredentialError> {
        let account = session.number();

        self.advance(account, tracker, AccountState::ProbingIp, None);
        self.probe_ip(session).await;

        self.advance(account, tracker, AccountState::ParsingCredential, None);
        let identity = Identity::from_credential(&session.credential)?;
        let name = identity.display_name();
        session.identity = Some(identity);

        self.advance(account, tracker, AccountState::Warmup, None);
        let delay = self.start_jitter();
        info!(
            account,
            name = %name,
            egress_ip = %session.egress_ip,
            "Starting in {} seconds...",
            delay.as_secs()
        );
        tokio::time::sleep(delay).await;

        self.advance(account, tracker, AccountState::Authenticating, None);
        let (username, resources) = self.fetch_info(session).await;
        info!(
            account,
            "Username: {} | Hivera: {} | Power: {} | Power Capacity: {} | Proxy: {}",
            username,
            resources.hivera,
            resources.power,
            resources.power_capacity,
            session.egress_ip
        );

        if self.config.auto_task {
            self.advance(account, tracker, AccountState::TaskSweep, None);
            info!(account, "Getting tasks...");
            self.sweep_tasks(session).await;
        }

        self.advance(account, tracker, AccountState::Mining, None);
        tokio::time::sleep(self.config.pacing.mining_settle).await;
        self.mine(session, resources.power).await;
        warn!(
            account,
            "User {username} does not have enough power to mine... Skipping"
        );

        Ok(())
    }

    fn advance(
        &self,
        account: usize,
        tracker: &mut StateTracker,
        state: AccountState,
        reason: Option<String>,
    ) {
        let from = tracker.state;
        match tracker.transition_to(state, reason) {
            Ok(()) => debug!(account, %from, to = %state, "State transition"),
            Err(e) => warn!(account, "{e}"),
        }
    }

    /// Resolve the egress IP. Failure only leaves the default in place.
    async fn probe_ip(&self, session: &mut AccountSession) {
        match self.client.probe_egress_ip().await {
            Ok(ip) => session.egress_ip = ip,
            Err(e) => {
                warn!(account = session.number(), "Cannot check proxy IP: {e}");
                session.egress_ip = UNKNOWN_IP.to_string();
            }
        }
    }

    fn start_jitter(&self) -> Duration {
        let (min, max) = self.config.start_delay;
        let secs = if min >= max {
            min
        } else {
            rand::thread_rng().gen_range(min..=max)
        };
        Duration::from_secs(secs)
    }

    /// Referral, auth and power info, each independently fault tolerant.
    async fn fetch_info(&self, session: &AccountSession) -> (String, ResourceState) {
        let account = session.number();
        let cred = &session.credential;

        if let Err(e) = self.client.fetch_referral_info(cred).await {
            error!(account, "Error fetching info data: {e}");
        }

        let username = match self.client.authenticate(cred).await {
            Ok(auth) => auth.username.unwrap_or_else(|| UNKNOWN_USERNAME.to_string()),
            Err(e) => {
                error!(account, "Error fetching auth data: {e}");
                UNKNOWN_USERNAME.to_string()
            }
        };

        let resources = match self.client.fetch_power_state(cred).await {
            Ok(state) => state,
            Err(e) => {
                error!(account, "Error fetching power data: {e}");
                ResourceState::default()
            }
        };

        (username, resources)
    }

    /// Outstanding tasks: missions first, then dailies, minus completed and
    /// skipped ones.
    pub async fn pending_tasks(&self, session: &AccountSession) -> Vec<Task> {
        let account = session.number();
        let cred = &session.credential;

        let missions = self.client.list_missions(cred).await.unwrap_or_else(|e| {
            error!(account, "Error fetching missions: {e}");
            Vec::new()
        });
        let daily = self.client.list_daily_tasks(cred).await.unwrap_or_else(|e| {
            error!(account, "Error fetching daily tasks: {e}");
            Vec::new()
        });

        missions
            .into_iter()
            .chain(daily)
            .filter(|t| !t.complete && !self.config.skip_tasks.contains(&t.id.to_string()))
            .collect()
    }

    /// Complete every pending task in order. Returns how many reported `done`.
    pub async fn sweep_tasks(&self, session: &AccountSession) -> usize {
        let account = session.number();
        let mut completed = 0;

        for task in self.pending_tasks(session).await {
            tokio::time::sleep(self.config.pacing.task_delay).await;
            info!(account, "Starting task {} | {}...", task.id, task.name);

            match self.client.complete_task(&session.credential, &task.id).await {
                Ok(res) if res.is_done() => {
                    completed += 1;
                    info!(
                        account,
                        "Task {} | {} completed successfully", task.id, task.name
                    );
                }
                Ok(res) => {
                    warn!(
                        account,
                        "Task {} | {} not completed: {}",
                        task.id,
                        task.name,
                        res.result.as_deref().unwrap_or("no result")
                    );
                }
                Err(e) => error!(account, "Error in complete task: {e}"),
            }
        }

        debug!(account, "Completed tasks!");
        completed
    }

    /// Contribute until power drops to the threshold. Returns the number of
    /// successful contribute calls.
    ///
    /// A failed call leaves power unchanged and the loop re-checks right away
    /// with no pause.
    pub async fn mine(&self, session: &AccountSession, initial_power: f64) -> usize {
        let account = session.number();
        let mut power = initial_power;
        let mut rounds = 0;

        while power > POWER_THRESHOLD {
            match self.client.contribute(&session.credential).await {
                Ok(state) => {
                    rounds += 1;
                    info!(account, "Mining successfully");
                    info!(
                        account,
                        "Hivera: {} | Power: {} | Power Capacity: {}",
                        state.hivera,
                        state.power,
                        state.power_capacity
                    );
                    power = state.power;
                    info!(
                        account,
                        "Remining after {} seconds...",
                        self.config.pacing.mining_interval.as_secs()
                    );
                    tokio::time::sleep(self.config.pacing.mining_interval).await;
                }
                Err(e) => {
                    // TODO: decide whether a failed contribute should wait
                    // mining_interval too; today it retries immediately.
                    error!(account, "Error in contribute: {e}");
                    tokio::task::yield_now().await;
                }
            }
        }

        rounds
    }
}
