//! Batch scheduler — bounded, fault-isolated execution of account runs.
//!
//! Accounts are split into consecutive batches of at most `max_concurrent`.
//! Every account in a batch runs as its own execution unit; the batch is a
//! barrier, so batch K+1 starts only after every unit of batch K reported.
//! A unit that panics or dies is turned into a failed `ExecutionOutcome` and
//! never touches its siblings.

use std::future::Future;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::oneshot;
use tracing::{error, info};

use crate::account::{AccountRunner, AccountSession, AccountState, ExecutionOutcome};
use crate::client::ClientFactory;
use crate::config::{BotConfig, IsolationMode};

/// Everything that happened in one pass over the account list.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    /// 1-based cycle number.
    pub cycle: u64,
    /// Number of batches executed.
    pub batches: usize,
    /// One outcome per account, in input order.
    pub outcomes: Vec<ExecutionOutcome>,
}

impl CycleReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.success).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }
}

/// Runs one cycle of account state machines under a concurrency cap.
pub struct BatchScheduler {
    config: Arc<BotConfig>,
    factory: Arc<dyn ClientFactory>,
}

impl BatchScheduler {
    pub fn new(config: Arc<BotConfig>, factory: Arc<dyn ClientFactory>) -> Self {
        Self { config, factory }
    }

    /// Attempt every session once, batch by batch.
    pub async fn run_cycle(&self, sessions: Vec<AccountSession>, cycle: u64) -> CycleReport {
        let batch_size = self.config.max_concurrent.max(1);
        let mut report = CycleReport {
            cycle,
            batches: 0,
            outcomes: Vec::with_capacity(sessions.len()),
        };

        let mut remaining = sessions.into_iter().peekable();
        while remaining.peek().is_some() {
            let batch: Vec<AccountSession> = remaining.by_ref().take(batch_size).collect();
            report.batches += 1;
            info!(
                cycle,
                batch = report.batches,
                size = batch.len(),
                "Starting batch"
            );

            for outcome in self.run_batch(batch).await {
                if let Some(ref err) = outcome.error {
                    error!(account = outcome.account_index + 1, "{err}");
                }
                report.outcomes.push(outcome);
            }

            if remaining.peek().is_some() {
                tokio::time::sleep(self.config.pacing.batch_delay).await;
            }
        }

        report
    }

    /// Launch every unit of the batch and wait for all of them.
    async fn run_batch(&self, batch: Vec<AccountSession>) -> Vec<ExecutionOutcome> {
        match self.config.isolation {
            IsolationMode::Task => {
                let handles = batch.into_iter().map(|session| {
                    let index = session.index;
                    let handle = tokio::spawn(run_unit(
                        Arc::clone(&self.config),
                        Arc::clone(&self.factory),
                        session,
                    ));
                    async move {
                        handle.await.unwrap_or_else(|e| {
                            ExecutionOutcome::crashed(
                                index,
                                format!("Execution unit terminated abnormally: {e}"),
                            )
                        })
                    }
                });
                join_all(handles).await
            }
            IsolationMode::Thread => {
                let receivers = batch.into_iter().map(|session| {
                    let index = session.index;
                    let rx = spawn_thread_unit(
                        index,
                        run_unit(Arc::clone(&self.config), Arc::clone(&self.factory), session),
                    );
                    async move {
                        match rx {
                            Ok(rx) => rx.await.unwrap_or_else(|_| {
                                ExecutionOutcome::crashed(
                                    index,
                                    "Execution unit thread exited without reporting",
                                )
                            }),
                            Err(outcome) => outcome,
                        }
                    }
                });
                join_all(receivers).await
            }
        }
    }
}

/// One execution unit: bind a client to the session's egress, then run the
/// state machine.
async fn run_unit(
    config: Arc<BotConfig>,
    factory: Arc<dyn ClientFactory>,
    session: AccountSession,
) -> ExecutionOutcome {
    let index = session.index;
    let client = match factory.connect(session.proxy.as_ref()) {
        Ok(client) => client,
        Err(e) => return ExecutionOutcome::failure(index, AccountState::Failed, e.to_string()),
    };
    AccountRunner::new(config, client).run(session).await
}

/// Run `unit` on a dedicated OS thread with its own single-threaded runtime.
///
/// The outcome arrives on the returned channel; a panic drops the sender.
fn spawn_thread_unit<F>(
    index: usize,
    unit: F,
) -> Result<oneshot::Receiver<ExecutionOutcome>, ExecutionOutcome>
where
    F: Future<Output = ExecutionOutcome> + Send + 'static,
{
    let (tx, rx) = oneshot::channel();

    std::thread::Builder::new()
        .name(format!("account-{}", index + 1))
        .spawn(move || {
            let outcome = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime.block_on(unit),
                Err(e) => ExecutionOutcome::crashed(index, format!("Failed to start runtime: {e}")),
            };
            let _ = tx.send(outcome);
        })
        .map_err(|e| ExecutionOutcome::crashed(index, format!("Failed to spawn thread: {e}")))?;

    Ok(rx)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::account::{Credential, build_sessions};
    use crate::client::{AuthInfo, RemoteClient, ResourceState, Task, TaskCompletion, TaskId};
    use crate::config::Pacing;
    use crate::error::ClientError;
    use crate::input::ProxyRef;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Event {
        Start(usize),
        End(usize),
    }

    #[derive(Default)]
    struct Probe {
        events: Mutex<Vec<Event>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        connects: AtomicUsize,
    }

    /// Account number comes from the `n=` field; `panic` in the blob makes
    /// the unit blow up mid-auth.
    struct RecordingClient {
        probe: Arc<Probe>,
    }

    fn account_of(cred: &Credential) -> usize {
        url::form_urlencoded::parse(cred.expose().as_bytes())
            .find(|(k, _)| k == "n")
            .and_then(|(_, v)| v.parse().ok())
            .unwrap_or(usize::MAX)
    }

    #[async_trait]
    impl RemoteClient for RecordingClient {
        async fn authenticate(&self, cred: &Credential) -> Result<AuthInfo, ClientError> {
            let n = account_of(cred);
            self.probe.events.lock().unwrap().push(Event::Start(n));
            let now = self.probe.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.probe.max_in_flight.fetch_max(now, Ordering::SeqCst);

            if cred.expose().contains("panic") {
                self.probe.in_flight.fetch_sub(1, Ordering::SeqCst);
                self.probe.events.lock().unwrap().push(Event::End(n));
                panic!("account {n} blew up");
            }

            // Later accounts finish first within a batch.
            tokio::time::sleep(Duration::from_millis(30 - (n as u64 % 3) * 10)).await;
            Ok(AuthInfo::default())
        }

        async fn fetch_referral_info(&self, _cred: &Credential) -> Result<(), ClientError> {
            Ok(())
        }

        async fn fetch_power_state(
            &self,
            cred: &Credential,
        ) -> Result<ResourceState, ClientError> {
            self.probe.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.probe
                .events
                .lock()
                .unwrap()
                .push(Event::End(account_of(cred)));
            Ok(ResourceState::default())
        }

        async fn list_missions(&self, _cred: &Credential) -> Result<Vec<Task>, ClientError> {
            Ok(Vec::new())
        }

        async fn list_daily_tasks(&self, _cred: &Credential) -> Result<Vec<Task>, ClientError> {
            Ok(Vec::new())
        }

        async fn complete_task(
            &self,
            _cred: &Credential,
            _task_id: &TaskId,
        ) -> Result<TaskCompletion, ClientError> {
            Ok(TaskCompletion::default())
        }

        async fn contribute(&self, _cred: &Credential) -> Result<ResourceState, ClientError> {
            Ok(ResourceState::default())
        }

        async fn probe_egress_ip(&self) -> Result<String, ClientError> {
            Ok("198.51.100.1".into())
        }
    }

    struct RecordingFactory {
        probe: Arc<Probe>,
    }

    impl ClientFactory for RecordingFactory {
        fn connect(
            &self,
            _proxy: Option<&ProxyRef>,
        ) -> Result<Arc<dyn RemoteClient>, ClientError> {
            self.probe.connects.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(RecordingClient {
                probe: Arc::clone(&self.probe),
            }))
        }
    }

    struct UnreachableFactory;

    impl ClientFactory for UnreachableFactory {
        fn connect(
            &self,
            _proxy: Option<&ProxyRef>,
        ) -> Result<Arc<dyn RemoteClient>, ClientError> {
            Err(ClientError::Build("proxy rejected".into()))
        }
    }

    fn accounts(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("user=%7B%7D&n={i}")).collect()
    }

    fn scheduler(max_concurrent: usize, isolation: IsolationMode) -> (BatchScheduler, Arc<Probe>) {
        let probe = Arc::new(Probe::default());
        let config = Arc::new(BotConfig {
            max_concurrent,
            isolation,
            start_delay: (0, 0),
            pacing: Pacing::immediate(),
            ..BotConfig::default()
        });
        let factory = Arc::new(RecordingFactory {
            probe: Arc::clone(&probe),
        });
        (BatchScheduler::new(config, factory), probe)
    }

    /// Every End of batch k precedes every Start of batch k + 1.
    fn assert_barrier(events: &[Event], batch_size: usize) {
        let batch_of = |n: usize| n / batch_size;
        for (i, event) in events.iter().enumerate() {
            if let Event::Start(n) = event {
                let earlier_batches_done = events[i..].iter().all(|later| match later {
                    Event::End(m) => batch_of(*m) >= batch_of(*n),
                    Event::Start(_) => true,
                });
                assert!(earlier_batches_done, "batch barrier violated: {events:?}");
            }
        }
    }

    #[tokio::test]
    async fn one_outcome_per_account_in_ceil_batches() {
        for (n, cap, expected_batches) in [(5, 2, 3), (4, 4, 1), (3, 10, 1), (7, 1, 7)] {
            let (scheduler, probe) = scheduler(cap, IsolationMode::Task);
            let report = scheduler
                .run_cycle(build_sessions(&accounts(n), &[]), 1)
                .await;

            assert_eq!(report.outcomes.len(), n);
            assert_eq!(report.batches, expected_batches);
            assert_eq!(report.succeeded(), n);
            assert_eq!(probe.connects.load(Ordering::SeqCst), n);
            let indices: Vec<usize> = report.outcomes.iter().map(|o| o.account_index).collect();
            assert_eq!(indices, (0..n).collect::<Vec<_>>());
        }
    }

    #[tokio::test]
    async fn batches_are_barriers() {
        let (scheduler, probe) = scheduler(2, IsolationMode::Task);
        scheduler
            .run_cycle(build_sessions(&accounts(5), &[]), 1)
            .await;

        let events = probe.events.lock().unwrap().clone();
        assert_eq!(events.len(), 10);
        assert_barrier(&events, 2);
        assert!(probe.max_in_flight.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn panicking_unit_is_isolated() {
        let (scheduler, _probe) = scheduler(3, IsolationMode::Task);
        let mut raw = accounts(3);
        raw[1].push_str("&panic=1");

        let report = scheduler.run_cycle(build_sessions(&raw, &[]), 1).await;

        assert_eq!(report.outcomes.len(), 3);
        assert!(report.outcomes[0].success);
        assert!(!report.outcomes[1].success);
        assert!(report.outcomes[1].error.is_some());
        assert!(report.outcomes[2].success);
        assert_eq!(report.failed(), 1);
    }

    #[tokio::test]
    async fn thread_isolation_contains_panics() {
        let (scheduler, probe) = scheduler(2, IsolationMode::Thread);
        let mut raw = accounts(4);
        raw[2].push_str("&panic=1");

        let report = scheduler.run_cycle(build_sessions(&raw, &[]), 1).await;

        assert_eq!(report.batches, 2);
        assert_eq!(report.outcomes.len(), 4);
        assert_eq!(report.failed(), 1);
        assert!(!report.outcomes[2].success);
        assert_eq!(report.outcomes[2].state, AccountState::Failed);

        let events = probe.events.lock().unwrap().clone();
        assert_barrier(&events, 2);
    }

    #[tokio::test]
    async fn malformed_credential_does_not_affect_siblings() {
        let (scheduler, _probe) = scheduler(3, IsolationMode::Task);
        let mut raw = accounts(3);
        raw[0] = "n=0&no_user_here=1".to_string();

        let report = scheduler.run_cycle(build_sessions(&raw, &[]), 1).await;

        assert!(!report.outcomes[0].success);
        assert!(report.outcomes[1].success);
        assert!(report.outcomes[2].success);
    }

    #[tokio::test]
    async fn connect_failure_reports_failed_state() {
        let config = Arc::new(BotConfig {
            start_delay: (0, 0),
            pacing: Pacing::immediate(),
            ..BotConfig::default()
        });
        let scheduler = BatchScheduler::new(config, Arc::new(UnreachableFactory));

        let report = scheduler
            .run_cycle(build_sessions(&accounts(2), &[]), 1)
            .await;

        assert_eq!(report.failed(), 2);
        for outcome in &report.outcomes {
            assert_eq!(outcome.state, AccountState::Failed);
            assert!(outcome.error.as_deref().unwrap().contains("proxy rejected"));
        }
    }

    #[tokio::test]
    async fn empty_cycle_has_no_batches() {
        let (scheduler, _probe) = scheduler(3, IsolationMode::Task);
        let report = scheduler.run_cycle(Vec::new(), 1).await;
        assert_eq!(report.batches, 0);
        assert!(report.outcomes.is_empty());
    }
}
