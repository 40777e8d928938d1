use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::report::{ReportId, ReportStatus, ResultSet};
use crate::service::{PollError, PollResponse, ReportService, SubmissionError};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);

#[derive(Clone, Debug)]
pub struct SessionOptions {
    pub poll_interval: Duration,
    /// `None` polls until the job reaches a terminal state.
    pub max_polls: Option<u32>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_polls: None,
        }
    }
}

/// Point-in-time view of a session, published on every transition.
#[derive(Clone, Debug)]
pub struct SessionState {
    pub id: ReportId,
    pub status: ReportStatus,
    pub polls: u32,
    pub result: Option<Arc<ResultSet>>,
    pub error: Option<Arc<PollError>>,
}

impl SessionState {
    fn pending(id: ReportId) -> Self {
        Self {
            id,
            status: ReportStatus::Pending,
            polls: 0,
            result: None,
            error: None,
        }
    }

    fn outcome(&self) -> Option<Result<Arc<ResultSet>, SessionError>> {
        match self.status {
            ReportStatus::Complete => self.result.clone().map(Ok),
            ReportStatus::Failed => self.error.clone().map(|e| Err(SessionError::Poll(e))),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Poll(Arc<PollError>),

    #[error("report session was cancelled")]
    Cancelled,
}

/// Drives report jobs on one service: each [`ReportSession::submit`] call
/// starts a job and hands back the handle of its polling task.
#[derive(Clone)]
pub struct ReportSession {
    service: Arc<dyn ReportService>,
    options: SessionOptions,
}

impl ReportSession {
    pub fn new(service: Arc<dyn ReportService>) -> Self {
        Self {
            service,
            options: SessionOptions::default(),
        }
    }

    pub fn with_options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Creates the job and starts polling it.
    ///
    /// A failed submission spawns nothing.
    pub async fn submit(&self) -> Result<SessionHandle, SubmissionError> {
        let id = match self.service.submit().await {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(target: "reportwatch.session", error = %e, "report submission failed");
                return Err(e);
            }
        };
        tracing::info!(target: "reportwatch.session", report_id = %id, "report submitted");

        let (state_tx, state_rx) = watch::channel(SessionState::pending(id.clone()));
        let cancel = CancellationToken::new();
        let task = tokio::spawn(drive(
            self.service.clone(),
            id.clone(),
            self.options.clone(),
            state_tx,
            cancel.clone(),
        ));

        Ok(SessionHandle {
            id,
            state: state_rx,
            cancel,
            task,
        })
    }
}

/// Owner's side of a running session. Dropping the handle cancels it.
#[derive(Debug)]
pub struct SessionHandle {
    id: ReportId,
    state: watch::Receiver<SessionState>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl SessionHandle {
    pub fn id(&self) -> &ReportId {
        &self.id
    }

    pub fn status(&self) -> ReportStatus {
        self.state.borrow().status
    }

    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// Stops the polling task. Nothing is published after this returns.
    pub fn cancel(&self) {
        // Holding the read guard orders this against an in-progress publish.
        let state = self.state.borrow();
        if !self.cancel.is_cancelled() && !state.status.is_terminal() {
            tracing::info!(target: "reportwatch.session", report_id = %self.id, "cancelling report session");
        }
        self.cancel.cancel();
        drop(state);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Resolves once the session is terminal or cancelled.
    pub async fn wait(&self) -> Result<Arc<ResultSet>, SessionError> {
        let mut rx = self.state.clone();
        loop {
            if let Some(outcome) = rx.borrow_and_update().outcome() {
                return outcome;
            }
            if self.cancel.is_cancelled() {
                return Err(SessionError::Cancelled);
            }
            tokio::select! {
                _ = self.cancel.cancelled() => return Err(SessionError::Cancelled),
                changed = rx.changed() => {
                    if changed.is_err() {
                        // task ended without a terminal state
                        if let Some(outcome) = rx.borrow().outcome() {
                            return outcome;
                        }
                        return Err(SessionError::Cancelled);
                    }
                }
            }
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Holds the one live session. Starting a new session cancels the previous
/// one so a superseded polling task never outlives its replacement.
#[derive(Debug, Default)]
pub struct SessionSlot {
    current: Option<SessionHandle>,
}

impl SessionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn start(
        &mut self,
        session: &ReportSession,
    ) -> Result<&SessionHandle, SubmissionError> {
        if let Some(previous) = self.current.take() {
            tracing::debug!(
                target: "reportwatch.session",
                report_id = %previous.id(),
                "superseding previous session"
            );
            previous.cancel();
        }
        let handle = session.submit().await?;
        Ok(self.current.insert(handle))
    }

    pub fn current(&self) -> Option<&SessionHandle> {
        self.current.as_ref()
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.current.take() {
            handle.cancel();
        }
    }
}

fn publish(
    tx: &watch::Sender<SessionState>,
    cancel: &CancellationToken,
    update: impl FnOnce(&mut SessionState),
) {
    tx.send_if_modified(|state| {
        if cancel.is_cancelled() {
            return false;
        }
        let before = state.status;
        update(state);
        debug_assert!(
            before.can_transition_to(state.status),
            "illegal transition {before} -> {}",
            state.status
        );
        true
    });
}

fn fail(
    tx: &watch::Sender<SessionState>,
    cancel: &CancellationToken,
    id: &ReportId,
    polls: u32,
    error: PollError,
) {
    tracing::warn!(target: "reportwatch.session", report_id = %id, polls, error = %error, "report failed");
    publish(tx, cancel, |state| {
        state.status = ReportStatus::Failed;
        state.polls = polls;
        state.error = Some(Arc::new(error));
    });
}

// Strictly sequential: the next sleep starts only after the previous
// response has been classified, so one poll at most is ever in flight.
async fn drive(
    service: Arc<dyn ReportService>,
    id: ReportId,
    options: SessionOptions,
    tx: watch::Sender<SessionState>,
    cancel: CancellationToken,
) {
    let mut polls: u32 = 0;
    if options.max_polls == Some(0) {
        fail(&tx, &cancel, &id, polls, PollError::Exhausted { polls });
        return;
    }
    loop {
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(target: "reportwatch.session", report_id = %id, "poll abandoned");
                return;
            }
            outcome = service.poll(&id) => outcome,
        };
        polls = polls.saturating_add(1);
        if cancel.is_cancelled() {
            return;
        }

        match outcome {
            Ok(PollResponse::Running) => {
                tracing::debug!(target: "reportwatch.session", report_id = %id, polls, "report still running");
                publish(&tx, &cancel, |state| {
                    state.status = ReportStatus::Running;
                    state.polls = polls;
                });
                if options.max_polls.is_some_and(|max| polls >= max) {
                    fail(&tx, &cancel, &id, polls, PollError::Exhausted { polls });
                    return;
                }
            }
            Ok(PollResponse::Complete(rows)) => {
                tracing::info!(
                    target: "reportwatch.session",
                    report_id = %id,
                    polls,
                    rows = rows.len(),
                    "report complete"
                );
                publish(&tx, &cancel, |state| {
                    state.status = ReportStatus::Complete;
                    state.polls = polls;
                    state.result = Some(Arc::new(rows));
                });
                return;
            }
            Ok(PollResponse::Failed { reason }) => {
                fail(&tx, &cancel, &id, polls, PollError::Rejected { reason });
                return;
            }
            Err(error) => {
                fail(&tx, &cancel, &id, polls, error);
                return;
            }
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(options.poll_interval) => {}
        }
    }
}
