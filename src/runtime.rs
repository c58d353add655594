//! One request/response cycle against a remote assistant run.

use std::future::Future;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use assistant_provider::{
    AssistantBackend, BackendError, CancelSignal, ConversationHandle, MessageRole, RunSnapshot,
    RunStatus,
};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::{DEFAULT_POLL_INTERVAL, DEFAULT_RUN_TIMEOUT};
use crate::error::{TurnError, TurnFailure, TurnStage};
use crate::tools::ToolTable;

pub const NO_RESPONSE_REPLY: &str = "No response from the assistant. Please try again.";

const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(50);
/// Ceiling on the best-effort cancel request sent after an abandoned run.
const CANCEL_RUN_TIMEOUT: Duration = Duration::from_secs(10);

/// Polling policy for a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnSettings {
    pub poll_interval: Duration,
    /// Wall-clock ceiling on waiting for a run, measured from run start. It
    /// bounds every remote call and sleep after the run is created.
    pub run_timeout: Duration,
}

impl Default for TurnSettings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            run_timeout: DEFAULT_RUN_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    pub reply: String,
    pub handle: ConversationHandle,
}

/// Drives thread creation, run polling and tool dispatch for single turns.
pub struct TurnExecutor {
    backend: Arc<dyn AssistantBackend>,
    tools: Option<Arc<ToolTable>>,
    settings: TurnSettings,
}

impl TurnExecutor {
    #[must_use]
    pub fn new(backend: Arc<dyn AssistantBackend>, settings: TurnSettings) -> Self {
        Self {
            backend,
            tools: None,
            settings,
        }
    }

    /// Lets `requires_action` runs call into `tools`.
    #[must_use]
    pub fn with_tools(mut self, tools: Arc<ToolTable>) -> Self {
        self.tools = Some(tools);
        self
    }

    #[must_use]
    pub fn settings(&self) -> TurnSettings {
        self.settings
    }

    #[must_use]
    pub fn backend(&self) -> &Arc<dyn AssistantBackend> {
        &self.backend
    }

    /// Sends `message` and waits for the assistant's reply.
    ///
    /// Without a handle a new thread is created first. On failure the
    /// returned [`TurnFailure`] still carries the handle so the next turn
    /// continues the same conversation.
    pub async fn execute(
        &self,
        message: &str,
        handle: Option<ConversationHandle>,
        assistant_id: &str,
        cancel: &CancelSignal,
    ) -> Result<TurnOutcome, TurnFailure> {
        let mut turn = Turn {
            executor: self,
            cancel,
            stage: TurnStage::CreatingThread,
            handle,
            open_run: None,
        };

        match turn.run(message, assistant_id).await {
            Ok(reply) => {
                if let Some(handle) = turn.handle.clone() {
                    return Ok(TurnOutcome { reply, handle });
                }
                Err(turn.fail(TurnError::Backend(BackendError::new(
                    "no conversation handle after a completed turn",
                ))))
            }
            Err(error) => {
                turn.abandon_open_run().await;
                let failure = turn.fail(error);
                if failure.is_cancelled() {
                    info!(stage = %failure.stage, "turn cancelled");
                } else {
                    warn!(stage = %failure.stage, error = %failure.error, "turn failed");
                }
                Err(failure)
            }
        }
    }
}

struct Turn<'a> {
    executor: &'a TurnExecutor,
    cancel: &'a CancelSignal,
    stage: TurnStage,
    handle: Option<ConversationHandle>,
    /// Run started by this turn that has not reached a terminal status.
    open_run: Option<String>,
}

impl Turn<'_> {
    fn fail(self, error: TurnError) -> TurnFailure {
        TurnFailure {
            stage: self.stage,
            error,
            handle: self.handle,
        }
    }

    async fn run(&mut self, message: &str, assistant_id: &str) -> Result<String, TurnError> {
        let backend = Arc::clone(&self.executor.backend);
        let settings = self.executor.settings;

        let thread = match self.handle.clone() {
            Some(handle) => handle,
            None => {
                self.stage = TurnStage::CreatingThread;
                let handle = self.call(backend.create_thread()).await?;
                debug!(thread = %handle, "created conversation thread");
                self.handle = Some(handle.clone());
                handle
            }
        };

        self.stage = TurnStage::PostingMessage;
        self.call(backend.post_user_message(&thread, message)).await?;

        self.stage = TurnStage::StartingRun;
        let mut run = self.call(backend.start_run(&thread, assistant_id)).await?;
        let deadline = Instant::now() + settings.run_timeout;
        self.track(&run);

        loop {
            self.stage = TurnStage::PollingRun;
            while !run.status.stops_polling() {
                if Instant::now() >= deadline {
                    return Err(TurnError::Timeout(settings.run_timeout));
                }
                self.call_before(deadline, async {
                    tokio::time::sleep(settings.poll_interval).await;
                    Ok(())
                })
                .await?;
                run = self
                    .call_before(deadline, backend.retrieve_run(&thread, &run.run_id))
                    .await?;
                self.track(&run);
                debug!(run_id = %run.run_id, status = %run.status, "polled run");
            }

            if run.status != RunStatus::RequiresAction {
                break;
            }
            run = self.submit_tool_outputs(&thread, run, deadline).await?;
            self.track(&run);
        }

        if run.status != RunStatus::Completed {
            let detail = run
                .last_error
                .clone()
                .unwrap_or_else(|| run.status.as_str().to_string());
            return Err(TurnError::RunFailed {
                status: run.status,
                detail,
            });
        }

        self.stage = TurnStage::ListingMessages;
        let messages = self
            .call_before(deadline, backend.list_messages(&thread))
            .await?;
        let reply = messages
            .into_iter()
            .find(|message| message.role == MessageRole::Assistant)
            .and_then(|message| message.text)
            .unwrap_or_else(|| NO_RESPONSE_REPLY.to_string());
        Ok(reply)
    }

    async fn submit_tool_outputs(
        &mut self,
        thread: &ConversationHandle,
        run: RunSnapshot,
        deadline: Instant,
    ) -> Result<RunSnapshot, TurnError> {
        let Some(tools) = self.executor.tools.clone() else {
            return Err(TurnError::RunFailed {
                status: run.status,
                detail: "the run requested tool outputs but no tools are available".to_string(),
            });
        };

        self.stage = TurnStage::SubmittingToolOutputs;
        let results = tools.dispatch(&run.tool_calls);
        debug!(run_id = %run.run_id, count = results.len(), "submitting tool outputs");

        let submission = self
            .executor
            .backend
            .submit_tool_outputs(thread, &run.run_id, results);
        let submission = tokio::time::timeout_at(deadline, submission);
        let Ok(submitted) = await_or_cancel(submission, self.cancel).await? else {
            return Err(TurnError::Timeout(self.executor.settings.run_timeout));
        };
        match submitted {
            Ok(next) => Ok(next),
            Err(error) => {
                warn!(run_id = %run.run_id, %error, "failed to submit tool outputs");
                Err(TurnError::ToolSubmission(error))
            }
        }
    }

    async fn call<T, F>(&self, future: F) -> Result<T, TurnError>
    where
        F: Future<Output = Result<T, BackendError>>,
    {
        await_or_cancel(future, self.cancel)
            .await?
            .map_err(TurnError::from)
    }

    /// Like [`Self::call`], failing with `Timeout` once `deadline` passes.
    async fn call_before<T, F>(&self, deadline: Instant, future: F) -> Result<T, TurnError>
    where
        F: Future<Output = Result<T, BackendError>>,
    {
        match await_or_cancel(tokio::time::timeout_at(deadline, future), self.cancel).await? {
            Ok(output) => output.map_err(TurnError::from),
            Err(_) => Err(TurnError::Timeout(self.executor.settings.run_timeout)),
        }
    }

    fn track(&mut self, run: &RunSnapshot) {
        self.open_run = (!run.status.is_terminal()).then(|| run.run_id.clone());
    }

    /// Best-effort cancel of a run this turn gives up on, so the thread
    /// accepts the next message.
    async fn abandon_open_run(&mut self) {
        let (Some(run_id), Some(thread)) = (self.open_run.take(), self.handle.clone()) else {
            return;
        };

        let request = self.executor.backend.cancel_run(&thread, &run_id);
        match tokio::time::timeout(CANCEL_RUN_TIMEOUT, request).await {
            Ok(Ok(run)) => info!(run_id = %run_id, status = %run.status, "cancelled abandoned run"),
            Ok(Err(error)) => warn!(run_id = %run_id, %error, "failed to cancel abandoned run"),
            Err(_) => warn!(run_id = %run_id, "cancel request for abandoned run timed out"),
        }
    }
}

fn is_cancelled(cancel: &CancelSignal) -> bool {
    cancel.load(Ordering::Acquire)
}

/// Races `future` against the cancel flag, checking it every
/// `CANCEL_POLL_INTERVAL`.
async fn await_or_cancel<F>(future: F, cancel: &CancelSignal) -> Result<F::Output, TurnError>
where
    F: Future,
{
    let mut future = Box::pin(future);

    loop {
        if is_cancelled(cancel) {
            return Err(TurnError::Cancelled);
        }

        if let Ok(output) = tokio::time::timeout(CANCEL_POLL_INTERVAL, &mut future).await {
            if is_cancelled(cancel) {
                return Err(TurnError::Cancelled);
            }
            return Ok(output);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use super::{await_or_cancel, TurnSettings};
    use crate::error::TurnError;

    #[test]
    fn default_settings_poll_every_second_for_a_minute() {
        let settings = TurnSettings::default();
        assert_eq!(settings.poll_interval, Duration::from_secs(1));
        assert_eq!(settings.run_timeout, Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn await_or_cancel_returns_output_when_not_cancelled() {
        let cancel = Arc::new(AtomicBool::new(false));
        let output = await_or_cancel(
            async {
                tokio::time::sleep(Duration::from_millis(120)).await;
                7
            },
            &cancel,
        )
        .await
        .expect("not cancelled");
        assert_eq!(output, 7);
    }

    #[tokio::test(start_paused = true)]
    async fn await_or_cancel_stops_pending_future_once_flag_is_set() {
        let cancel = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancel);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            flag.store(true, Ordering::Release);
        });

        let result = await_or_cancel(std::future::pending::<()>(), &cancel).await;

        assert!(matches!(result, Err(TurnError::Cancelled)));
    }
}
