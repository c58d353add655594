//! Deterministic mock implementation of the shared `assistant_provider` contract.
//!
//! Runs follow caller-provided scripts, every call is recorded, and single
//! calls can be made to fail or to never answer. Like the hosted API, a
//! thread rejects new messages while one of its runs is still active.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use assistant_provider::{
    AssistantBackend, BackendError, ConversationHandle, MessageRole, ProviderProfile,
    RunSnapshot, RunStatus, ThreadMessage, ToolCallRequest, ToolResult,
};
use async_trait::async_trait;

/// Stable provider identifier used for explicit startup selection.
pub const MOCK_PROVIDER_ID: &str = "mock";

/// One status a scripted run reports on the next start/retrieve/submit call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStep {
    Status(RunStatus),
    Failed(String),
    RequiresTools(Vec<ToolCallRequest>),
}

/// Scripted lifecycle of a single run.
///
/// The last step repeats once the script is exhausted, so a script ending in
/// `in_progress` never finishes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunScript {
    steps: VecDeque<RunStep>,
    reply: Option<String>,
}

impl RunScript {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-step run that completes with `reply`.
    #[must_use]
    pub fn completed_with(reply: impl Into<String>) -> Self {
        Self::new().then(RunStatus::Completed).reply(reply)
    }

    #[must_use]
    pub fn then(mut self, status: RunStatus) -> Self {
        self.steps.push_back(RunStep::Status(status));
        self
    }

    #[must_use]
    pub fn then_failed(mut self, detail: impl Into<String>) -> Self {
        self.steps.push_back(RunStep::Failed(detail.into()));
        self
    }

    #[must_use]
    pub fn then_tool_calls(mut self, calls: Vec<ToolCallRequest>) -> Self {
        self.steps.push_back(RunStep::RequiresTools(calls));
        self
    }

    /// Assistant message appended to the thread when the run completes.
    #[must_use]
    pub fn reply(mut self, text: impl Into<String>) -> Self {
        self.reply = Some(text.into());
        self
    }
}

/// Backend operation, used to inject failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockCallKind {
    CreateThread,
    PostUserMessage,
    StartRun,
    RetrieveRun,
    SubmitToolOutputs,
    ListMessages,
    CancelRun,
}

/// Recorded backend call.
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    CreateThread,
    PostUserMessage {
        thread: String,
        text: String,
    },
    StartRun {
        thread: String,
        assistant_id: String,
    },
    RetrieveRun {
        thread: String,
        run_id: String,
    },
    SubmitToolOutputs {
        thread: String,
        run_id: String,
        results: Vec<ToolResult>,
    },
    ListMessages {
        thread: String,
    },
    CancelRun {
        thread: String,
        run_id: String,
    },
}

impl MockCall {
    #[must_use]
    pub fn kind(&self) -> MockCallKind {
        match self {
            Self::CreateThread => MockCallKind::CreateThread,
            Self::PostUserMessage { .. } => MockCallKind::PostUserMessage,
            Self::StartRun { .. } => MockCallKind::StartRun,
            Self::RetrieveRun { .. } => MockCallKind::RetrieveRun,
            Self::SubmitToolOutputs { .. } => MockCallKind::SubmitToolOutputs,
            Self::ListMessages { .. } => MockCallKind::ListMessages,
            Self::CancelRun { .. } => MockCallKind::CancelRun,
        }
    }
}

#[derive(Debug)]
struct ActiveRun {
    thread: String,
    script: RunScript,
    last: RunSnapshot,
}

#[derive(Debug, Default)]
struct MockState {
    next_thread: u64,
    next_run: u64,
    scripts: VecDeque<RunScript>,
    runs: HashMap<String, ActiveRun>,
    /// Per-thread messages, oldest first.
    threads: HashMap<String, Vec<ThreadMessage>>,
    failures: HashMap<MockCallKind, VecDeque<String>>,
    stalls: HashSet<MockCallKind>,
    calls: Vec<MockCall>,
}

/// Deterministic backend used by `assistant_chat` tests and local runs.
#[derive(Debug, Default)]
pub struct MockBackend {
    state: Mutex<MockState>,
    latency: Option<Duration>,
}

impl MockBackend {
    /// Creates a backend whose unscripted runs complete with an echo reply.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues scripts consumed in order by successive `start_run` calls.
    #[must_use]
    pub fn with_runs(self, scripts: impl IntoIterator<Item = RunScript>) -> Self {
        lock_unpoisoned(&self.state).scripts.extend(scripts);
        self
    }

    /// Delays every call, giving callers a suspension point to cancel at.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Makes the next call of `kind` fail with `message`.
    pub fn fail_next(&self, kind: MockCallKind, message: impl Into<String>) {
        lock_unpoisoned(&self.state)
            .failures
            .entry(kind)
            .or_default()
            .push_back(message.into());
    }

    /// Makes the next call of `kind` record itself and then never return.
    pub fn stall_next(&self, kind: MockCallKind) {
        lock_unpoisoned(&self.state).stalls.insert(kind);
    }

    pub fn push_run(&self, script: RunScript) {
        lock_unpoisoned(&self.state).scripts.push_back(script);
    }

    #[must_use]
    pub fn calls(&self) -> Vec<MockCall> {
        lock_unpoisoned(&self.state).calls.clone()
    }

    #[must_use]
    pub fn call_count(&self, kind: MockCallKind) -> usize {
        lock_unpoisoned(&self.state)
            .calls
            .iter()
            .filter(|call| call.kind() == kind)
            .count()
    }

    /// Messages of `thread`, oldest first.
    #[must_use]
    pub fn thread_messages(&self, thread: &ConversationHandle) -> Vec<ThreadMessage> {
        lock_unpoisoned(&self.state)
            .threads
            .get(thread.as_str())
            .cloned()
            .unwrap_or_default()
    }

    async fn enter(&self, call: MockCall) -> Result<(), BackendError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let kind = call.kind();
        let stalled = {
            let mut state = lock_unpoisoned(&self.state);
            state.calls.push(call);
            if let Some(message) = state.failures.get_mut(&kind).and_then(VecDeque::pop_front) {
                return Err(BackendError::new(message));
            }
            state.stalls.remove(&kind)
        };

        if stalled {
            std::future::pending::<()>().await;
        }
        Ok(())
    }
}

impl MockState {
    fn thread_mut(&mut self, thread: &str) -> Result<&mut Vec<ThreadMessage>, BackendError> {
        self.threads
            .get_mut(thread)
            .ok_or_else(|| BackendError::new(format!("No thread found with id '{thread}'.")))
    }

    fn active_run(&self, thread: &str) -> Option<&str> {
        self.runs
            .iter()
            .find(|(_, run)| run.thread == thread && !run.last.status.is_terminal())
            .map(|(run_id, _)| run_id.as_str())
    }

    fn advance(&mut self, run_id: &str) -> Result<RunSnapshot, BackendError> {
        let run = self
            .runs
            .get_mut(run_id)
            .ok_or_else(|| BackendError::new(format!("No run found with id '{run_id}'.")))?;

        if let Some(step) = run.script.steps.pop_front() {
            let mut snapshot = RunSnapshot::new(run_id, RunStatus::InProgress);
            match step {
                RunStep::Status(status) => snapshot.status = status,
                RunStep::Failed(detail) => {
                    snapshot.status = RunStatus::Failed;
                    snapshot.last_error = Some(detail);
                }
                RunStep::RequiresTools(calls) => {
                    snapshot.status = RunStatus::RequiresAction;
                    snapshot.tool_calls = calls;
                }
            }
            run.last = snapshot;
        }

        let snapshot = run.last.clone();
        if snapshot.status == RunStatus::Completed {
            if let Some(reply) = run.script.reply.take() {
                let thread = run.thread.clone();
                self.thread_mut(&thread)?.push(ThreadMessage {
                    role: MessageRole::Assistant,
                    text: Some(reply),
                });
            }
        }
        Ok(snapshot)
    }
}

#[async_trait]
impl AssistantBackend for MockBackend {
    fn profile(&self) -> ProviderProfile {
        ProviderProfile {
            provider_id: MOCK_PROVIDER_ID.to_string(),
            endpoint: "mock://assistants".to_string(),
        }
    }

    async fn create_thread(&self) -> Result<ConversationHandle, BackendError> {
        self.enter(MockCall::CreateThread).await?;

        let mut state = lock_unpoisoned(&self.state);
        state.next_thread += 1;
        let id = format!("thread_mock_{}", state.next_thread);
        state.threads.insert(id.clone(), Vec::new());
        Ok(ConversationHandle::new(id))
    }

    async fn post_user_message(
        &self,
        thread: &ConversationHandle,
        text: &str,
    ) -> Result<(), BackendError> {
        self.enter(MockCall::PostUserMessage {
            thread: thread.to_string(),
            text: text.to_string(),
        })
        .await?;

        let mut state = lock_unpoisoned(&self.state);
        if let Some(run_id) = state.active_run(thread.as_str()) {
            return Err(BackendError::new(format!(
                "Can't add messages to {thread} while a run {run_id} is active."
            )));
        }
        state
            .thread_mut(thread.as_str())?
            .push(ThreadMessage {
                role: MessageRole::User,
                text: Some(text.to_string()),
            });
        Ok(())
    }

    async fn start_run(
        &self,
        thread: &ConversationHandle,
        assistant_id: &str,
    ) -> Result<RunSnapshot, BackendError> {
        self.enter(MockCall::StartRun {
            thread: thread.to_string(),
            assistant_id: assistant_id.to_string(),
        })
        .await?;

        let mut state = lock_unpoisoned(&self.state);
        let last_user_text = state
            .thread_mut(thread.as_str())?
            .iter()
            .rev()
            .find(|message| message.role == MessageRole::User)
            .and_then(|message| message.text.clone())
            .unwrap_or_default();
        let script = state
            .scripts
            .pop_front()
            .unwrap_or_else(|| RunScript::completed_with(format!("Mock reply: {last_user_text}")));

        state.next_run += 1;
        let run_id = format!("run_mock_{}", state.next_run);
        state.runs.insert(
            run_id.clone(),
            ActiveRun {
                thread: thread.to_string(),
                script,
                last: RunSnapshot::new(run_id.clone(), RunStatus::Queued),
            },
        );
        state.advance(&run_id)
    }

    async fn retrieve_run(
        &self,
        thread: &ConversationHandle,
        run_id: &str,
    ) -> Result<RunSnapshot, BackendError> {
        self.enter(MockCall::RetrieveRun {
            thread: thread.to_string(),
            run_id: run_id.to_string(),
        })
        .await?;

        lock_unpoisoned(&self.state).advance(run_id)
    }

    async fn submit_tool_outputs(
        &self,
        thread: &ConversationHandle,
        run_id: &str,
        results: Vec<ToolResult>,
    ) -> Result<RunSnapshot, BackendError> {
        self.enter(MockCall::SubmitToolOutputs {
            thread: thread.to_string(),
            run_id: run_id.to_string(),
            results,
        })
        .await?;

        lock_unpoisoned(&self.state).advance(run_id)
    }

    async fn list_messages(
        &self,
        thread: &ConversationHandle,
    ) -> Result<Vec<ThreadMessage>, BackendError> {
        self.enter(MockCall::ListMessages {
            thread: thread.to_string(),
        })
        .await?;

        let mut state = lock_unpoisoned(&self.state);
        let mut messages = state.thread_mut(thread.as_str())?.clone();
        messages.reverse();
        Ok(messages)
    }

    async fn cancel_run(
        &self,
        thread: &ConversationHandle,
        run_id: &str,
    ) -> Result<RunSnapshot, BackendError> {
        self.enter(MockCall::CancelRun {
            thread: thread.to_string(),
            run_id: run_id.to_string(),
        })
        .await?;

        let mut state = lock_unpoisoned(&self.state);
        let run = state
            .runs
            .get_mut(run_id)
            .ok_or_else(|| BackendError::new(format!("No run found with id '{run_id}'.")))?;
        if !run.last.status.is_terminal() {
            run.script = RunScript::new();
            run.last = RunSnapshot::new(run_id, RunStatus::Cancelled);
        }
        Ok(run.last.clone())
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
