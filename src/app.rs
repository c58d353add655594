use std::path::PathBuf;
use std::sync::Arc;

use assistant_directory::AssistantDirectory;
use assistant_provider::{AssistantBackend, CancelSignal, ConversationHandle};
use tracing::{debug, info};

use crate::config::Variant;
use crate::error::TurnFailure;
use crate::nutrition::{is_nutrition_trigger, render_advice, NutritionClient};
use crate::runtime::{TurnExecutor, TurnSettings};
use crate::tools::ToolTable;
use crate::transcript::{Transcript, TranscriptEntry};

pub const SELECT_ASSISTANT_REPLY: &str = "Please select a valid assistant.";

/// Process-wide state built once at startup and shared by sessions.
pub struct ChatContext {
    variant: Variant,
    executor: TurnExecutor,
    assistant_id: Option<String>,
    directory: AssistantDirectory,
    tools: Option<Arc<ToolTable>>,
    nutrition: Option<NutritionClient>,
}

impl ChatContext {
    /// Creates a context; the tools variant gets the fitness tool table and
    /// the nutrition shortcut.
    #[must_use]
    pub fn new(variant: Variant, backend: Arc<dyn AssistantBackend>, settings: TurnSettings) -> Self {
        let mut executor = TurnExecutor::new(backend, settings);
        let mut tools = None;
        let mut nutrition = None;
        if variant == Variant::Tools {
            let table = Arc::new(ToolTable::fitness());
            executor = executor.with_tools(Arc::clone(&table));
            tools = Some(table);
            nutrition = Some(NutritionClient::new(None));
        }

        Self {
            variant,
            executor,
            assistant_id: None,
            directory: AssistantDirectory::default(),
            tools,
            nutrition,
        }
    }

    #[must_use]
    pub fn with_assistant_id(mut self, assistant_id: Option<String>) -> Self {
        self.assistant_id = assistant_id;
        self
    }

    #[must_use]
    pub fn with_directory(mut self, directory: AssistantDirectory) -> Self {
        self.directory = directory;
        self
    }

    /// Replaces the nutrition client; only used by the tools variant.
    #[must_use]
    pub fn with_nutrition(mut self, client: NutritionClient) -> Self {
        if self.variant == Variant::Tools {
            self.nutrition = Some(client);
        }
        self
    }

    #[must_use]
    pub fn variant(&self) -> Variant {
        self.variant
    }

    #[must_use]
    pub fn executor(&self) -> &TurnExecutor {
        &self.executor
    }

    #[must_use]
    pub fn assistant_id(&self) -> Option<&str> {
        self.assistant_id.as_deref()
    }

    #[must_use]
    pub fn directory(&self) -> &AssistantDirectory {
        &self.directory
    }

    #[must_use]
    pub fn tools(&self) -> Option<&ToolTable> {
        self.tools.as_deref()
    }
}

/// What a submitted message produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// A reply (possibly a rendered failure) was added to the transcript.
    Replied(TranscriptEntry),
    /// The turn was cancelled; nothing was added.
    Cancelled,
}

/// One conversation: transcript, thread handle and assistant selection.
pub struct ChatSession {
    context: Arc<ChatContext>,
    transcript: Transcript,
    handle: Option<ConversationHandle>,
    selected: Option<String>,
}

impl ChatSession {
    #[must_use]
    pub fn new(context: Arc<ChatContext>) -> Self {
        Self {
            context,
            transcript: Transcript::new(),
            handle: None,
            selected: None,
        }
    }

    #[must_use]
    pub fn context(&self) -> &ChatContext {
        &self.context
    }

    #[must_use]
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    #[must_use]
    pub fn handle(&self) -> Option<&ConversationHandle> {
        self.handle.as_ref()
    }

    #[must_use]
    pub fn selected_assistant(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Sends one user message and records the reply.
    pub async fn submit(&mut self, message: &str, cancel: &CancelSignal) -> SubmitOutcome {
        let context = Arc::clone(&self.context);

        let Some(assistant_id) = self.active_assistant_id() else {
            debug!("message submitted without a valid assistant selection");
            return self.record(message, SELECT_ASSISTANT_REPLY.to_string(), false);
        };

        if let Some(nutrition) = context.nutrition.as_ref() {
            if is_nutrition_trigger(message) {
                let advice = nutrition.advice().await;
                let is_error = advice.get("error").is_some();
                return self.record(message, render_advice(&advice), is_error);
            }
        }

        match context
            .executor
            .execute(message, self.handle.clone(), &assistant_id, cancel)
            .await
        {
            Ok(outcome) => {
                self.handle = Some(outcome.handle);
                self.record(message, outcome.reply, false)
            }
            Err(failure) => self.record_failure(message, failure),
        }
    }

    /// Forgets the transcript and the conversation thread.
    pub fn clear(&mut self) {
        self.transcript.clear();
        self.handle = None;
    }

    /// Selects a directory assistant by name and starts a fresh conversation.
    pub fn select_assistant(&mut self, name: &str) -> Result<(), String> {
        let name = name.trim();
        let Some(entry) = self.context.directory.get(name) else {
            return Err(format!("Unknown assistant '{name}'."));
        };

        info!(assistant = %entry.name, "selected assistant");
        self.selected = Some(entry.name.clone());
        self.clear();
        Ok(())
    }

    /// Writes the transcript to a kept temp file.
    pub fn export(&self) -> std::io::Result<PathBuf> {
        self.transcript.export_to_temp_file()
    }

    fn active_assistant_id(&self) -> Option<String> {
        match self.context.variant {
            Variant::Directory => self
                .selected
                .as_deref()
                .and_then(|name| self.context.directory.assistant_id(name))
                .map(str::to_string),
            Variant::Single | Variant::Tools => self.context.assistant_id.clone(),
        }
    }

    fn record(&mut self, message: &str, reply: String, is_error: bool) -> SubmitOutcome {
        let entry = TranscriptEntry {
            user: message.to_string(),
            reply,
            is_error,
        };
        self.transcript.push(entry.user.clone(), entry.reply.clone(), is_error);
        SubmitOutcome::Replied(entry)
    }

    fn record_failure(&mut self, message: &str, failure: TurnFailure) -> SubmitOutcome {
        if failure.handle.is_some() {
            self.handle = failure.handle.clone();
        }
        if failure.is_cancelled() {
            return SubmitOutcome::Cancelled;
        }
        self.record(message, failure.reply_text(), true)
    }
}
