//! Ordered chat history and its plain-text export.

use std::io::Write;
use std::path::PathBuf;

use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEntry {
    pub user: String,
    pub reply: String,
    /// The reply is a rendered failure rather than an assistant message.
    pub is_error: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, user: impl Into<String>, reply: impl Into<String>, is_error: bool) {
        self.entries.push(TranscriptEntry {
            user: user.into(),
            reply: reply.into(),
            is_error,
        });
    }

    #[must_use]
    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// `Human: ...` / `AI: ...` pairs separated by newlines.
    #[must_use]
    pub fn export_text(&self) -> String {
        self.entries
            .iter()
            .map(|entry| format!("Human: {}\nAI: {}", entry.user, entry.reply))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Writes [`Self::export_text`] to a new temp file that outlives the process.
    pub fn export_to_temp_file(&self) -> std::io::Result<PathBuf> {
        let mut file = tempfile::Builder::new()
            .prefix("chat-history-")
            .suffix(".txt")
            .tempfile()?;
        file.write_all(self.export_text().as_bytes())?;
        file.flush()?;

        let (_, path) = file.keep().map_err(|error| error.error)?;
        info!(path = %path.display(), entries = self.entries.len(), "exported transcript");
        Ok(path)
    }
}
