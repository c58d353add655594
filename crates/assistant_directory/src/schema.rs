use serde::Deserialize;

pub const NAME_COLUMN: &str = "name";
pub const ASSISTANT_ID_COLUMN: &str = "assistant_id";

/// One selectable assistant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub name: String,
    pub assistant_id: String,
}

/// Raw CSV row; extra columns are ignored.
#[derive(Debug, Deserialize)]
pub(crate) struct DirectoryRow {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub assistant_id: Option<String>,
}

impl DirectoryRow {
    /// Trimmed entry, or the name of the first empty required column.
    pub fn into_entry(self) -> Result<DirectoryEntry, &'static str> {
        let name = non_empty(self.name).ok_or(NAME_COLUMN)?;
        let assistant_id = non_empty(self.assistant_id).ok_or(ASSISTANT_ID_COLUMN)?;
        Ok(DirectoryEntry { name, assistant_id })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
