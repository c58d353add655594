use std::fs::File;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Trim};
use tracing::{debug, warn};

use crate::error::DirectoryError;
use crate::schema::{DirectoryEntry, DirectoryRow, ASSISTANT_ID_COLUMN, NAME_COLUMN};

/// Rows read from a directory file plus the problems that were skipped over.
#[derive(Debug, Default)]
pub struct DirectoryReport {
    pub entries: Vec<DirectoryEntry>,
    pub warnings: Vec<DirectoryError>,
}

/// Name → assistant id mapping in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssistantDirectory {
    entries: Vec<DirectoryEntry>,
}

impl AssistantDirectory {
    /// Loads `path`, logging every problem instead of failing.
    ///
    /// A missing file or a header without the required columns yields an
    /// empty directory; malformed rows are skipped.
    #[must_use]
    pub fn load(path: &Path) -> Self {
        let entries = match read_directory(path) {
            Ok(report) => {
                for warning in &report.warnings {
                    warn!(%warning, "skipped assistant directory row");
                }
                report.entries
            }
            Err(error) => {
                warn!(%error, "failed to read assistant directory");
                Vec::new()
            }
        };

        if entries.is_empty() {
            warn!(path = %path.display(), "no assistants loaded");
        } else {
            debug!(count = entries.len(), path = %path.display(), "loaded assistant directory");
        }
        Self { entries }
    }

    #[must_use]
    pub fn from_entries(entries: Vec<DirectoryEntry>) -> Self {
        Self { entries }
    }

    #[must_use]
    pub fn entries(&self) -> &[DirectoryEntry] {
        &self.entries
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.name.as_str())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&DirectoryEntry> {
        self.entries.iter().find(|entry| entry.name == name)
    }

    #[must_use]
    pub fn assistant_id(&self, name: &str) -> Option<&str> {
        self.get(name).map(|entry| entry.assistant_id.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Strict read of a directory file.
///
/// File-level problems are errors; row-level problems land in
/// [`DirectoryReport::warnings`]. A repeated name replaces the earlier id
/// but keeps its position.
pub fn read_directory(path: &Path) -> Result<DirectoryReport, DirectoryError> {
    let file = File::open(path)
        .map_err(|source| DirectoryError::io("opening assistant directory", path, source))?;
    let mut reader = ReaderBuilder::new()
        .trim(Trim::Headers)
        .flexible(true)
        .from_reader(file);

    let headers = reader
        .headers()
        .map_err(|source| DirectoryError::csv(path, source))?
        .clone();
    for column in [NAME_COLUMN, ASSISTANT_ID_COLUMN] {
        if !headers.iter().any(|header| header == column) {
            return Err(DirectoryError::MissingColumn {
                path: path.to_path_buf(),
                column,
            });
        }
    }

    let mut report = DirectoryReport::default();
    let mut record = StringRecord::new();
    loop {
        match reader.read_record(&mut record) {
            Ok(true) => {}
            Ok(false) => break,
            Err(source) if source.is_io_error() => {
                return Err(DirectoryError::csv(path, source));
            }
            Err(source) => {
                report.warnings.push(DirectoryError::csv(path, source));
                continue;
            }
        }

        let line = record.position().map_or(0, csv::Position::line);
        let row: DirectoryRow = match record.deserialize(Some(&headers)) {
            Ok(row) => row,
            Err(source) => {
                report.warnings.push(DirectoryError::csv(path, source));
                continue;
            }
        };

        let entry = match row.into_entry() {
            Ok(entry) => entry,
            Err(column) => {
                report.warnings.push(DirectoryError::EmptyField {
                    path: path.to_path_buf(),
                    line,
                    column,
                });
                continue;
            }
        };

        match report
            .entries
            .iter_mut()
            .find(|existing| existing.name == entry.name)
        {
            Some(existing) => {
                report.warnings.push(DirectoryError::DuplicateName {
                    path: path.to_path_buf(),
                    line,
                    name: entry.name,
                });
                existing.assistant_id = entry.assistant_id;
            }
            None => report.entries.push(entry),
        }
    }

    Ok(report)
}
