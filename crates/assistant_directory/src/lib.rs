mod directory;
mod error;
mod paths;
mod schema;

pub use directory::{read_directory, AssistantDirectory, DirectoryReport};
pub use error::DirectoryError;
pub use paths::{resolve_directory_path, DEFAULT_DIRECTORY_FILE};
pub use schema::{DirectoryEntry, ASSISTANT_ID_COLUMN, NAME_COLUMN};
