//! Saved library items, one pretty-printed JSON file per id.

use std::fs;
use std::io;
use std::path::PathBuf;

use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::common::error_codes::{self, ErrorCategory};

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("Item not found")]
    NotFound(String),
    #[error("Invalid library item id: {0:?}")]
    InvalidId(String),
    #[error("Library item must be a JSON object with a string \"id\"")]
    MissingId,
    #[error("Library {operation} failed: {source}")]
    Io {
        operation: &'static str,
        #[source]
        source: io::Error,
    },
    #[error("Library item is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl LibraryError {
    pub fn code(&self) -> i32 {
        match self {
            LibraryError::InvalidId(_) | LibraryError::MissingId => error_codes::INVALID_PARAMS,
            _ => error_codes::LIBRARY_ERROR,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            LibraryError::NotFound(_) => ErrorCategory::NotFound,
            _ => error_codes::category_for_code(self.code()),
        }
    }
}

pub struct LibraryStore {
    dir: PathBuf,
}

impl LibraryStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Writes `item` as `<id>.json` and returns the id.
    pub fn save(&self, item: &Value) -> Result<String, LibraryError> {
        let id = item
            .get("id")
            .and_then(Value::as_str)
            .ok_or(LibraryError::MissingId)?
            .to_string();
        let path = self.item_path(&id)?;
        fs::create_dir_all(&self.dir).map_err(|source| LibraryError::Io {
            operation: "create directory",
            source,
        })?;
        let body = serde_json::to_string_pretty(item)?;
        fs::write(&path, body).map_err(|source| LibraryError::Io {
            operation: "write",
            source,
        })?;
        Ok(id)
    }

    /// All readable items ordered by id; broken files are skipped.
    pub fn load_all(&self) -> Result<Vec<Value>, LibraryError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(LibraryError::Io {
                    operation: "read directory",
                    source,
                });
            }
        };

        let mut paths: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();

        let items = paths
            .into_iter()
            .filter_map(|path| {
                let parsed = fs::read_to_string(&path)
                    .map_err(LibraryError::from_read)
                    .and_then(|text| serde_json::from_str::<Value>(&text).map_err(Into::into));
                match parsed {
                    Ok(item) => Some(item),
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "Skipping unreadable library item");
                        None
                    }
                }
            })
            .collect();
        Ok(items)
    }

    pub fn load(&self, id: &str) -> Result<Value, LibraryError> {
        let path = self.item_path(id)?;
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(LibraryError::NotFound(id.to_string()));
            }
            Err(e) => return Err(LibraryError::from_read(e)),
        };
        Ok(serde_json::from_str(&text)?)
    }

    pub fn delete(&self, id: &str) -> Result<(), LibraryError> {
        let path = self.item_path(id)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(LibraryError::NotFound(id.to_string()))
            }
            Err(source) => Err(LibraryError::Io {
                operation: "delete",
                source,
            }),
        }
    }

    /// Ids become file names, so anything that could escape the directory
    /// is refused.
    fn item_path(&self, id: &str) -> Result<PathBuf, LibraryError> {
        let valid = !id.trim().is_empty()
            && id != "."
            && id != ".."
            && !id.contains(['/', '\\', '\0']);
        if !valid {
            return Err(LibraryError::InvalidId(id.to_string()));
        }
        Ok(self.dir.join(format!("{id}.json")))
    }
}

impl LibraryError {
    fn from_read(source: io::Error) -> Self {
        LibraryError::Io {
            operation: "read",
            source,
        }
    }
}
