//! Local file fallback used when no endpoint is configured.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset};

use crate::clock::file_stem;

/// A payload that could not be written.
#[derive(Debug, thiserror::Error)]
#[error("failed to write {}: {source}", path.display())]
pub struct WriteError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// Writes each batch to `<dir>/<YYYYMMDD_HHmmss>.json`.
#[derive(Debug, Clone)]
pub struct FileSink {
    dir: PathBuf,
}

impl FileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write a payload named after `at`.
    ///
    /// Existing files are never overwritten: a second batch in the same
    /// second goes to `<stem>_1.json`, then `<stem>_2.json`, and so on.
    pub fn write(&self, payload: &str, at: &DateTime<FixedOffset>) -> Result<PathBuf, WriteError> {
        fs::create_dir_all(&self.dir).map_err(|source| WriteError {
            path: self.dir.clone(),
            source,
        })?;

        let stem = file_stem(at);
        let mut attempt = 0u32;
        loop {
            let name = if attempt == 0 {
                format!("{}.json", stem)
            } else {
                format!("{}_{}.json", stem, attempt)
            };
            let path = self.dir.join(name);

            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    return match file.write_all(payload.as_bytes()).and_then(|_| file.flush()) {
                        Ok(()) => Ok(path),
                        Err(source) => Err(WriteError { path, source }),
                    };
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => attempt += 1,
                Err(source) => return Err(WriteError { path, source }),
            }
        }
    }
}
