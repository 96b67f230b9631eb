use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use super::StateStore;
use crate::db::error::{ErrorContext, PersistenceError, PersistenceResult};

/// Snapshot kept in a single file.
///
/// Saves go to a sibling `.tmp` file which is then renamed over the target,
/// so a crash mid-write leaves the previous snapshot intact.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl StateStore for FileStateStore {
    fn load(&self) -> PersistenceResult<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PersistenceError::io(
                e,
                ErrorContext::new("load_state").with_path(&self.path),
            )),
        }
    }

    fn save(&self, snapshot: &str) -> PersistenceResult<()> {
        let tmp = self.temp_path();
        fs::write(&tmp, snapshot)
            .map_err(|e| PersistenceError::io(e, ErrorContext::new("save_state").with_path(&tmp)))?;
        fs::rename(&tmp, &self.path).map_err(|e| {
            PersistenceError::io(
                e,
                ErrorContext::new("save_state")
                    .with_path(&self.path)
                    .with_details("rename of temporary snapshot failed"),
            )
        })
    }

    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }
}
