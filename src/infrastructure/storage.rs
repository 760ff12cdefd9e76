use crate::domain::error::{AppError, Result};
use crate::domain::test_case::{HistoryEntry, TestCase};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::error;

/// Persistence for the unpushed working set and the generation history.
pub trait TestCaseStore {
    fn load(&self) -> Result<Vec<TestCase>>;
    fn save(&self, test_cases: &[TestCase]) -> Result<()>;
    fn load_history(&self) -> Result<Vec<HistoryEntry>>;
    fn save_history(&self, history: &[HistoryEntry]) -> Result<()>;
}

/// Two JSON array files, rewritten in full on every save.
pub struct JsonFileStore {
    test_cases_path: PathBuf,
    history_path: PathBuf,
}

impl JsonFileStore {
    pub fn new(test_cases_path: impl Into<PathBuf>, history_path: impl Into<PathBuf>) -> Self {
        Self {
            test_cases_path: test_cases_path.into(),
            history_path: history_path.into(),
        }
    }
}

fn read_array<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let raw = fs::read_to_string(path)?;
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(&raw).map_err(|e| {
        error!(path = %path.display(), error = %e, "Stored JSON is corrupt");
        AppError::ParseError(format!("{}: {}", path.display(), e))
    })
}

fn render<T: Serialize>(items: &[T]) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    items.serialize(&mut serializer)?;
    Ok(buffer)
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path).map_err(|e| {
        AppError::StorageError(format!("Failed to replace {}: {}", path.display(), e))
    })
}

impl TestCaseStore for JsonFileStore {
    fn load(&self) -> Result<Vec<TestCase>> {
        read_array(&self.test_cases_path)
    }

    fn save(&self, test_cases: &[TestCase]) -> Result<()> {
        write_atomic(&self.test_cases_path, &render(test_cases)?)
    }

    fn load_history(&self) -> Result<Vec<HistoryEntry>> {
        read_array(&self.history_path)
    }

    fn save_history(&self, history: &[HistoryEntry]) -> Result<()> {
        write_atomic(&self.history_path, &render(history)?)
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    test_cases: Mutex<Vec<TestCase>>,
    history: Mutex<Vec<HistoryEntry>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> AppError {
    AppError::StorageError("In-memory store lock poisoned".to_string())
}

impl TestCaseStore for InMemoryStore {
    fn load(&self) -> Result<Vec<TestCase>> {
        Ok(self.test_cases.lock().map_err(poisoned)?.clone())
    }

    fn save(&self, test_cases: &[TestCase]) -> Result<()> {
        *self.test_cases.lock().map_err(poisoned)? = test_cases.to_vec();
        Ok(())
    }

    fn load_history(&self) -> Result<Vec<HistoryEntry>> {
        Ok(self.history.lock().map_err(poisoned)?.clone())
    }

    fn save_history(&self, history: &[HistoryEntry]) -> Result<()> {
        *self.history.lock().map_err(poisoned)? = history.to_vec();
        Ok(())
    }
}
