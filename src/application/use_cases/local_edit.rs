use crate::domain::error::{AppError, Result};
use crate::domain::test_case::{HistoryEntry, Steps, TestCase};
use crate::domain::work_item::deserialize_id;
use crate::infrastructure::storage::TestCaseStore;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct TestCaseUpdate {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: u64,
    #[validate(length(min = 1, max = 255, message = "title must be 1 to 255 characters"))]
    pub title: String,
    #[serde(default)]
    pub steps: Steps,
    #[serde(default)]
    pub expected_result: String,
}

/// Edits to the unpushed working set. Nothing here talks to the tracker.
pub struct LocalEditUseCase {
    store: Arc<dyn TestCaseStore + Send + Sync>,
}

impl LocalEditUseCase {
    pub fn new(store: Arc<dyn TestCaseStore + Send + Sync>) -> Self {
        Self { store }
    }

    pub fn list(&self) -> Result<Vec<TestCase>> {
        self.store.load()
    }

    pub fn history(&self) -> Result<Vec<HistoryEntry>> {
        self.store.load_history()
    }

    /// Returns whether an entry with the id existed.
    pub fn update(&self, update: TestCaseUpdate) -> Result<bool> {
        update
            .validate()
            .map_err(|e| AppError::ValidationError(e.to_string()))?;

        let mut test_cases = self.store.load()?;
        let found = match test_cases.iter_mut().find(|tc| tc.id == update.id) {
            Some(existing) => {
                existing.title = update.title;
                existing.steps = update.steps;
                existing.expected_result = update.expected_result;
                true
            }
            None => {
                debug!(test_case_id = update.id, "No local test case to update");
                false
            }
        };
        self.store.save(&test_cases)?;
        Ok(found)
    }

    pub fn delete(&self, id: u64) -> Result<bool> {
        let mut test_cases = self.store.load()?;
        let before = test_cases.len();
        test_cases.retain(|tc| tc.id != id);
        self.store.save(&test_cases)?;
        Ok(test_cases.len() != before)
    }

    pub fn delete_all(&self) -> Result<()> {
        self.store.save(&[])
    }
}
