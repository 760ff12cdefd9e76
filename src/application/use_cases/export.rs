use crate::domain::error::Result;
use crate::infrastructure::export::test_cases_workbook;
use crate::infrastructure::storage::TestCaseStore;
use std::sync::Arc;

pub struct ExportUseCase {
    store: Arc<dyn TestCaseStore + Send + Sync>,
}

impl ExportUseCase {
    pub fn new(store: Arc<dyn TestCaseStore + Send + Sync>) -> Self {
        Self { store }
    }

    /// Workbook bytes for the working set, or `None` when it is empty.
    pub fn execute(&self) -> Result<Option<Vec<u8>>> {
        let test_cases = self.store.load()?;
        if test_cases.is_empty() {
            return Ok(None);
        }
        test_cases_workbook(&test_cases).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::test_case::{Steps, TestCase};
    use crate::infrastructure::storage::InMemoryStore;

    #[test]
    fn test_empty_store_has_nothing_to_export() {
        let use_case = ExportUseCase::new(Arc::new(InMemoryStore::new()));
        assert!(use_case.execute().unwrap().is_none());
    }

    #[test]
    fn test_non_empty_store_yields_xlsx_bytes() {
        let store = Arc::new(InMemoryStore::new());
        store
            .save(&[TestCase {
                id: 1,
                title: "Checkout".to_string(),
                steps: Steps::default(),
                expected_result: String::new(),
                story_id: Some(9),
                generated: Some(true),
                regenerated: None,
            }])
            .unwrap();

        let bytes = ExportUseCase::new(store).execute().unwrap().unwrap();
        assert!(bytes.starts_with(b"PK"));
    }
}
