use crate::domain::error::{AppError, Result};
use crate::domain::test_case::{Steps, TestCase, TestStep};
use crate::infrastructure::storage::TestCaseStore;
use crate::infrastructure::tracker::{is_success, steps_xml, WorkItemTracker};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

pub const NO_CHANGES: &str = "No changes to push.";
pub const NOTHING_UPDATED: &str = "No test cases were updated.";
pub const PULL_FAILED: &str = "Failed to fetch test cases from Azure.";

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct PushReport {
    pub updated: Vec<u64>,
    pub unchanged: Vec<u64>,
    /// Local cases whose remote copy could not be read.
    pub missing: Vec<u64>,
    pub failed: Vec<u64>,
}

impl PushReport {
    pub fn succeeded(&self) -> bool {
        !self.updated.is_empty()
    }

    /// User-facing reason when nothing was pushed.
    pub fn message(&self) -> Option<&'static str> {
        if self.succeeded() {
            None
        } else if !self.unchanged.is_empty() {
            Some(NO_CHANGES)
        } else {
            Some(NOTHING_UPDATED)
        }
    }
}

fn comparable_steps(steps: &Steps) -> Vec<TestStep> {
    match steps {
        Steps::Structured(items) => items.clone(),
        Steps::Raw(xml) => steps_xml::decode(xml),
    }
}

/// Order-sensitive comparison of the fields a push would overwrite. Local
/// steps are compared as they would be written.
pub fn same_content(local: &TestCase, remote: &TestCase) -> bool {
    let written = local.steps.with_default_expected(&local.expected_result);
    local.title == remote.title
        && local.expected_result == remote.expected_result
        && comparable_steps(&written) == comparable_steps(&remote.steps)
}

/// Moves test cases between the local working set and the tracker.
pub struct SyncUseCase {
    tracker: Arc<dyn WorkItemTracker + Send + Sync>,
    store: Arc<dyn TestCaseStore + Send + Sync>,
}

impl SyncUseCase {
    pub fn new(
        tracker: Arc<dyn WorkItemTracker + Send + Sync>,
        store: Arc<dyn TestCaseStore + Send + Sync>,
    ) -> Self {
        Self { tracker, store }
    }

    pub async fn push(&self, story_id: u64) -> Result<PushReport> {
        let local = self.store.load()?;
        let mut report = PushReport::default();

        for test_case in local
            .iter()
            .filter(|tc| tc.belongs_to(story_id) && tc.id != 0)
        {
            let Some(remote) = self.tracker.fetch_test_case(test_case.id).await else {
                warn!(story_id, test_case_id = test_case.id, "Remote test case missing, skipped");
                report.missing.push(test_case.id);
                continue;
            };
            if same_content(test_case, &remote) {
                report.unchanged.push(test_case.id);
                continue;
            }

            let status = self.tracker.update_test_case(test_case).await;
            if is_success(status) {
                report.updated.push(test_case.id);
            } else {
                report.failed.push(test_case.id);
            }
        }

        info!(
            story_id,
            updated = report.updated.len(),
            unchanged = report.unchanged.len(),
            missing = report.missing.len(),
            failed = report.failed.len(),
            "Push finished"
        );
        Ok(report)
    }

    /// Replaces the local working set with the cases linked to the story.
    pub async fn pull(&self, story_id: u64) -> Result<Vec<TestCase>> {
        let test_cases = self
            .tracker
            .fetch_linked_test_cases(story_id)
            .await
            .ok_or_else(|| AppError::TrackerError(PULL_FAILED.to_string()))?;
        self.store.save(&test_cases)?;
        info!(story_id, count = test_cases.len(), "Pulled linked test cases");
        Ok(test_cases)
    }
}
