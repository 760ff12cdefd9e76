use super::test_case_drafting::{DraftOutcome, TestCaseDraftingUseCase};
use crate::domain::error::{AppError, Result};
use crate::domain::llm_config::LLMConfig;
use crate::domain::test_case::{GenerationMode, HistoryEntry, TestCase};
use crate::infrastructure::storage::TestCaseStore;
use crate::infrastructure::tracker::{is_success, WorkItemTracker};
use chrono::Local;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub const STORY_UNAVAILABLE: &str =
    "Error fetching user story or missing description/acceptance.";

const HISTORY_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

#[derive(Debug, Clone, Serialize)]
pub struct GenerationReport {
    pub story_id: u64,
    pub test_cases: Vec<TestCase>,
    pub fallback_used: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
}

/// Drafts test cases for a story, creates and links them remotely, then
/// records the set locally and in the history.
pub struct GenerationUseCase {
    tracker: Arc<dyn WorkItemTracker + Send + Sync>,
    store: Arc<dyn TestCaseStore + Send + Sync>,
    drafting: TestCaseDraftingUseCase,
    llm_config: LLMConfig,
    pacing: Duration,
}

impl GenerationUseCase {
    pub fn new(
        tracker: Arc<dyn WorkItemTracker + Send + Sync>,
        store: Arc<dyn TestCaseStore + Send + Sync>,
        drafting: TestCaseDraftingUseCase,
        llm_config: LLMConfig,
        pacing: Duration,
    ) -> Self {
        Self {
            tracker,
            store,
            drafting,
            llm_config,
            pacing,
        }
    }

    pub async fn execute(&self, story_id: u64, mode: GenerationMode) -> Result<GenerationReport> {
        let story = self.tracker.fetch(story_id, None).await;
        if story.is_sentinel() {
            warn!(story_id, status = ?story.fetch_status, "Story unavailable for generation");
            return Err(AppError::TrackerError(STORY_UNAVAILABLE.to_string()));
        }

        let draft = if story.has_story_content() {
            Some(
                self.drafting
                    .execute(&self.llm_config, &story.description, &story.acceptance)
                    .await,
            )
        } else {
            warn!(story_id, "Description or acceptance criteria is empty");
            None
        };
        let fallback_reason = match &draft {
            Some(DraftOutcome::Fallback { reason, .. }) => Some(reason.clone()),
            _ => None,
        };
        let drafted = draft.map(DraftOutcome::into_test_cases).unwrap_or_default();

        let mut kept = Vec::with_capacity(drafted.len());
        for mut test_case in drafted {
            test_case.story_id = Some(story_id);
            test_case.steps = test_case
                .steps
                .with_default_expected(&test_case.expected_result);
            match self.publish(story_id, &test_case).await {
                Some(remote_id) => {
                    test_case.id = remote_id;
                    kept.push(test_case);
                    if !self.pacing.is_zero() {
                        tokio::time::sleep(self.pacing).await;
                    }
                }
                None if mode == GenerationMode::Generate => kept.push(test_case),
                None => {}
            }
        }

        self.store.save(&kept)?;
        self.append_history(story_id, &story.title, &kept, mode)?;
        info!(story_id, count = kept.len(), mode = ?mode, "Test cases recorded");

        Ok(GenerationReport {
            story_id,
            test_cases: kept,
            fallback_used: fallback_reason.is_some(),
            fallback_reason,
        })
    }

    /// Creates the remote test case, then sets its steps and links it.
    async fn publish(&self, story_id: u64, test_case: &TestCase) -> Option<u64> {
        let remote_id = self
            .tracker
            .create_test_case(story_id, &test_case.title, &test_case.expected_result)
            .await?;

        let steps_status = self
            .tracker
            .set_steps(remote_id, &test_case.steps, Some(&test_case.expected_result))
            .await;
        if !is_success(steps_status) {
            warn!(story_id, test_case_id = remote_id, status = steps_status, "Steps not saved");
        }

        let link_status = self.tracker.link(story_id, remote_id).await;
        if !is_success(link_status) {
            warn!(story_id, test_case_id = remote_id, status = link_status, "Test case not linked");
        }

        Some(remote_id)
    }

    fn append_history(
        &self,
        story_id: u64,
        story_title: &str,
        test_cases: &[TestCase],
        mode: GenerationMode,
    ) -> Result<()> {
        let mut history = self.store.load_history()?;
        history.push(HistoryEntry {
            story_id,
            story_title: story_title.to_string(),
            created_at: Local::now().format(HISTORY_TIMESTAMP_FORMAT).to_string(),
            test_cases: test_cases.iter().map(|test_case| mode.tag(test_case)).collect(),
        });
        self.store.save_history(&history)
    }
}
