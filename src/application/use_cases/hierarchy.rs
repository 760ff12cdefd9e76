use crate::domain::test_case::TestCase;
use crate::domain::work_item::{
    ChildWorkItem, ProjectRef, WorkItemRef, WorkItemSummary, EPIC_TYPE, FEATURE_TYPE,
};
use crate::infrastructure::tracker::WorkItemTracker;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BacklogItemWithTests {
    #[serde(flatten)]
    pub item: ChildWorkItem,
    pub test_cases: Vec<TestCase>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StoryDetails {
    #[serde(flatten)]
    pub story: WorkItemRef,
    pub test_cases: Vec<TestCase>,
}

/// Read-only browsing of project → epic → feature → backlog item.
pub struct HierarchyUseCase {
    tracker: Arc<dyn WorkItemTracker + Send + Sync>,
    backlog_item_type: String,
}

impl HierarchyUseCase {
    pub fn new(tracker: Arc<dyn WorkItemTracker + Send + Sync>, backlog_item_type: String) -> Self {
        Self {
            tracker,
            backlog_item_type,
        }
    }

    pub async fn projects(&self) -> Vec<ProjectRef> {
        self.tracker.list_projects().await
    }

    pub async fn epics(&self, project_id: &str) -> Vec<WorkItemSummary> {
        self.tracker.list_by_type(project_id, EPIC_TYPE).await
    }

    pub async fn features(&self, project_id: &str, epic_id: u64) -> Vec<ChildWorkItem> {
        self.tracker
            .fetch_children(epic_id, project_id, FEATURE_TYPE)
            .await
    }

    pub async fn backlog_items(&self, project_id: &str, feature_id: u64) -> Vec<BacklogItemWithTests> {
        let items = self
            .tracker
            .fetch_children(feature_id, project_id, &self.backlog_item_type)
            .await;

        let mut detailed = Vec::with_capacity(items.len());
        for item in items {
            let test_cases = self.linked_test_cases(item.id).await;
            detailed.push(BacklogItemWithTests { item, test_cases });
        }
        detailed
    }

    pub async fn story_details(&self, story_id: u64) -> StoryDetails {
        let story = self.tracker.fetch(story_id, None).await;
        let test_cases = self.linked_test_cases(story_id).await;
        StoryDetails { story, test_cases }
    }

    async fn linked_test_cases(&self, story_id: u64) -> Vec<TestCase> {
        self.tracker
            .fetch_linked_test_cases(story_id)
            .await
            .unwrap_or_default()
    }
}
