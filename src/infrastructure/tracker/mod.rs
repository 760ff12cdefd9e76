pub mod azure_devops;
pub mod html;
pub mod steps_xml;

use crate::domain::test_case::{Steps, TestCase};
use crate::domain::work_item::{ChildWorkItem, ProjectRef, WorkItemRef, WorkItemSummary};
use async_trait::async_trait;

pub use azure_devops::AzureDevOpsClient;

/// Work-item tracking service. Failures never surface as errors: reads return
/// empty collections, `None`, or sentinel records, and writes return the final
/// HTTP status (0 when the request never reached the service).
#[async_trait]
pub trait WorkItemTracker {
    async fn fetch(&self, id: u64, project: Option<&str>) -> WorkItemRef;
    async fn fetch_type(&self, id: u64, project: &str) -> Option<String>;
    async fn fetch_children(
        &self,
        parent_id: u64,
        project: &str,
        child_type: &str,
    ) -> Vec<ChildWorkItem>;
    async fn fetch_parent(
        &self,
        id: u64,
        project: &str,
        expected_parent_type: &str,
    ) -> Option<WorkItemRef>;
    async fn create_test_case(&self, story_id: u64, title: &str, expected_result: &str)
        -> Option<u64>;
    async fn set_steps(&self, test_case_id: u64, steps: &Steps, expected_result: Option<&str>)
        -> u16;
    async fn link(&self, story_id: u64, test_case_id: u64) -> u16;
    async fn list_projects(&self) -> Vec<ProjectRef>;
    async fn list_by_type(&self, project_id: &str, work_item_type: &str) -> Vec<WorkItemSummary>;
    /// `None` when the story itself cannot be read.
    async fn fetch_linked_test_cases(&self, story_id: u64) -> Option<Vec<TestCase>>;
    async fn fetch_test_case(&self, test_case_id: u64) -> Option<TestCase>;
    async fn update_test_case(&self, test_case: &TestCase) -> u16;
}

pub fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}
