//! In-process fakes for the tracker and the model, shared by use-case tests.

use crate::domain::error::{AppError, Result};
use crate::domain::llm_config::LLMConfig;
use crate::domain::test_case::{Steps, TestCase};
use crate::domain::work_item::{
    ChildWorkItem, ProjectRef, WorkItemRef, WorkItemSummary, NO_PARENT,
};
use crate::infrastructure::llm_clients::LLMClient;
use crate::infrastructure::tracker::{steps_xml, WorkItemTracker};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

pub const FIRST_REMOTE_ID: u64 = 5000;

pub fn story(id: u64, title: &str) -> WorkItemRef {
    WorkItemRef {
        id,
        title: title.to_string(),
        description: format!("As a shopper I want {}", title.to_lowercase()),
        acceptance: format!("Given {} Then it succeeds", title.to_lowercase()),
        parent_title: NO_PARENT.to_string(),
        parent_type: String::new(),
        fetch_status: None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerCall {
    Create { story_id: u64, title: String },
    SetSteps(u64),
    Link { story_id: u64, test_case_id: u64 },
    Update(u64),
}

#[derive(Default)]
pub struct FakeTracker {
    items: HashMap<u64, (String, Option<WorkItemRef>)>,
    children: HashMap<u64, Vec<u64>>,
    parents: HashMap<u64, Vec<u64>>,
    projects: Vec<ProjectRef>,
    rejected_titles: HashSet<String>,
    linked: Mutex<HashMap<u64, Vec<u64>>>,
    remote_cases: Mutex<HashMap<u64, TestCase>>,
    created: AtomicU64,
    pub calls: Mutex<Vec<TrackerCall>>,
}

impl FakeTracker {
    pub fn with_item(mut self, item: WorkItemRef, type_name: &str) -> Self {
        self.items.insert(item.id, (type_name.to_string(), Some(item)));
        self
    }

    /// Known type, but reading the item itself fails.
    pub fn with_type_only(mut self, id: u64, type_name: &str) -> Self {
        self.items.insert(id, (type_name.to_string(), None));
        self
    }

    pub fn with_child(mut self, parent_id: u64, child_id: u64) -> Self {
        self.children.entry(parent_id).or_default().push(child_id);
        self.parents.entry(child_id).or_default().push(parent_id);
        self
    }

    pub fn with_project(mut self, id: &str, name: &str) -> Self {
        self.projects.push(ProjectRef {
            id: id.to_string(),
            name: name.to_string(),
        });
        self
    }

    pub fn with_linked_case(self, story_id: u64, test_case: TestCase) -> Self {
        self.linked
            .lock()
            .unwrap()
            .entry(story_id)
            .or_default()
            .push(test_case.id);
        self.remote_cases
            .lock()
            .unwrap()
            .insert(test_case.id, TestCase { story_id: None, ..test_case });
        self
    }

    pub fn rejecting(mut self, title: &str) -> Self {
        self.rejected_titles.insert(title.to_string());
        self
    }

    pub fn calls(&self) -> Vec<TrackerCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn remote_case(&self, id: u64) -> Option<TestCase> {
        self.remote_cases.lock().unwrap().get(&id).cloned()
    }

    fn record(&self, call: TrackerCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn type_of(&self, id: u64) -> Option<&str> {
        self.items.get(&id).map(|(type_name, _)| type_name.as_str())
    }

    fn title_of(&self, id: u64) -> String {
        self.items
            .get(&id)
            .and_then(|(_, item)| item.as_ref())
            .map(|item| item.title.clone())
            .unwrap_or_else(|| "Unknown Title".to_string())
    }
}

#[async_trait]
impl WorkItemTracker for FakeTracker {
    async fn fetch(&self, id: u64, _project: Option<&str>) -> WorkItemRef {
        self.items
            .get(&id)
            .and_then(|(_, item)| item.clone())
            .unwrap_or_else(|| WorkItemRef::sentinel(id, 404))
    }

    async fn fetch_type(&self, id: u64, _project: &str) -> Option<String> {
        self.type_of(id).map(str::to_string)
    }

    async fn fetch_children(
        &self,
        parent_id: u64,
        _project: &str,
        child_type: &str,
    ) -> Vec<ChildWorkItem> {
        self.children
            .get(&parent_id)
            .into_iter()
            .flatten()
            .filter(|child_id| self.type_of(**child_id) == Some(child_type))
            .map(|child_id| ChildWorkItem {
                id: *child_id,
                title: self.title_of(*child_id),
                status: "Active".to_string(),
            })
            .collect()
    }

    async fn fetch_parent(
        &self,
        id: u64,
        project: &str,
        expected_parent_type: &str,
    ) -> Option<WorkItemRef> {
        let parent_id = self
            .parents
            .get(&id)
            .into_iter()
            .flatten()
            .copied()
            .find(|parent_id| self.type_of(*parent_id) == Some(expected_parent_type))?;
        Some(self.fetch(parent_id, Some(project)).await)
    }

    async fn create_test_case(
        &self,
        story_id: u64,
        title: &str,
        expected_result: &str,
    ) -> Option<u64> {
        self.record(TrackerCall::Create {
            story_id,
            title: title.to_string(),
        });
        if self.rejected_titles.contains(title) {
            return None;
        }
        let id = FIRST_REMOTE_ID + self.created.fetch_add(1, Ordering::SeqCst);
        self.remote_cases.lock().unwrap().insert(
            id,
            TestCase {
                id,
                title: title.to_string(),
                steps: Steps::default(),
                expected_result: expected_result.to_string(),
                story_id: None,
                generated: None,
                regenerated: None,
            },
        );
        Some(id)
    }

    async fn set_steps(
        &self,
        test_case_id: u64,
        steps: &Steps,
        expected_result: Option<&str>,
    ) -> u16 {
        self.record(TrackerCall::SetSteps(test_case_id));
        let decoded = steps_xml::decode(&steps_xml::encode(steps, expected_result));
        match self.remote_cases.lock().unwrap().get_mut(&test_case_id) {
            Some(remote) => {
                remote.steps = Steps::Structured(decoded);
                200
            }
            None => 404,
        }
    }

    async fn link(&self, story_id: u64, test_case_id: u64) -> u16 {
        self.record(TrackerCall::Link {
            story_id,
            test_case_id,
        });
        self.linked
            .lock()
            .unwrap()
            .entry(story_id)
            .or_default()
            .push(test_case_id);
        200
    }

    async fn list_projects(&self) -> Vec<ProjectRef> {
        self.projects.clone()
    }

    async fn list_by_type(&self, _project_id: &str, work_item_type: &str) -> Vec<WorkItemSummary> {
        let mut items: Vec<WorkItemSummary> = self
            .items
            .iter()
            .filter(|(_, (type_name, _))| type_name == work_item_type)
            .map(|(id, _)| WorkItemSummary {
                id: *id,
                title: self.title_of(*id),
            })
            .collect();
        items.sort_by_key(|item| item.id);
        items
    }

    async fn fetch_linked_test_cases(&self, story_id: u64) -> Option<Vec<TestCase>> {
        if !matches!(self.items.get(&story_id), Some((_, Some(_)))) {
            return None;
        }
        let ids = self
            .linked
            .lock()
            .unwrap()
            .get(&story_id)
            .cloned()
            .unwrap_or_default();
        let remote = self.remote_cases.lock().unwrap();
        Some(
            ids.iter()
                .filter_map(|id| remote.get(id).cloned())
                .map(|test_case| TestCase {
                    story_id: Some(story_id),
                    ..test_case
                })
                .collect(),
        )
    }

    async fn fetch_test_case(&self, test_case_id: u64) -> Option<TestCase> {
        self.remote_case(test_case_id)
    }

    async fn update_test_case(&self, test_case: &TestCase) -> u16 {
        self.record(TrackerCall::Update(test_case.id));
        let mut remote = self.remote_cases.lock().unwrap();
        match remote.get_mut(&test_case.id) {
            Some(existing) => {
                existing.title = test_case.title.clone();
                existing.expected_result = test_case.expected_result.clone();
                existing.steps = Steps::Structured(steps_xml::decode(&steps_xml::encode(
                    &test_case.steps,
                    Some(&test_case.expected_result),
                )));
                200
            }
            None => 404,
        }
    }
}

/// Model double that answers every prompt with the same reply.
pub struct FakeLlm {
    reply: Option<String>,
    pub calls: AtomicUsize,
}

impl FakeLlm {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            reply: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LLMClient for FakeLlm {
    async fn generate(&self, _config: &LLMConfig, _system: &str, _user: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply
            .clone()
            .ok_or_else(|| AppError::LLMError("Request failed: connection refused".to_string()))
    }
}
