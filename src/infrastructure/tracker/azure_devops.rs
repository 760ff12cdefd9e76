use super::html::html_to_text;
use super::{is_success, steps_xml, WorkItemTracker};
use crate::domain::error::{AppError, Result};
use crate::domain::test_case::{Steps, TestCase};
use crate::domain::work_item::{
    ChildWorkItem, ProjectRef, WorkItemRef, WorkItemSummary, NO_PARENT, TEST_CASE_TYPE,
};
use crate::infrastructure::config::TrackerConfig;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::{debug, error, warn};

const FIELD_TITLE: &str = "System.Title";
const FIELD_DESCRIPTION: &str = "System.Description";
const FIELD_ACCEPTANCE: &str = "Microsoft.VSTS.Common.AcceptanceCriteria";
const FIELD_TYPE: &str = "System.WorkItemType";
const FIELD_STATE: &str = "System.State";
const FIELD_PRIORITY: &str = "Microsoft.VSTS.Common.Priority";
const FIELD_TAGS: &str = "System.Tags";
const FIELD_STEPS: &str = "Microsoft.VSTS.TCM.Steps";

const REL_PARENT: &str = "System.LinkTypes.Hierarchy-Reverse";
const REL_CHILD: &str = "System.LinkTypes.Hierarchy-Forward";
const REL_TESTED_BY: &str = "Microsoft.VSTS.Common.TestedBy-Forward";

const JSON_PATCH_CONTENT_TYPE: &str = "application/json-patch+json";
const AUTO_CREATED_TAG: &str = "Auto Created";
const DEFAULT_PRIORITY: u8 = 2;

#[derive(Debug, Deserialize)]
struct WorkItemPayload {
    #[serde(default)]
    fields: Map<String, Value>,
    #[serde(default)]
    relations: Option<Vec<Relation>>,
}

impl WorkItemPayload {
    fn text(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }

    fn related_ids(&self, rel: &str) -> Vec<u64> {
        self.relations
            .iter()
            .flatten()
            .filter(|relation| relation.rel == rel)
            .filter_map(|relation| relation_target_id(&relation.url))
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct Relation {
    #[serde(default)]
    rel: String,
    #[serde(default)]
    url: String,
}

#[derive(Debug, Deserialize)]
struct ProjectList {
    #[serde(default)]
    value: Vec<ProjectRef>,
}

#[derive(Debug, Deserialize)]
struct WiqlResult {
    #[serde(default, rename = "workItems")]
    work_items: Vec<WiqlHit>,
}

#[derive(Debug, Deserialize)]
struct WiqlHit {
    id: Option<u64>,
}

#[derive(Debug, Serialize)]
struct PatchOperation {
    op: &'static str,
    path: String,
    value: Value,
}

impl PatchOperation {
    fn add(path: impl Into<String>, value: Value) -> Self {
        Self {
            op: "add",
            path: path.into(),
            value,
        }
    }

    fn add_field(field: &str, value: Value) -> Self {
        Self::add(format!("/fields/{}", field), value)
    }

    fn into_replace(self) -> Self {
        Self {
            op: "replace",
            ..self
        }
    }
}

struct Failure {
    status: u16,
    body: String,
}

impl Failure {
    fn transport(err: reqwest::Error) -> Self {
        Self {
            status: err.status().map(|status| status.as_u16()).unwrap_or(0),
            body: err.to_string(),
        }
    }
}

fn relation_target_id(relation_url: &str) -> Option<u64> {
    let last_segment = match url::Url::parse(relation_url) {
        Ok(parsed) => parsed
            .path_segments()
            .and_then(|segments| segments.last())
            .map(str::to_string),
        Err(_) => relation_url.rsplit('/').next().map(str::to_string),
    };
    last_segment.and_then(|segment| segment.parse().ok())
}

fn test_case_from(id: u64, payload: &WorkItemPayload, story_id: Option<u64>) -> TestCase {
    TestCase {
        id,
        title: payload.text(FIELD_TITLE).unwrap_or_default().to_string(),
        steps: Steps::Structured(steps_xml::decode(
            payload.text(FIELD_STEPS).unwrap_or_default(),
        )),
        expected_result: payload.text(FIELD_DESCRIPTION).unwrap_or_default().to_string(),
        story_id,
        generated: None,
        regenerated: None,
    }
}

/// REST client for an Azure DevOps organisation, authenticated with a PAT.
pub struct AzureDevOpsClient {
    client: reqwest::Client,
    org_url: String,
    project: String,
    pat: String,
    api_version: String,
}

impl AzureDevOpsClient {
    pub fn new(config: &TrackerConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs.max(1)))
            .build()
            .map_err(|e| AppError::TrackerError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            org_url: config.org_url.trim_end_matches('/').to_string(),
            project: config.project.trim().to_string(),
            pat: config.pat.clone(),
            api_version: config.api_version.clone(),
        })
    }

    fn own_project(&self) -> Option<&str> {
        Some(self.project.as_str())
    }

    fn scope(&self, project: Option<&str>) -> String {
        match project.map(str::trim).filter(|value| !value.is_empty()) {
            Some(project) => format!("{}/{}", self.org_url, project),
            None => self.org_url.clone(),
        }
    }

    fn work_item_url(&self, project: Option<&str>, id: u64, expand_relations: bool) -> String {
        let expand = if expand_relations {
            "$expand=relations&"
        } else {
            ""
        };
        format!(
            "{}/_apis/wit/workitems/{}?{}api-version={}",
            self.scope(project),
            id,
            expand,
            self.api_version
        )
    }

    async fn read(
        &self,
        project: Option<&str>,
        id: u64,
        expand_relations: bool,
    ) -> std::result::Result<WorkItemPayload, Failure> {
        let url = self.work_item_url(project, id, expand_relations);
        let response = self
            .client
            .get(&url)
            .basic_auth("", Some(&self.pat))
            .send()
            .await
            .map_err(Failure::transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Failure {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<WorkItemPayload>()
            .await
            .map_err(|e| Failure {
                status: status.as_u16(),
                body: format!("Failed to parse JSON: {}", e),
            })
    }

    async fn patch(&self, url: &str, operations: &[PatchOperation]) -> (u16, String) {
        let body = match serde_json::to_vec(operations) {
            Ok(body) => body,
            Err(e) => return (0, format!("Failed to serialize patch: {}", e)),
        };

        match self
            .client
            .patch(url)
            .basic_auth("", Some(&self.pat))
            .header(CONTENT_TYPE, JSON_PATCH_CONTENT_TYPE)
            .body(body)
            .send()
            .await
        {
            Ok(response) => {
                let status = response.status().as_u16();
                let text = response.text().await.unwrap_or_default();
                (status, text)
            }
            Err(e) => (0, e.to_string()),
        }
    }

    async fn patch_with_replace_retry(
        &self,
        url: &str,
        operations: Vec<PatchOperation>,
        action: &str,
    ) -> u16 {
        let (mut status, mut body) = self.patch(url, &operations).await;
        if status == 400 && body.contains("already exists") {
            debug!(action, "Field already exists, retrying patch as replace");
            let replaced: Vec<PatchOperation> = operations
                .into_iter()
                .map(PatchOperation::into_replace)
                .collect();
            (status, body) = self.patch(url, &replaced).await;
        }
        if !is_success(status) {
            warn!(status, body = %body, action, "Tracker patch failed");
        }
        status
    }
}

#[async_trait]
impl WorkItemTracker for AzureDevOpsClient {
    async fn fetch(&self, id: u64, project: Option<&str>) -> WorkItemRef {
        let payload = match self.read(project, id, true).await {
            Ok(payload) => payload,
            Err(failure) => {
                warn!(
                    work_item_id = id,
                    status = failure.status,
                    body = %failure.body,
                    "Failed to fetch work item"
                );
                return WorkItemRef::sentinel(id, failure.status);
            }
        };

        let mut item = WorkItemRef {
            id,
            title: payload.text(FIELD_TITLE).unwrap_or("No Title").to_string(),
            description: html_to_text(payload.text(FIELD_DESCRIPTION).unwrap_or_default()),
            acceptance: html_to_text(payload.text(FIELD_ACCEPTANCE).unwrap_or_default()),
            parent_title: NO_PARENT.to_string(),
            parent_type: String::new(),
            fetch_status: None,
        };

        if let Some(parent_id) = payload.related_ids(REL_PARENT).first().copied() {
            match self.read(project, parent_id, false).await {
                Ok(parent) => {
                    item.parent_title = parent
                        .text(FIELD_TITLE)
                        .unwrap_or("Unknown Title")
                        .to_string();
                    item.parent_type = parent
                        .text(FIELD_TYPE)
                        .unwrap_or("Unknown Type")
                        .to_string();
                }
                Err(failure) => debug!(
                    work_item_id = id,
                    parent_id,
                    status = failure.status,
                    "Parent work item unreadable"
                ),
            }
        }

        item
    }

    async fn fetch_type(&self, id: u64, project: &str) -> Option<String> {
        match self.read(Some(project), id, false).await {
            Ok(payload) => Some(payload.text(FIELD_TYPE).unwrap_or_default().to_string()),
            Err(failure) => {
                warn!(
                    work_item_id = id,
                    status = failure.status,
                    "Failed to fetch work item type"
                );
                None
            }
        }
    }

    async fn fetch_children(
        &self,
        parent_id: u64,
        project: &str,
        child_type: &str,
    ) -> Vec<ChildWorkItem> {
        let parent = match self.read(Some(project), parent_id, true).await {
            Ok(payload) => payload,
            Err(failure) => {
                error!(
                    parent_id,
                    status = failure.status,
                    body = %failure.body,
                    "Error fetching child work items"
                );
                return Vec::new();
            }
        };

        let mut children = Vec::new();
        for child_id in parent.related_ids(REL_CHILD) {
            match self.read(Some(project), child_id, false).await {
                Ok(child) => {
                    if child.text(FIELD_TYPE) != Some(child_type) {
                        continue;
                    }
                    children.push(ChildWorkItem {
                        id: child_id,
                        title: child.text(FIELD_TITLE).unwrap_or("Unknown Title").to_string(),
                        status: child.text(FIELD_STATE).unwrap_or("Unknown Status").to_string(),
                    });
                }
                Err(failure) => warn!(
                    parent_id,
                    child_id,
                    status = failure.status,
                    body = %failure.body,
                    "Error fetching child item details"
                ),
            }
        }
        children
    }

    async fn fetch_parent(
        &self,
        id: u64,
        project: &str,
        expected_parent_type: &str,
    ) -> Option<WorkItemRef> {
        let item = match self.read(Some(project), id, true).await {
            Ok(payload) => payload,
            Err(failure) => {
                warn!(work_item_id = id, status = failure.status, "Failed to fetch work item");
                return None;
            }
        };

        for parent_id in item.related_ids(REL_PARENT) {
            let parent_type = self.fetch_type(parent_id, project).await;
            if parent_type.as_deref() == Some(expected_parent_type) {
                return Some(self.fetch(parent_id, Some(project)).await);
            }
        }
        None
    }

    async fn create_test_case(
        &self,
        story_id: u64,
        title: &str,
        expected_result: &str,
    ) -> Option<u64> {
        let url = format!(
            "{}/_apis/wit/workitems/${}?api-version={}",
            self.scope(self.own_project()),
            TEST_CASE_TYPE.replace(' ', "%20"),
            self.api_version
        );
        let operations = vec![
            PatchOperation::add_field(FIELD_TITLE, json!(title)),
            PatchOperation::add_field(FIELD_DESCRIPTION, json!(expected_result)),
            PatchOperation::add_field(FIELD_PRIORITY, json!(DEFAULT_PRIORITY)),
            PatchOperation::add_field(FIELD_TAGS, json!(AUTO_CREATED_TAG)),
        ];

        let (status, body) = self.patch(&url, &operations).await;
        if !is_success(status) {
            error!(story_id, status, body = %body, "Error creating test case");
            return None;
        }

        let created = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|value| value.get("id").and_then(Value::as_u64));
        if created.is_none() {
            warn!(story_id, body = %body, "Created test case response carried no id");
        }
        created
    }

    async fn set_steps(
        &self,
        test_case_id: u64,
        steps: &Steps,
        expected_result: Option<&str>,
    ) -> u16 {
        let url = self.work_item_url(self.own_project(), test_case_id, false);
        let operations = vec![PatchOperation::add_field(
            FIELD_STEPS,
            Value::String(steps_xml::encode(steps, expected_result)),
        )];
        self.patch_with_replace_retry(&url, operations, "update test steps")
            .await
    }

    async fn link(&self, story_id: u64, test_case_id: u64) -> u16 {
        let url = self.work_item_url(self.own_project(), story_id, false);
        let operations = vec![PatchOperation::add(
            "/relations/-",
            json!({
                "rel": REL_TESTED_BY,
                "url": format!("{}/_apis/wit/workitems/{}", self.org_url, test_case_id),
            }),
        )];

        let (status, body) = self.patch(&url, &operations).await;
        if !is_success(status) {
            error!(
                story_id,
                test_case_id,
                status,
                body = %body,
                "Error linking test case to user story"
            );
        }
        status
    }

    async fn list_projects(&self) -> Vec<ProjectRef> {
        let url = format!("{}/_apis/projects?api-version={}", self.org_url, self.api_version);
        let response = match self
            .client
            .get(&url)
            .basic_auth("", Some(&self.pat))
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                error!(error = %e, "Failed to reach tracker while listing projects");
                return Vec::new();
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), body = %body, "Error fetching projects");
            return Vec::new();
        }

        match response.json::<ProjectList>().await {
            Ok(list) => list.value,
            Err(e) => {
                error!(error = %e, "Failed to parse project list");
                Vec::new()
            }
        }
    }

    async fn list_by_type(&self, project_id: &str, work_item_type: &str) -> Vec<WorkItemSummary> {
        let url = format!(
            "{}/_apis/wit/wiql?api-version={}",
            self.scope(Some(project_id)),
            self.api_version
        );
        let query = format!(
            "SELECT [System.Id] FROM WorkItems WHERE [System.WorkItemType] = '{}'",
            work_item_type.replace('\'', "''")
        );
        debug!(query = %query, "Running WIQL query");

        let response = match self
            .client
            .post(&url)
            .basic_auth("", Some(&self.pat))
            .json(&json!({ "query": query }))
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                error!(error = %e, project_id, "Failed to run WIQL query");
                return Vec::new();
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), body = %body, "Error fetching work items");
            return Vec::new();
        }

        let hits = match response.json::<WiqlResult>().await {
            Ok(result) => result.work_items,
            Err(e) => {
                error!(error = %e, "Failed to parse WIQL result");
                return Vec::new();
            }
        };

        let mut items = Vec::new();
        for id in hits.into_iter().filter_map(|hit| hit.id) {
            let title = match self.read(Some(project_id), id, false).await {
                Ok(payload) => payload.text(FIELD_TITLE).unwrap_or("Unknown Title").to_string(),
                Err(failure) => {
                    warn!(
                        work_item_id = id,
                        status = failure.status,
                        body = %failure.body,
                        "Error fetching item details"
                    );
                    "Unknown Title".to_string()
                }
            };
            items.push(WorkItemSummary { id, title });
        }
        items
    }

    async fn fetch_linked_test_cases(&self, story_id: u64) -> Option<Vec<TestCase>> {
        let story = match self.read(self.own_project(), story_id, true).await {
            Ok(payload) => payload,
            Err(failure) => {
                error!(
                    story_id,
                    status = failure.status,
                    body = %failure.body,
                    "Failed to fetch story relations"
                );
                return None;
            }
        };

        let mut test_cases = Vec::new();
        for test_case_id in story.related_ids(REL_TESTED_BY) {
            match self.read(self.own_project(), test_case_id, false).await {
                Ok(payload) => test_cases.push(test_case_from(test_case_id, &payload, Some(story_id))),
                Err(failure) => warn!(
                    story_id,
                    test_case_id,
                    status = failure.status,
                    "Linked test case unreadable"
                ),
            }
        }
        Some(test_cases)
    }

    async fn fetch_test_case(&self, test_case_id: u64) -> Option<TestCase> {
        match self.read(self.own_project(), test_case_id, false).await {
            Ok(payload) => Some(test_case_from(test_case_id, &payload, None)),
            Err(failure) => {
                warn!(
                    test_case_id,
                    status = failure.status,
                    "Failed to fetch test case"
                );
                None
            }
        }
    }

    async fn update_test_case(&self, test_case: &TestCase) -> u16 {
        let url = self.work_item_url(self.own_project(), test_case.id, false);
        let operations = vec![
            PatchOperation::add_field(FIELD_TITLE, json!(test_case.title)),
            PatchOperation::add_field(FIELD_DESCRIPTION, json!(test_case.expected_result)),
            PatchOperation::add_field(
                FIELD_STEPS,
                Value::String(steps_xml::encode(
                    &test_case.steps,
                    Some(&test_case.expected_result),
                )),
            ),
        ];
        self.patch_with_replace_retry(&url, operations, "update test case")
            .await
    }
}
