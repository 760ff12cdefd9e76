use crate::domain::language::ResolveMessage;
use crate::domain::work_item::{
    ChildWorkItem, WorkItemKind, WorkItemRef, FEATURE_TYPE,
};
use crate::infrastructure::tracker::WorkItemTracker;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

static EDIT_LINK_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/_workitems/edit/(\d+)").unwrap());

static API_LINK_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"/workitems/(\d+)").unwrap());

/// A bare id, or the id inside a work-item edit link or REST link.
pub fn extract_story_id(input: &str) -> Option<u64> {
    let input = input.trim();
    if !input.is_empty() && input.chars().all(|c| c.is_ascii_digit()) {
        return input.parse().ok();
    }
    [&*EDIT_LINK_PATTERN, &*API_LINK_PATTERN]
        .iter()
        .find_map(|pattern| pattern.captures(input))
        .and_then(|captures| captures.get(1))
        .and_then(|id| id.as_str().parse().ok())
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Resolution {
    Epic {
        epic: WorkItemRef,
        features: Vec<ChildWorkItem>,
    },
    Feature {
        feature: WorkItemRef,
        backlog_items: Vec<ChildWorkItem>,
    },
    BacklogItem {
        story: WorkItemRef,
        feature: Option<WorkItemRef>,
    },
}

pub struct StoryResolutionUseCase {
    tracker: Arc<dyn WorkItemTracker + Send + Sync>,
    project: String,
    backlog_item_type: String,
}

impl StoryResolutionUseCase {
    pub fn new(
        tracker: Arc<dyn WorkItemTracker + Send + Sync>,
        project: String,
        backlog_item_type: String,
    ) -> Self {
        Self {
            tracker,
            project,
            backlog_item_type,
        }
    }

    pub async fn execute(&self, input: &str) -> std::result::Result<Resolution, ResolveMessage> {
        let id = extract_story_id(input).ok_or(ResolveMessage::InvalidInput)?;
        let project = self.project.as_str();

        let type_name = self.tracker.fetch_type(id, project).await;
        let kind = type_name.as_deref().map(WorkItemKind::from_type_name);
        debug!(work_item_id = id, kind = ?kind, "Resolved work item type");

        match kind {
            Some(WorkItemKind::Epic) => Ok(Resolution::Epic {
                epic: self.tracker.fetch(id, Some(project)).await,
                features: self
                    .tracker
                    .fetch_children(id, project, FEATURE_TYPE)
                    .await,
            }),
            Some(WorkItemKind::Feature) => Ok(Resolution::Feature {
                feature: self.tracker.fetch(id, Some(project)).await,
                backlog_items: self
                    .tracker
                    .fetch_children(id, project, &self.backlog_item_type)
                    .await,
            }),
            Some(WorkItemKind::BacklogItem) => {
                let story = self.tracker.fetch(id, Some(project)).await;
                if story.is_sentinel() {
                    info!(work_item_id = id, "Backlog item could not be read");
                    return Err(ResolveMessage::BacklogItemNotFound(id));
                }
                let feature = self.tracker.fetch_parent(id, project, FEATURE_TYPE).await;
                Ok(Resolution::BacklogItem { story, feature })
            }
            Some(WorkItemKind::Other(_)) | None => Err(ResolveMessage::UnrecognizedItem(id)),
        }
    }
}
