use serde::{Deserialize, Deserializer, Serialize};

pub const EPIC_TYPE: &str = "Epic";
pub const FEATURE_TYPE: &str = "Feature";
pub const PRODUCT_BACKLOG_ITEM_TYPE: &str = "Product Backlog Item";
pub const USER_STORY_TYPE: &str = "User Story";
pub const TEST_CASE_TYPE: &str = "Test Case";

pub const NO_PARENT: &str = "No Parent";

/// Work-item types the resolver knows how to display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkItemKind {
    Epic,
    Feature,
    BacklogItem,
    Other(String),
}

impl WorkItemKind {
    pub fn from_type_name(name: &str) -> Self {
        match name {
            EPIC_TYPE => WorkItemKind::Epic,
            FEATURE_TYPE => WorkItemKind::Feature,
            PRODUCT_BACKLOG_ITEM_TYPE | USER_STORY_TYPE => WorkItemKind::BacklogItem,
            other => WorkItemKind::Other(other.to_string()),
        }
    }
}

/// A story (or any work item) as shown to the user, with its direct parent.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct WorkItemRef {
    pub id: u64,
    pub title: String,
    pub description: String,
    pub acceptance: String,
    pub parent_title: String,
    pub parent_type: String,
    #[serde(skip)]
    pub fetch_status: Option<u16>,
}

impl WorkItemRef {
    /// Stand-in for a read that failed; `status` is 0 for transport errors.
    pub fn sentinel(id: u64, status: u16) -> Self {
        Self {
            id,
            title: "Error".to_string(),
            description: format!("Could not fetch user story. Status code: {}", status),
            acceptance: String::new(),
            parent_title: NO_PARENT.to_string(),
            parent_type: String::new(),
            fetch_status: Some(status),
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.fetch_status.is_some()
    }

    pub fn has_story_content(&self) -> bool {
        !self.description.trim().is_empty() && !self.acceptance.trim().is_empty()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ChildWorkItem {
    pub id: u64,
    pub title: String,
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct WorkItemSummary {
    pub id: u64,
    pub title: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ProjectRef {
    pub id: String,
    pub name: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(u64),
    Text(String),
}

/// Accepts a work-item id written either as a JSON number or a numeric string.
pub fn deserialize_id<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    match RawId::deserialize(deserializer)? {
        RawId::Number(value) => Ok(value),
        RawId::Text(value) => value
            .trim()
            .parse::<u64>()
            .map_err(|_| serde::de::Error::custom(format!("invalid work item id: {}", value))),
    }
}

pub fn deserialize_optional_id<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<RawId>::deserialize(deserializer)? {
        None => Ok(None),
        Some(RawId::Number(value)) => Ok(Some(value)),
        Some(RawId::Text(value)) if value.trim().is_empty() => Ok(None),
        Some(RawId::Text(value)) => value
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("invalid work item id: {}", value))),
    }
}
