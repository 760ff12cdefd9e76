use serde::{Deserialize, Serialize};

use crate::domain::work_item::{deserialize_id, deserialize_optional_id};

pub const NO_EXPECTED_RESULT: &str = "No expected result provided";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct TestStep {
    pub step: String,
    #[serde(default)]
    pub expected: String,
}

impl TestStep {
    pub fn new(step: impl Into<String>, expected: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            expected: expected.into(),
        }
    }
}

/// Step data is either a structured list or an opaque string that is passed
/// through to the tracker untouched.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum Steps {
    Structured(Vec<TestStep>),
    Raw(String),
}

impl Default for Steps {
    fn default() -> Self {
        Steps::Structured(Vec::new())
    }
}

impl Steps {
    pub fn is_empty(&self) -> bool {
        match self {
            Steps::Structured(steps) => steps.is_empty(),
            Steps::Raw(text) => text.trim().is_empty(),
        }
    }

    /// Blank `expected` entries take `default`, matching what the tracker stores.
    pub fn with_default_expected(&self, default: &str) -> Steps {
        match self {
            Steps::Structured(steps) => Steps::Structured(
                steps
                    .iter()
                    .map(|item| TestStep {
                        step: item.step.clone(),
                        expected: if item.expected.is_empty() {
                            default.to_string()
                        } else {
                            item.expected.clone()
                        },
                    })
                    .collect(),
            ),
            Steps::Raw(text) => Steps::Raw(text.clone()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TestCase {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub steps: Steps,
    #[serde(default)]
    pub expected_result: String,
    #[serde(
        default,
        deserialize_with = "deserialize_optional_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub story_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regenerated: Option<bool>,
}

impl TestCase {
    pub fn belongs_to(&self, story_id: u64) -> bool {
        self.story_id == Some(story_id)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct HistoryEntry {
    #[serde(deserialize_with = "deserialize_id")]
    pub story_id: u64,
    pub story_title: String,
    pub created_at: String,
    #[serde(default)]
    pub test_cases: Vec<TestCase>,
}

/// How a history snapshot was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationMode {
    Generate,
    Regenerate,
}

impl GenerationMode {
    pub fn tag(self, test_case: &TestCase) -> TestCase {
        let mut tagged = test_case.clone();
        match self {
            GenerationMode::Generate => tagged.generated = Some(true),
            GenerationMode::Regenerate => tagged.regenerated = Some(true),
        }
        tagged
    }
}
