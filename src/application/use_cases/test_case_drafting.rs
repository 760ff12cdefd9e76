use crate::domain::error::{AppError, Result};
use crate::domain::llm_config::LLMConfig;
use crate::domain::test_case::{Steps, TestCase, TestStep, NO_EXPECTED_RESULT};
use crate::infrastructure::llm_clients::LLMClient;
use crate::infrastructure::response::{clean_llm_response, extract_json_array};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

pub const SYSTEM_PROMPT: &str =
    "You are a QA engineer writing professional test cases in English only.";
pub const FALLBACK_TITLE: &str = "Generated Test Case";

/// Result of asking the model for test cases. The fallback carries the single
/// synthetic case built from the story itself.
#[derive(Debug, Clone, PartialEq)]
pub enum DraftOutcome {
    Generated(Vec<TestCase>),
    Fallback {
        test_cases: Vec<TestCase>,
        reason: String,
    },
}

impl DraftOutcome {
    pub fn into_test_cases(self) -> Vec<TestCase> {
        match self {
            DraftOutcome::Generated(test_cases) => test_cases,
            DraftOutcome::Fallback { test_cases, .. } => test_cases,
        }
    }
}

#[derive(Debug, Deserialize)]
struct DraftedCase {
    title: String,
    #[serde(default)]
    steps: Steps,
    #[serde(default)]
    expected_result: Option<String>,
}

pub fn user_prompt(description: &str, acceptance: &str) -> String {
    format!(
        r#"User Story (in English):
{description}

Acceptance Criteria (in English):
{acceptance}

Write professional test cases in JSON format, where each test case has steps as a list of objects, each with 'step' and 'expected', and all content is in English:
[
  {{
    "id": 1,
    "title": "Test Case Title",
    "steps": [
      {{ "step": "Open the page", "expected": "Page opens successfully" }},
      {{ "step": "Enter data", "expected": "Data is accepted" }}
    ],
    "expected_result": "Expected result for the test case"
  }}
]
Only use English language for all fields and steps."#
    )
}

/// Parses a model reply into test cases numbered 1..N.
pub fn parse_draft(reply: &str) -> Result<Vec<TestCase>> {
    let cleaned = clean_llm_response(reply);
    let payload = extract_json_array(&cleaned)
        .ok_or_else(|| AppError::ParseError("Reply contains no JSON array".to_string()))?;

    let drafted: Vec<DraftedCase> = serde_json::from_str(payload)?;
    if drafted.is_empty() {
        return Err(AppError::ParseError("Reply contains no test cases".to_string()));
    }

    drafted
        .into_iter()
        .enumerate()
        .map(|(index, case)| {
            if case.title.trim().is_empty() {
                return Err(AppError::ParseError(format!(
                    "Test case {} has an empty title",
                    index + 1
                )));
            }
            Ok(TestCase {
                id: index as u64 + 1,
                title: case.title,
                steps: case.steps,
                expected_result: case
                    .expected_result
                    .unwrap_or_else(|| NO_EXPECTED_RESULT.to_string()),
                story_id: None,
                generated: None,
                regenerated: None,
            })
        })
        .collect()
}

pub fn fallback_case(description: &str, acceptance: &str) -> TestCase {
    TestCase {
        id: 1,
        title: FALLBACK_TITLE.to_string(),
        steps: Steps::Structured(vec![TestStep::new(description, acceptance)]),
        expected_result: acceptance.to_string(),
        story_id: None,
        generated: None,
        regenerated: None,
    }
}

pub struct TestCaseDraftingUseCase {
    llm_client: Arc<dyn LLMClient + Send + Sync>,
}

impl TestCaseDraftingUseCase {
    pub fn new(llm_client: Arc<dyn LLMClient + Send + Sync>) -> Self {
        Self { llm_client }
    }

    pub async fn execute(
        &self,
        config: &LLMConfig,
        description: &str,
        acceptance: &str,
    ) -> DraftOutcome {
        let prompt = user_prompt(description, acceptance);
        let parsed = match self
            .llm_client
            .generate(config, SYSTEM_PROMPT, &prompt)
            .await
        {
            Ok(reply) => {
                debug!(reply_len = reply.len(), "Model replied");
                parse_draft(&reply)
            }
            Err(e) => Err(e),
        };

        match parsed {
            Ok(test_cases) => DraftOutcome::Generated(test_cases),
            Err(e) => {
                warn!(error = %e, model = %config.model, "Falling back to synthetic test case");
                DraftOutcome::Fallback {
                    test_cases: vec![fallback_case(description, acceptance)],
                    reason: e.to_string(),
                }
            }
        }
    }
}
