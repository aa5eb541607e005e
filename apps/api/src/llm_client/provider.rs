//! The generation capability as the pipeline sees it: an interchangeable provider
//! taking `(prompt_context, constraints)` and returning text plus optional structured
//! fields. `LlmClient` is the production implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::llm_client::LlmError;

/// Sampling mode. Grader-adjacent scoring runs deterministic; narrative copy runs warmer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    Deterministic,
    Narrative,
}

impl GenerationMode {
    pub fn temperature(self) -> f32 {
        match self {
            GenerationMode::Deterministic => 0.0,
            GenerationMode::Narrative => 0.7,
        }
    }
}

/// Which pipeline step is asking. Used for logging and by scripted providers in tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationTask {
    RoleBullets,
    Summary,
    SkillCategories,
    SeniorityAssessment,
}

#[derive(Debug, Clone)]
pub struct PromptContext {
    pub system: String,
    pub prompt: String,
}

#[derive(Debug, Clone)]
pub struct GenerationConstraints {
    pub task: GenerationTask,
    pub mode: GenerationMode,
    pub max_tokens: u32,
    /// When set the provider attempts to parse the text as JSON into `structured`.
    pub expect_json: bool,
    pub role_id: Option<Uuid>,
}

impl GenerationConstraints {
    pub fn narrative_json(task: GenerationTask) -> Self {
        Self {
            task,
            mode: GenerationMode::Narrative,
            max_tokens: 2048,
            expect_json: true,
            role_id: None,
        }
    }

    pub fn deterministic_json(task: GenerationTask) -> Self {
        Self {
            mode: GenerationMode::Deterministic,
            max_tokens: 512,
            ..Self::narrative_json(task)
        }
    }

    pub fn for_role(mut self, role_id: Uuid) -> Self {
        self.role_id = Some(role_id);
        self
    }
}

#[derive(Debug, Clone)]
pub struct GenerationOutput {
    pub text: String,
    /// Parsed JSON body, when `expect_json` was set and the text parsed.
    pub structured: Option<serde_json::Value>,
}

impl GenerationOutput {
    /// Builds an output from raw model text, parsing it as JSON if asked.
    pub fn from_text(text: String, expect_json: bool) -> Self {
        let structured = if expect_json {
            serde_json::from_str(super::strip_json_fences(&text)).ok()
        } else {
            None
        };
        Self { text, structured }
    }
}

/// Carried in `AppState` and the pipeline as `Arc<dyn GenerationProvider>`.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    async fn generate(
        &self,
        context: &PromptContext,
        constraints: &GenerationConstraints,
    ) -> Result<GenerationOutput, LlmError>;
}
