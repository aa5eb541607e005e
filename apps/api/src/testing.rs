//! Test doubles and fixtures shared by unit tests across modules.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use uuid::Uuid;

use crate::llm_client::provider::GenerationMode;
use crate::llm_client::{
    GenerationConstraints, GenerationOutput, GenerationProvider, GenerationTask, LlmError,
    PromptContext,
};
use crate::models::profile::{RequirementProfile, RoleCategory};
use crate::pipeline::{PipelineOutcome, RunSink};
use crate::models::role_block::{RolePeriod, RoleBlock};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ScriptKey {
    Task(GenerationTask),
    Role(Uuid),
}

#[derive(Debug, Clone)]
enum Scripted {
    Json(Value),
    Fail(u16),
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub task: GenerationTask,
    pub mode: GenerationMode,
    pub role_id: Option<Uuid>,
    pub prompt: String,
}

/// Replays canned responses keyed by role (for role bullets) or by task.
///
/// Each key holds a queue; once a queue is down to its last entry that entry repeats.
/// A call with no script fails with `EmptyContent`.
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    scripts: Mutex<HashMap<ScriptKey, VecDeque<Scripted>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(self, key: ScriptKey, item: Scripted) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(key)
            .or_default()
            .push_back(item);
        self
    }

    pub fn with_role_response(self, role_id: Uuid, value: Value) -> Self {
        self.push(ScriptKey::Role(role_id), Scripted::Json(value))
    }

    pub fn with_response(self, task: GenerationTask, value: Value) -> Self {
        self.push(ScriptKey::Task(task), Scripted::Json(value))
    }

    /// Non-transient API failure for every call of `task`.
    pub fn with_failure(self, task: GenerationTask, status: u16) -> Self {
        self.push(ScriptKey::Task(task), Scripted::Fail(status))
    }

    pub fn calls(&self, task: GenerationTask) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| c.task == task).count()
    }

    pub fn role_calls(&self, role_id: Uuid) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.role_id == Some(role_id))
            .count()
    }

    pub fn prompts_for(&self, task: GenerationTask) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.task == task)
            .map(|c| c.prompt.clone())
            .collect()
    }

    pub fn modes_for(&self, task: GenerationTask) -> Vec<GenerationMode> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.task == task)
            .map(|c| c.mode)
            .collect()
    }

    fn next(&self, key: &ScriptKey) -> Option<Scripted> {
        let mut scripts = self.scripts.lock().unwrap();
        let queue = scripts.get_mut(key)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[async_trait]
impl GenerationProvider for ScriptedProvider {
    async fn generate(
        &self,
        context: &PromptContext,
        constraints: &GenerationConstraints,
    ) -> Result<GenerationOutput, LlmError> {
        self.calls.lock().unwrap().push(RecordedCall {
            task: constraints.task,
            mode: constraints.mode,
            role_id: constraints.role_id,
            prompt: context.prompt.clone(),
        });

        let scripted = constraints
            .role_id
            .and_then(|id| self.next(&ScriptKey::Role(id)))
            .or_else(|| self.next(&ScriptKey::Task(constraints.task)));

        match scripted {
            Some(Scripted::Json(value)) => Ok(GenerationOutput::from_text(
                value.to_string(),
                constraints.expect_json,
            )),
            Some(Scripted::Fail(status)) => Err(LlmError::Api {
                status,
                message: "scripted failure".to_string(),
            }),
            None => Err(LlmError::EmptyContent),
        }
    }
}

/// Records every outcome handed to it.
#[derive(Debug, Default)]
pub struct RecordingSink {
    runs: Mutex<Vec<PipelineOutcome>>,
}

impl RecordingSink {
    pub fn persisted(&self) -> Vec<PipelineOutcome> {
        self.runs.lock().unwrap().clone()
    }
}

#[async_trait]
impl RunSink for RecordingSink {
    async fn persist(&self, outcome: &PipelineOutcome) -> anyhow::Result<()> {
        self.runs.lock().unwrap().push(outcome.clone());
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Fixtures
// ────────────────────────────────────────────────────────────────────────────

/// Senior role asking for AWS, Kubernetes, and Python.
pub fn fixture_profile() -> RequirementProfile {
    RequirementProfile {
        role_category: RoleCategory::Senior,
        competency_weights: [
            ("AWS".to_string(), 0.4),
            ("Python".to_string(), 0.3),
            ("Kubernetes".to_string(), 0.3),
        ]
        .into_iter()
        .collect(),
        required_keywords: ["AWS", "Kubernetes", "Python"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        nice_to_have_keywords: ["Terraform".to_string()].into_iter().collect(),
        inferred_responsibilities: vec!["Own cloud services end to end".to_string()],
    }
}

/// Undated role titled "Senior Engineer".
pub fn fixture_role(employer: &str, skills: &[&str], achievements: &[&str]) -> RoleBlock {
    RoleBlock {
        role_id: Uuid::new_v4(),
        employer: employer.to_string(),
        title: "Senior Engineer".to_string(),
        period: RolePeriod::default(),
        location: None,
        achievements: achievements.iter().map(|s| s.to_string()).collect(),
        skill_tags: skills.iter().map(|s| s.to_string()).collect(),
        is_current: false,
    }
}

/// Dated role; no end date means current.
pub fn dated_role(
    employer: &str,
    title: &str,
    start: (i32, u32),
    end: Option<(i32, u32)>,
    skills: &[&str],
) -> RoleBlock {
    let date = |(y, m): (i32, u32)| NaiveDate::from_ymd_opt(y, m, 1);
    RoleBlock {
        role_id: Uuid::new_v4(),
        employer: employer.to_string(),
        title: title.to_string(),
        period: RolePeriod {
            start: date(start),
            end: end.and_then(date),
        },
        location: None,
        achievements: vec!["Shipped production services".to_string()],
        skill_tags: skills.iter().map(|s| s.to_string()).collect(),
        is_current: end.is_none(),
    }
}
