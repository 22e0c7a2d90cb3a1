//! Generation-backed planner
//!
//! Forwards the goal and context to a text-generation collaborator with an
//! instruction to emit a structured task list, then parses and validates
//! the response. Generator output is untrusted: a response that cannot be
//! decoded into the task-descriptor shape fails with `PlanParse` — there
//! is deliberately no fallback to a default or empty plan.

use crate::planner::{Planner, Result};
use async_trait::async_trait;
use sdk::collaborators::{GenerationOptions, Message, TextGenerator};
use sdk::errors::AgentError;
use sdk::types::TaskDescriptor;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

const PLANNER_INSTRUCTION: &str = "You are a task planner for an autonomous agent. \
Break the goal into discrete tasks.\n\
Output ONLY a JSON array of tasks. Each task object must have:\n\
- \"type\": string naming a registered action (e.g. \"check_balance\")\n\
- \"params\": object of parameters for that action (may be empty)\n\n\
Example output:\n\
[{\"type\":\"check_balance\",\"params\":{\"asset\":\"ETH\"}},\
{\"type\":\"execute_trade\",\"params\":{\"pair\":\"ETH/USDC\",\"amount\":0.5}}]\n\n\
Output ONLY the JSON array, no markdown, no explanation.";

/// Intermediate deserialization type for generator JSON output
#[derive(Debug, Deserialize)]
struct RawTask {
    #[serde(rename = "type")]
    task_type: String,
    #[serde(default)]
    params: serde_json::Map<String, serde_json::Value>,
}

/// Planner that asks a text-generation collaborator for the task list
pub struct GenerationPlanner {
    generator: Arc<dyn TextGenerator>,
    options: GenerationOptions,
}

impl GenerationPlanner {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator,
            options: GenerationOptions::default(),
        }
    }

    /// Override the generation options used for planning calls
    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    /// Parse generator output into task descriptors, handling fenced or
    /// prose-wrapped JSON
    fn parse_tasks(&self, content: &str) -> Result<Vec<TaskDescriptor>> {
        let trimmed = content.trim();

        // Extract the JSON array from the response
        let json_str = match (trimmed.find('['), trimmed.rfind(']')) {
            (Some(start), Some(end)) if start < end => &trimmed[start..=end],
            _ => {
                return Err(AgentError::PlanParse(
                    "response contains no JSON array".to_string(),
                ))
            }
        };

        let raw_tasks: Vec<RawTask> = serde_json::from_str(json_str)
            .map_err(|e| AgentError::PlanParse(format!("invalid task list JSON: {}", e)))?;

        let mut tasks = Vec::with_capacity(raw_tasks.len());
        for (i, raw) in raw_tasks.into_iter().enumerate() {
            if raw.task_type.trim().is_empty() {
                return Err(AgentError::PlanParse(format!(
                    "task {} has an empty type",
                    i + 1
                )));
            }
            tasks.push(TaskDescriptor {
                task_type: raw.task_type,
                params: raw.params,
            });
        }

        Ok(tasks)
    }
}

#[async_trait]
impl Planner for GenerationPlanner {
    fn name(&self) -> &str {
        "generation"
    }

    async fn plan(&self, goal: &str, context: &str) -> Result<Vec<TaskDescriptor>> {
        let user_prompt = if context.is_empty() {
            format!("Goal: {}", goal)
        } else {
            format!("Goal: {}\n\nContext:\n{}", goal, context)
        };

        let messages = [Message::system(PLANNER_INSTRUCTION), Message::user(user_prompt)];
        let generation = self.generator.generate(&messages, &self.options).await?;

        let tasks = self.parse_tasks(&generation.content)?;
        debug!(
            "Generation planner produced {} tasks for goal '{}'",
            tasks.len(),
            goal
        );
        Ok(tasks)
    }
}
