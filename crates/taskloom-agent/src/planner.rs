use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use taskloom_core::config::{ModalityRule, PlannerConfig};
use taskloom_core::error::{Result, TaskloomError};
use taskloom_core::traits::ModelClient;
use taskloom_core::types::Message;

use crate::graph::TaskGraph;

const PLANNER_PROMPT: &str = r#"You plan work for a team of AI agents. Break the user's request into a directed acyclic graph of subtasks:
- each agent is one coherent subtask that a single expert could own;
- each edge [from, to] means `to` needs the result of `from`;
- split only where it helps, and do not solve the task yourself.

Reply with a single JSON object and nothing else:
{
  "agents": [
    {"id": 1, "name": "Researcher", "task": "...", "input": ["text"], "output": ["text"], "tools": []}
  ],
  "edges": [[1, 2]]
}
Modalities are "text", "image", "audio", "video" or "file". Write tasks in the language of the request."#;

/// Turns a free-form request into a validated task graph by asking a model
/// for a graph description.
///
/// A rejected description is sent back to the model with the validation
/// error so the next attempt can fix it.
pub struct Planner {
    model: Arc<dyn ModelClient>,
    config: PlannerConfig,
    rule: ModalityRule,
}

impl Planner {
    pub fn new(model: Arc<dyn ModelClient>, config: PlannerConfig) -> Self {
        Self {
            model,
            config,
            rule: ModalityRule::default(),
        }
    }

    pub fn with_modality_rule(mut self, rule: ModalityRule) -> Self {
        self.rule = rule;
        self
    }

    /// Ask the model for a graph, retrying with the rejection as feedback.
    /// Always makes at least one attempt.
    pub async fn plan(&self, request: &str) -> Result<TaskGraph> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut messages = vec![Message::system(PLANNER_PROMPT), Message::user(request)];
        let mut last_error = String::new();

        for attempt in 0..max_attempts {
            match self.model.chat(messages.clone(), &[]).await {
                Ok(response) => match self.parse(&response.text()) {
                    Ok(graph) => {
                        info!(
                            attempt = attempt + 1,
                            nodes = graph.len(),
                            edges = graph.edges().len(),
                            "Planned task graph"
                        );
                        return Ok(graph);
                    }
                    Err(e) => {
                        last_error = e.to_string();
                        warn!(attempt = attempt + 1, error = %e, "Rejected graph description");
                        messages.push(response);
                        messages.push(Message::user(format!(
                            "That graph description was rejected: {}. Reply with a corrected JSON object only.",
                            e
                        )));
                    }
                },
                Err(e) => {
                    last_error = e.to_string();
                    warn!(attempt = attempt + 1, error = %e, "Planner model request failed");
                }
            }

            if attempt + 1 < max_attempts {
                tokio::time::sleep(calculate_backoff(attempt, &self.config)).await;
            }
        }

        Err(TaskloomError::Orchestration {
            attempts: max_attempts,
            message: last_error,
        })
    }

    fn parse(&self, text: &str) -> Result<TaskGraph> {
        let json = extract_json(text).unwrap_or(text);
        TaskGraph::from_description(json, self.rule)
    }
}

/// The span from the first `{` to the last `}`; tolerates code fences and
/// surrounding prose.
fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn calculate_backoff(attempt: u32, config: &PlannerConfig) -> Duration {
    let ms = config
        .initial_backoff_ms
        .saturating_mul(2u64.saturating_pow(attempt))
        .min(config.max_backoff_ms);
    // Add jitter: 0.8x to 1.2x
    let jitter = 0.8 + rand::random::<f64>() * 0.4;
    Duration::from_millis((ms as f64 * jitter) as u64)
}
