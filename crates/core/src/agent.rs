//! Per-agent configuration consumed by the chat-serving path

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Placeholder substituted with the retrieved context
pub const CONTEXT_PLACEHOLDER: &str = "{context}";
/// Placeholder substituted with the user's question
pub const QUESTION_PLACEHOLDER: &str = "{question}";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptTemplate {
    pub name: String,
    pub body: String,
}

impl PromptTemplate {
    pub fn render(&self, context: &str, question: &str) -> String {
        self.body
            .replace(CONTEXT_PLACEHOLDER, context)
            .replace(QUESTION_PLACEHOLDER, question)
    }
}

/// Agent settings, read-only to this system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSettings {
    pub agent_id: Uuid,
    #[serde(default)]
    pub behavior: String,
    #[serde(default)]
    pub system_instruction: String,
    #[serde(default)]
    pub prompt_template: Option<PromptTemplate>,
}

impl AgentSettings {
    pub fn new(agent_id: Uuid) -> Self {
        Self {
            agent_id,
            behavior: String::new(),
            system_instruction: String::new(),
            prompt_template: None,
        }
    }

    /// Render the user-facing prompt for `question` grounded in `context`.
    ///
    /// Without a template the context is prepended as a reference block.
    pub fn render_prompt(&self, context: &str, question: &str) -> String {
        match &self.prompt_template {
            Some(template) => template.render(context, question),
            None if context.is_empty() => question.to_string(),
            None => format!("Context:\n{}\n\nQuestion: {}", context, question),
        }
    }
}
