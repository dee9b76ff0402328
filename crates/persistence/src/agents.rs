//! Read-only agent settings lookup

use async_trait::async_trait;
use knowledge_core::{AgentConfigLoader, AgentSettings, PromptTemplate};
use sqlx::Row;
use uuid::Uuid;

use crate::{PersistenceError, PgClient};

#[derive(Clone)]
pub struct PgAgentConfigLoader {
    client: PgClient,
}

impl PgAgentConfigLoader {
    pub fn new(client: PgClient) -> Self {
        Self { client }
    }

    pub async fn load(&self, agent_id: Uuid) -> Result<Option<AgentSettings>, PersistenceError> {
        let row = sqlx::query(
            "SELECT id, behavior, system_instruction, prompt_template_name, prompt_template
             FROM agents WHERE id = $1",
        )
        .bind(agent_id)
        .fetch_optional(self.client.pool())
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let template_name: Option<String> = row.try_get("prompt_template_name")?;
        let template_body: Option<String> = row.try_get("prompt_template")?;

        Ok(Some(AgentSettings {
            agent_id: row.try_get("id")?,
            behavior: row.try_get("behavior")?,
            system_instruction: row.try_get("system_instruction")?,
            prompt_template: template_body.map(|body| PromptTemplate {
                name: template_name.unwrap_or_default(),
                body,
            }),
        }))
    }
}

#[async_trait]
impl AgentConfigLoader for PgAgentConfigLoader {
    async fn load_agent(&self, agent_id: Uuid) -> knowledge_core::Result<Option<AgentSettings>> {
        Ok(self.load(agent_id).await?)
    }
}
