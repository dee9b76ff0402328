use async_trait::async_trait;
use uuid::Uuid;

use crate::{AgentSettings, Result};

/// Source of truth for agent settings
///
/// Implementations:
/// - `PgStore` - reads the `agents` table
/// - `MemoryStore` - in-process map
#[async_trait]
pub trait AgentConfigLoader: Send + Sync + 'static {
    /// `Ok(None)` when the agent does not exist
    async fn load_agent(&self, agent_id: Uuid) -> Result<Option<AgentSettings>>;
}
