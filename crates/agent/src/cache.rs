//! Agent configuration cache
//!
//! Read-write locked map from agent id to settings. Entries older than the
//! TTL are treated as misses on read and removed by a periodic sweeper.
//! A miss loads outside the lock, so concurrent misses may both load; the
//! last insert wins.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use knowledge_config::AgentCacheSettings;
use knowledge_core::{AgentConfigLoader, AgentSettings, Result};
use parking_lot::RwLock;
use tokio::sync::watch;
use uuid::Uuid;

struct CacheEntry {
    settings: Arc<AgentSettings>,
    inserted_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.inserted_at.elapsed() > ttl
    }
}

/// TTL cache of agent settings
pub struct AgentConfigCache {
    entries: RwLock<HashMap<Uuid, CacheEntry>>,
    ttl: Duration,
    cleanup_interval: Duration,
}

impl AgentConfigCache {
    pub fn new(ttl: Duration, cleanup_interval: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            cleanup_interval,
        }
    }

    pub fn from_settings(settings: &AgentCacheSettings) -> Self {
        Self::new(
            Duration::from_secs(settings.ttl_secs),
            Duration::from_secs(settings.cleanup_interval_secs),
        )
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cached settings, if present and not expired
    pub fn get(&self, agent_id: Uuid) -> Option<Arc<AgentSettings>> {
        let entries = self.entries.read();
        entries
            .get(&agent_id)
            .filter(|e| !e.is_expired(self.ttl))
            .map(|e| Arc::clone(&e.settings))
    }

    pub fn insert(&self, settings: AgentSettings) -> Arc<AgentSettings> {
        let settings = Arc::new(settings);
        self.entries.write().insert(
            settings.agent_id,
            CacheEntry {
                settings: Arc::clone(&settings),
                inserted_at: Instant::now(),
            },
        );
        settings
    }

    /// Cached settings, or load through `loader` and cache the result.
    /// Agents unknown to the loader are not cached.
    pub async fn get_or_load(
        &self,
        agent_id: Uuid,
        loader: &dyn AgentConfigLoader,
    ) -> Result<Option<Arc<AgentSettings>>> {
        if let Some(settings) = self.get(agent_id) {
            tracing::trace!(agent_id = %agent_id, "Agent config cache hit");
            return Ok(Some(settings));
        }

        tracing::debug!(agent_id = %agent_id, "Agent config cache miss");
        Ok(loader.load_agent(agent_id).await?.map(|s| self.insert(s)))
    }

    /// Drop one agent's entry; returns whether it was cached
    pub fn invalidate(&self, agent_id: Uuid) -> bool {
        self.entries.write().remove(&agent_id).is_some()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Number of stored entries, expired ones included until swept
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Remove expired entries; returns how many were removed
    pub fn sweep_expired(&self) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, e| !e.is_expired(self.ttl));
        before - entries.len()
    }

    /// Start a background task that sweeps expired entries every
    /// `cleanup_interval`.
    ///
    /// Returns a shutdown sender; send `true` to stop the task.
    pub fn start_cleanup_task(self: &Arc<Self>) -> watch::Sender<bool> {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let cache = Arc::clone(self);
        let interval = cache.cleanup_interval;

        tokio::spawn(async move {
            let mut interval_timer = tokio::time::interval(interval);
            interval_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = interval_timer.tick() => {
                        let removed = cache.sweep_expired();
                        if removed > 0 {
                            tracing::info!(
                                removed,
                                remaining = cache.len(),
                                "Agent config cache sweep"
                            );
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            tracing::info!("Agent config cache sweeper shutting down");
                            break;
                        }
                    }
                }
            }
        });

        shutdown_tx
    }
}
