//! Agent runtime support for the knowledge base
//!
//! Features:
//! - TTL cache of per-agent settings in front of the agent repository
//! - Background sweeper evicting expired entries

pub mod cache;

pub use cache::AgentConfigCache;
