use serde::Serialize;

/// Statistics reported by the remote cache server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RemoteStats {
    pub connected_clients: u64,
    pub used_memory: String,
    pub keyspace_hits: u64,
    pub keyspace_misses: u64,
    pub total_commands_processed: u64,
}

/// Cache statistics for monitoring, tagged by the backend that produced them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "cache_type", rename_all = "snake_case")]
pub enum CacheStats {
    Redis(RemoteStats),
    /// In-process store; `total_keys` counts unexpired entries only.
    Memory { total_keys: usize },
    /// Statistics could not be collected.
    Unavailable { error: String },
}
