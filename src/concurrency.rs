//! Commit/locking discipline (SPEC_FULL.md §5). The `GraphContext`'s
//! `RwLock`/`Mutex` pair and `CommitGuard` RAII type live in
//! [`crate::graph_store`]; this module adds the replication hook a write
//! transaction calls after a successful commit.
//!
//! The original propagates committed writes to replicas over the Redis
//! replication stream. There is no keyspace here, so `ReplicationSink` is a
//! seam or a no-op rather than a thing this engine needs to implement —
//! matching how the teacher isolates ClickHouse-specific I/O behind a trait
//! so the planner never depends on the transport directly.

pub use crate::graph_store::CommitGuard;

/// Called once per committed write transaction, after the commit lock is
/// released, with a human-readable description of what changed. Exists so a
/// future replication/journaling backend has a single seam to hook into
/// without the execution engine depending on it.
pub trait ReplicationSink: Send + Sync {
    fn on_commit(&self, graph_name: &str, summary: &str);
}

/// Default sink: commits are not replicated anywhere.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReplicationSink;

impl ReplicationSink for NullReplicationSink {
    fn on_commit(&self, _graph_name: &str, _summary: &str) {}
}
