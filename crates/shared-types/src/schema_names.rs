//! Names of the replicated-state schemas the core declares.

/// Single shared outbox/inbox record of the RFC bus.
pub const RFC_SCHEMA: &str = "rfc";

/// One record per live node.
pub const NODE_SCHEMA: &str = "node";

/// One record per live or replayed source.
pub const SOURCE_SCHEMA: &str = "source";
