//! redb table definitions for the database backend.

use redb::TableDefinition;

/// JSON-encoded metric records keyed by metric id.
pub const METRICS: TableDefinition<&str, &[u8]> = TableDefinition::new("metrics");
