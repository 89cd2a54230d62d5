use crate::domain::models::CooldownTable;
use crate::domain::ports::errors::DatabaseError;
use async_trait::async_trait;

/// Repository port persisting the cooldown table between process runs
///
/// The table is loaded once before a cycle and saved once after it, which
/// keeps the orchestrator the table's only writer.
#[async_trait]
pub trait CooldownStore: Send + Sync {
    /// Load every stored entry
    async fn load(&self) -> Result<CooldownTable, DatabaseError>;

    /// Replace the stored entries with `table`
    async fn save(&self, table: &CooldownTable) -> Result<(), DatabaseError>;
}
