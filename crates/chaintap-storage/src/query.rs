//! Event query filter accepted by `SqliteStorage::query`.

/// Maximum safe integer, used as the implied `LIMIT` when a caller supplies
/// `offset` without `limit` (some stores require `LIMIT` before `OFFSET`).
pub const MAX_SAFE_INTEGER: i64 = 9_007_199_254_740_991;

#[derive(Debug, Clone, Default)]
pub struct QueryFilter {
    pub contract_address: Option<String>,
    pub event_name: Option<String>,
    pub from_block: Option<u64>,
    pub to_block: Option<u64>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl QueryFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contract_address(mut self, address: impl Into<String>) -> Self {
        self.contract_address = Some(address.into());
        self
    }

    pub fn event_name(mut self, name: impl Into<String>) -> Self {
        self.event_name = Some(name.into());
        self
    }

    pub fn block_range(mut self, from: u64, to: u64) -> Self {
        self.from_block = Some(from);
        self.to_block = Some(to);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Effective `LIMIT` value: the caller's limit, or the max-safe-integer
    /// fallback when an offset was supplied without one.
    /// When no limit is set, a maximum-safe-integer limit is implied —
    /// SQLite requires LIMIT before OFFSET, so an offset-only query still
    /// needs an explicit (if effectively unbounded) limit value.
    pub fn effective_limit(&self) -> i64 {
        match self.limit {
            Some(l) => l as i64,
            None => MAX_SAFE_INTEGER,
        }
    }
}
