//! Engine statistics.

/// Point-in-time engine counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Statistics {
    /// Keys currently in the store.
    pub total_keys: usize,
    /// Approximate bytes of key and value payload held in memory.
    pub memory_used: usize,
    /// Reads served since open (`get` and `exists`).
    pub total_reads: u64,
    /// Writes accepted since open (`put`, `remove`, batch entries).
    pub total_writes: u64,
}
