use serde::{Deserialize, Serialize};

/// Index statistics for monitoring
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreStats {
    pub docs: u64,
    pub eq_tokens: usize,
    pub presence_tokens: usize,
    /// Sum of bitmap cardinalities across every posting
    pub postings_cardinality: u64,
    /// Rough resident size of the postings and registry, in bytes
    pub memory_approx: u64,
    /// Wall time of the snapshot bootstrap
    pub build_ms: u64,
    pub last_seq: i64,
    pub uptime_secs: u64,
    pub filter_cache: FilterCacheStats,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub size: usize,
    pub capacity: usize,
}

impl FilterCacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
