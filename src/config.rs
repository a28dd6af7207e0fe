//! Tunable constants: one fixed page size, a cache size, the LRU-K constant,
//! and the pinned-page bound a single logical operation may hold at once.

/// Fixed page size in bytes.
pub const PAGE_SIZE: usize = 4096;

/// Upper bound on page numbers.
pub const MAX_PAGE_NO: u64 = 1 << 40;

/// Sentinel for "no such id".
pub const SENTINEL: u64 = u64::MAX;

/// Default buffer pool capacity, in frames.
pub const DEFAULT_CACHE_N_PAGES: usize = 64;

/// Default K for the LRU-K eviction scan.
pub const DEFAULT_EVICT_LRU_K: usize = 5;

/// Maximum number of pages a single logical heap-file operation may hold
/// pinned at once. The cache capacity must exceed this, or an operation that
/// legitimately needs that many pages at once could deadlock against
/// eviction.
pub const SWAP_MAX_NUM_PINNED_PAGES: usize = 6;

/// Runtime configuration for a [`crate::graph::GraphDb`].
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory (or path prefix) the four on-disk files are created under.
    pub path_prefix: std::path::PathBuf,
    /// Buffer pool capacity, in frames.
    pub cache_n_pages: usize,
    /// K for the LRU-K eviction scan.
    pub evict_lru_k: usize,
}

impl Config {
    pub fn new(path_prefix: impl Into<std::path::PathBuf>) -> Self {
        Self {
            path_prefix: path_prefix.into(),
            cache_n_pages: DEFAULT_CACHE_N_PAGES,
            evict_lru_k: DEFAULT_EVICT_LRU_K,
        }
    }

    pub fn with_cache_n_pages(mut self, n: usize) -> Self {
        self.cache_n_pages = n;
        self
    }

    pub fn with_evict_lru_k(mut self, k: usize) -> Self {
        self.evict_lru_k = k;
        self
    }
}
