//! Execution tuning.

use serde::{Deserialize, Serialize};

/// Default limit on expression nesting.
pub const MAX_NESTING: usize = 64;

/// Knobs for one execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionOptions {
    /// Deepest allowed nesting of terms and `Begin` groups.
    pub max_nesting: usize,
    /// Abort after this many statements. `None` runs until the code ends.
    pub max_statements: Option<usize>,
    /// Log each recoverable error as it happens.
    pub log_recoverable: bool,
    /// Check that every element of a slot carries the same metadata, and
    /// that batched lanes agree on shared metadata writes.
    pub validate: bool,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            max_nesting: MAX_NESTING,
            max_statements: None,
            log_recoverable: cfg!(feature = "diagnostics"),
            validate: cfg!(any(feature = "diagnostics", debug_assertions)),
        }
    }
}

impl ExecutionOptions {
    pub fn with_statement_limit(mut self, limit: usize) -> Self {
        self.max_statements = Some(limit);
        self
    }

    pub fn quiet(mut self) -> Self {
        self.log_recoverable = false;
        self
    }
}

/// How batched lanes are spread over threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Lanes per chunk
    pub chunk_size: usize,
    /// Minimum chunk size (avoid too-small chunks)
    pub min_chunk: usize,
    /// Maximum chunk size (limit per-task memory)
    pub max_chunk: usize,
    /// Run chunks on the rayon pool. Off runs every lane on the caller.
    pub parallel: bool,
}

impl BatchConfig {
    /// Explicit chunk size, parallel.
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size,
            ..Self::default()
        }
    }

    /// Chunk size derived from the lane count.
    pub fn auto(lanes: usize) -> Self {
        Self::new(optimal_chunk_size(lanes))
    }

    /// Everything on the calling thread.
    pub fn sequential() -> Self {
        Self {
            parallel: false,
            ..Self::default()
        }
    }

    /// Get effective chunk size after clamping.
    pub fn effective_size(&self) -> usize {
        self.chunk_size.clamp(self.min_chunk.max(1), self.max_chunk.max(1))
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            chunk_size: 64,
            min_chunk: 16,
            max_chunk: 1024,
            parallel: true,
        }
    }
}

/// Chunk size for `lanes` lanes.
///
/// Targets four chunks per rayon thread, clamped to 16..=1024 lanes.
pub fn optimal_chunk_size(lanes: usize) -> usize {
    let threads = rayon::current_num_threads().max(1);
    (lanes / (threads * 4)).clamp(16, 1024)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_size_clamps() {
        assert_eq!(BatchConfig::new(1).effective_size(), 16);
        assert_eq!(BatchConfig::new(100_000).effective_size(), 1024);
        assert_eq!(BatchConfig::new(200).effective_size(), 200);
    }

    #[test]
    fn test_optimal_chunk_size_bounds() {
        assert_eq!(optimal_chunk_size(0), 16);
        assert_eq!(optimal_chunk_size(usize::MAX / 2), 1024);
    }

    #[test]
    fn test_options_deserialize_with_defaults() {
        let options: ExecutionOptions = serde_json::from_str(r#"{"max_nesting": 8}"#).unwrap();
        assert_eq!(options.max_nesting, 8);
        assert_eq!(options.max_statements, None);
    }
}
