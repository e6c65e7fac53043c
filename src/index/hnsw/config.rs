//! HNSW construction and search parameters.

use serde::{Deserialize, Serialize};

/// Configuration for HNSW index construction and search.
///
/// Defaults are tuned for the 10K-100K vector scale typical of context
/// memory workloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HnswConfig {
    /// Connections established per node per layer above 0.
    /// Higher values improve recall but increase memory and build time.
    /// Default: 16.
    pub m: usize,

    /// Maximum connections at layer 0 (the densest layer). Default: 2*M.
    pub m_max0: usize,

    /// Candidate pool size during construction. Default: 200.
    pub ef_construction: usize,

    /// Default candidate pool size during search; raised to `k` when a
    /// query asks for more. Default: 50.
    pub ef_search: usize,

    /// Level generation factor, `1/ln(M)`.
    pub ml: f64,
}

impl Default for HnswConfig {
    fn default() -> Self {
        Self::with_m(16)
    }
}

impl HnswConfig {
    /// Create a configuration with the given M; other parameters derive from it.
    pub fn with_m(m: usize) -> Self {
        Self {
            m,
            m_max0: 2 * m,
            ef_construction: 200,
            ef_search: 50,
            ml: 1.0 / (m as f64).ln(),
        }
    }

    /// Set the search-time candidate pool size.
    pub fn with_ef_search(mut self, ef: usize) -> Self {
        self.ef_search = ef;
        self
    }

    /// Set the construction-time candidate pool size.
    pub fn with_ef_construction(mut self, ef: usize) -> Self {
        self.ef_construction = ef;
        self
    }

    /// Degree cap for a layer.
    pub fn max_connections(&self, layer: usize) -> usize {
        if layer == 0 {
            self.m_max0
        } else {
            self.m
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HnswConfig::default();
        assert_eq!(config.m, 16);
        assert_eq!(config.m_max0, 32);
        assert_eq!(config.ef_construction, 200);
        assert_eq!(config.ef_search, 50);
        assert!((config.ml - 1.0 / 16.0_f64.ln()).abs() < 1e-9);
    }

    #[test]
    fn test_layer_caps() {
        let config = HnswConfig::with_m(8);
        assert_eq!(config.max_connections(0), 16);
        assert_eq!(config.max_connections(1), 8);
        assert_eq!(config.max_connections(5), 8);
    }
}
