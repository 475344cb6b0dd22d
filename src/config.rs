//! Serializable construction parameters.
//!
//! Process-group size and rank never appear here: they come from the
//! [`ProcessGroup`](crate::algs::collective::ProcessGroup) passed to each
//! constructor.

use serde::{Deserialize, Serialize};

/// Knobs for [`BasisPartition`](crate::basis::BasisPartition) construction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartitionConfig {
    /// First message tag. The partition itself uses `tag_base..tag_base + 8`,
    /// operators built on it `tag_base + 8..tag_base + 11`.
    pub tag_base: u16,
    /// Log the global dimension and load imbalance on rank 0.
    pub log_load_balance: bool,
    /// Run the full invariant validation after construction, also in
    /// release builds.
    pub check_invariants: bool,
    /// `size_max / size_min` above which a warning is logged.
    pub imbalance_warn_ratio: f64,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            tag_base: 0x4800,
            log_load_balance: false,
            check_invariants: false,
            imbalance_warn_ratio: 2.0,
        }
    }
}

/// Quantum-number sector description, tagged by model.
///
/// ```
/// use hilbert_sieve::config::SectorConfig;
/// let cfg: SectorConfig =
///     serde_json::from_str(r#"{"model":"tj","n_sites":6,"n_up":2,"n_dn":2}"#).unwrap();
/// assert_eq!(cfg.n_sites(), 6);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "lowercase")]
pub enum SectorConfig {
    Electron {
        n_sites: usize,
        n_up: usize,
        n_dn: usize,
    },
    Tj {
        n_sites: usize,
        n_up: usize,
        n_dn: usize,
    },
    Spinhalf {
        n_sites: usize,
        n_up: usize,
        #[serde(default)]
        n_prefix_bits: Option<usize>,
    },
}

impl SectorConfig {
    pub fn n_sites(&self) -> usize {
        match *self {
            SectorConfig::Electron { n_sites, .. }
            | SectorConfig::Tj { n_sites, .. }
            | SectorConfig::Spinhalf { n_sites, .. } => n_sites,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_partition_config_uses_defaults() {
        let cfg: PartitionConfig = serde_json::from_str(r#"{"log_load_balance":true}"#).unwrap();
        assert!(cfg.log_load_balance);
        assert_eq!(cfg.tag_base, PartitionConfig::default().tag_base);
        assert_eq!(cfg.imbalance_warn_ratio, 2.0);
    }

    #[test]
    fn spinhalf_prefix_is_optional() {
        let cfg: SectorConfig =
            serde_json::from_str(r#"{"model":"spinhalf","n_sites":8,"n_up":4}"#).unwrap();
        assert_eq!(
            cfg,
            SectorConfig::Spinhalf {
                n_sites: 8,
                n_up: 4,
                n_prefix_bits: None
            }
        );
    }
}
