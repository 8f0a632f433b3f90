use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Store (durable job/history persistence)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding the durable state: one JSON file per job under
    /// `jobs/`, plus the append-only `history.jsonl`.
    #[serde(default = "d_state_path")]
    pub state_path: PathBuf,
    /// Maximum delivery-history entries retained, in memory and on disk.
    /// Older entries are dropped when the cap is exceeded.
    #[serde(default = "d_history_limit")]
    pub history_limit: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            state_path: d_state_path(),
            history_limit: d_history_limit(),
        }
    }
}

fn d_state_path() -> PathBuf {
    PathBuf::from("data")
}

fn d_history_limit() -> usize {
    1000
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_config_empty_toml_uses_all_defaults() {
        let cfg: StoreConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.state_path, PathBuf::from("data"));
        assert_eq!(cfg.history_limit, 1000);
    }

    #[test]
    fn store_config_parses_custom_values() {
        let toml_str = r#"
            state_path = "/var/lib/chime"
            history_limit = 250
        "#;
        let cfg: StoreConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.state_path, PathBuf::from("/var/lib/chime"));
        assert_eq!(cfg.history_limit, 250);
    }
}
