use serde::{Deserialize, Serialize};

/// `verthash` config section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct VerthashConfig {
    /// Dataset file to load; `verthash.dat` when unset.
    pub data_file: Option<String>,

    /// When set, synthesize the dataset at this path on startup.
    pub gen_data_file: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: VerthashConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, VerthashConfig::default());
        assert!(config.data_file.is_none());
        assert!(config.gen_data_file.is_none());
    }

    #[test]
    fn test_kebab_case_keys() {
        let config: VerthashConfig = serde_json::from_str(
            r#"{"data-file": "verthash.dat", "gen-data-file": "fresh.dat"}"#,
        )
        .unwrap();
        assert_eq!(config.data_file.as_deref(), Some("verthash.dat"));
        assert_eq!(config.gen_data_file.as_deref(), Some("fresh.dat"));
    }
}
