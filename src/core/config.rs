/// Engine tunables: probabilities, length thresholds, and memory bounds.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("{field} out of range: {detail}")]
    OutOfRange { field: &'static str, detail: String },
}

/// Every field has a default, so a config file only needs the values it
/// changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Chance of replying with a filler instead of asking a non-final step.
    pub skip_ask_rate: f64,
    pub name_call_rate: f64,
    pub softener_rate: f64,
    pub recall_rate: f64,
    /// Utterances at most this many chars that hit a trigger are TOPIC_SELECT.
    pub topic_select_max_chars: usize,
    /// Answers longer than this count as side talk.
    pub side_talk_min_chars: usize,
    pub item_max_chars: usize,
    /// Only slot values up to this length are queued for recall.
    pub recall_max_chars: usize,
    pub max_retries: u8,
    /// Confusion and denial never push the retry count past this.
    pub soft_retry_cap: u8,
    pub sticky_capacity: usize,
    pub sticky_ttl: u8,
    pub recent_phrase_limit: usize,
    pub history_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            skip_ask_rate: 0.35,
            name_call_rate: 0.12,
            softener_rate: 0.10,
            recall_rate: 0.15,
            topic_select_max_chars: 12,
            side_talk_min_chars: 40,
            item_max_chars: 20,
            recall_max_chars: 16,
            max_retries: 3,
            soft_retry_cap: 2,
            sticky_capacity: 3,
            sticky_ttl: 4,
            recent_phrase_limit: 2,
            history_limit: 40,
        }
    }
}

impl EngineConfig {
    pub fn load_from_ron(path: &Path) -> Result<EngineConfig, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    pub fn parse_ron(input: &str) -> Result<EngineConfig, ConfigError> {
        let config: EngineConfig = ron::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, rate) in [
            ("skip_ask_rate", self.skip_ask_rate),
            ("name_call_rate", self.name_call_rate),
            ("softener_rate", self.softener_rate),
            ("recall_rate", self.recall_rate),
        ] {
            if !(0.0..=1.0).contains(&rate) {
                return Err(ConfigError::OutOfRange {
                    field,
                    detail: format!("{rate} is not a probability"),
                });
            }
        }
        if !(1..=3).contains(&self.max_retries) {
            return Err(ConfigError::OutOfRange {
                field: "max_retries",
                detail: format!("{} not in 1..=3", self.max_retries),
            });
        }
        if self.soft_retry_cap >= self.max_retries {
            return Err(ConfigError::OutOfRange {
                field: "soft_retry_cap",
                detail: format!(
                    "{} must be below max_retries ({})",
                    self.soft_retry_cap, self.max_retries
                ),
            });
        }
        if !(1..=3).contains(&self.sticky_capacity) {
            return Err(ConfigError::OutOfRange {
                field: "sticky_capacity",
                detail: format!("{} not in 1..=3", self.sticky_capacity),
            });
        }
        if self.sticky_ttl == 0 {
            return Err(ConfigError::OutOfRange {
                field: "sticky_ttl",
                detail: "must be at least 1".to_string(),
            });
        }
        if !(1..=2).contains(&self.recent_phrase_limit) {
            return Err(ConfigError::OutOfRange {
                field: "recent_phrase_limit",
                detail: format!("{} not in 1..=2", self.recent_phrase_limit),
            });
        }
        if self.topic_select_max_chars == 0 || self.side_talk_min_chars == 0 {
            return Err(ConfigError::OutOfRange {
                field: "thresholds",
                detail: "length thresholds must be positive".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = EngineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.sticky_capacity, 3);
        assert!((config.skip_ask_rate - 0.35).abs() < f64::EPSILON);
    }

    #[test]
    fn partial_ron_keeps_defaults() {
        let config = EngineConfig::parse_ron("(skip_ask_rate: 0.0, side_talk_min_chars: 30)").unwrap();
        assert_eq!(config.skip_ask_rate, 0.0);
        assert_eq!(config.side_talk_min_chars, 30);
        assert_eq!(config.history_limit, 40);
    }

    #[test]
    fn rejects_out_of_range() {
        let err = EngineConfig::parse_ron("(name_call_rate: 1.5)").unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { field: "name_call_rate", .. }));

        let err = EngineConfig::parse_ron("(max_retries: 5)").unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { field: "max_retries", .. }));

        let err = EngineConfig::parse_ron("(max_retries: 2, soft_retry_cap: 2)").unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { field: "soft_retry_cap", .. }));

        let err = EngineConfig::parse_ron("(sticky_capacity: 4)").unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { field: "sticky_capacity", .. }));
    }

    #[test]
    fn sample_file_parses() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("dialogue_data/config.ron");
        let config = EngineConfig::load_from_ron(&path).unwrap();
        assert_eq!(config, EngineConfig::default());
    }
}
