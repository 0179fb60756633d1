//! Unified configuration schema for gozero.
//!
//! One YAML file configures the board, the search, self-play episodes, and replay output.
//! Every section except `board` has defaults.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::MAX_BOARD_SIZE;

/// Configuration loading errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Board geometry and komi.
    pub board: BoardConfig,
    /// Search tree settings.
    #[serde(default)]
    pub mcts: MctsConfig,
    /// Self-play episode settings.
    #[serde(default)]
    pub selfplay: SelfplayConfig,
    /// Training data output.
    #[serde(default)]
    pub replay: ReplayConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BoardConfig {
    /// Board side length (2..=25).
    pub size: usize,
    #[serde(default = "default_komi")]
    pub komi: f32,
}

fn default_komi() -> f32 {
    7.5
}

/// Search tree configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MctsConfig {
    /// PUCT exploration constant.
    #[serde(default = "default_c_puct")]
    pub c_puct: f32,
    /// Dirichlet noise alpha for root priors.
    #[serde(default = "default_dirichlet_alpha")]
    pub dirichlet_alpha: f32,
    /// Fraction of noise mixed into root priors.
    #[serde(default = "default_dirichlet_epsilon")]
    pub dirichlet_epsilon: f32,
    /// Value penalty applied to each edge on a pending path.
    #[serde(default = "default_virtual_loss")]
    pub virtual_loss: f32,
    /// Moves before this number are sampled proportionally to visits; later ones greedily.
    ///
    /// If None, derived from the board size.
    #[serde(default)]
    pub softpick_move_cutoff: Option<u32>,
}

fn default_c_puct() -> f32 {
    1.5
}

fn default_dirichlet_alpha() -> f32 {
    0.03
}

fn default_dirichlet_epsilon() -> f32 {
    0.25
}

fn default_virtual_loss() -> f32 {
    1.0
}

impl Default for MctsConfig {
    fn default() -> Self {
        Self {
            c_puct: default_c_puct(),
            dirichlet_alpha: default_dirichlet_alpha(),
            dirichlet_epsilon: default_dirichlet_epsilon(),
            virtual_loss: default_virtual_loss(),
            softpick_move_cutoff: None,
        }
    }
}

/// Self-play configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SelfplayConfig {
    /// Additional root visits per move.
    #[serde(default = "default_readouts")]
    pub readouts: u32,
    /// Resign when the root value for the side to move drops below this. None disables.
    #[serde(default = "default_resign_threshold")]
    pub resign_threshold: Option<f32>,
    /// Probability that a game is played out with resignation disabled.
    #[serde(default = "default_resign_disable_prob")]
    pub resign_disable_prob: f64,
    /// Leaves gathered per evaluator call.
    #[serde(default = "default_parallel_batch_size")]
    pub parallel_batch_size: u32,
    /// Diagnostic output level (0 = quiet).
    #[serde(default)]
    pub verbosity: u8,
    /// Hard cap on game length. If None, `2 * size * size`.
    #[serde(default)]
    pub max_game_length: Option<u32>,
    /// Number of games to play.
    #[serde(default = "default_games")]
    pub games: u32,
    /// Episodes played in parallel.
    #[serde(default = "default_threads")]
    pub threads: u32,
    /// Base seed; each game derives its own stream from it.
    #[serde(default)]
    pub seed: u64,
}

fn default_readouts() -> u32 {
    100
}

fn default_resign_threshold() -> Option<f32> {
    Some(-0.9)
}

fn default_resign_disable_prob() -> f64 {
    0.05
}

fn default_parallel_batch_size() -> u32 {
    8
}

fn default_games() -> u32 {
    1
}

fn default_threads() -> u32 {
    1
}

impl Default for SelfplayConfig {
    fn default() -> Self {
        Self {
            readouts: default_readouts(),
            resign_threshold: default_resign_threshold(),
            resign_disable_prob: default_resign_disable_prob(),
            parallel_batch_size: default_parallel_batch_size(),
            verbosity: 0,
            max_game_length: None,
            games: default_games(),
            threads: default_threads(),
            seed: 0,
        }
    }
}

/// Replay output configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReplayConfig {
    /// Samples buffered before a shard is written.
    #[serde(default = "default_max_samples_per_shard")]
    pub max_samples_per_shard: usize,
}

fn default_max_samples_per_shard() -> usize {
    4096
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            max_samples_per_shard: default_max_samples_per_shard(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Board-level sanity checks. Search and episode limits are checked by the crates that
    /// own them.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(2..=MAX_BOARD_SIZE).contains(&self.board.size) {
            return Err(ConfigError::Invalid(format!(
                "board.size must be in 2..={MAX_BOARD_SIZE}, got {}",
                self.board.size
            )));
        }
        if !self.board.komi.is_finite() {
            return Err(ConfigError::Invalid("board.komi must be finite".into()));
        }
        if self.replay.max_samples_per_shard == 0 {
            return Err(ConfigError::Invalid(
                "replay.max_samples_per_shard must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// Soft-pick cutoff, defaulting to roughly a twelfth of the board rounded down to even.
    pub fn softpick_move_cutoff(&self) -> u32 {
        self.mcts
            .softpick_move_cutoff
            .unwrap_or_else(|| default_softpick_cutoff(self.board.size))
    }

    pub fn max_game_length(&self) -> u32 {
        self.selfplay
            .max_game_length
            .unwrap_or_else(|| default_max_game_length(self.board.size))
    }
}

pub fn default_softpick_cutoff(size: usize) -> u32 {
    ((size * size / 12) / 2 * 2) as u32
}

pub fn default_max_game_length(size: usize) -> u32 {
    (2 * size * size) as u32
}

impl Default for Config {
    fn default() -> Self {
        Self {
            board: BoardConfig {
                size: 9,
                komi: default_komi(),
            },
            mcts: MctsConfig::default(),
            selfplay: SelfplayConfig::default(),
            replay: ReplayConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_repo_config() {
        let config = Config::load("../configs/selfplay_9x9.yaml")
            .expect("Failed to load configs/selfplay_9x9.yaml");

        assert_eq!(config.board.size, 9);
        assert_eq!(config.board.komi, 7.5);
        assert_eq!(config.selfplay.readouts, 200);
        assert_eq!(config.selfplay.parallel_batch_size, 8);
        assert_eq!(config.selfplay.resign_threshold, Some(-0.9));
        assert_eq!(config.replay.max_samples_per_shard, 2048);
    }

    #[test]
    fn test_parse_minimal_yaml_applies_defaults() {
        let yaml = r#"
board:
  size: 19
"#;
        let config = Config::from_yaml(yaml).expect("Failed to parse YAML");
        assert_eq!(config.board.komi, 7.5);
        assert_eq!(config.mcts.c_puct, 1.5);
        assert_eq!(config.mcts.dirichlet_alpha, 0.03);
        assert_eq!(config.selfplay.resign_disable_prob, 0.05);
        assert_eq!(config.softpick_move_cutoff(), 30);
        assert_eq!(config.max_game_length(), 722);
    }

    #[test]
    fn test_null_resign_threshold_disables() {
        let yaml = r#"
board:
  size: 5
selfplay:
  resign_threshold: null
  readouts: 8
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.selfplay.resign_threshold, None);
        assert_eq!(config.selfplay.readouts, 8);
    }

    #[test]
    fn test_bad_board_size_is_rejected() {
        let err = Config::from_yaml("board:\n  size: 40\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_invalid_yaml_fails() {
        let invalid_yaml = "this is not: valid: yaml: {{{}}}";
        let result = Config::from_yaml(invalid_yaml);
        assert!(result.is_err());
    }
}
