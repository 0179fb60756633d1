//! Self-play runtime: the per-game episode driver and the parallel episode runner.

pub mod episode;
pub mod scheduler;

pub use episode::{
    play_episode, Episode, EpisodeConfig, EpisodeDriver, EpisodeError, EpisodeStats,
    EpisodeStatus, GameRecord, RecordedMove, ResignPolicy, StepResult,
};
pub use scheduler::{
    game_seed, run_episodes, RunPlan, SchedulerError, SchedulerStats, SinkError,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
