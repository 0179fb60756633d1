//! gz-logging: run bookkeeping for self-play.
//!
//! - `run.json` manifest, replaced atomically
//! - NDJSON event log, one object per line
//! - a stderr backend for the `log` facade

pub mod events;
pub mod manifest;
pub mod ndjson;
pub mod stderr;

pub use events::{EpisodeEvent, Event, MoveEvent, PiStats, SchemaTag};
pub use manifest::{
    blake3_hex, git_commit, unix_ms, BoardInfo, RunManifest, RunProgress, RUN_MANIFEST_VERSION,
};
pub use ndjson::{read_events, EventLog};
pub use stderr::{init_stderr_logger, level_for_verbosity};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LogError {
    #[error("log file i/o: {0}")]
    Io(#[from] std::io::Error),
    #[error("log encoding: {0}")]
    Json(#[from] serde_json::Error),
}

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
