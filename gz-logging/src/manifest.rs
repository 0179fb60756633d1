//! `run.json`: identity, provenance and progress of one self-play run.

use std::fs;
use std::path::Path;
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::LogError;

pub const RUN_MANIFEST_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoardInfo {
    pub size: usize,
    pub komi: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunProgress {
    pub games_completed: u64,
    pub samples_written: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub created_unix_ms: u64,

    pub protocol_version: u32,
    pub action_space: String,
    pub ruleset: String,
    pub board: BoardInfo,

    /// `git rev-parse HEAD` of the working directory, when available.
    pub git_commit: Option<String>,
    /// blake3 of the config file bytes.
    pub config_blake3: Option<String>,
    pub seed: u64,

    pub progress: RunProgress,
}

impl RunManifest {
    /// Load `path`, or None if there is no manifest yet.
    pub fn load(path: &Path) -> Result<Option<Self>, LogError> {
        match fs::read(path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Write through a sibling temp file so readers never see a torn manifest.
    pub fn save(&self, path: &Path) -> Result<(), LogError> {
        let staged = path.with_extension("json.tmp");
        fs::write(&staged, serde_json::to_vec_pretty(self)?)?;
        fs::rename(&staged, path)?;
        Ok(())
    }

    /// Continue an earlier run in the same directory.
    pub fn resume(&mut self, earlier: RunManifest) {
        self.run_id = earlier.run_id;
        self.created_unix_ms = earlier.created_unix_ms;
        self.progress = earlier.progress;
    }

    pub fn record_game(&mut self, samples: u64) {
        self.progress.games_completed += 1;
        self.progress.samples_written += samples;
    }
}

pub fn unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

pub fn blake3_hex(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

pub fn git_commit() -> Option<String> {
    let out = Command::new("git")
        .args(["rev-parse", "--verify", "HEAD"])
        .output()
        .ok()
        .filter(|o| o.status.success())?;
    let rev = String::from_utf8(out.stdout).ok()?;
    Some(rev.trim().to_owned()).filter(|r| !r.is_empty())
}
