//! Shard writer: buffers samples column by column and flushes fixed-size safetensors files.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use gz_runtime::Episode;
use safetensors::tensor::{Dtype, TensorView};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::schema::{ACTION_SPACE_ID, PROTOCOL_VERSION, RULESET_ID, T_PI, T_VALUE, T_Z};

const TENSOR_EXT: &str = "safetensors";
const META_EXT: &str = "meta.json";
const STAGING_SUFFIX: &str = ".tmp";

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("replay i/o: {0}")]
    Io(#[from] std::io::Error),
    #[error("shard metadata: {0}")]
    Meta(#[from] serde_json::Error),
    #[error("tensor encoding: {0}")]
    Tensor(#[from] safetensors::SafeTensorError),
    #[error("rejected sample: {0}")]
    BadSample(String),
    #[error("bad writer config: {0}")]
    BadConfig(&'static str),
}

/// One training position: search policy, raw network value, and final result.
#[derive(Clone, Debug, PartialEq)]
pub struct ReplaySample {
    /// Visit distribution, length `size*size + 1`.
    pub pi: Vec<f32>,
    /// Evaluator value of the position, POV of the side to move.
    pub value: f32,
    /// Game result from the same POV: +1 win, -1 loss, 0 jigo.
    pub z: f32,
}

/// Turn a finished episode into samples, one per played move.
///
/// A resigned game counts as a loss for the side that resigned.
pub fn samples_from_episode(ep: &Episode) -> Vec<ReplaySample> {
    let winner = ep.status.winner();
    ep.record
        .iter()
        .map(|m| ReplaySample {
            pi: m.pi.clone(),
            value: m.value,
            z: match winner {
                None => 0.0,
                Some(w) if w == m.to_play => 1.0,
                Some(_) => -1.0,
            },
        })
        .collect()
}

/// Sidecar JSON written next to every shard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShardMeta {
    pub protocol_version: u32,
    pub action_space: String,
    pub num_actions: usize,
    pub ruleset: String,
    pub board_size: usize,
    pub komi: f32,
    pub samples: usize,
    pub config_blake3: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ShardWriterConfig {
    pub dir: PathBuf,
    pub board_size: usize,
    pub komi: f32,
    /// A shard is written as soon as this many samples are buffered.
    pub shard_samples: usize,
    pub config_blake3: Option<String>,
}

pub struct ShardWriter {
    cfg: ShardWriterConfig,
    num_actions: usize,
    next_idx: u64,
    pi: Vec<f32>,
    value: Vec<f32>,
    z: Vec<f32>,
}

impl ShardWriter {
    /// Open `dir`, continuing after the highest shard index already there.
    pub fn new(cfg: ShardWriterConfig) -> Result<Self, ReplayError> {
        if cfg.shard_samples == 0 {
            return Err(ReplayError::BadConfig("shard_samples must be > 0"));
        }
        if cfg.board_size == 0 {
            return Err(ReplayError::BadConfig("board_size must be > 0"));
        }
        fs::create_dir_all(&cfg.dir)?;
        let next_idx = next_shard_idx(&cfg.dir)?;
        Ok(Self {
            num_actions: gz_core::action_space(cfg.board_size),
            next_idx,
            pi: Vec::new(),
            value: Vec::new(),
            z: Vec::new(),
            cfg,
        })
    }

    /// Index the next written shard will get.
    pub fn shard_idx(&self) -> u64 {
        self.next_idx
    }

    /// Samples waiting for the next shard.
    pub fn buffered(&self) -> usize {
        self.value.len()
    }

    pub fn push(&mut self, s: ReplaySample) -> Result<(), ReplayError> {
        if s.pi.len() != self.num_actions {
            return Err(ReplayError::BadSample(format!(
                "pi has {} entries, board needs {}",
                s.pi.len(),
                self.num_actions
            )));
        }
        let finite = s.value.is_finite() && s.z.is_finite() && s.pi.iter().all(|p| p.is_finite());
        if !finite {
            return Err(ReplayError::BadSample("non-finite number".into()));
        }
        self.pi.extend_from_slice(&s.pi);
        self.value.push(s.value);
        self.z.push(s.z);
        if self.buffered() >= self.cfg.shard_samples {
            self.flush()?;
        }
        Ok(())
    }

    /// Push every sample of a finished game; returns how many were added.
    pub fn write_episode(&mut self, ep: &Episode) -> Result<usize, ReplayError> {
        let samples = samples_from_episode(ep);
        let n = samples.len();
        for s in samples {
            self.push(s)?;
        }
        Ok(n)
    }

    /// Write the buffered samples as one shard. No-op when nothing is buffered.
    pub fn flush(&mut self) -> Result<(), ReplayError> {
        let n = self.buffered();
        if n == 0 {
            return Ok(());
        }

        let columns = [
            (T_PI, vec![n, self.num_actions], &self.pi),
            (T_VALUE, vec![n], &self.value),
            (T_Z, vec![n], &self.z),
        ];
        let mut views = BTreeMap::new();
        for (name, shape, data) in columns {
            let view = TensorView::new(Dtype::F32, shape, bytemuck::cast_slice(data.as_slice()))?;
            views.insert(name.to_string(), view);
        }
        let tensors = safetensors::serialize(&views, &None)?;

        let meta = ShardMeta {
            protocol_version: PROTOCOL_VERSION,
            action_space: ACTION_SPACE_ID.to_string(),
            num_actions: self.num_actions,
            ruleset: RULESET_ID.to_string(),
            board_size: self.cfg.board_size,
            komi: self.cfg.komi,
            samples: n,
            config_blake3: self.cfg.config_blake3.clone(),
        };

        // Tensors first: a shard only counts once its meta file exists.
        write_staged(&self.shard_path(TENSOR_EXT), &tensors)?;
        write_staged(&self.shard_path(META_EXT), &serde_json::to_vec_pretty(&meta)?)?;

        self.next_idx += 1;
        self.pi.clear();
        self.value.clear();
        self.z.clear();
        Ok(())
    }

    /// Flush the partial shard, if any.
    pub fn finish(mut self) -> Result<(), ReplayError> {
        self.flush()
    }

    fn shard_path(&self, ext: &str) -> PathBuf {
        shard_path(&self.cfg.dir, self.next_idx, ext)
    }
}

fn shard_path(dir: &Path, idx: u64, ext: &str) -> PathBuf {
    dir.join(format!("shard_{idx:06}.{ext}"))
}

fn write_staged(path: &Path, bytes: &[u8]) -> Result<(), ReplayError> {
    let mut staged = path.as_os_str().to_owned();
    staged.push(STAGING_SUFFIX);
    fs::write(&staged, bytes)?;
    fs::rename(&staged, path)?;
    Ok(())
}

fn shard_index(file_name: &str) -> Option<u64> {
    file_name
        .strip_prefix("shard_")?
        .strip_suffix(".safetensors")?
        .parse()
        .ok()
}

/// One past the highest `shard_NNNNNN.safetensors` index in `dir` (0 if none).
pub fn next_shard_idx(dir: &Path) -> Result<u64, ReplayError> {
    if !dir.exists() {
        return Ok(0);
    }
    let mut next = 0;
    for entry in fs::read_dir(dir)? {
        let name = entry?.file_name();
        if let Some(idx) = name.to_str().and_then(shard_index) {
            next = next.max(idx + 1);
        }
    }
    Ok(next)
}

/// Remove staging files left by an interrupted flush. Returns how many were removed.
pub fn cleanup_tmp_files(dir: &Path) -> Result<usize, ReplayError> {
    if !dir.exists() {
        return Ok(0);
    }
    let mut removed = 0;
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let staged = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("shard_") && n.ends_with(STAGING_SUFFIX));
        if staged && fs::remove_file(&path).is_ok() {
            removed += 1;
        }
    }
    Ok(removed)
}
