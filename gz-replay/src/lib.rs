//! gz-replay: safetensors shards of self-play training samples.
//!
//! Layout of a replay directory:
//! - `shard_NNNNNN.safetensors` with tensors `pi [n, A]`, `value [n]`, `z [n]`
//! - `shard_NNNNNN.meta.json` describing the shard

pub mod schema;
pub mod writer;

pub use writer::{
    cleanup_tmp_files, next_shard_idx, samples_from_episode, ReplayError, ReplaySample,
    ShardMeta, ShardWriter, ShardWriterConfig,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
