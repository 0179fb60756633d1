//! Event records written to `logs/selfplay.ndjson`.

use serde::Serialize;

/// Schema ids stamped on every event.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SchemaTag {
    pub protocol_version: u32,
    pub action_space: &'static str,
    pub ruleset: &'static str,
}

/// Shape of a visit distribution, cheap enough to log for every move.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PiStats {
    /// Shannon entropy in nats.
    pub entropy: f32,
    pub max_p: f32,
    /// Action index of `max_p`; lowest index on ties.
    pub argmax: u32,
}

impl PiStats {
    pub fn of(pi: &[f32]) -> Self {
        let entropy = pi
            .iter()
            .filter(|&&p| p > 0.0)
            .map(|&p| -p * p.ln())
            .sum();
        let (argmax, max_p) = pi
            .iter()
            .copied()
            .enumerate()
            .fold((0, 0.0f32), |best, (a, p)| if p > best.1 { (a, p) } else { best });
        Self {
            entropy,
            max_p,
            argmax: argmax as u32,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MoveEvent {
    pub ts_ms: u64,
    pub schema: SchemaTag,
    pub run_id: String,
    pub game_id: u64,
    pub move_number: u32,
    /// "B" or "W".
    pub to_play: String,
    /// Human coordinate ("D4", "pass").
    pub mv: String,
    pub raw_value: f32,
    pub pi: PiStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct EpisodeEvent {
    pub ts_ms: u64,
    pub schema: SchemaTag,
    pub run_id: String,
    pub game_id: u64,
    pub moves: u32,
    /// "B+R", "W+3.5", "0".
    pub result: String,
    pub resigned: bool,
    pub resign_disabled: bool,
    pub move_cap_reached: bool,
    pub leaves_evaluated: u64,
    pub eval_batches: u64,
    pub collisions: u64,
    pub search_ms: u64,
}

/// One NDJSON line; the variant name lands in the `event` field.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    Move(MoveEvent),
    Episode(EpisodeEvent),
}
