//! Append-only newline-delimited JSON.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;
use serde_json::Value;

use crate::LogError;

/// Buffered NDJSON appender. Each `append` writes exactly one line.
pub struct EventLog {
    out: BufWriter<File>,
    unflushed: u64,
    flush_every: u64,
}

impl EventLog {
    /// Open (or create) `path` for appending. Lines reach disk on `flush` or drop.
    pub fn open(path: &Path) -> Result<Self, LogError> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            out: BufWriter::new(file),
            unflushed: 0,
            flush_every: 0,
        })
    }

    /// Also flush after every `lines` appended lines (0 turns this off).
    pub fn flush_every(mut self, lines: u64) -> Self {
        self.flush_every = lines;
        self
    }

    pub fn append<T: Serialize>(&mut self, record: &T) -> Result<(), LogError> {
        serde_json::to_writer(&mut self.out, record)?;
        self.out.write_all(b"\n")?;
        self.unflushed += 1;
        if self.flush_every != 0 && self.unflushed >= self.flush_every {
            self.flush()?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), LogError> {
        self.out.flush()?;
        self.unflushed = 0;
        Ok(())
    }
}

/// Parse every complete line of an NDJSON file. A torn last line is skipped.
pub fn read_events(path: &Path) -> Result<Vec<Value>, LogError> {
    let text = fs::read_to_string(path)?;
    Ok(text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .filter_map(|l| serde_json::from_str(l).ok())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EpisodeEvent, Event, MoveEvent, PiStats, SchemaTag};

    const SCHEMA: SchemaTag = SchemaTag {
        protocol_version: 1,
        action_space: "go_points_then_pass_v1",
        ruleset: "tromp_taylor_simple_ko_v1",
    };

    #[test]
    fn events_are_tagged_one_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("selfplay.ndjson");
        let mut log = EventLog::open(&path).unwrap();
        log.append(&Event::Move(MoveEvent {
            ts_ms: 1,
            schema: SCHEMA,
            run_id: "r".into(),
            game_id: 3,
            move_number: 0,
            to_play: "B".into(),
            mv: "E5".into(),
            raw_value: -0.25,
            pi: PiStats::of(&[0.25, 0.75, 0.0]),
        }))
        .unwrap();
        log.append(&Event::Episode(EpisodeEvent {
            ts_ms: 2,
            schema: SCHEMA,
            run_id: "r".into(),
            game_id: 3,
            moves: 1,
            result: "W+R".into(),
            resigned: true,
            resign_disabled: false,
            move_cap_reached: false,
            leaves_evaluated: 10,
            eval_batches: 2,
            collisions: 0,
            search_ms: 5,
        }))
        .unwrap();
        log.flush().unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);
        let vals = read_events(&path).unwrap();
        assert_eq!(vals[0]["event"], "move");
        assert_eq!(vals[0]["mv"], "E5");
        assert_eq!(vals[0]["pi"]["argmax"], 1);
        assert_eq!(vals[0]["schema"]["ruleset"], "tromp_taylor_simple_ko_v1");
        assert_eq!(vals[1]["event"], "episode");
        assert_eq!(vals[1]["result"], "W+R");
    }

    #[test]
    fn torn_tail_is_skipped_and_appends_continue() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("e.ndjson");
        {
            let mut log = EventLog::open(&path).unwrap().flush_every(1);
            log.append(&serde_json::json!({"x": 1})).unwrap();
        }
        let mut f = OpenOptions::new().append(true).open(&path).unwrap();
        f.write_all(br#"{"x":"#).unwrap();
        drop(f);

        let vals = read_events(&path).unwrap();
        assert_eq!(vals.len(), 1);
        assert_eq!(vals[0]["x"], 1);
    }
}
