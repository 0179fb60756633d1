//! Parallel self-play: independent episodes on a rayon pool.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver};

use gz_core::Position;
use gz_mcts::{Evaluator, MctsConfig};
use rand_chacha::ChaCha8Rng;
use rand_core::SeedableRng;
use rayon::ThreadPoolBuilder;
use thiserror::Error;

use crate::episode::{play_episode, Episode, EpisodeConfig, EpisodeError, EpisodeStatus};

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
    #[error("game {game_id}: {source}")]
    Episode {
        game_id: u64,
        #[source]
        source: EpisodeError,
    },
    #[error("game {game_id}: writing results failed: {source}")]
    Sink {
        game_id: u64,
        #[source]
        source: SinkError,
    },
}

#[derive(Debug, Default, Clone)]
pub struct SchedulerStats {
    pub games: u64,
    pub moves: u64,
    pub resigned: u64,
    pub resign_disabled: u64,
    pub capped: u64,
    pub black_wins: u64,
    pub white_wins: u64,
}

impl SchedulerStats {
    pub fn record(&mut self, ep: &Episode) {
        self.games += 1;
        self.moves += u64::from(ep.stats.moves);
        if matches!(ep.status, EpisodeStatus::Resigned { .. }) {
            self.resigned += 1;
        }
        if ep.policy == crate::ResignPolicy::Disabled {
            self.resign_disabled += 1;
        }
        if ep.stats.move_cap_reached {
            self.capped += 1;
        }
        match ep.status.winner() {
            Some(gz_core::Color::Black) => self.black_wins += 1,
            Some(gz_core::Color::White) => self.white_wins += 1,
            None => {}
        }
    }
}

/// Seed for game `game_id` of a run seeded with `base`.
pub fn game_seed(base: u64, game_id: u64) -> u64 {
    base ^ game_id.wrapping_mul(0x9E37_79B9_7F4A_7C15) ^ 0xD1E7_C437_9E37_79B9
}

/// Which games a call to [`run_episodes`] plays.
#[derive(Debug, Clone, Copy)]
pub struct RunPlan {
    /// Id of the first game; a resumed run continues where the last one stopped.
    pub first_game: u64,
    pub games: u32,
    pub threads: usize,
    pub base_seed: u64,
}

/// Play the games of `plan` from `start` on `plan.threads` workers, handing each finished
/// episode to `sink` on the calling thread.
///
/// Episodes reach the sink in game-id order as soon as all earlier ones have been delivered.
/// The first failing game or sink call stops the run; games already in flight still finish
/// but are dropped. Returns the number of episodes delivered.
pub fn run_episodes<E, F>(
    evaluator: &E,
    tree_cfg: MctsConfig,
    start: &Position,
    episode_cfg: &EpisodeConfig,
    plan: RunPlan,
    mut sink: F,
) -> Result<u64, SchedulerError>
where
    E: Evaluator + Sync + ?Sized,
    F: FnMut(u64, Episode) -> Result<(), SinkError>,
{
    episode_cfg
        .validate()
        .map_err(|source| SchedulerError::Episode {
            game_id: plan.first_game,
            source,
        })?;

    let workers = plan.threads.max(1);
    let pool = ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|idx| format!("gz-selfplay-{idx}"))
        .build()?;

    let end = plan.first_game + u64::from(plan.games);
    let next = AtomicU64::new(plan.first_game);
    let stop = AtomicBool::new(false);
    let (tx, rx) = mpsc::sync_channel::<Finished>(workers);

    pool.in_place_scope(|s| {
        for _ in 0..workers {
            let tx = tx.clone();
            let (next, stop) = (&next, &stop);
            s.spawn(move |_| {
                while !stop.load(Ordering::Relaxed) {
                    let game_id = next.fetch_add(1, Ordering::Relaxed);
                    if game_id >= end {
                        break;
                    }
                    let rng = ChaCha8Rng::seed_from_u64(game_seed(plan.base_seed, game_id));
                    let res =
                        play_episode(evaluator, tree_cfg, start.clone(), episode_cfg.clone(), rng);
                    if tx.send((game_id, res)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(tx);
        deliver(rx, plan.first_game, &stop, &mut sink)
    })
}

pub type SinkError = Box<dyn std::error::Error + Send + Sync>;

type Finished = (u64, Result<Episode, EpisodeError>);

/// Hand episodes to `sink` in id order, parking the ones that finish early.
///
/// Returning drops `rx`, which makes the workers stop at their next send.
fn deliver<F>(
    rx: Receiver<Finished>,
    first: u64,
    stop: &AtomicBool,
    sink: &mut F,
) -> Result<u64, SchedulerError>
where
    F: FnMut(u64, Episode) -> Result<(), SinkError>,
{
    let mut parked = BTreeMap::new();
    let mut expected = first;
    for (game_id, res) in rx {
        match res {
            Ok(ep) => {
                parked.insert(game_id, ep);
            }
            Err(source) => {
                stop.store(true, Ordering::Relaxed);
                return Err(SchedulerError::Episode { game_id, source });
            }
        }
        while let Some(ep) = parked.remove(&expected) {
            if let Err(source) = sink(expected, ep) {
                stop.store(true, Ordering::Relaxed);
                return Err(SchedulerError::Sink {
                    game_id: expected,
                    source,
                });
            }
            expected += 1;
        }
    }
    Ok(expected - first)
}
