//! Self-play episode driver.
//!
//! One driver plays one game against itself:
//! - the root is primed with a single evaluation when the driver is built
//! - every move injects root noise once, then runs `readouts` additional visits in batches
//! - the resignation policy is drawn once per game and never changes
//! - each played move appends `(pi, raw root value)` to the game record

use std::time::{Duration, Instant};

use gz_core::scoring::resign_notation;
use gz_core::{move_to_human, Color, GameOutcome, Move, Position};
use gz_mcts::{
    EvalError, Evaluator, LeafSelection, Mcts, MctsConfig, MctsError, SearchTree,
};
use log::{debug, info};
use rand::Rng;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EpisodeError {
    #[error("invalid episode config: {0}")]
    InvalidConfig(String),
    #[error("search failed: {0}")]
    Search(#[from] MctsError),
    #[error("evaluation failed: {0}")]
    Eval(#[from] EvalError),
}

/// Per-episode settings.
#[derive(Debug, Clone)]
pub struct EpisodeConfig {
    /// Additional root visits per move.
    pub readouts: u32,
    /// Resign below this root value. None disables resignation for every game.
    pub resign_threshold: Option<f32>,
    /// Upper bound on leaves gathered for one evaluator call.
    pub parallel_batch_size: u32,
    /// 0 = quiet, 1 = every 10th move, 2 = every move, 3 = board and tree too.
    pub verbosity: u8,
    /// Probability that resignation is disabled for a whole game.
    pub resign_disable_prob: f64,
    /// Game ends after this many moves. None means `2 * size * size`.
    pub max_game_length: Option<u32>,
}

impl Default for EpisodeConfig {
    fn default() -> Self {
        Self {
            readouts: 100,
            resign_threshold: Some(-0.9),
            parallel_batch_size: 8,
            verbosity: 0,
            resign_disable_prob: 0.05,
            max_game_length: None,
        }
    }
}

impl EpisodeConfig {
    pub fn from_config(cfg: &gz_core::Config) -> Self {
        Self {
            readouts: cfg.selfplay.readouts,
            resign_threshold: cfg.selfplay.resign_threshold,
            parallel_batch_size: cfg.selfplay.parallel_batch_size,
            verbosity: cfg.selfplay.verbosity,
            resign_disable_prob: cfg.selfplay.resign_disable_prob,
            max_game_length: Some(cfg.max_game_length()),
        }
    }

    pub fn validate(&self) -> Result<(), EpisodeError> {
        if self.readouts == 0 {
            return Err(EpisodeError::InvalidConfig("readouts must be > 0".into()));
        }
        if self.parallel_batch_size == 0 {
            return Err(EpisodeError::InvalidConfig(
                "parallel_batch_size must be > 0".into(),
            ));
        }
        if let Some(t) = self.resign_threshold {
            if !(t.is_finite() && (-1.0..0.0).contains(&t)) {
                return Err(EpisodeError::InvalidConfig(format!(
                    "resign_threshold must be in [-1, 0), got {t}"
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.resign_disable_prob) {
            return Err(EpisodeError::InvalidConfig(format!(
                "resign_disable_prob must be in [0, 1], got {}",
                self.resign_disable_prob
            )));
        }
        if self.max_game_length == Some(0) {
            return Err(EpisodeError::InvalidConfig(
                "max_game_length must be > 0".into(),
            ));
        }
        Ok(())
    }
}

/// Resignation rule for one game, fixed at the start.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResignPolicy {
    Enabled { threshold: f32 },
    Disabled,
}

impl ResignPolicy {
    /// Always consumes one draw from `rng`, so seeded runs stay aligned whatever the threshold.
    pub fn decide<R: Rng + ?Sized>(threshold: Option<f32>, disable_prob: f64, rng: &mut R) -> Self {
        let disabled = rng.gen_bool(disable_prob.clamp(0.0, 1.0));
        match threshold {
            Some(threshold) if !disabled => ResignPolicy::Enabled { threshold },
            _ => ResignPolicy::Disabled,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EpisodeStatus {
    InProgress,
    Resigned { by: Color },
    Finished { outcome: GameOutcome },
}

impl EpisodeStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, EpisodeStatus::InProgress)
    }

    pub fn winner(&self) -> Option<Color> {
        match self {
            EpisodeStatus::InProgress => None,
            EpisodeStatus::Resigned { by } => Some(by.opponent()),
            EpisodeStatus::Finished { outcome } => outcome.winner,
        }
    }

    /// Game result in SGF notation ("B+R", "W+3.5", "0"); None while the game runs.
    pub fn notation(&self) -> Option<String> {
        match self {
            EpisodeStatus::InProgress => None,
            EpisodeStatus::Resigned { by } => Some(resign_notation(by.opponent())),
            EpisodeStatus::Finished { outcome } => Some(outcome.notation()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedMove {
    pub mv: Move,
    /// Visit distribution over all actions at the time of the move.
    pub pi: Vec<f32>,
    /// Evaluator value of the root, POV of `to_play`.
    pub value: f32,
    pub to_play: Color,
}

/// Append-only training record, one entry per played move.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GameRecord {
    moves: Vec<RecordedMove>,
}

impl From<Vec<RecordedMove>> for GameRecord {
    fn from(moves: Vec<RecordedMove>) -> Self {
        Self { moves }
    }
}

impl GameRecord {
    fn push(&mut self, m: RecordedMove) {
        self.moves.push(m);
    }

    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    pub fn moves(&self) -> &[RecordedMove] {
        &self.moves
    }

    pub fn iter(&self) -> impl Iterator<Item = &RecordedMove> {
        self.moves.iter()
    }
}

#[derive(Debug, Default, Clone)]
pub struct EpisodeStats {
    pub moves: u32,
    pub leaves_evaluated: u64,
    pub eval_batches: u64,
    pub collisions: u64,
    pub terminal_leaves: u64,
    pub move_cap_reached: bool,
    pub search_time: Duration,
}

#[derive(Debug)]
pub struct StepResult {
    pub status: EpisodeStatus,
    /// The move played this step; None on resignation or on an already finished episode.
    pub played: Option<Move>,
    /// Root visits added by this step's search.
    pub readouts: u32,
}

#[derive(Debug)]
pub struct Episode {
    pub final_position: Position,
    pub record: GameRecord,
    pub status: EpisodeStatus,
    pub policy: ResignPolicy,
    pub stats: EpisodeStats,
}

pub struct EpisodeDriver<T: SearchTree, R: Rng> {
    tree: T,
    cfg: EpisodeConfig,
    rng: R,
    policy: ResignPolicy,
    max_game_length: u32,
    record: GameRecord,
    status: EpisodeStatus,
    stats: EpisodeStats,
}

impl<T: SearchTree, R: Rng> EpisodeDriver<T, R> {
    /// Validate `cfg`, draw the resignation policy and prime the root with one evaluation.
    pub fn new<E: Evaluator + ?Sized>(
        tree: T,
        cfg: EpisodeConfig,
        mut rng: R,
        evaluator: &E,
    ) -> Result<Self, EpisodeError> {
        cfg.validate()?;
        let policy = ResignPolicy::decide(cfg.resign_threshold, cfg.resign_disable_prob, &mut rng);
        let size = tree.root_position().size();
        let max_game_length = cfg
            .max_game_length
            .unwrap_or_else(|| gz_core::config::default_max_game_length(size));

        let mut driver = Self {
            tree,
            cfg,
            rng,
            policy,
            max_game_length,
            record: GameRecord::default(),
            status: EpisodeStatus::InProgress,
            stats: EpisodeStats::default(),
        };
        if policy == ResignPolicy::Disabled && driver.cfg.resign_threshold.is_some() {
            debug!("resignation disabled for this game");
        }

        let root = driver.tree.root_position();
        if root.is_game_over() {
            driver.status = EpisodeStatus::Finished {
                outcome: root.result(),
            };
            return Ok(driver);
        }
        // Noise needs expanded root priors, so the first move's injection requires this.
        if !driver.tree.is_root_expanded() {
            driver.search_round(evaluator, 1)?;
        }
        Ok(driver)
    }

    pub fn status(&self) -> EpisodeStatus {
        self.status
    }

    pub fn policy(&self) -> ResignPolicy {
        self.policy
    }

    pub fn record(&self) -> &GameRecord {
        &self.record
    }

    pub fn stats(&self) -> &EpisodeStats {
        &self.stats
    }

    pub fn tree(&self) -> &T {
        &self.tree
    }

    pub fn position(&self) -> &Position {
        self.tree.root_position()
    }

    /// Search, then resign or play one move.
    pub fn step<E: Evaluator + ?Sized>(&mut self, evaluator: &E) -> Result<StepResult, EpisodeError> {
        if self.status.is_terminal() {
            return Ok(StepResult {
                status: self.status,
                played: None,
                readouts: 0,
            });
        }

        let start = Instant::now();
        self.tree.inject_noise(&mut self.rng);
        let n0 = self.tree.root_visits();
        let target = n0.saturating_add(self.cfg.readouts);
        while self.tree.root_visits() < target {
            let want = (target - self.tree.root_visits()).min(self.cfg.parallel_batch_size);
            self.search_round(evaluator, want)?;
        }
        let readouts = self.tree.root_visits() - n0;

        if self.cfg.verbosity >= 3 {
            info!("\n{}", self.tree.root_position());
            info!("\n{}", self.tree.describe());
        }

        let pos = self.tree.root_position();
        let to_play = pos.to_play();
        let size = pos.size();
        if let ResignPolicy::Enabled { threshold } = self.policy {
            if self.tree.should_resign(threshold) {
                if self.cfg.verbosity >= 1 {
                    info!(
                        "{} resigns at move {} (Q {:.5} < {threshold})",
                        to_play,
                        pos.n(),
                        self.tree.root_q()
                    );
                }
                self.status = EpisodeStatus::Resigned { by: to_play };
                self.stats.search_time += start.elapsed();
                return Ok(StepResult {
                    status: self.status,
                    played: None,
                    readouts,
                });
            }
        }

        let squash = pos.n() < self.tree.softpick_move_cutoff();
        let pi = self.tree.children_as_pi(squash);
        let value = self.tree.root_raw_value();
        let mv = self.tree.pick_move(&mut self.rng);
        self.tree.play_move(mv)?;
        self.record.push(RecordedMove {
            mv,
            pi,
            value,
            to_play,
        });
        self.stats.moves += 1;

        let pos = self.tree.root_position();
        if pos.is_game_over() {
            self.status = EpisodeStatus::Finished {
                outcome: pos.result(),
            };
        } else if pos.n() >= self.max_game_length {
            self.stats.move_cap_reached = true;
            self.status = EpisodeStatus::Finished {
                outcome: pos.result(),
            };
        }

        let dur = start.elapsed();
        self.stats.search_time += dur;
        let n = pos.n();
        if self.cfg.verbosity >= 2 || (self.cfg.verbosity >= 1 && n % 10 == 9) {
            info!("Q: {:.5}", self.tree.root_q());
            info!(
                "{}: {} readouts, {:.3} s/100. ({:.2} sec)",
                n,
                readouts,
                dur.as_secs_f64() / f64::from(readouts.max(1)) * 100.0,
                dur.as_secs_f64()
            );
        }
        if self.cfg.verbosity >= 3 {
            info!("Played >> {}", move_to_human(mv, size));
        }
        if self.stats.move_cap_reached && self.cfg.verbosity >= 1 {
            info!("move cap {} reached, scoring the board", self.max_game_length);
        }

        Ok(StepResult {
            status: self.status,
            played: Some(mv),
            readouts,
        })
    }

    /// Step until the game ends.
    pub fn run<E: Evaluator + ?Sized>(mut self, evaluator: &E) -> Result<Episode, EpisodeError> {
        while !self.status.is_terminal() {
            self.step(evaluator)?;
        }
        if self.cfg.verbosity >= 1 {
            if let Some(result) = self.status.notation() {
                info!("game over after {} moves: {result}", self.stats.moves);
            }
        }
        Ok(Episode {
            final_position: self.tree.root_position().clone(),
            record: self.record,
            status: self.status,
            policy: self.policy,
            stats: self.stats,
        })
    }

    /// Select up to `want` leaves, evaluate the pending ones in one call and incorporate them.
    fn search_round<E: Evaluator + ?Sized>(
        &mut self,
        evaluator: &E,
        want: u32,
    ) -> Result<(), EpisodeError> {
        let mut pending = Vec::with_capacity(want as usize);
        let mut collisions = Vec::new();
        for _ in 0..want {
            match self.tree.select_leaf() {
                Ok(LeafSelection::Pending(leaf)) => pending.push(leaf),
                Ok(LeafSelection::Collision(leaf)) => collisions.push(leaf),
                Ok(LeafSelection::Terminal) => self.stats.terminal_leaves += 1,
                Err(e) => {
                    self.release(pending);
                    self.release(collisions);
                    return Err(e.into());
                }
            }
        }
        self.stats.collisions += collisions.len() as u64;

        let res = self.evaluate_pending(evaluator, pending);
        self.release(collisions);
        res
    }

    fn evaluate_pending<E: Evaluator + ?Sized>(
        &mut self,
        evaluator: &E,
        pending: Vec<T::Leaf>,
    ) -> Result<(), EpisodeError> {
        if pending.is_empty() {
            return Ok(());
        }
        let evals = {
            let positions: Vec<&Position> =
                pending.iter().map(|l| self.tree.leaf_position(l)).collect();
            evaluator.evaluate_batch(&positions)
        };
        let evals = match evals {
            Ok(v) if v.len() == pending.len() => v,
            Ok(v) => {
                let expected = pending.len();
                self.release(pending);
                return Err(EvalError::BatchSize {
                    expected,
                    got: v.len(),
                }
                .into());
            }
            Err(e) => {
                self.release(pending);
                return Err(e.into());
            }
        };
        self.stats.eval_batches += 1;
        self.stats.leaves_evaluated += pending.len() as u64;

        // Every leaf must be handed back, even after the first rejected evaluation.
        let mut first_err = None;
        for (leaf, eval) in pending.into_iter().zip(evals) {
            if first_err.is_some() {
                self.tree.revert_virtual_loss(leaf);
                continue;
            }
            if let Err(e) = self.tree.incorporate_results(leaf, eval) {
                first_err = Some(e);
            }
        }
        match first_err {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    fn release(&mut self, leaves: Vec<T::Leaf>) {
        for leaf in leaves {
            self.tree.revert_virtual_loss(leaf);
        }
    }
}

/// Build a search tree at `position` and play one full game.
pub fn play_episode<E: Evaluator + ?Sized, R: Rng>(
    evaluator: &E,
    tree_cfg: MctsConfig,
    position: Position,
    episode_cfg: EpisodeConfig,
    rng: R,
) -> Result<Episode, EpisodeError> {
    // Configuration problems surface before any tree is built.
    episode_cfg.validate()?;
    let tree = Mcts::new(tree_cfg, position)?;
    EpisodeDriver::new(tree, episode_cfg, rng, evaluator)?.run(evaluator)
}
