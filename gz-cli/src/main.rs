//! gz: CLI binary for Go self-play.
//!
//! Subcommands:
//! - selfplay
//! - show-config

use std::path::{Path, PathBuf};
use std::process;

use clap::{Args, Parser, Subcommand, ValueEnum};
use gz_core::{move_to_human, Config, Position};
use gz_mcts::{Evaluator, RolloutEvaluator, UniformEvaluator};
use gz_replay::schema::{ACTION_SPACE_ID, PROTOCOL_VERSION, RULESET_ID};
use gz_logging::{EpisodeEvent, Event, MoveEvent, PiStats};
use gz_runtime::{
    Episode, EpisodeConfig, EpisodeStatus, ResignPolicy, RunPlan, SchedulerError,
    SchedulerStats,
};
use log::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "gz", version, about = "AlphaZero-style Go self-play", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Play self-play games; write replay shards, NDJSON logs and run.json under --out
    Selfplay(SelfplayArgs),
    /// Print the effective configuration (defaults filled in) as YAML
    ShowConfig {
        /// Path to YAML config (built-in defaults if omitted)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct SelfplayArgs {
    /// Path to YAML config
    #[arg(long)]
    config: PathBuf,

    /// Output directory (runs/<id>/)
    #[arg(long)]
    out: PathBuf,

    /// Number of games (overrides selfplay.games)
    #[arg(long)]
    games: Option<u32>,

    /// Base seed (overrides selfplay.seed)
    #[arg(long)]
    seed: Option<u64>,

    /// Diagnostic level (overrides selfplay.verbosity)
    #[arg(long)]
    verbosity: Option<u8>,

    /// Position evaluator
    #[arg(long, value_enum, default_value_t = EvaluatorKind::Uniform)]
    evaluator: EvaluatorKind,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum EvaluatorKind {
    /// Uniform priors, value 0
    Uniform,
    /// Uniform priors, value from one random playout
    Rollout,
}

fn load_config(path: &Path) -> Config {
    Config::load(path).unwrap_or_else(|e| {
        eprintln!("Failed to load config {}: {e}", path.display());
        process::exit(1);
    })
}

fn cmd_show_config(config: Option<PathBuf>) {
    let cfg = match config {
        Some(p) => load_config(&p),
        None => Config::default(),
    };
    match serde_yaml::to_string(&cfg) {
        Ok(s) => print!("{s}"),
        Err(e) => {
            eprintln!("Failed to render config: {e}");
            process::exit(1);
        }
    }
}

fn mcts_config(cfg: &Config) -> gz_mcts::MctsConfig {
    gz_mcts::MctsConfig {
        c_puct: cfg.mcts.c_puct,
        dirichlet_alpha: cfg.mcts.dirichlet_alpha,
        dirichlet_epsilon: cfg.mcts.dirichlet_epsilon,
        virtual_loss: cfg.mcts.virtual_loss,
        softpick_move_cutoff: cfg.softpick_move_cutoff(),
    }
}

fn cmd_selfplay(args: SelfplayArgs) {
    let mut cfg = load_config(&args.config);
    if let Some(g) = args.games {
        cfg.selfplay.games = g;
    }
    if let Some(s) = args.seed {
        cfg.selfplay.seed = s;
    }
    if let Some(v) = args.verbosity {
        cfg.selfplay.verbosity = v;
    }

    if let Err(e) = gz_logging::init_stderr_logger(gz_logging::level_for_verbosity(
        cfg.selfplay.verbosity,
    )) {
        eprintln!("Failed to install logger: {e}");
    }

    let tree_cfg = mcts_config(&cfg);
    let episode_cfg = EpisodeConfig::from_config(&cfg);
    // Reject bad settings before creating any output.
    if let Err(e) = tree_cfg.validate() {
        eprintln!("Invalid mcts config: {e}");
        process::exit(1);
    }
    if let Err(e) = episode_cfg.validate() {
        eprintln!("Invalid selfplay config: {e}");
        process::exit(1);
    }
    let start = Position::new(cfg.board.size, cfg.board.komi).unwrap_or_else(|e| {
        eprintln!("Invalid board: {e}");
        process::exit(1);
    });

    let out = args.out;
    let replay_dir = out.join("replay");
    match gz_replay::cleanup_tmp_files(&replay_dir) {
        Ok(0) => {}
        Ok(n) => info!("removed {n} staged replay files from an interrupted run"),
        Err(e) => warn!("replay cleanup failed: {e}"),
    }
    let logs_dir = out.join("logs");
    std::fs::create_dir_all(&logs_dir).unwrap_or_else(|e| {
        eprintln!("Failed to create logs dir: {e}");
        process::exit(1);
    });

    // Run manifest (runs/<id>/run.json).
    let run_json = out.join("run.json");
    let config_bytes = std::fs::read(&args.config).unwrap_or_else(|e| {
        eprintln!("Failed to read config file: {e}");
        process::exit(1);
    });
    let config_blake3 = gz_logging::blake3_hex(&config_bytes);
    let run_id = out
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("run")
        .to_string();
    let mut manifest = gz_logging::RunManifest {
        manifest_version: gz_logging::RUN_MANIFEST_VERSION,
        run_id,
        created_unix_ms: gz_logging::unix_ms(),
        protocol_version: PROTOCOL_VERSION,
        action_space: ACTION_SPACE_ID.to_string(),
        ruleset: RULESET_ID.to_string(),
        board: gz_logging::BoardInfo {
            size: cfg.board.size,
            komi: cfg.board.komi,
        },
        git_commit: gz_logging::git_commit(),
        config_blake3: Some(config_blake3.clone()),
        seed: cfg.selfplay.seed,
        progress: gz_logging::RunProgress::default(),
    };
    match gz_logging::RunManifest::load(&run_json) {
        Ok(Some(earlier)) => {
            info!("resuming run {}", earlier.run_id);
            manifest.resume(earlier);
        }
        Ok(None) => {}
        Err(e) => warn!("ignoring unreadable {}: {e}", run_json.display()),
    }
    manifest.save(&run_json).unwrap_or_else(|e| {
        eprintln!("Failed to write run manifest: {e}");
        process::exit(1);
    });

    let mut writer = gz_replay::ShardWriter::new(gz_replay::ShardWriterConfig {
        dir: replay_dir,
        board_size: cfg.board.size,
        komi: cfg.board.komi,
        shard_samples: cfg.replay.max_samples_per_shard,
        config_blake3: Some(config_blake3),
    })
    .unwrap_or_else(|e| {
        eprintln!("Failed to create shard writer: {e}");
        process::exit(1);
    });

    let evaluator: Box<dyn Evaluator + Sync> = match args.evaluator {
        EvaluatorKind::Uniform => Box::new(UniformEvaluator),
        EvaluatorKind::Rollout => Box::new(RolloutEvaluator::new(cfg.selfplay.seed)),
    };

    let mut events = gz_logging::EventLog::open(&logs_dir.join("selfplay.ndjson"))
        .map(|log| log.flush_every(100))
        .unwrap_or_else(|e| {
            eprintln!("Failed to open event log: {e}");
            process::exit(1);
        });

    // Continue numbering after the games an earlier run already wrote, so seeds never repeat.
    let plan = RunPlan {
        first_game: manifest.progress.games_completed,
        games: cfg.selfplay.games,
        threads: cfg.selfplay.threads as usize,
        base_seed: cfg.selfplay.seed,
    };
    info!(
        "playing games {}..{} of {}x{} on {} threads ({} readouts/move)",
        plan.first_game,
        plan.first_game + u64::from(plan.games),
        cfg.board.size,
        cfg.board.size,
        plan.threads,
        cfg.selfplay.readouts
    );

    let mut stats = SchedulerStats::default();
    let played = gz_runtime::run_episodes(
        evaluator.as_ref(),
        tree_cfg,
        &start,
        &episode_cfg,
        plan,
        |game_id, ep| {
            for event in game_events(&manifest.run_id, game_id, &ep, cfg.board.size) {
                events.append(&event)?;
            }
            let samples = writer.write_episode(&ep)?;
            stats.record(&ep);

            manifest.record_game(samples as u64);
            if manifest.progress.games_completed % 10 == 0 {
                if let Err(e) = manifest.save(&run_json) {
                    warn!("manifest update failed: {e}");
                }
            }
            Ok(())
        },
    );
    if let Err(e) = played {
        // A failed game leaves the buffer holding only finished games; a failed write may not.
        if matches!(e, SchedulerError::Episode { .. }) {
            let _ = writer.finish();
        }
        let _ = events.flush();
        let _ = manifest.save(&run_json);
        eprintln!("Self-play failed: {e}");
        process::exit(1);
    }

    writer.finish().unwrap_or_else(|e| {
        eprintln!("Failed to flush writer: {e}");
        process::exit(1);
    });
    if let Err(e) = events.flush() {
        warn!("event log flush failed: {e}");
    }
    manifest.save(&run_json).unwrap_or_else(|e| {
        eprintln!("Failed to write run manifest: {e}");
        process::exit(1);
    });

    println!(
        "Self-play complete. Games={} moves={} B/W wins={}/{} resigned={} capped={} out={}",
        stats.games,
        stats.moves,
        stats.black_wins,
        stats.white_wins,
        stats.resigned,
        stats.capped,
        out.display()
    );
}

const SCHEMA: gz_logging::SchemaTag = gz_logging::SchemaTag {
    protocol_version: PROTOCOL_VERSION,
    action_space: ACTION_SPACE_ID,
    ruleset: RULESET_ID,
};

/// One move event per recorded move, then the episode summary.
fn game_events(run_id: &str, game_id: u64, ep: &Episode, size: usize) -> Vec<Event> {
    let ts_ms = gz_logging::unix_ms();
    let mut out: Vec<Event> = ep
        .record
        .iter()
        .enumerate()
        .map(|(i, m)| {
            Event::Move(MoveEvent {
                ts_ms,
                schema: SCHEMA,
                run_id: run_id.to_string(),
                game_id,
                move_number: i as u32,
                to_play: m.to_play.to_string(),
                mv: move_to_human(m.mv, size),
                raw_value: m.value,
                pi: PiStats::of(&m.pi),
            })
        })
        .collect();
    out.push(Event::Episode(EpisodeEvent {
        ts_ms,
        schema: SCHEMA,
        run_id: run_id.to_string(),
        game_id,
        moves: ep.stats.moves,
        result: ep.status.notation().unwrap_or_default(),
        resigned: matches!(ep.status, EpisodeStatus::Resigned { .. }),
        resign_disabled: ep.policy == ResignPolicy::Disabled,
        move_cap_reached: ep.stats.move_cap_reached,
        leaves_evaluated: ep.stats.leaves_evaluated,
        eval_batches: ep.stats.eval_batches,
        collisions: ep.stats.collisions,
        search_ms: ep.stats.search_time.as_millis() as u64,
    }));
    out
}

fn main() {
    let cli = Cli::parse();
    match cli.command {
        Command::Selfplay(args) => cmd_selfplay(args),
        Command::ShowConfig { config } => cmd_show_config(config),
    }
}
