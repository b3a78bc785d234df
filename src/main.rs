//! AVP: autonomous valet parking environment and scorer.
//!
//! Provides subcommands for driving agents and scoring their decisions:
//!
//! - `rollout`   -- Run episodes with a rule-based agent and save them
//! - `evaluate`  -- One episode per instruction; save the decision records
//!                  (optionally also as a zip archive)
//! - `score`     -- Score a decision file against the stored scenarios
//! - `demos`     -- Collect (image, instruction, action) demonstrations
//! - `inspect`   -- Summarize the configured scenario data

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use avp::agent::RuleBasedAgent;
use avp::config::{AgentMode, AvpConfig};
use avp::data::DataReader;
use avp::env::{load_env, PerfectTrajectory};
use avp::metrics::{
    load_decisions, save_decisions, save_decisions_archive, score_decisions, ScenarioCatalog,
};
use avp::rollout::{collect_demonstrations, save_json, EpisodeCollector, Evaluator, RolloutBuffer};

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

/// AVP: autonomous valet parking environment and scorer
#[derive(Parser)]
#[command(name = "avp", version, about)]
struct Cli {
    /// Path to a JSON configuration file (uses defaults if not provided).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Agent mode; overrides the configuration file.
    #[arg(long, global = true)]
    mode: Option<AgentMode>,

    /// Agent RNG seed; overrides the configuration file.
    #[arg(long, global = true)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run episodes with the configured agent.
    Rollout {
        /// Number of episodes to run.
        #[arg(long, default_value_t = 10)]
        episodes: usize,

        /// Path to save the rollouts (not saved if omitted).
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Run one episode per instruction and save the decision records.
    Evaluate {
        /// Path to save the decision records.
        #[arg(long, default_value = "result/test_results.json")]
        output: PathBuf,

        /// Also write the records into a deflated zip archive at this path.
        #[arg(long)]
        archive: Option<PathBuf>,
    },

    /// Score a decision file (JSON, or a zip written by `evaluate --archive`).
    Score {
        /// Decision records produced by `evaluate`.
        #[arg(default_value = "result/test_results.json")]
        results: PathBuf,

        /// Root holding one directory per scenario (overrides the config).
        #[arg(long)]
        data_root: Option<PathBuf>,

        /// Path to save the score report.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Collect demonstrations from an agent following the perfect trajectory.
    Demos {
        /// Number of episodes to run.
        #[arg(long, default_value_t = 100)]
        episodes: usize,

        /// Path to save the demonstrations.
        #[arg(long, default_value = "data/demonstrations.json")]
        output: PathBuf,
    },

    /// Summarize the configured scenario data.
    Inspect,
}

// ---------------------------------------------------------------------------
// Entrypoint
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    // Initialise tracing (reads RUST_LOG env var, defaults to info).
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AvpConfig::from_file(path)?,
        None => AvpConfig::default(),
    };
    if let Some(mode) = cli.mode {
        config.agent.mode = mode;
    }
    if cli.seed.is_some() {
        config.agent.seed = cli.seed;
    }

    match cli.command {
        Commands::Rollout { episodes, output } => cmd_rollout(&config, episodes, output.as_deref()),
        Commands::Evaluate { output, archive } => cmd_evaluate(&config, &output, archive.as_deref()),
        Commands::Score {
            results,
            data_root,
            output,
        } => cmd_score(&config, &results, data_root, output.as_deref()),
        Commands::Demos { episodes, output } => cmd_demos(&config, episodes, &output),
        Commands::Inspect => cmd_inspect(&config),
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

fn cmd_rollout(config: &AvpConfig, episodes: usize, output: Option<&Path>) -> Result<()> {
    tracing::info!(episodes, mode = ?config.agent.mode, "Running episodes");

    let mut env = load_env(config)?;
    let mut agent = RuleBasedAgent::new(config.agent.mode, config.agent.seed);
    let rollouts = EpisodeCollector::new().collect_episodes(&mut env, &mut agent, episodes)?;

    if let Some(path) = output {
        save_json(path, &rollouts)?;
        tracing::info!(path = %path.display(), count = rollouts.len(), "Saved rollouts");
    }

    let mut buffer = RolloutBuffer::new();
    buffer.extend(rollouts);
    println!("Episodes:      {}", buffer.len());
    println!("Success rate:  {:.2}%", buffer.success_rate() * 100.0);
    println!("Mean reward:   {:.3}", buffer.mean_reward());
    println!("Mean length:   {:.1}", buffer.mean_length());
    println!("Final rewards:");
    for (reward, count) in buffer.outcome_histogram() {
        println!("  {reward:>6}: {count}");
    }
    Ok(())
}

fn cmd_evaluate(config: &AvpConfig, output: &Path, archive: Option<&Path>) -> Result<()> {
    tracing::info!(mode = ?config.agent.mode, "Evaluating every instruction");

    let mut env = load_env(config)?;
    let mut agent = RuleBasedAgent::new(config.agent.mode, config.agent.seed);
    let evaluation = Evaluator::new().evaluate(&mut env, &mut agent)?;

    save_decisions(output, &evaluation.decisions)?;
    tracing::info!(
        path = %output.display(),
        count = evaluation.decisions.len(),
        "Saved decision records"
    );
    if let Some(path) = archive {
        save_decisions_archive(path, &evaluation.decisions)?;
    }
    Ok(())
}

fn cmd_score(
    config: &AvpConfig,
    results: &Path,
    data_root: Option<PathBuf>,
    output: Option<&Path>,
) -> Result<()> {
    let root = data_root.unwrap_or_else(|| config.data.scoring_root.clone());
    tracing::info!(results = %results.display(), root = %root.display(), "Scoring decisions");

    let decisions = load_decisions(results)?;
    let mut catalog = ScenarioCatalog::new(root);
    let report = score_decisions(&mut catalog, &decisions, config.scoring)
        .with_context(|| format!("Failed to score {}", results.display()))?;

    let m = &report.metrics;
    println!("Experiments:            {}", report.experiments);
    println!("Navigation error (NE):  {:.4}", m.navigation_error);
    println!("Success rate (SR):      {:.4}", m.success_rate);
    println!("Weighted SR (DWSR):     {:.4}", m.weighted_success_rate);
    println!("Abs. slot error (APE):  {:.4}", m.absolute_slot_error);
    println!("Miss rate (MR):         {:.4}", m.miss_rate);
    println!("Matching rate (PSMD):   {:.4}", m.matching_rate);
    println!("Score:                  {:.4}", report.score);

    if let Some(path) = output {
        save_json(path, &report)?;
        tracing::info!(path = %path.display(), "Saved score report");
    }
    Ok(())
}

fn cmd_demos(config: &AvpConfig, episodes: usize, output: &Path) -> Result<()> {
    tracing::info!(episodes, "Collecting demonstrations");

    let mut env = load_env(config)?;
    let mut agent = RuleBasedAgent::new(AgentMode::Optimal, config.agent.seed);
    let demos = collect_demonstrations(&mut env, &mut agent, episodes)?;

    save_json(output, &demos)?;
    tracing::info!(path = %output.display(), count = demos.len(), "Saved demonstrations");
    Ok(())
}

fn cmd_inspect(config: &AvpConfig) -> Result<()> {
    let reader = DataReader::new(config.data.scenario_dirs.iter().cloned());
    let slots = reader.load_parking_slots()?;
    let trajectories = reader.load_trajectories()?;

    println!("Scenarios: {}", reader.scenario_dirs().len());
    for dir in reader.scenario_dirs() {
        println!("  {}", dir.display());
    }
    println!();

    let occupied = slots.iter().filter(|s| s.is_occupied()).count();
    println!("Parking slots: {} ({} occupied)", slots.len(), occupied);

    let targeted = trajectories.iter().filter(|t| t.targets_slot()).count();
    println!(
        "Instructions:  {} ({} targeted, {} path-only)",
        trajectories.len(),
        targeted,
        trajectories.len() - targeted
    );
    println!();

    println!("Targeted instructions:");
    for (i, trajectory) in trajectories.iter().enumerate().filter(|(_, t)| t.targets_slot()) {
        let perfect = PerfectTrajectory::build(trajectory)
            .with_context(|| format!("Instruction {i} has an invalid path"))?;
        let stop = perfect
            .as_slice()
            .iter()
            .position(|&a| a != 0)
            .map_or_else(|| "-".to_string(), |p| (p + 1).to_string());
        println!(
            "  [{i}] {scan} stop at step {stop}: {text}",
            scan = trajectory.scan,
            text = trajectory.instruction
        );
    }
    Ok(())
}
