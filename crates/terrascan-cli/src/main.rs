//! `terrascan-cli` – TerraScan command line interface.
//!
//! ```text
//! terrascan replay <frames.jsonl>   replay a recorded frame log
//! terrascan config                  print the effective configuration
//! terrascan init                    write the default config file
//! ```
//!
//! Configuration is read from `~/.terrascan/config.toml` (see [`config`]);
//! the compiled-in defaults are used when the file is absent.  **Ctrl-C**
//! stops a replay between frames and still prints the summary.

mod config;

use colored::Colorize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, warn};

use terrascan_perception::PerceptionPipeline;
use terrascan_runtime::{ReplaySummary, replay::replay, telemetry};

enum Command {
    Replay(PathBuf),
    ShowConfig,
    Init,
    Help,
}

fn main() -> ExitCode {
    let command = match parse_args(std::env::args().skip(1)) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{}: {}", "error".red().bold(), msg);
            print_usage();
            return ExitCode::from(2);
        }
    };

    let cfg = match config::load() {
        Ok(Some(cfg)) => cfg,
        Ok(None) => {
            let mut cfg = config::Config::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
        Err(e) => {
            eprintln!("{}: {}", "Config error".red(), e);
            return ExitCode::FAILURE;
        }
    };

    match command {
        Command::Help => {
            print_usage();
            ExitCode::SUCCESS
        }
        Command::ShowConfig => show_config(&cfg),
        Command::Init => init_config(),
        Command::Replay(log) => run_replay(&cfg, &log),
    }
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Command, String> {
    let command = match args.next().as_deref() {
        None | Some("help") | Some("-h") | Some("--help") => Command::Help,
        Some("config") => Command::ShowConfig,
        Some("init") => Command::Init,
        Some("replay") => match args.next() {
            Some(path) => Command::Replay(PathBuf::from(path)),
            None => return Err("`replay` needs a frame log path".to_string()),
        },
        Some(other) => return Err(format!("unknown command `{other}`")),
    };
    if let Some(extra) = args.next() {
        return Err(format!("unexpected argument `{extra}`"));
    }
    Ok(command)
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

fn run_replay(cfg: &config::Config, log: &Path) -> ExitCode {
    let _guard = telemetry::init_tracing(&cfg.service_name);
    print_banner();

    let pipeline = match PerceptionPipeline::new(cfg.perception.clone()) {
        Ok(p) => p,
        Err(e) => {
            error!(error = %e, "cannot build perception pipeline");
            eprintln!("{}: {}", "Configuration rejected".red().bold(), e);
            return ExitCode::FAILURE;
        }
    };

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – stopping after the current frame …".yellow().bold());
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; replay cannot be interrupted cleanly");
    }

    println!("  Replaying {}\n", log.display().to_string().bold());
    let mut rover = pipeline.new_rover_state();
    match replay(&pipeline, &mut rover, log, &shutdown) {
        Ok(summary) => {
            print_summary(&summary, pipeline.config().world_size);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "replay failed");
            eprintln!("{}: {}", "Replay failed".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn show_config(cfg: &config::Config) -> ExitCode {
    println!(
        "{} {}\n",
        "# effective configuration; file:".dimmed(),
        config::config_path().display().to_string().dimmed()
    );
    match config::render(cfg) {
        Ok(raw) => {
            println!("{raw}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}: {}", "Config error".red(), e);
            ExitCode::FAILURE
        }
    }
}

fn init_config() -> ExitCode {
    let path = config::config_path();
    if path.exists() {
        println!(
            "  {} {} already exists; leaving it untouched.",
            "•".yellow(),
            path.display().to_string().bold()
        );
        return ExitCode::SUCCESS;
    }
    match config::save(&config::Config::default()) {
        Ok(()) => {
            println!(
                "  {} Config saved to {}",
                "✓".green().bold(),
                path.display().to_string().bold()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}: {}", "Error saving config".red(), e);
            ExitCode::FAILURE
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Output
// ─────────────────────────────────────────────────────────────────────────────

fn print_summary(summary: &ReplaySummary, world_size: usize) {
    let cells = (world_size * world_size).max(1) as f64;
    let pct = |n: usize| format!("{:5.2}%", 100.0 * n as f64 / cells);

    println!();
    if summary.interrupted {
        println!("  {}", "Replay interrupted.".yellow().bold());
    } else {
        println!("  {}", "Replay complete.".green().bold());
    }
    println!("  Frames processed : {}", summary.frames.to_string().bold());
    println!(
        "  Frames gated     : {}",
        if summary.gated_frames > 0 {
            summary.gated_frames.to_string().yellow()
        } else {
            summary.gated_frames.to_string().normal()
        }
    );
    println!(
        "  Obstacle cells   : {:>7}  {}",
        summary.obstacle_cells.to_string().red(),
        pct(summary.obstacle_cells).dimmed()
    );
    println!(
        "  Navigable cells  : {:>7}  {}",
        summary.navigable_cells.to_string().blue(),
        pct(summary.navigable_cells).dimmed()
    );
    println!(
        "  Sample cells     : {:>7}  {}",
        summary.sample_cells.to_string().green(),
        pct(summary.sample_cells).dimmed()
    );
    println!();
}

fn print_banner() {
    println!();
    println!("{}", r#"  _____                  ___               "#.bold().cyan());
    println!("{}", r#" |_   _|__ _ _ _ _ __ _ / __| __ __ _ _ _  "#.bold().cyan());
    println!("{}", r#"   | |/ -_) '_| '_/ _` |\__ \/ _/ _` | ' \ "#.bold().cyan());
    println!("{}", r#"   |_|\___|_| |_| \__,_||___/\__\__,_|_||_|"#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "TerraScan".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Rover terrain perception");
    println!();
}

fn print_usage() {
    println!("{}", "Usage:".bold());
    println!("  terrascan replay <frames.jsonl>   replay a recorded frame log");
    println!("  terrascan config                  print the effective configuration");
    println!("  terrascan init                    write the default config file");
}
