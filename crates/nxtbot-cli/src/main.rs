//! `nxtbot-cli` – console entry point for the NXT control stack.
//!
//! This binary wires the whole stack together.  It:
//!
//! 1. Initialises structured logging from `RUST_LOG` (set
//!    `NXTBOT_LOG_FORMAT=json` for newline-delimited JSON logs).
//! 2. Loads `~/.nxtbot/config.toml` (writing a default file on first run)
//!    and applies `NXTBOT_*` environment overrides.
//! 3. Spawns the rosbridge link and waits for it to become ready, with a
//!    hard timeout.
//! 4. Runs the requested program: `drive`, `patrol` or `teleop`.
//! 5. Intercepts **Ctrl-C** to stop every motor before exiting.

mod config;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use colored::Colorize;
use nxtbot_middleware::{EventBus, RosbridgeLink};
use nxtbot_runtime::{ObstacleAvoidance, Patrol, Robot, StdinInput, Teleop};
use nxtbot_types::NxtError;
use tracing::{error, warn};

enum Program {
    Drive,
    Patrol,
    Teleop,
}

#[tokio::main]
async fn main() -> ExitCode {
    // ── Structured logging ────────────────────────────────────────────────
    // Initialise tracing-subscriber using RUST_LOG (defaults to "info").
    // Set NXTBOT_LOG_FORMAT=json to emit newline-delimited JSON logs.
    // The CLI's user-facing output still uses println! for UX consistency.
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    if std::env::var("NXTBOT_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .compact()
            .init();
    }

    print_banner();

    let arg = std::env::args().nth(1);
    let program = match arg.as_deref() {
        Some("drive") => Program::Drive,
        Some("patrol") => Program::Patrol,
        Some("teleop") => Program::Teleop,
        Some(other) => {
            println!("{} {}", "Unknown program:".red().bold(), other.bold());
            println!();
            print_usage();
            return ExitCode::from(2);
        }
        None => {
            print_usage();
            return ExitCode::from(2);
        }
    };

    // ── Configuration ─────────────────────────────────────────────────────
    let mut cfg = match config::load() {
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Ok(None) => {
            let cfg = config::Config::default();
            match config::save(&cfg) {
                Ok(()) => println!(
                    "  Wrote default config to {}",
                    config::config_path().display().to_string().bold()
                ),
                Err(e) => println!("{}: {}", "Config error".red(), e),
            }
            cfg
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            config::Config::default()
        }
    };
    config::apply_env_overrides(&mut cfg);
    if let Err(err) = cfg.validate() {
        println!("{}: {}", "Config error".red().bold(), err);
        return ExitCode::FAILURE;
    }

    // ── Event bus and rosbridge link ──────────────────────────────────────
    let bus = Arc::new(EventBus::default());
    let link = RosbridgeLink::new(Arc::clone(&bus), cfg.rosbridge_url.clone());
    let ready = link.ready();
    tokio::spawn(async move {
        if let Err(err) = link.run().await {
            error!(error = %err, "rosbridge link ended");
        }
    });

    let robot = Robot::new(bus.as_ref().clone(), ready);

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    // Stop every motor and cancel any in-flight timed pulse before exiting.
    let gateway = robot.gateway();
    let interrupt = robot.interrupt_handle();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!(
            "{}",
            "⚠  Ctrl-C received – stopping all motors …".yellow().bold()
        );
        gateway.stop_all();
        interrupt.interrupt();
        // Give the link task a beat to drain the stop commands.
        std::thread::sleep(Duration::from_millis(100));
        println!("{}", "  ✓ Stop commands sent.".green());
        std::process::exit(0);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; motors will not be stopped on Ctrl-C");
    }

    // ── Readiness gate ────────────────────────────────────────────────────
    println!("  Connecting to {} …", cfg.rosbridge_url.as_str().dimmed());
    if let Err(err) = robot.wait_ready(cfg.ready_timeout()).await {
        println!("{}: {}", "Startup failed".red().bold(), err);
        return ExitCode::FAILURE;
    }
    println!("  {} Link ready.", "✓".green().bold());

    // ── Program ───────────────────────────────────────────────────────────
    let outcome = match program {
        Program::Drive => run_drive(&robot, &cfg).await,
        Program::Patrol => run_patrol(&robot, &cfg).await,
        Program::Teleop => run_teleop(&robot, &cfg).await,
    };

    match outcome {
        Ok(()) => {
            println!("  {} Program finished.", "✓".green().bold());
            ExitCode::SUCCESS
        }
        Err(err) => {
            println!("{}: {}", "Program failed".red().bold(), err);
            // Whatever happened, leave the motors stopped.
            robot.stop_all();
            ExitCode::FAILURE
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Programs
// ─────────────────────────────────────────────────────────────────────────────

async fn run_drive(robot: &Robot, cfg: &config::Config) -> Result<(), NxtError> {
    println!(
        "  Driving until an obstacle is closer than {} m.  Ctrl-C stops.",
        cfg.stop_range_m
    );
    let mut program = ObstacleAvoidance::new(robot.cache(), robot.gateway(), cfg.avoidance()?);
    program.run().await
}

async fn run_patrol(robot: &Robot, cfg: &config::Config) -> Result<(), NxtError> {
    let patrol_cfg = cfg.patrol()?;
    println!(
        "  Patrolling {} lap(s).  Ctrl-C stops.",
        patrol_cfg.laps
    );
    Patrol::new(robot.cache(), robot.gateway(), patrol_cfg)
        .run()
        .await
}

async fn run_teleop(robot: &Robot, cfg: &config::Config) -> Result<(), NxtError> {
    println!(
        "  {} forward   {} left   {} reverse   {} right   Ctrl-D quits.",
        "w".bold().cyan(),
        "a".bold().cyan(),
        "s".bold().cyan(),
        "d".bold().cyan()
    );
    let teleop = Teleop::new(robot.gateway(), cfg.teleop()?);
    teleop.run(StdinInput::new()).await?;
    // Console closed; leave the motors stopped.
    robot.stop_all();
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner and usage
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("  {}", "╔══════════════════════╗".bold().cyan());
    println!("  {}", "║     n x t b o t      ║".bold().cyan());
    println!("  {}", "╚══════════════════════╝".bold().cyan());
    println!();
    println!(
        "  {} {}",
        "nxtbot".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  NXT robot control over rosbridge");
    println!();
}

fn print_usage() {
    println!("  Usage: {} <program>", "nxtbot".bold());
    println!();
    println!("  Programs:");
    println!(
        "    {}   drive forward, stop at the first obstacle",
        "drive".bold().cyan()
    );
    println!(
        "    {}  approach/retreat laps, then a full stop",
        "patrol".bold().cyan()
    );
    println!(
        "    {}  keyboard pulses over stdin (w/a/s/d)",
        "teleop".bold().cyan()
    );
    println!();
    println!(
        "  Config file: {}  (env overrides: NXTBOT_*)",
        config::config_path().display().to_string().dimmed()
    );
}
