//! Pictor CLI - browser-driven AI image generation
//!
//! Usage:
//!   pictor generate             Run one prompt through the image studio
//!   pictor check                Validate prompt, session, and config
//!   pictor init                 Write a default pictor.toml

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pictor_core::PictorConfig;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "pictor")]
#[command(author, version, about = "Browser-driven AI image generation")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file
    #[arg(short, long, global = true, default_value = "pictor.toml")]
    config: PathBuf,

    /// Also write logs to <log_dir>/pictor.log
    #[arg(long, global = true)]
    log_to_file: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate one image from the configured prompt
    Generate {
        /// Prompt file (overrides config)
        #[arg(long)]
        prompt_file: Option<PathBuf>,

        /// Session file (overrides config)
        #[arg(long)]
        session_file: Option<PathBuf>,

        /// Output directory for artifacts (overrides config)
        #[arg(long)]
        out_dir: Option<PathBuf>,

        /// Force headless mode
        #[arg(long, conflicts_with = "headful")]
        headless: bool,

        /// Show the browser window
        #[arg(long)]
        headful: bool,

        /// Attempt ceiling (overrides config)
        #[arg(long)]
        max_retries: Option<u32>,

        /// Per-attempt watch budget in seconds (overrides config)
        #[arg(long)]
        timeout_secs: Option<u64>,
    },

    /// Validate inputs and show what a run would use, without a browser
    Check,

    /// Write a default configuration file
    Init {
        /// Where to write it
        #[arg(default_value = "pictor.toml")]
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = PictorConfig::load_or_default(&cli.config)
        .with_context(|| format!("failed to load config from {}", cli.config.display()))?;

    let _log_guard = setup_logging(cli.verbose, cli.log_to_file, &config);

    match cli.command {
        Commands::Generate {
            prompt_file,
            session_file,
            out_dir,
            headless,
            headful,
            max_retries,
            timeout_secs,
        } => {
            let mut config = config;
            if let Some(path) = prompt_file {
                config.prompt_file = path;
            }
            if let Some(path) = session_file {
                config.session_file = path;
            }
            if let Some(path) = out_dir {
                config.image_dir = path;
            }
            if headless {
                config.browser.headless = true;
            }
            if headful {
                config.browser.headless = false;
            }
            if let Some(n) = max_retries {
                config.timing.max_retries = n;
            }
            if let Some(secs) = timeout_secs {
                config.timing.generation_timeout_secs = secs;
            }
            cmd_generate(config).await
        }
        Commands::Check => cmd_check(config).await,
        Commands::Init { path } => cmd_init(path),
    }
}

async fn cmd_generate(config: PictorConfig) -> Result<()> {
    let artifact = pictor_engine::run(&config)
        .await
        .context("generation run failed")?;
    println!("{}", artifact.path.display());
    Ok(())
}

async fn cmd_check(config: PictorConfig) -> Result<()> {
    let inputs = pictor_engine::preflight(&config)
        .await
        .context("preflight failed")?;

    println!("Preflight OK. A run would use:");
    println!(
        "  prompt:       {} ({} chars, hash {})",
        config.prompt_file.display(),
        inputs.prompt.text().len(),
        inputs.prompt.hash_prefix()
    );
    println!(
        "  session:      {} ({} cookies)",
        inputs.session.path().display(),
        inputs.session.cookie_count()
    );
    println!("  target:       {}", config.base_url);
    println!("  images:       {}", config.image_dir.display());
    println!("  logs:         {}", config.log_dir.display());
    println!(
        "  browser:      {} ({}x{})",
        if config.browser.headless {
            "headless"
        } else {
            "headful"
        },
        config.browser.window_width,
        config.browser.window_height
    );
    println!(
        "  timing:       poll {}s, watch budget {}s, {} retries, total budget {}s",
        config.timing.poll_interval_secs,
        config.timing.generation_timeout_secs,
        config.timing.max_retries,
        config.timing.max_session_secs
    );
    Ok(())
}

fn cmd_init(path: PathBuf) -> Result<()> {
    if path.exists() {
        anyhow::bail!("{} already exists, not overwriting", path.display());
    }
    PictorConfig::write_default(&path)
        .with_context(|| format!("failed to write {}", path.display()))?;
    println!("wrote default configuration to {}", path.display());
    println!("place your prompt in prompt.txt and your cookie export in session.json");
    Ok(())
}

/// Stdout logging, plus an optional non-blocking file layer in the
/// configured log directory. The returned guard must live for the whole
/// process so buffered log lines are flushed on exit.
fn setup_logging(
    verbose: bool,
    log_to_file: bool,
    config: &PictorConfig,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    if log_to_file {
        if let Err(e) = std::fs::create_dir_all(&config.log_dir) {
            eprintln!(
                "warn: could not create log directory {}: {} - logging to stdout only",
                config.log_dir.display(),
                e
            );
        } else {
            let appender = tracing_appender::rolling::never(&config.log_dir, "pictor.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_target(false))
                .with(fmt::layer().with_target(false).with_ansi(false).with_writer(writer))
                .init();
            return Some(guard);
        }
    }

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .init();
    None
}
