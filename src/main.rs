//! danmaku-replay - replay a comment file against a simulated player
//! and print what the lane scheduler did

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use rustle_danmaku::danmaku::{DanmakuOverrides, load_comments};
use rustle_danmaku::player::ViewportRect;
use rustle_danmaku::replay::{ReplayConfig, run_replay};

#[derive(Parser)]
#[command(name = "danmaku-replay")]
#[command(about = "Replay danmaku comments through the lane scheduler")]
#[command(version)]
struct Cli {
    /// Comment file (JSON array of comment items)
    comments: PathBuf,

    /// Options file; defaults to the user's saved danmaku options
    #[arg(short, long)]
    options: Option<PathBuf>,

    /// Viewport width in pixels
    #[arg(long, default_value = "1280")]
    width: f64,

    /// Viewport height in pixels
    #[arg(long, default_value = "720")]
    height: f64,

    /// Clock step in seconds
    #[arg(long, default_value = "0.25")]
    step: f64,

    /// Stop time in seconds (default: last comment + 10s)
    #[arg(long)]
    until: Option<f64>,

    /// Pause playback once at this time
    #[arg(long)]
    pause_at: Option<f64>,
}

fn main() -> Result<()> {
    // Initialize tracing for logging
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    if cli.step <= 0.0 {
        bail!("--step must be positive, got {}", cli.step);
    }

    let items = load_comments(&cli.comments)
        .with_context(|| format!("Failed to load comments from {}", cli.comments.display()))?;

    let overrides = match &cli.options {
        Some(path) => DanmakuOverrides::load_from_file(path)
            .with_context(|| format!("Failed to load options from {}", path.display()))?,
        None => DanmakuOverrides::load(),
    };

    let config = ReplayConfig {
        viewport: ViewportRect::new(cli.width, cli.height),
        step: cli.step,
        until: cli.until,
        pause_at: cli.pause_at,
    };

    tracing::info!(
        "Replaying {} comments on a {}x{} viewport",
        items.len(),
        cli.width,
        cli.height
    );
    let summary = run_replay(items, overrides, &config);
    println!("{}", summary);
    Ok(())
}
