//! iolens command line interface.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use iolens::capture::{InputTrackingChannel, ScreenCaptureChannel};
use iolens::events::EventLog;
use iolens::processing::OverlayOptions;
use iolens::recorder::RecordingSession;
use iolens::replay::InputPlayer;
use iolens::{generate_debug_video, RenderOptions};

#[derive(Parser)]
#[command(name = "iolens", version, about = "Record screen and input together, play them back as one.")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Record the screen together with mouse and keyboard event logs.
    Record {
        /// Directory the timestamped session directory is created under.
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,

        /// Capture frame rate.
        #[arg(long, default_value_t = 30)]
        fps: u32,

        /// Stop automatically after this many seconds (Ctrl-C otherwise).
        #[arg(long)]
        duration: Option<f64>,
    },

    /// Render the annotated debug video from a recorded session.
    Render {
        /// The recorded screen video.
        #[arg(long)]
        input: PathBuf,

        /// The mouse event log.
        #[arg(long)]
        mouse: PathBuf,

        /// The keyboard event log.
        #[arg(long)]
        keyboard: PathBuf,

        /// Where to write the annotated video.
        #[arg(long)]
        output: PathBuf,

        /// TTF to render the overlay text with (a system font otherwise).
        #[arg(long)]
        font: Option<PathBuf>,
    },

    /// Replay a recorded mouse trajectory on the live cursor.
    Replay {
        /// The mouse event log.
        #[arg(long)]
        mouse: PathBuf,

        /// Playback speed factor (2.0 = twice as fast).
        #[arg(long, default_value_t = 1.0)]
        speed: f64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "iolens=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Record {
            output_dir,
            fps,
            duration,
        } => record(output_dir, fps, duration).await,
        Command::Render {
            input,
            mouse,
            keyboard,
            output,
            font,
        } => render(input, mouse, keyboard, output, font),
        Command::Replay { mouse, speed } => replay(mouse, speed),
    }
}

async fn record(output_dir: PathBuf, fps: u32, duration: Option<f64>) -> anyhow::Result<()> {
    let mut session = RecordingSession::new(output_dir, fps);
    session.add_channel(Box::new(ScreenCaptureChannel::new(fps)));
    session.add_channel(Box::new(InputTrackingChannel::new(fps)));

    let session_dir = session.start().await.context("failed to start recording")?;
    println!("Recording to {}", session_dir.display());

    match duration {
        Some(seconds) => {
            println!("Recording for {seconds} seconds (Ctrl-C to stop early).");
            tokio::select! {
                _ = tokio::time::sleep(std::time::Duration::from_secs_f64(seconds)) => {}
                _ = tokio::signal::ctrl_c() => {}
            }
        }
        None => {
            println!("Press Ctrl-C to stop.");
            tokio::signal::ctrl_c()
                .await
                .context("failed to wait for Ctrl-C")?;
        }
    }

    let manifest = session.stop().await.context("failed to stop recording")?;
    println!("Recording stopped. Files:");
    for file in &manifest.files {
        println!("  {file}");
    }
    Ok(())
}

fn render(
    input: PathBuf,
    mouse: PathBuf,
    keyboard: PathBuf,
    output: PathBuf,
    font: Option<PathBuf>,
) -> anyhow::Result<()> {
    let options = RenderOptions {
        overlay: OverlayOptions {
            font_path: font,
            ..OverlayOptions::default()
        },
    };
    let summary = generate_debug_video(&input, &mouse, &keyboard, &output, &options)
        .context("failed to render debug video")?;
    println!(
        "Wrote {} ({} frames, {:.2}s at {} fps)",
        summary.output.display(),
        summary.frames,
        summary.duration,
        summary.fps
    );
    Ok(())
}

fn replay(mouse: PathBuf, speed: f64) -> anyhow::Result<()> {
    let log = EventLog::load_mouse(&mouse).context("failed to load mouse log")?;
    let player = InputPlayer::from_log(&log, speed).context("failed to prepare playback")?;
    player.play().context("playback failed")?;
    println!("Replayed {} mouse moves.", player.len());
    Ok(())
}
