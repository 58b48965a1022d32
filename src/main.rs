//! termreel: play image sequences as truecolor text in the terminal

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use termreel::capture::ImageDirSource;
use termreel::convert::Converter;
use termreel::display::TerminalDisplay;
use termreel::store::{DirStore, FrameStore};
use termreel::{utils, Config, Encoder, Session};

#[derive(Parser)]
#[command(name = "termreel", version, about = "Play image sequences as truecolor text")]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = "termreel.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Encode `<index>.png` frames into `<index>.tframe` files
    Convert {
        /// Source frame directory
        #[arg(long)]
        frames: Option<PathBuf>,
        /// Output directory for encoded frames
        #[arg(long)]
        out: Option<PathBuf>,
        /// Number of frames; detected from the source directory if omitted
        #[arg(long)]
        count: Option<u64>,
        /// Per-channel color tolerance
        #[arg(long)]
        tolerance: Option<u8>,
    },
    /// Stream encoded frames to the terminal
    Play {
        /// Encoded frame directory
        #[arg(long)]
        store: Option<PathBuf>,
        /// Number of frames; detected from the store if omitted
        #[arg(long)]
        count: Option<u64>,
        /// Queue depth at which loading pauses
        #[arg(long)]
        watermark: Option<usize>,
        /// Frames to buffer before playback starts
        #[arg(long)]
        min_fill: Option<usize>,
        /// Pace playback to this many frames per second
        #[arg(long)]
        fps: Option<f64>,
        /// Do not clear the screen before playing
        #[arg(long)]
        no_clear: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize error handling and logging; stdout carries the frames
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "termreel=info".into()),
        )
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = Config::load(&cli.config)?;

    match cli.command {
        Command::Convert {
            frames,
            out,
            count,
            tolerance,
        } => {
            if let Some(frames) = frames {
                config.capture.frames_dir = frames;
            }
            if let Some(out) = out {
                config.store.dir = out;
            }
            if let Some(tolerance) = tolerance {
                config.encoder.tolerance = tolerance;
            }
            config.validate()?;
            convert(config, count).await
        }
        Command::Play {
            store,
            count,
            watermark,
            min_fill,
            fps,
            no_clear,
        } => {
            if let Some(store) = store {
                config.store.dir = store;
            }
            if let Some(watermark) = watermark {
                config.pipeline.watermark = watermark;
            }
            if let Some(min_fill) = min_fill {
                config.pipeline.min_fill = min_fill;
            }
            if fps.is_some() {
                config.player.target_fps = fps;
            }
            config.validate()?;
            play(config, count, !no_clear).await
        }
    }
}

async fn convert(config: Config, count: Option<u64>) -> Result<()> {
    let source = ImageDirSource::from_config(&config.capture);
    let total = match count {
        Some(n) => n,
        None => utils::auto_detect_frame_count(
            &config.capture.frames_dir.display().to_string(),
            |i| source.path_for(i).is_file(),
        )?,
    };
    let sink = DirStore::create(&config.store.dir)?;
    let converter = Converter::new(Encoder::with_tolerance(config.encoder.tolerance));

    info!("Converting {} frames", total);
    let report =
        tokio::task::spawn_blocking(move || converter.run(total, &source, &sink)).await?;

    for failure in &report.failures {
        error!("{}", failure);
    }
    if report.is_clean() {
        Ok(())
    } else {
        Err(eyre!(
            "{} of {} frames failed to convert",
            report.failures.len(),
            total
        ))
    }
}

async fn play(config: Config, count: Option<u64>, clear: bool) -> Result<()> {
    let store = DirStore::new(&config.store.dir);
    let total = match count {
        Some(n) => n,
        None => utils::auto_detect_frame_count(&config.store.dir.display().to_string(), |i| {
            store.exists(i)
        })?,
    };

    let session = Session::new(&config.pipeline, &config.player);
    let stop = session.stop_handle();

    let mut task = tokio::task::spawn_blocking(move || {
        let mut display = TerminalDisplay::stdout();
        if clear {
            display.clear()?;
        }
        let report = session.play(total, &store, &mut display);
        display.finish()?;
        Ok::<_, termreel::error::DisplayWriteError>(report)
    });

    let report = tokio::select! {
        joined = &mut task => joined??,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, stopping playback");
            stop.stop();
            task.await??
        }
    };

    // Wall-clock seconds of the player loop
    println!("{:.3}", report.elapsed.as_secs_f64());

    match report.into_result() {
        Ok(report) => {
            info!("Delivered {} frames", report.delivered);
            Ok(())
        }
        Err(fault) => Err(eyre!(
            "playback halted at frame {} ({}): {}",
            fault.index(),
            fault.kind(),
            fault
        )),
    }
}
