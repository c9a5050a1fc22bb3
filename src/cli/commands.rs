//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context};
use tracing::info;

use crate::cli::SessionArgs;
use crate::config::EngineConfig;
use crate::context::{EngineListener, PhantomContext};
use crate::engine::buffer::peak_db;
use crate::engine::clip::{validate_upload, TrackSlot};
use crate::engine::decoder::AudioDecoder;
use crate::engine::io::{export_interleaved, BitDepth};
use crate::engine::output::{AudioOutput, OfflineOutput};
use crate::engine::params::TrackMode;
use crate::engine::transport::PlaybackState;
use crate::error::ErrorKind;

/// Frames pulled per offline render block
const RENDER_BLOCK_FRAMES: usize = 1024;

/// Prints status changes to stdout
struct ConsoleListener;

impl EngineListener for ConsoleListener {
    fn on_status_changed(&mut self, message: &str) {
        println!("Status: {}", message);
    }

    fn on_track_ready(&mut self, slot: TrackSlot, duration_seconds: f64) {
        println!("Track {} ready ({:.2}s)", slot, duration_seconds);
    }

    fn on_error(&mut self, kind: ErrorKind, message: &str) {
        eprintln!("Error ({}): {}", kind, message);
    }
}

fn read_file(path: &Path) -> anyhow::Result<(String, Vec<u8>)> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok((name, bytes))
}

fn load_config(args: &SessionArgs) -> anyhow::Result<EngineConfig> {
    match &args.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(EngineConfig::default()),
    }
}

/// Build a context, upload the tracks and apply the parameters
fn prepare(
    args: &SessionArgs,
    config: &EngineConfig,
    output: Box<dyn AudioOutput>,
) -> anyhow::Result<PhantomContext> {
    let mut ctx = PhantomContext::new(output, config).with_listener(Box::new(ConsoleListener));

    let params = args.apply(config.defaults);
    ctx.set_parameters(params)
        .context("Invalid playback parameters")?;

    let (name, bytes) = read_file(&args.track1)?;
    ctx.upload_track(TrackSlot::One, &name, bytes)
        .with_context(|| format!("Track 1 ({}) was rejected", args.track1.display()))?;

    if let Some(path) = &args.track2 {
        if params.track_mode == TrackMode::Single {
            info!("Single mode selected, track 2 will not be played");
        }
        let (name, bytes) = read_file(path)?;
        ctx.upload_track(TrackSlot::Two, &name, bytes)
            .with_context(|| format!("Track 2 ({}) was rejected", path.display()))?;
    }

    Ok(ctx)
}

/// Play a session on the output device until it completes.
#[cfg(feature = "device")]
pub fn play(args: &SessionArgs) -> anyhow::Result<()> {
    use crate::engine::output::CpalOutput;

    let config = load_config(args)?;
    let output = CpalOutput::open(&config.output).context("Failed to open audio output")?;
    let mut ctx = prepare(args, &config, Box::new(output))?;

    ctx.play().context("Failed to start playback")?;
    while ctx.state() != PlaybackState::Stopped {
        ctx.wait_for_events(Duration::from_millis(100));
    }

    if let Some(session) = ctx.session() {
        println!("Played {:.2}s", session.elapsed().as_secs_f64());
    }

    Ok(())
}

/// Play a session on the output device until it completes.
#[cfg(not(feature = "device"))]
pub fn play(_args: &SessionArgs) -> anyhow::Result<()> {
    bail!("phantom-cli was built without the `device` feature; use `render` instead")
}

/// Render a complete session to a stereo WAV file.
pub fn render(args: &SessionArgs, out: &Path, sample_rate: u32) -> anyhow::Result<()> {
    let config = load_config(args)?;
    let output = OfflineOutput::new(sample_rate, 2);
    let mut ctx = prepare(args, &config, Box::new(output.clone()))?;

    ctx.play().context("Failed to start playback")?;

    let finish = ctx
        .session()
        .and_then(|s| s.graph())
        .map(|g| g.finish_time())
        .unwrap_or(Duration::ZERO);
    // One spare second of blocks before giving up
    let max_frames = ((finish.as_secs_f64() + 1.0) * sample_rate as f64) as usize;

    let mut frames = Vec::new();
    let mut rendered = 0;
    while ctx.state() != PlaybackState::Stopped {
        if rendered >= max_frames {
            bail!("Session did not complete after {} frames", rendered);
        }
        frames.extend(output.render(RENDER_BLOCK_FRAMES));
        rendered += RENDER_BLOCK_FRAMES;
        ctx.process_events();
    }

    export_interleaved(out, &frames, 2, sample_rate, BitDepth::Int16)
        .with_context(|| format!("Failed to write {}", out.display()))?;

    println!(
        "Rendered {:.2}s to {}",
        rendered as f64 / sample_rate as f64,
        out.display()
    );

    Ok(())
}

/// Validate and decode a file, then print its properties.
pub fn probe(file: &Path, slot: u8) -> anyhow::Result<()> {
    let slot = TrackSlot::from_number(slot).context("Slot must be 1 or 2")?;
    let (name, bytes) = read_file(file)?;
    let size = bytes.len();

    validate_upload(slot, &name, &bytes)?;
    let clip = AudioDecoder::for_slot(slot)
        .decode(bytes, &name)
        .with_context(|| format!("Failed to decode {}", file.display()))?;

    let buffer = clip.buffer();
    println!("File:        {}", clip.filename());
    println!("Size:        {} bytes (track {} limit {})", size, slot, slot.max_upload_bytes());
    println!("Channels:    {}", buffer.channels());
    println!("Sample rate: {} Hz", clip.sample_rate());
    println!("Duration:    {:.3}s", clip.duration_seconds());
    println!("Peak:        {:.1} dBFS", peak_db(&buffer.to_mono()));
    println!("SHA-256:     {}", clip.checksum());

    Ok(())
}
