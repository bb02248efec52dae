//! Tracker module player CLI
//!
//! Command-line player built on the modplay playback adapter:
//! - Three-buffer output queue through the system audio device
//! - Keyboard transport control and channel muting
//! - Single-line status display fed by adapter events

mod args;
mod controls;
mod display;
mod player_factory;

use anyhow::{Context, Result, bail};
use args::CliArgs;
use controls::run_control_loop;
use display::describe_module;
use modplay::{PlaybackAdapter, PlayerConfig, RodioBackend};
use modplay_common::{BUFFER_COUNT, MODULE_EXTENSIONS};
use player_factory::create_decoder;
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("modplay=info")),
        )
        .init();

    let args = CliArgs::parse();

    if args.list_extensions {
        println!("wav (render)");
        for extension in MODULE_EXTENSIONS {
            if *extension == "mod" {
                println!("{extension}");
            } else {
                println!("{extension} (recognised, no bundled decoder)");
            }
        }
        return Ok(());
    }

    if args.show_help {
        CliArgs::print_help();
        return if args.file_path.is_none() {
            Ok(())
        } else {
            bail!("invalid arguments")
        };
    }

    let Some(file_path) = args.file_path else {
        CliArgs::print_help();
        bail!("no file given");
    };

    let mut config = match args.config_path {
        Some(ref path) => PlayerConfig::from_json_file(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => PlayerConfig::default(),
    };
    if let Some(volume) = args.volume {
        config = config.with_volume(volume);
    }

    println!("Module Player - Tracker Module Playback");
    println!("=======================================\n");

    let decoder = create_decoder(&file_path)?;
    let adapter = PlaybackAdapter::new(decoder, Arc::new(RodioBackend::new()), &config)?;
    let events = adapter.subscribe();

    let module = adapter
        .play_file(&file_path)
        .with_context(|| format!("playing {}", file_path.display()))?;

    println!("File Information:");
    println!("{}\n", describe_module(&module));
    println!("Output Configuration:");
    println!("  Format:      {}", config.format());
    println!(
        "  Buffers:     {} x {} bytes ({:.1}ms in flight)",
        BUFFER_COUNT,
        config.buffer_byte_size,
        config.latency_ms()
    );
    println!("  Volume:      {:.2}\n", adapter.volume());
    println!("Keys: [space] play/pause [s] stop [p] play [n/b] position [</>] seek [1-9] mute [q] quit\n");

    let playback_start = Instant::now();
    run_control_loop(&adapter, &events, &module)?;

    let total_time = playback_start.elapsed();
    let stats = adapter.stats();
    drop(adapter);
    println!("\n=== Playback Statistics ===");
    println!("Duration:          {:.2} seconds", total_time.as_secs_f32());
    println!("Frames decoded:    {}", stats.frames_decoded);
    println!("Buffers enqueued:  {}", stats.buffers_enqueued);
    println!("Stale drains:      {}", stats.stale_drains);
    println!("Dropped drains:    {}", stats.dropped_drains);

    Ok(())
}
