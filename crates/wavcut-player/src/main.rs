//! wavcut player - terminal front-end for slicing and looping a sample
//!
//! Starts the audio backend, loads one file and reads line commands from
//! stdin. Type `help` at the prompt for the command list.
//!
//! ## Command line
//!
//! ```text
//! wavcut-player <file> [--config <path>]
//! wavcut-player --list-devices
//! ```

mod commands;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::thread;

use anyhow::{bail, Context, Result};
use crossbeam::channel::Receiver;

use commands::{LineCommand, HELP};
use wavcut_core::audio::{list_output_devices, start_audio_system};
use wavcut_core::audio_file::{decode, overview_peaks};
use wavcut_core::config::{default_config_path, load_config, WavcutConfig};
use wavcut_core::{PlaybackSystem, Player, PlayerOptions, PositionEvent};

struct Args {
    file: Option<PathBuf>,
    config: Option<PathBuf>,
    list_devices: bool,
}

fn parse_args() -> Result<Args> {
    let mut args = Args {
        file: None,
        config: None,
        list_devices: false,
    };
    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => {
                let path = iter.next().context("--config needs a path")?;
                args.config = Some(PathBuf::from(path));
            }
            "--list-devices" => args.list_devices = true,
            flag if flag.starts_with("--") => bail!("unknown flag {}", flag),
            file => {
                if args.file.replace(PathBuf::from(file)).is_some() {
                    bail!("only one file can be loaded");
                }
            }
        }
    }
    Ok(args)
}

fn main() -> Result<()> {
    // Set RUST_LOG=debug for verbose output
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = parse_args()?;
    if args.list_devices {
        for device in list_output_devices() {
            println!("{}", device);
        }
        return Ok(());
    }
    let Some(file) = args.file else {
        bail!("usage: wavcut-player <file> [--config <path>] [--list-devices]");
    };

    let config_path = args.config.unwrap_or_else(default_config_path);
    let config: WavcutConfig = load_config(&config_path);

    let PlaybackSystem {
        mut player,
        engine,
        reporter,
    } = PlaybackSystem::new(PlayerOptions::from(&config));

    let audio = start_audio_system(&config.audio, engine).context("Failed to start audio")?;
    log::info!(
        "{} backend running at {}Hz, {} frames (~{:.1}ms)",
        audio.backend_name(),
        audio.sample_rate(),
        audio.buffer_size(),
        audio.latency_ms()
    );
    let reporter = reporter
        .spawn(config.reporter_interval())
        .context("Failed to spawn position reporter")?;

    let buffer = decode(&file).with_context(|| format!("Failed to decode {:?}", file))?;
    player.load_sample(buffer).context("Failed to load sample")?;

    let events = reporter.subscribe();
    thread::Builder::new()
        .name("event-printer".to_string())
        .spawn(move || print_events(events))
        .context("Failed to spawn event printer")?;

    println!("Loaded {:?}. Type 'help' for commands.", file);
    run_prompt(&mut player)?;

    player.stop();
    reporter.stop();
    drop(audio);
    log::info!("wavcut-player exiting");
    Ok(())
}

/// Print state changes until the reporter goes away
fn print_events(events: Receiver<PositionEvent>) {
    let mut position = 0;
    for event in events {
        match event {
            PositionEvent::PositionChanged(frame) => {
                position = frame;
                log::trace!("position {}", frame);
            }
            PositionEvent::StateChanged(state) => {
                println!("[{:?} at frame {}]", state, position);
            }
        }
    }
}

fn run_prompt(player: &mut Player) -> Result<()> {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let Some(line) = lines.next() else {
            return Ok(());
        };
        let line = line.context("Failed to read stdin")?;
        if line.trim().is_empty() {
            continue;
        }

        match commands::parse(&line) {
            Ok(LineCommand::Quit) => return Ok(()),
            Ok(cmd) => execute(player, cmd),
            Err(e) => println!("{:#}", e),
        }
    }
}

fn execute(player: &mut Player, cmd: LineCommand) {
    match cmd {
        LineCommand::Play { start, end } => player.play(start, end),
        LineCommand::Loop { start, end } => player.loop_region(start, end),
        LineCommand::Pause => player.pause(),
        LineCommand::Stop => player.stop(),
        LineCommand::LoopStart(frame) => player.set_loop_start(frame),
        LineCommand::LoopEnd(frame) => player.set_loop_end(frame),
        LineCommand::Cut(frame) => {
            let index = player.cuts_mut().add(frame);
            println!("marker {} at frame {}", index, frame);
        }
        LineCommand::Uncut(frame) => {
            let cuts = player.cuts_mut();
            match cuts.nearest(frame).and_then(|index| cuts.remove(index)) {
                Some(removed) => println!("removed marker at frame {}", removed),
                None => println!("no markers"),
            }
        }
        LineCommand::Slice(frame) => match player.play_slice_at(frame) {
            Some((start, end)) => println!("playing slice {}..{}", start, end),
            None => println!("frame {} is not inside a slice", frame),
        },
        LineCommand::ListCuts => {
            let cuts = player.cuts();
            if cuts.is_empty() {
                println!("no markers");
            }
            for (index, frame) in cuts.markers().iter().enumerate() {
                println!("  marker {}: {}", index, frame);
            }
            for (start, end) in cuts.slices() {
                println!("  slice {}..{} ({} frames)", start, end, end - start);
            }
        }
        LineCommand::Overview(width) => match player.current_sample() {
            Some(sample) => print_overview(&overview_peaks(&sample, width)),
            None => println!("nothing loaded"),
        },
        LineCommand::Help => println!("{}", HELP),
        LineCommand::Quit => {}
    }
}

/// Draw min/max peaks as an eight-row block chart
fn print_overview(peaks: &[(f32, f32)]) {
    const ROWS: usize = 8;
    if peaks.is_empty() {
        println!("sample too short for that width");
        return;
    }
    for row in 0..ROWS {
        // Row 0 is +1.0, the last row -1.0
        let top = 1.0 - 2.0 * row as f32 / ROWS as f32;
        let bottom = top - 2.0 / ROWS as f32;
        let line: String = peaks
            .iter()
            .map(|&(lo, hi)| if hi >= bottom && lo <= top { '#' } else { ' ' })
            .collect();
        println!("|{}|", line);
    }
}
