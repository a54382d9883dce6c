//! # Pitchcon
//!
//! Creates a virtual keyboard driven by the pitch of the audio input. Each
//! configured note presses its key while it is being sung or played and
//! releases it when the note stops.
//!
//! ## Architecture
//! - **Audio thread**: CPAL callback cutting the input into fixed-size frames
//! - **Main thread**: the driver loop (estimate, decide, emit)
//! - **Communication**: crossbeam channels for frames and the Ctrl-C signal

mod keyboard;

use std::io::{self, BufRead, Write};
use std::process::ExitCode;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use pitchcon_core::audio::{self, InputDeviceInfo};
use pitchcon_core::config::{Config, CONFIG_FILE};
use pitchcon_core::pitch::YinEstimator;
use pitchcon_core::{Driver, EventEngine, PitchconError};

use keyboard::VirtualKeyboard;

/// Simple tool using uinput to create an input device driven by pitch.
#[derive(Parser, Debug)]
#[command(name = "pitchcon", about)]
struct Args {
    /// Show a prompt to choose an input device
    #[arg(short = 'c', long)]
    choose_input: bool,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{:#}", e);
            let code = e
                .downcast_ref::<PitchconError>()
                .map_or(1, PitchconError::exit_code);
            ExitCode::from(code)
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let config = Config::load(CONFIG_FILE).map_err(PitchconError::from)?;
    let bindings = config
        .bindings(keyboard::parse_key)
        .map_err(PitchconError::from)?;

    let device_index = if args.choose_input {
        Some(choose_input_device()?)
    } else {
        None
    };

    let capture = audio::start_audio_capture(device_index, config.sample_rate_hz, config.frame_size)
        .map_err(PitchconError::from)?;
    let keyboard = VirtualKeyboard::create(bindings.iter().map(|b| b.key))
        .map_err(PitchconError::from)?;

    let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(1);
    ctrlc::set_handler(move || {
        let _ = shutdown_tx.try_send(());
    })
    .context("failed to install Ctrl-C handler")?;

    let estimator = YinEstimator::new(capture.sample_rate(), config.frame_size, config.silence_db);
    let engine = EventEngine::new(bindings, config.timing());
    let mut driver = Driver::new(capture, estimator, engine, keyboard)
        .with_press_quiet(config.press_quiet);

    driver.run(&shutdown_rx).map_err(PitchconError::from)?;
    log::info!("Stopped cleanly");
    Ok(())
}

/// Lists the input devices and asks which one to use.
fn choose_input_device() -> Result<usize> {
    let devices = audio::list_input_devices().map_err(PitchconError::from)?;
    if devices.is_empty() {
        return Err(PitchconError::from(pitchcon_core::DeviceError::NoInputDevice).into());
    }

    println!("Choose input device:");
    for InputDeviceInfo { index, name } in &devices {
        println!("{}: {}", index, name);
    }

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("Which one? ");
        io::stdout().flush()?;

        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            return Err(anyhow!("no input device chosen"));
        }
        match line.trim().parse::<usize>() {
            Ok(index) if index < devices.len() => return Ok(index),
            _ => println!("Enter a number between 0 and {}", devices.len() - 1),
        }
    }
}
