// pitchcon-core/src/lib.rs

//! The core logic for pitchcon, a pitch-controlled virtual keyboard.
//! This crate turns audio into pitch estimates and pitch estimates into
//! key press and release events. It contains no device-specific output
//! code; the binary supplies the keyboard.

pub mod audio;
pub mod binding;
pub mod config;
pub mod driver;
pub mod engine;
pub mod error;
pub mod fft;
pub mod notes;
pub mod pitch;

pub use binding::NoteBinding;
pub use config::Config;
pub use driver::{Driver, EventSink};
pub use engine::{EngineState, EventEngine, KeyEvent, TimingConfig};
pub use error::{ConfigError, DeviceError, PitchconError};

/// One frame's pitch estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchSample {
    /// Estimated frequency in Hz; `0.0` when no pitch was found.
    pub frequency_hz: f32,
    /// Mean square of the frame. Not used for decisions.
    pub energy: f32,
}

impl PitchSample {
    pub fn new(frequency_hz: f32, energy: f32) -> Self {
        Self {
            frequency_hz,
            energy,
        }
    }
}
