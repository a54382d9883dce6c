//! # Error Types
//!
//! Startup failures fall into two classes: a bad configuration or an
//! unavailable device. Both are fatal; nothing inside the event engine can fail.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Malformed, missing or unresolvable configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("unknown note name `{0}`")]
    UnknownNoteName(String),

    #[error("unknown key name `{0}`")]
    UnknownKeyName(String),

    #[error("note for key `{0}` must be a string")]
    NotAString(String),

    #[error("invalid value for `{field}`: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Audio input or virtual input device unavailable.
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("No input device available")]
    NoInputDevice,

    #[error("input device index {0} is out of range")]
    DeviceIndexOutOfRange(usize),

    #[error("No suitable f32 input format found")]
    NoSuitableConfig,

    #[error("sample rate {0} Hz is not supported by the input device")]
    UnsupportedSampleRate(u32),

    #[error("audio backend error: {0}")]
    Backend(String),

    #[error("virtual input device error: {0}")]
    VirtualDevice(#[from] io::Error),

    #[error("audio stream closed")]
    StreamClosed,
}

/// Top-level error returned by the pitchcon binary.
#[derive(Error, Debug)]
pub enum PitchconError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("device error: {0}")]
    Device(#[from] DeviceError),
}

impl PitchconError {
    /// Process exit code for this failure class.
    pub fn exit_code(&self) -> u8 {
        match self {
            PitchconError::Config(_) => 2,
            PitchconError::Device(_) => 3,
        }
    }
}
