//! # Configuration
//!
//! Pitchcon reads a single TOML file with an `[Input]` section for audio and
//! timing parameters and a `[Keys]` section mapping device key names to note
//! names:
//!
//! ```toml
//! [Input]
//! samplerate = 44100
//! clickinterval = 100   # ms
//! tolerance = 5.0       # Hz
//!
//! [Keys]
//! KEY_A = "A4"
//! KEY_S = "C#5"
//! ```
//!
//! `[Keys]` order is kept as written; it decides which binding wins when two
//! overlap.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::binding::{self, NoteBinding};
use crate::engine::TimingConfig;
use crate::error::ConfigError;

/// File name looked up in the working directory.
pub const CONFIG_FILE: &str = "Pitchcon.toml";

/// Samples consumed per estimator call unless overridden.
pub const DEFAULT_FRAME_SIZE: usize = 1024;
const MIN_FRAME_SIZE: usize = 64;

/// Estimator silence gate in dB unless overridden.
pub const DEFAULT_SILENCE_DB: f32 = -40.0;

/// Post-press quiet period as a fraction of the click interval.
const DEFAULT_QUIET_DIVISOR: f64 = 5.0;

#[derive(Deserialize)]
struct ConfigFile {
    #[serde(rename = "Input")]
    input: InputSection,
    #[serde(rename = "Keys")]
    keys: toml::Table,
}

#[derive(Deserialize)]
struct InputSection {
    samplerate: u32,
    clickinterval: f64,
    tolerance: f32,
    framesize: Option<usize>,
    silence: Option<f32>,
    pressquiet: Option<f64>,
    #[serde(flatten)]
    unknown: toml::Table,
}

/// Validated configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub sample_rate_hz: u32,
    pub click_interval: Duration,
    pub tolerance_hz: f32,
    pub frame_size: usize,
    pub silence_db: f32,
    pub press_quiet: Duration,
    keys: Vec<(String, String)>,
}

impl Config {
    /// Reads and validates a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&contents)?;
        log::info!(
            target: "config",
            "loaded {} with {} key binding(s)",
            path.display(),
            config.keys.len()
        );
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(contents)?;
        let input = file.input;
        for name in input.unknown.keys() {
            log::warn!(target: "config", "ignoring unknown [Input] key `{}`", name);
        }

        if input.samplerate == 0 {
            return Err(invalid("samplerate", "must be positive"));
        }
        if !(input.tolerance.is_finite() && input.tolerance > 0.0) {
            return Err(invalid("tolerance", "must be a positive number of Hz"));
        }
        let click_interval = millis("clickinterval", input.clickinterval)?;
        let press_quiet = match input.pressquiet {
            Some(ms) => millis("pressquiet", ms)?,
            None => click_interval.div_f64(DEFAULT_QUIET_DIVISOR),
        };
        let frame_size = input.framesize.unwrap_or(DEFAULT_FRAME_SIZE);
        if frame_size < MIN_FRAME_SIZE {
            return Err(invalid(
                "framesize",
                format!("must be at least {MIN_FRAME_SIZE} samples"),
            ));
        }
        let silence_db = input.silence.unwrap_or(DEFAULT_SILENCE_DB);
        if !silence_db.is_finite() {
            return Err(invalid("silence", "must be a finite dB value"));
        }

        let keys = file
            .keys
            .into_iter()
            .map(|(key, value)| match value {
                toml::Value::String(note) => Ok((key, note)),
                _ => Err(ConfigError::NotAString(key)),
            })
            .collect::<Result<Vec<_>, _>>()?;
        if keys.is_empty() {
            log::warn!(target: "config", "[Keys] is empty; no key will ever be pressed");
        }

        Ok(Self {
            sample_rate_hz: input.samplerate,
            click_interval,
            tolerance_hz: input.tolerance,
            frame_size,
            silence_db,
            press_quiet,
            keys,
        })
    }

    pub fn timing(&self) -> TimingConfig {
        TimingConfig {
            sample_rate_hz: self.sample_rate_hz,
            click_interval: self.click_interval,
            tolerance_hz: self.tolerance_hz,
        }
    }

    /// Configured (key name, note name) pairs in file order.
    pub fn key_names(&self) -> impl Iterator<Item = (&str, &str)> {
        self.keys.iter().map(|(k, n)| (k.as_str(), n.as_str()))
    }

    /// Builds the binding table, resolving key names with `resolve_key`.
    pub fn bindings<K, F>(&self, resolve_key: F) -> Result<Vec<NoteBinding<K>>, ConfigError>
    where
        F: FnMut(&str) -> Option<K>,
    {
        binding::build_bindings(self.key_names(), resolve_key)
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        reason: reason.into(),
    }
}

fn millis(field: &'static str, ms: f64) -> Result<Duration, ConfigError> {
    if !(ms.is_finite() && ms >= 0.0) {
        return Err(invalid(field, "must be a non-negative number of milliseconds"));
    }
    Duration::try_from_secs_f64(ms / 1000.0).map_err(|_| invalid(field, "is too large"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
[Input]
samplerate = 44100
clickinterval = 100
tolerance = 5

[Keys]
KEY_Z = "C4"
KEY_A = "A4"
KEY_M = "Db4"
"#;

    fn resolve(name: &str) -> Option<String> {
        name.starts_with("KEY_").then(|| name.to_string())
    }

    #[test]
    fn parses_required_fields_and_defaults() {
        let config = Config::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.sample_rate_hz, 44100);
        assert_eq!(config.click_interval, Duration::from_millis(100));
        assert_eq!(config.tolerance_hz, 5.0);
        assert_eq!(config.frame_size, DEFAULT_FRAME_SIZE);
        assert_eq!(config.silence_db, DEFAULT_SILENCE_DB);
        assert_eq!(config.press_quiet, Duration::from_millis(20));
    }

    #[test]
    fn keys_keep_file_order() {
        let config = Config::from_toml_str(SAMPLE).unwrap();
        let names: Vec<_> = config.key_names().map(|(k, _)| k).collect();
        assert_eq!(names, ["KEY_Z", "KEY_A", "KEY_M"]);

        let bindings = config.bindings(resolve).unwrap();
        assert_eq!(bindings[1].key, "KEY_A");
        assert!((bindings[1].target_frequency_hz - 440.0).abs() < 1e-3);
    }

    #[test]
    fn optional_fields_override_defaults() {
        let config = Config::from_toml_str(
            r#"
[Input]
samplerate = 48000
clickinterval = 50.5
tolerance = 2.5
framesize = 512
silence = -60
pressquiet = 0

[Keys]
"#,
        )
        .unwrap();
        assert_eq!(config.frame_size, 512);
        assert_eq!(config.silence_db, -60.0);
        assert_eq!(config.press_quiet, Duration::ZERO);
        assert!((config.click_interval.as_secs_f64() - 0.0505).abs() < 1e-9);
    }

    #[test]
    fn unknown_note_is_a_config_error() {
        let config = Config::from_toml_str(
            r#"
[Input]
samplerate = 44100
clickinterval = 100
tolerance = 5

[Keys]
KEY_A = "H4"
"#,
        )
        .unwrap();
        let err = config.bindings(resolve).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownNoteName(ref n) if n == "H4"));
    }

    #[test]
    fn missing_required_field_fails() {
        let err = Config::from_toml_str(
            r#"
[Input]
samplerate = 44100
tolerance = 5

[Keys]
KEY_A = "A4"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("clickinterval"));
    }

    #[test]
    fn missing_keys_section_fails() {
        let err = Config::from_toml_str(
            "[Input]\nsamplerate = 44100\nclickinterval = 100\ntolerance = 5\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn rejects_bad_values() {
        let base = |input: &str| format!("[Input]\n{input}\n[Keys]\nKEY_A = \"A4\"\n");

        let err = Config::from_toml_str(&base(
            "samplerate = 44100\nclickinterval = 1e300\ntolerance = 5",
        ))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "clickinterval", .. }));

        let err = Config::from_toml_str(&base(
            "samplerate = 44100\nclickinterval = 100\ntolerance = 5\npressquiet = 1e300",
        ))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "pressquiet", .. }));

        let err = Config::from_toml_str(&base(
            "samplerate = 44100\nclickinterval = 100\ntolerance = 0",
        ))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "tolerance", .. }));

        let err = Config::from_toml_str(&base(
            "samplerate = 44100\nclickinterval = -1\ntolerance = 5",
        ))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "clickinterval", .. }));

        let err = Config::from_toml_str(&base(
            "samplerate = 0\nclickinterval = 100\ntolerance = 5",
        ))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "samplerate", .. }));

        let err = Config::from_toml_str(&base(
            "samplerate = 44100\nclickinterval = 100\ntolerance = 5\nframesize = 8",
        ))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "framesize", .. }));
    }

    #[test]
    fn unknown_input_keys_are_ignored() {
        let config = Config::from_toml_str(
            "[Input]\nsamplerate = 44100\nclickinterval = 100\ntolerance = 5\nchannels = 1\n[Keys]\nKEY_A = \"A4\"\n",
        )
        .unwrap();
        assert_eq!(config.sample_rate_hz, 44100);
        assert_eq!(config.key_names().count(), 1);
    }

    #[test]
    fn non_string_note_fails() {
        let err = Config::from_toml_str(
            "[Input]\nsamplerate = 44100\nclickinterval = 100\ntolerance = 5\n[Keys]\nKEY_A = 440\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::NotAString(ref k) if k == "KEY_A"));
    }

    #[test]
    fn load_reads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.timing().tolerance_hz, 5.0);
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(dir.path().join(CONFIG_FILE)).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
