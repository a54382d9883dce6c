//! # Note Bindings
//!
//! A binding ties a target frequency to the key it should press. The binding
//! table is built once at startup and its order is significant: when several
//! bindings fall within tolerance of the same pitch, the earliest one wins.

use crate::error::ConfigError;
use crate::notes;

/// One (target frequency, key) pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteBinding<K> {
    pub target_frequency_hz: f32,
    pub key: K,
}

impl<K> NoteBinding<K> {
    pub fn new(target_frequency_hz: f32, key: K) -> Self {
        Self {
            target_frequency_hz,
            key,
        }
    }

    /// True when `frequency_hz` lies strictly inside the tolerance band.
    pub fn matches(&self, frequency_hz: f32, tolerance_hz: f32) -> bool {
        (frequency_hz - self.target_frequency_hz).abs() < tolerance_hz
    }
}

/// Builds the binding table from (key name, note name) pairs.
///
/// `resolve_key` maps a key name to the device's key type and returns `None`
/// for names the device does not know. The output preserves input order.
///
/// # Errors
/// * `ConfigError::UnknownNoteName` - a note is not in the frequency table
/// * `ConfigError::UnknownKeyName` - `resolve_key` rejected a key name
pub fn build_bindings<'a, K, I, F>(
    pairs: I,
    mut resolve_key: F,
) -> Result<Vec<NoteBinding<K>>, ConfigError>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
    F: FnMut(&str) -> Option<K>,
{
    pairs
        .into_iter()
        .map(|(key_name, note_name)| {
            let frequency = notes::frequency_of(note_name)
                .ok_or_else(|| ConfigError::UnknownNoteName(note_name.to_string()))?;
            let key = resolve_key(key_name)
                .ok_or_else(|| ConfigError::UnknownKeyName(key_name.to_string()))?;
            Ok(NoteBinding::new(frequency, key))
        })
        .collect()
}
