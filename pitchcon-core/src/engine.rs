//! # Event Engine
//!
//! Turns a stream of pitch samples into key press and release transitions.
//!
//! The engine is a two-state machine, `Released` and `Held(key)`:
//!
//! ```text
//! Released --any match--> Held(first match)
//! Held(k)  --no match --> Released            (emits release of k)
//! Held(k)  --any match--> Held(k)             (no event)
//! ```
//!
//! Decisions are throttled by the click interval: a call arriving sooner than
//! `click_interval` after the previous decision is ignored outright.
//!
//! Two policies are intentional and observable:
//! - when several bindings match, the earliest binding in table order wins;
//! - while a key is held it is never swapped for another matching binding,
//!   even if the pitch drifts into a different binding's band. It stays down
//!   until no binding matches at all.
//!
//! The engine reads no clock and does no I/O; the caller supplies `now`.

use std::fmt;
use std::time::Duration;

use crate::binding::NoteBinding;
use crate::PitchSample;

/// Timing and matching parameters consumed by the engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingConfig {
    pub sample_rate_hz: u32,
    /// Minimum spacing between two decisions.
    pub click_interval: Duration,
    /// Half-width of the matching band around each binding.
    pub tolerance_hz: f32,
}

/// A key transition to apply to the output device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEvent<K> {
    Press(K),
    Release(K),
}

impl<K: Copy> KeyEvent<K> {
    pub fn key(&self) -> K {
        match *self {
            KeyEvent::Press(key) | KeyEvent::Release(key) => key,
        }
    }

    /// True for a press, false for a release.
    pub fn is_press(&self) -> bool {
        matches!(self, KeyEvent::Press(_))
    }
}

/// Mutable decision state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineState<K> {
    pub held_key: Option<K>,
    pub last_decision: Duration,
}

impl<K> EngineState<K> {
    pub fn is_held(&self) -> bool {
        self.held_key.is_some()
    }
}

impl<K> Default for EngineState<K> {
    fn default() -> Self {
        Self {
            held_key: None,
            last_decision: Duration::ZERO,
        }
    }
}

pub struct EventEngine<K> {
    bindings: Vec<NoteBinding<K>>,
    timing: TimingConfig,
    state: EngineState<K>,
}

impl<K> EventEngine<K>
where
    K: Copy + PartialEq + fmt::Debug,
{
    pub fn new(bindings: Vec<NoteBinding<K>>, timing: TimingConfig) -> Self {
        Self {
            bindings,
            timing,
            state: EngineState::default(),
        }
    }

    pub fn bindings(&self) -> &[NoteBinding<K>] {
        &self.bindings
    }

    pub fn timing(&self) -> &TimingConfig {
        &self.timing
    }

    pub fn state(&self) -> &EngineState<K> {
        &self.state
    }

    pub fn held_key(&self) -> Option<K> {
        self.state.held_key
    }

    /// Evaluates one pitch sample taken at `now`.
    ///
    /// Returns at most one release followed by at most one press. With the
    /// current state machine only one of the two can occur per call.
    pub fn evaluate(&mut self, sample: PitchSample, now: Duration) -> Vec<KeyEvent<K>> {
        let mut events = Vec::new();

        if now.saturating_sub(self.state.last_decision) < self.timing.click_interval {
            return events;
        }
        self.state.last_decision = now;

        // Table order decides ties.
        let first_match = self
            .bindings
            .iter()
            .find(|binding| binding.matches(sample.frequency_hz, self.timing.tolerance_hz))
            .map(|binding| binding.key);

        match (first_match, self.state.held_key) {
            (Some(key), None) => {
                log::debug!("press {:?} at {:.1} Hz", key, sample.frequency_hz);
                self.state.held_key = Some(key);
                events.push(KeyEvent::Press(key));
            }
            (None, Some(key)) => {
                log::debug!("release {:?} at {:.1} Hz", key, sample.frequency_hz);
                self.state.held_key = None;
                events.push(KeyEvent::Release(key));
            }
            // Held and still matching, or silent while released.
            _ => {}
        }

        events
    }

    /// Forgets a press the output device never received.
    ///
    /// Returns to `Released` only if `key` is the one currently held.
    pub fn abandon_press(&mut self, key: K) {
        if self.state.held_key == Some(key) {
            self.state.held_key = None;
        }
    }

    /// Drops the held key, if any, and returns its release event.
    ///
    /// Used on shutdown so no key is left pressed. Ignores the click interval.
    pub fn release_held(&mut self) -> Option<KeyEvent<K>> {
        self.state.held_key.take().map(KeyEvent::Release)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Key {
        A,
        B,
        C,
    }

    fn timing(click_ms: u64, tolerance_hz: f32) -> TimingConfig {
        TimingConfig {
            sample_rate_hz: 44100,
            click_interval: Duration::from_millis(click_ms),
            tolerance_hz,
        }
    }

    fn ms(t: u64) -> Duration {
        Duration::from_millis(t)
    }

    fn pitch(hz: f32) -> PitchSample {
        PitchSample::new(hz, 0.0)
    }

    fn engine(bindings: &[(f32, Key)], click_ms: u64) -> EventEngine<Key> {
        let bindings = bindings
            .iter()
            .map(|&(hz, key)| NoteBinding::new(hz, key))
            .collect();
        EventEngine::new(bindings, timing(click_ms, 5.0))
    }

    #[test]
    fn onset_hold_offset_scenario() {
        let mut engine = engine(&[(440.0, Key::A)], 0);
        let events: Vec<_> = [442.0, 442.0, 300.0, 300.0]
            .into_iter()
            .zip(0..)
            .map(|(hz, t)| engine.evaluate(pitch(hz), ms(t)))
            .collect();

        assert_eq!(
            events,
            vec![
                vec![KeyEvent::Press(Key::A)],
                vec![],
                vec![KeyEvent::Release(Key::A)],
                vec![],
            ]
        );
        assert!(!engine.state().is_held());
    }

    #[test]
    fn never_matching_emits_nothing() {
        let mut engine = engine(&[(440.0, Key::A), (523.25, Key::B)], 0);
        for (t, hz) in [0.0, 100.0, 300.0, 460.0, 1000.0, 0.0].into_iter().enumerate() {
            assert!(engine.evaluate(pitch(hz), ms(t as u64)).is_empty());
            assert_eq!(engine.held_key(), None);
        }
    }

    #[test]
    fn holding_is_idempotent_while_matching() {
        let mut engine = engine(&[(440.0, Key::A)], 10);
        assert_eq!(
            engine.evaluate(pitch(440.0), ms(10)),
            vec![KeyEvent::Press(Key::A)]
        );
        for t in (20..200).step_by(10) {
            assert!(engine.evaluate(pitch(438.0), ms(t)).is_empty());
            assert_eq!(engine.held_key(), Some(Key::A));
        }
    }

    #[test]
    fn first_binding_wins_ties() {
        let mut engine = engine(&[(277.18, Key::B), (277.18, Key::C)], 0);
        assert_eq!(
            engine.evaluate(pitch(277.0), ms(0)),
            vec![KeyEvent::Press(Key::B)]
        );
    }

    #[test]
    fn held_key_is_not_reassigned_when_pitch_drifts() {
        // Overlapping bands: 440 +/- 5 and 447 +/- 5.
        let mut engine = engine(&[(440.0, Key::A), (447.0, Key::B)], 0);
        assert_eq!(
            engine.evaluate(pitch(440.0), ms(0)),
            vec![KeyEvent::Press(Key::A)]
        );
        // Only B matches now, but A stays down.
        assert!(engine.evaluate(pitch(450.0), ms(1)).is_empty());
        assert_eq!(engine.held_key(), Some(Key::A));
        // Release is for the key that was pressed.
        assert_eq!(
            engine.evaluate(pitch(600.0), ms(2)),
            vec![KeyEvent::Release(Key::A)]
        );
    }

    #[test]
    fn gate_suppresses_decisions_inside_click_interval() {
        let mut engine = engine(&[(440.0, Key::A)], 100);
        assert_eq!(
            engine.evaluate(pitch(440.0), ms(100)),
            vec![KeyEvent::Press(Key::A)]
        );
        // Silence arrives too soon: ignored, key stays held.
        assert!(engine.evaluate(pitch(0.0), ms(150)).is_empty());
        assert_eq!(engine.held_key(), Some(Key::A));
        assert_eq!(engine.state().last_decision, ms(100));
        assert_eq!(
            engine.evaluate(pitch(0.0), ms(200)),
            vec![KeyEvent::Release(Key::A)]
        );
    }

    #[test]
    fn first_decision_waits_one_interval_from_start() {
        let mut engine = engine(&[(440.0, Key::A)], 100);
        assert!(engine.evaluate(pitch(440.0), ms(50)).is_empty());
        assert_eq!(engine.state().last_decision, Duration::ZERO);
        assert_eq!(
            engine.evaluate(pitch(440.0), ms(100)),
            vec![KeyEvent::Press(Key::A)]
        );
    }

    #[test]
    fn gate_advances_even_without_events() {
        let mut engine = engine(&[(440.0, Key::A)], 100);
        assert!(engine.evaluate(pitch(0.0), ms(120)).is_empty());
        assert_eq!(engine.state().last_decision, ms(120));
        // 120 + 100 not yet reached.
        assert!(engine.evaluate(pitch(440.0), ms(200)).is_empty());
        assert_eq!(
            engine.evaluate(pitch(440.0), ms(220)),
            vec![KeyEvent::Press(Key::A)]
        );
    }

    #[test]
    fn energy_does_not_influence_decisions() {
        let mut engine = engine(&[(440.0, Key::A)], 0);
        let loud_miss = PitchSample::new(300.0, 1.0);
        let quiet_hit = PitchSample::new(440.0, 0.0);
        assert!(engine.evaluate(loud_miss, ms(0)).is_empty());
        assert_eq!(
            engine.evaluate(quiet_hit, ms(1)),
            vec![KeyEvent::Press(Key::A)]
        );
    }

    #[test]
    fn release_held_on_shutdown() {
        let mut engine = engine(&[(440.0, Key::A)], 0);
        assert_eq!(engine.release_held(), None);
        engine.evaluate(pitch(440.0), ms(0));
        assert_eq!(engine.release_held(), Some(KeyEvent::Release(Key::A)));
        assert_eq!(engine.release_held(), None);
        assert!(!engine.state().is_held());
    }

    #[test]
    fn abandoned_press_returns_to_released() {
        let mut engine = engine(&[(440.0, Key::A)], 0);
        engine.evaluate(pitch(440.0), ms(0));
        engine.abandon_press(Key::B);
        assert_eq!(engine.held_key(), Some(Key::A));
        engine.abandon_press(Key::A);
        assert_eq!(engine.held_key(), None);
        assert_eq!(engine.release_held(), None);
        // The next matching decision presses again.
        assert_eq!(
            engine.evaluate(pitch(440.0), ms(1)),
            vec![KeyEvent::Press(Key::A)]
        );
    }

    #[test]
    fn clock_going_backwards_is_gated() {
        let mut engine = engine(&[(440.0, Key::A)], 10);
        engine.evaluate(pitch(0.0), ms(100));
        assert!(engine.evaluate(pitch(440.0), ms(50)).is_empty());
    }

    #[test]
    fn key_event_accessors() {
        assert_eq!(KeyEvent::Press(Key::C).key(), Key::C);
        assert!(KeyEvent::Press(Key::C).is_press());
        assert!(!KeyEvent::Release(Key::C).is_press());
    }
}
