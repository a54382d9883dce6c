//! # Driver Loop
//!
//! Owns the sample source, estimator, engine and output sink and runs them
//! in strict sequence: read a frame, estimate its pitch, evaluate, apply the
//! resulting events. Only this loop ever calls the engine.
//!
//! After a press the loop pauses for the configured quiet period before
//! reading again, so one onset cannot re-trigger within the same window.
//!
//! A key held when the loop ends is released on the way out, whether the loop
//! stopped on request, on an error, or the driver was dropped while unwinding.

use std::fmt;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;

use crate::audio::SampleSource;
use crate::engine::{EventEngine, KeyEvent};
use crate::error::DeviceError;
use crate::pitch::{self, FrequencyEstimator};
use crate::{notes, PitchSample};

/// Receives key transitions, typically a virtual keyboard.
pub trait EventSink<K> {
    fn apply(&mut self, key: K, pressed: bool) -> Result<(), DeviceError>;
}

pub struct Driver<K, S, E, O>
where
    K: Copy + PartialEq + fmt::Debug,
    O: EventSink<K>,
{
    source: S,
    estimator: E,
    engine: EventEngine<K>,
    sink: O,
    press_quiet: Duration,
    started: Instant,
}

impl<K, S, E, O> Driver<K, S, E, O>
where
    K: Copy + PartialEq + fmt::Debug,
    S: SampleSource,
    E: FrequencyEstimator,
    O: EventSink<K>,
{
    pub fn new(source: S, estimator: E, engine: EventEngine<K>, sink: O) -> Self {
        Self {
            source,
            estimator,
            engine,
            sink,
            press_quiet: Duration::ZERO,
            started: Instant::now(),
        }
    }

    /// Pause applied after every press before the next frame is read.
    pub fn with_press_quiet(mut self, press_quiet: Duration) -> Self {
        self.press_quiet = press_quiet;
        self
    }

    pub fn engine(&self) -> &EventEngine<K> {
        &self.engine
    }

    pub fn sink(&self) -> &O {
        &self.sink
    }

    /// Runs until a message arrives on `shutdown` or an error occurs, then
    /// releases any held key.
    pub fn run(&mut self, shutdown: &Receiver<()>) -> Result<(), DeviceError> {
        log::info!(
            "Listening for {} binding(s), click interval {:?}, tolerance {} Hz",
            self.engine.bindings().len(),
            self.engine.timing().click_interval,
            self.engine.timing().tolerance_hz
        );
        let result = self.run_until_shutdown(shutdown);
        if let Err(e) = &result {
            log::error!("Processing loop stopped: {}", e);
        }
        let released = self.release_held();
        result.and(released)
    }

    fn run_until_shutdown(&mut self, shutdown: &Receiver<()>) -> Result<(), DeviceError> {
        loop {
            if shutdown.try_recv().is_ok() {
                log::info!("Shutdown requested");
                return Ok(());
            }

            let Some(frame) = self.source.read()? else {
                continue;
            };
            let now = self.started.elapsed();
            let events = self.process_frame(&frame, now)?;

            if !self.press_quiet.is_zero() && events.iter().any(KeyEvent::is_press) {
                thread::sleep(self.press_quiet);
            }
        }
    }

    /// Estimates, evaluates and applies one frame observed at `now`.
    pub fn process_frame(
        &mut self,
        frame: &[f32],
        now: Duration,
    ) -> Result<Vec<KeyEvent<K>>, DeviceError> {
        let sample = PitchSample::new(self.estimator.estimate(frame), pitch::frame_energy(frame));
        if sample.frequency_hz > 0.0 && log::log_enabled!(log::Level::Trace) {
            if let Some(note) = notes::find_nearest_note(sample.frequency_hz) {
                log::trace!(
                    "{:.2} Hz (~{} {:+.0} cents)",
                    sample.frequency_hz,
                    note.name,
                    notes::calculate_cents_deviation(sample.frequency_hz, note.frequency)
                );
            }
        }

        let events = self.engine.evaluate(sample, now);
        for event in &events {
            if let Err(e) = self.sink.apply(event.key(), event.is_press()) {
                if event.is_press() {
                    self.engine.abandon_press(event.key());
                }
                return Err(e);
            }
        }
        Ok(events)
    }

    /// Releases the held key, if any, on the sink.
    pub fn release_held(&mut self) -> Result<(), DeviceError> {
        match self.engine.release_held() {
            Some(event) => {
                log::info!("Releasing held key {:?}", event.key());
                self.sink.apply(event.key(), false)
            }
            None => Ok(()),
        }
    }
}

impl<K, S, E, O> Drop for Driver<K, S, E, O>
where
    K: Copy + PartialEq + fmt::Debug,
    O: EventSink<K>,
{
    fn drop(&mut self) {
        if let Some(event) = self.engine.release_held() {
            if let Err(e) = self.sink.apply(event.key(), false) {
                log::error!("Failed to release {:?} on exit: {}", event.key(), e);
            }
        }
    }
}
