//! Capture phase controller.
//!
//! Owns the sample buffer and sequences an acquisition through
//! `PreTrigger → SearchTrigger → PostTrigger`, using one of two strategies:
//!
//! - *block*: a hardware block transfer fills the buffer; the trigger scan
//!   runs once when the transfer reaches the halfway point and may restart
//!   the transfer if nothing triggered.
//! - *per-sample*: every conversion arrives as an event; the controller
//!   writes the pre-trigger ring, runs the detector, then switches to linear
//!   writes.
//!
//! Ownership discipline: during an active capture only the sampling context
//! (via [`Sampler::on_event`]) writes the buffer and capture state; the main
//! loop polls [`Sampler::is_complete`] and touches nothing else until it
//! observes completion. The only main-loop writes are the stop request and
//! the deferred timebase change, both applied at defined safe points.
//!
//! A capture never fails: if the trigger search exhausts its budget the
//! controller falls back to whatever is in the buffer. A scope must show
//! something.

use crate::command::AcquisitionConfig;
use crate::config;
use crate::hal::SampleSource;
use crate::mailbox::Event;
use crate::ring::PreTriggerRing;
use crate::trigger::{Detector, TriggerStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CapturePhase {
    /// Filling the pre-trigger ring for the first time.
    PreTrigger,
    /// Ring is warm; the trigger detector is watching the stream.
    SearchTrigger,
    /// Trigger found (or search abandoned); writing linearly to the end.
    PostTrigger,
}

/// Transient per-acquisition state. Written by the sampling context while a
/// capture runs; the main loop reads it only after `buffer_full`.
#[derive(Debug, Clone, Copy)]
pub struct CaptureState {
    pub phase: CapturePhase,
    pub trigger: TriggerStatus,
    pub sample_count: u32,
    /// Remaining search budget: samples (per-sample) or transfer restarts
    /// (block).
    pub timeout_budget: u32,
    /// One past the last sample belonging to this acquisition. Set before
    /// capture starts; grows only on a stop request.
    pub end: usize,
    pub cursor: usize,
    pub buffer_full: bool,
    pub wrap_occurred: bool,
    /// Buffer index of the triggering sample, if one was found.
    pub triggered_at: Option<usize>,
    /// 0 = run free, 1 = stop after this acquisition, 2 = truncate now.
    pub stop_level: u8,
}

impl CaptureState {
    const fn idle() -> Self {
        Self {
            phase: CapturePhase::PreTrigger,
            trigger: TriggerStatus::Start,
            sample_count: 0,
            timeout_budget: 0,
            end: 0,
            cursor: 0,
            buffer_full: true,
            wrap_occurred: false,
            triggered_at: None,
            stop_level: 0,
        }
    }
}

pub struct Sampler {
    buffer: [u16; config::buffer::LEN],
    scratch: [u16; config::buffer::PRETRIGGER_LEN],
    ring: PreTriggerRing,
    detector: Detector,
    state: CaptureState,
    block_mode: bool,
}

impl Sampler {
    pub const fn new() -> Self {
        Self {
            buffer: [config::adc::INVALID_SAMPLE; config::buffer::LEN],
            scratch: [0; config::buffer::PRETRIGGER_LEN],
            ring: PreTriggerRing::new(),
            detector: Detector::new(),
            state: CaptureState::idle(),
            block_mode: false,
        }
    }

    pub fn state(&self) -> &CaptureState {
        &self.state
    }

    /// Capture finished; the main loop now owns the buffer until the next
    /// `start_capture`.
    pub fn is_complete(&self) -> bool {
        self.state.buffer_full
    }

    /// Whole physical buffer, for snapshotting.
    pub fn samples(&self) -> &[u16; config::buffer::LEN] {
        &self.buffer
    }

    /// Samples belonging to the completed acquisition.
    pub fn capture(&self) -> &[u16] {
        &self.buffer[..self.state.end]
    }

    /// One display width of samples starting at the trigger point (or at the
    /// start of the capture when nothing triggered).
    pub fn display_window(&self) -> &[u16] {
        let start = self.state.triggered_at.unwrap_or(0);
        let end = (start + config::display::WIDTH).min(self.state.end);
        &self.buffer[start..end]
    }

    /// Phase and cursor of the capture in flight, for draw-while-acquire.
    pub fn progress(&self) -> (CapturePhase, usize) {
        (self.state.phase, self.state.cursor)
    }

    /// Replace the buffer and capture state wholesale, from a restored
    /// snapshot. Must not be called while a capture is in flight.
    pub fn load(&mut self, samples: &[u16; config::buffer::LEN], state: CaptureState) {
        self.buffer = *samples;
        self.state = state;
    }

    /// Platform glue: copy a completed hardware block into the buffer before
    /// posting the matching event. Keeps the buffer owned here instead of
    /// handing raw pointers to the driver.
    pub fn block_write(&mut self, offset: usize, samples: &[u16]) {
        self.buffer[offset..offset + samples.len()].copy_from_slice(samples);
    }

    /// Begin a new acquisition. Main-loop side; must not be called while a
    /// capture is in flight.
    pub fn start_capture(&mut self, cfg: &AcquisitionConfig, source: &mut impl SampleSource) {
        self.ring.reset();
        self.detector.reset();
        self.buffer.fill(config::adc::INVALID_SAMPLE);

        self.block_mode =
            config::timebase::TABLE[cfg.timebase].block_capture && !cfg.draw_while_acquire;

        let searches = cfg.trigger_mode.searches();
        self.state = CaptureState {
            phase: if searches {
                CapturePhase::PreTrigger
            } else {
                CapturePhase::PostTrigger
            },
            trigger: TriggerStatus::Start,
            sample_count: 0,
            timeout_budget: if cfg.single_shot {
                // single-shot waits indefinitely for its trigger
                u32::MAX
            } else if self.block_mode {
                config::trigger::BLOCK_RESTART_BUDGET
            } else {
                sample_budget(cfg.timebase)
            },
            end: if cfg.single_shot {
                config::buffer::LEN
            } else {
                config::buffer::DEFAULT_END
            },
            cursor: 0,
            buffer_full: false,
            wrap_occurred: false,
            triggered_at: None,
            stop_level: if cfg.single_shot { 1 } else { 0 },
        };

        // degenerate configuration: nothing to capture
        if self.state.end == self.state.cursor {
            self.state.buffer_full = true;
            return;
        }

        #[cfg(feature = "defmt")]
        defmt::debug!(
            "capture start: block={} end={} budget={}",
            self.block_mode,
            self.state.end,
            self.state.timeout_budget
        );

        if self.block_mode {
            source.start_block_capture(config::buffer::LEN);
        } else {
            source.start_single_sample_capture();
        }
    }

    /// Stop request from the main loop. The first request lets the current
    /// acquisition run out to the full buffer so the final trace is
    /// complete; a second request truncates immediately.
    pub fn request_stop(&mut self, source: &mut impl SampleSource) {
        match self.state.stop_level {
            0 => {
                self.state.stop_level = 1;
                if !self.state.buffer_full {
                    self.state.end = config::buffer::LEN;
                }
            }
            _ => {
                self.state.stop_level = 2;
                if !self.state.buffer_full {
                    self.state.end = self.state.cursor;
                    self.finish(source);
                }
            }
        }
    }

    /// Sampling-context entry point: advance the capture by one hardware
    /// event. Must complete in bounded time.
    pub fn on_event(&mut self, cfg: &AcquisitionConfig, source: &mut impl SampleSource, event: Event) {
        if self.state.buffer_full {
            return;
        }
        match event {
            Event::SampleReady(raw) => {
                if !self.block_mode {
                    self.per_sample_step(cfg, source, raw);
                }
            }
            Event::BlockHalf => {
                if self.block_mode {
                    self.block_scan(cfg, source);
                }
            }
            Event::BlockComplete => {
                if self.block_mode {
                    // completion of the full transfer alone signals buffer-full
                    self.state.cursor = config::buffer::LEN;
                    self.state.end = config::buffer::LEN;
                    self.state.buffer_full = true;
                }
            }
        }
    }

    fn per_sample_step(&mut self, cfg: &AcquisitionConfig, source: &mut impl SampleSource, raw: u16) {
        self.state.sample_count = self.state.sample_count.wrapping_add(1);
        match self.state.phase {
            CapturePhase::PreTrigger => {
                let pre = &mut self.buffer[..config::buffer::PRETRIGGER_LEN];
                self.ring.write(pre, raw);
                self.state.wrap_occurred = self.ring.wrap_occurred();
                if self.ring.wrap_occurred() {
                    self.state.phase = CapturePhase::SearchTrigger;
                }
            }
            CapturePhase::SearchTrigger => {
                let pre = &mut self.buffer[..config::buffer::PRETRIGGER_LEN];
                self.ring.write(pre, raw);
                self.state.trigger = self.detector.evaluate(
                    raw,
                    cfg.trigger_level,
                    cfg.trigger_hysteresis,
                    cfg.slope,
                );
                if self.state.trigger == TriggerStatus::Triggered {
                    self.enter_post_trigger(Some(config::buffer::PRETRIGGER_LEN));
                } else {
                    self.state.timeout_budget = self.state.timeout_budget.saturating_sub(1);
                    if self.state.timeout_budget == 0 {
                        // no trigger in budget: fall back to what we have
                        self.enter_post_trigger(None);
                    }
                }
            }
            CapturePhase::PostTrigger => {
                self.buffer[self.state.cursor] = raw;
                self.state.cursor += 1;
                if self.state.cursor >= self.state.end {
                    self.finish(source);
                }
            }
        }
    }

    fn enter_post_trigger(&mut self, triggered_at: Option<usize>) {
        let pre = &mut self.buffer[..config::buffer::PRETRIGGER_LEN];
        self.ring.align(pre, &mut self.scratch);
        self.state.triggered_at = triggered_at;
        self.state.cursor = config::buffer::PRETRIGGER_LEN;
        self.state.phase = CapturePhase::PostTrigger;
    }

    fn block_scan(&mut self, cfg: &AcquisitionConfig, source: &mut impl SampleSource) {
        // half the transfer is known delivered; a mid-capture truncate must
        // keep it
        self.state.cursor = config::buffer::BLOCK_SCAN_AT;
        self.state.sample_count = self
            .state
            .sample_count
            .wrapping_add(config::buffer::BLOCK_SCAN_AT as u32);
        if !cfg.trigger_mode.searches() {
            return;
        }
        let scan = &self.buffer[..config::buffer::BLOCK_SCAN_AT];
        match self
            .detector
            .scan(scan, cfg.trigger_level, cfg.trigger_hysteresis, cfg.slope)
        {
            Some(i) => {
                self.state.trigger = TriggerStatus::Triggered;
                self.state.triggered_at = Some(i);
                self.state.phase = CapturePhase::PostTrigger;
            }
            None => {
                self.state.trigger = self.detector.status();
                if self.state.timeout_budget > 0 && self.state.stop_level == 0 {
                    // restart the transfer; armed state survives in the detector
                    self.state.timeout_budget -= 1;
                    self.state.cursor = 0;
                    source.stop();
                    source.start_block_capture(config::buffer::LEN);
                } else {
                    // out of budget: accept untriggered data
                    self.state.phase = CapturePhase::PostTrigger;
                }
            }
        }
    }

    fn finish(&mut self, source: &mut impl SampleSource) {
        self.state.buffer_full = true;
        source.stop();
        #[cfg(feature = "defmt")]
        defmt::debug!(
            "capture done: samples={} triggered={}",
            self.state.sample_count,
            self.state.triggered_at.is_some()
        );
    }
}

/// Per-sample trigger search budget: a fixed wall-clock window scaled by the
/// sample rate, floored so slow timebases still search a useful number of
/// samples.
fn sample_budget(timebase: usize) -> u32 {
    let ns_per_sample = config::timebase::TABLE[timebase].ns_per_sample;
    let samples = (u64::from(config::trigger::TIMEOUT_MS) * 1_000_000 / u64::from(ns_per_sample))
        .min(u32::MAX as u64) as u32;
    samples.max(config::trigger::MIN_TIMEOUT_SAMPLES)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{AcquisitionConfig, OffsetMode, TriggerMode};
    use crate::hal::SampleSource;

    #[derive(Default)]
    struct FakeSource {
        blocks: u32,
        singles: u32,
        stops: u32,
    }

    impl SampleSource for FakeSource {
        fn start_block_capture(&mut self, len: usize) {
            assert_eq!(len, config::buffer::LEN);
            self.blocks += 1;
        }
        fn start_single_sample_capture(&mut self) {
            self.singles += 1;
        }
        fn stop(&mut self) {
            self.stops += 1;
        }
    }

    fn per_sample_cfg() -> AcquisitionConfig {
        let mut cfg = AcquisitionConfig::default();
        cfg.timebase = 6; // 1ms/div, per-sample strategy
        cfg.trigger_mode = TriggerMode::Manual;
        cfg.trigger_level = 2048;
        cfg.trigger_hysteresis = 100;
        cfg.offset_mode = OffsetMode::Manual;
        cfg
    }

    /// Square wave generator straddling the trigger band.
    fn square(i: usize) -> u16 {
        if (i / 16) % 2 == 0 {
            1000
        } else {
            3000
        }
    }

    #[test]
    fn per_sample_capture_sequences_phases() {
        let cfg = per_sample_cfg();
        let mut source = FakeSource::default();
        let mut sampler = Sampler::new();
        sampler.start_capture(&cfg, &mut source);
        assert_eq!(source.singles, 1);
        assert_eq!(sampler.state().phase, CapturePhase::PreTrigger);

        let mut i = 0;
        while !sampler.is_complete() {
            sampler.on_event(&cfg, &mut source, Event::SampleReady(square(i)));
            i += 1;
            assert!(i < 100_000, "capture never completed");
        }
        let state = sampler.state();
        assert_eq!(state.phase, CapturePhase::PostTrigger);
        assert!(state.wrap_occurred);
        assert_eq!(state.triggered_at, Some(config::buffer::PRETRIGGER_LEN));
        assert_eq!(state.end, config::buffer::DEFAULT_END);
        assert_eq!(state.cursor, config::buffer::DEFAULT_END);
        assert_eq!(source.stops, 1);
        // a full display window exists after the trigger point
        assert_eq!(sampler.display_window().len(), config::display::WIDTH);
    }

    #[test]
    fn trigger_off_skips_search_phase() {
        let mut cfg = per_sample_cfg();
        cfg.trigger_mode = TriggerMode::Off;
        let mut source = FakeSource::default();
        let mut sampler = Sampler::new();
        sampler.start_capture(&cfg, &mut source);
        assert_eq!(sampler.state().phase, CapturePhase::PostTrigger);
        for i in 0..config::buffer::DEFAULT_END {
            assert!(!sampler.is_complete());
            sampler.on_event(&cfg, &mut source, Event::SampleReady(i as u16));
        }
        assert!(sampler.is_complete());
        assert_eq!(sampler.capture()[0], 0);
    }

    #[test]
    fn constant_input_times_out_but_still_succeeds() {
        let cfg = per_sample_cfg();
        let mut source = FakeSource::default();
        let mut sampler = Sampler::new();
        sampler.start_capture(&cfg, &mut source);
        let budget = sampler.state().timeout_budget;
        // enough events to fill the ring, exhaust the budget, and finish
        let enough = config::buffer::PRETRIGGER_LEN as u32 + budget + config::display::WIDTH as u32 + 10;
        for _ in 0..enough {
            if sampler.is_complete() {
                break;
            }
            sampler.on_event(&cfg, &mut source, Event::SampleReady(2048));
        }
        assert!(sampler.is_complete(), "timeout must still complete");
        assert_eq!(sampler.state().triggered_at, None);
        assert_eq!(sampler.state().trigger, TriggerStatus::Start);
    }

    #[test]
    fn first_stop_extends_second_truncates() {
        let cfg = per_sample_cfg();
        let mut source = FakeSource::default();
        let mut sampler = Sampler::new();
        sampler.start_capture(&cfg, &mut source);
        for i in 0..400 {
            sampler.on_event(&cfg, &mut source, Event::SampleReady(square(i)));
        }
        assert!(!sampler.is_complete());
        sampler.request_stop(&mut source);
        assert_eq!(sampler.state().end, config::buffer::LEN);
        assert!(!sampler.is_complete());
        sampler.request_stop(&mut source);
        assert!(sampler.is_complete());
        assert_eq!(sampler.state().end, sampler.state().cursor);
    }

    #[test]
    fn single_shot_waits_indefinitely_then_stops() {
        let mut cfg = per_sample_cfg();
        cfg.single_shot = true;
        let mut source = FakeSource::default();
        let mut sampler = Sampler::new();
        sampler.start_capture(&cfg, &mut source);
        assert_eq!(sampler.state().timeout_budget, u32::MAX);
        assert_eq!(sampler.state().end, config::buffer::LEN);
        assert_eq!(sampler.state().stop_level, 1);
        // constant input far longer than any normal budget: still searching
        for _ in 0..20_000 {
            sampler.on_event(&cfg, &mut source, Event::SampleReady(2048));
        }
        assert!(!sampler.is_complete());
        // the trigger finally arrives
        sampler.on_event(&cfg, &mut source, Event::SampleReady(1000));
        sampler.on_event(&cfg, &mut source, Event::SampleReady(3000));
        assert_eq!(sampler.state().phase, CapturePhase::PostTrigger);
        while !sampler.is_complete() {
            sampler.on_event(&cfg, &mut source, Event::SampleReady(2048));
        }
        assert_eq!(sampler.state().end, config::buffer::LEN);
    }

    fn block_cfg() -> AcquisitionConfig {
        let mut cfg = per_sample_cfg();
        cfg.timebase = 0; // 10us/div, block strategy
        cfg
    }

    #[test]
    fn block_capture_triggers_at_scan_point() {
        let cfg = block_cfg();
        let mut source = FakeSource::default();
        let mut sampler = Sampler::new();
        sampler.start_capture(&cfg, &mut source);
        assert_eq!(source.blocks, 1);

        let half: Vec<u16> = (0..config::buffer::BLOCK_SCAN_AT).map(square).collect();
        sampler.block_write(0, &half);
        sampler.on_event(&cfg, &mut source, Event::BlockHalf);
        let trig = sampler.state().triggered_at.expect("should trigger");
        assert!(trig < config::buffer::BLOCK_SCAN_AT);
        assert!(!sampler.is_complete());

        sampler.on_event(&cfg, &mut source, Event::BlockComplete);
        assert!(sampler.is_complete());
        assert_eq!(sampler.state().end, config::buffer::LEN);
        assert_eq!(sampler.display_window().len(), config::display::WIDTH);
    }

    #[test]
    fn block_capture_restarts_on_missing_trigger() {
        let cfg = block_cfg();
        let mut source = FakeSource::default();
        let mut sampler = Sampler::new();
        sampler.start_capture(&cfg, &mut source);
        let budget = sampler.state().timeout_budget;

        let flat = vec![2048u16; config::buffer::BLOCK_SCAN_AT];
        sampler.block_write(0, &flat);
        sampler.on_event(&cfg, &mut source, Event::BlockHalf);
        assert_eq!(source.blocks, 2, "transfer should restart");
        assert_eq!(sampler.state().timeout_budget, budget - 1);
        assert!(!sampler.is_complete());

        // exhaust the restart budget
        for _ in 1..budget {
            sampler.on_event(&cfg, &mut source, Event::BlockHalf);
        }
        sampler.on_event(&cfg, &mut source, Event::BlockHalf);
        assert_eq!(sampler.state().phase, CapturePhase::PostTrigger);
        assert_eq!(sampler.state().triggered_at, None);
        sampler.on_event(&cfg, &mut source, Event::BlockComplete);
        assert!(sampler.is_complete());
    }

    #[test]
    fn block_restart_preserves_armed_state() {
        let cfg = block_cfg();
        let mut source = FakeSource::default();
        let mut sampler = Sampler::new();
        sampler.start_capture(&cfg, &mut source);

        // first block arms (goes below 2048-100) but never crosses the level
        let armed = vec![1000u16; config::buffer::BLOCK_SCAN_AT];
        sampler.block_write(0, &armed);
        sampler.on_event(&cfg, &mut source, Event::BlockHalf);
        assert_eq!(sampler.state().trigger, TriggerStatus::BelowThreshold);

        // restarted block only contains the crossing itself
        let crossing = vec![3000u16; config::buffer::BLOCK_SCAN_AT];
        sampler.block_write(0, &crossing);
        sampler.on_event(&cfg, &mut source, Event::BlockHalf);
        assert_eq!(sampler.state().triggered_at, Some(0));
    }

    #[test]
    fn block_truncate_keeps_the_scanned_half() {
        let cfg = block_cfg();
        let mut source = FakeSource::default();
        let mut sampler = Sampler::new();
        sampler.start_capture(&cfg, &mut source);

        let half: Vec<u16> = (0..config::buffer::BLOCK_SCAN_AT).map(square).collect();
        sampler.block_write(0, &half);
        sampler.on_event(&cfg, &mut source, Event::BlockHalf);
        assert!(sampler.state().triggered_at.is_some());

        // stop twice while the second half of the transfer is still in flight
        sampler.request_stop(&mut source);
        sampler.request_stop(&mut source);
        assert!(sampler.is_complete());
        assert_eq!(sampler.capture().len(), config::buffer::BLOCK_SCAN_AT);
        assert!(!sampler.display_window().is_empty());
    }

    #[test]
    fn buffer_starts_sentinel_filled_for_partial_draws() {
        // draw-while-acquire renders mid-capture; anything not yet written
        // must read as the sentinel, never as a stale previous trace
        let cfg = per_sample_cfg();
        let mut source = FakeSource::default();
        let mut sampler = Sampler::new();
        sampler.start_capture(&cfg, &mut source);
        for i in 0..10 {
            sampler.on_event(&cfg, &mut source, Event::SampleReady(square(i)));
        }
        let (phase, _) = sampler.progress();
        assert_eq!(phase, CapturePhase::PreTrigger);
        assert!(sampler.samples()[10..]
            .iter()
            .all(|&s| s == config::adc::INVALID_SAMPLE));
    }

    #[test]
    fn double_stop_truncates_to_empty_before_data() {
        let mut cfg = per_sample_cfg();
        cfg.timebase = 15;
        let mut source = FakeSource::default();
        let mut sampler = Sampler::new();
        sampler.start_capture(&cfg, &mut source);
        sampler.request_stop(&mut source);
        sampler.request_stop(&mut source);
        assert!(sampler.is_complete());
        assert!(sampler.capture().is_empty());
        assert!(sampler.display_window().is_empty());
    }
}
