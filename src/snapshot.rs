//! Snapshot persistence: one fixed-layout blob holding the configuration,
//! capture state and sample buffer.
//!
//! Scalar fields are packed little-endian at fixed offsets; the sample
//! payload is cast in place (all supported targets are little-endian).
//! Decoding is defensive: a bad magic, version or length rejects the blob
//! outright, while out-of-range indices and cursors are clamped so a stale
//! but well-formed blob can never index out of bounds.

use crate::command::{AcquisitionConfig, OffsetMode, TriggerMode};
use crate::config;
use crate::math::Truncate;
use crate::sampler::{CapturePhase, CaptureState};
use crate::trigger::{Slope, TriggerStatus};
use byte_slice_cast::{AsByteSlice, AsMutByteSlice};

const CONFIG_AT: usize = config::snapshot::HEADER_LEN;
const STATE_AT: usize = CONFIG_AT + config::snapshot::CONFIG_LEN;
const SAMPLES_AT: usize = STATE_AT + config::snapshot::STATE_LEN;

/// `triggered_at` has no dedicated presence flag; this value means none.
const NO_TRIGGER: u16 = u16::MAX;

pub struct Snapshot {
    pub config: AcquisitionConfig,
    pub state: CaptureState,
    pub samples: [u16; config::buffer::LEN],
}

impl Snapshot {
    pub fn capture(
        config: &AcquisitionConfig,
        state: &CaptureState,
        samples: &[u16; config::buffer::LEN],
    ) -> Self {
        let mut config = config.clone();
        // a deferred timebase step is transient, not part of the snapshot
        config.pending_timebase = None;
        Self {
            config,
            state: *state,
            samples: *samples,
        }
    }

    pub fn encode(&self, out: &mut [u8; config::snapshot::LEN]) {
        out.fill(0);
        out[..4].copy_from_slice(&config::snapshot::MAGIC);
        out[4..6].copy_from_slice(&config::snapshot::VERSION.to_le_bytes());

        let cfg = &self.config;
        let c = &mut out[CONFIG_AT..STATE_AT];
        let timebase: u16 = cfg.timebase.truncate();
        c[0..2].copy_from_slice(&timebase.to_le_bytes());
        c[2] = cfg.trigger_mode as u8;
        c[3] = cfg.slope as u8;
        c[4] = cfg.offset_mode as u8;
        c[5] = u8::from(cfg.bipolar)
            | u8::from(cfg.draw_while_acquire) << 1
            | u8::from(cfg.single_shot) << 2
            | u8::from(cfg.running) << 3;
        c[6..8].copy_from_slice(&cfg.trigger_level.to_le_bytes());
        c[8..10].copy_from_slice(&cfg.trigger_hysteresis.to_le_bytes());
        let input_range: u16 = cfg.input_range.truncate();
        c[10..12].copy_from_slice(&input_range.to_le_bytes());
        let display_range: u16 = cfg.display_range.truncate();
        c[12..14].copy_from_slice(&display_range.to_le_bytes());
        c[14..16].copy_from_slice(&cfg.display_offset.to_le_bytes());
        // c[16..20] reserved

        let state = &self.state;
        let s = &mut out[STATE_AT..SAMPLES_AT];
        s[0] = state.phase as u8;
        s[1] = state.trigger as u8;
        s[2..6].copy_from_slice(&state.sample_count.to_le_bytes());
        let end: u16 = state.end.truncate();
        s[6..8].copy_from_slice(&end.to_le_bytes());
        let cursor: u16 = state.cursor.truncate();
        s[8..10].copy_from_slice(&cursor.to_le_bytes());
        let triggered_at = match state.triggered_at {
            Some(i) => i.truncate(),
            None => NO_TRIGGER,
        };
        s[10..12].copy_from_slice(&triggered_at.to_le_bytes());
        s[12] = u8::from(state.buffer_full) | u8::from(state.wrap_occurred) << 1;
        s[13] = state.stop_level;

        out[SAMPLES_AT..].copy_from_slice(self.samples.as_byte_slice());
    }

    /// Decode a blob, rejecting anything that is not exactly one snapshot
    /// from a compatible firmware.
    pub fn decode(blob: &[u8]) -> Option<Self> {
        if blob.len() != config::snapshot::LEN {
            return None;
        }
        if blob[..4] != config::snapshot::MAGIC {
            return None;
        }
        if u16_at(blob, 4) != config::snapshot::VERSION {
            return None;
        }

        let c = &blob[CONFIG_AT..STATE_AT];
        let config = AcquisitionConfig {
            timebase: clamp_index(u16_at(c, 0), config::timebase::COUNT),
            pending_timebase: None,
            trigger_mode: trigger_mode(c[2])?,
            slope: slope(c[3])?,
            trigger_level: u16_at(c, 6).min(config::adc::MAX_CONVERSION_VALUE),
            trigger_hysteresis: u16_at(c, 8).min(config::adc::MAX_CONVERSION_VALUE),
            input_range: clamp_index(u16_at(c, 10), config::range::COUNT),
            display_range: clamp_index(u16_at(c, 12), config::range::COUNT),
            offset_mode: offset_mode(c[4])?,
            display_offset: i16::from_le_bytes([c[14], c[15]]),
            bipolar: c[5] & 1 != 0,
            draw_while_acquire: c[5] & 2 != 0,
            single_shot: c[5] & 4 != 0,
            running: c[5] & 8 != 0,
        };

        let s = &blob[STATE_AT..SAMPLES_AT];
        let end = usize::from(u16_at(s, 6)).min(config::buffer::LEN);
        // the trigger position indexes the captured region; past `end` it
        // would slice backwards
        let triggered_at = match u16_at(s, 10) {
            NO_TRIGGER => None,
            i => Some(usize::from(i).min(end)),
        };
        let state = CaptureState {
            phase: phase(s[0])?,
            trigger: trigger_status(s[1])?,
            sample_count: u32::from_le_bytes([s[2], s[3], s[4], s[5]]),
            timeout_budget: 0,
            end,
            cursor: usize::from(u16_at(s, 8)).min(config::buffer::LEN),
            // a restored capture is always complete
            buffer_full: true,
            wrap_occurred: s[12] & 2 != 0,
            triggered_at,
            stop_level: s[13].min(2),
        };

        let mut samples = [0u16; config::buffer::LEN];
        samples
            .as_mut_byte_slice()
            .copy_from_slice(&blob[SAMPLES_AT..]);
        for sample in samples.iter_mut() {
            if *sample != config::adc::INVALID_SAMPLE {
                *sample = (*sample).min(config::adc::MAX_CONVERSION_VALUE);
            }
        }

        Some(Self {
            config,
            state,
            samples,
        })
    }
}

fn u16_at(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

fn clamp_index(raw: u16, count: usize) -> usize {
    usize::from(raw).min(count - 1)
}

fn trigger_mode(byte: u8) -> Option<TriggerMode> {
    match byte {
        0 => Some(TriggerMode::Auto),
        1 => Some(TriggerMode::Manual),
        2 => Some(TriggerMode::Off),
        _ => None,
    }
}

fn slope(byte: u8) -> Option<Slope> {
    match byte {
        0 => Some(Slope::Rising),
        1 => Some(Slope::Falling),
        _ => None,
    }
}

fn offset_mode(byte: u8) -> Option<OffsetMode> {
    match byte {
        0 => Some(OffsetMode::Zero),
        1 => Some(OffsetMode::Auto),
        2 => Some(OffsetMode::Manual),
        _ => None,
    }
}

fn phase(byte: u8) -> Option<CapturePhase> {
    match byte {
        0 => Some(CapturePhase::PreTrigger),
        1 => Some(CapturePhase::SearchTrigger),
        2 => Some(CapturePhase::PostTrigger),
        _ => None,
    }
}

fn trigger_status(byte: u8) -> Option<TriggerStatus> {
    match byte {
        0 => Some(TriggerStatus::Start),
        1 => Some(TriggerStatus::BelowThreshold),
        2 => Some(TriggerStatus::Triggered),
        _ => None,
    }
}
