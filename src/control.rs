//! Auto-range, auto-trigger and auto-offset control loops.
//!
//! Each loop reacts to the statistics of a completed capture and nudges the
//! configuration so the next capture stays on screen and well resolved. All
//! three are idempotent on stable input: repeated invocation with unchanged
//! statistics leaves the configuration alone.
//!
//! Asymmetry by design: escalating to a coarser input range happens
//! immediately (the signal is clipping or about to), while de-escalating to
//! a finer range waits out a cooldown, so a signal hovering near a range
//! boundary cannot make the attenuator relay oscillate.

use crate::command::{AcquisitionConfig, OffsetMode, TriggerMode};
use crate::config;
use crate::hal::AcquisitionHw;
use crate::math::{DivRound, ScaleBy};
use crate::range::{Calibration, RangeTable};
use crate::stats::Statistics;
use crate::time::{Duration, Instant};

pub struct AutoController {
    /// When the signal first became small enough for a finer input range.
    downshift_since: Option<Instant>,
}

impl AutoController {
    pub const fn new() -> Self {
        Self {
            downshift_since: None,
        }
    }

    /// Run all three loops against the statistics of a completed capture.
    /// Returns whether anything in the configuration changed.
    pub fn update(
        &mut self,
        cfg: &mut AcquisitionConfig,
        ranges: &RangeTable,
        cal: &Calibration,
        stats: &Statistics,
        now: Instant,
        hw: &mut impl AcquisitionHw,
    ) -> bool {
        let mut changed = false;
        if cfg.trigger_mode == TriggerMode::Auto {
            changed |= auto_trigger(cfg, stats);
        }
        changed |= self.auto_range(cfg, ranges, stats, now, hw);
        if cfg.offset_mode == OffsetMode::Auto {
            changed |= auto_offset(cfg, ranges, cal, stats);
        }
        #[cfg(feature = "defmt")]
        if changed {
            defmt::debug!(
                "auto update: range={} display={} level={}",
                cfg.input_range,
                cfg.display_range,
                cfg.trigger_level
            );
        }
        changed
    }

    fn auto_range(
        &mut self,
        cfg: &mut AcquisitionConfig,
        ranges: &RangeTable,
        stats: &Statistics,
        now: Instant,
        hw: &mut impl AcquisitionHw,
    ) -> bool {
        let clipped_high = stats.raw_max >= config::adc::MAX_CONVERSION_VALUE;
        let clipped_low = cfg.bipolar && stats.raw_min == 0;
        if clipped_high || clipped_low {
            self.downshift_since = None;
            return switch_range(cfg, cfg.input_range + 1, hw);
        }

        let pkpk_mv = ranges.raw_delta_to_mv(cfg.input_range, stats.raw_max - stats.raw_min);

        // smallest range that accommodates the signal at all
        let fits = first_range(|r| pkpk_mv <= ranges.capacity_mv(r));
        match fits {
            Some(r) if r > cfg.input_range => {
                // about to clip even though no sample hit the rail yet
                self.downshift_since = None;
                return switch_range(cfg, r, hw);
            }
            None => {
                self.downshift_since = None;
                return switch_range(cfg, config::range::COUNT - 1, hw);
            }
            _ => {}
        }

        // smallest range the signal still fits comfortably into
        let comfortable = first_range(|r| {
            pkpk_mv <= ranges.capacity_mv(r).scale_by(config::autorange::DOWNSHIFT_MAX_FILL)
        });
        match comfortable {
            Some(r) if r < cfg.input_range => match self.downshift_since {
                None => {
                    self.downshift_since = Some(now);
                    false
                }
                Some(since)
                    if now - since
                        >= Duration::millis(config::autorange::DOWNSHIFT_COOLDOWN_MS) =>
                {
                    self.downshift_since = None;
                    switch_range(cfg, r, hw)
                }
                Some(_) => false,
            },
            _ => {
                self.downshift_since = None;
                false
            }
        }
    }
}

/// Switch the input range (either direction) and program the attenuator.
fn switch_range(cfg: &mut AcquisitionConfig, to: usize, hw: &mut impl AcquisitionHw) -> bool {
    let to = to.min(config::range::COUNT - 1);
    if to == cfg.input_range {
        return false;
    }
    cfg.input_range = to;
    hw.set_range_code(config::range::TABLE[to].hw_code);
    if cfg.offset_mode != OffsetMode::Auto {
        cfg.display_range = cfg.input_range;
    }
    true
}

fn first_range(mut fits: impl FnMut(usize) -> bool) -> Option<usize> {
    (0..config::range::COUNT).find(|&r| fits(r))
}

/// Trigger level at the signal midpoint, hysteresis at a quarter of
/// peak-to-peak. Updates below a fraction of the hysteresis are jitter and
/// get suppressed.
fn auto_trigger(cfg: &mut AcquisitionConfig, stats: &Statistics) -> bool {
    let level = (u32::from(stats.raw_min) + u32::from(stats.raw_max)) / 2;
    let level = level as u16;
    let hysteresis = ((stats.raw_max - stats.raw_min) / 4).max(1);

    let delta = level.abs_diff(cfg.trigger_level);
    if delta <= hysteresis / config::autorange::JITTER_DIV {
        return false;
    }
    cfg.trigger_level = level;
    cfg.trigger_hysteresis = hysteresis;
    true
}

/// Pick a display-only range the signal fills (with a safety margin) and
/// center it vertically, offsetting in whole grid divisions.
///
/// Runs every cycle from fresh statistics, so clipping against a stale
/// offset window corrects itself on the next capture even when the display
/// range itself is unchanged.
fn auto_offset(
    cfg: &mut AcquisitionConfig,
    ranges: &RangeTable,
    cal: &Calibration,
    stats: &Statistics,
) -> bool {
    let pkpk_mv = ranges.raw_delta_to_mv(cfg.input_range, stats.raw_max - stats.raw_min);

    let span_limit_mv = |r: usize| {
        let span = config::range::TABLE[r].mv_per_div * config::display::DIVS as u32;
        span.scale_by(config::autorange::OFFSET_MARGIN)
    };
    let display = first_range(|r| pkpk_mv <= span_limit_mv(r))
        .unwrap_or(config::range::COUNT - 1);

    // signal midpoint in display-range raw units, past the same AC-zero
    // removal the transform applies
    let att_in = config::range::TABLE[cfg.input_range].att_x1000;
    let att_disp = config::range::TABLE[display].att_x1000;
    let ac_zero = if cfg.bipolar {
        i32::from(cal.ac_zero)
    } else {
        0
    };
    let mid_in = (i32::from(stats.raw_min) + i32::from(stats.raw_max)) / 2 - ac_zero;
    let mid_disp =
        ((i64::from(mid_in) * i64::from(att_in)).div_round(i64::from(att_disp))) as i32;

    // place the midpoint at the vertical center of the display
    let raw_per_div = i32::from(ranges.raw_per_div(display));
    let center_delta_px = if cfg.bipolar {
        // bipolar traces are already referenced to the center row
        0
    } else {
        i32::from(config::display::HEIGHT - 1) - i32::from(config::display::HEIGHT / 2)
    };
    let center_delta_raw =
        center_delta_px * raw_per_div / i32::from(config::display::PIXELS_PER_DIV);

    let offset = mid_disp - center_delta_raw;
    // snap to whole grid divisions so the trace moves in clean steps
    let offset = offset.div_round(raw_per_div) * raw_per_div;
    let offset = offset.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16;

    let changed = cfg.display_range != display || cfg.display_offset != offset;
    cfg.display_range = display;
    cfg.display_offset = offset;
    changed
}
