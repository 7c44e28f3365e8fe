//! Acquisition configuration and the discrete UI-facing setters.
//!
//! Configuration is mutated only between captures (or by the auto controller
//! acting on a completed capture). A timebase change affects the sampling
//! hardware mid-flight, so it is deferred through a pending slot and applied
//! at the next safe point.

use crate::config;
use crate::hal::AcquisitionHw;
use crate::trigger::Slope;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TriggerMode {
    /// Search for an edge; level/hysteresis maintained by the auto controller.
    Auto,
    /// Search for an edge at a user-set level.
    Manual,
    /// Free-run: no trigger search at all.
    Off,
}

impl TriggerMode {
    /// Whether a capture in this mode runs the trigger search phase.
    pub fn searches(self) -> bool {
        matches!(self, TriggerMode::Auto | TriggerMode::Manual)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OffsetMode {
    /// Signal referenced to raw zero.
    Zero,
    /// Offset and display range maintained by the auto controller.
    Auto,
    /// User-set offset.
    Manual,
}

/// Synchronous feedback for the UI collaborator (beeps / flashes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[must_use]
pub enum Feedback {
    Applied,
    /// Request ran into a table end or value limit and was clamped.
    Clipped,
    /// Request made no sense in the current mode and was ignored.
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquisitionConfig {
    pub timebase: usize,
    /// Timebase requested mid-capture, applied at the next safe point.
    pub pending_timebase: Option<usize>,
    pub trigger_mode: TriggerMode,
    pub slope: Slope,
    /// Trigger level in raw units.
    pub trigger_level: u16,
    /// Trigger hysteresis in raw units.
    pub trigger_hysteresis: u16,
    /// Input (attenuator) range table index.
    pub input_range: usize,
    /// Display range table index; may differ from `input_range`.
    pub display_range: usize,
    pub offset_mode: OffsetMode,
    /// Display offset in raw units of the display range.
    pub display_offset: i16,
    /// Bipolar (AC-coupled) input.
    pub bipolar: bool,
    /// Update the display incrementally while capturing (slow timebases).
    pub draw_while_acquire: bool,
    pub single_shot: bool,
    pub running: bool,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            timebase: config::timebase::DEFAULT_INDEX,
            pending_timebase: None,
            trigger_mode: TriggerMode::Auto,
            slope: Slope::Rising,
            trigger_level: (config::adc::MAX_CONVERSION_VALUE + 1) / 2,
            trigger_hysteresis: 32,
            input_range: config::range::DEFAULT_INDEX,
            display_range: config::range::DEFAULT_INDEX,
            offset_mode: OffsetMode::Auto,
            display_offset: 0,
            bipolar: false,
            draw_while_acquire: false,
            single_shot: false,
            running: true,
        }
    }
}

/// Step an index within a table, reporting a clip at either end.
fn step_index(index: &mut usize, delta: i32, count: usize) -> Feedback {
    let stepped = *index as i32 + delta;
    let clamped = stepped.clamp(0, count as i32 - 1) as usize;
    let feedback = if clamped as i32 == stepped {
        Feedback::Applied
    } else {
        Feedback::Clipped
    };
    *index = clamped;
    feedback
}

impl AcquisitionConfig {
    pub fn set_trigger_mode(&mut self, mode: TriggerMode) -> Feedback {
        self.trigger_mode = mode;
        Feedback::Applied
    }

    pub fn set_slope(&mut self, slope: Slope) -> Feedback {
        self.slope = slope;
        Feedback::Applied
    }

    /// Set the trigger level in raw units; out-of-range requests clamp.
    /// Rejected while the auto controller owns the level.
    pub fn set_trigger_level(&mut self, level: u16) -> Feedback {
        if self.trigger_mode == TriggerMode::Auto {
            return Feedback::Rejected;
        }
        if level > config::adc::MAX_CONVERSION_VALUE {
            self.trigger_level = config::adc::MAX_CONVERSION_VALUE;
            Feedback::Clipped
        } else {
            self.trigger_level = level;
            Feedback::Applied
        }
    }

    pub fn set_trigger_hysteresis(&mut self, hysteresis: u16) -> Feedback {
        if self.trigger_mode == TriggerMode::Auto {
            return Feedback::Rejected;
        }
        if hysteresis > config::adc::MAX_CONVERSION_VALUE {
            self.trigger_hysteresis = config::adc::MAX_CONVERSION_VALUE;
            Feedback::Clipped
        } else {
            self.trigger_hysteresis = hysteresis;
            Feedback::Applied
        }
    }

    /// Step the input range and program the attenuator relay.
    pub fn step_input_range(&mut self, delta: i32, hw: &mut impl AcquisitionHw) -> Feedback {
        let feedback = step_index(&mut self.input_range, delta, config::range::COUNT);
        hw.set_range_code(config::range::TABLE[self.input_range].hw_code);
        // the display range tracks the input range unless the auto controller
        // is refining it
        if self.offset_mode != OffsetMode::Auto {
            self.display_range = self.input_range;
        }
        feedback
    }

    /// Step the display-only range; independent of the attenuator.
    pub fn step_display_range(&mut self, delta: i32) -> Feedback {
        if self.offset_mode == OffsetMode::Auto {
            return Feedback::Rejected;
        }
        step_index(&mut self.display_range, delta, config::range::COUNT)
    }

    /// Request a timebase step. Takes effect between captures.
    pub fn step_timebase(&mut self, delta: i32) -> Feedback {
        let mut index = self.pending_timebase.unwrap_or(self.timebase);
        let feedback = step_index(&mut index, delta, config::timebase::COUNT);
        self.pending_timebase = Some(index);
        feedback
    }

    /// Apply a deferred timebase change. Must only be called while no
    /// capture is in flight.
    pub fn apply_pending_timebase(&mut self, hw: &mut impl AcquisitionHw) {
        if let Some(index) = self.pending_timebase.take() {
            self.timebase = index;
            hw.set_clock_divider(config::timebase::TABLE[index].divider);
        }
    }

    pub fn set_offset_mode(&mut self, mode: OffsetMode) -> Feedback {
        self.offset_mode = mode;
        if mode == OffsetMode::Zero {
            self.display_offset = 0;
            self.display_range = self.input_range;
        }
        Feedback::Applied
    }

    pub fn set_display_offset(&mut self, offset: i16) -> Feedback {
        if self.offset_mode != OffsetMode::Manual {
            return Feedback::Rejected;
        }
        let max = config::adc::MAX_CONVERSION_VALUE as i16;
        if offset > max || offset < -max {
            self.display_offset = offset.clamp(-max, max);
            Feedback::Clipped
        } else {
            self.display_offset = offset;
            Feedback::Applied
        }
    }

    pub fn set_bipolar(&mut self, enabled: bool, hw: &mut impl AcquisitionHw) -> Feedback {
        self.bipolar = enabled;
        hw.set_bipolar(enabled);
        Feedback::Applied
    }

    /// Arm a single-shot capture: waits indefinitely for a trigger, stops
    /// after one acquisition.
    pub fn arm_single_shot(&mut self) -> Feedback {
        if !self.trigger_mode.searches() {
            return Feedback::Rejected;
        }
        self.single_shot = true;
        self.running = true;
        Feedback::Applied
    }

    pub fn toggle_run(&mut self) -> Feedback {
        self.running = !self.running;
        self.single_shot = false;
        Feedback::Applied
    }
}
