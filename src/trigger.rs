//! Two-threshold edge trigger detector.
//!
//! The detector arms once the signal moves to the far side of
//! `level -/+ hysteresis`, and fires once it crosses back past `level` in the
//! trigger direction. Both slopes share one comparison, folded by XOR, so
//! rising and falling behave symmetrically.
//!
//! A degenerate configuration (hysteresis at or past the level) can never
//! arm; the detector simply stays in `Start` and the caller's timeout budget
//! resolves it. Nothing here can deadlock on its own.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Slope {
    Rising,
    Falling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TriggerStatus {
    /// Waiting for the signal to reach the armed side of the hysteresis band.
    Start,
    /// Armed; waiting for the crossing back past the level.
    BelowThreshold,
    /// Crossing seen.
    Triggered,
}

/// `true` if `a` is past `b` in the trigger direction.
fn past(a: u16, b: u16, slope: Slope) -> bool {
    (a > b) ^ (slope == Slope::Falling)
}

#[derive(Debug, Clone, Copy)]
pub struct Detector {
    status: TriggerStatus,
}

impl Detector {
    pub const fn new() -> Self {
        Self {
            status: TriggerStatus::Start,
        }
    }

    pub fn status(&self) -> TriggerStatus {
        self.status
    }

    /// Re-arm for a new acquisition.
    pub fn reset(&mut self) {
        self.status = TriggerStatus::Start;
    }

    /// Feed one sample through the automaton.
    pub fn evaluate(&mut self, sample: u16, level: u16, hysteresis: u16, slope: Slope) -> TriggerStatus {
        match self.status {
            TriggerStatus::Start => {
                let arm_level = match slope {
                    Slope::Rising => level.saturating_sub(hysteresis),
                    Slope::Falling => level.saturating_add(hysteresis),
                };
                if past(arm_level, sample, slope) {
                    self.status = TriggerStatus::BelowThreshold;
                }
            }
            TriggerStatus::BelowThreshold => {
                if past(sample, level, slope) {
                    self.status = TriggerStatus::Triggered;
                }
            }
            TriggerStatus::Triggered => {}
        }
        self.status
    }

    /// Block-mode variant: run the automaton over a completed block and
    /// return the index of the triggering sample, if any.
    ///
    /// Armed state carries across calls, so a hardware transfer restart
    /// between blocks never loses a `BelowThreshold` already reached.
    pub fn scan(&mut self, block: &[u16], level: u16, hysteresis: u16, slope: Slope) -> Option<usize> {
        for (i, &sample) in block.iter().enumerate() {
            if self.evaluate(sample, level, hysteresis, slope) == TriggerStatus::Triggered {
                return Some(i);
            }
        }
        None
    }
}
