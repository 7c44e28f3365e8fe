//! Single-slot event mailbox between the sampling context and the main loop.
//!
//! The sampling context posts, the main loop drains. Single-writer /
//! single-reader by construction: each side touches the mailbox only through
//! the `&mut` it holds during its own turn, so no locking is needed.

/// Hardware capture event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    /// One conversion finished (per-sample strategy).
    SampleReady(u16),
    /// Block transfer reached the scan point (block strategy).
    BlockHalf,
    /// Block transfer filled the whole buffer (block strategy).
    BlockComplete,
}

#[derive(Debug)]
pub struct Mailbox {
    slot: Option<Event>,
    overruns: u32,
}

impl Mailbox {
    pub const fn new() -> Self {
        Self {
            slot: None,
            overruns: 0,
        }
    }

    /// Post an event. A still-occupied slot counts as an overrun and the
    /// newer event wins, since the newest hardware state is the one worth
    /// reacting to.
    pub fn post(&mut self, event: Event) {
        if self.slot.is_some() {
            self.overruns = self.overruns.wrapping_add(1);
        }
        self.slot = Some(event);
    }

    /// Drain the slot; called once per main-loop iteration.
    pub fn take(&mut self) -> Option<Event> {
        self.slot.take()
    }

    pub fn overruns(&self) -> u32 {
        self.overruns
    }
}
