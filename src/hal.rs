//! Hardware seams.
//!
//! The engine never touches registers; the platform layer implements these
//! traits and wires its conversion-complete interrupts to
//! [`Event`](crate::mailbox::Event) posts. All calls are fire-and-forget
//! configuration writes with no observable return value.

/// Physical sample acquisition.
pub trait SampleSource {
    /// Start a hardware block transfer of `len` samples into the engine's
    /// buffer. Completion of the half and full transfer must be reported as
    /// `Event::BlockHalf` / `Event::BlockComplete`.
    fn start_block_capture(&mut self, len: usize);

    /// Start per-sample capture; each conversion must be reported as
    /// `Event::SampleReady`.
    fn start_single_sample_capture(&mut self);

    /// Stop any capture in progress.
    fn stop(&mut self);
}

/// Timebase / range hardware control.
pub trait AcquisitionHw {
    /// Program the sample clock divider for a timebase.
    fn set_clock_divider(&mut self, divider: u32);

    /// Select the attenuator/range relay code.
    fn set_range_code(&mut self, code: u8);

    /// Enable or disable bipolar (AC-coupled) input.
    fn set_bipolar(&mut self, enabled: bool);
}
