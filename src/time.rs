//! Millisecond-tick time aliases for the control loops.
//!
//! The engine never reads a clock itself; the main loop passes `Instant`s in.

pub type Instant = fugit::Instant<u32, 1, 1_000>;
pub type Duration = fugit::Duration<u32, 1, 1_000>;
