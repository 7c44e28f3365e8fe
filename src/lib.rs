//! Acquisition and triggering engine for a handheld digital storage scope.
//!
//! The engine owns everything between the conversion-complete interrupt and
//! the display collaborator: the pre-trigger ring, the edge trigger, capture
//! phase sequencing, auto range/trigger/offset control, the raw-to-pixel
//! transform, per-capture statistics with a spectrum view, and snapshot
//! persistence. Hardware stays behind the traits in [`hal`]; the platform
//! layer drives the engine by posting [`mailbox::Event`]s from its
//! interrupt handlers and calling into [`sampler::Sampler`] and
//! [`control::AutoController`] from its main loop.
//!
//! Nothing in here fails fatally. Timeouts fall back to whatever was
//! captured, implausible measurements are discarded for one cycle, and
//! out-of-range requests clamp and report [`command::Feedback::Clipped`].

#![cfg_attr(not(test), no_std)]

pub mod command;
pub mod config;
pub mod control;
pub mod fft;
pub mod hal;
pub mod mailbox;
pub mod math;
pub mod range;
pub mod ring;
pub mod sampler;
pub mod snapshot;
pub mod stats;
pub mod time;
pub mod trigger;

pub use command::{AcquisitionConfig, Feedback, OffsetMode, TriggerMode};
pub use control::AutoController;
pub use mailbox::{Event, Mailbox};
pub use range::{Calibration, RangeTable, Transform};
pub use sampler::Sampler;
pub use snapshot::Snapshot;
pub use stats::Statistics;
pub use trigger::Slope;
