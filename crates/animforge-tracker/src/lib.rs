//! AnimForge Tracker
//!
//! Structured status reporting for training experiments:
//! - The status-event wire format consumed by the host application (`StatusEvent`)
//! - A single-writer event emitter (`Tracker`)
//! - Capture of in-process `tracing` records into the same channel
//!   (`LogSinkRegistry`, `TrackerLayer`)
//!
//! `Tracker::emit` is solely responsible for keeping the wire format consistent
//! with the host's JSON parser: one well-formed object per line on the primary
//! channel, or nothing.

pub mod capture;
pub mod event;
pub mod tracker;

pub use capture::{LogSinkRegistry, TrackerLayer};
pub use event::{Metrics, StatusEvent, number};
pub use tracker::{Tracker, TrackerBuilder};
