//! Usage metering
//!
//! Records completed requests into windowed counters and the durable ledger.

pub mod recorder;
pub mod window;

pub use recorder::{RecordOutcome, SinkFailure, UsageCounter, UsageRecorder, UsageSink};
