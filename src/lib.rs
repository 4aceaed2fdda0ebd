//! SBMS Gateway Library
//!
//! Ingests the line-oriented variable protocol spoken by an SBMS battery
//! controller over its serial link and keeps the latest value of every
//! variable for concurrent readers.
//!
//! - `parser`: byte-at-a-time `var <name>=<content>;` line parser
//! - `store`: freshness-tracked variable store with bounded lock waits
//! - `telemetry`: decoder for the base-91 compressed `sbms` record
//! - `link`: producer context tying parser, store and notifications together
//! - `app`: configuration

pub mod app;
pub mod clock;
pub mod link;
pub mod notify;
pub mod parser;
pub mod store;
pub mod telemetry;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use link::{Link, Readout};
pub use notify::{change_channel, ChangeFeed, Notifier};
pub use parser::{Line, LineParser};
pub use store::{LockPolicy, Variable, VariableStore};
pub use telemetry::{decode_telemetry, DecodeError, Flag, Flags, TelemetryRecord};
