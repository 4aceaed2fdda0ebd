//! Telemetry decoder
//!
//! Turns the stored content of the `sbms` variable into a
//! [`TelemetryRecord`]. Decoding is pure: no I/O, no shared state.

pub mod digits;
mod flags;
mod record;

pub use flags::{Flag, Flags};
pub use record::{DecodeError, TelemetryRecord, CELL_COUNT, RECORD_LEN};

/// Name under which the controller sends its telemetry record
pub const DEFAULT_VARIABLE: &str = "sbms";

/// Decode stored telemetry content, checking its length first
pub fn decode_telemetry(content: impl AsRef<[u8]>) -> Result<TelemetryRecord, DecodeError> {
    TelemetryRecord::decode(content)
}
