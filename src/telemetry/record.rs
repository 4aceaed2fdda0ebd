//! Decoded `sbms` telemetry record
//!
//! Layout, starting one byte past the opening quote:
//!
//! ```text
//! year month day hour minute second    1 digit each
//! state of charge                      2
//! cell voltages x8                     2 each, mV
//! internal, external temperature       2 each, tenths of C offset by 450
//! battery current                      sign byte + 3, mA
//! PV1, PV2, external load current      3 each, mA
//! ADC2, ADC3                           3 each
//! heat sensors (not sent)              6 skipped
//! flags                                2
//! ```

use serde::Serialize;
use thiserror::Error;

use super::digits::Digits;
use super::flags::{Flag, Flags};

/// Shortest content the layout can be read from, opening quote included
pub const RECORD_LEN: usize = 56;

/// Number of cells reported
pub const CELL_COUNT: usize = 8;

/// Offset applied to raw temperature readings
const TEMPERATURE_OFFSET: i32 = 450;

/// Bytes reserved for heat sensor readings in this layout
const HEAT_RESERVED: usize = 6;

/// Error from the validating decoder
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("telemetry record truncated: expected at least {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },
}

/// One telemetry sample from the controller
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TelemetryRecord {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub state_of_charge_percent: u8,
    pub cell_voltage_mv: [u16; CELL_COUNT],
    pub temperature_internal_tenth_c: i16,
    pub temperature_external_tenth_c: i16,
    pub battery_current_ma: i32,
    pub pv1_current_ma: u32,
    pub pv2_current_ma: u32,
    pub ext_load_current_ma: u32,
    pub ad2: u32,
    pub ad3: u32,
    /// Not carried by the current layout
    pub heat1: Option<u32>,
    /// Not carried by the current layout
    pub heat2: Option<u32>,
    pub flags: Flags,
}

impl TelemetryRecord {
    /// Decode `content`, rejecting input shorter than [`RECORD_LEN`]
    pub fn decode(content: impl AsRef<[u8]>) -> Result<Self, DecodeError> {
        let content = content.as_ref();
        let actual = content.len();
        if actual < RECORD_LEN {
            return Err(DecodeError::Truncated {
                expected: RECORD_LEN,
                actual,
            });
        }
        Ok(Self::decode_unchecked(content))
    }

    /// Decode without checking the length
    ///
    /// Meant for content that already passed the parser. Fields past the end
    /// of short input come out as zero digits.
    pub fn decode_unchecked(content: impl AsRef<[u8]>) -> Self {
        // Skip the opening quote
        let mut digits = Digits::new(content.as_ref(), 1);

        let year = digits.take(1) as u16;
        let month = digits.take(1) as u8;
        let day = digits.take(1) as u8;
        let hour = digits.take(1) as u8;
        let minute = digits.take(1) as u8;
        let second = digits.take(1) as u8;
        let state_of_charge_percent = digits.take(2) as u8;

        let mut cell_voltage_mv = [0u16; CELL_COUNT];
        for cell in &mut cell_voltage_mv {
            *cell = digits.take(2) as u16;
        }

        let temperature_internal_tenth_c = temperature(digits.take(2));
        let temperature_external_tenth_c = temperature(digits.take(2));

        let negative = digits.byte() == b'-';
        let magnitude = digits.take(3) as i32;
        let battery_current_ma = if negative { -magnitude } else { magnitude };

        let pv1_current_ma = digits.take(3);
        let pv2_current_ma = digits.take(3);
        let ext_load_current_ma = digits.take(3);
        let ad2 = digits.take(3);
        let ad3 = digits.take(3);

        digits.skip(HEAT_RESERVED);

        let flags = Flags(digits.take(2) as u16);

        Self {
            year,
            month,
            day,
            hour,
            minute,
            second,
            state_of_charge_percent,
            cell_voltage_mv,
            temperature_internal_tenth_c,
            temperature_external_tenth_c,
            battery_current_ma,
            pv1_current_ma,
            pv2_current_ma,
            ext_load_current_ma,
            ad2,
            ad3,
            heat1: None,
            heat2: None,
            flags,
        }
    }

    /// Whether `flag` is set
    pub fn flag(&self, flag: Flag) -> bool {
        self.flags.contains(flag)
    }

    /// Whether bit `bit` of the flag word is set
    pub fn get_flag(&self, bit: u8) -> bool {
        self.flags.get(bit)
    }
}

fn temperature(raw: u32) -> i16 {
    (raw as i32).wrapping_sub(TEMPERATURE_OFFSET) as i16
}
