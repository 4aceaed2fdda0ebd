//! Status flags of the `sbms` record

use std::fmt;

use serde::{Serialize, Serializer};

/// One bit of the flag word
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Flag {
    OverVoltage = 0,
    OverVoltageLockout = 1,
    UnderVoltage = 2,
    UnderVoltageLockout = 3,
    IdleOverTemperature = 4,
    ChargeOverCurrent = 5,
    DischargeOverCurrent = 6,
    DischargeShortCircuit = 7,
    CellFailure = 8,
    OpenWire = 9,
    LowVoltageCutoff = 10,
    EndOfChargeCommFault = 11,
    ChargeFetState = 12,
    EndOfCharge = 13,
    DischargeFetState = 14,
}

impl Flag {
    /// Every flag in bit order
    pub const ALL: [Flag; 15] = [
        Flag::OverVoltage,
        Flag::OverVoltageLockout,
        Flag::UnderVoltage,
        Flag::UnderVoltageLockout,
        Flag::IdleOverTemperature,
        Flag::ChargeOverCurrent,
        Flag::DischargeOverCurrent,
        Flag::DischargeShortCircuit,
        Flag::CellFailure,
        Flag::OpenWire,
        Flag::LowVoltageCutoff,
        Flag::EndOfChargeCommFault,
        Flag::ChargeFetState,
        Flag::EndOfCharge,
        Flag::DischargeFetState,
    ];

    /// Bit position in the flag word
    pub fn bit(self) -> u8 {
        self as u8
    }

    pub fn from_bit(bit: u8) -> Option<Flag> {
        Self::ALL.get(usize::from(bit)).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            Flag::OverVoltage => "over-voltage",
            Flag::OverVoltageLockout => "over-voltage-lockout",
            Flag::UnderVoltage => "under-voltage",
            Flag::UnderVoltageLockout => "under-voltage-lockout",
            Flag::IdleOverTemperature => "idle-over-temperature",
            Flag::ChargeOverCurrent => "charge-over-current",
            Flag::DischargeOverCurrent => "discharge-over-current",
            Flag::DischargeShortCircuit => "discharge-short-circuit",
            Flag::CellFailure => "cell-failure",
            Flag::OpenWire => "open-wire",
            Flag::LowVoltageCutoff => "low-voltage-cutoff",
            Flag::EndOfChargeCommFault => "end-of-charge-comm-fault",
            Flag::ChargeFetState => "charge-fet-state",
            Flag::EndOfCharge => "end-of-charge",
            Flag::DischargeFetState => "discharge-fet-state",
        }
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The 16-bit flag word
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flags(pub u16);

impl Flags {
    pub fn bits(self) -> u16 {
        self.0
    }

    /// Whether `flag` is set
    pub fn contains(self, flag: Flag) -> bool {
        self.get(flag.bit())
    }

    /// Whether bit `bit` is set
    pub fn get(self, bit: u8) -> bool {
        bit < 16 && self.0 & (1 << bit) != 0
    }

    /// Set flags in bit order
    pub fn iter(self) -> impl Iterator<Item = Flag> {
        Flag::ALL.into_iter().filter(move |&flag| self.contains(flag))
    }
}

impl Serialize for Flags {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter().map(Flag::name))
    }
}
