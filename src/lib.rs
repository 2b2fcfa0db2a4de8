#![cfg_attr(not(test), no_std)]
//! Driver for the Sensirion SCD40 CO2, temperature and humidity sensor.
//!
//! The sensor sits at I2C address `0x62`. After [`SCD40Sensor::start`] puts it
//! into periodic measurement mode, every [`SCD40Sensor::read_data`] fetches the
//! 9-byte measurement frame, checks the CRC of each of its three words and
//! converts them to physical units.
//!
//! ```text
//!   [CO2 hi, CO2 lo, CRC, T hi, T lo, CRC, RH hi, RH lo, CRC]
//! ```

#[macro_use]
mod fmt;

mod crc;
mod frame;
mod scd40;
mod transport;

#[cfg(feature = "async")]
mod asynch;

pub use crc::sensirion_crc8;
pub use frame::{humidity_from_raw, parse_frame, temperature_from_raw};
pub use scd40::SCD40Sensor;
pub use transport::{I2cTransport, Transport};

#[cfg(feature = "async")]
pub use asynch::SCD40AsyncSensor;

/// Fixed 7-bit bus address of the sensor.
pub const SCD40_ADDRESS: u8 = 0x62;

/// Size of the raw measurement frame in bytes.
pub const FRAME_LEN: usize = 9;

/// Shortest wait after the start command before the first read.
pub const MIN_SETTLING_DELAY_MS: u32 = 10;

/// Sensor commands, sent as two bytes with the high byte first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    StartPeriodicMeasurement,
    ReadMeasurement,
    StopPeriodicMeasurement,
    GetDataReadyStatus,
}

impl Command {
    pub const fn raw(self) -> u16 {
        match self {
            Command::StartPeriodicMeasurement => 0x21b1,
            Command::ReadMeasurement => 0xec05,
            Command::StopPeriodicMeasurement => 0x3f86,
            Command::GetDataReadyStatus => 0xe4b8,
        }
    }

    pub const fn to_be_bytes(self) -> [u8; 2] {
        self.raw().to_be_bytes()
    }
}

/// A validated, converted measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SCD40Reading {
    pub co2_ppm: u16,
    pub temperature_c: f32,
    pub humidity_percent: f32,
}

/// A checksummed word received from the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SubField {
    Co2,
    Temperature,
    Humidity,
    /// Reply to the data ready status command.
    Status,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SCD40Error {
    /// The bus did not accept a command.
    TransmitFailure,
    /// The bus delivered a byte count other than the expected frame size.
    FrameLength { received: usize },
    /// CRC mismatch; the first failing word, checked CO2 first.
    Checksum(SubField),
    /// `read_data` was called before a successful `start`.
    NotStarted,
}

/// Driver settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    pub address: u8,
    /// Wait after the start command. Values below
    /// [`MIN_SETTLING_DELAY_MS`] are raised to it.
    pub settling_delay_ms: u32,
}

impl Config {
    pub(crate) fn effective_settling_delay_ms(&self) -> u32 {
        self.settling_delay_ms.max(MIN_SETTLING_DELAY_MS)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address: SCD40_ADDRESS,
            settling_delay_ms: MIN_SETTLING_DELAY_MS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum State {
    Idle,
    Measuring,
}

/// Time the sensor needs to leave periodic measurement mode.
pub(crate) const STOP_DELAY_MS: u32 = 500;
