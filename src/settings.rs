//! Decoder configuration: transmission rate and the payload lengths of each
//! M-sequence type.

use core::fmt;
use core::str::FromStr;

use chrono::Duration;
use snafu::ensure;

use crate::error::{Error, InvalidBitRateSnafu, InvalidMSeqCodeSnafu, InvalidPayloadLengthSnafu};

/// Upper bound of every payload region of a single frame.
pub const MAX_PAYLOAD_LENGTH: usize = 32;

/// IO-Link transmission rate.
#[derive(PartialEq, Eq, Debug, Copy, Clone, Hash, Default)]
pub enum BitRate {
    #[default]
    Undefined,
    /// 4.8 kbit/s
    Com1,
    /// 38.4 kbit/s
    Com2,
    /// 230.4 kbit/s
    Com3,
}

impl BitRate {
    /// Bits per second, `None` for [`BitRate::Undefined`].
    pub const fn baud(self) -> Option<u32> {
        match self {
            Self::Undefined => None,
            Self::Com1 => Some(4_800),
            Self::Com2 => Some(38_400),
            Self::Com3 => Some(230_400),
        }
    }

    /// Duration of `bits` bit times on the wire.
    /// # Errors
    /// Returns [`Error::InvalidBitRate`] for [`BitRate::Undefined`].
    pub fn bits_to_time(self, bits: u32) -> Result<Duration, Error> {
        let Some(baud) = self.baud() else {
            return InvalidBitRateSnafu { bit_rate: self.to_string() }.fail();
        };
        let nanos = i64::from(bits) * 1_000_000_000 / i64::from(baud);
        Ok(Duration::nanoseconds(nanos))
    }
}

impl fmt::Display for BitRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Undefined => "Undefined",
            Self::Com1 => "COM1",
            Self::Com2 => "COM2",
            Self::Com3 => "COM3",
        };
        f.write_str(name)
    }
}

impl FromStr for BitRate {
    type Err = Error;

    /// Accepts either the name (`"COM2"`) or the baud value (`"38400"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        match name.to_ascii_uppercase().as_str() {
            "UNDEFINED" => Ok(Self::Undefined),
            "COM1" => Ok(Self::Com1),
            "COM2" => Ok(Self::Com2),
            "COM3" => Ok(Self::Com3),
            _ => match name.parse::<u32>() {
                Ok(baud) => Self::try_from(baud),
                Err(_) => InvalidBitRateSnafu { bit_rate: name }.fail(),
            },
        }
    }
}

impl TryFrom<u32> for BitRate {
    type Error = Error;

    fn try_from(baud: u32) -> Result<Self, Self::Error> {
        match baud {
            4_800 => Ok(Self::Com1),
            38_400 => Ok(Self::Com2),
            230_400 => Ok(Self::Com3),
            _ => InvalidBitRateSnafu { bit_rate: baud.to_string() }.fail(),
        }
    }
}

/// Maximum gaps tolerated between consecutive octets, per decoding phase.
#[derive(PartialEq, Eq, Debug, Copy, Clone)]
pub struct TimingConstraints {
    /// t1: gap between two octets of a master message.
    pub master_frame_delay: Duration,
    /// tA: gap between the master message and the device reply.
    pub device_response_time: Duration,
    /// t2: gap between two octets of a device message.
    pub device_frame_delay: Duration,
}

impl TimingConstraints {
    /// # Errors
    /// Returns [`Error::InvalidBitRate`] for [`BitRate::Undefined`].
    pub fn new(bit_rate: BitRate) -> Result<Self, Error> {
        Ok(Self {
            master_frame_delay: bit_rate.bits_to_time(1)?,
            device_response_time: bit_rate.bits_to_time(10)?,
            device_frame_delay: bit_rate.bits_to_time(3)?,
        })
    }
}

/// Payload lengths of one M-sequence type.
#[derive(PartialEq, Eq, Debug, Copy, Clone, Default, Hash)]
pub struct MSeqPayloadLength {
    pd_out: usize,
    od: usize,
    pd_in: usize,
}

impl MSeqPayloadLength {
    /// # Errors
    /// Returns [`Error::InvalidPayloadLength`] if any length exceeds
    /// [`MAX_PAYLOAD_LENGTH`].
    pub fn new(pd_out: usize, od: usize, pd_in: usize) -> Result<Self, Error> {
        for length in [pd_out, od, pd_in] {
            ensure!(
                length <= MAX_PAYLOAD_LENGTH,
                InvalidPayloadLengthSnafu { length, max: MAX_PAYLOAD_LENGTH }
            );
        }
        Ok(Self { pd_out, od, pd_in })
    }

    /// Lengths used while establishing communication.
    pub const fn startup() -> Self {
        Self { pd_out: 0, od: 1, pd_in: 0 }
    }

    pub const fn pd_out(&self) -> usize {
        self.pd_out
    }

    pub const fn od(&self) -> usize {
        self.od
    }

    pub const fn pd_in(&self) -> usize {
        self.pd_in
    }
}

/// Everything the octet stream decoder needs to know about the link.
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct DecoderSettings {
    pub bit_rate: BitRate,
    pub startup: MSeqPayloadLength,
    pub preoperate: MSeqPayloadLength,
    pub operate: MSeqPayloadLength,
}

impl Default for DecoderSettings {
    fn default() -> Self {
        Self::new(BitRate::default(), MSeqPayloadLength::default(), MSeqPayloadLength::default())
    }
}

impl DecoderSettings {
    /// Settings with the fixed startup lengths.
    pub const fn new(
        bit_rate: BitRate,
        preoperate: MSeqPayloadLength,
        operate: MSeqPayloadLength,
    ) -> Self {
        Self {
            bit_rate,
            startup: MSeqPayloadLength::startup(),
            preoperate,
            operate,
        }
    }

    /// Build the settings from the sizes a device description announces.
    /// Pre-operate carries no process data.
    /// # Errors
    /// Returns [`Error::InvalidPayloadLength`] for oversized lengths.
    pub fn from_device_sizes(
        bit_rate: BitRate,
        pd_out: usize,
        pd_in: usize,
        od_preoperate: usize,
        od_operate: usize,
    ) -> Result<Self, Error> {
        Ok(Self::new(
            bit_rate,
            MSeqPayloadLength::new(0, od_preoperate, 0)?,
            MSeqPayloadLength::new(pd_out, od_operate, pd_in)?,
        ))
    }

    /// Lengths for the M-sequence type field of a CKT octet.
    /// # Errors
    /// Returns [`Error::InvalidMSeqCode`] for type 3 or anything wider.
    pub fn payload_length(&self, m_seq_type: u8) -> Result<MSeqPayloadLength, Error> {
        match m_seq_type {
            0 => Ok(self.startup),
            1 => Ok(self.preoperate),
            2 => Ok(self.operate),
            _ => InvalidMSeqCodeSnafu { m_seq_type }.fail(),
        }
    }
}
