//! Frames reconstructed by the octet stream decoder.

use core::fmt;

use arrayvec::ArrayVec;
use snafu::ensure;

use crate::error::{Error, InvalidPayloadLengthSnafu};
use crate::settings::MAX_PAYLOAD_LENGTH;
use crate::types::{ChecksumStatus, ChecksumType, CommChannel, MasterSequenceControl};
use crate::Timestamp;

/// Payload region of a single frame.
pub type Payload = ArrayVec<u8, MAX_PAYLOAD_LENGTH>;

const CHECKSUM_SEED: u8 = 0x52;

const fn bit(octet: u8, n: u32) -> u8 {
    (octet >> n) & 1
}

const fn compress(octet: u8) -> u8 {
    let d5 = bit(octet, 7) ^ bit(octet, 5) ^ bit(octet, 3) ^ bit(octet, 1);
    let d4 = bit(octet, 6) ^ bit(octet, 4) ^ bit(octet, 2) ^ bit(octet, 0);
    let d3 = bit(octet, 7) ^ bit(octet, 6);
    let d2 = bit(octet, 5) ^ bit(octet, 4);
    let d1 = bit(octet, 3) ^ bit(octet, 2);
    let d0 = bit(octet, 1) ^ bit(octet, 0);
    (d5 << 5) | (d4 << 4) | (d3 << 3) | (d2 << 2) | (d1 << 1) | d0
}

const fn compression_table() -> [u8; 256] {
    let mut table = [0; 256];
    let mut i = 0;
    while i < 256 {
        table[i] = compress(i as u8);
        i += 1;
    }
    table
}

/// 8-bit to 6-bit checksum compression.
const COMPRESSION: [u8; 256] = compression_table();

/// Seeded XOR fold over `octets`, compressed to the 6-bit checksum field.
///
/// The octet carrying the checksum has to be passed with its checksum bits
/// cleared.
pub fn frame_checksum(octets: impl IntoIterator<Item = u8>) -> u8 {
    let folded = octets.into_iter().fold(CHECKSUM_SEED, |acc, b| acc ^ b);
    COMPRESSION[usize::from(folded)]
}

fn payload(data: &[u8]) -> Result<Payload, Error> {
    ensure!(
        data.len() <= MAX_PAYLOAD_LENGTH,
        InvalidPayloadLengthSnafu { length: data.len(), max: MAX_PAYLOAD_LENGTH }
    );
    Ok(data.iter().copied().collect())
}

/// Frame sent by the master: MC, CKT, process data out, on-request data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterMessage {
    pub(crate) start_time: Timestamp,
    pub(crate) end_time: Timestamp,
    pub(crate) valid: bool,
    pub(crate) mc: MasterSequenceControl,
    pub(crate) ckt: ChecksumType,
    pub(crate) pd_out: Payload,
    pub(crate) od: Payload,
}

impl MasterMessage {
    /// Assemble a master frame, validating the checksum carried in `ckt`.
    /// # Errors
    /// Returns [`Error::InvalidPayloadLength`] if a payload doesn't fit a frame.
    pub fn new(
        mc: MasterSequenceControl,
        ckt: ChecksumType,
        pd_out: &[u8],
        od: &[u8],
        start_time: Timestamp,
        end_time: Timestamp,
    ) -> Result<Self, Error> {
        let mut msg = Self {
            start_time,
            end_time,
            valid: false,
            mc,
            ckt,
            pd_out: payload(pd_out)?,
            od: payload(od)?,
        };
        msg.valid = msg.ckt.checksum() == msg.calculate_checksum();
        Ok(msg)
    }

    /// The checksum this frame should carry.
    pub fn calculate_checksum(&self) -> u8 {
        let header = [self.mc.to_byte(), self.ckt.without_checksum()];
        frame_checksum(
            header
                .into_iter()
                .chain(self.pd_out.iter().copied())
                .chain(self.od.iter().copied()),
        )
    }

    pub const fn start_time(&self) -> Timestamp {
        self.start_time
    }

    pub const fn end_time(&self) -> Timestamp {
        self.end_time
    }

    /// Whether the transmitted checksum matches.
    pub const fn is_valid(&self) -> bool {
        self.valid
    }

    pub const fn mc(&self) -> MasterSequenceControl {
        self.mc
    }

    pub const fn ckt(&self) -> ChecksumType {
        self.ckt
    }

    pub fn pd_out(&self) -> &[u8] {
        &self.pd_out
    }

    pub fn od(&self) -> &[u8] {
        &self.od
    }

    pub const fn channel(&self) -> CommChannel {
        self.mc.comm_channel()
    }
}

impl fmt::Display for MasterMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterMessage(")?;
        if !self.valid {
            f.write_str("ERR, ")?;
        }
        write!(f, "mc={:#04x}, ckt={:#04x}", self.mc.to_byte(), self.ckt.to_byte())?;
        if !self.pd_out.is_empty() {
            write!(f, ", pdOut={}", Hex(&self.pd_out))?;
        }
        if !self.od.is_empty() {
            write!(f, ", od={}", Hex(&self.od))?;
        }
        f.write_str(")")
    }
}

/// Frame sent by the device: on-request data, process data in, CKS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceMessage {
    pub(crate) start_time: Timestamp,
    pub(crate) end_time: Timestamp,
    pub(crate) valid: bool,
    pub(crate) od: Payload,
    pub(crate) pd_in: Payload,
    pub(crate) cks: ChecksumStatus,
}

impl DeviceMessage {
    /// Assemble a device frame, validating the checksum carried in `cks`.
    /// # Errors
    /// Returns [`Error::InvalidPayloadLength`] if a payload doesn't fit a frame.
    pub fn new(
        od: &[u8],
        pd_in: &[u8],
        cks: ChecksumStatus,
        start_time: Timestamp,
        end_time: Timestamp,
    ) -> Result<Self, Error> {
        let mut msg = Self {
            start_time,
            end_time,
            valid: false,
            od: payload(od)?,
            pd_in: payload(pd_in)?,
            cks,
        };
        msg.valid = msg.cks.checksum() == msg.calculate_checksum();
        Ok(msg)
    }

    /// The checksum this frame should carry.
    pub fn calculate_checksum(&self) -> u8 {
        frame_checksum(
            self.od
                .iter()
                .copied()
                .chain(self.pd_in.iter().copied())
                .chain([self.cks.without_checksum()]),
        )
    }

    pub const fn start_time(&self) -> Timestamp {
        self.start_time
    }

    pub const fn end_time(&self) -> Timestamp {
        self.end_time
    }

    pub const fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn od(&self) -> &[u8] {
        &self.od
    }

    pub fn pd_in(&self) -> &[u8] {
        &self.pd_in
    }

    pub const fn cks(&self) -> ChecksumStatus {
        self.cks
    }
}

impl fmt::Display for DeviceMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DeviceMessage(")?;
        if !self.valid {
            f.write_str("ERR, ")?;
        }
        if !self.od.is_empty() {
            write!(f, "od={}, ", Hex(&self.od))?;
        }
        if !self.pd_in.is_empty() {
            write!(f, "pdIn={}, ", Hex(&self.pd_in))?;
        }
        write!(f, "cks={:#04x})", self.cks.to_byte())
    }
}

/// A complete frame, as emitted by [`OctetStreamDecoder`](crate::OctetStreamDecoder).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Master(MasterMessage),
    Device(DeviceMessage),
}

impl Message {
    /// Channel selected by a master frame. Device frames carry no channel.
    pub const fn channel(&self) -> Option<CommChannel> {
        match self {
            Self::Master(msg) => Some(msg.channel()),
            Self::Device(_) => None,
        }
    }

    pub const fn start_time(&self) -> Timestamp {
        match self {
            Self::Master(msg) => msg.start_time,
            Self::Device(msg) => msg.start_time,
        }
    }

    pub const fn end_time(&self) -> Timestamp {
        match self {
            Self::Master(msg) => msg.end_time,
            Self::Device(msg) => msg.end_time,
        }
    }

    pub const fn is_valid(&self) -> bool {
        match self {
            Self::Master(msg) => msg.valid,
            Self::Device(msg) => msg.valid,
        }
    }
}

impl From<MasterMessage> for Message {
    fn from(msg: MasterMessage) -> Self {
        Self::Master(msg)
    }
}

impl From<DeviceMessage> for Message {
    fn from(msg: DeviceMessage) -> Self {
        Self::Device(msg)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Master(msg) => msg.fmt(f),
            Self::Device(msg) => msg.fmt(f),
        }
    }
}

/// Lower case hex dump of a byte slice.
pub(crate) struct Hex<'a>(pub(crate) &'a [u8]);

impl fmt::Display for Hex<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.iter().try_for_each(|b| write!(f, "{b:02x}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn ts(micros: i64) -> Timestamp {
        Utc.timestamp_opt(0, 0).unwrap() + chrono::Duration::microseconds(micros)
    }

    #[test]
    fn test_compression() {
        assert_eq!(COMPRESSION[0], 0);
        assert_eq!(COMPRESSION[0xff], 0);
        assert_eq!(COMPRESSION[0x01], 0b01_0001);
        assert_eq!(COMPRESSION[0x80], 0b10_1000);
        assert!(COMPRESSION.iter().all(|&c| c < 64));
    }

    #[test]
    fn test_master_checksum() {
        let msg = MasterMessage::new(162u8.into(), 0u8.into(), &[], &[], ts(0), ts(10)).unwrap();
        assert!(msg.is_valid());
        assert_eq!(msg.channel(), CommChannel::Page);

        let msg = MasterMessage::new(32u8.into(), 54u8.into(), &[], &[154], ts(0), ts(10)).unwrap();
        assert!(msg.is_valid());
        assert_eq!(msg.calculate_checksum(), 0x36);

        let msg = MasterMessage::new(32u8.into(), 55u8.into(), &[], &[154], ts(0), ts(10)).unwrap();
        assert!(!msg.is_valid());
        assert_eq!(msg.to_string(), "MasterMessage(ERR, mc=0x20, ckt=0x37, od=9a)");
    }

    #[test]
    fn test_device_checksum() {
        let msg = DeviceMessage::new(&[73], &[], 6u8.into(), ts(0), ts(10)).unwrap();
        assert!(msg.is_valid());
        assert_eq!(msg.to_string(), "DeviceMessage(od=49, cks=0x06)");

        let msg = DeviceMessage::new(&[0; 8], &[], 133u8.into(), ts(0), ts(10)).unwrap();
        assert!(msg.is_valid());
        assert_eq!(msg.cks().event_flag(), 1);

        let msg = DeviceMessage::new(&[], &[0; 10], 44u8.into(), ts(0), ts(10)).unwrap();
        assert!(!msg.is_valid());
    }

    #[test]
    fn test_payload_limit() {
        assert_eq!(
            DeviceMessage::new(&[0; 33], &[], 0u8.into(), ts(0), ts(0)),
            Err(Error::InvalidPayloadLength { length: 33, max: 32 })
        );
    }

    #[test]
    fn test_message_channel() {
        let master: Message = MasterMessage::new(0xF1u8.into(), 0x64u8.into(), &[], &[], ts(0), ts(5))
            .unwrap()
            .into();
        assert_eq!(master.channel(), Some(CommChannel::Isdu));
        assert_eq!(master.start_time(), ts(0));
        assert_eq!(master.end_time(), ts(5));

        let device: Message = DeviceMessage::new(&[], &[], 45u8.into(), ts(0), ts(5)).unwrap().into();
        assert_eq!(device.channel(), None);
        assert!(device.is_valid());
    }
}
