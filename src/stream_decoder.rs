//! Timing-gated framer turning timestamped octets into master and device frames.
//!
//! The decoder is sans-io: feed it every captured octet in transmission order
//! with [`OctetStreamDecoder::process_octet`], and it hands back a [`Message`]
//! whenever an octet completes a frame.
//!
//! Framing is driven by the gaps between octets. Whenever the gap between the
//! end of the previous octet and the start of the current one reaches the
//! limit of the current decoding phase, any partial frame is discarded and the
//! octet is taken as the first octet of a new master message.

use log::{debug, trace, warn};
use snafu::ensure;

use crate::error::{Error, TimestampOutOfOrderSnafu};
use crate::message::{DeviceMessage, MasterMessage, Message, Payload};
use crate::settings::{DecoderSettings, MSeqPayloadLength, TimingConstraints};
use crate::types::{ChecksumStatus, ChecksumType, MasterSequenceControl, TransmissionDirection};
use crate::Timestamp;

/// Phase of the framer, as observable from outside.
#[derive(PartialEq, Eq, Debug, Copy, Clone)]
pub enum DecodingState {
    Idle,
    MasterMessage,
    /// A master message was completed, the device reply hasn't started yet.
    DeviceResponseDelay,
    DeviceMessage,
}

/// Octet counts of the device frame answering a master frame.
#[derive(PartialEq, Eq, Debug, Copy, Clone)]
struct DeviceLayout {
    od: usize,
    pd_in: usize,
}

#[derive(Debug)]
struct MasterFrame {
    start_time: Timestamp,
    mc: MasterSequenceControl,
    ckt: Option<(ChecksumType, MSeqPayloadLength)>,
    pd_out: Payload,
    od: Payload,
}

impl MasterFrame {
    fn new(mc: MasterSequenceControl, start_time: Timestamp) -> Self {
        Self {
            start_time,
            mc,
            ckt: None,
            pd_out: Payload::new(),
            od: Payload::new(),
        }
    }

    /// Feed the next octet, returning the finished frame on the last one.
    fn push(
        &mut self,
        octet: u8,
        end_time: Timestamp,
        settings: &DecoderSettings,
    ) -> Result<Option<(MasterMessage, DeviceLayout)>, Error> {
        let Some((ckt, lengths)) = self.ckt else {
            let ckt = ChecksumType::from_byte(octet);
            let lengths = settings.payload_length(ckt.m_seq_type())?;
            self.ckt = Some((ckt, lengths));
            return Ok(self.finish(end_time));
        };

        if self.pd_out.len() < lengths.pd_out() {
            self.pd_out.push(octet);
        } else if self.od.len() < self.od_len(lengths) {
            self.od.push(octet);
        }
        trace!("master frame octet {octet:#04x}, ckt {ckt:?}");
        Ok(self.finish(end_time))
    }

    fn od_len(&self, lengths: MSeqPayloadLength) -> usize {
        match self.mc.direction() {
            TransmissionDirection::Write => lengths.od(),
            TransmissionDirection::Read => 0,
        }
    }

    fn finish(&self, end_time: Timestamp) -> Option<(MasterMessage, DeviceLayout)> {
        let (ckt, lengths) = self.ckt?;
        if self.pd_out.len() < lengths.pd_out() || self.od.len() < self.od_len(lengths) {
            return None;
        }

        let mut msg = MasterMessage {
            start_time: self.start_time,
            end_time,
            valid: false,
            mc: self.mc,
            ckt,
            pd_out: self.pd_out.clone(),
            od: self.od.clone(),
        };
        msg.valid = ckt.checksum() == msg.calculate_checksum();

        let layout = DeviceLayout {
            od: match self.mc.direction() {
                TransmissionDirection::Read => lengths.od(),
                TransmissionDirection::Write => 0,
            },
            pd_in: lengths.pd_in(),
        };
        Some((msg, layout))
    }
}

#[derive(Debug)]
struct DeviceFrame {
    start_time: Timestamp,
    layout: DeviceLayout,
    od: Payload,
    pd_in: Payload,
}

impl DeviceFrame {
    fn new(layout: DeviceLayout, start_time: Timestamp) -> Self {
        Self {
            start_time,
            layout,
            od: Payload::new(),
            pd_in: Payload::new(),
        }
    }

    /// Feed the next octet. The octet following the payloads is the CKS and
    /// finishes the frame.
    fn push(&mut self, octet: u8, end_time: Timestamp) -> Option<DeviceMessage> {
        if self.od.len() < self.layout.od {
            self.od.push(octet);
            return None;
        }
        if self.pd_in.len() < self.layout.pd_in {
            self.pd_in.push(octet);
            return None;
        }

        let cks = ChecksumStatus::from_byte(octet);
        let mut msg = DeviceMessage {
            start_time: self.start_time,
            end_time,
            valid: false,
            od: core::mem::take(&mut self.od),
            pd_in: core::mem::take(&mut self.pd_in),
            cks,
        };
        msg.valid = cks.checksum() == msg.calculate_checksum();
        Some(msg)
    }
}

#[derive(Debug)]
enum Framer {
    Idle,
    Master(MasterFrame),
    ResponseDelay(DeviceLayout),
    Device(DeviceFrame),
}

impl Framer {
    const fn state(&self) -> DecodingState {
        match self {
            Self::Idle => DecodingState::Idle,
            Self::Master(_) => DecodingState::MasterMessage,
            Self::ResponseDelay(_) => DecodingState::DeviceResponseDelay,
            Self::Device(_) => DecodingState::DeviceMessage,
        }
    }
}

/// Reconstructs master/device frames from a timestamped octet stream.
///
/// ## Example
/// ```
/// use chrono::{Duration, TimeZone, Utc};
/// use iolink_proto::{BitRate, DecoderSettings, Message, MSeqPayloadLength, OctetStreamDecoder};
///
/// # fn main() -> Result<(), iolink_proto::Error> {
/// let settings = DecoderSettings::new(
///     BitRate::Com2,
///     MSeqPayloadLength::new(0, 8, 0)?,
///     MSeqPayloadLength::new(7, 2, 10)?,
/// );
/// let mut decoder = OctetStreamDecoder::new(settings)?;
///
/// // 38.4 kbit/s: one octet takes 11 bit times, 286 µs
/// let mut start = Utc.with_ymd_and_hms(2050, 1, 1, 0, 1, 2).unwrap();
/// let mut messages = Vec::new();
/// for octet in [162, 0, 73, 6] {
///     let end = start + Duration::microseconds(286);
///     if let Some(message) = decoder.process_octet(octet, start, end)? {
///         messages.push(message);
///     }
///     start = end + Duration::microseconds(10);
/// }
///
/// assert!(matches!(&messages[0], Message::Master(m) if m.od().is_empty()));
/// assert!(matches!(&messages[1], Message::Device(d) if d.od() == [73]));
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct OctetStreamDecoder {
    settings: DecoderSettings,
    timing: TimingConstraints,
    framer: Framer,
    last_octet_end: Option<Timestamp>,
}

impl OctetStreamDecoder {
    /// Create a decoder working on its own copy of `settings`.
    /// # Errors
    /// Returns [`Error::InvalidBitRate`] if the bit rate is undefined, since
    /// the framing delays can't be derived without it.
    pub fn new(settings: DecoderSettings) -> Result<Self, Error> {
        let timing = TimingConstraints::new(settings.bit_rate)?;
        Ok(Self {
            settings,
            timing,
            framer: Framer::Idle,
            last_octet_end: None,
        })
    }

    pub const fn settings(&self) -> &DecoderSettings {
        &self.settings
    }

    /// Replace the settings. The decoder is reset.
    /// # Errors
    /// Returns [`Error::InvalidBitRate`] if the bit rate is undefined, the
    /// decoder is left untouched in that case.
    pub fn set_settings(&mut self, settings: DecoderSettings) -> Result<(), Error> {
        self.timing = TimingConstraints::new(settings.bit_rate)?;
        self.settings = settings;
        self.reset();
        Ok(())
    }

    pub const fn state(&self) -> DecodingState {
        self.framer.state()
    }

    /// Drop any partial frame and wait for the next master message.
    pub fn reset(&mut self) {
        self.framer = Framer::Idle;
    }

    /// Feed one octet with the time its transmission started and ended.
    ///
    /// Returns the frame completed by this octet, if any.
    /// # Errors
    /// - [`Error::TimestampOutOfOrder`] if the octet starts before the previous
    ///   one ended or ends before it starts. The decoder is left untouched.
    /// - [`Error::InvalidMSeqCode`] if a master message selects an M-sequence
    ///   type without configured lengths. The partial frame is dropped.
    pub fn process_octet(
        &mut self,
        octet: u8,
        start_time: Timestamp,
        end_time: Timestamp,
    ) -> Result<Option<Message>, Error> {
        ensure!(start_time <= end_time, TimestampOutOfOrderSnafu);
        if let Some(last) = self.last_octet_end {
            ensure!(last <= start_time, TimestampOutOfOrderSnafu);
        }

        let in_time = self.is_within_timing(start_time);
        self.last_octet_end = Some(end_time);

        let mut framer = core::mem::replace(&mut self.framer, Framer::Idle);
        if !in_time {
            match framer {
                Framer::Idle => {}
                Framer::ResponseDelay(_) => debug!("no device response, restarting"),
                _ => warn!("octet gap exceeded in {:?}, dropping partial frame", framer.state()),
            }
            framer = Framer::Idle;
        }

        let (framer, message) = self.step(framer, octet, start_time, end_time)?;
        self.framer = framer;
        if let Some(message) = &message {
            debug!("decoded {message}");
        }
        Ok(message)
    }

    fn max_delay(&self) -> Option<chrono::Duration> {
        match self.framer {
            Framer::Idle => None,
            Framer::Master(_) => Some(self.timing.master_frame_delay),
            Framer::ResponseDelay(_) => Some(self.timing.device_response_time),
            Framer::Device(_) => Some(self.timing.device_frame_delay),
        }
    }

    fn is_within_timing(&self, start_time: Timestamp) -> bool {
        match (self.last_octet_end, self.max_delay()) {
            (Some(last), Some(max_delay)) => start_time - last < max_delay,
            _ => false,
        }
    }

    fn step(
        &self,
        framer: Framer,
        octet: u8,
        start_time: Timestamp,
        end_time: Timestamp,
    ) -> Result<(Framer, Option<Message>), Error> {
        trace!("octet {octet:#04x} in {:?}", framer.state());
        match framer {
            Framer::Idle => {
                let mc = MasterSequenceControl::from_byte(octet);
                Ok((Framer::Master(MasterFrame::new(mc, start_time)), None))
            }
            Framer::Master(mut frame) => match frame.push(octet, end_time, &self.settings)? {
                Some((msg, layout)) => Ok((Framer::ResponseDelay(layout), Some(msg.into()))),
                None => Ok((Framer::Master(frame), None)),
            },
            Framer::ResponseDelay(layout) => {
                Ok(Self::device_octet(DeviceFrame::new(layout, start_time), octet, end_time))
            }
            Framer::Device(frame) => Ok(Self::device_octet(frame, octet, end_time)),
        }
    }

    fn device_octet(mut frame: DeviceFrame, octet: u8, end_time: Timestamp) -> (Framer, Option<Message>) {
        match frame.push(octet, end_time) {
            Some(msg) => (Framer::Idle, Some(msg.into())),
            None => (Framer::Device(frame), None),
        }
    }
}
