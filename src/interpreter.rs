//! Routes decoded frames to the handler of their communication channel.
//!
//! The master half of a cycle names the channel in its MC octet. The device
//! half carries no channel of its own, it belongs to the channel of the
//! master half before it.

use log::trace;

use crate::channel::{ChannelHandler, DiagnosisChannel, IsduChannel, PageChannel, ProcessChannel};
use crate::error::Error;
use crate::message::Message;
use crate::transaction::Transaction;
use crate::types::CommChannel;

/// Turns the frames of an [`OctetStreamDecoder`](crate::OctetStreamDecoder)
/// into [`Transaction`]s.
///
/// ```
/// use chrono::{Duration, TimeZone, Utc};
/// use iolink_proto::types::{ChecksumStatus, ChecksumType, MasterSequenceControl};
/// use iolink_proto::{DeviceMessage, MasterMessage, Message, MessageInterpreter, Transaction};
///
/// let t0 = Utc.with_ymd_and_hms(2050, 1, 1, 0, 0, 0).unwrap();
/// let us = Duration::microseconds;
/// let mut interpreter = MessageInterpreter::new();
///
/// // read of direct parameter page index 2
/// let mc = MasterSequenceControl::from_byte(0xA2);
/// let ckt = ChecksumType::from_byte(0x00);
/// let master = MasterMessage::new(mc, ckt, &[], &[], t0, t0 + us(560))?;
/// assert_eq!(interpreter.process_message(&Message::from(master))?, None);
///
/// let cks = ChecksumStatus::from_byte(0x06);
/// let device = DeviceMessage::new(&[0x49], &[], cks, t0 + us(650), t0 + us(1210))?;
/// match interpreter.process_message(&Message::from(device))? {
///     Some(Transaction::Page(page)) => assert_eq!((page.index, page.value), (2, 0x49)),
///     other => panic!("{other:?}"),
/// }
/// # Ok::<(), iolink_proto::Error>(())
/// ```
#[derive(Debug)]
pub struct MessageInterpreter {
    active_channel: CommChannel,
    process: ProcessChannel,
    page: PageChannel,
    diagnosis: DiagnosisChannel,
    isdu: IsduChannel,
}

impl Default for MessageInterpreter {
    fn default() -> Self {
        Self {
            active_channel: CommChannel::Process,
            process: ProcessChannel::new(),
            page: PageChannel::new(),
            diagnosis: DiagnosisChannel::new(),
            isdu: IsduChannel::new(),
        }
    }
}

impl MessageInterpreter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Channel of the most recent master message.
    pub const fn active_channel(&self) -> CommChannel {
        self.active_channel
    }

    pub const fn isdu(&self) -> &IsduChannel {
        &self.isdu
    }

    pub const fn diagnosis(&self) -> &DiagnosisChannel {
        &self.diagnosis
    }

    /// Feed the next frame. Returns a transaction when the frame completes one.
    /// # Errors
    /// Returns the error of the channel handler. The handler drops the
    /// service it was decoding, the interpreter itself stays usable.
    pub fn process_message(&mut self, message: &Message) -> Result<Option<Transaction>, Error> {
        match message {
            Message::Master(master) => {
                self.active_channel = master.mc().comm_channel();
                trace!("{} channel: {master}", self.active_channel);
                match self.active_channel {
                    CommChannel::Process => self.process.handle_master_message(master),
                    CommChannel::Page => self.page.handle_master_message(master),
                    CommChannel::Diagnosis => self.diagnosis.handle_master_message(master),
                    CommChannel::Isdu => self.isdu.handle_master_message(master),
                }
            }
            Message::Device(device) => {
                trace!("{} channel: {device}", self.active_channel);
                match self.active_channel {
                    CommChannel::Process => self.process.handle_device_message(device),
                    CommChannel::Page => self.page.handle_device_message(device),
                    CommChannel::Diagnosis => self.diagnosis.handle_device_message(device),
                    CommChannel::Isdu => self.isdu.handle_device_message(device),
                }
            }
        }
    }

    /// Return to the process channel and drop the state of every handler.
    pub fn reset(&mut self) {
        self.active_channel = CommChannel::Process;
        self.process.reset();
        self.page.reset();
        self.diagnosis.reset();
        self.isdu.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{DiagnosisState, IsduState};
    use crate::message::{DeviceMessage, MasterMessage};
    use crate::transaction::Source;
    use crate::types::{ChecksumStatus, ChecksumType, MasterSequenceControl};
    use crate::Timestamp;
    use chrono::{Duration, TimeZone, Utc};

    fn t(micros: i64) -> Timestamp {
        Utc.with_ymd_and_hms(2050, 1, 1, 0, 0, 0).unwrap() + Duration::microseconds(micros)
    }

    fn master(mc: u8, od: &[u8], at: i64) -> Message {
        MasterMessage::new(
            MasterSequenceControl::from_byte(mc),
            ChecksumType::from_byte(0x80),
            &[],
            od,
            t(at),
            t(at + 100),
        )
        .unwrap()
        .into()
    }

    fn device(od: &[u8], at: i64) -> Message {
        DeviceMessage::new(od, &[], ChecksumStatus::default(), t(at + 200), t(at + 300))
            .unwrap()
            .into()
    }

    #[test]
    fn test_dispatch() {
        let mut interpreter = MessageInterpreter::new();
        assert_eq!(interpreter.active_channel(), CommChannel::Process);

        // page write, index 1
        assert_eq!(interpreter.process_message(&master(0x21, &[0x55], 0)), Ok(None));
        assert_eq!(interpreter.active_channel(), CommChannel::Page);
        match interpreter.process_message(&device(&[], 0)) {
            Ok(Some(Transaction::Page(page))) => {
                assert_eq!(page.index, 1);
                assert_eq!(page.value, 0x55);
            }
            other => panic!("unexpected {other:?}"),
        }

        // diagnosis read of the status code
        interpreter.process_message(&master(0xC0, &[], 1000)).unwrap();
        assert_eq!(interpreter.active_channel(), CommChannel::Diagnosis);
        assert_eq!(interpreter.process_message(&device(&[0x81], 1000)), Ok(None));
        assert_eq!(interpreter.diagnosis().state(), DiagnosisState::ReadEventMemory);

        // process channel, master write
        match interpreter.process_message(&master(0x00, &[], 2000)) {
            Ok(Some(Transaction::Process(process))) => assert_eq!(process.source, Source::Master),
            other => panic!("unexpected {other:?}"),
        }
        match interpreter.process_message(&device(&[], 2000)) {
            Ok(Some(Transaction::Process(process))) => assert_eq!(process.source, Source::Device),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_error_keeps_interpreter_usable() {
        let mut interpreter = MessageInterpreter::new();
        assert_eq!(
            interpreter.process_message(&master(0x73, &[], 0)),
            Err(Error::InvalidFlowControlValue { value: 0x13 })
        );
        assert_eq!(interpreter.process_message(&master(0x70, &[0x93], 1000)), Ok(None));
        assert_eq!(interpreter.isdu().state(), IsduState::Request);
    }

    #[test]
    fn test_reset() {
        let mut interpreter = MessageInterpreter::new();
        interpreter.process_message(&master(0x70, &[0x93], 0)).unwrap();
        assert_eq!(interpreter.active_channel(), CommChannel::Isdu);
        interpreter.reset();
        assert_eq!(interpreter.active_channel(), CommChannel::Process);
        assert_eq!(interpreter.isdu().state(), IsduState::Idle);
    }
}
