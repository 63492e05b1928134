use log::debug;
use snafu::OptionExt;

use super::ChannelHandler;
use crate::error::{Error, MissingOnRequestDataSnafu};
use crate::event_memory::EventMemory;
use crate::message::{DeviceMessage, MasterMessage};
use crate::transaction::{EventMemoryTransaction, EventResetTransaction, Transaction};
use crate::types::{CommChannel, TransmissionDirection};
use crate::Timestamp;

#[derive(PartialEq, Eq, Debug, Copy, Clone)]
pub enum DiagnosisState {
    Idle,
    /// Collecting the event memory, octet by octet.
    ReadEventMemory,
    /// The master wrote the status octet, waiting for the device half.
    ResetEventFlag,
}

/// Diagnosis channel: event memory reads and event flag resets.
#[derive(Debug)]
pub struct DiagnosisChannel {
    state: DiagnosisState,
    start_time: Option<Timestamp>,
    address: u8,
    direction: TransmissionDirection,
    event_memory: EventMemory,
}

impl Default for DiagnosisChannel {
    fn default() -> Self {
        Self {
            state: DiagnosisState::Idle,
            start_time: None,
            address: 0,
            direction: TransmissionDirection::Read,
            event_memory: EventMemory::new(),
        }
    }
}

impl DiagnosisChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn state(&self) -> DiagnosisState {
        self.state
    }

    fn goto_state(&mut self, state: DiagnosisState) {
        if self.state != state {
            debug!("diagnosis channel {:?} -> {state:?}", self.state);
        }
        self.state = state;
    }
}

impl ChannelHandler for DiagnosisChannel {
    fn handle_master_message(
        &mut self,
        message: &MasterMessage,
    ) -> Result<Option<Transaction>, Error> {
        self.address = message.mc().address();
        self.direction = message.mc().direction();

        match (self.state, self.direction) {
            (DiagnosisState::Idle, TransmissionDirection::Read) => {
                self.event_memory.clear();
                self.start_time = Some(message.start_time());
                self.goto_state(DiagnosisState::ReadEventMemory);
            }
            // resetting the event flag ends a read in progress
            (DiagnosisState::Idle | DiagnosisState::ReadEventMemory, TransmissionDirection::Write)
                if self.address == 0 =>
            {
                self.start_time = Some(message.start_time());
                self.goto_state(DiagnosisState::ResetEventFlag);
            }
            _ => {}
        }
        Ok(None)
    }

    fn handle_device_message(
        &mut self,
        message: &DeviceMessage,
    ) -> Result<Option<Transaction>, Error> {
        let start_time = self.start_time.unwrap_or_else(|| message.start_time());
        match self.state {
            DiagnosisState::Idle => Ok(None),
            DiagnosisState::ReadEventMemory => {
                if self.direction != TransmissionDirection::Read {
                    return Ok(None);
                }
                let value = message.od().first().copied().context(MissingOnRequestDataSnafu {
                    channel: CommChannel::Diagnosis,
                })?;
                self.event_memory.set_memory(self.address, value)?;
                if !self.event_memory.is_complete() {
                    return Ok(None);
                }

                self.goto_state(DiagnosisState::Idle);
                Ok(Some(Transaction::DiagEventMemory(EventMemoryTransaction {
                    start_time,
                    end_time: message.end_time(),
                    event_memory: self.event_memory.clone(),
                })))
            }
            DiagnosisState::ResetEventFlag => {
                self.goto_state(DiagnosisState::Idle);
                Ok(Some(Transaction::DiagEventReset(EventResetTransaction {
                    start_time,
                    end_time: message.end_time(),
                })))
            }
        }
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChecksumStatus, ChecksumType, MasterSequenceControl};
    use chrono::{Duration, TimeZone, Utc};

    fn t(micros: i64) -> Timestamp {
        Utc.with_ymd_and_hms(2050, 1, 1, 0, 0, 0).unwrap() + Duration::microseconds(micros)
    }

    fn mc(read: u8, address: u8) -> MasterSequenceControl {
        let mut mc = MasterSequenceControl::default();
        mc.set_read(read);
        mc.set_channel(2);
        mc.set_address(address);
        mc
    }

    fn cycle(
        channel: &mut DiagnosisChannel,
        read: u8,
        address: u8,
        od: u8,
        at: i64,
    ) -> Result<Option<Transaction>, Error> {
        let od = [od];
        let (master_od, device_od): (&[u8], &[u8]) = if read == 1 { (&[], &od) } else { (&od, &[]) };
        let master = MasterMessage::new(
            mc(read, address),
            ChecksumType::from_byte(0x40),
            &[],
            master_od,
            t(at),
            t(at + 500),
        )?;
        channel.handle_master_message(&master)?;
        let device =
            DeviceMessage::new(device_od, &[], ChecksumStatus::default(), t(at + 600), t(at + 1000))?;
        channel.handle_device_message(&device)
    }

    #[test]
    fn test_read_event_memory() {
        let mut channel = DiagnosisChannel::new();
        assert_eq!(cycle(&mut channel, 1, 0, 0x81, 0), Ok(None));
        assert_eq!(channel.state(), DiagnosisState::ReadEventMemory);
        assert_eq!(cycle(&mut channel, 1, 1, 0xE4, 2000), Ok(None));
        assert_eq!(cycle(&mut channel, 1, 2, 0x18, 4000), Ok(None));

        match cycle(&mut channel, 1, 3, 0x00, 6000) {
            Ok(Some(Transaction::DiagEventMemory(t_mem))) => {
                assert_eq!(t_mem.start_time, t(0));
                assert_eq!(t_mem.end_time, t(7000));
                assert_eq!(t_mem.event_memory.events()[0].code(), 0x1800);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(channel.state(), DiagnosisState::Idle);
    }

    #[test]
    fn test_reset_event_flag() {
        let mut channel = DiagnosisChannel::new();
        let transaction = cycle(&mut channel, 0, 0, 0x00, 0).unwrap();
        assert_eq!(
            transaction,
            Some(Transaction::DiagEventReset(EventResetTransaction {
                start_time: t(0),
                end_time: t(1000),
            }))
        );
        assert_eq!(channel.state(), DiagnosisState::Idle);
        assert_eq!(cycle(&mut channel, 0, 5, 0x00, 2000), Ok(None));
    }

    #[test]
    fn test_reset_during_read() {
        let mut channel = DiagnosisChannel::new();
        cycle(&mut channel, 1, 0, 0x81, 0).unwrap();
        let transaction = cycle(&mut channel, 0, 0, 0x00, 2000).unwrap();
        assert!(matches!(transaction, Some(Transaction::DiagEventReset(_))));
    }

    #[test]
    fn test_errors() {
        let mut channel = DiagnosisChannel::new();
        assert_eq!(
            cycle(&mut channel, 1, 0, 0x01, 0),
            Err(Error::InvalidEventStatusCode { value: 0x01 })
        );
        channel.reset();
        cycle(&mut channel, 1, 0, 0x81, 0).unwrap();
        assert_eq!(
            cycle(&mut channel, 1, 0x13, 0x00, 2000),
            Err(Error::InvalidEventMemoryAddress { address: 0x13 })
        );

        let master = MasterMessage::new(mc(1, 1), ChecksumType::from_byte(0x40), &[], &[], t(0), t(1)).unwrap();
        channel.handle_master_message(&master).unwrap();
        let device = DeviceMessage::new(&[], &[], ChecksumStatus::default(), t(2), t(3)).unwrap();
        assert_eq!(
            channel.handle_device_message(&device),
            Err(Error::MissingOnRequestData { channel: CommChannel::Diagnosis })
        );
    }
}
