use log::trace;

use super::ChannelHandler;
use crate::error::Error;
use crate::message::{DeviceMessage, MasterMessage};
use crate::transaction::{ProcessTransaction, Source, Transaction};
use crate::types::TransmissionDirection;

/// Process channel: no on-request service, each half is reported as is.
#[derive(Debug)]
pub struct ProcessChannel {
    direction: TransmissionDirection,
}

impl Default for ProcessChannel {
    fn default() -> Self {
        Self {
            direction: TransmissionDirection::Read,
        }
    }
}

impl ProcessChannel {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChannelHandler for ProcessChannel {
    fn handle_master_message(
        &mut self,
        message: &MasterMessage,
    ) -> Result<Option<Transaction>, Error> {
        self.direction = message.mc().direction();
        trace!("process channel, master {}", self.direction);
        Ok(Some(Transaction::Process(ProcessTransaction {
            start_time: message.start_time(),
            end_time: message.end_time(),
            source: Source::Master,
            direction: self.direction,
        })))
    }

    fn handle_device_message(
        &mut self,
        message: &DeviceMessage,
    ) -> Result<Option<Transaction>, Error> {
        Ok(Some(Transaction::Process(ProcessTransaction {
            start_time: message.start_time(),
            end_time: message.end_time(),
            source: Source::Device,
            direction: self.direction,
        })))
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}
