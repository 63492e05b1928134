use log::debug;
use snafu::OptionExt;

use super::ChannelHandler;
use crate::error::{Error, MissingOnRequestDataSnafu};
use crate::message::{DeviceMessage, MasterMessage};
use crate::transaction::{PageTransaction, Transaction};
use crate::types::{CommChannel, TransmissionDirection};
use crate::Timestamp;

#[derive(Debug, Clone, Copy)]
struct PendingAccess {
    start_time: Timestamp,
    direction: TransmissionDirection,
    index: u8,
    /// The written octet. Reads take it from the device half.
    value: Option<u8>,
}

/// Direct parameter page channel: one octet per cycle.
#[derive(Debug, Default)]
pub struct PageChannel {
    pending: Option<PendingAccess>,
}

impl PageChannel {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChannelHandler for PageChannel {
    fn handle_master_message(
        &mut self,
        message: &MasterMessage,
    ) -> Result<Option<Transaction>, Error> {
        let direction = message.mc().direction();
        let value = match direction {
            TransmissionDirection::Write => Some(first_octet(message.od())?),
            TransmissionDirection::Read => None,
        };
        self.pending = Some(PendingAccess {
            start_time: message.start_time(),
            direction,
            index: message.mc().address(),
            value,
        });
        Ok(None)
    }

    fn handle_device_message(
        &mut self,
        message: &DeviceMessage,
    ) -> Result<Option<Transaction>, Error> {
        let Some(access) = self.pending.take() else {
            return Ok(None);
        };
        let value = match access.value {
            Some(value) => value,
            None => first_octet(message.od())?,
        };

        debug!("page {} index {} value {value:#04x}", access.direction, access.index);
        Ok(Some(Transaction::Page(PageTransaction {
            start_time: access.start_time,
            end_time: message.end_time(),
            direction: access.direction,
            index: access.index,
            value,
        })))
    }

    fn reset(&mut self) {
        self.pending = None;
    }
}

fn first_octet(od: &[u8]) -> Result<u8, Error> {
    od.first().copied().context(MissingOnRequestDataSnafu {
        channel: CommChannel::Page,
    })
}
