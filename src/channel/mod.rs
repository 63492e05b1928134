//! Handlers for the four communication channels.
//!
//! The master half of a cycle selects the channel, the device half completes
//! it. Each handler keeps the state it needs between the two halves, and
//! between cycles for services spanning several of them.

use crate::error::Error;
use crate::message::{DeviceMessage, MasterMessage};
use crate::transaction::Transaction;

mod diagnosis;
mod isdu;
mod page;
mod process;

pub use diagnosis::{DiagnosisChannel, DiagnosisState};
pub use isdu::{IsduChannel, IsduState};
pub use page::PageChannel;
pub use process::ProcessChannel;

/// A channel handler, fed with the frames addressed to its channel.
pub trait ChannelHandler {
    /// Handle the master half of a cycle.
    /// # Errors
    /// Returns an error if the frame can't be interpreted on this channel.
    fn handle_master_message(
        &mut self,
        message: &MasterMessage,
    ) -> Result<Option<Transaction>, Error>;

    /// Handle the device half of a cycle.
    /// # Errors
    /// Returns an error if the frame can't be interpreted on this channel.
    fn handle_device_message(
        &mut self,
        message: &DeviceMessage,
    ) -> Result<Option<Transaction>, Error>;

    /// Drop all state.
    fn reset(&mut self);
}
