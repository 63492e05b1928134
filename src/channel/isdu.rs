use core::mem;

use log::{debug, trace, warn};
use snafu::{ensure, OptionExt};

use super::ChannelHandler;
use crate::error::{Error, InvalidIsduMessageSnafu};
use crate::flow_control::{FlowControl, Segment};
use crate::isdu::{Isdu, NO_SERVICE};
use crate::message::{DeviceMessage, MasterMessage};
use crate::transaction::{IsduTransaction, Transaction};
use crate::types::{IService, TransmissionDirection};
use crate::Timestamp;

/// Progress of the ISDU channel.
#[derive(PartialEq, Eq, Debug, Copy, Clone)]
pub enum IsduState {
    Idle,
    /// The master is transmitting request segments.
    Request,
    /// The request is complete, waiting for the device half to confirm it.
    RequestFinished,
    /// The master polls for the response, the device is busy.
    WaitForResponse,
    /// The device is transmitting response segments.
    Response,
}

#[derive(Debug)]
struct Pending {
    isdu: Isdu,
    start_time: Timestamp,
    end_time: Timestamp,
    /// Flow control of the most recent data segment.
    last_fc: FlowControl,
}

impl Pending {
    /// Add a segment announced by `fc`. Returns `None` if the segment
    /// doesn't continue the transfer, else whether the unit is complete.
    fn add_segment(
        &mut self,
        fc: FlowControl,
        od: &[u8],
        end_time: Timestamp,
    ) -> Result<Option<bool>, Error> {
        ensure!(!od.is_empty(), InvalidIsduMessageSnafu);
        let complete = match Segment::classify(self.last_fc, fc) {
            Segment::Repeated => {
                trace!("ISDU segment {fc} retransmitted");
                self.isdu.replace_trailing_octets(od)?
            }
            Segment::Next => self.isdu.append_octets(od)?,
            Segment::OutOfSequence => return Ok(None),
        };
        self.last_fc = fc;
        self.end_time = end_time;
        Ok(Some(complete))
    }

    fn into_transaction(self) -> Transaction {
        debug!("{}", self.isdu);
        Transaction::Isdu(IsduTransaction {
            start_time: self.start_time,
            end_time: self.end_time,
            isdu: self.isdu,
        })
    }
}

#[derive(Debug)]
enum State {
    Idle,
    Request(Pending),
    RequestFinished(Pending),
    WaitForResponse { response_start: Option<Timestamp> },
    Response(Pending),
}

/// The flow control and direction of the latest master half.
#[derive(Debug, Copy, Clone)]
struct MasterPoll {
    fc: FlowControl,
    direction: TransmissionDirection,
    start_time: Timestamp,
}

impl MasterPoll {
    fn is_start_read(self) -> bool {
        self.fc == FlowControl::Start && self.direction == TransmissionDirection::Read
    }
}

type Step = (State, Option<Transaction>);

const fn public_state(state: &State) -> IsduState {
    match state {
        State::Idle => IsduState::Idle,
        State::Request(_) => IsduState::Request,
        State::RequestFinished(_) => IsduState::RequestFinished,
        State::WaitForResponse { .. } => IsduState::WaitForResponse,
        State::Response(_) => IsduState::Response,
    }
}

/// ISDU channel: segmented requests from the master and the device's
/// responses, reassembled across cycles.
///
/// A fatal error while decoding drops the transfer in progress.
#[derive(Debug)]
pub struct IsduChannel {
    state: State,
    poll: Option<MasterPoll>,
}

impl Default for IsduChannel {
    fn default() -> Self {
        Self {
            state: State::Idle,
            poll: None,
        }
    }
}

impl IsduChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn state(&self) -> IsduState {
        public_state(&self.state)
    }

    fn goto_state(&mut self, state: State) {
        let (from, to) = (self.state(), public_state(&state));
        if from != to {
            debug!("ISDU channel {from:?} -> {to:?}");
        }
        self.state = state;
    }

    fn on_master(state: State, message: &MasterMessage, poll: MasterPoll) -> Result<Step, Error> {
        let is_write = poll.direction == TransmissionDirection::Write;
        let starts_request = is_write && poll.fc == FlowControl::Start;

        match state {
            State::Idle => Self::start_request(message, poll),
            State::Request(mut pending) => {
                if !is_write || !poll.fc.carries_data() {
                    return Ok((State::Request(pending), None));
                }
                match pending.add_segment(poll.fc, message.od(), message.end_time())? {
                    Some(true) => Ok((State::RequestFinished(pending), None)),
                    Some(false) => Ok((State::Request(pending), None)),
                    None => {
                        warn!(
                            "ISDU request segment {} out of sequence after {}",
                            poll.fc, pending.last_fc
                        );
                        Self::start_request(message, poll)
                    }
                }
            }
            State::RequestFinished(mut pending) => {
                if is_write && poll.fc == pending.last_fc {
                    let complete = pending
                        .add_segment(poll.fc, message.od(), message.end_time())?
                        .unwrap_or(true);
                    let state = if complete {
                        State::RequestFinished(pending)
                    } else {
                        State::Request(pending)
                    };
                    return Ok((state, None));
                }
                if poll.is_start_read() {
                    // the confirming device half got lost
                    return Ok((
                        State::WaitForResponse {
                            response_start: Some(poll.start_time),
                        },
                        Some(pending.into_transaction()),
                    ));
                }
                if starts_request {
                    warn!("ISDU {} dropped by a new request", pending.isdu.variant());
                    return Self::start_request(message, poll);
                }
                Ok((State::RequestFinished(pending), None))
            }
            State::WaitForResponse { response_start } => {
                if poll.is_start_read() {
                    return Ok((
                        State::WaitForResponse {
                            response_start: Some(poll.start_time),
                        },
                        None,
                    ));
                }
                if starts_request {
                    return Self::start_request(message, poll);
                }
                Ok((State::WaitForResponse { response_start }, None))
            }
            State::Response(pending) => {
                if starts_request {
                    warn!("ISDU {} dropped by a new request", pending.isdu.variant());
                    return Self::start_request(message, poll);
                }
                Ok((State::Response(pending), None))
            }
        }
    }

    fn start_request(message: &MasterMessage, poll: MasterPoll) -> Result<Step, Error> {
        if poll.fc != FlowControl::Start || poll.direction != TransmissionDirection::Write {
            return Ok((State::Idle, None));
        }
        let isdu = Isdu::new_request(message.od())?;
        let complete = isdu.is_complete();
        let pending = Pending {
            isdu,
            start_time: message.start_time(),
            end_time: message.end_time(),
            last_fc: FlowControl::Start,
        };
        if complete {
            Ok((State::RequestFinished(pending), None))
        } else {
            Ok((State::Request(pending), None))
        }
    }

    fn on_device(
        state: State,
        poll: Option<MasterPoll>,
        message: &DeviceMessage,
    ) -> Result<Step, Error> {
        match state {
            State::Idle | State::Request(_) => Ok((state, None)),
            State::RequestFinished(mut pending) => {
                pending.end_time = message.end_time();
                Ok((
                    State::WaitForResponse { response_start: None },
                    Some(pending.into_transaction()),
                ))
            }
            State::WaitForResponse { response_start } => match poll {
                Some(poll) if poll.is_start_read() => Self::start_response(message, response_start),
                _ => Ok((State::WaitForResponse { response_start }, None)),
            },
            State::Response(mut pending) => {
                let Some(poll) = poll.filter(|poll| {
                    poll.direction == TransmissionDirection::Read && poll.fc.carries_data()
                }) else {
                    return Ok((State::Response(pending), None));
                };
                match pending.add_segment(poll.fc, message.od(), message.end_time())? {
                    Some(true) => Ok((State::Idle, Some(pending.into_transaction()))),
                    Some(false) => Ok((State::Response(pending), None)),
                    None if poll.fc == FlowControl::Start => {
                        warn!("ISDU response restarted after {}", pending.last_fc);
                        Self::start_response(message, Some(poll.start_time))
                    }
                    None => {
                        warn!(
                            "ISDU response segment {} out of sequence after {}",
                            poll.fc, pending.last_fc
                        );
                        Ok((State::Idle, None))
                    }
                }
            }
        }
    }

    fn start_response(
        message: &DeviceMessage,
        response_start: Option<Timestamp>,
    ) -> Result<Step, Error> {
        let first = message.od().first().context(InvalidIsduMessageSnafu)?;
        if IService::from_byte(*first).service() == NO_SERVICE {
            trace!("device busy");
            return Ok((State::WaitForResponse { response_start }, None));
        }

        let isdu = Isdu::new_response(message.od())?;
        let pending = Pending {
            start_time: response_start.unwrap_or_else(|| message.start_time()),
            end_time: message.end_time(),
            last_fc: FlowControl::Start,
            isdu,
        };
        if pending.isdu.is_complete() {
            Ok((State::Idle, Some(pending.into_transaction())))
        } else {
            Ok((State::Response(pending), None))
        }
    }
}

impl ChannelHandler for IsduChannel {
    fn handle_master_message(
        &mut self,
        message: &MasterMessage,
    ) -> Result<Option<Transaction>, Error> {
        let mc = message.mc();
        let poll = MasterPoll {
            fc: FlowControl::new(mc.address())?,
            direction: mc.direction(),
            start_time: message.start_time(),
        };
        self.poll = Some(poll);
        trace!("ISDU master {} {}", poll.direction, poll.fc);

        if poll.fc == FlowControl::Abort {
            if self.state() != IsduState::Idle {
                debug!("ISDU aborted in {:?}", self.state());
            }
            self.state = State::Idle;
            return Ok(None);
        }

        let state = mem::replace(&mut self.state, State::Idle);
        let (state, transaction) = Self::on_master(state, message, poll)?;
        self.goto_state(state);
        Ok(transaction)
    }

    fn handle_device_message(
        &mut self,
        message: &DeviceMessage,
    ) -> Result<Option<Transaction>, Error> {
        let state = mem::replace(&mut self.state, State::Idle);
        let (state, transaction) = Self::on_device(state, self.poll, message)?;
        self.goto_state(state);
        Ok(transaction)
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}
