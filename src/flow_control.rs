//! FlowCTRL values carried in the address field of ISDU master messages.

use core::fmt;

use crate::error::{Error, InvalidFlowControlValueSnafu};

/// Classified FlowCTRL value.
#[derive(PartialEq, Eq, Debug, Copy, Clone, Hash)]
pub enum FlowControl {
    /// Segment counter of a running transfer, 0x00 to 0x0F.
    Count(u8),
    /// First segment of a transfer.
    Start,
    /// No transfer in progress, 0x11 or 0x12.
    Idle(u8),
    Abort,
}

impl FlowControl {
    /// # Errors
    /// Returns [`Error::InvalidFlowControlValue`] for reserved values.
    pub fn new(value: u8) -> Result<Self, Error> {
        match value {
            0x00..=0x0F => Ok(Self::Count(value)),
            0x10 => Ok(Self::Start),
            0x11 | 0x12 => Ok(Self::Idle(value)),
            0x1F => Ok(Self::Abort),
            _ => InvalidFlowControlValueSnafu { value }.fail(),
        }
    }

    pub const fn value(self) -> u8 {
        match self {
            Self::Count(count) => count,
            Self::Start => 0x10,
            Self::Idle(value) => value,
            Self::Abort => 0x1F,
        }
    }

    /// The value expected for the segment following this one. The counter
    /// wraps from 15 to 0.
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Start => Some(Self::Count(1)),
            Self::Count(count) => Some(Self::Count((count + 1) & 0x0F)),
            Self::Idle(_) | Self::Abort => None,
        }
    }

    /// Whether a segment with this value carries ISDU octets.
    pub const fn carries_data(self) -> bool {
        matches!(self, Self::Start | Self::Count(_))
    }
}

impl TryFrom<u8> for FlowControl {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl fmt::Display for FlowControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Count(count) => write!(f, "Count({count})"),
            Self::Start => f.write_str("Start"),
            Self::Idle(value) => write!(f, "Idle({value:#04x})"),
            Self::Abort => f.write_str("Abort"),
        }
    }
}

/// How a new segment relates to the previous one.
#[derive(PartialEq, Eq, Debug, Copy, Clone)]
pub(crate) enum Segment {
    /// Same value again: the previous segment is being retransmitted.
    Repeated,
    /// The expected successor.
    Next,
    /// Neither, the transfer is broken.
    OutOfSequence,
}

impl Segment {
    pub(crate) fn classify(previous: FlowControl, current: FlowControl) -> Self {
        if current == previous {
            Self::Repeated
        } else if previous.next() == Some(current) {
            Self::Next
        } else {
            Self::OutOfSequence
        }
    }
}
