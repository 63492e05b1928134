//! Error type shared by every layer of the decoder.
//!
//! All variants are fatal for the operation that returned them: they signal
//! either a configuration fault or a capture the decoder cannot make sense of.
//! Recoverable conditions (checksum mismatches, timing gaps, aborts) never
//! surface here, they are reported through validity flags or silent resets.

use snafu::Snafu;

use crate::types::CommChannel;

/// Error type for this crate
#[derive(Debug, Snafu, Clone, PartialEq, Eq)]
#[snafu(visibility(pub(crate)))]
#[non_exhaustive]
pub enum Error {
    /// The value doesn't fit into a single octet.
    #[snafu(display("Invalid octet value {value} (expected 0..=255)"))]
    InvalidOctetValue { value: i64 },

    /// The address field of an ISDU control octet isn't a FlowCTRL value.
    #[snafu(display("Invalid ISDU flow control value {value:#04x}"))]
    InvalidFlowControlValue { value: u8 },

    /// The M-sequence type of a checksum/type octet has no configured lengths.
    #[snafu(display("Invalid M-sequence type {m_seq_type}"))]
    InvalidMSeqCode { m_seq_type: u8 },

    /// The bit rate is unknown, or can't be used for decoding.
    #[snafu(display("Invalid bit rate '{bit_rate}'"))]
    InvalidBitRate { bit_rate: String },

    /// A configured payload length exceeds what a frame can carry.
    #[snafu(display("Payload length {length} exceeds the maximum of {max} octets"))]
    InvalidPayloadLength { length: usize, max: usize },

    /// The service nibble doesn't select a known request or response.
    #[snafu(display("Invalid ISDU {kind} service {service:#06b}"))]
    InvalidIsduService { service: u8, kind: &'static str },

    /// An ISDU error response carries an error code pair that isn't defined.
    #[snafu(display(
        "Unknown ISDU error: error code {error_code:#04x}, additional code {additional_code:#04x}"
    ))]
    UnknownIsduError { error_code: u8, additional_code: u8 },

    /// An ISDU frame is missing the on-request data it has to carry.
    #[snafu(display("ISDU message without on-request data"))]
    InvalidIsduMessage,

    /// A page or diagnosis frame is missing its on-request data octet.
    #[snafu(display("Missing on-request data on the {channel} channel"))]
    MissingOnRequestData { channel: CommChannel },

    /// The diagnosis channel addressed an octet beyond the event memory.
    #[snafu(display("Invalid event memory address {address:#04x} (max 0x12)"))]
    InvalidEventMemoryAddress { address: u8 },

    /// The event memory status octet isn't a StatusCode type 2.
    #[snafu(display("Event memory status code {value:#04x} without details"))]
    InvalidEventStatusCode { value: u8 },

    /// Octet timestamps went backwards.
    #[snafu(display("Octet timestamps out of order"))]
    TimestampOutOfOrder,
}
