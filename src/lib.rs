//! Passive decoder for IO-Link (SDCI) master/device traffic.
//!
//! Two sans-io stages turn a capture of the C/Q line into protocol level
//! transactions:
//!
//! 1. [`OctetStreamDecoder`] frames timestamped octets into
//!    [`MasterMessage`]s and [`DeviceMessage`]s, using the configured
//!    M-sequence payload lengths and the inter-octet timing of the bit rate.
//! 2. [`MessageInterpreter`] dispatches the frames to the handler of their
//!    communication channel (process data, parameter page, diagnosis, ISDU)
//!    and emits a [`Transaction`] whenever a protocol service completes.
//!
//! Neither stage does any I/O, you feed them and they hand back results.
//!
//! ```
//! use chrono::{Duration, TimeZone, Utc};
//! use iolink_proto::{BitRate, DecoderSettings, MessageInterpreter, OctetStreamDecoder, Transaction};
//!
//! let mut decoder = OctetStreamDecoder::new(DecoderSettings {
//!     bit_rate: BitRate::Com2,
//!     ..Default::default()
//! })?;
//! let mut interpreter = MessageInterpreter::new();
//!
//! let t0 = Utc.with_ymd_and_hms(2050, 1, 1, 0, 0, 0).unwrap();
//! let at = |micros| t0 + Duration::microseconds(micros);
//! // startup page read of index 2, answered with 0x49
//! let capture = [(162, 0, 286), (0, 290, 576), (73, 700, 986), (6, 990, 1276)];
//!
//! let mut transactions = Vec::new();
//! for (octet, start, end) in capture {
//!     if let Some(message) = decoder.process_octet(octet, at(start), at(end))? {
//!         transactions.extend(interpreter.process_message(&message)?);
//!     }
//! }
//! match transactions.as_slice() {
//!     [Transaction::Page(page)] => assert_eq!((page.index, page.value), (2, 0x49)),
//!     other => panic!("{other:?}"),
//! }
//! # Ok::<(), iolink_proto::Error>(())
//! ```

mod buffer;
pub mod channel;
mod error;
pub mod event_memory;
mod flow_control;
mod interpreter;
pub mod isdu;
mod isdu_error;
mod message;
mod nom_parser;
pub mod settings;
mod stream_decoder;
pub mod transaction;
pub mod types;

pub use error::Error;
pub use flow_control::FlowControl;
pub use interpreter::MessageInterpreter;
pub use isdu_error::IsduError;
pub use message::{frame_checksum, DeviceMessage, MasterMessage, Message, Payload};
pub use nom_parser::{Addressing, ParameterAddress};
pub use settings::{BitRate, DecoderSettings, MSeqPayloadLength, TimingConstraints};
pub use stream_decoder::{DecodingState, OctetStreamDecoder};
pub use transaction::Transaction;

/// Capture time of an octet edge.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
