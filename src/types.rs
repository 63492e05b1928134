//! This module defines bit-field views over single IO-Link octets, plus the
//! small enumerations decoded from them.
//!
//! Every view wraps one `u8` and exposes each field through a getter and a
//! setter. Bits are numbered big-endian, i.e. the first field listed in a
//! view occupies the most significant bits of the octet.

use core::fmt;

use snafu::OptionExt;

use crate::error::{Error, InvalidOctetValueSnafu};

const fn field_mask(width: u32) -> u8 {
    ((1u16 << width) - 1) as u8
}

macro_rules! octet {
    (
        $(#[$meta:meta])*
        pub struct $name:ident {
            $(
                $(#[$field_meta:meta])*
                $field:ident / $setter:ident : $shift:literal, $width:literal;
            )*
        }
    ) => {
        $(#[$meta])*
        #[derive(PartialEq, Eq, Copy, Clone, Default, Hash)]
        #[repr(transparent)]
        pub struct $name(u8);

        impl $name {
            /// Create the view from an integer, checking that it is in \[0, 255\].
            /// # Errors
            /// Returns [`Error::InvalidOctetValue`] if `value` is out of range.
            pub fn new(value: impl Into<i64>) -> Result<Self, Error> {
                let value = value.into();
                let octet = u8::try_from(value)
                    .ok()
                    .context(InvalidOctetValueSnafu { value })?;
                Ok(Self(octet))
            }

            /// Create the view from a raw octet.
            pub const fn from_byte(octet: u8) -> Self {
                Self(octet)
            }

            /// The raw octet, all fields included.
            pub const fn to_byte(self) -> u8 {
                self.0
            }

            $(
                $(#[$field_meta])*
                pub const fn $field(self) -> u8 {
                    (self.0 >> $shift) & field_mask($width)
                }

                #[doc = concat!("Overwrite `", stringify!($field), "`, leaving all other fields untouched.")]
                pub fn $setter(&mut self, value: u8) {
                    let mask = field_mask($width) << $shift;
                    self.0 = (self.0 & !mask) | ((value << $shift) & mask);
                }
            )*
        }

        impl From<u8> for $name {
            fn from(octet: u8) -> Self {
                Self(octet)
            }
        }

        impl From<$name> for u8 {
            fn from(view: $name) -> Self {
                view.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($name))
                    $(.field(stringify!($field), &self.$field()))*
                    .finish()
            }
        }
    };
}

octet! {
    /// M-sequence control octet (MC), the first octet of every master message.
    pub struct MasterSequenceControl {
        /// 1 for a read transfer, 0 for a write.
        read / set_read: 7, 1;
        /// Communication channel, see [`CommChannel`].
        channel / set_channel: 5, 2;
        /// Page/diagnosis address or ISDU flow control value.
        address / set_address: 0, 5;
    }
}

impl MasterSequenceControl {
    pub const fn direction(self) -> TransmissionDirection {
        if self.read() == 1 {
            TransmissionDirection::Read
        } else {
            TransmissionDirection::Write
        }
    }

    pub const fn comm_channel(self) -> CommChannel {
        CommChannel::from_bits(self.channel())
    }
}

octet! {
    /// Checksum / M-sequence type octet (CKT), the second octet of every master message.
    pub struct ChecksumType {
        m_seq_type / set_m_seq_type: 6, 2;
        checksum / set_checksum: 0, 6;
    }
}

impl ChecksumType {
    /// The octet with the checksum bits cleared, as folded into the checksum.
    pub const fn without_checksum(self) -> u8 {
        self.0 & !field_mask(6)
    }
}

octet! {
    /// Checksum / status octet (CKS), the last octet of every device message.
    pub struct ChecksumStatus {
        event_flag / set_event_flag: 7, 1;
        pd_status / set_pd_status: 6, 1;
        checksum / set_checksum: 0, 6;
    }
}

impl ChecksumStatus {
    /// The octet with the checksum bits cleared, as folded into the checksum.
    pub const fn without_checksum(self) -> u8 {
        self.0 & !field_mask(6)
    }
}

octet! {
    /// The I-Service octet heading every ISDU.
    pub struct IService {
        service / set_service: 4, 4;
        length / set_length: 0, 4;
    }
}

impl IService {
    /// Length nibble announcing that the next octet carries the total length.
    pub const EXTENDED_LENGTH: u8 = 1;

    pub const fn with(service: u8, length: u8) -> Self {
        Self(((service & 0x0f) << 4) | (length & 0x0f))
    }

    pub const fn has_extended_length(self) -> bool {
        self.length() == Self::EXTENDED_LENGTH
    }
}

octet! {
    /// StatusCode type 1, without event details.
    pub struct StatusCodeType1 {
        details / set_details: 7, 1;
        pd_valid / set_pd_valid: 6, 1;
        event_code / set_event_code: 0, 5;
    }
}

octet! {
    /// StatusCode type 2, the first octet of the event memory.
    pub struct StatusCodeType2 {
        details / set_details: 7, 1;
        evt6 / set_evt6: 5, 1;
        evt5 / set_evt5: 4, 1;
        evt4 / set_evt4: 3, 1;
        evt3 / set_evt3: 2, 1;
        evt2 / set_evt2: 1, 1;
        evt1 / set_evt1: 0, 1;
    }
}

impl StatusCodeType2 {
    /// Whether event slot `slot` (0 based) is flagged as holding an event.
    pub const fn is_event_active(self, slot: usize) -> bool {
        slot < 6 && (self.0 >> slot) & 1 == 1
    }
}

octet! {
    /// First octet of an event slot.
    pub struct EventQualifier {
        mode / set_mode: 6, 2;
        event_type / set_event_type: 4, 2;
        source / set_source: 3, 1;
        instance / set_instance: 0, 3;
    }
}

octet! {
    /// Encoded master or minimum cycle time.
    pub struct CycleTimeOctet {
        time_base / set_time_base: 6, 2;
        multiplier / set_multiplier: 0, 6;
    }
}

octet! {
    /// Direct parameter "M-sequenceCapability".
    pub struct MSequenceCapability {
        preoperate_code / set_preoperate_code: 4, 2;
        operate_code / set_operate_code: 1, 3;
        isdu_supported / set_isdu_supported: 0, 1;
    }
}

octet! {
    /// Direct parameter "RevisionID".
    pub struct RevisionId {
        major / set_major: 4, 4;
        minor / set_minor: 0, 4;
    }
}

octet! {
    /// Direct parameter "ProcessDataIn".
    pub struct ProcessDataIn {
        byte / set_byte: 7, 1;
        sio / set_sio: 6, 1;
        length / set_length: 0, 5;
    }
}

octet! {
    /// Direct parameter "ProcessDataOut".
    pub struct ProcessDataOut {
        byte / set_byte: 7, 1;
        length / set_length: 0, 5;
    }
}

/// Logical channel selected by the MC octet.
#[derive(PartialEq, Eq, Debug, Copy, Clone, Hash)]
pub enum CommChannel {
    Process,
    Page,
    Diagnosis,
    Isdu,
}

impl CommChannel {
    const fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0 => Self::Process,
            1 => Self::Page,
            2 => Self::Diagnosis,
            _ => Self::Isdu,
        }
    }
}

impl fmt::Display for CommChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Process => "Process",
            Self::Page => "Page",
            Self::Diagnosis => "Diagnosis",
            Self::Isdu => "ISDU",
        };
        f.write_str(name)
    }
}

/// Direction of the on-request data transfer, as seen from the master.
#[derive(PartialEq, Eq, Debug, Copy, Clone, Hash)]
pub enum TransmissionDirection {
    Write,
    Read,
}

impl fmt::Display for TransmissionDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Write => f.write_str("Write"),
            Self::Read => f.write_str("Read"),
        }
    }
}
