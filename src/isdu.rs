//! Reassembly and interpretation of ISDUs (indexed service data units).
//!
//! An ISDU is transferred in segments of on-request data. The first octet is
//! the I-Service octet: its high nibble selects the service, its low nibble
//! holds the total length of the unit. A length nibble of 1 announces that the
//! second octet holds the total length instead, allowing units of up to 255
//! octets. The last octet is a check octet, the XOR of all preceding ones.

use core::fmt;
use core::ops::Range;

use log::warn;
use snafu::OptionExt;

use crate::buffer::Buffer;
use crate::error::{
    Error, InvalidIsduMessageSnafu, InvalidIsduServiceSnafu, UnknownIsduSnafu,
};
use crate::isdu_error::IsduError;
use crate::message::Hex;
use crate::nom_parser::{self, Addressing, ParameterAddress};
use crate::types::IService;

/// Service nibble of a device answer that has nothing to report yet.
pub const NO_SERVICE: u8 = 0b0000;

/// The ten ISDU services, selected by the I-Service nibble.
#[derive(PartialEq, Eq, Debug, Copy, Clone, Hash)]
pub enum IsduVariant {
    Write8bitIdx,
    Write8bitIdxSub,
    Write16bitIdxSub,
    Read8bitIdx,
    Read8bitIdxSub,
    Read16bitIdxSub,
    /// Negative write response.
    WriteRespM,
    /// Positive write response.
    WriteRespP,
    /// Negative read response.
    ReadRespM,
    /// Positive read response.
    ReadRespP,
}

impl IsduVariant {
    /// Select a request variant.
    /// # Errors
    /// Returns [`Error::InvalidIsduService`] if the nibble isn't a request.
    pub fn request(service: IService) -> Result<Self, Error> {
        match service.service() {
            0b0001 => Ok(Self::Write8bitIdx),
            0b0010 => Ok(Self::Write8bitIdxSub),
            0b0011 => Ok(Self::Write16bitIdxSub),
            0b1001 => Ok(Self::Read8bitIdx),
            0b1010 => Ok(Self::Read8bitIdxSub),
            0b1011 => Ok(Self::Read16bitIdxSub),
            service => InvalidIsduServiceSnafu { service, kind: "request" }.fail(),
        }
    }

    /// Select a response variant.
    /// # Errors
    /// Returns [`Error::InvalidIsduService`] if the nibble isn't a response.
    pub fn response(service: IService) -> Result<Self, Error> {
        match service.service() {
            0b0100 => Ok(Self::WriteRespM),
            0b0101 => Ok(Self::WriteRespP),
            0b1100 => Ok(Self::ReadRespM),
            0b1101 => Ok(Self::ReadRespP),
            service => InvalidIsduServiceSnafu { service, kind: "response" }.fail(),
        }
    }

    /// The I-Service nibble of this variant.
    pub const fn service(self) -> u8 {
        match self {
            Self::Write8bitIdx => 0b0001,
            Self::Write8bitIdxSub => 0b0010,
            Self::Write16bitIdxSub => 0b0011,
            Self::WriteRespM => 0b0100,
            Self::WriteRespP => 0b0101,
            Self::Read8bitIdx => 0b1001,
            Self::Read8bitIdxSub => 0b1010,
            Self::Read16bitIdxSub => 0b1011,
            Self::ReadRespM => 0b1100,
            Self::ReadRespP => 0b1101,
        }
    }

    pub const fn is_request(self) -> bool {
        self.addressing().is_some()
    }

    pub const fn is_write_request(self) -> bool {
        matches!(
            self,
            Self::Write8bitIdx | Self::Write8bitIdxSub | Self::Write16bitIdxSub
        )
    }

    /// How a request addresses its parameter, `None` for responses.
    pub const fn addressing(self) -> Option<Addressing> {
        match self {
            Self::Write8bitIdx | Self::Read8bitIdx => Some(Addressing::Index8),
            Self::Write8bitIdxSub | Self::Read8bitIdxSub => Some(Addressing::Index8Sub),
            Self::Write16bitIdxSub | Self::Read16bitIdxSub => Some(Addressing::Index16Sub),
            Self::WriteRespM | Self::WriteRespP | Self::ReadRespM | Self::ReadRespP => None,
        }
    }

    /// Number of octets preceding the payload.
    pub const fn header_len(self, extended_length: bool) -> usize {
        let service = if extended_length { 2 } else { 1 };
        match self.addressing() {
            Some(addressing) => service + addressing.len(),
            None => match self {
                Self::WriteRespM | Self::ReadRespM => service + 2,
                _ => service,
            },
        }
    }

    const fn kind(self) -> &'static str {
        if self.is_request() {
            "request"
        } else {
            "response"
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Write8bitIdx => "Write8bitIdx",
            Self::Write8bitIdxSub => "Write8bitIdxSub",
            Self::Write16bitIdxSub => "Write16bitIdxSub",
            Self::Read8bitIdx => "Read8bitIdx",
            Self::Read8bitIdxSub => "Read8bitIdxSub",
            Self::Read16bitIdxSub => "Read16bitIdxSub",
            Self::WriteRespM => "WriteResp_M",
            Self::WriteRespP => "WriteResp_P",
            Self::ReadRespM => "ReadResp_M",
            Self::ReadRespP => "ReadResp_P",
        }
    }
}

impl fmt::Display for IsduVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An ISDU being reassembled, or a complete one.
///
/// Completeness and validity are re-evaluated after every segment. A complete
/// unit can be invalid: wrong check octet, or a length the service doesn't
/// allow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Isdu {
    variant: IsduVariant,
    buffer: Buffer,
    complete: bool,
    valid: bool,
    check_byte: u8,
    address: Option<ParameterAddress>,
    error: Option<IsduError>,
    data: Range<usize>,
}

impl Isdu {
    /// An empty unit of the given variant.
    pub fn new(variant: IsduVariant) -> Self {
        Self {
            variant,
            buffer: Buffer::new(),
            complete: false,
            valid: false,
            check_byte: 0,
            address: None,
            error: None,
            data: 0..0,
        }
    }

    /// Start a request from its first segment.
    /// # Errors
    /// - [`Error::InvalidIsduMessage`] if `segment` is empty.
    /// - [`Error::InvalidIsduService`] if the service isn't a request.
    pub fn new_request(segment: &[u8]) -> Result<Self, Error> {
        let first = segment.first().context(InvalidIsduMessageSnafu)?;
        let mut isdu = Self::new(IsduVariant::request(IService::from_byte(*first))?);
        isdu.append_octets(segment)?;
        Ok(isdu)
    }

    /// Start a response from its first segment.
    /// # Errors
    /// - [`Error::InvalidIsduMessage`] if `segment` is empty.
    /// - [`Error::InvalidIsduService`] if the service isn't a response.
    /// - [`Error::UnknownIsduError`] if the segment completes a negative
    ///   response with an undefined error code pair.
    pub fn new_response(segment: &[u8]) -> Result<Self, Error> {
        let first = segment.first().context(InvalidIsduMessageSnafu)?;
        let mut isdu = Self::new(IsduVariant::response(IService::from_byte(*first))?);
        isdu.append_octets(segment)?;
        Ok(isdu)
    }

    /// Add the next segment. Returns whether the unit is complete.
    ///
    /// Octets beyond the announced total length are dropped.
    /// # Errors
    /// - [`Error::InvalidIsduMessage`] if the first segment is empty.
    /// - [`Error::InvalidIsduService`] if the first segment carries the
    ///   service of another variant.
    /// - [`Error::UnknownIsduError`] for undefined error code pairs.
    pub fn append_octets(&mut self, segment: &[u8]) -> Result<bool, Error> {
        if self.buffer.is_empty() {
            self.check_service(segment)?;
        }
        self.buffer.write(segment);
        self.evaluate()?;
        Ok(self.complete)
    }

    /// Replace the most recent segment with a retransmission of it.
    /// Returns whether the unit is complete.
    /// # Errors
    /// Same as [`Isdu::append_octets`]. A retransmitted first segment has
    /// to carry the same service.
    pub fn replace_trailing_octets(&mut self, segment: &[u8]) -> Result<bool, Error> {
        if self.buffer.last_chunk_start() == 0 {
            self.check_service(segment)?;
        }
        self.buffer.replace_last(segment);
        self.evaluate()?;
        Ok(self.complete)
    }

    fn check_service(&self, segment: &[u8]) -> Result<(), Error> {
        let first = segment.first().context(InvalidIsduMessageSnafu)?;
        let service = IService::from_byte(*first).service();
        if service != self.variant.service() {
            return InvalidIsduServiceSnafu { service, kind: self.variant.kind() }.fail();
        }
        Ok(())
    }

    pub const fn variant(&self) -> IsduVariant {
        self.variant
    }

    pub const fn is_complete(&self) -> bool {
        self.complete
    }

    pub const fn is_valid(&self) -> bool {
        self.valid
    }

    /// XOR of all octets before the check octet, once complete.
    pub const fn check_byte(&self) -> u8 {
        self.check_byte
    }

    /// All octets received so far.
    pub fn raw(&self) -> &[u8] {
        self.buffer.as_slice()
    }

    pub fn i_service(&self) -> Option<IService> {
        self.raw().first().copied().map(IService::from_byte)
    }

    pub fn has_extended_length(&self) -> bool {
        self.i_service().map_or(false, IService::has_extended_length)
    }

    /// Total length announced by the header, if already received.
    pub fn total_length(&self) -> Option<usize> {
        let service = self.i_service()?;
        if service.has_extended_length() {
            self.raw().get(1).map(|&total| usize::from(total))
        } else {
            Some(usize::from(service.length()))
        }
    }

    /// Parameter index of a complete request.
    pub fn index(&self) -> Option<u16> {
        self.address.map(|address| address.index)
    }

    /// Parameter subindex of a complete request addressing one.
    pub fn sub_index(&self) -> Option<u8> {
        self.address.and_then(|address| address.sub_index)
    }

    /// Error of a complete negative response.
    pub const fn error(&self) -> Option<IsduError> {
        self.error
    }

    /// Payload of a complete write request or positive read response.
    pub fn data(&self) -> &[u8] {
        self.raw().get(self.data.clone()).unwrap_or_default()
    }

    /// Presentation fields of the unit.
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![("valid", self.valid.to_string())];
        if let Some(address) = self.address {
            fields.push(("index", address.index.to_string()));
            if let Some(sub_index) = address.sub_index {
                fields.push(("subIndex", sub_index.to_string()));
            }
        }
        match self.variant {
            IsduVariant::WriteRespM | IsduVariant::ReadRespM => {
                if let Some(error) = self.error {
                    fields.push(("error", error.to_string()));
                }
            }
            IsduVariant::ReadRespP => fields.push(("data", Hex(self.data()).to_string())),
            variant if variant.is_write_request() => {
                fields.push(("data", Hex(self.data()).to_string()));
            }
            _ => {}
        }
        fields
    }

    fn evaluate(&mut self) -> Result<(), Error> {
        self.complete = false;
        self.valid = false;
        self.check_byte = 0;
        self.address = None;
        self.error = None;
        self.data = 0..0;

        let Some(total) = self.total_length() else {
            return Ok(());
        };
        let header = if self.has_extended_length() { 2 } else { 1 };
        if total <= header {
            warn!("{} with impossible total length {total}", self.variant);
            // trailing segment octets go, the header stays readable
            self.buffer.truncate(header);
            self.complete = true;
            return Ok(());
        }

        if self.buffer.len() > total {
            self.buffer.truncate(total);
        }
        if self.buffer.len() < total {
            return Ok(());
        }

        self.complete = true;
        let (check, body) = match self.buffer.as_slice().split_last() {
            Some((check, body)) => (*check, body),
            None => return Ok(()),
        };
        self.check_byte = body.iter().fold(0, |acc, b| acc ^ b);
        self.valid = check == self.check_byte;
        if !self.valid {
            warn!(
                "{} check octet mismatch: {check:#04x} != {:#04x}",
                self.variant, self.check_byte
            );
        }
        self.interpret(total)
    }

    /// Decode the header of a complete unit of `total` octets.
    fn interpret(&mut self, total: usize) -> Result<(), Error> {
        let extended = self.has_extended_length();
        let body = &self.buffer.as_slice()[..total - 1];
        let expected_len = self.variant.header_len(extended) + 1;

        match self.variant {
            IsduVariant::Write8bitIdx
            | IsduVariant::Write8bitIdxSub
            | IsduVariant::Write16bitIdxSub => {
                let addressing = self.variant.addressing().unwrap_or(Addressing::Index8);
                match nom_parser::request(addressing, body) {
                    Ok((rest, address)) => {
                        self.address = Some(address);
                        self.data = (body.len() - rest.len())..body.len();
                    }
                    Err(_) => self.valid = false,
                }
            }
            IsduVariant::Read8bitIdx
            | IsduVariant::Read8bitIdxSub
            | IsduVariant::Read16bitIdxSub => {
                let addressing = self.variant.addressing().unwrap_or(Addressing::Index8);
                if extended || total != expected_len {
                    self.valid = false;
                } else if let Ok((_, address)) = nom_parser::request(addressing, body) {
                    self.address = Some(address);
                }
            }
            IsduVariant::WriteRespM | IsduVariant::ReadRespM => {
                if extended || total != expected_len {
                    self.valid = false;
                } else if let Ok((_, (error_code, additional_code))) = nom_parser::error_codes(body) {
                    let error = IsduError::from_codes(error_code, additional_code).context(
                        UnknownIsduSnafu { error_code, additional_code },
                    )?;
                    self.error = Some(error);
                }
            }
            IsduVariant::WriteRespP => {
                if extended || total != expected_len {
                    self.valid = false;
                }
            }
            IsduVariant::ReadRespP => {
                self.data = self.variant.header_len(extended)..body.len();
            }
        }
        Ok(())
    }
}

impl fmt::Display for Isdu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ISDU {}(", self.variant)?;
        let fields = self.fields();
        for (i, (name, value)) in fields.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}={value}")?;
        }
        f.write_str(")")
    }
}
