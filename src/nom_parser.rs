//! Parsers for the fixed headers of a complete ISDU.
//!
//! All parsers work on complete input: the caller hands over the ISDU
//! without its trailing check octet.

use nom::combinator::{cond, map};
use nom::number::complete::{be_u16, be_u8};
use nom::sequence::tuple;
use nom::IResult;

use crate::types::IService;

type Buf = [u8];

/// How a request addresses its parameter.
#[derive(PartialEq, Eq, Debug, Copy, Clone, Hash)]
pub enum Addressing {
    /// 8 bit index
    Index8,
    /// 8 bit index and subindex
    Index8Sub,
    /// 16 bit index and subindex
    Index16Sub,
}

impl Addressing {
    /// Octets occupied by index and subindex.
    pub const fn len(self) -> usize {
        match self {
            Self::Index8 => 1,
            Self::Index8Sub => 2,
            Self::Index16Sub => 3,
        }
    }
}

/// Index and optional subindex of a request.
#[derive(PartialEq, Eq, Debug, Copy, Clone, Hash)]
pub struct ParameterAddress {
    pub index: u16,
    pub sub_index: Option<u8>,
}

/// I-Service octet, followed by the total length if the length nibble says so.
pub(crate) fn i_service(buf: &Buf) -> IResult<&Buf, (IService, Option<u8>)> {
    let (buf, service) = map(be_u8, IService::from_byte)(buf)?;
    let (buf, total) = cond(service.has_extended_length(), be_u8)(buf)?;
    Ok((buf, (service, total)))
}

pub(crate) fn parameter_address(addressing: Addressing, buf: &Buf) -> IResult<&Buf, ParameterAddress> {
    match addressing {
        Addressing::Index8 => map(be_u8, |index| ParameterAddress {
            index: index.into(),
            sub_index: None,
        })(buf),
        Addressing::Index8Sub => map(tuple((be_u8, be_u8)), |(index, sub)| ParameterAddress {
            index: index.into(),
            sub_index: Some(sub),
        })(buf),
        Addressing::Index16Sub => map(tuple((be_u16, be_u8)), |(index, sub)| ParameterAddress {
            index,
            sub_index: Some(sub),
        })(buf),
    }
}

/// ISDU header followed by a parameter address. Returns the address and the
/// remaining payload.
pub(crate) fn request(addressing: Addressing, buf: &Buf) -> IResult<&Buf, ParameterAddress> {
    let (buf, _) = i_service(buf)?;
    parameter_address(addressing, buf)
}

/// Error code and additional code of a negative response.
pub(crate) fn error_codes(buf: &Buf) -> IResult<&Buf, (u8, u8)> {
    let (buf, _) = i_service(buf)?;
    tuple((be_u8, be_u8))(buf)
}
