//! Error codes reported in negative ISDU responses.

use core::fmt;

/// Error code and additional code pair of a negative ISDU response.
#[derive(PartialEq, Eq, Debug, Copy, Clone, Hash)]
pub enum IsduError {
    AppDev,
    IdxNotAvail,
    SubIdxNotAvail,
    ServNotAvail,
    ServNotAvailLocCtrl,
    ServNotAvailDevCtrl,
    IdxNotAccessible,
    ParValOutOfRange,
    ParValGtLim,
    ParValLtLim,
    ValLenOverrun,
    ValLenUnderrun,
    FuncNotAvail,
    FuncUnavailTemp,
    ParSetInvalid,
    ParSetInconsistent,
    AppDevNotReady,
    Unspecific,
    /// Vendor specific additional code, 0x01 to 0xFF.
    VendorSpecific(u8),
}

const DEVICE_APPLICATION_ERROR: u8 = 0x80;
const COMMUNICATION_ERROR: u8 = 0x81;

impl IsduError {
    /// Look up an error code pair. Returns `None` for undefined pairs.
    pub const fn from_codes(error_code: u8, additional_code: u8) -> Option<Self> {
        let error = match (error_code, additional_code) {
            (DEVICE_APPLICATION_ERROR, code) => match code {
                0x00 => Self::AppDev,
                0x11 => Self::IdxNotAvail,
                0x12 => Self::SubIdxNotAvail,
                0x20 => Self::ServNotAvail,
                0x21 => Self::ServNotAvailLocCtrl,
                0x22 => Self::ServNotAvailDevCtrl,
                0x23 => Self::IdxNotAccessible,
                0x30 => Self::ParValOutOfRange,
                0x31 => Self::ParValGtLim,
                0x32 => Self::ParValLtLim,
                0x33 => Self::ValLenOverrun,
                0x34 => Self::ValLenUnderrun,
                0x35 => Self::FuncNotAvail,
                0x36 => Self::FuncUnavailTemp,
                0x40 => Self::ParSetInvalid,
                0x41 => Self::ParSetInconsistent,
                0x82 => Self::AppDevNotReady,
                _ => return None,
            },
            (COMMUNICATION_ERROR, 0x00) => Self::Unspecific,
            (COMMUNICATION_ERROR, code) => Self::VendorSpecific(code),
            _ => return None,
        };
        Some(error)
    }

    /// The (error code, additional code) pair.
    pub const fn codes(self) -> (u8, u8) {
        let additional_code = match self {
            Self::AppDev => 0x00,
            Self::IdxNotAvail => 0x11,
            Self::SubIdxNotAvail => 0x12,
            Self::ServNotAvail => 0x20,
            Self::ServNotAvailLocCtrl => 0x21,
            Self::ServNotAvailDevCtrl => 0x22,
            Self::IdxNotAccessible => 0x23,
            Self::ParValOutOfRange => 0x30,
            Self::ParValGtLim => 0x31,
            Self::ParValLtLim => 0x32,
            Self::ValLenOverrun => 0x33,
            Self::ValLenUnderrun => 0x34,
            Self::FuncNotAvail => 0x35,
            Self::FuncUnavailTemp => 0x36,
            Self::ParSetInvalid => 0x40,
            Self::ParSetInconsistent => 0x41,
            Self::AppDevNotReady => 0x82,
            Self::Unspecific => return (COMMUNICATION_ERROR, 0x00),
            Self::VendorSpecific(code) => return (COMMUNICATION_ERROR, code),
        };
        (DEVICE_APPLICATION_ERROR, additional_code)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::AppDev => "APP_DEV",
            Self::IdxNotAvail => "IDX_NOTAVAIL",
            Self::SubIdxNotAvail => "SUBIDX_NOTAVAIL",
            Self::ServNotAvail => "SERV_NOTAVAIL",
            Self::ServNotAvailLocCtrl => "SERV_NOTAVAIL_LOCCTRL",
            Self::ServNotAvailDevCtrl => "SERV_NOTAVAIL_DEVCTRL",
            Self::IdxNotAccessible => "IDX_NOT_ACCESSIBLE",
            Self::ParValOutOfRange => "PAR_VALOUTOFRNG",
            Self::ParValGtLim => "PAR_VALGTLIM",
            Self::ParValLtLim => "PAR_VALLTLIM",
            Self::ValLenOverrun => "VAL_LENOVRRUN",
            Self::ValLenUnderrun => "VAL_LENUNDRUN",
            Self::FuncNotAvail => "FUNC_NOTAVAIL",
            Self::FuncUnavailTemp => "FUNC_UNAVAILTEMP",
            Self::ParSetInvalid => "PAR_SETINVALID",
            Self::ParSetInconsistent => "PAR_SETINCONSIST",
            Self::AppDevNotReady => "APP_DEVNOTRDY",
            Self::Unspecific => "UNSPECIFIC",
            Self::VendorSpecific(_) => "VENDOR_SPECIFIC",
        }
    }
}

impl fmt::Display for IsduError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (error_code, additional_code) = self.codes();
        write!(f, "{}({error_code:#04x}, {additional_code:#04x})", self.name())
    }
}
