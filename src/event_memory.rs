//! The device event memory, as read through the diagnosis channel.
//!
//! Address 0 holds a StatusCode type 2 octet flagging which of the six event
//! slots are in use. Addresses 1 to 0x12 hold the slots, three octets each:
//! the event qualifier followed by the 16 bit event code, MSB first.

use core::fmt;

use snafu::ensure;

use crate::error::{Error, InvalidEventMemoryAddressSnafu, InvalidEventStatusCodeSnafu};
use crate::types::{EventQualifier, StatusCodeType2};

/// Number of event slots.
pub const EVENT_SLOTS: usize = 6;
/// Highest valid event memory address.
pub const MAX_ADDRESS: u8 = 0x12;

const BYTES_PER_EVENT: u8 = 3;

macro_rules! qualifier_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident { $($variant:ident = $value:literal,)* }
        fallback $fallback:ident
    ) => {
        $(#[$meta])*
        #[derive(PartialEq, Eq, Debug, Copy, Clone, Hash)]
        pub enum $name {
            $($variant,)*
        }

        impl $name {
            /// Decode a qualifier field. Reserved values map to
            #[doc = concat!("`", stringify!($fallback), "`.")]
            pub const fn from_bits(bits: u8) -> Self {
                match bits {
                    $($value => Self::$variant,)*
                    _ => Self::$fallback,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self {
                    $(Self::$variant => f.write_str(stringify!($variant)),)*
                }
            }
        }
    };
}

qualifier_enum! {
    /// TYPE field of an event qualifier.
    pub enum EventType {
        Reserved = 0,
        Notification = 1,
        Warning = 2,
        Error = 3,
    }
    fallback Reserved
}

qualifier_enum! {
    /// MODE field of an event qualifier.
    pub enum EventMode {
        Reserved = 0,
        SingleShot = 1,
        Disappear = 2,
        Appear = 3,
    }
    fallback Reserved
}

qualifier_enum! {
    /// SOURCE field of an event qualifier.
    pub enum EventSource {
        Device = 0,
        Master = 1,
    }
    fallback Device
}

qualifier_enum! {
    /// INSTANCE field of an event qualifier.
    pub enum EventInstance {
        Unknown = 0,
        Application = 4,
        System = 5,
    }
    fallback Unknown
}

impl EventQualifier {
    pub const fn kind(self) -> EventType {
        EventType::from_bits(self.event_type())
    }

    pub const fn event_mode(self) -> EventMode {
        EventMode::from_bits(self.mode())
    }

    pub const fn event_source(self) -> EventSource {
        EventSource::from_bits(self.source())
    }

    pub const fn event_instance(self) -> EventInstance {
        EventInstance::from_bits(self.instance())
    }
}

const QUALIFIER: u8 = 0b001;
const CODE_MSB: u8 = 0b010;
const CODE_LSB: u8 = 0b100;

/// One event slot.
#[derive(PartialEq, Eq, Debug, Copy, Clone, Default, Hash)]
pub struct Event {
    qualifier: EventQualifier,
    code: u16,
    /// Which of the three octets have been written.
    written: u8,
}

impl Event {
    pub const fn qualifier(&self) -> EventQualifier {
        self.qualifier
    }

    pub const fn code(&self) -> u16 {
        self.code
    }

    pub fn set_qualifier(&mut self, qualifier: EventQualifier) {
        self.qualifier = qualifier;
        self.written |= QUALIFIER;
    }

    pub fn set_code(&mut self, code: u16) {
        self.code = code;
        self.written |= CODE_MSB | CODE_LSB;
    }

    pub fn set_code_msb(&mut self, msb: u8) {
        self.code = (self.code & 0x00FF) | (u16::from(msb) << 8);
        self.written |= CODE_MSB;
    }

    pub fn set_code_lsb(&mut self, lsb: u8) {
        self.code = (self.code & 0xFF00) | u16::from(lsb);
        self.written |= CODE_LSB;
    }

    /// Whether qualifier and both code octets have been written.
    pub const fn is_complete(&self) -> bool {
        self.written == QUALIFIER | CODE_MSB | CODE_LSB
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}({})",
            self.qualifier.kind(),
            self.qualifier.event_mode(),
            self.code
        )
    }
}

/// Snapshot of the device event memory.
#[derive(PartialEq, Eq, Debug, Clone, Default, Hash)]
pub struct EventMemory {
    status_code: StatusCodeType2,
    events: [Event; EVENT_SLOTS],
}

impl EventMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn status_code(&self) -> StatusCodeType2 {
        self.status_code
    }

    pub const fn events(&self) -> &[Event; EVENT_SLOTS] {
        &self.events
    }

    /// Slots flagged by the status code, numbered from 1.
    pub fn active_events(&self) -> impl Iterator<Item = (usize, &Event)> + '_ {
        let status = self.status_code;
        self.events
            .iter()
            .enumerate()
            .filter(move |(slot, _)| status.is_event_active(*slot))
            .map(|(slot, event)| (slot + 1, event))
    }

    /// Store one octet read from `address`.
    /// # Errors
    /// - [`Error::InvalidEventMemoryAddress`] if `address` is beyond 0x12.
    /// - [`Error::InvalidEventStatusCode`] if the status octet at address 0
    ///   has no details bit.
    pub fn set_memory(&mut self, address: u8, value: u8) -> Result<(), Error> {
        ensure!(address <= MAX_ADDRESS, InvalidEventMemoryAddressSnafu { address });

        if address == 0 {
            let status_code = StatusCodeType2::from_byte(value);
            ensure!(status_code.details() == 1, InvalidEventStatusCodeSnafu { value });
            self.status_code = status_code;
            return Ok(());
        }

        let offset = address - 1;
        let event = &mut self.events[usize::from(offset / BYTES_PER_EVENT)];
        match offset % BYTES_PER_EVENT {
            0 => event.set_qualifier(EventQualifier::from_byte(value)),
            1 => event.set_code_msb(value),
            _ => event.set_code_lsb(value),
        }
        Ok(())
    }

    /// Whether the status code and every event it flags have been read.
    pub fn is_complete(&self) -> bool {
        self.status_code.details() == 1
            && self
                .events
                .iter()
                .enumerate()
                .all(|(slot, event)| !self.status_code.is_event_active(slot) || event.is_complete())
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event() {
        let mut event = Event::default();
        assert!(!event.is_complete());
        event.set_qualifier(EventQualifier::from_byte(0b1111_0100));
        event.set_code_lsb(0x34);
        assert!(!event.is_complete());
        event.set_code_msb(0x12);
        assert!(event.is_complete());
        assert_eq!(event.code(), 0x1234);
        assert_eq!(event.qualifier().kind(), EventType::Error);
        assert_eq!(event.qualifier().event_mode(), EventMode::Appear);
        assert_eq!(event.qualifier().event_source(), EventSource::Device);
        assert_eq!(event.qualifier().event_instance(), EventInstance::Application);
        assert_eq!(event.to_string(), "ErrorAppear(4660)");

        event.clear();
        assert_eq!(event, Event::default());
        event.set_code(0x8C10);
        assert_eq!(event.code(), 0x8C10);
        assert!(!event.is_complete());
    }

    #[test]
    fn test_reserved_fields() {
        assert_eq!(EventInstance::from_bits(7), EventInstance::Unknown);
        assert_eq!(EventInstance::from_bits(5), EventInstance::System);
        assert_eq!(EventSource::from_bits(1), EventSource::Master);
    }

    #[test]
    fn test_memory_completion() {
        let mut memory = EventMemory::new();
        assert!(!memory.is_complete());

        // events 1 and 3 pending
        memory.set_memory(0, 0b1000_0101).unwrap();
        assert!(!memory.is_complete());
        for (address, value) in [(1, 0xE4), (2, 0x18), (3, 0x00)] {
            memory.set_memory(address, value).unwrap();
        }
        assert!(!memory.is_complete());
        for (address, value) in [(7, 0x54), (8, 0xFF), (9, 0x80)] {
            memory.set_memory(address, value).unwrap();
        }
        assert!(memory.is_complete());

        let active: Vec<_> = memory.active_events().map(|(slot, e)| (slot, e.code())).collect();
        assert_eq!(active, vec![(1, 0x1800), (3, 0xFF80)]);

        memory.clear();
        assert_eq!(memory, EventMemory::default());
    }

    #[test]
    fn test_memory_without_events() {
        let mut memory = EventMemory::new();
        memory.set_memory(0, 0x80).unwrap();
        assert!(memory.is_complete());
    }

    #[test]
    fn test_memory_errors() {
        let mut memory = EventMemory::new();
        assert_eq!(
            memory.set_memory(0x13, 0),
            Err(Error::InvalidEventMemoryAddress { address: 0x13 })
        );
        assert_eq!(
            memory.set_memory(0, 0x01),
            Err(Error::InvalidEventStatusCode { value: 0x01 })
        );
        assert!(memory.set_memory(0x12, 0xAA).is_ok());
        assert_eq!(memory.events()[5].code(), 0x00AA);
    }
}
