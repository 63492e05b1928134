//! Semantic transactions produced by the message interpreter.

use core::fmt;

use crate::event_memory::EventMemory;
use crate::isdu::Isdu;
use crate::types::TransmissionDirection;
use crate::Timestamp;

/// Ordered presentation fields: name and display value.
pub type Fields = Vec<(&'static str, String)>;

/// Which side sent a frame.
#[derive(PartialEq, Eq, Debug, Copy, Clone, Hash)]
pub enum Source {
    Master,
    Device,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Master => f.write_str("Master"),
            Self::Device => f.write_str("Device"),
        }
    }
}

/// One half of a cycle on the process channel.
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct ProcessTransaction {
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    pub source: Source,
    pub direction: TransmissionDirection,
}

/// Single octet access to direct parameter page 1.
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct PageTransaction {
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    pub direction: TransmissionDirection,
    pub index: u8,
    pub value: u8,
}

/// A complete read of the event memory.
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct EventMemoryTransaction {
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    pub event_memory: EventMemory,
}

/// Reset of the event flag, acknowledging the event memory.
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct EventResetTransaction {
    pub start_time: Timestamp,
    pub end_time: Timestamp,
}

/// A complete ISDU request or response.
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct IsduTransaction {
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    pub isdu: Isdu,
}

#[derive(PartialEq, Eq, Debug, Clone)]
pub enum Transaction {
    Process(ProcessTransaction),
    Page(PageTransaction),
    DiagEventMemory(EventMemoryTransaction),
    DiagEventReset(EventResetTransaction),
    Isdu(IsduTransaction),
}

impl Transaction {
    pub const fn start_time(&self) -> Timestamp {
        match self {
            Self::Process(t) => t.start_time,
            Self::Page(t) => t.start_time,
            Self::DiagEventMemory(t) => t.start_time,
            Self::DiagEventReset(t) => t.start_time,
            Self::Isdu(t) => t.start_time,
        }
    }

    pub const fn end_time(&self) -> Timestamp {
        match self {
            Self::Process(t) => t.end_time,
            Self::Page(t) => t.end_time,
            Self::DiagEventMemory(t) => t.end_time,
            Self::DiagEventReset(t) => t.end_time,
            Self::Isdu(t) => t.end_time,
        }
    }

    /// Short label, e.g. for a protocol analyzer row.
    pub fn name(&self) -> String {
        match self {
            Self::Process(t) => format!("Process {}", t.source),
            Self::Page(t) => format!("Page {}", t.direction),
            Self::DiagEventMemory(_) => "Diag EventMem".into(),
            Self::DiagEventReset(_) => "Diag Reset".into(),
            Self::Isdu(t) => format!("ISDU {}", t.isdu.variant()),
        }
    }

    /// Presentation fields in display order.
    pub fn fields(&self) -> Fields {
        match self {
            Self::Process(t) => vec![
                ("processDir", t.direction.to_string()),
                ("processSource", t.source.to_string()),
            ],
            Self::Page(t) => vec![
                ("pageDir", t.direction.to_string()),
                ("pageIndex", t.index.to_string()),
                ("pageValue", format!("0x{:02X}", t.value)),
            ],
            Self::DiagEventMemory(t) => {
                let status = t.event_memory.status_code();
                let mut fields = vec![("evtStatus", format!("{status:?}"))];
                fields.extend(
                    t.event_memory
                        .active_events()
                        .map(|(slot, event)| (EVENT_FIELDS[slot - 1], event.to_string())),
                );
                fields
            }
            Self::DiagEventReset(_) => Vec::new(),
            Self::Isdu(t) => t.isdu.fields(),
        }
    }
}

const EVENT_FIELDS: [&str; 6] = ["evt1", "evt2", "evt3", "evt4", "evt5", "evt6"];

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())?;
        for (i, (name, value)) in self.fields().iter().enumerate() {
            f.write_str(if i == 0 { ": " } else { ", " })?;
            write!(f, "{name}={value}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_page_fields() {
        let t0 = Utc.with_ymd_and_hms(2050, 1, 1, 0, 0, 0).unwrap();
        let transaction = Transaction::Page(PageTransaction {
            start_time: t0,
            end_time: t0,
            direction: TransmissionDirection::Write,
            index: 0,
            value: 0x9A,
        });
        assert_eq!(transaction.name(), "Page Write");
        assert_eq!(
            transaction.fields(),
            vec![
                ("pageDir", "Write".to_string()),
                ("pageIndex", "0".to_string()),
                ("pageValue", "0x9A".to_string()),
            ]
        );
        assert_eq!(
            transaction.to_string(),
            "Page Write: pageDir=Write, pageIndex=0, pageValue=0x9A"
        );
    }

    #[test]
    fn test_event_memory_fields() {
        let t0 = Utc.with_ymd_and_hms(2050, 1, 1, 0, 0, 0).unwrap();
        let mut event_memory = EventMemory::new();
        event_memory.set_memory(0, 0b1000_0010).unwrap();
        event_memory.set_memory(4, 0b1110_0100).unwrap();
        event_memory.set_memory(5, 0x18).unwrap();
        event_memory.set_memory(6, 0x00).unwrap();

        let transaction = Transaction::DiagEventMemory(EventMemoryTransaction {
            start_time: t0,
            end_time: t0,
            event_memory,
        });
        let fields = transaction.fields();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].0, "evtStatus");
        assert_eq!(fields[1], ("evt2", "WarningAppear(6144)".to_string()));
    }
}
