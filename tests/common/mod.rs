#![allow(dead_code)]

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration, TimeZone, Utc};
use iolink_proto::types::{ChecksumStatus, ChecksumType, MasterSequenceControl};
use iolink_proto::{DeviceMessage, MasterMessage, Message, Timestamp};

pub fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// One captured octet: value, start and end of its transmission.
#[derive(Debug, Copy, Clone)]
pub struct CapturedOctet {
    pub value: u8,
    pub start: Timestamp,
    pub end: Timestamp,
}

/// Parse an analyzer export, one octet per line:
/// `value, , start, end, data`. Blank lines are skipped.
pub fn parse_capture(capture: &str) -> Result<Vec<CapturedOctet>> {
    capture
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(parse_line)
        .collect()
}

fn parse_line(line: &str) -> Result<CapturedOctet> {
    let columns: Vec<&str> = line.split(',').map(str::trim).collect();
    let &[value, _, start, end, _] = columns.as_slice() else {
        return Err(anyhow!("malformed capture line {line:?}"));
    };
    Ok(CapturedOctet {
        value: value.parse().with_context(|| format!("octet value {value:?}"))?,
        start: parse_time(start)?,
        end: parse_time(end)?,
    })
}

fn parse_time(s: &str) -> Result<Timestamp> {
    let time = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%:z")
        .with_context(|| format!("timestamp {s:?}"))?;
    Ok(time.with_timezone(&Utc))
}

/// Builds back to back master/device cycles with made up timestamps.
pub struct CycleBuilder {
    time: Timestamp,
}

impl CycleBuilder {
    pub fn new() -> Self {
        Self {
            time: Utc.with_ymd_and_hms(2050, 1, 1, 0, 1, 2).unwrap(),
        }
    }

    fn span(&mut self, micros: i64) -> (Timestamp, Timestamp) {
        let start = self.time;
        self.time = start + Duration::microseconds(micros);
        (start, self.time)
    }

    pub fn master(&mut self, mc: u8, ckt: u8, pd_out: &[u8], od: &[u8]) -> Message {
        let (start, end) = self.span(300);
        MasterMessage::new(
            MasterSequenceControl::from_byte(mc),
            ChecksumType::from_byte(ckt),
            pd_out,
            od,
            start,
            end,
        )
        .unwrap()
        .into()
    }

    pub fn device(&mut self, od: &[u8], pd_in: &[u8], cks: u8) -> Message {
        self.span(100);
        let (start, end) = self.span(300);
        self.span(1300);
        DeviceMessage::new(od, pd_in, ChecksumStatus::from_byte(cks), start, end)
            .unwrap()
            .into()
    }
}
