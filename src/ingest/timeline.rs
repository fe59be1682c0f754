// src/ingest/timeline.rs
//! Date/Time column formatting for the timeline store.
//!
//! All comparisons in the pipeline happen in UTC. The clock only decides how a
//! UTC instant is *displayed* in the Date (`DD/MM/YYYY`) and Time (`HH:MM`)
//! columns, and how those columns are read back when building a snapshot.
//! Because the store keeps minute precision, timestamps read back from it are
//! truncated to the minute.

use anyhow::{anyhow, Result};
use chrono::{
    DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone, Utc,
};

pub const DATE_FORMAT: &str = "%d/%m/%Y";
pub const TIME_FORMAT: &str = "%H:%M";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimelineClock {
    offset: FixedOffset,
}

impl Default for TimelineClock {
    fn default() -> Self {
        Self::utc()
    }
}

impl TimelineClock {
    pub fn utc() -> Self {
        Self { offset: Utc.fix() }
    }

    pub fn with_offset_minutes(minutes: i32) -> Result<Self> {
        let offset = FixedOffset::east_opt(minutes * 60)
            .ok_or_else(|| anyhow!("invalid UTC offset: {minutes} minutes"))?;
        Ok(Self { offset })
    }

    pub fn date(&self, ts: DateTime<Utc>) -> String {
        ts.with_timezone(&self.offset).format(DATE_FORMAT).to_string()
    }

    pub fn time(&self, ts: DateTime<Utc>) -> String {
        ts.with_timezone(&self.offset).format(TIME_FORMAT).to_string()
    }

    /// Composite "Source, DD/MM/YYYY HH:MM" label.
    pub fn label(&self, source: &str, ts: DateTime<Utc>) -> String {
        format!("{}, {} {}", source, self.date(ts), self.time(ts))
    }

    /// Parse Date/Time cells back into UTC. Accepts `HH:MM` and `HH:MM:SS`
    /// (spreadsheets sometimes render times with seconds).
    pub fn parse(&self, date: &str, time: &str) -> Option<DateTime<Utc>> {
        let d = NaiveDate::parse_from_str(date.trim(), DATE_FORMAT).ok()?;
        let time = time.trim();
        let t = NaiveTime::parse_from_str(time, TIME_FORMAT)
            .or_else(|_| NaiveTime::parse_from_str(time, "%H:%M:%S"))
            .ok()?;
        self.offset
            .from_local_datetime(&NaiveDateTime::new(d, t))
            .single()
            .map(|dt| dt.with_timezone(&Utc))
    }
}
