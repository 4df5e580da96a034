//! Central European time for 2026 only: CET, CEST from 2026-03-29 01:00 UTC
//! until 2026-10-25 01:00 UTC.

use chrono::{
    DateTime, Duration, FixedOffset, LocalResult, NaiveDate, NaiveDateTime, TimeZone,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CentralEurope;

fn cet() -> FixedOffset {
    FixedOffset::east_opt(3600).unwrap()
}

fn cest() -> FixedOffset {
    FixedOffset::east_opt(2 * 3600).unwrap()
}

fn utc(month: u32, day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, month, day)
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
}

/// Local wall-clock instant.
pub fn berlin(month: u32, day: u32, hour: u32, minute: u32) -> DateTime<CentralEurope> {
    CentralEurope
        .with_ymd_and_hms(2026, month, day, hour, minute, 0)
        .earliest()
        .unwrap()
}

impl TimeZone for CentralEurope {
    type Offset = FixedOffset;

    fn from_offset(_: &FixedOffset) -> Self {
        CentralEurope
    }

    fn offset_from_utc_datetime(&self, utc_time: &NaiveDateTime) -> FixedOffset {
        if *utc_time >= utc(3, 29, 1) && *utc_time < utc(10, 25, 1) {
            cest()
        } else {
            cet()
        }
    }

    fn offset_from_utc_date(&self, utc_date: &NaiveDate) -> FixedOffset {
        self.offset_from_utc_datetime(&utc_date.and_hms_opt(0, 0, 0).unwrap())
    }

    fn offset_from_local_datetime(&self, local: &NaiveDateTime) -> LocalResult<FixedOffset> {
        // earliest instant first
        let fits: Vec<FixedOffset> = [cest(), cet()]
            .into_iter()
            .filter(|off| {
                let instant = *local - Duration::seconds(i64::from(off.local_minus_utc()));
                self.offset_from_utc_datetime(&instant) == *off
            })
            .collect();
        match fits[..] {
            [] => LocalResult::None,
            [one] => LocalResult::Single(one),
            [earliest, latest, ..] => LocalResult::Ambiguous(earliest, latest),
        }
    }

    fn offset_from_local_date(&self, local: &NaiveDate) -> LocalResult<FixedOffset> {
        self.offset_from_local_datetime(&local.and_hms_opt(0, 0, 0).unwrap())
    }
}
