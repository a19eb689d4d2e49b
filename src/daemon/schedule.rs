use std::fmt;

use chrono::{Days, NaiveDateTime, NaiveTime};

use crate::error::{DigestError, Result};

/// A wall-clock time that recurs every day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DailyTime {
    hour: u8,
    minute: u8,
}

impl DailyTime {
    pub fn new(hour: u8, minute: u8) -> Option<Self> {
        (hour < 24 && minute < 60).then_some(Self { hour, minute })
    }

    fn as_naive_time(&self) -> NaiveTime {
        // hour/minute are range-checked on construction
        NaiveTime::from_hms_opt(self.hour.into(), self.minute.into(), 0).unwrap_or_default()
    }

    /// Parse one `HH:MM` token. `24:00` means midnight.
    fn parse_token(token: &str) -> Result<Self> {
        let bad = |reason: &str| DigestError::Format {
            token: token.to_string(),
            reason: reason.to_string(),
        };
        let (h, m) = token.split_once(':').ok_or_else(|| bad("expected HH:MM"))?;
        let hour = parse_number(h).ok_or_else(|| bad("hour is not a number"))?;
        let minute = parse_number(m).ok_or_else(|| bad("minute is not a number"))?;
        if (hour, minute) == (24, 0) {
            return Ok(Self { hour: 0, minute: 0 });
        }
        let hour = u8::try_from(hour)
            .ok()
            .filter(|h| *h < 24)
            .ok_or_else(|| bad("hour out of range"))?;
        let minute = u8::try_from(minute).map_err(|_| bad("minute out of range"))?;
        Self::new(hour, minute).ok_or_else(|| bad("minute out of range"))
    }
}

fn parse_number(s: &str) -> Option<u32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

impl fmt::Display for DailyTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// Non-empty, ascending, duplicate-free set of daily send times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    times: Vec<DailyTime>,
}

impl Schedule {
    pub fn new(mut times: Vec<DailyTime>) -> Result<Self> {
        times.sort_unstable();
        times.dedup();
        if times.is_empty() {
            return Err(DigestError::config(
                "send times must contain at least one HH:MM entry",
            ));
        }
        Ok(Self { times })
    }

    /// Parse a comma separated list such as `"06:00, 18:30"`.
    /// Blank entries are ignored.
    pub fn parse(spec: &str) -> Result<Self> {
        let times = spec
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(DailyTime::parse_token)
            .collect::<Result<Vec<_>>>()?;
        Self::new(times)
    }

    pub fn times(&self) -> &[DailyTime] {
        &self.times
    }

    /// Earliest scheduled instant strictly after `now`.
    pub fn next_run(&self, now: NaiveDateTime) -> NaiveDateTime {
        self.times
            .iter()
            .map(|t| {
                let candidate = now.date().and_time(t.as_naive_time());
                if candidate <= now {
                    candidate
                        .checked_add_days(Days::new(1))
                        .unwrap_or(NaiveDateTime::MAX)
                } else {
                    candidate
                }
            })
            .min()
            .unwrap_or(NaiveDateTime::MAX)
    }

    /// The next `count` wake times after `now`, in order.
    pub fn upcoming(&self, now: NaiveDateTime, count: usize) -> Vec<NaiveDateTime> {
        let mut out = Vec::with_capacity(count);
        let mut cursor = now;
        for _ in 0..count {
            cursor = self.next_run(cursor);
            out.push(cursor);
        }
        out
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, t) in self.times.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{t}")?;
        }
        Ok(())
    }
}
