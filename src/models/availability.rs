use chrono::{Datelike, NaiveDateTime, NaiveTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};

/// One open interval of the weekly template as stored on the profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSlot {
    pub day: String,
    pub start: String,
    pub end: String,
}

#[derive(Debug, Deserialize)]
struct RawAvailability {
    slots: Vec<TimeSlot>,
}

const MINUTES_PER_DAY: u32 = 24 * 60;

/// Bounds are minutes from local midnight; `end` may be 1440 (`24:00`).
#[derive(Debug, Clone, PartialEq, Eq)]
struct OpenWindow {
    day: Weekday,
    start: u32,
    end: u32,
}

/// A professional's weekly recurring open hours, in their local time.
#[derive(Debug, Clone, Default)]
pub struct Availability {
    windows: Vec<OpenWindow>,
}

impl Availability {
    pub fn from_json(s: &str) -> anyhow::Result<Self> {
        let raw: RawAvailability = serde_json::from_str(s)?;
        let mut windows = raw
            .slots
            .iter()
            .map(|slot| {
                let window = OpenWindow {
                    day: parse_weekday(&slot.day)?,
                    start: parse_time(&slot.start)?,
                    end: parse_time(&slot.end)?,
                };
                anyhow::ensure!(
                    window.start < window.end,
                    "empty window: {} {}-{}",
                    slot.day,
                    slot.start,
                    slot.end
                );
                Ok(window)
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        windows.sort_by_key(|w| (w.day.num_days_from_monday(), w.start));
        Ok(Self { windows })
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// True when `[start, end)` sits inside a single window of `start`'s
    /// weekday. Both bounds are local times. An end of exactly midnight the
    /// next day counts as end of day; any other midnight crossing never fits.
    pub fn contains(&self, start: &NaiveDateTime, end: &NaiveDateTime) -> bool {
        if end <= start {
            return false;
        }

        let end_minute = if end.date() == start.date() {
            minute_of_day(end.time())
        } else if Some(end.date()) == start.date().succ_opt() && end.time() == NaiveTime::MIN {
            MINUTES_PER_DAY
        } else {
            return false;
        };
        let start_minute = minute_of_day(start.time());

        let day = start.weekday();
        self.windows
            .iter()
            .any(|w| w.day == day && w.start <= start_minute && end_minute <= w.end)
    }

    pub fn to_human_readable(&self) -> String {
        self.windows
            .iter()
            .map(|w| {
                format!(
                    "{}: {}-{}",
                    w.day,
                    format_minute(w.start),
                    format_minute(w.end)
                )
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn parse_weekday(s: &str) -> anyhow::Result<Weekday> {
    match s.to_lowercase().as_str() {
        "mon" => Ok(Weekday::Mon),
        "tue" => Ok(Weekday::Tue),
        "wed" => Ok(Weekday::Wed),
        "thu" => Ok(Weekday::Thu),
        "fri" => Ok(Weekday::Fri),
        "sat" => Ok(Weekday::Sat),
        "sun" => Ok(Weekday::Sun),
        _ => Err(anyhow::anyhow!("invalid weekday: {s}")),
    }
}

/// `HH:MM` to minutes from midnight. `24:00` is accepted as end of day.
fn parse_time(s: &str) -> anyhow::Result<u32> {
    if s == "24:00" {
        return Ok(MINUTES_PER_DAY);
    }
    NaiveTime::parse_from_str(s, "%H:%M")
        .map(minute_of_day)
        .map_err(|_| anyhow::anyhow!("invalid time: {s}"))
}

fn minute_of_day(t: NaiveTime) -> u32 {
    t.hour() * 60 + t.minute()
}

fn format_minute(m: u32) -> String {
    format!("{:02}:{:02}", m / 60, m % 60)
}
