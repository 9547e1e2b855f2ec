use std::fmt::Display;
use std::str::FromStr;

use chrono::{DateTime, Local, TimeZone, Utc};

/// How marker timestamps are shown in the popup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeDisplay {
    /// "today at 3:04 PM", "last Monday at 9:15 AM", ...
    #[default]
    Relative,
    /// "2024-05-01 12:00"
    Absolute,
}

impl FromStr for TimeDisplay {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "relative" => Ok(TimeDisplay::Relative),
            "absolute" => Ok(TimeDisplay::Absolute),
            other => Err(format!("unknown time display {other:?}")),
        }
    }
}

impl TimeDisplay {
    /// Render a marker time in the local timezone
    pub fn format(self, time: DateTime<Utc>, now: DateTime<Utc>) -> String {
        let time = time.with_timezone(&Local);
        match self {
            TimeDisplay::Relative => format_relative(&time, &now.with_timezone(&Local)),
            TimeDisplay::Absolute => time.format("%Y-%m-%d %H:%M").to_string(),
        }
    }
}

/// Describe `time` relative to `now` by calendar day
pub fn format_relative<Tz: TimeZone>(time: &DateTime<Tz>, now: &DateTime<Tz>) -> String
where
    Tz::Offset: Display,
{
    let days = (time.date_naive() - now.date_naive()).num_days();
    let clock = time.format("%-I:%M %p");
    match days {
        d if d < -6 || d >= 7 => time.format("%m/%d/%Y").to_string(),
        -6..=-2 => format!("last {} at {clock}", time.format("%A")),
        -1 => format!("yesterday at {clock}"),
        0 => format!("today at {clock}"),
        1 => format!("tomorrow at {clock}"),
        _ => format!("{} at {clock}", time.format("%A")),
    }
}
