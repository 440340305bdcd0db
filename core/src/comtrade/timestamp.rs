// Start and trigger time lines of a CFG file: `dd/mm/yyyy,hh:mm:ss.ssssss`.

use super::common::ParseError;
use chrono::{NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

const MICROS_PER_SECOND: u64 = 1_000_000;
pub const MICROS_PER_DAY: u64 = 86_400 * MICROS_PER_SECOND;

// Fraction digits kept from the seconds field (microsecond resolution).
const FRACTION_DIGITS: usize = 6;

// ASCII digits only; `\d` would also accept other Unicode decimal digits.
const TIME_LINE_PATTERN: &str =
    r"^[0-9]{1,2}/[0-9]{1,2}/[0-9]{2,4},\s*[0-9]{1,2}:[0-9]{1,2}:[0-9]{1,2}(\.[0-9]{0,12})?$";

static TIME_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(TIME_LINE_PATTERN).expect("time line pattern is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timestamp {
    /// Time of day in microseconds, 0..=86_399_999_999 for well-formed lines.
    pub total_microseconds: u64,
    pub day: u32,
    pub month: u32,
    /// Year as written in the file, two or four digits.
    pub year: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
    pub microsecond: u32,
}

impl Timestamp {
    pub fn is_valid_line(line: &str) -> bool {
        TIME_LINE.is_match(line.trim())
    }

    pub fn from_line(line: &str) -> Result<Self, ParseError> {
        let line = line.trim();
        if !TIME_LINE.is_match(line) {
            return Err(ParseError::InvalidFormat {
                message: format!("Invalid date-time line: {:?}", line),
            });
        }

        // The pattern guarantees one comma, two slashes and two colons.
        let (date, time) = line.split_once(',').unwrap_or((line, ""));
        let mut date_parts = date.split('/').map(number);
        let day = date_parts.next().unwrap_or(0);
        let month = date_parts.next().unwrap_or(0);
        let year = date_parts.next().unwrap_or(0);

        let (hms, fraction) = time.trim().split_once('.').unwrap_or((time.trim(), ""));
        let mut time_parts = hms.split(':').map(number);
        let hour = time_parts.next().unwrap_or(0);
        let minute = time_parts.next().unwrap_or(0);
        let second = time_parts.next().unwrap_or(0);
        let microsecond = fraction_to_micros(fraction);

        Ok(Timestamp {
            total_microseconds: Self::time_of_day_micros(hour, minute, second, microsecond),
            day,
            month,
            year,
            hour,
            minute,
            second,
            microsecond,
        })
    }

    pub fn to_line(&self) -> String {
        format!(
            "{:02}/{:02}/{:04},{:02}:{:02}:{:02}.{:06}",
            self.day, self.month, self.year, self.hour, self.minute, self.second, self.microsecond
        )
    }

    pub fn time_of_day_micros(hour: u32, minute: u32, second: u32, microsecond: u32) -> u64 {
        ((hour as u64 * 60 + minute as u64) * 60 + second as u64) * MICROS_PER_SECOND
            + microsecond as u64
    }

    /// Calendar date and time, or `None` when the fields do not form a real date.
    /// Two-digit years are placed in 1970..=2069.
    pub fn to_naive_datetime(&self) -> Option<NaiveDateTime> {
        let year = match self.year {
            0..=69 => 2000 + self.year,
            70..=99 => 1900 + self.year,
            _ => self.year,
        };
        NaiveDate::from_ymd_opt(year as i32, self.month, self.day)?.and_hms_micro_opt(
            self.hour,
            self.minute,
            self.second,
            self.microsecond,
        )
    }
}

fn number(text: &str) -> u32 {
    text.trim().parse::<u32>().unwrap_or(0)
}

// Right-pads with zeros to six digits; longer fractions are truncated.
fn fraction_to_micros(fraction: &str) -> u32 {
    let mut digits: String = fraction.chars().take(FRACTION_DIGITS).collect();
    while digits.len() < FRACTION_DIGITS {
        digits.push('0');
    }
    digits.parse::<u32>().unwrap_or(0)
}
