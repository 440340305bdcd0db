use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Value stored in `SampleSet::analog_data` for a missing or unreadable sample.
pub const MISSING_ANALOG_VALUE: f64 = 99999.0;

/// Raw binary DAT analog value (0x8000) reserved for "no data".
pub const BINARY_MISSING_CODE: i16 = -32768;

/// Number of digital channels packed into one binary status word.
pub const DIGITAL_CHANNELS_PER_WORD: usize = 16;

/// Represents errors that can occur during parsing
#[derive(Debug, Error)]
pub enum ParseError {
    /// A mandatory field does not follow the COMTRADE layout.
    #[error("{message}")]
    InvalidFormat { message: String },

    /// The DAT encoding is not one this decoder handles.
    #[error("Unsupported DAT file type: {file_type:?}, expected ASCII or BINARY")]
    UnsupportedFormat { file_type: String },

    /// No DAT file sits next to the CFG file.
    #[error("No DAT file found next to {cfg}")]
    MissingDataFile { cfg: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// COMTRADE revision year, taken from the third field of the first CFG line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Revision {
    Rev1991, // IEEE C37.111-1991, no revision field
    Rev1999, // IEEE C37.111-1999
    Rev2013, // IEEE C37.111-2013, adds time code and leap second lines
}

impl Revision {
    /// Unknown or absent revision text is read as 1991.
    pub fn from_field(field: &str) -> Self {
        match field.trim() {
            "1999" => Revision::Rev1999,
            "2013" => Revision::Rev2013,
            _ => Revision::Rev1991,
        }
    }

    /// Number of extra lines this revision appends after the time multiplier.
    pub fn tail_lines(&self) -> usize {
        match self {
            Revision::Rev2013 => 2,
            _ => 0,
        }
    }

    pub fn year(&self) -> &'static str {
        match self {
            Revision::Rev1991 => "1991",
            Revision::Rev1999 => "1999",
            Revision::Rev2013 => "2013",
        }
    }
}

impl Default for Revision {
    fn default() -> Self {
        Revision::Rev1999
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Revision::Rev1991 => write!(f, "IEEE Std C37.111-1991"),
            Revision::Rev1999 => write!(f, "IEEE Std C37.111-1999"),
            Revision::Rev2013 => write!(f, "IEEE Std C37.111-2013"),
        }
    }
}

/// DAT encodings the data parser understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileType {
    Ascii,
    Binary,
}

impl FileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Ascii => "ASCII",
            FileType::Binary => "BINARY",
        }
    }
}

impl FromStr for FileType {
    type Err = ParseError;

    // Case-insensitive. BINARY32 and FLOAT32 are rejected like any other unknown type.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ASCII" => Ok(FileType::Ascii),
            "BINARY" => Ok(FileType::Binary),
            _ => Err(ParseError::UnsupportedFormat {
                file_type: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Display unit picked by the caller. Parsed sample times are never rescaled by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Seconds,
    Milliseconds,
    #[default]
    Microseconds,
}

impl TimeUnit {
    pub fn from_microseconds(&self, value: f64) -> f64 {
        match self {
            TimeUnit::Seconds => value / 1_000_000.0,
            TimeUnit::Milliseconds => value / 1_000.0,
            TimeUnit::Microseconds => value,
        }
    }

    pub fn suffix(&self) -> &'static str {
        match self {
            TimeUnit::Seconds => "s",
            TimeUnit::Milliseconds => "ms",
            TimeUnit::Microseconds => "us",
        }
    }
}

impl FromStr for TimeUnit {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "seconds" | "s" => Ok(TimeUnit::Seconds),
            "milliseconds" | "ms" => Ok(TimeUnit::Milliseconds),
            "microseconds" | "us" => Ok(TimeUnit::Microseconds),
            other => Err(ParseError::InvalidFormat {
                message: format!("Unknown time unit: {}", other),
            }),
        }
    }
}

/// Number of 16-bit status words holding `digital_count` channels.
pub fn digital_word_count(digital_count: usize) -> usize {
    digital_count.div_ceil(DIGITAL_CHANNELS_PER_WORD)
}
