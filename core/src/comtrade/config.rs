// COMTRADE configuration (CFG) file
use super::common::{digital_word_count, ParseError, Revision, TimeUnit};
use super::timestamp::{Timestamp, MICROS_PER_DAY};
use super::utils::{
    cell, is_blank_row, optional_cell, parse_count, parse_float, parse_int, split_cells,
    split_lines,
};
use serde::{Deserialize, Serialize};

const ANALOG_FIELDS: usize = 13;
const DIGITAL_FIELDS: usize = 5;
const LINE_BREAK: &str = "\r\n";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PrimarySecondary {
    pub primary: f64,
    pub secondary: f64,
}

/// One analog channel row: `An,ch_id,ph,ccbm,uu,a,b,skew,min,max,primary,secondary,PS`.
///
/// Numeric fields hold `NaN` when the row text is not numeric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalogChannelDef {
    pub index: usize,
    pub id: String,
    pub phase: String,
    pub component: String,
    pub unit: String,
    pub multiplier: f64,
    pub offset: f64,
    pub skew: f64,
    pub min: f64,
    pub max: f64,
    pub primary_secondary: PrimarySecondary,
    /// `P` or `S`: whether `multiplier`/`offset` yield primary or secondary values.
    pub reference: String,
}

impl AnalogChannelDef {
    pub fn from_row(row: &[&str]) -> Self {
        AnalogChannelDef {
            index: parse_count(cell(row, 0)),
            id: cell(row, 1).to_string(),
            phase: cell(row, 2).to_string(),
            component: cell(row, 3).to_string(),
            unit: cell(row, 4).to_string(),
            multiplier: parse_float(cell(row, 5)),
            offset: parse_float(cell(row, 6)),
            skew: parse_float(cell(row, 7)),
            min: parse_float(cell(row, 8)),
            max: parse_float(cell(row, 9)),
            primary_secondary: PrimarySecondary {
                primary: parse_float(cell(row, 10)),
                secondary: parse_float(cell(row, 11)),
            },
            reference: cell(row, 12).to_string(),
        }
    }

    pub fn to_row(&self) -> String {
        let fields: [String; ANALOG_FIELDS] = [
            self.index.to_string(),
            self.id.clone(),
            self.phase.clone(),
            self.component.clone(),
            self.unit.clone(),
            self.multiplier.to_string(),
            self.offset.to_string(),
            self.skew.to_string(),
            self.min.to_string(),
            self.max.to_string(),
            self.primary_secondary.primary.to_string(),
            self.primary_secondary.secondary.to_string(),
            self.reference.clone(),
        ];
        fields.join(",")
    }

    /// Converts a raw DAT value to engineering units: `raw * a + b`.
    pub fn scale(&self, raw: f64) -> f64 {
        raw * self.multiplier + self.offset
    }

    pub fn is_primary(&self) -> bool {
        self.reference.eq_ignore_ascii_case("P")
    }
}

/// One digital channel row: `Dn,ch_id,ph,ccbm,y`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DigitalChannelDef {
    pub index: usize,
    pub id: String,
    pub phase: String,
    pub component: String,
    pub normal_state: bool,
}

impl DigitalChannelDef {
    pub fn from_row(row: &[&str]) -> Self {
        DigitalChannelDef {
            index: parse_count(cell(row, 0)),
            id: cell(row, 1).to_string(),
            phase: cell(row, 2).to_string(),
            component: cell(row, 3).to_string(),
            // Only the literal "1" marks a normally-set input.
            normal_state: cell(row, 4) == "1",
        }
    }

    pub fn to_row(&self) -> String {
        let fields: [String; DIGITAL_FIELDS] = [
            self.index.to_string(),
            self.id.clone(),
            self.phase.clone(),
            self.component.clone(),
            if self.normal_state { "1" } else { "0" }.to_string(),
        ];
        fields.join(",")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SamplingRate {
    /// Samples per second, `NaN` when unreadable.
    pub rate: f64,
    /// Last sample number recorded at this rate.
    pub end_sample: u64,
}

impl SamplingRate {
    pub fn from_row(row: &[&str]) -> Self {
        SamplingRate {
            rate: parse_float(cell(row, 0)),
            end_sample: parse_int(cell(row, 1))
                .and_then(|value| u64::try_from(value).ok())
                .unwrap_or(0),
        }
    }

    pub fn to_row(&self) -> String {
        format!("{},{}", self.rate, self.end_sample)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub station_name: String,
    pub device_id: String,
    pub revision: Revision,
    /// TT field of the second line, trusted as written.
    pub total_channels: usize,
    pub analog_channels: Vec<AnalogChannelDef>,
    pub digital_channels: Vec<DigitalChannelDef>,
    /// Nominal line frequency in Hz, `NaN` when unreadable.
    pub line_frequency: f64,
    pub sampling_rates: Vec<SamplingRate>,
    pub start_time: Timestamp,
    pub trigger_time: Timestamp,
    /// Raw DAT encoding text, not case-normalized.
    pub file_type: String,
    /// `0` when unreadable. The data parser reads `0` as "unscaled".
    pub time_multiplier: f64,
    // 2013-only fields
    pub time_code: Option<String>,
    pub local_code: Option<String>,
    pub tmq_code: Option<String>,
    pub leap_second: Option<String>,
    pub time_unit: TimeUnit,
}

impl Config {
    /// Parses CFG text.
    ///
    /// Rows are located positionally: identity, channel counts, channel definitions and the
    /// sampling-rate table from the top; time lines, file type, time multiplier and the
    /// 2013 time-code lines from the bottom. Unreadable numbers degrade to `NaN` or `0`.
    /// Only a missing or malformed start/trigger time line is an error.
    pub fn from_cfg_str(text: &str, time_unit: TimeUnit) -> Result<Self, ParseError> {
        let lines = split_lines(text);
        let rows: Vec<Vec<&str>> = lines.iter().map(|line| split_cells(line)).collect();
        let empty: &[&str] = &[];
        let row = |i: usize| rows.get(i).map(Vec::as_slice).unwrap_or(empty);

        let last_row_empty = rows.last().map(|r| is_blank_row(r)).unwrap_or(false) as usize;

        let station_name = cell(row(0), 0).to_string();
        let device_id = cell(row(0), 1).to_string();
        let revision = Revision::from_field(cell(row(0), 2));

        let total_channels = parse_count(cell(row(1), 0));

        // Declared counts never exceed the rows actually present.
        let analog_start = 2;
        let analog_count = bounded_count(
            parse_count(strip_suffix(cell(row(1), 1), 'A')),
            rows.len().saturating_sub(analog_start),
            "analog channel",
        );
        let analog_channels: Vec<AnalogChannelDef> = (analog_start..analog_start + analog_count)
            .map(|i| AnalogChannelDef::from_row(row(i)))
            .collect();

        let digital_start = analog_start + analog_count;
        let digital_count = bounded_count(
            parse_count(strip_suffix(cell(row(1), 2), 'D')),
            rows.len().saturating_sub(digital_start),
            "digital channel",
        );
        let digital_channels: Vec<DigitalChannelDef> = (digital_start
            ..digital_start + digital_count)
            .map(|i| DigitalChannelDef::from_row(row(i)))
            .collect();

        let line_frequency = parse_float(cell(row(total_channels.saturating_add(2)), 0));

        let nrates_row = total_channels.saturating_add(3);
        let nrates = bounded_count(
            parse_count(cell(row(nrates_row), 0)),
            rows.len().saturating_sub(nrates_row.saturating_add(1)),
            "sampling rate",
        );
        // A zero rate count still carries one global rate row.
        let sampling_rates: Vec<SamplingRate> = (0..nrates.max(1))
            .map(|i| SamplingRate::from_row(row(nrates_row.saturating_add(1 + i))))
            .collect();

        // Everything below is counted from the end of the file.
        let tail = rows
            .len()
            .saturating_sub(last_row_empty + revision.tail_lines());
        let tail_line = |back: usize| tail.checked_sub(back).map(|i| lines[i]).unwrap_or("");
        let tail_row = |back: usize| tail.checked_sub(back).map(row).unwrap_or(empty);

        let (start_line, trigger_line) = (tail_line(4), tail_line(3));
        if !Timestamp::is_valid_line(start_line) || !Timestamp::is_valid_line(trigger_line) {
            return Err(ParseError::InvalidFormat {
                message: "Invalid or missing start time and trigger time".to_string(),
            });
        }
        let start_time = Timestamp::from_line(start_line)?;
        let trigger_time = Timestamp::from_line(trigger_line)?;

        let file_type = cell(tail_row(2), 0).to_string();

        let time_multiplier = parse_float(cell(tail_row(1), 0));
        let time_multiplier = if time_multiplier.is_nan() {
            0.0
        } else {
            time_multiplier
        };

        let (time_code, local_code, tmq_code, leap_second) = match revision {
            Revision::Rev2013 => (
                optional_cell(row(tail), 0),
                optional_cell(row(tail), 1),
                optional_cell(row(tail + 1), 0),
                optional_cell(row(tail + 1), 1),
            ),
            _ => (None, None, None, None),
        };

        log::debug!(
            "Parsed CFG for {} ({}): {} analog, {} digital, {} rate(s)",
            station_name,
            revision,
            analog_channels.len(),
            digital_channels.len(),
            sampling_rates.len()
        );

        Ok(Config {
            station_name,
            device_id,
            revision,
            total_channels,
            analog_channels,
            digital_channels,
            line_frequency,
            sampling_rates,
            start_time,
            trigger_time,
            file_type,
            time_multiplier,
            time_code,
            local_code,
            tmq_code,
            leap_second,
            time_unit,
        })
    }

    /// Renders the configuration as CFG text with CRLF line endings.
    pub fn to_cfg_string(&self) -> String {
        let mut lines: Vec<String> = Vec::new();

        match self.revision {
            Revision::Rev1991 => lines.push(format!("{},{}", self.station_name, self.device_id)),
            _ => lines.push(format!(
                "{},{},{}",
                self.station_name,
                self.device_id,
                self.revision.year()
            )),
        }
        lines.push(format!(
            "{},{}A,{}D",
            self.analog_count() + self.digital_count(),
            self.analog_count(),
            self.digital_count()
        ));
        lines.extend(self.analog_channels.iter().map(AnalogChannelDef::to_row));
        lines.extend(self.digital_channels.iter().map(DigitalChannelDef::to_row));
        lines.push(self.line_frequency.to_string());

        // A single rate covering the file is written with a zero rate count.
        match self.sampling_rates.as_slice() {
            [single] if single.end_sample == 0 => {
                lines.push("0".to_string());
                lines.push(single.to_row());
            }
            rates => {
                lines.push(rates.len().to_string());
                lines.extend(rates.iter().map(SamplingRate::to_row));
            }
        }

        lines.push(self.start_time.to_line());
        lines.push(self.trigger_time.to_line());
        lines.push(self.file_type.clone());
        lines.push(self.time_multiplier.to_string());

        if self.revision == Revision::Rev2013 {
            lines.push(format!(
                "{},{}",
                self.time_code.as_deref().unwrap_or(""),
                self.local_code.as_deref().unwrap_or("")
            ));
            lines.push(format!(
                "{},{}",
                self.tmq_code.as_deref().unwrap_or(""),
                self.leap_second.as_deref().unwrap_or("")
            ));
        }

        let mut text = lines.join(LINE_BREAK);
        text.push_str(LINE_BREAK);
        text
    }

    pub fn analog_count(&self) -> usize {
        self.analog_channels.len()
    }

    pub fn digital_count(&self) -> usize {
        self.digital_channels.len()
    }

    /// Bytes per binary DAT record: sample number, timestamp, analog words, status words.
    pub fn binary_record_size(&self) -> usize {
        4 + 4 + 2 * self.analog_count() + 2 * digital_word_count(self.digital_count())
    }

    /// Sample count declared by the last sampling-rate entry.
    pub fn total_samples(&self) -> u64 {
        self.sampling_rates
            .last()
            .map(|rate| rate.end_sample)
            .unwrap_or(0)
    }

    /// Trigger time relative to the start time, assuming at most one midnight between them.
    pub fn trigger_offset_us(&self) -> i64 {
        let offset = self.trigger_time.total_microseconds as i64
            - self.start_time.total_microseconds as i64;
        if offset < 0 {
            offset + MICROS_PER_DAY as i64
        } else {
            offset
        }
    }

    /// `time_multiplier` as applied to DAT timestamps: zero means unscaled.
    pub fn effective_time_multiplier(&self) -> f64 {
        if self.time_multiplier == 0.0 {
            1.0
        } else {
            self.time_multiplier
        }
    }
}

fn bounded_count(declared: usize, available: usize, what: &str) -> usize {
    if declared > available {
        log::warn!(
            "CFG declares {} {} rows, only {} present",
            declared,
            what,
            available
        );
        available
    } else {
        declared
    }
}

fn strip_suffix(field: &str, suffix: char) -> &str {
    field
        .strip_suffix(suffix)
        .or_else(|| field.strip_suffix(suffix.to_ascii_lowercase()))
        .unwrap_or(field)
}
