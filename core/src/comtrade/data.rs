/// Samples decoded from a COMTRADE data (DAT) file
use super::common::{
    digital_word_count, FileType, ParseError, TimeUnit, BINARY_MISSING_CODE,
    DIGITAL_CHANNELS_PER_WORD, MISSING_ANALOG_VALUE,
};
use super::config::Config;
use super::timestamp::Timestamp;
use super::utils::{
    parse_float, parse_int, read_i16_le, read_u16_le, read_u32_le, split_cells, split_lines,
};

use serde::{Deserialize, Serialize};

// Sample number and timestamp, both u32.
const RECORD_HEADER_SIZE: usize = 8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleSet {
    /// Raw timestamps multiplied by the effective time multiplier.
    pub time: Vec<f64>,
    /// One series per analog channel. Missing samples hold `MISSING_ANALOG_VALUE`.
    pub analog_data: Vec<Vec<f64>>,
    /// One series per digital channel, values 0 or 1.
    pub digital_data: Vec<Vec<u8>>,
    pub start_date_info: Timestamp,
    pub time_unit: TimeUnit,
}

impl SampleSet {
    pub fn empty(cfg: &Config, time_unit: TimeUnit) -> Self {
        SampleSet {
            time: Vec::new(),
            analog_data: vec![Vec::new(); cfg.analog_count()],
            digital_data: vec![Vec::new(); cfg.digital_count()],
            start_date_info: cfg.start_time,
            time_unit,
        }
    }

    /// Decodes DAT content using the channel layout of `cfg`.
    ///
    /// `file_type` is matched case-insensitively against `ASCII` and `BINARY`. Short ASCII
    /// lines and a truncated trailing binary record are dropped, not reported as errors.
    pub fn from_dat(
        data: &[u8],
        cfg: &Config,
        file_type: &str,
        time_unit: TimeUnit,
    ) -> Result<Self, ParseError> {
        let file_type: FileType = file_type.parse()?;
        let samples = match file_type {
            FileType::Ascii => {
                Self::from_ascii(&String::from_utf8_lossy(data), cfg, time_unit)
            }
            FileType::Binary => Self::from_binary(data, cfg, time_unit),
        };
        log::debug!(
            "Decoded {} {} samples for {}",
            samples.len(),
            file_type,
            cfg.station_name
        );
        Ok(samples)
    }

    pub fn from_ascii(text: &str, cfg: &Config, time_unit: TimeUnit) -> Self {
        let analog_count = cfg.analog_count();
        let digital_count = cfg.digital_count();
        let min_fields = 2 + analog_count + digital_count;
        let multiplier = cfg.effective_time_multiplier();

        let mut samples = Self::empty(cfg, time_unit);
        for (line_number, line) in split_lines(text).into_iter().enumerate() {
            let fields = split_cells(line);
            if fields.len() < min_fields {
                if !line.trim().is_empty() {
                    log::debug!(
                        "Skipping DAT line {}: {} fields, expected {}",
                        line_number + 1,
                        fields.len(),
                        min_fields
                    );
                }
                continue;
            }

            // fields[0] is the sample number, not needed downstream.
            let time = parse_int(fields[1])
                .map(|ts| ts as f64 * multiplier)
                .unwrap_or(f64::NAN);
            samples.time.push(time);

            for (channel, field) in fields[2..2 + analog_count].iter().enumerate() {
                let value = parse_float(field);
                samples.analog_data[channel].push(if value.is_nan() {
                    MISSING_ANALOG_VALUE
                } else {
                    value
                });
            }

            let digital_fields = &fields[2 + analog_count..min_fields];
            for (channel, field) in digital_fields.iter().enumerate() {
                samples.digital_data[channel].push((parse_int(field) == Some(1)) as u8);
            }
        }
        samples
    }

    pub fn from_binary(bytes: &[u8], cfg: &Config, time_unit: TimeUnit) -> Self {
        let analog_count = cfg.analog_count();
        let digital_count = cfg.digital_count();
        let analog_size = 2 * analog_count;
        let digital_size = 2 * digital_word_count(digital_count);
        let multiplier = cfg.effective_time_multiplier();

        let mut samples = Self::empty(cfg, time_unit);
        let mut offset = 0;
        while offset < bytes.len() {
            let remaining = bytes.len() - offset;
            if remaining < RECORD_HEADER_SIZE {
                log::warn!(
                    "Insufficient data for sample header at offset {}: {} bytes left",
                    offset,
                    remaining
                );
                break;
            }
            if remaining < RECORD_HEADER_SIZE + analog_size {
                log::warn!(
                    "Insufficient data for {} analog values at offset {}",
                    analog_count,
                    offset
                );
                break;
            }
            if remaining < RECORD_HEADER_SIZE + analog_size + digital_size {
                log::warn!(
                    "Insufficient data for {} digital words at offset {}",
                    digital_size / 2,
                    offset
                );
                break;
            }

            // Sample number at offset + 0 is not needed downstream.
            let raw_timestamp = read_u32_le(bytes, offset + 4);
            samples.time.push(raw_timestamp as f64 * multiplier);
            offset += RECORD_HEADER_SIZE;

            for channel in samples.analog_data.iter_mut() {
                let raw = read_i16_le(bytes, offset);
                channel.push(if raw == BINARY_MISSING_CODE {
                    MISSING_ANALOG_VALUE
                } else {
                    raw as f64
                });
                offset += 2;
            }

            for word_index in 0..digital_size / 2 {
                let word = read_u16_le(bytes, offset);
                for bit in 0..DIGITAL_CHANNELS_PER_WORD {
                    let channel = word_index * DIGITAL_CHANNELS_PER_WORD + bit;
                    if channel < digital_count {
                        samples.digital_data[channel].push(((word >> bit) & 1) as u8);
                    }
                }
                offset += 2;
            }
        }
        samples
    }

    /// Renders the samples as DAT content in the given encoding.
    ///
    /// Timestamps are divided by the effective time multiplier of `cfg` and rounded.
    /// Missing analog values are written as an empty ASCII field or `-32768` in binary.
    pub fn to_dat_bytes(&self, cfg: &Config, file_type: &str) -> Result<Vec<u8>, ParseError> {
        let file_type: FileType = file_type.parse()?;
        self.check_series_lengths()?;
        let multiplier = cfg.effective_time_multiplier();
        let raw_timestamp = |time: f64| (time / multiplier).round();

        match file_type {
            FileType::Ascii => {
                let mut text = String::new();
                for (i, &time) in self.time.iter().enumerate() {
                    let mut fields = vec![(i + 1).to_string(), format!("{}", raw_timestamp(time))];
                    fields.extend(self.analog_data.iter().map(|channel| {
                        match channel[i] {
                            value if value == MISSING_ANALOG_VALUE => String::new(),
                            value => value.to_string(),
                        }
                    }));
                    fields.extend(self.digital_data.iter().map(|channel| channel[i].to_string()));
                    text.push_str(&fields.join(","));
                    text.push_str("\r\n");
                }
                Ok(text.into_bytes())
            }
            FileType::Binary => {
                let words = digital_word_count(self.digital_data.len());
                let mut result = Vec::with_capacity(self.len() * cfg.binary_record_size());
                for (i, &time) in self.time.iter().enumerate() {
                    result.extend_from_slice(&((i + 1) as u32).to_le_bytes());
                    result.extend_from_slice(&(raw_timestamp(time) as u32).to_le_bytes());
                    for channel in &self.analog_data {
                        let raw = match channel[i] {
                            value if value == MISSING_ANALOG_VALUE => BINARY_MISSING_CODE,
                            value => value.round() as i16,
                        };
                        result.extend_from_slice(&raw.to_le_bytes());
                    }
                    for word_index in 0..words {
                        let mut word: u16 = 0;
                        for bit in 0..DIGITAL_CHANNELS_PER_WORD {
                            let channel = word_index * DIGITAL_CHANNELS_PER_WORD + bit;
                            if let Some(series) = self.digital_data.get(channel) {
                                word |= ((series[i] & 1) as u16) << bit;
                            }
                        }
                        result.extend_from_slice(&word.to_le_bytes());
                    }
                }
                Ok(result)
            }
        }
    }

    // Every analog and digital series must hold one value per timestamp.
    fn check_series_lengths(&self) -> Result<(), ParseError> {
        let analog = self.analog_data.iter().map(Vec::len);
        let digital = self.digital_data.iter().map(Vec::len);
        match analog.chain(digital).find(|&len| len != self.len()) {
            Some(len) => Err(ParseError::InvalidFormat {
                message: format!(
                    "Channel series holds {} samples, expected {}",
                    len,
                    self.len()
                ),
            }),
            None => Ok(()),
        }
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Sample times expressed in `time_unit`, assuming `time` holds microseconds.
    pub fn time_in_unit(&self) -> Vec<f64> {
        self.time
            .iter()
            .map(|&t| self.time_unit.from_microseconds(t))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(analog: usize, digital: usize, multiplier: f64, file_type: &str) -> Config {
        let mut text = format!("S,D,1999\r\n{},{}A,{}D\r\n", analog + digital, analog, digital);
        for i in 1..=analog {
            text.push_str(&format!("{i},A{i},,,V,1,0,0,-32767,32767,1,1,P\r\n"));
        }
        for i in 1..=digital {
            text.push_str(&format!("{i},D{i},,,0\r\n"));
        }
        text.push_str("50\r\n0\r\n1000,0\r\n");
        text.push_str("01/01/2020,00:00:00.000000\r\n01/01/2020,00:00:00.000000\r\n");
        text.push_str(&format!("{file_type}\r\n{multiplier}\r\n"));
        Config::from_cfg_str(&text, TimeUnit::default()).unwrap()
    }

    fn binary_record(n: u32, ts: u32, analog: &[i16], words: &[u16]) -> Vec<u8> {
        let mut record = Vec::new();
        record.extend_from_slice(&n.to_le_bytes());
        record.extend_from_slice(&ts.to_le_bytes());
        for a in analog {
            record.extend_from_slice(&a.to_le_bytes());
        }
        for w in words {
            record.extend_from_slice(&w.to_le_bytes());
        }
        record
    }

    #[test]
    fn test_ascii_samples() {
        let cfg = config(2, 2, 1.0, "ASCII");
        let dat = "1,0,1.5,-2,1,0\r\n2,1000,2.5,-3,0,1\r\n";
        let samples = SampleSet::from_dat(dat.as_bytes(), &cfg, "ASCII", TimeUnit::default())
            .unwrap();

        assert_eq!(samples.time, vec![0.0, 1000.0]);
        assert_eq!(samples.analog_data, vec![vec![1.5, 2.5], vec![-2.0, -3.0]]);
        assert_eq!(samples.digital_data, vec![vec![1, 0], vec![0, 1]]);
        assert_eq!(samples.start_date_info, cfg.start_time);
    }

    #[test]
    fn test_ascii_missing_value_sentinel() {
        let cfg = config(3, 0, 1.0, "ASCII");
        let dat = "1,0,,abc,7\n";
        let samples = SampleSet::from_ascii(dat, &cfg, TimeUnit::default());
        assert_eq!(
            samples.analog_data,
            vec![vec![MISSING_ANALOG_VALUE], vec![MISSING_ANALOG_VALUE], vec![7.0]]
        );
        assert!(samples.analog_data.iter().flatten().all(|v| !v.is_nan()));
    }

    #[test]
    fn test_ascii_digital_normalization() {
        let cfg = config(0, 5, 1.0, "ASCII");
        let dat = "1,0,1,0,2,x,\n";
        let samples = SampleSet::from_ascii(dat, &cfg, TimeUnit::default());
        let values: Vec<u8> = samples.digital_data.iter().map(|c| c[0]).collect();
        assert_eq!(values, vec![1, 0, 0, 0, 0]);
    }

    #[test]
    fn test_ascii_truncated_line_is_skipped() {
        let cfg = config(2, 1, 1.0, "ASCII");
        let dat = "1,0,1,2,1\n2,10,1,2\n3,20,1,2,0\n";
        let samples = SampleSet::from_ascii(dat, &cfg, TimeUnit::default());
        assert_eq!(samples.time, vec![0.0, 20.0]);
        assert_eq!(samples.analog_data[0].len(), 2);
        assert_eq!(samples.digital_data[0], vec![1, 0]);
    }

    #[test]
    fn test_ascii_unreadable_timestamp_is_nan() {
        let cfg = config(1, 0, 1.0, "ASCII");
        let samples = SampleSet::from_ascii("1,?,5\n", &cfg, TimeUnit::default());
        assert_eq!(samples.len(), 1);
        assert!(samples.time[0].is_nan());
    }

    #[test]
    fn test_time_multiplier_zero_matches_one() {
        let dat = "1,0,1\n2,250,2\n3,500,3\n";
        let zero = SampleSet::from_ascii(dat, &config(1, 0, 0.0, "ASCII"), TimeUnit::default());
        let one = SampleSet::from_ascii(dat, &config(1, 0, 1.0, "ASCII"), TimeUnit::default());
        assert_eq!(zero.time, one.time);

        let bin = binary_record(1, 40, &[1], &[]);
        let zero = SampleSet::from_binary(&bin, &config(1, 0, 0.0, "BINARY"), TimeUnit::default());
        let one = SampleSet::from_binary(&bin, &config(1, 0, 1.0, "BINARY"), TimeUnit::default());
        assert_eq!(zero.time, one.time);
    }

    #[test]
    fn test_time_multiplier_scales_both_encodings() {
        let cfg = config(1, 0, 2.5, "ASCII");
        let ascii = SampleSet::from_ascii("1,4,0\n", &cfg, TimeUnit::default());
        assert_eq!(ascii.time, vec![10.0]);

        let binary = SampleSet::from_binary(&binary_record(1, 4, &[0], &[]), &cfg, TimeUnit::default());
        assert_eq!(binary.time, vec![10.0]);
    }

    #[test]
    fn test_binary_samples() {
        let cfg = config(2, 3, 1.0, "BINARY");
        let mut dat = binary_record(1, 0, &[100, -200], &[0b101]);
        dat.extend(binary_record(2, 833, &[BINARY_MISSING_CODE, 32767], &[0b010]));

        let samples = SampleSet::from_dat(&dat, &cfg, "binary", TimeUnit::default()).unwrap();
        assert_eq!(samples.time, vec![0.0, 833.0]);
        assert_eq!(
            samples.analog_data,
            vec![vec![100.0, MISSING_ANALOG_VALUE], vec![-200.0, 32767.0]]
        );
        assert_eq!(samples.digital_data, vec![vec![1, 0], vec![0, 1], vec![1, 0]]);
    }

    #[test]
    fn test_binary_values_are_not_rescaled() {
        let mut cfg = config(1, 0, 1.0, "BINARY");
        cfg.analog_channels[0].multiplier = 0.5;
        cfg.analog_channels[0].offset = 10.0;
        let samples = SampleSet::from_binary(&binary_record(1, 0, &[40], &[]), &cfg, TimeUnit::default());
        assert_eq!(samples.analog_data[0], vec![40.0]);
    }

    #[test]
    fn test_binary_twenty_digital_channels() {
        let cfg = config(0, 20, 1.0, "BINARY");
        assert_eq!(cfg.binary_record_size(), 8 + 4);

        let dat = binary_record(1, 0, &[], &[0x8000, 0x0009]);
        let samples = SampleSet::from_binary(&dat, &cfg, TimeUnit::default());

        assert_eq!(samples.len(), 1);
        assert_eq!(samples.digital_data.len(), 20);
        assert!(samples.digital_data.iter().all(|c| c.len() == 1));
        assert_eq!(samples.digital_data[15], vec![1]);
        assert_eq!(samples.digital_data[16], vec![1]);
        assert_eq!(samples.digital_data[17], vec![0]);
        assert_eq!(samples.digital_data[19], vec![1]);
        assert_eq!(samples.digital_data[0], vec![0]);
    }

    #[test]
    fn test_binary_truncated_record_is_dropped() {
        let cfg = config(2, 1, 1.0, "BINARY");
        let mut dat = binary_record(1, 0, &[1, 2], &[1]);
        let second = binary_record(2, 10, &[3, 4], &[0]);

        for cut in [1, 4, 8, 10, second.len() - 1] {
            let mut truncated = dat.clone();
            truncated.extend_from_slice(&second[..cut]);
            let samples = SampleSet::from_binary(&truncated, &cfg, TimeUnit::default());
            assert_eq!(samples.len(), 1, "cut at {}", cut);
            assert_eq!(samples.analog_data[1], vec![2.0]);
            assert_eq!(samples.digital_data[0], vec![1]);
        }

        dat.extend(second);
        assert_eq!(SampleSet::from_binary(&dat, &cfg, TimeUnit::default()).len(), 2);
    }

    #[test]
    fn test_unsupported_file_type() {
        let cfg = config(1, 0, 1.0, "FLOAT32");
        for file_type in ["FLOAT32", "BINARY32", "csv"] {
            assert!(matches!(
                SampleSet::from_dat(b"", &cfg, file_type, TimeUnit::default()),
                Err(ParseError::UnsupportedFormat { .. })
            ));
        }
    }

    #[test]
    fn test_empty_content() {
        let cfg = config(1, 1, 1.0, "ASCII");
        for file_type in ["ASCII", "BINARY"] {
            let samples = SampleSet::from_dat(b"", &cfg, file_type, TimeUnit::default()).unwrap();
            assert!(samples.is_empty());
            assert_eq!(samples.analog_data, vec![Vec::<f64>::new()]);
            assert_eq!(samples.digital_data, vec![Vec::<u8>::new()]);
        }
    }

    #[test]
    fn test_dat_writer_round_trip() {
        let cfg = config(2, 17, 1.0, "BINARY");
        let mut samples = SampleSet::empty(&cfg, TimeUnit::default());
        samples.time = vec![0.0, 500.0, 1000.0];
        samples.analog_data = vec![vec![1.0, MISSING_ANALOG_VALUE, -3.0], vec![0.0, 12.0, 32767.0]];
        samples.digital_data = (0..17).map(|c| vec![(c % 2) as u8, 1, 0]).collect();

        for file_type in ["ASCII", "BINARY"] {
            let bytes = samples.to_dat_bytes(&cfg, file_type).unwrap();
            let parsed = SampleSet::from_dat(&bytes, &cfg, file_type, TimeUnit::default()).unwrap();
            assert_eq!(parsed, samples, "{} round trip", file_type);
        }
        assert_eq!(
            samples.to_dat_bytes(&cfg, "BINARY").unwrap().len(),
            3 * cfg.binary_record_size()
        );
    }

    #[test]
    fn test_dat_writer_rejects_ragged_series() {
        let cfg = config(1, 1, 1.0, "ASCII");
        let json = r#"{"time":[0.0,1.0],"analogData":[[1.0]],"digitalData":[[0,1]],
            "startDateInfo":{"totalMicroseconds":0,"day":1,"month":1,"year":2020,"hour":0,
            "minute":0,"second":0,"microsecond":0},"timeUnit":"microseconds"}"#;
        let ragged: SampleSet = serde_json::from_str(json).unwrap();

        for file_type in ["ASCII", "BINARY"] {
            assert!(matches!(
                ragged.to_dat_bytes(&cfg, file_type),
                Err(ParseError::InvalidFormat { .. })
            ));
        }

        let mut short_digital = SampleSet::empty(&cfg, TimeUnit::default());
        short_digital.time = vec![0.0];
        short_digital.analog_data = vec![vec![1.0]];
        assert!(short_digital.to_dat_bytes(&cfg, "BINARY").is_err());
    }

    #[test]
    fn test_time_in_unit() {
        let cfg = config(0, 0, 1.0, "ASCII");
        let samples = SampleSet::from_ascii("1,1500\n2,3000\n", &cfg, TimeUnit::Milliseconds);
        assert_eq!(samples.time, vec![1500.0, 3000.0]);
        assert_eq!(samples.time_in_unit(), vec![1.5, 3.0]);
    }
}
