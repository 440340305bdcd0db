// This module provides functions for generating random COMTRADE recordings.
// A random recording is a consistent Config and SampleSet pair: analog channels carry noisy
// sine waves with the odd missing sample, digital channels toggle at random.
// Use Config::to_cfg_string and SampleSet::to_dat_bytes to turn them into files.
//
use super::common::{Revision, TimeUnit, MISSING_ANALOG_VALUE};
use super::config::{AnalogChannelDef, Config, DigitalChannelDef, PrimarySecondary, SamplingRate};
use super::data::SampleSet;
use super::timestamp::{Timestamp, MICROS_PER_DAY};
use rand::Rng;
use std::f64::consts::PI;

const DEFAULT_ANALOG_CHANNELS: usize = 4;
const DEFAULT_DIGITAL_CHANNELS: usize = 8;
const DEFAULT_SAMPLES: usize = 1000;
const DEFAULT_SAMPLE_RATE: f64 = 4000.0;
const DEFAULT_LINE_FREQUENCY: f64 = 60.0;

// Raw amplitude of generated waveforms, well inside the i16 range.
const AMPLITUDE: f64 = 20_000.0;
const MISSING_PROBABILITY: f64 = 0.001;
const TOGGLE_PROBABILITY: f64 = 0.01;

const PHASES: [&str; 3] = ["A", "B", "C"];

#[derive(Debug, Clone)]
pub struct RandomRecordingOptions {
    pub station_name: String,
    pub analog_channels: usize,
    pub digital_channels: usize,
    pub samples: usize,
    pub sample_rate: f64,
    pub line_frequency: f64,
    pub revision: Revision,
    pub file_type: String,
}

impl Default for RandomRecordingOptions {
    fn default() -> Self {
        RandomRecordingOptions {
            station_name: "STATION01".to_string(),
            analog_channels: DEFAULT_ANALOG_CHANNELS,
            digital_channels: DEFAULT_DIGITAL_CHANNELS,
            samples: DEFAULT_SAMPLES,
            sample_rate: DEFAULT_SAMPLE_RATE,
            line_frequency: DEFAULT_LINE_FREQUENCY,
            revision: Revision::default(),
            file_type: "BINARY".to_string(),
        }
    }
}

fn random_analog_channel<R: Rng>(rng: &mut R, index: usize) -> AnalogChannelDef {
    let phase = PHASES[(index - 1) % PHASES.len()];
    let is_current = (index - 1) / PHASES.len() % 2 == 1;
    let (prefix, unit) = if is_current { ("I", "A") } else { ("V", "kV") };

    AnalogChannelDef {
        index,
        id: format!("{}{}_{:02}", prefix, phase, index),
        phase: phase.to_string(),
        component: "LINE".to_string(),
        unit: unit.to_string(),
        // Multipliers in steps of 1/1024 so they print without rounding noise.
        multiplier: rng.random_range(1..64) as f64 / 1024.0,
        offset: 0.0,
        skew: 0.0,
        min: -32767.0,
        max: 32767.0,
        primary_secondary: PrimarySecondary {
            primary: if is_current { 1200.0 } else { 132_000.0 },
            secondary: if is_current { 5.0 } else { 110.0 },
        },
        reference: "P".to_string(),
    }
}

fn random_digital_channel<R: Rng>(rng: &mut R, index: usize) -> DigitalChannelDef {
    DigitalChannelDef {
        index,
        id: format!("DG_{:02}", index),
        phase: String::new(),
        component: "BRK".to_string(),
        normal_state: rng.random_bool(0.5),
    }
}

fn random_start_time<R: Rng>(rng: &mut R) -> Timestamp {
    let hour = rng.random_range(0..24);
    let minute = rng.random_range(0..60);
    let second = rng.random_range(0..60);
    let microsecond = rng.random_range(0..1_000_000);
    Timestamp {
        total_microseconds: Timestamp::time_of_day_micros(hour, minute, second, microsecond),
        day: rng.random_range(1..29),
        month: rng.random_range(1..13),
        year: rng.random_range(2000..2030),
        hour,
        minute,
        second,
        microsecond,
    }
}

/// Generates a configuration matching `options`, with a single sampling rate and a
/// trigger a quarter of the way into the recording.
pub fn random_config<R: Rng>(rng: &mut R, options: &RandomRecordingOptions) -> Config {
    let analog_channels: Vec<AnalogChannelDef> = (1..=options.analog_channels)
        .map(|i| random_analog_channel(rng, i))
        .collect();
    let digital_channels: Vec<DigitalChannelDef> = (1..=options.digital_channels)
        .map(|i| random_digital_channel(rng, i))
        .collect();

    let start_time = random_start_time(rng);
    let sample_period_us = 1_000_000.0 / options.sample_rate;
    let trigger_delay = (options.samples as f64 / 4.0 * sample_period_us) as u64;
    let trigger_total = start_time.total_microseconds + trigger_delay;
    // Stay on the same day; the generator never crosses midnight.
    let trigger_total = trigger_total.min(MICROS_PER_DAY - 1);
    let trigger_time = Timestamp {
        total_microseconds: trigger_total,
        hour: (trigger_total / 3_600_000_000) as u32,
        minute: (trigger_total / 60_000_000 % 60) as u32,
        second: (trigger_total / 1_000_000 % 60) as u32,
        microsecond: (trigger_total % 1_000_000) as u32,
        ..start_time
    };

    let is_2013 = options.revision == Revision::Rev2013;
    Config {
        station_name: options.station_name.clone(),
        device_id: format!("REC{}", rng.random_range(100..1000)),
        revision: options.revision,
        total_channels: analog_channels.len() + digital_channels.len(),
        analog_channels,
        digital_channels,
        line_frequency: options.line_frequency,
        sampling_rates: vec![SamplingRate {
            rate: options.sample_rate,
            end_sample: options.samples as u64,
        }],
        start_time,
        trigger_time,
        file_type: options.file_type.clone(),
        time_multiplier: 1.0,
        time_code: is_2013.then(|| "0".to_string()),
        local_code: is_2013.then(|| "0".to_string()),
        tmq_code: is_2013.then(|| "F".to_string()),
        leap_second: is_2013.then(|| "0".to_string()),
        time_unit: TimeUnit::default(),
    }
}

/// Generates samples for `cfg`: whole-microsecond timestamps, integer analog values and
/// digital channels starting from their normal state.
pub fn random_samples<R: Rng>(rng: &mut R, cfg: &Config, samples: usize) -> SampleSet {
    let mut set = SampleSet::empty(cfg, cfg.time_unit);
    let rate = cfg
        .sampling_rates
        .first()
        .map(|r| r.rate)
        .filter(|r| r.is_finite() && *r > 0.0)
        .unwrap_or(DEFAULT_SAMPLE_RATE);
    let frequency = if cfg.line_frequency.is_finite() {
        cfg.line_frequency
    } else {
        DEFAULT_LINE_FREQUENCY
    };

    set.time = (0..samples)
        .map(|i| (i as f64 * 1_000_000.0 / rate).round())
        .collect();

    for (channel, series) in set.analog_data.iter_mut().enumerate() {
        let phase_shift = (channel % PHASES.len()) as f64 * 2.0 * PI / 3.0;
        *series = (0..samples)
            .map(|i| {
                if rng.random_bool(MISSING_PROBABILITY) {
                    return MISSING_ANALOG_VALUE;
                }
                let t = i as f64 / rate;
                let noise: f64 = rng.random_range(-200.0..200.0);
                (AMPLITUDE * (2.0 * PI * frequency * t - phase_shift).sin() + noise).round()
            })
            .collect();
    }

    for (def, series) in cfg.digital_channels.iter().zip(set.digital_data.iter_mut()) {
        let mut state = def.normal_state as u8;
        *series = (0..samples)
            .map(|_| {
                if rng.random_bool(TOGGLE_PROBABILITY) {
                    state ^= 1;
                }
                state
            })
            .collect();
    }

    set
}

pub fn random_recording<R: Rng>(
    rng: &mut R,
    options: &RandomRecordingOptions,
) -> (Config, SampleSet) {
    let cfg = random_config(rng, options);
    let samples = random_samples(rng, &cfg, options.samples);
    (cfg, samples)
}
