use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use arrow::ipc::writer::FileWriter;
use clap::{Parser, Subcommand, ValueEnum};
use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;

use comtrade_core::comtrade::random::{random_recording, RandomRecordingOptions};
use comtrade_core::comtrade::{parse_cfg, Config, Revision, TimeUnit};
use comtrade_core::recording::{find_dat_path, Recording};
use comtrade_core::utils::sample_set_to_record_batch;

#[derive(Debug, Parser)] // requires `derive` feature
#[command(name = "comtrade")]
#[command(about = "Inspect, export and generate COMTRADE recordings", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ExportFormat {
    Json,
    Arrow,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DatFormat {
    Ascii,
    Binary,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RevisionArg {
    #[value(name = "1991")]
    Rev1991,
    #[value(name = "1999")]
    Rev1999,
    #[value(name = "2013")]
    Rev2013,
}

impl From<RevisionArg> for Revision {
    fn from(value: RevisionArg) -> Self {
        match value {
            RevisionArg::Rev1991 => Revision::Rev1991,
            RevisionArg::Rev1999 => Revision::Rev1999,
            RevisionArg::Rev2013 => Revision::Rev2013,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TimeUnitArg {
    S,
    Ms,
    Us,
}

impl From<TimeUnitArg> for TimeUnit {
    fn from(value: TimeUnitArg) -> Self {
        match value {
            TimeUnitArg::S => TimeUnit::Seconds,
            TimeUnitArg::Ms => TimeUnit::Milliseconds,
            TimeUnitArg::Us => TimeUnit::Microseconds,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print a summary of a CFG file and, when present, its DAT file
    Inspect {
        #[arg(long)]
        cfg: PathBuf,
        /// DAT file to decode; defaults to the .dat/.DAT next to the CFG
        #[arg(long)]
        dat: Option<PathBuf>,
        #[arg(long, value_enum, default_value = "us")]
        time_unit: TimeUnitArg,
    },
    /// Decode a recording and write it as JSON or an Arrow IPC file
    Export {
        #[arg(long)]
        cfg: PathBuf,
        #[arg(long)]
        output: PathBuf,
        #[arg(long, value_enum, default_value = "json")]
        format: ExportFormat,
        /// Apply channel multipliers and offsets (Arrow output only)
        #[arg(long, default_value_t = false)]
        scaled: bool,
        #[arg(long, value_enum, default_value = "us")]
        time_unit: TimeUnitArg,
    },
    /// Write a random CFG/DAT pair
    Mock {
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,
        #[arg(long, default_value = "mock")]
        name: String,
        #[arg(long, default_value_t = 4)]
        analog: usize,
        #[arg(long, default_value_t = 8)]
        digital: usize,
        #[arg(long, default_value_t = 1000)]
        samples: usize,
        #[arg(long, default_value_t = 4000.0)]
        sample_rate: f64,
        #[arg(long, value_enum, default_value = "binary")]
        file_type: DatFormat,
        #[arg(long, value_enum, default_value = "1999")]
        revision: RevisionArg,
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Summary<'a> {
    station_name: &'a str,
    device_id: &'a str,
    revision: &'a str,
    file_type: &'a str,
    analog_channels: Vec<&'a str>,
    digital_channels: Vec<&'a str>,
    line_frequency: f64,
    sampling_rates: usize,
    start_time: String,
    trigger_time: String,
    trigger_offset_us: i64,
    declared_samples: u64,
    decoded_samples: Option<usize>,
}

// Loads the configuration, decoding the DAT file as well when one is found.
// The CFG is parsed once either way.
fn load_for_inspect(
    cfg: &Path,
    dat: Option<PathBuf>,
    time_unit: TimeUnit,
) -> Result<(Config, Option<usize>)> {
    let dat_path = match dat {
        Some(path) => Some(path),
        None => find_dat_path(cfg).ok(),
    };

    match dat_path {
        Some(path) => {
            let recording = Recording::open_pair(cfg, &path, time_unit)
                .with_context(|| format!("decoding {}", path.display()))?;
            let decoded = recording.samples.len();
            Ok((recording.config, Some(decoded)))
        }
        None => {
            info!("No DAT file next to {}, showing configuration only", cfg.display());
            let cfg_text = fs::read(cfg).with_context(|| format!("reading {}", cfg.display()))?;
            let config = parse_cfg(&String::from_utf8_lossy(&cfg_text), time_unit)
                .with_context(|| format!("parsing {}", cfg.display()))?;
            Ok((config, None))
        }
    }
}

fn inspect(cfg: PathBuf, dat: Option<PathBuf>, time_unit: TimeUnit) -> Result<()> {
    let (config, decoded_samples) = load_for_inspect(&cfg, dat, time_unit)?;

    let summary = Summary {
        station_name: &config.station_name,
        device_id: &config.device_id,
        revision: config.revision.year(),
        file_type: &config.file_type,
        analog_channels: config.analog_channels.iter().map(|c| c.id.as_str()).collect(),
        digital_channels: config.digital_channels.iter().map(|c| c.id.as_str()).collect(),
        line_frequency: config.line_frequency,
        sampling_rates: config.sampling_rates.len(),
        start_time: config.start_time.to_line(),
        trigger_time: config.trigger_time.to_line(),
        trigger_offset_us: config.trigger_offset_us(),
        declared_samples: config.total_samples(),
        decoded_samples,
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn export(
    cfg: PathBuf,
    output: PathBuf,
    format: ExportFormat,
    scaled: bool,
    time_unit: TimeUnit,
) -> Result<()> {
    let recording = Recording::open(&cfg, time_unit)
        .with_context(|| format!("loading {}", cfg.display()))?;
    let writer = BufWriter::new(
        File::create(&output).with_context(|| format!("creating {}", output.display()))?,
    );

    match format {
        ExportFormat::Json => {
            if scaled {
                log::warn!("--scaled only applies to Arrow output, writing raw values");
            }
            serde_json::to_writer(writer, &recording)?;
        }
        ExportFormat::Arrow => {
            let batch = sample_set_to_record_batch(&recording.config, &recording.samples, scaled)?;
            let mut writer = FileWriter::try_new(writer, &batch.schema())?;
            writer.write(&batch)?;
            writer.finish()?;
        }
    }
    info!(
        "Exported {} samples from {} to {}",
        recording.samples.len(),
        cfg.display(),
        output.display()
    );
    Ok(())
}

fn mock(
    output_dir: PathBuf,
    name: String,
    options: RandomRecordingOptions,
    seed: Option<u64>,
) -> Result<()> {
    if !(options.sample_rate.is_finite() && options.sample_rate > 0.0) {
        bail!(
            "sample rate must be a positive number, got {}",
            options.sample_rate
        );
    }
    fs::create_dir_all(&output_dir)
        .with_context(|| format!("creating {}", output_dir.display()))?;

    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let (config, samples) = random_recording(&mut rng, &options);
    let recording = Recording { config, samples };
    let (cfg_path, dat_path) = recording.save(&output_dir, &name)?;

    info!(
        "Wrote {} samples to {} and {}",
        recording.samples.len(),
        cfg_path.display(),
        dat_path.display()
    );
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Cli::parse();

    match args.command {
        Commands::Inspect {
            cfg,
            dat,
            time_unit,
        } => inspect(cfg, dat, time_unit.into()),
        Commands::Export {
            cfg,
            output,
            format,
            scaled,
            time_unit,
        } => export(cfg, output, format, scaled, time_unit.into()),
        Commands::Mock {
            output_dir,
            name,
            analog,
            digital,
            samples,
            sample_rate,
            file_type,
            revision,
            seed,
        } => {
            let options = RandomRecordingOptions {
                analog_channels: analog,
                digital_channels: digital,
                samples,
                sample_rate,
                revision: revision.into(),
                file_type: match file_type {
                    DatFormat::Ascii => "ASCII".to_string(),
                    DatFormat::Binary => "BINARY".to_string(),
                },
                ..Default::default()
            };
            mock(output_dir, name, options, seed)
        }
    }
}
