use crate::comtrade::common::{TimeUnit, MISSING_ANALOG_VALUE};
use crate::comtrade::config::Config;
use crate::comtrade::data::SampleSet;

use arrow::array::{ArrayRef, Float64Array, UInt8Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

pub const TIME_COLUMN: &str = "time";

/// Arrow schema for a recording: the time column, one nullable Float64 per analog channel
/// and one UInt8 per digital channel, in CFG order. `time_unit` is the unit of the time column.
pub fn config_to_schema(config: &Config, time_unit: TimeUnit) -> Schema {
    let mut names = column_names(config).into_iter();
    let mut fields = vec![Field::new(
        names.next().unwrap_or_else(|| TIME_COLUMN.to_string()),
        DataType::Float64,
        false,
    )];

    for def in &config.analog_channels {
        let name = names.next().unwrap_or_else(|| def.id.clone());
        let metadata = HashMap::from([
            ("unit".to_string(), def.unit.clone()),
            ("phase".to_string(), def.phase.clone()),
            ("component".to_string(), def.component.clone()),
        ]);
        fields.push(Field::new(name, DataType::Float64, true).with_metadata(metadata));
    }
    for def in &config.digital_channels {
        let name = names.next().unwrap_or_else(|| def.id.clone());
        let metadata = HashMap::from([(
            "normal_state".to_string(),
            (def.normal_state as u8).to_string(),
        )]);
        fields.push(Field::new(name, DataType::UInt8, false).with_metadata(metadata));
    }

    let metadata = HashMap::from([
        ("station_name".to_string(), config.station_name.clone()),
        ("device_id".to_string(), config.device_id.clone()),
        ("revision".to_string(), config.revision.year().to_string()),
        ("start_time".to_string(), config.start_time.to_line()),
        ("trigger_time".to_string(), config.trigger_time.to_line()),
        ("time_unit".to_string(), time_unit.suffix().to_string()),
    ]);
    Schema::new(fields).with_metadata(metadata)
}

// Channel ids are not guaranteed unique (or present), so clashes get the channel kind and
// index appended.
fn column_names(config: &Config) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::from([TIME_COLUMN.to_string()]);
    let mut names = vec![TIME_COLUMN.to_string()];

    let channels = config
        .analog_channels
        .iter()
        .map(|def| ("A", def.index, def.id.trim()))
        .chain(
            config
                .digital_channels
                .iter()
                .map(|def| ("D", def.index, def.id.trim())),
        );
    for (kind, index, id) in channels {
        let mut name = if id.is_empty() {
            format!("{}{}", kind, index)
        } else {
            id.to_string()
        };
        if seen.contains(&name) {
            name = format!("{}_{}{}", name, kind, index);
        }
        while seen.contains(&name) {
            name.push('_');
        }
        seen.insert(name.clone());
        names.push(name);
    }
    names
}

/// Converts decoded samples to a single Arrow record batch.
///
/// Missing analog samples become nulls. With `scaled`, analog values are converted to
/// engineering units with each channel's multiplier and offset.
pub fn sample_set_to_record_batch(
    config: &Config,
    samples: &SampleSet,
    scaled: bool,
) -> Result<RecordBatch, ArrowError> {
    let schema = Arc::new(config_to_schema(config, samples.time_unit));
    let rows = samples.len();

    let time: ArrayRef = Arc::new(Float64Array::from(samples.time_in_unit()));

    let analog: Vec<ArrayRef> = config
        .analog_channels
        .par_iter()
        .enumerate()
        .map(|(channel, def)| {
            let series = samples.analog_data.get(channel);
            let values: Vec<Option<f64>> = (0..rows)
                .map(|row| {
                    let raw = *series?.get(row)?;
                    if raw == MISSING_ANALOG_VALUE || raw.is_nan() {
                        None
                    } else if scaled {
                        Some(def.scale(raw))
                    } else {
                        Some(raw)
                    }
                })
                .collect();
            Arc::new(Float64Array::from(values)) as ArrayRef
        })
        .collect();

    let digital: Vec<ArrayRef> = (0..config.digital_count())
        .into_par_iter()
        .map(|channel| {
            let series = samples.digital_data.get(channel);
            let values: Vec<u8> = (0..rows)
                .map(|row| series.and_then(|s| s.get(row)).copied().unwrap_or(0))
                .collect();
            Arc::new(UInt8Array::from(values)) as ArrayRef
        })
        .collect();

    let mut arrays = Vec::with_capacity(1 + analog.len() + digital.len());
    arrays.push(time);
    arrays.extend(analog);
    arrays.extend(digital);

    RecordBatch::try_new(schema, arrays)
}
