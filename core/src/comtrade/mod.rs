// Public modules
pub mod common;
pub mod config;
pub mod data;
pub mod random;
pub mod timestamp;
pub mod utils;

pub use common::{FileType, ParseError, Revision, TimeUnit};
pub use config::{AnalogChannelDef, Config, DigitalChannelDef, SamplingRate};
pub use data::SampleSet;
pub use timestamp::Timestamp;

/// Parses the text of a CFG file.
pub fn parse_cfg(text: &str, time_unit: TimeUnit) -> Result<Config, ParseError> {
    Config::from_cfg_str(text, time_unit)
}

/// Parses the content of a DAT file with the channel layout of `cfg`.
///
/// `file_type` is usually `cfg.file_type`, read as text or bytes by the caller.
pub fn parse_dat(
    data: &[u8],
    cfg: &Config,
    file_type: &str,
    time_unit: TimeUnit,
) -> Result<SampleSet, ParseError> {
    SampleSet::from_dat(data, cfg, file_type, time_unit)
}
