// A Recording is a parsed COMTRADE CFG/DAT file pair.
// It is the convenient entry point for callers holding files on disk: it reads the CFG,
// locates the matching DAT next to it, and decodes the samples using the file type the
// configuration declares.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::comtrade::common::{ParseError, TimeUnit};
use crate::comtrade::config::Config;
use crate::comtrade::data::SampleSet;

const DAT_EXTENSIONS: [&str; 2] = ["dat", "DAT"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recording {
    pub config: Config,
    pub samples: SampleSet,
}

impl Recording {
    /// Loads `cfg_path` and the DAT file sharing its stem (`.dat` or `.DAT`).
    pub fn open(cfg_path: impl AsRef<Path>, time_unit: TimeUnit) -> Result<Self, ParseError> {
        let cfg_path = cfg_path.as_ref();
        let dat_path = find_dat_path(cfg_path)?;
        Self::open_pair(cfg_path, dat_path, time_unit)
    }

    pub fn open_pair(
        cfg_path: impl AsRef<Path>,
        dat_path: impl AsRef<Path>,
        time_unit: TimeUnit,
    ) -> Result<Self, ParseError> {
        let cfg_path = cfg_path.as_ref();
        let dat_path = dat_path.as_ref();
        log::info!(
            "Loading COMTRADE recording {} / {}",
            cfg_path.display(),
            dat_path.display()
        );

        // CFG files from older recorders are not always valid UTF-8.
        let cfg_bytes = fs::read(cfg_path)?;
        let dat_bytes = fs::read(dat_path)?;
        Self::from_parts(&String::from_utf8_lossy(&cfg_bytes), &dat_bytes, time_unit)
    }

    /// Parses an in-memory CFG text and DAT content.
    pub fn from_parts(cfg_text: &str, dat: &[u8], time_unit: TimeUnit) -> Result<Self, ParseError> {
        let config = Config::from_cfg_str(cfg_text, time_unit)?;
        let samples = SampleSet::from_dat(dat, &config, &config.file_type, time_unit)?;

        let declared = config.total_samples();
        if declared != 0 && declared != samples.len() as u64 {
            log::warn!(
                "{}: configuration declares {} samples, data file holds {}",
                config.station_name,
                declared,
                samples.len()
            );
        }
        Ok(Recording { config, samples })
    }

    /// Writes the recording as `<dir>/<name>.cfg` and `<dir>/<name>.dat`.
    pub fn save(&self, dir: impl AsRef<Path>, name: &str) -> Result<(PathBuf, PathBuf), ParseError> {
        let dir = dir.as_ref();
        let cfg_path = dir.join(format!("{}.cfg", name));
        let dat_path = dir.join(format!("{}.dat", name));

        let dat = self.samples.to_dat_bytes(&self.config, &self.config.file_type)?;
        fs::write(&cfg_path, self.config.to_cfg_string())?;
        fs::write(&dat_path, dat)?;
        Ok((cfg_path, dat_path))
    }
}

/// Returns the existing DAT path that pairs with `cfg_path`.
pub fn find_dat_path(cfg_path: &Path) -> Result<PathBuf, ParseError> {
    DAT_EXTENSIONS
        .iter()
        .map(|ext| cfg_path.with_extension(ext))
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| ParseError::MissingDataFile {
            cfg: cfg_path.display().to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comtrade::random::{random_recording, RandomRecordingOptions};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tempfile::tempdir;

    const CFG: &str = "S,D,1999\n1,1A,0D\n1,IA,,,A,1,0,0,-10,10,1,1,P\n60\n0\n1000,3\n\
01/01/2020,00:00:00.000000\n01/01/2020,00:00:00.001000\nascii\n1000\n";

    #[test]
    fn test_from_parts_uses_declared_file_type() {
        let recording = Recording::from_parts(CFG, b"1,0,5\n2,1,6\n3,2,7\n", TimeUnit::default())
            .unwrap();
        assert_eq!(recording.config.file_type, "ascii");
        assert_eq!(recording.samples.time, vec![0.0, 1000.0, 2000.0]);
        assert_eq!(recording.samples.analog_data[0], vec![5.0, 6.0, 7.0]);
    }

    #[test]
    fn test_open_finds_sibling_dat() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("fault.cfg"), CFG).unwrap();
        fs::write(dir.path().join("fault.DAT"), "1,0,5\n").unwrap();

        let recording = Recording::open(dir.path().join("fault.cfg"), TimeUnit::default()).unwrap();
        assert_eq!(recording.samples.len(), 1);
    }

    #[test]
    fn test_open_without_dat() {
        let dir = tempdir().unwrap();
        let cfg_path = dir.path().join("lonely.cfg");
        fs::write(&cfg_path, CFG).unwrap();

        assert!(matches!(
            Recording::open(&cfg_path, TimeUnit::default()),
            Err(ParseError::MissingDataFile { .. })
        ));
    }

    #[test]
    fn test_open_missing_cfg_is_io_error() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("gone.dat"), "").unwrap();
        assert!(matches!(
            Recording::open(dir.path().join("gone.cfg"), TimeUnit::default()),
            Err(ParseError::Io(_))
        ));
    }

    #[test]
    fn test_save_and_open() {
        let dir = tempdir().unwrap();
        let options = RandomRecordingOptions {
            samples: 32,
            ..Default::default()
        };
        let (config, samples) = random_recording(&mut StdRng::seed_from_u64(3), &options);
        let recording = Recording { config, samples };

        let (cfg_path, _) = recording.save(dir.path(), "mock").unwrap();
        let loaded = Recording::open(cfg_path, TimeUnit::default()).unwrap();
        assert_eq!(loaded, recording);
    }
}
