// COMTRADE (IEEE C37.111) configuration and data file decoding
pub mod comtrade;

pub mod recording;
pub mod utils;
