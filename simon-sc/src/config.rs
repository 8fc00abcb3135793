//! simon-sc specific configuration

use simon_common::config::BrokerConfig;
use std::path::PathBuf;

/// Score Collector configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub root_folder: PathBuf,
    pub store_path: PathBuf,
    pub broker: BrokerConfig,
}
