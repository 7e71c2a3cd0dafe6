use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use fsp_pipeline::{load_config, PipelineConfig};

pub mod init;
pub mod patch;
pub mod run;
pub mod scan;

/// Options shared by every command that reads a pipeline configuration.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// YAML configuration file; built-in defaults apply when omitted.
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Directory holding the dataset directories.
    #[arg(long)]
    pub base_dir: Option<PathBuf>,
    /// Name prefix selecting dataset directories.
    #[arg(long)]
    pub prefix: Option<String>,
}

impl ConfigArgs {
    /// Loads the configuration file, if any, and applies flag overrides.
    pub fn resolve(&self) -> Result<PipelineConfig, Box<dyn Error>> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => PipelineConfig::default(),
        };
        if let Some(base_dir) = &self.base_dir {
            config.base_dir = base_dir.clone();
        }
        if let Some(prefix) = &self.prefix {
            config.dataset_prefix = prefix.clone();
        }
        Ok(config)
    }
}
