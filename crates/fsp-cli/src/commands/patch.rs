use std::error::Error;
use std::path::PathBuf;

use clap::{Args, ValueEnum};
use fsp_core::errors::{ErrorInfo, FspError};
use fsp_exec::{patch_occupancy, PatchOutcome};
use fsp_pipeline::{load_config, PipelineConfig};

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum Pass {
    /// Ligand occupancies after molecular replacement.
    Phased,
    /// Zero occupancies after refinement.
    Refined,
}

#[derive(Args, Debug)]
pub struct PatchArgs {
    /// Coordinate file rewritten in place.
    #[arg(long)]
    pub file: PathBuf,
    /// Which occupancy pass to apply.
    #[arg(long, value_enum)]
    pub pass: Pass,
    /// Configuration supplying the replacement literals.
    #[arg(long)]
    pub config: Option<PathBuf>,
}

pub fn run(args: &PatchArgs) -> Result<(), Box<dyn Error>> {
    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => PipelineConfig::default(),
    };
    let rule = match args.pass {
        Pass::Phased => config.occupancy.phased_rule(),
        Pass::Refined => config.occupancy.refined_rule(),
    };
    match patch_occupancy(&args.file, &rule)? {
        PatchOutcome::Patched { lines_modified } => {
            println!("{lines_modified} lines modified in {}", args.file.display());
            Ok(())
        }
        PatchOutcome::FileNotFound => Err(Box::new(FspError::FileNotFound(
            ErrorInfo::new("patch.file", "file not found").with_path(&args.file),
        ))),
    }
}
