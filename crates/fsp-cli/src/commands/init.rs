use std::error::Error;
use std::fs;
use std::path::PathBuf;

use clap::Args;
use fsp_pipeline::PipelineConfig;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Destination of the configuration file.
    #[arg(long)]
    pub out: PathBuf,
    /// Replace an existing file.
    #[arg(long)]
    pub force: bool,
}

pub fn run(args: &InitArgs) -> Result<(), Box<dyn Error>> {
    if args.out.exists() && !args.force {
        return Err(format!("{} already exists, pass --force to replace it", args.out.display()).into());
    }
    if let Some(parent) = args.out.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(&args.out, PipelineConfig::default().to_yaml_string()?)?;
    println!("wrote {}", args.out.display());
    Ok(())
}
