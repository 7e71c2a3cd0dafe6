use std::error::Error;

use clap::Args;
use fsp_pipeline::discover_datasets;

use super::ConfigArgs;

#[derive(Args, Debug)]
pub struct ScanArgs {
    #[command(flatten)]
    pub config: ConfigArgs,
}

pub fn run(args: &ScanArgs) -> Result<(), Box<dyn Error>> {
    let config = args.config.resolve()?;
    config.validate()?;
    for dataset in discover_datasets(&config.base_dir, &config.dataset_prefix)? {
        println!("{}", dataset.path.display());
    }
    Ok(())
}
