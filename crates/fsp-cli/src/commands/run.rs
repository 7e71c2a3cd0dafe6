use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use fsp_exec::SystemRunner;
use fsp_pipeline::BatchDriver;
use tracing::info;

use super::ConfigArgs;

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub config: ConfigArgs,
    /// Seconds to wait for an input file before giving up.
    #[arg(long)]
    pub timeout: Option<u64>,
    /// Seconds between two checks for an input file.
    #[arg(long)]
    pub interval: Option<u64>,
    /// Do not re-run stages whose outputs already exist.
    #[arg(long)]
    pub resume: bool,
    /// Number of datasets processed in parallel.
    #[arg(long)]
    pub concurrency: Option<usize>,
    /// Where to write the JSON report; defaults to `<base-dir>/fsp_report.json`.
    #[arg(long)]
    pub report: Option<PathBuf>,
    /// Exit non-zero when any dataset did not complete.
    #[arg(long)]
    pub fail_on_error: bool,
}

pub fn run(args: &RunArgs) -> Result<(), Box<dyn Error>> {
    let mut config = args.config.resolve()?;
    if let Some(timeout) = args.timeout {
        config.wait.timeout_secs = timeout;
    }
    if let Some(interval) = args.interval {
        config.wait.interval_secs = interval;
    }
    if let Some(concurrency) = args.concurrency {
        config.concurrency = concurrency;
    }
    config.resume |= args.resume;

    let report_path = args
        .report
        .clone()
        .unwrap_or_else(|| config.base_dir.join("fsp_report.json"));
    let driver = BatchDriver::new(config, SystemRunner)?;
    let report = driver.run()?;
    report.write(&report_path)?;
    info!(path = %report_path.display(), "report written");

    println!("{}", report.summary_line());
    for dataset in report.datasets.iter().filter(|dataset| dataset.outcome.is_failure()) {
        println!("incomplete: {}", dataset.name);
    }

    if args.fail_on_error && report.has_failures() {
        return Err(format!("{} datasets did not complete", report.totals.partial).into());
    }
    Ok(())
}
