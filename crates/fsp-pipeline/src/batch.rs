use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use fsp_core::errors::{ErrorInfo, FspError};
use fsp_exec::CommandRunner;
use rayon::prelude::*;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::config::PipelineConfig;
use crate::report::{BatchReport, DatasetOutcome, DatasetReport, StageReport, StageStatus};
use crate::sequencer::StageSequencer;
use crate::stages::StageId;

/// Dataset directory selected for processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
    /// Directory name.
    pub name: String,
    /// Directory path.
    pub path: PathBuf,
}

/// Lists directories directly under `base` whose name starts with `prefix`,
/// in lexicographic order.
pub fn discover_datasets(base: &Path, prefix: &str) -> Result<Vec<Dataset>, FspError> {
    let mut datasets = Vec::new();
    let walker = WalkDir::new(base)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name();
    for entry in walker {
        let entry = entry.map_err(|err| FspError::io("dataset_scan", base, err))?;
        if !entry.file_type().is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with(prefix) {
            datasets.push(Dataset {
                name,
                path: entry.into_path(),
            });
        }
    }
    Ok(datasets)
}

/// Runs the stage chain over every matching dataset of a base directory.
pub struct BatchDriver<R: CommandRunner> {
    config: PipelineConfig,
    runner: R,
}

impl<R: CommandRunner> BatchDriver<R> {
    /// Validates `config` and builds a driver around `runner`.
    pub fn new(config: PipelineConfig, runner: R) -> Result<Self, FspError> {
        config.validate()?;
        Ok(Self { config, runner })
    }

    /// Configuration driving the batch.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Datasets the next [`BatchDriver::run`] would process.
    pub fn datasets(&self) -> Result<Vec<Dataset>, FspError> {
        discover_datasets(&self.config.base_dir, &self.config.dataset_prefix)
    }

    /// Processes every dataset once and collects the outcomes.
    ///
    /// Only a failure to scan the base directory is returned as an error;
    /// everything that goes wrong inside a dataset ends up in its report.
    pub fn run(&self) -> Result<BatchReport, FspError> {
        let datasets = self.datasets()?;
        info!(
            base_dir = %self.config.base_dir.display(),
            prefix = %self.config.dataset_prefix,
            count = datasets.len(),
            "processing datasets"
        );
        let reports = if self.config.concurrency <= 1 {
            datasets.iter().map(|dataset| self.process(dataset)).collect()
        } else {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.config.concurrency)
                .build()
                .map_err(|err| {
                    FspError::Config(ErrorInfo::new("thread_pool", err.to_string()))
                })?;
            pool.install(|| datasets.par_iter().map(|dataset| self.process(dataset)).collect())
        };
        let report = BatchReport::new(&self.config, reports);
        info!(summary = %report.summary_line(), "batch finished");
        Ok(report)
    }

    fn process(&self, dataset: &Dataset) -> DatasetReport {
        let sequencer = StageSequencer::new(&self.config, &self.runner);
        let report = match panic::catch_unwind(AssertUnwindSafe(|| sequencer.run(&dataset.path))) {
            Ok(report) => report,
            Err(payload) => panicked(dataset, payload),
        };
        match &report.outcome {
            DatasetOutcome::Success => info!(dataset = %dataset.name, "dataset complete"),
            DatasetOutcome::Skipped => info!(dataset = %dataset.name, "dataset already complete"),
            DatasetOutcome::PartialFailure { stage, cause } => warn!(
                dataset = %dataset.name,
                %stage,
                cause = %cause,
                "dataset incomplete"
            ),
        }
        report
    }
}

fn panicked(dataset: &Dataset, payload: Box<dyn std::any::Any + Send>) -> DatasetReport {
    let message = payload
        .downcast_ref::<&str>()
        .map(|message| message.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "panic".to_string());
    let error = FspError::Execution(
        ErrorInfo::new("dataset.panic", message).with_context("dataset", dataset.name.clone()),
    );
    DatasetReport::new(
        dataset.name.clone(),
        dataset.path.clone(),
        vec![StageReport {
            stage: StageId::Uniqueify,
            status: StageStatus::Failed { error },
        }],
    )
}
