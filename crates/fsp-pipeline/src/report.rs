use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use fsp_core::errors::{ErrorInfo, FspError};
use fsp_core::provenance::RunProvenance;
use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;
use crate::serde::{from_json_slice, to_canonical_json_bytes};
use crate::stages::StageId;

/// Outcome of a single stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "kebab-case")]
pub enum StageStatus {
    /// The stage ran to completion.
    Completed {
        /// Short description of what was done.
        detail: String,
        /// Whether anything on disk changed.
        changed: bool,
    },
    /// Outputs were already present and the stage was not re-run.
    Resumed,
    /// Required inputs were missing, so nothing was executed.
    Skipped {
        /// Files that were absent.
        missing: Vec<String>,
    },
    /// The stage ran and failed.
    Failed {
        /// Structured cause.
        error: FspError,
    },
}

impl StageStatus {
    /// Returns true when the stage did its job, now or in a previous run.
    pub fn is_ok(&self) -> bool {
        matches!(self, StageStatus::Completed { .. } | StageStatus::Resumed)
    }

    /// Error equivalent of an unsuccessful status.
    pub fn cause(&self) -> Option<FspError> {
        match self {
            StageStatus::Completed { .. } | StageStatus::Resumed => None,
            StageStatus::Skipped { missing } => Some(FspError::FileNotReady(
                ErrorInfo::new("stage.inputs_missing", "missing necessary files")
                    .with_context("missing", missing.join(",")),
            )),
            StageStatus::Failed { error } => Some(error.clone()),
        }
    }
}

/// Report entry for a single stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageReport {
    /// Stage identifier.
    pub stage: StageId,
    /// Stage outcome.
    pub status: StageStatus,
}

/// Overall outcome of one dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "kebab-case")]
pub enum DatasetOutcome {
    /// Every stage completed.
    Success,
    /// At least one stage did not complete; `stage` is the first one.
    PartialFailure {
        /// First stage that did not complete.
        stage: StageId,
        /// Why it did not complete.
        cause: FspError,
    },
    /// Every stage was already complete from a previous run.
    Skipped,
}

impl DatasetOutcome {
    /// Derives the dataset outcome from its stage reports.
    pub fn from_stages(stages: &[StageReport]) -> Self {
        if let Some((stage, cause)) = stages
            .iter()
            .find_map(|report| report.status.cause().map(|cause| (report.stage, cause)))
        {
            return DatasetOutcome::PartialFailure { stage, cause };
        }
        let nothing_ran = stages.iter().all(|report| match &report.status {
            StageStatus::Resumed => true,
            StageStatus::Completed { changed, .. } => !changed,
            _ => false,
        });
        if !stages.is_empty() && nothing_ran {
            DatasetOutcome::Skipped
        } else {
            DatasetOutcome::Success
        }
    }

    /// Returns true for [`DatasetOutcome::PartialFailure`].
    pub fn is_failure(&self) -> bool {
        matches!(self, DatasetOutcome::PartialFailure { .. })
    }
}

/// Report for one dataset directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetReport {
    /// Directory name.
    pub name: String,
    /// Directory path.
    pub path: PathBuf,
    /// Overall outcome.
    pub outcome: DatasetOutcome,
    /// Stage outcomes in execution order.
    pub stages: Vec<StageReport>,
}

impl DatasetReport {
    /// Builds a report, deriving the outcome from the stages.
    pub fn new(name: impl Into<String>, path: PathBuf, stages: Vec<StageReport>) -> Self {
        Self {
            name: name.into(),
            path,
            outcome: DatasetOutcome::from_stages(&stages),
            stages,
        }
    }

    /// Status of `stage`, if it was attempted.
    pub fn stage(&self, stage: StageId) -> Option<&StageStatus> {
        self.stages
            .iter()
            .find(|report| report.stage == stage)
            .map(|report| &report.status)
    }
}

/// Dataset counts per outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BatchTotals {
    /// Datasets attempted.
    pub datasets: usize,
    /// Datasets whose stages all completed.
    pub succeeded: usize,
    /// Datasets with at least one incomplete stage.
    pub partial: usize,
    /// Datasets already complete from a previous run.
    pub skipped: usize,
}

/// Report of a whole batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    /// Directory that was scanned.
    pub base_dir: PathBuf,
    /// Prefix used to select datasets.
    pub dataset_prefix: String,
    /// Per-dataset reports in lexicographic order.
    pub datasets: Vec<DatasetReport>,
    /// Outcome counts.
    pub totals: BatchTotals,
    /// Provenance metadata describing the run.
    pub provenance: RunProvenance,
}

impl BatchReport {
    /// Constructs a report from its dataset entries.
    pub fn new(config: &PipelineConfig, mut datasets: Vec<DatasetReport>) -> Self {
        datasets.sort_by(|a, b| a.name.cmp(&b.name));
        let mut totals = BatchTotals {
            datasets: datasets.len(),
            ..BatchTotals::default()
        };
        for dataset in &datasets {
            match dataset.outcome {
                DatasetOutcome::Success => totals.succeeded += 1,
                DatasetOutcome::PartialFailure { .. } => totals.partial += 1,
                DatasetOutcome::Skipped => totals.skipped += 1,
            }
        }
        Self {
            base_dir: config.base_dir.clone(),
            dataset_prefix: config.dataset_prefix.clone(),
            datasets,
            totals,
            provenance: provenance(config),
        }
    }

    /// Returns true when any dataset did not complete.
    pub fn has_failures(&self) -> bool {
        self.totals.partial > 0
    }

    /// One-line summary for operators.
    pub fn summary_line(&self) -> String {
        format!(
            "{} datasets: {} succeeded, {} partial, {} already complete",
            self.totals.datasets, self.totals.succeeded, self.totals.partial, self.totals.skipped
        )
    }

    /// Writes the report as canonical JSON.
    pub fn write(&self, path: &Path) -> Result<(), FspError> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| FspError::io("report_dir", parent, err))?;
        }
        let bytes = to_canonical_json_bytes(self)?;
        fs::write(path, bytes).map_err(|err| FspError::io("report_write", path, err))
    }
}

/// Loads a report previously written by [`BatchReport::write`].
pub fn load_report(path: &Path) -> Result<BatchReport, FspError> {
    let bytes = fs::read(path).map_err(|err| FspError::io("report_read", path, err))?;
    from_json_slice(&bytes)
}

fn provenance(config: &PipelineConfig) -> RunProvenance {
    let mut versions = BTreeMap::new();
    versions.insert(
        "fsp-pipeline".to_string(),
        env!("CARGO_PKG_VERSION").to_string(),
    );
    RunProvenance {
        config_hash: config.config_hash().unwrap_or_default(),
        created_at: Utc::now().to_rfc3339(),
        tool_versions: versions,
    }
}
