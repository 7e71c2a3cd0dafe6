use std::path::Path;

use fsp_core::errors::{ErrorInfo, FspError};
use fsp_exec::{await_file, patch_occupancy, CommandRunner, PatchOutcome, Readiness, WaitPolicy};
use tracing::{error, info, info_span, warn};

use crate::config::PipelineConfig;
use crate::report::{DatasetReport, StageReport, StageStatus};
use crate::stages::{build_stage, stage_path, Requirement, Stage, StageAction, StageId};

/// Runs the fixed stage chain for one dataset directory.
///
/// A failing stage never aborts the chain. Later stages check their own
/// inputs and are skipped when a hard input is absent.
pub struct StageSequencer<'a> {
    config: &'a PipelineConfig,
    runner: &'a dyn CommandRunner,
}

impl<'a> StageSequencer<'a> {
    /// Creates a sequencer sharing the batch configuration and runner.
    pub fn new(config: &'a PipelineConfig, runner: &'a dyn CommandRunner) -> Self {
        Self { config, runner }
    }

    /// Runs every stage against `dataset` and reports each outcome.
    pub fn run(&self, dataset: &Path) -> DatasetReport {
        let name = dataset
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| dataset.display().to_string());
        let span = info_span!("dataset", name = %name);
        let _guard = span.enter();

        let stages = StageId::ORDER
            .into_iter()
            .map(|id| StageReport {
                stage: id,
                status: self.run_stage(dataset, id),
            })
            .collect();
        DatasetReport::new(name, dataset.to_path_buf(), stages)
    }

    /// Runs a single stage. Errors are folded into the returned status.
    pub fn run_stage(&self, dataset: &Path, id: StageId) -> StageStatus {
        let stage = match build_stage(self.config, dataset, id) {
            Ok(stage) => stage,
            Err(err) => {
                let err = err.with_context("stage", id.name());
                error!(stage = %id, error = %err, "stage could not be prepared");
                return StageStatus::Failed { error: err };
            }
        };

        if self.config.resume && self.outputs_present(dataset, &stage) {
            info!(stage = %id, "outputs already present, not re-running");
            return StageStatus::Resumed;
        }

        let missing = self.missing_inputs(dataset, &stage);
        let (hard, soft): (Vec<_>, Vec<_>) = missing
            .into_iter()
            .partition(|(_, requirement)| *requirement == Requirement::Hard);
        if !hard.is_empty() {
            let missing: Vec<String> = hard.into_iter().map(|(file, _)| file).collect();
            warn!(
                stage = %id,
                dataset = %dataset.display(),
                missing = %missing.join(", "),
                "missing necessary files, skipping stage"
            );
            return StageStatus::Skipped { missing };
        }
        for (file, _) in &soft {
            warn!(stage = %id, file = %file, "input not ready, proceeding anyway");
        }

        match &stage.action {
            StageAction::Command(spec) => {
                info!(stage = %id, command = %spec, "running stage");
                match self.runner.run(spec, dataset) {
                    Ok(success) => {
                        let absent: Vec<&String> = stage
                            .outputs
                            .iter()
                            .filter(|file| !stage_path(dataset, file).exists())
                            .collect();
                        if !absent.is_empty() {
                            warn!(stage = %id, ?absent, "command succeeded but outputs are missing");
                        }
                        info!(stage = %id, "successfully ran stage");
                        StageStatus::Completed {
                            detail: format!(
                                "ran `{}` in {:.1}s",
                                success.command,
                                success.elapsed.as_secs_f64()
                            ),
                            changed: true,
                        }
                    }
                    Err(err) => {
                        let err = err.with_context("stage", id.name());
                        error!(stage = %id, error = %err, "error running stage");
                        StageStatus::Failed { error: err }
                    }
                }
            }
            StageAction::Patch { file, rule } => {
                let path = stage_path(dataset, file);
                match patch_occupancy(&path, rule) {
                    Ok(PatchOutcome::Patched { lines_modified }) => StageStatus::Completed {
                        detail: format!("{lines_modified} lines modified"),
                        changed: lines_modified > 0,
                    },
                    Ok(PatchOutcome::FileNotFound) => StageStatus::Failed {
                        error: FspError::FileNotFound(
                            ErrorInfo::new("stage.patch_target", "file not found")
                                .with_path(&path)
                                .with_context("stage", id.name()),
                        ),
                    },
                    Err(err) => {
                        let err = err.with_context("stage", id.name());
                        error!(stage = %id, error = %err, "patch failed");
                        StageStatus::Failed { error: err }
                    }
                }
            }
        }
    }

    fn outputs_present(&self, dataset: &Path, stage: &Stage) -> bool {
        matches!(stage.action, StageAction::Command(_))
            && stage
                .outputs
                .iter()
                .all(|file| stage_path(dataset, file).exists())
    }

    /// Inputs that are not ready, with their requirement.
    ///
    /// Files written by an earlier stage are checked once: that stage has
    /// already returned, so its completion is the readiness signal. Files
    /// from outside the chain are polled with the stage's wait policy.
    fn missing_inputs(&self, dataset: &Path, stage: &Stage) -> Vec<(String, Requirement)> {
        let policy = self.config.wait_policy(stage.id);
        stage
            .inputs
            .iter()
            .filter(|input| {
                let path = stage_path(dataset, &input.file);
                let poll = input.producer.is_none() || self.config.poll_produced_files;
                let readiness = if poll {
                    await_file(&path, &policy)
                } else {
                    await_file(&path, &WaitPolicy::immediate())
                };
                readiness == Readiness::TimedOut
            })
            .map(|input| (input.file.clone(), input.requirement))
            .collect()
    }
}
