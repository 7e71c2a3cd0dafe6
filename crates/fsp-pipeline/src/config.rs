use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use fsp_core::errors::{ErrorInfo, FspError};
use fsp_exec::{OccupancyPatchRule, WaitPolicy};
use serde::{Deserialize, Serialize};

use crate::hash::stable_hash_string;
use crate::serde::{from_yaml_slice, to_yaml_string};
use crate::stages::StageId;

fn config_error(code: &str, message: impl Into<String>) -> FspError {
    FspError::Config(ErrorInfo::new(code, message))
}

/// Readiness polling parameters expressed in whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitSpec {
    /// Maximum time to wait for a file, in seconds.
    pub timeout_secs: u64,
    /// Sleep between two existence checks, in seconds.
    pub interval_secs: u64,
}

impl Default for WaitSpec {
    fn default() -> Self {
        Self {
            timeout_secs: 300,
            interval_secs: 5,
        }
    }
}

impl WaitSpec {
    /// Converts the spec into the polling policy used by the waiter.
    pub fn policy(&self) -> WaitPolicy {
        WaitPolicy::from_secs(self.timeout_secs, self.interval_secs)
    }
}

/// Program names for the external crystallographic tools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolSpec {
    /// Reflection uniqueification tool.
    pub uniqueify: String,
    /// Reflection file combination tool, driven through a shell here-document.
    pub cad: String,
    /// Molecular replacement tool.
    pub phaser: String,
    /// Refinement tool.
    pub refine: String,
    /// Shell used for here-document commands.
    pub shell: String,
}

impl Default for ToolSpec {
    fn default() -> Self {
        Self {
            uniqueify: "uniqueify".to_string(),
            cad: "cad".to_string(),
            phaser: "phenix.phaser".to_string(),
            refine: "phenix.refine".to_string(),
            shell: "sh".to_string(),
        }
    }
}

/// Fixed refinement parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefineSpec {
    /// Low-resolution cutoff in Angstrom.
    pub low_resolution: f64,
    /// Fraction of reflections flagged free when generating flags.
    pub free_fraction: f64,
    /// Cap on the number of free reflections.
    pub max_free: u32,
    /// Elements whose occupancies are refined individually.
    pub occupancy_elements: Vec<String>,
}

impl Default for RefineSpec {
    fn default() -> Self {
        Self {
            low_resolution: 75.0,
            free_fraction: 0.05,
            max_free: 500,
            occupancy_elements: ["C", "O", "N", "S", "P"]
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }
}

/// Replacement literals written by the two occupancy passes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OccupancySpec {
    /// Occupancy written after molecular replacement.
    pub phased: String,
    /// Occupancy written after refinement.
    pub refined: String,
}

impl Default for OccupancySpec {
    fn default() -> Self {
        Self {
            phased: "0.50".to_string(),
            refined: "0.01".to_string(),
        }
    }
}

impl OccupancySpec {
    /// Rule applied to the molecular replacement model.
    pub fn phased_rule(&self) -> OccupancyPatchRule {
        OccupancyPatchRule::phased(self.phased.clone())
    }

    /// Rule applied to the refined model.
    pub fn refined_rule(&self) -> OccupancyPatchRule {
        OccupancyPatchRule::refined(self.refined.clone())
    }
}

/// Complete configuration of a batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory whose immediate children are candidate datasets.
    pub base_dir: PathBuf,
    /// Name prefix a child directory must carry to be processed.
    pub dataset_prefix: String,
    /// Default readiness policy for every stage.
    pub wait: WaitSpec,
    /// Per-stage readiness overrides.
    pub stage_waits: BTreeMap<StageId, WaitSpec>,
    /// Also poll for files written by earlier stages, for tool wrappers that
    /// return before the tool has finished.
    pub poll_produced_files: bool,
    /// External tool program names.
    pub tools: ToolSpec,
    /// Refinement parameters.
    pub refine: RefineSpec,
    /// Occupancy replacement literals.
    pub occupancy: OccupancySpec,
    /// Skip command stages whose outputs already exist.
    pub resume: bool,
    /// Number of datasets processed at once.
    pub concurrency: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("/home/user/Fragment-screening/"),
            dataset_prefix: "MyProtein-MyLibrary-".to_string(),
            wait: WaitSpec::default(),
            stage_waits: BTreeMap::new(),
            poll_produced_files: false,
            tools: ToolSpec::default(),
            refine: RefineSpec::default(),
            occupancy: OccupancySpec::default(),
            resume: false,
            concurrency: 1,
        }
    }
}

impl PipelineConfig {
    /// Readiness policy for `stage`, honouring per-stage overrides.
    pub fn wait_policy(&self, stage: StageId) -> WaitPolicy {
        self.stage_waits
            .get(&stage)
            .copied()
            .unwrap_or(self.wait)
            .policy()
    }

    /// Checks the invariants the pipeline relies on.
    pub fn validate(&self) -> Result<(), FspError> {
        if self.dataset_prefix.is_empty() {
            return Err(config_error("config.dataset_prefix", "dataset prefix must not be empty")
                .with_context("field", "dataset_prefix"));
        }
        let waits = std::iter::once((None, &self.wait))
            .chain(self.stage_waits.iter().map(|(stage, wait)| (Some(*stage), wait)));
        for (stage, wait) in waits {
            if wait.interval_secs == 0 {
                let err = config_error("config.wait_interval", "poll interval must be positive")
                    .with_context("field", "interval_secs");
                return Err(match stage {
                    Some(stage) => err.with_context("stage", stage.name()),
                    None => err,
                });
            }
        }
        if self.concurrency == 0 {
            return Err(config_error("config.concurrency", "concurrency must be at least 1")
                .with_context("field", "concurrency"));
        }
        if self.refine.occupancy_elements.is_empty() {
            return Err(config_error(
                "config.occupancy_elements",
                "at least one element is required for occupancy refinement",
            ));
        }
        if !(0.0..1.0).contains(&self.refine.free_fraction) {
            return Err(config_error("config.free_fraction", "free fraction must be in [0, 1)")
                .with_context("value", self.refine.free_fraction.to_string()));
        }
        self.occupancy.phased_rule().validate()?;
        self.occupancy.refined_rule().validate()?;
        Ok(())
    }

    /// Returns the deterministic hash associated with the configuration.
    pub fn config_hash(&self) -> Result<String, FspError> {
        stable_hash_string(self)
    }

    /// Produces a YAML representation of the configuration.
    pub fn to_yaml_string(&self) -> Result<String, FspError> {
        to_yaml_string(self)
    }
}

/// Loads and validates a configuration file. Missing fields take defaults.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<PipelineConfig, FspError> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|err| FspError::io("config_read", path, err))?;
    let config: PipelineConfig =
        from_yaml_slice(&bytes).map_err(|err| err.with_context("file", path.display().to_string()))?;
    config.validate()?;
    Ok(config)
}
