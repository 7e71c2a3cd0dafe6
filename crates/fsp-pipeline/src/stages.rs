use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use fsp_core::errors::{ErrorInfo, FspError};
use fsp_exec::{CommandSpec, OccupancyPatchRule};
use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;

/// Fixed file names inside a dataset directory.
pub mod layout {
    /// Search model for molecular replacement.
    pub const INPUT_PDB: &str = "input.pdb";
    /// Ligand restraint dictionary.
    pub const LIGAND_CIF: &str = "input.ligands.cif";
    /// Output of the uniqueify stage.
    pub const UNIQUEIFY_MTZ: &str = "output-uniqueify.mtz";
    /// Output of the cad stage.
    pub const CAD_MTZ: &str = "output-cad.mtz";
    /// Output prefix handed to phaser.
    pub const PHASER_PREFIX: &str = "PHASER";
    /// Molecular replacement model.
    pub const PHASER_PDB: &str = "PHASER.pdb";
    /// Molecular replacement reflections.
    pub const PHASER_MTZ: &str = "PHASER.mtz";
    /// Output prefix handed to the refinement tool.
    pub const REFINE_PREFIX: &str = "PHASER.phenix_refine";
    /// First refined model.
    pub const REFINED_PDB: &str = "PHASER.phenix_refine_001.pdb";
}

/// Identifier of a pipeline stage, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StageId {
    /// Reflection uniqueification.
    #[serde(rename = "uniqueify")]
    Uniqueify,
    /// Reflection label combination.
    #[serde(rename = "cad")]
    Cad,
    /// Molecular replacement.
    #[serde(rename = "phaser")]
    Phaser,
    /// Ligand occupancies in the molecular replacement model.
    #[serde(rename = "occupancy-patch-1")]
    OccupancyPatchPhased,
    /// Refinement.
    #[serde(rename = "refine")]
    Refine,
    /// Zero occupancies in the refined model.
    #[serde(rename = "occupancy-patch-2")]
    OccupancyPatchRefined,
}

impl StageId {
    /// Every stage in execution order.
    pub const ORDER: [StageId; 6] = [
        StageId::Uniqueify,
        StageId::Cad,
        StageId::Phaser,
        StageId::OccupancyPatchPhased,
        StageId::Refine,
        StageId::OccupancyPatchRefined,
    ];

    /// Stable name used in logs, reports and configuration keys.
    pub fn name(self) -> &'static str {
        match self {
            StageId::Uniqueify => "uniqueify",
            StageId::Cad => "cad",
            StageId::Phaser => "phaser",
            StageId::OccupancyPatchPhased => "occupancy-patch-1",
            StageId::Refine => "refine",
            StageId::OccupancyPatchRefined => "occupancy-patch-2",
        }
    }

    /// Parses a stage name as produced by [`StageId::name`].
    pub fn from_name(name: &str) -> Option<StageId> {
        StageId::ORDER.into_iter().find(|stage| stage.name() == name)
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How strictly a stage depends on one of its inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    /// The stage cannot run without the file.
    Hard,
    /// The stage runs anyway and reports the absence.
    Soft,
}

/// A file a stage consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageInput {
    /// File name relative to the dataset directory.
    pub file: String,
    /// Stage of the chain that writes the file, if any.
    pub producer: Option<StageId>,
    /// Whether absence prevents the stage from running.
    pub requirement: Requirement,
}

impl StageInput {
    fn hard(file: impl Into<String>, producer: Option<StageId>) -> Self {
        Self {
            file: file.into(),
            producer,
            requirement: Requirement::Hard,
        }
    }

    fn soft(file: impl Into<String>, producer: Option<StageId>) -> Self {
        Self {
            file: file.into(),
            producer,
            requirement: Requirement::Soft,
        }
    }
}

/// Work performed by a stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageAction {
    /// Invoke an external tool.
    Command(CommandSpec),
    /// Rewrite occupancies of a coordinate file in place.
    Patch {
        /// File name relative to the dataset directory.
        file: String,
        /// Substitution applied to the file.
        rule: OccupancyPatchRule,
    },
}

/// Fully resolved stage for one dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    /// Stage identifier.
    pub id: StageId,
    /// Work to perform.
    pub action: StageAction,
    /// Files consumed by the stage.
    pub inputs: Vec<StageInput>,
    /// Files the stage is expected to produce.
    pub outputs: Vec<String>,
}

/// Returns true for `.mtz` files written by the pipeline itself.
pub fn is_pipeline_product(name: &str) -> bool {
    name == layout::UNIQUEIFY_MTZ
        || name == layout::CAD_MTZ
        || name.starts_with(&format!("{}.", layout::PHASER_PREFIX))
}

/// Finds the single raw `.mtz` file of a dataset.
pub fn find_input_mtz(dataset: &Path) -> Result<String, FspError> {
    let entries = fs::read_dir(dataset).map_err(|err| FspError::io("dataset_read", dataset, err))?;
    let mut candidates = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| FspError::io("dataset_read", dataset, err))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let is_mtz = Path::new(&name)
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("mtz"));
        if is_mtz && !is_pipeline_product(&name) && entry.path().is_file() {
            candidates.push(name);
        }
    }
    candidates.sort();
    match candidates.len() {
        1 => Ok(candidates.remove(0)),
        0 => Err(FspError::FileNotFound(
            ErrorInfo::new("stage.input_mtz", "no input .mtz file in dataset")
                .with_path(dataset)
                .with_hint("place exactly one raw reflection file in the dataset directory"),
        )),
        _ => Err(FspError::Config(
            ErrorInfo::new("stage.ambiguous_input", "more than one input .mtz file in dataset")
                .with_path(dataset)
                .with_context("candidates", candidates.join(",")),
        )),
    }
}

fn uniqueify(config: &PipelineConfig, input_mtz: &str) -> Stage {
    Stage {
        id: StageId::Uniqueify,
        action: StageAction::Command(CommandSpec::argv(
            config.tools.uniqueify.clone(),
            ["-s", input_mtz, layout::UNIQUEIFY_MTZ],
        )),
        inputs: vec![StageInput::hard(input_mtz, None)],
        outputs: vec![layout::UNIQUEIFY_MTZ.to_string()],
    }
}

/// Here-document script fed to cad.
pub fn cad_script(program: &str) -> String {
    format!(
        "{program} hklin1 {input} hklout {output} <<eof\n\
         monitor BRIEF\n\
         labin file 1 E1=I(+) E2=SIGI(+) E3=I(-) E4=SIGI(-) E5=FreeRflag\n\
         resolution file 1 999.0 1\n\
         eof",
        input = layout::UNIQUEIFY_MTZ,
        output = layout::CAD_MTZ,
    )
}

fn cad(config: &PipelineConfig) -> Stage {
    Stage {
        id: StageId::Cad,
        action: StageAction::Command(CommandSpec::shell_with(
            config.tools.shell.clone(),
            cad_script(&config.tools.cad),
        )),
        inputs: vec![StageInput::hard(layout::UNIQUEIFY_MTZ, Some(StageId::Uniqueify))],
        outputs: vec![layout::CAD_MTZ.to_string()],
    }
}

fn phaser(config: &PipelineConfig, dataset: &Path) -> Stage {
    Stage {
        id: StageId::Phaser,
        action: StageAction::Command(CommandSpec::argv(
            config.tools.phaser.clone(),
            [
                "hklin".to_string(),
                layout::CAD_MTZ.to_string(),
                "model".to_string(),
                layout::INPUT_PDB.to_string(),
                "phaser.mode=MR_AUTO".to_string(),
                format!("output.prefix={}", layout::PHASER_PREFIX),
                format!("output.dir={}", absolute_dir(dataset).display()),
            ],
        )),
        inputs: vec![
            StageInput::hard(layout::CAD_MTZ, Some(StageId::Cad)),
            StageInput::hard(layout::INPUT_PDB, None),
        ],
        outputs: vec![layout::PHASER_PDB.to_string(), layout::PHASER_MTZ.to_string()],
    }
}

fn occupancy_phased(config: &PipelineConfig) -> Stage {
    Stage {
        id: StageId::OccupancyPatchPhased,
        action: StageAction::Patch {
            file: layout::PHASER_PDB.to_string(),
            rule: config.occupancy.phased_rule(),
        },
        inputs: vec![StageInput::soft(layout::PHASER_PDB, Some(StageId::Phaser))],
        outputs: vec![layout::PHASER_PDB.to_string()],
    }
}

/// Argument vector passed to the refinement tool.
///
/// Paths are absolute: the tool runs inside the dataset directory, where a
/// relative `dataset` would no longer resolve.
pub fn refine_args(config: &PipelineConfig, dataset: &Path) -> Vec<String> {
    let spec = &config.refine;
    let elements = spec
        .occupancy_elements
        .iter()
        .map(|element| format!("element {element}"))
        .collect::<Vec<_>>()
        .join(" or ");
    vec![
        path_arg(dataset, layout::PHASER_MTZ),
        path_arg(dataset, layout::PHASER_PDB),
        path_arg(dataset, layout::LIGAND_CIF),
        format!("xray_data.low_resolution={}", spec.low_resolution),
        "xray_data.r_free_flags.generate=True".to_string(),
        format!("xray_data.r_free_flags.fraction={}", spec.free_fraction),
        format!("xray_data.r_free_flags.max_free={}", spec.max_free),
        format!("refinement.refine.occupancies.individual=\"{elements}\""),
        format!("output.prefix={}", path_arg(dataset, layout::REFINE_PREFIX)),
    ]
}

fn path_arg(dataset: &Path, file: &str) -> String {
    absolute_dir(dataset).join(file).display().to_string()
}

fn absolute_dir(dataset: &Path) -> PathBuf {
    std::path::absolute(dataset).unwrap_or_else(|_| dataset.to_path_buf())
}

fn refine(config: &PipelineConfig, dataset: &Path) -> Stage {
    Stage {
        id: StageId::Refine,
        action: StageAction::Command(CommandSpec::argv(
            config.tools.refine.clone(),
            refine_args(config, dataset),
        )),
        inputs: vec![
            StageInput::hard(layout::PHASER_MTZ, Some(StageId::Phaser)),
            StageInput::hard(layout::PHASER_PDB, Some(StageId::Phaser)),
            StageInput::hard(layout::LIGAND_CIF, None),
        ],
        outputs: vec![layout::REFINED_PDB.to_string()],
    }
}

fn occupancy_refined(config: &PipelineConfig) -> Stage {
    Stage {
        id: StageId::OccupancyPatchRefined,
        action: StageAction::Patch {
            file: layout::REFINED_PDB.to_string(),
            rule: config.occupancy.refined_rule(),
        },
        inputs: vec![StageInput::soft(layout::REFINED_PDB, Some(StageId::Refine))],
        outputs: vec![layout::REFINED_PDB.to_string()],
    }
}

/// Resolves `id` for the dataset at `dataset`.
///
/// Only the uniqueify stage can fail to resolve, when the dataset does not
/// hold exactly one raw `.mtz` file.
pub fn build_stage(config: &PipelineConfig, dataset: &Path, id: StageId) -> Result<Stage, FspError> {
    Ok(match id {
        StageId::Uniqueify => uniqueify(config, &find_input_mtz(dataset)?),
        StageId::Cad => cad(config),
        StageId::Phaser => phaser(config, dataset),
        StageId::OccupancyPatchPhased => occupancy_phased(config),
        StageId::Refine => refine(config, dataset),
        StageId::OccupancyPatchRefined => occupancy_refined(config),
    })
}

/// Absolute location of a stage file.
pub fn stage_path(dataset: &Path, file: &str) -> PathBuf {
    dataset.join(file)
}
