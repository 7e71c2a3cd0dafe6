#![deny(missing_docs)]
#![doc = "Stage sequencing and batch driving for fragment-screening datasets."]

/// Dataset discovery and the batch driver.
pub mod batch;
/// Pipeline configuration loading and validation.
pub mod config;
/// Canonical hashing helpers.
pub mod hash;
/// Typed stage, dataset and batch reports.
pub mod report;
/// Per-dataset stage chain.
pub mod sequencer;
/// Canonical JSON and YAML serde helpers.
pub mod serde;
/// Stage definitions and the dataset file layout.
pub mod stages;

pub use batch::{discover_datasets, BatchDriver, Dataset};
pub use config::{load_config, OccupancySpec, PipelineConfig, RefineSpec, ToolSpec, WaitSpec};
pub use report::{
    load_report, BatchReport, BatchTotals, DatasetOutcome, DatasetReport, StageReport, StageStatus,
};
pub use sequencer::StageSequencer;
pub use stages::{build_stage, find_input_mtz, layout, Requirement, Stage, StageAction, StageId};
