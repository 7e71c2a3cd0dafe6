#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use fsp_exec::{RecordedCall, RecordingRunner};
use fsp_pipeline::{layout, PipelineConfig, WaitSpec};

/// Formats a fixed-column PDB coordinate record.
pub fn pdb_record(record: &str, serial: u32, resname: &str, occ: f64) -> String {
    format!(
        "{:<6}{:>5} {:<4}{:1}{:>3} {:1}{:>4}{:1}   {:>8.3}{:>8.3}{:>8.3}{:>6.2}{:>6.2}          {:>2}\n",
        record, serial, " C1", "", resname, "A", 1, "", 10.0, 0.0, 5.5, occ, 20.0, "C"
    )
}

/// Occupancy field of a record, columns 55-60.
pub fn occupancy_field(line: &str) -> &str {
    &line[54..60]
}

/// Model written by the fake molecular replacement tool: one protein atom and
/// two ligand atoms, all at zero occupancy.
pub fn phaser_model() -> String {
    let mut text = String::from("REMARK fake phaser model\n");
    text.push_str(&pdb_record("ATOM", 1, "ALA", 0.0));
    text.push_str(&pdb_record("HETATM", 2, "LIG", 0.0));
    text.push_str(&pdb_record("HETATM", 3, "LIG", 0.0));
    text.push_str("END\n");
    text
}

/// Model written by the fake refinement tool.
pub fn refined_model() -> String {
    let mut text = String::new();
    text.push_str(&pdb_record("ATOM", 1, "ALA", 0.0));
    text.push_str(&pdb_record("ATOM", 2, "ALA", 1.0));
    text.push_str(&pdb_record("HETATM", 3, "LIG", 0.0));
    text.push_str("END\n");
    text
}

/// Writes the files a real tool would leave behind for `call`.
pub fn simulate_tool(call: &RecordedCall) -> Result<(), String> {
    let write = |name: &str, contents: &str| {
        fs::write(call.cwd.join(name), contents).map_err(|err| err.to_string())
    };
    match call.spec.program() {
        "uniqueify" => write(layout::UNIQUEIFY_MTZ, "unique reflections"),
        "sh" => write(layout::CAD_MTZ, "combined reflections"),
        "phenix.phaser" => {
            write(layout::PHASER_PDB, &phaser_model())?;
            write(layout::PHASER_MTZ, "phased reflections")
        }
        "phenix.refine" => write(layout::REFINED_PDB, &refined_model()),
        other => Err(format!("{other}: command not found")),
    }
}

/// Runner that behaves like a complete tool installation.
pub fn fake_tools() -> RecordingRunner {
    RecordingRunner::scripted(simulate_tool)
}

/// Runner where `program` exits non-zero inside `dataset` and every other
/// invocation behaves normally.
pub fn fake_tools_failing(dataset: &'static str, program: &'static str) -> RecordingRunner {
    RecordingRunner::scripted(move |call| {
        let in_dataset = call.cwd.file_name().is_some_and(|name| name == dataset);
        if in_dataset && call.spec.program() == program {
            Err(format!("{program} exited with status 1"))
        } else {
            simulate_tool(call)
        }
    })
}

/// Configuration rooted at `base` that never sleeps while waiting.
pub fn fast_config(base: &Path) -> PipelineConfig {
    PipelineConfig {
        base_dir: base.to_path_buf(),
        wait: WaitSpec {
            timeout_secs: 0,
            interval_secs: 1,
        },
        ..PipelineConfig::default()
    }
}

/// Creates a dataset directory holding the raw inputs of a fresh collection.
pub fn dataset(base: &Path, name: &str) -> PathBuf {
    let dir = base.join(name);
    fs::create_dir_all(&dir).expect("dataset dir");
    fs::write(dir.join("a.mtz"), "raw reflections").expect("input mtz");
    fs::write(dir.join(layout::INPUT_PDB), phaser_model()).expect("input pdb");
    fs::write(dir.join(layout::LIGAND_CIF), "data_LIG\n").expect("ligand cif");
    dir
}

/// Every file under `dir` with its contents, sorted by path.
pub fn snapshot(dir: &Path) -> Vec<(PathBuf, Vec<u8>)> {
    let mut entries: Vec<(PathBuf, Vec<u8>)> = fs::read_dir(dir)
        .expect("read dir")
        .map(|entry| {
            let path = entry.expect("dir entry").path();
            let bytes = fs::read(&path).expect("read file");
            (path, bytes)
        })
        .collect();
    entries.sort();
    entries
}
