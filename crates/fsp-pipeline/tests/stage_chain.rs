mod common;

use std::fs;
use std::path::Path;
use std::thread;
use std::time::Duration;

use common::{dataset, fake_tools, fast_config};
use fsp_core::FspError;
use fsp_exec::{CommandSpec, RecordingRunner};
use fsp_pipeline::stages::{cad_script, refine_args};
use fsp_pipeline::{
    build_stage, find_input_mtz, layout, DatasetOutcome, StageAction, StageId, StageSequencer,
    StageStatus, WaitSpec,
};

#[test]
fn missing_ligand_dictionary_skips_refinement_only() {
    let base = tempfile::tempdir().expect("tmp dir");
    let dir = dataset(base.path(), "MyProtein-MyLibrary-7");
    fs::remove_file(dir.join(layout::LIGAND_CIF)).expect("remove cif");

    let config = fast_config(base.path());
    let runner = fake_tools();
    let report = StageSequencer::new(&config, &runner).run(&dir);

    assert_eq!(runner.programs(), vec!["uniqueify", "sh", "phenix.phaser"]);
    for stage in [StageId::Uniqueify, StageId::Cad, StageId::Phaser, StageId::OccupancyPatchPhased] {
        assert!(
            report.stage(stage).is_some_and(StageStatus::is_ok),
            "{stage} should complete"
        );
    }
    assert_eq!(
        report.stage(StageId::Refine),
        Some(&StageStatus::Skipped {
            missing: vec![layout::LIGAND_CIF.to_string()],
        })
    );
    match report.stage(StageId::OccupancyPatchRefined) {
        Some(StageStatus::Failed { error }) => {
            assert!(matches!(error, FspError::FileNotFound(_)));
            assert_eq!(error.info().code, "stage.patch_target");
        }
        other => panic!("unexpected status {other:?}"),
    }
    match &report.outcome {
        DatasetOutcome::PartialFailure { stage, cause } => {
            assert_eq!(*stage, StageId::Refine);
            assert!(matches!(cause, FspError::FileNotReady(_)));
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert!(!dir.join(layout::REFINED_PDB).exists());
}

#[test]
fn external_inputs_are_polled_until_they_appear() {
    let base = tempfile::tempdir().expect("tmp dir");
    let dir = dataset(base.path(), "MyProtein-MyLibrary-8");
    let cif = dir.join(layout::LIGAND_CIF);
    fs::remove_file(&cif).expect("remove cif");

    let mut config = fast_config(base.path());
    config.stage_waits.insert(
        StageId::Refine,
        WaitSpec {
            timeout_secs: 5,
            interval_secs: 1,
        },
    );
    let writer = thread::spawn(move || {
        thread::sleep(Duration::from_millis(200));
        fs::write(cif, "data_LIG\n").expect("write cif");
    });

    let runner = fake_tools();
    let report = StageSequencer::new(&config, &runner).run(&dir);
    writer.join().expect("writer thread");

    assert_eq!(report.outcome, DatasetOutcome::Success);
    assert!(runner.programs().contains(&"phenix.refine".to_string()));
}

#[test]
fn failed_command_does_not_abort_the_chain() {
    let base = tempfile::tempdir().expect("tmp dir");
    let dir = dataset(base.path(), "MyProtein-MyLibrary-9");
    let runner = RecordingRunner::scripted(|call| {
        if call.spec.program() == "phenix.phaser" {
            Err("no solution found".to_string())
        } else {
            common::simulate_tool(call)
        }
    });
    let config = fast_config(base.path());
    let report = StageSequencer::new(&config, &runner).run(&dir);

    assert_eq!(report.stages.len(), StageId::ORDER.len());
    assert!(matches!(report.stage(StageId::Phaser), Some(StageStatus::Failed { .. })));
    match report.stage(StageId::Refine) {
        Some(StageStatus::Skipped { missing }) => {
            assert_eq!(missing, &vec![layout::PHASER_MTZ.to_string(), layout::PHASER_PDB.to_string()]);
        }
        other => panic!("unexpected status {other:?}"),
    }
    assert_eq!(runner.programs(), vec!["uniqueify", "sh", "phenix.phaser"]);
}

#[test]
fn input_mtz_excludes_pipeline_products() {
    let dir = tempfile::tempdir().expect("tmp dir");
    for name in [
        "raw_data.mtz",
        layout::UNIQUEIFY_MTZ,
        layout::CAD_MTZ,
        layout::PHASER_MTZ,
        "PHASER.phenix_refine_001.mtz",
        "notes.txt",
    ] {
        fs::write(dir.path().join(name), "x").expect("write");
    }
    assert_eq!(find_input_mtz(dir.path()).expect("input"), "raw_data.mtz");
}

#[test]
fn input_mtz_must_be_unique() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let err = find_input_mtz(dir.path()).expect_err("no candidates");
    assert!(matches!(err, FspError::FileNotFound(_)));
    assert_eq!(err.info().code, "stage.input_mtz");

    fs::write(dir.path().join("a.mtz"), "x").expect("write");
    fs::write(dir.path().join("b.mtz"), "x").expect("write");
    let err = find_input_mtz(dir.path()).expect_err("two candidates");
    assert!(matches!(err, FspError::Config(_)));
    assert_eq!(err.info().context.get("candidates").map(String::as_str), Some("a.mtz,b.mtz"));
}

#[test]
fn ambiguous_input_fails_uniqueify_without_running_it() {
    let base = tempfile::tempdir().expect("tmp dir");
    let dir = dataset(base.path(), "MyProtein-MyLibrary-3");
    fs::write(dir.join("b.mtz"), "second collection").expect("write");

    let config = fast_config(base.path());
    let runner = RecordingRunner::succeeding();
    let status = StageSequencer::new(&config, &runner).run_stage(&dir, StageId::Uniqueify);
    match status {
        StageStatus::Failed { error } => {
            assert_eq!(error.info().code, "stage.ambiguous_input");
            assert_eq!(error.info().context.get("stage").map(String::as_str), Some("uniqueify"));
        }
        other => panic!("unexpected status {other:?}"),
    }
    assert!(runner.calls().is_empty());
}

#[test]
fn cad_is_driven_through_a_here_document() {
    let config = fast_config(Path::new("/data"));
    let stage = build_stage(&config, Path::new("/data/MyProtein-MyLibrary-42"), StageId::Cad)
        .expect("cad stage");
    assert_eq!(
        stage.action,
        StageAction::Command(CommandSpec::shell_with("sh", cad_script("cad")))
    );
    let script = cad_script("cad");
    let lines: Vec<&str> = script.lines().map(str::trim).collect();
    assert_eq!(
        lines,
        vec![
            "cad hklin1 output-uniqueify.mtz hklout output-cad.mtz <<eof",
            "monitor BRIEF",
            "labin file 1 E1=I(+) E2=SIGI(+) E3=I(-) E4=SIGI(-) E5=FreeRflag",
            "resolution file 1 999.0 1",
            "eof",
        ]
    );
}

#[test]
fn refine_arguments_use_absolute_paths() {
    let config = fast_config(Path::new("/data"));
    let args = refine_args(&config, Path::new("/data/MyProtein-MyLibrary-42"));
    assert_eq!(
        args,
        vec![
            "/data/MyProtein-MyLibrary-42/PHASER.mtz",
            "/data/MyProtein-MyLibrary-42/PHASER.pdb",
            "/data/MyProtein-MyLibrary-42/input.ligands.cif",
            "xray_data.low_resolution=75",
            "xray_data.r_free_flags.generate=True",
            "xray_data.r_free_flags.fraction=0.05",
            "xray_data.r_free_flags.max_free=500",
            "refinement.refine.occupancies.individual=\"element C or element O or element N or element S or element P\"",
            "output.prefix=/data/MyProtein-MyLibrary-42/PHASER.phenix_refine",
        ]
    );
}

#[test]
fn phaser_writes_into_the_dataset() {
    let config = fast_config(Path::new("/data"));
    let stage = build_stage(&config, Path::new("/data/MyProtein-MyLibrary-42"), StageId::Phaser)
        .expect("phaser stage");
    assert_eq!(
        stage.action,
        StageAction::Command(CommandSpec::argv(
            "phenix.phaser",
            [
                "hklin",
                "output-cad.mtz",
                "model",
                "input.pdb",
                "phaser.mode=MR_AUTO",
                "output.prefix=PHASER",
                "output.dir=/data/MyProtein-MyLibrary-42",
            ],
        ))
    );
    assert_eq!(stage.outputs, vec![layout::PHASER_PDB, layout::PHASER_MTZ]);
}

#[test]
fn relative_dataset_paths_are_resolved_for_tools() {
    let cwd = std::env::current_dir().expect("cwd");
    let args = refine_args(
        &fast_config(Path::new("data")),
        Path::new("data/MyProtein-MyLibrary-1"),
    );
    let dataset = cwd.join("data/MyProtein-MyLibrary-1");
    assert_eq!(args[0], dataset.join("PHASER.mtz").display().to_string());
    assert_eq!(
        args[8],
        format!("output.prefix={}", dataset.join("PHASER.phenix_refine").display())
    );
}

#[test]
fn relative_base_dir_runs_the_whole_chain() {
    let scratch = tempfile::Builder::new()
        .prefix("fsp-relative")
        .tempdir_in(".")
        .expect("tmp dir in working directory");
    let cwd = std::env::current_dir().expect("cwd");
    let base = scratch
        .path()
        .strip_prefix(&cwd)
        .unwrap_or(scratch.path())
        .to_path_buf();
    assert!(base.is_relative());
    let dir = dataset(&base, "MyProtein-MyLibrary-1");

    let runner = RecordingRunner::scripted(|call| {
        if let CommandSpec::Argv { program, args } = &call.spec {
            let paths: Vec<&String> = match program.as_str() {
                "phenix.refine" => args.iter().take(3).collect(),
                _ => Vec::new(),
            };
            for path in paths {
                if !Path::new(path).is_absolute() || !Path::new(path).is_file() {
                    return Err(format!("no such file: {path}"));
                }
            }
            if let Some(out) = args.iter().find_map(|arg| arg.strip_prefix("output.dir=")) {
                if !Path::new(out).is_absolute() || !Path::new(out).is_dir() {
                    return Err(format!("no such directory: {out}"));
                }
            }
        }
        common::simulate_tool(call)
    });
    let config = fast_config(&base);
    let report = StageSequencer::new(&config, &runner).run(&dir);

    assert_eq!(report.outcome, DatasetOutcome::Success);
    assert_eq!(
        runner.programs(),
        vec!["uniqueify", "sh", "phenix.phaser", "phenix.refine"]
    );
}
