// Pipeline orchestrator: manages the lifecycle of one extraction run
//
// Collects the cohort, owns the pose estimator(s) for the duration of the run,
// fans patients out over worker threads when asked to, and persists the table
// and the run report.

use crate::pipeline::cohort::collect_cohort;
use crate::pipeline::extraction::{extract_landmarks, extract_patient, ExtractionContext};
use crate::pipeline::finalize::save_table;
use crate::pipeline::types::{Cohort, LandmarkRow, WarningLog};
use crate::pose::{ImageSource, PoseEstimator};
use crate::run_context::{report_path, DatasetLayout, RunReport};
use anyhow::{anyhow, Context, Result};
use crossbeam::channel;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::thread;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub layout: DatasetLayout,
    pub action_id: String,
    pub output_path: PathBuf,
    /// Patients processed concurrently; 1 keeps everything on the calling thread.
    pub workers: usize,
}

/// Run the whole pipeline for one action.
///
/// `make_estimator` is called once per worker, and every estimator is built
/// before the first frame is touched. Its failure aborts the run; everything
/// else degrades to warnings in the returned report. Estimators are dropped
/// before this returns, on every path.
pub fn run_pipeline<S, E, F>(config: &PipelineConfig, source: &S, make_estimator: F) -> Result<RunReport>
where
    S: ImageSource + Sync,
    E: PoseEstimator<Image = S::Image> + Send,
    F: Fn() -> Result<E>,
{
    let mut report = RunReport::new(&config.layout, &config.action_id, &config.output_path);
    let mut warnings = WarningLog::new();

    let cohort = collect_cohort(&config.layout, &config.action_id, &mut warnings);
    report.record_cohort(&cohort);

    let total_frames: usize = cohort.values().map(|frames| frames.len()).sum();
    tracing::info!(
        "Selected {} frames across {} patients for action {}",
        total_frames,
        cohort.len(),
        config.action_id
    );

    let progress = ProgressBar::new(total_frames as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec:.1.yellow} frames, {eta})")?
            .progress_chars("#>-"),
    );

    let ctx = ExtractionContext {
        layout: &config.layout,
        action_id: &config.action_id,
        progress: &progress,
    };

    let rows = if config.workers <= 1 {
        let mut estimator = make_estimator().context("Failed to initialize pose estimator")?;
        extract_landmarks(&ctx, &cohort, source, &mut estimator, &mut warnings)
    } else {
        let workers = config.workers.min(cohort.len()).max(1);
        let estimators = (0..workers)
            .map(|worker_id| {
                make_estimator().with_context(|| {
                    format!("Failed to initialize pose estimator for worker {}", worker_id)
                })
            })
            .collect::<Result<Vec<E>>>()?;
        extract_parallel(&ctx, &cohort, source, estimators, &mut warnings)?
    };
    progress.finish_with_message("Done");

    for row in &rows {
        report.record_rows(&row.patient_id, 1);
    }
    report.warnings = warnings;

    save_table(&config.output_path, &rows)?;
    write_report(&report, &config.output_path)?;

    tracing::info!(
        "Finished {}: {} rows, {} warnings",
        config.action_id,
        report.total_rows,
        report.warnings.len()
    );
    Ok(report)
}

fn write_report(report: &RunReport, output_path: &Path) -> Result<()> {
    let path = report_path(output_path);
    report.write(&path)?;
    tracing::info!("Run report written to {:?}", path);
    Ok(())
}

type PatientResult = (usize, Vec<LandmarkRow>, WarningLog);

/// Distribute patients over one thread per estimator.
///
/// Results are reassembled in cohort order, so the rows and the warning log are
/// identical to a sequential run.
fn extract_parallel<S, E>(
    ctx: &ExtractionContext<'_>,
    cohort: &Cohort,
    source: &S,
    estimators: Vec<E>,
    warnings: &mut WarningLog,
) -> Result<Vec<LandmarkRow>>
where
    S: ImageSource + Sync,
    E: PoseEstimator<Image = S::Image> + Send,
{
    let jobs: Vec<(&String, &Vec<PathBuf>)> = cohort.iter().collect();

    let (job_tx, job_rx) = channel::unbounded::<usize>();
    for idx in 0..jobs.len() {
        job_tx.send(idx)?;
    }
    drop(job_tx);

    let (result_tx, result_rx) = channel::unbounded::<PatientResult>();

    let outcomes: Vec<Result<()>> = thread::scope(|s| {
        let handles: Vec<_> = estimators
            .into_iter()
            .enumerate()
            .map(|(worker_id, mut estimator)| {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                let jobs = &jobs;
                s.spawn(move || -> Result<()> {
                    for idx in job_rx {
                        let (patient_id, frames) = jobs[idx];
                        let mut log = WarningLog::new();
                        let rows =
                            extract_patient(ctx, patient_id, frames, source, &mut estimator, &mut log);
                        if result_tx.send((idx, rows, log)).is_err() {
                            break; // Receiver closed
                        }
                    }

                    tracing::debug!("Extraction worker {} exiting", worker_id);
                    Ok(())
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| {
                h.join()
                    .unwrap_or_else(|_| Err(anyhow!("Extraction worker panicked")))
            })
            .collect()
    });
    drop(result_tx);

    for outcome in outcomes {
        outcome?;
    }

    let mut slots: Vec<Option<(Vec<LandmarkRow>, WarningLog)>> =
        (0..jobs.len()).map(|_| None).collect();
    for (idx, rows, log) in result_rx {
        slots[idx] = Some((rows, log));
    }

    let mut all_rows = Vec::new();
    for (slot, (patient_id, _)) in slots.into_iter().zip(&jobs) {
        let (rows, log) = slot.ok_or_else(|| anyhow!("No result for patient {}", patient_id))?;
        all_rows.extend(rows);
        warnings.extend(log);
    }
    Ok(all_rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::extraction::tests::{FakeEstimator, FakeImageSource};
    use crate::pipeline::selector::tests::{layout, make_patient};
    use crate::pipeline::types::Warning;
    use std::collections::HashSet;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const INTERVAL: &str = "P2_3,11-22-38.0,11-22-40.2,ok,done\n";

    fn build_dataset(root: &Path) {
        make_patient(
            root,
            "Patient_01",
            Some(INTERVAL),
            &["11-22-37.9", "11-22-38.0", "11-22-39.5", "11-22-40.2", "11-22-41.0"],
        );
        make_patient(
            root,
            "Patient_02",
            Some("P1_1,11-22-38.0,11-22-40.2,ok,done\n"),
            &["11-22-39.0"],
        );
        make_patient(root, "Patient_03", Some(INTERVAL), &["11-22-38.5", "11-22-39.1"]);
        make_patient(root, "Patient_04", Some(INTERVAL), &["11-22-39.9"]);
    }

    fn config(root: &Path, output: &str, workers: usize) -> PipelineConfig {
        PipelineConfig {
            layout: layout(root),
            action_id: "P2_3".to_string(),
            output_path: root.join(output),
            workers,
        }
    }

    fn blind_estimator() -> Result<FakeEstimator> {
        Ok(FakeEstimator {
            blind_for: HashSet::from(["Patient_03".to_string()]),
            ..Default::default()
        })
    }

    #[test]
    fn test_run_pipeline_end_to_end() {
        let root = tempfile::tempdir().unwrap();
        build_dataset(root.path());
        let config = config(root.path(), "out/P2_3_skeleton.csv", 1);

        let report = run_pipeline(&config, &FakeImageSource::default(), blind_estimator).unwrap();

        assert_eq!(report.total_rows, 4);
        assert_eq!(report.patients["Patient_01"].selected_frames, 3);
        assert_eq!(report.patients["Patient_01"].rows, 3);
        assert_eq!(report.patients["Patient_02"].selected_frames, 0);
        assert_eq!(report.patients["Patient_03"].selected_frames, 2);
        assert_eq!(report.patients["Patient_03"].rows, 0);
        assert_eq!(report.patients["Patient_04"].rows, 1);
        assert!(report
            .warnings
            .entries()
            .iter()
            .any(|w| matches!(w, Warning::NoMatchingAction { patient_id, .. } if patient_id == "Patient_02")));

        let table = fs::read_to_string(&config.output_path).unwrap();
        assert_eq!(table.lines().count(), 5);
        assert!(table.lines().skip(1).all(|l| l.starts_with("Patient_01,P2_3,0,2,")
            || l.starts_with("Patient_04,P2_3,0,2,")));

        let report_json = fs::read_to_string(root.path().join("out/P2_3_skeleton_report.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&report_json).unwrap();
        assert_eq!(value["total_rows"], 4);
        assert_eq!(value["warnings"][0]["kind"], "no_matching_action");
    }

    #[test]
    fn test_repeated_runs_are_byte_identical() {
        let root = tempfile::tempdir().unwrap();
        build_dataset(root.path());

        let first = config(root.path(), "first.csv", 1);
        let second = config(root.path(), "second.csv", 1);
        run_pipeline(&first, &FakeImageSource::default(), blind_estimator).unwrap();
        run_pipeline(&second, &FakeImageSource::default(), blind_estimator).unwrap();

        assert_eq!(
            fs::read(&first.output_path).unwrap(),
            fs::read(&second.output_path).unwrap()
        );
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let root = tempfile::tempdir().unwrap();
        build_dataset(root.path());

        let sequential = config(root.path(), "sequential.csv", 1);
        let parallel = config(root.path(), "parallel.csv", 3);
        let seq_report =
            run_pipeline(&sequential, &FakeImageSource::default(), blind_estimator).unwrap();
        let par_report =
            run_pipeline(&parallel, &FakeImageSource::default(), blind_estimator).unwrap();

        assert_eq!(
            fs::read(&sequential.output_path).unwrap(),
            fs::read(&parallel.output_path).unwrap()
        );
        assert_eq!(seq_report.warnings.entries(), par_report.warnings.entries());
        assert_eq!(seq_report.patients, par_report.patients);
    }

    #[test]
    fn test_estimator_init_failure_is_fatal() {
        let root = tempfile::tempdir().unwrap();
        build_dataset(root.path());

        for workers in [1, 2] {
            let config = config(root.path(), "never.csv", workers);
            let result = run_pipeline(&config, &FakeImageSource::default(), || {
                Err::<FakeEstimator, _>(anyhow!("model file missing"))
            });
            assert!(result.is_err());
            assert!(!config.output_path.exists());
        }
    }

    #[test]
    fn test_parallel_init_failure_stops_before_any_frame() {
        let root = tempfile::tempdir().unwrap();
        build_dataset(root.path());
        let config = config(root.path(), "never.csv", 3);
        let source = FakeImageSource::default();
        let built = AtomicUsize::new(0);

        let result = run_pipeline(&config, &source, || {
            if built.fetch_add(1, Ordering::SeqCst) == 1 {
                return Err(anyhow!("model file missing"));
            }
            blind_estimator()
        });

        assert!(result.is_err());
        assert_eq!(built.load(Ordering::SeqCst), 2);
        assert_eq!(source.loads.load(Ordering::SeqCst), 0);
        assert!(!config.output_path.exists());
    }

    #[test]
    fn test_empty_root_writes_header_only() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("frames")).unwrap();
        let config = config(root.path(), "empty.csv", 2);

        let report = run_pipeline(&config, &FakeImageSource::default(), blind_estimator).unwrap();
        assert_eq!(report.total_rows, 0);
        let table = fs::read_to_string(&config.output_path).unwrap();
        assert_eq!(table.lines().count(), 1);
    }
}
