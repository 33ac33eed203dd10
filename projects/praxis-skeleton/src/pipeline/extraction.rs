// Landmark extraction: runs the pose estimator over every selected frame and
// turns detections into output rows.

use crate::pipeline::selector::load_patient_interval;
use crate::pipeline::types::{
    round_coordinate, Cohort, LandmarkRow, Warning, WarningLog, LANDMARKS_OF_INTEREST,
};
use crate::pose::{ImageSource, LandmarkSet, PoseEstimator};
use crate::run_context::DatasetLayout;
use indicatif::ProgressBar;
use std::path::PathBuf;

/// Everything a worker needs to know about the run, minus the collaborators.
pub struct ExtractionContext<'a> {
    pub layout: &'a DatasetLayout,
    pub action_id: &'a str,
    pub progress: &'a ProgressBar,
}

/// Rows for every patient in cohort order, then frame order.
pub fn extract_landmarks<S, E>(
    ctx: &ExtractionContext<'_>,
    cohort: &Cohort,
    source: &S,
    estimator: &mut E,
    warnings: &mut WarningLog,
) -> Vec<LandmarkRow>
where
    S: ImageSource,
    E: PoseEstimator<Image = S::Image>,
{
    let mut rows = Vec::new();
    for (patient_id, frames) in cohort {
        rows.extend(extract_patient(
            ctx, patient_id, frames, source, estimator, warnings,
        ));
    }
    rows
}

/// Rows for one patient.
///
/// The interval is read again from the annotation file instead of being passed
/// in from the selector, so this stage only depends on the cohort mapping.
/// Unreadable frames and frames without a detected pose contribute nothing.
pub fn extract_patient<S, E>(
    ctx: &ExtractionContext<'_>,
    patient_id: &str,
    frames: &[PathBuf],
    source: &S,
    estimator: &mut E,
    warnings: &mut WarningLog,
) -> Vec<LandmarkRow>
where
    S: ImageSource,
    E: PoseEstimator<Image = S::Image>,
{
    if frames.is_empty() {
        warnings.push(Warning::NoFramesSelected {
            patient_id: patient_id.to_string(),
        });
        return Vec::new();
    }

    let interval = match load_patient_interval(ctx.layout, patient_id, ctx.action_id, warnings) {
        Ok(Some(interval)) => interval,
        Ok(None) => {
            ctx.progress.inc(frames.len() as u64);
            return Vec::new();
        }
        Err(e) => {
            warnings.push(Warning::MalformedAnnotation {
                patient_id: patient_id.to_string(),
                message: e.to_string(),
            });
            ctx.progress.inc(frames.len() as u64);
            return Vec::new();
        }
    };

    let mut rows = Vec::new();
    for frame in frames {
        ctx.progress.inc(1);

        let Some(image) = source.load(frame) else {
            continue;
        };

        let landmarks = match estimator.infer(&image) {
            Ok(Some(landmarks)) if !landmarks.is_empty() => landmarks,
            Ok(_) => continue,
            Err(e) => {
                warnings.push(Warning::InferenceFailed {
                    patient_id: patient_id.to_string(),
                    frame: frame.clone(),
                    message: format!("{:#}", e),
                });
                continue;
            }
        };

        let Some(joints) = select_joints(&landmarks) else {
            tracing::debug!(
                "{:?}: estimator returned {} landmarks, skipping",
                frame,
                landmarks.len()
            );
            continue;
        };

        rows.push(LandmarkRow {
            patient_id: patient_id.to_string(),
            action_id: ctx.action_id.to_string(),
            start_frame: interval.start.frame_ordinal(),
            end_frame: interval.end.frame_ordinal(),
            joints,
        });
    }

    tracing::info!(
        "{}: {} of {} frames produced landmarks",
        patient_id,
        rows.len(),
        frames.len()
    );
    rows
}

/// Pick [`LANDMARKS_OF_INTEREST`] out of a detection and round them.
fn select_joints(landmarks: &LandmarkSet) -> Option<[(f64, f64); LANDMARKS_OF_INTEREST.len()]> {
    let mut joints = [(0.0, 0.0); LANDMARKS_OF_INTEREST.len()];
    for (slot, idx) in joints.iter_mut().zip(LANDMARKS_OF_INTEREST) {
        let landmark = landmarks.get(idx)?;
        *slot = (
            round_coordinate(landmark.x as f64),
            round_coordinate(landmark.y as f64),
        );
    }
    Some(joints)
}
