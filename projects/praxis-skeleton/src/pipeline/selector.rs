// Patient frame selector: picks the frames of one patient that fall inside the
// annotated interval of one action.

use crate::error::AnnotationError;
use crate::pipeline::annotation::find_action_interval;
use crate::pipeline::timestamp::{decode_frame_filename, in_range, Timestamp};
use crate::pipeline::types::{ActionInterval, Warning, WarningLog};
use crate::run_context::DatasetLayout;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const FRAME_EXTENSION: &str = "jpg";

/// Load the interval for `action_id` from the patient's annotation file.
///
/// A missing file or a file without a matching row is recorded in `warnings`
/// and yields `Ok(None)`. Malformed rows propagate.
pub fn load_patient_interval(
    layout: &DatasetLayout,
    patient_id: &str,
    action_id: &str,
    warnings: &mut WarningLog,
) -> Result<Option<ActionInterval>, AnnotationError> {
    let Some(annotation_file) = existing_annotation(layout, patient_id, warnings) else {
        return Ok(None);
    };
    lookup_interval(&annotation_file, patient_id, action_id, warnings)
}

fn existing_annotation(
    layout: &DatasetLayout,
    patient_id: &str,
    warnings: &mut WarningLog,
) -> Option<PathBuf> {
    let annotation_file = layout.annotation_file(patient_id);
    if annotation_file.is_file() {
        return Some(annotation_file);
    }
    warnings.push(Warning::MissingAnnotation {
        patient_id: patient_id.to_string(),
        path: annotation_file,
    });
    None
}

fn lookup_interval(
    annotation_file: &Path,
    patient_id: &str,
    action_id: &str,
    warnings: &mut WarningLog,
) -> Result<Option<ActionInterval>, AnnotationError> {
    let interval = find_action_interval(annotation_file, action_id)?;
    if interval.is_none() {
        warnings.push(Warning::NoMatchingAction {
            patient_id: patient_id.to_string(),
            action_id: action_id.to_string(),
        });
    }
    Ok(interval)
}

/// Frames of `patient_id` whose embedded timestamp lies in the action interval.
///
/// The result is chronological. Absent resources degrade to an empty list plus
/// a warning; only a malformed annotation interval is returned as an error.
pub fn select_frames(
    layout: &DatasetLayout,
    patient_id: &str,
    action_id: &str,
    warnings: &mut WarningLog,
) -> Result<Vec<PathBuf>, AnnotationError> {
    let Some(annotation_file) = existing_annotation(layout, patient_id, warnings) else {
        return Ok(Vec::new());
    };

    let frame_dir = layout.frame_dir(patient_id);
    if !frame_dir.is_dir() {
        warnings.push(Warning::MissingFrameDir {
            patient_id: patient_id.to_string(),
            path: frame_dir,
        });
        return Ok(Vec::new());
    }

    let Some(interval) = lookup_interval(&annotation_file, patient_id, action_id, warnings)? else {
        return Ok(Vec::new());
    };

    let frames = frames_in_interval(&frame_dir, &interval.start, &interval.end);
    tracing::debug!(
        "{}: {} frames in [{}, {}] for {} ({}/{})",
        patient_id,
        frames.len(),
        interval.start,
        interval.end,
        interval.action_id,
        interval.status,
        interval.state
    );
    Ok(frames)
}

/// Decodable frame files in `frame_dir` within `[start, end]`, chronological.
///
/// Files are visited in filename order and then stably sorted by decoded
/// timestamp, so ordering never depends on how the names happen to be padded.
/// Files that do not decode are skipped. Symlinked frames count as frames.
pub fn frames_in_interval(frame_dir: &Path, start: &Timestamp, end: &Timestamp) -> Vec<PathBuf> {
    let mut matched: Vec<(Timestamp, PathBuf)> = WalkDir::new(frame_dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|s| s.to_str())
                .map(|s| s == FRAME_EXTENSION)
                .unwrap_or(false)
        })
        .filter_map(|e| {
            let name = e.file_name().to_str()?;
            match decode_frame_filename(name) {
                Ok(timestamp) => Some((timestamp, e.path().to_path_buf())),
                Err(err) => {
                    tracing::debug!("Skipping frame file: {}", err);
                    None
                }
            }
        })
        .filter(|(timestamp, _)| in_range(timestamp, start, end))
        .collect();

    matched.sort_by(|a, b| a.0.cmp(&b.0));
    matched.into_iter().map(|(_, path)| path).collect()
}
