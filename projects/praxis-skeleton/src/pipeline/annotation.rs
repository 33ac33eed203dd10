// Annotation files: one headerless CSV per patient with the columns
// action_id, start_ts, end_ts, status, state

use crate::error::{AnnotationError, FormatError};
use crate::pipeline::timestamp::decode_annotation_timestamp;
use crate::pipeline::types::ActionInterval;
use csv::{ReaderBuilder, StringRecord};
use std::path::{Path, PathBuf};

pub const ANNOTATION_EXTENSION: &str = "csv";

pub fn annotation_path(annotation_root: &Path, patient_id: &str) -> PathBuf {
    annotation_root.join(format!("{}.{}", patient_id, ANNOTATION_EXTENSION))
}

/// Look up the interval for `action_id`.
///
/// Action ids are not guaranteed unique within a file; the first matching row
/// in file order wins and later duplicates are ignored. Returns `Ok(None)` when
/// no row matches. A malformed timestamp on the matching row is an error: a
/// half-parsed interval cannot be trusted.
pub fn find_action_interval(
    path: &Path,
    action_id: &str,
) -> Result<Option<ActionInterval>, AnnotationError> {
    let csv_err = |source: csv::Error| AnnotationError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(csv_err)?;

    for (row, record) in reader.records().enumerate() {
        let record = record.map_err(csv_err)?;
        if record.get(0) != Some(action_id) {
            continue;
        }
        return parse_row(path, row, &record).map(Some);
    }

    Ok(None)
}

fn parse_row(
    path: &Path,
    row: usize,
    record: &StringRecord,
) -> Result<ActionInterval, AnnotationError> {
    let (Some(action_id), Some(start_ts), Some(end_ts)) =
        (record.get(0), record.get(1), record.get(2))
    else {
        return Err(AnnotationError::ShortRow {
            path: path.to_path_buf(),
            row,
            found: record.len(),
        });
    };

    let timestamp_err = |source: FormatError| AnnotationError::Timestamp {
        path: path.to_path_buf(),
        action_id: action_id.to_string(),
        source,
    };

    Ok(ActionInterval {
        action_id: action_id.to_string(),
        start: decode_annotation_timestamp(start_ts).map_err(timestamp_err)?,
        end: decode_annotation_timestamp(end_ts).map_err(timestamp_err)?,
        status: record.get(3).unwrap_or_default().to_string(),
        state: record.get(4).unwrap_or_default().to_string(),
    })
}
