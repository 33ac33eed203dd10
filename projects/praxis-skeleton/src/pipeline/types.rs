use crate::pipeline::timestamp::Timestamp;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// MediaPipe pose indices written to the output table, in column order:
/// nose, both ears, then shoulders, elbows, wrists, hand points and hips.
pub const LANDMARKS_OF_INTEREST: [usize; 17] =
    [0, 7, 8, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24];

/// Number of decimal digits kept for each landmark coordinate.
pub const COORDINATE_DECIMALS: i32 = 5;

/// Patient id to the chronologically ordered frames inside the action interval.
///
/// A BTreeMap keeps iteration order stable across runs regardless of the order
/// the filesystem lists patient directories in.
pub type Cohort = BTreeMap<String, Vec<PathBuf>>;

/// The annotated window for one (patient, action) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionInterval {
    pub action_id: String,
    pub start: Timestamp,
    pub end: Timestamp,
    pub status: String,
    pub state: String,
}

/// One output row: a single frame in which a pose was detected.
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkRow {
    pub patient_id: String,
    pub action_id: String,
    pub start_frame: u64,
    pub end_frame: u64,
    /// (x, y) per entry of [`LANDMARKS_OF_INTEREST`], already rounded.
    pub joints: [(f64, f64); LANDMARKS_OF_INTEREST.len()],
}

impl LandmarkRow {
    pub fn header() -> Vec<String> {
        let mut columns = vec![
            "patient_id".to_string(),
            "action".to_string(),
            "start_frame".to_string(),
            "end_frame".to_string(),
        ];
        for idx in LANDMARKS_OF_INTEREST {
            columns.push(format!("joint_{}_x", idx));
            columns.push(format!("joint_{}_y", idx));
        }
        columns
    }

    pub fn to_record(&self) -> Vec<String> {
        let mut record = Vec::with_capacity(4 + self.joints.len() * 2);
        record.push(self.patient_id.clone());
        record.push(self.action_id.clone());
        record.push(self.start_frame.to_string());
        record.push(self.end_frame.to_string());
        for (x, y) in &self.joints {
            record.push(format_coordinate(*x));
            record.push(format_coordinate(*y));
        }
        record
    }
}

/// Round to [`COORDINATE_DECIMALS`] places, half away from zero. Negative zero
/// comes back as `0.0`.
pub fn round_coordinate(value: f64) -> f64 {
    let scale = 10f64.powi(COORDINATE_DECIMALS);
    (value * scale).round() / scale + 0.0
}

/// Fixed-width text for a table cell, e.g. `1.00000`.
pub fn format_coordinate(value: f64) -> String {
    format!(
        "{:.*}",
        COORDINATE_DECIMALS as usize,
        round_coordinate(value)
    )
}

/// Non-fatal conditions surfaced during a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    MissingAnnotation { patient_id: String, path: PathBuf },
    MissingFrameDir { patient_id: String, path: PathBuf },
    NoMatchingAction { patient_id: String, action_id: String },
    MalformedAnnotation { patient_id: String, message: String },
    NoFramesSelected { patient_id: String },
    InferenceFailed { patient_id: String, frame: PathBuf, message: String },
}

/// Warnings retained for the whole run, in the order they were raised.
#[derive(Debug, Default, Clone, Serialize)]
#[serde(transparent)]
pub struct WarningLog {
    entries: Vec<Warning>,
}

impl WarningLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a warning and emit it through tracing.
    pub fn push(&mut self, warning: Warning) {
        match &warning {
            Warning::MissingAnnotation { patient_id, path } => {
                tracing::warn!("No annotation file for {} at {:?}", patient_id, path)
            }
            Warning::MissingFrameDir { patient_id, path } => {
                tracing::warn!("No frame folder for {} at {:?}", patient_id, path)
            }
            Warning::NoMatchingAction {
                patient_id,
                action_id,
            } => tracing::warn!("No annotation row for action {} in {}", action_id, patient_id),
            Warning::MalformedAnnotation {
                patient_id,
                message,
            } => tracing::warn!("Skipping {}: {}", patient_id, message),
            Warning::NoFramesSelected { patient_id } => {
                tracing::warn!("No frames found for patient {}", patient_id)
            }
            Warning::InferenceFailed {
                patient_id,
                frame,
                message,
            } => tracing::warn!(
                "Pose inference failed for {} frame {:?}: {}",
                patient_id,
                frame,
                message
            ),
        }
        self.entries.push(warning);
    }

    pub fn extend(&mut self, other: WarningLog) {
        self.entries.extend(other.entries);
    }

    pub fn entries(&self) -> &[Warning] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let header = LandmarkRow::header();
        assert_eq!(header.len(), 4 + 2 * 17);
        assert_eq!(&header[..4], ["patient_id", "action", "start_frame", "end_frame"]);
        assert_eq!(header[4], "joint_0_x");
        assert_eq!(header[5], "joint_0_y");
        assert_eq!(header[6], "joint_7_x");
        assert_eq!(header[header.len() - 1], "joint_24_y");
    }

    #[test]
    fn test_round_coordinate() {
        assert_eq!(round_coordinate(0.123456789), 0.12346);
        assert_eq!(round_coordinate(0.5), 0.5);
        assert_eq!(round_coordinate(1.000004), 1.0);
        assert!(round_coordinate(-0.000004).is_sign_positive());
        assert!(round_coordinate(-0.0).is_sign_positive());
    }

    #[test]
    fn test_format_coordinate() {
        assert_eq!(format_coordinate(1.0), "1.00000");
        assert_eq!(format_coordinate(0.00001), "0.00001");
        assert_eq!(format_coordinate(0.12346), "0.12346");
        assert_eq!(format_coordinate(-0.000004), "0.00000");
        assert_eq!(format_coordinate(-0.5), "-0.50000");
    }

    #[test]
    fn test_warning_log_serializes_with_kind_tag() {
        let mut log = WarningLog::new();
        log.push(Warning::NoMatchingAction {
            patient_id: "Patient_01".to_string(),
            action_id: "P2_3".to_string(),
        });
        let json = serde_json::to_value(&log).unwrap();
        assert_eq!(json[0]["kind"], "no_matching_action");
        assert_eq!(json[0]["patient_id"], "Patient_01");
    }
}
