use crate::pipeline::annotation::annotation_path;
use crate::pipeline::types::{Cohort, WarningLog};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const DEFAULT_IMAGE_SUBDIR: &str = "RGB";
pub const DEFAULT_PATIENT_PREFIX: &str = "Patient_";

/// Where patient frames and annotations live on disk.
///
/// `root_dir/<patient>/<image_subdir>/*.jpg` and `annotation_root/<patient>.csv`.
#[derive(Debug, Clone)]
pub struct DatasetLayout {
    pub root_dir: PathBuf,
    pub annotation_root: PathBuf,
    pub image_subdir: String,
    pub patient_prefix: String,
}

impl DatasetLayout {
    pub fn new(root_dir: impl Into<PathBuf>, annotation_root: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            annotation_root: annotation_root.into(),
            image_subdir: DEFAULT_IMAGE_SUBDIR.to_string(),
            patient_prefix: DEFAULT_PATIENT_PREFIX.to_string(),
        }
    }

    pub fn frame_dir(&self, patient_id: &str) -> PathBuf {
        self.root_dir.join(patient_id).join(&self.image_subdir)
    }

    pub fn annotation_file(&self, patient_id: &str) -> PathBuf {
        annotation_path(&self.annotation_root, patient_id)
    }

    /// Immediate subdirectories of the root whose name carries the patient
    /// prefix. Symlinked patient directories are included.
    pub fn list_patients(&self) -> Vec<String> {
        WalkDir::new(&self.root_dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_dir())
            .filter_map(|e| e.file_name().to_str().map(|s| s.to_string()))
            .filter(|name| name.starts_with(&self.patient_prefix))
            .collect()
    }
}

/// Default output table path for an action, e.g. `P2_3_skeleton.csv`.
pub fn default_output_path(action_id: &str) -> PathBuf {
    PathBuf::from(format!("{}_skeleton.csv", action_id))
}

/// Report path written next to the output table.
pub fn report_path(output_path: &Path) -> PathBuf {
    let stem = output_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("skeleton");
    output_path.with_file_name(format!("{}_report.json", stem))
}

#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct PatientSummary {
    pub selected_frames: usize,
    pub rows: usize,
}

/// Persisted summary of one run, including every warning raised.
#[derive(Serialize, Debug, Clone)]
pub struct RunReport {
    pub created_at: DateTime<Utc>,
    pub action_id: String,
    pub root_dir: PathBuf,
    pub annotation_root: PathBuf,
    pub output_path: PathBuf,
    pub total_rows: usize,
    pub patients: BTreeMap<String, PatientSummary>,
    pub warnings: WarningLog,
}

impl RunReport {
    pub fn new(layout: &DatasetLayout, action_id: &str, output_path: &Path) -> Self {
        Self {
            created_at: Utc::now(),
            action_id: action_id.to_string(),
            root_dir: layout.root_dir.clone(),
            annotation_root: layout.annotation_root.clone(),
            output_path: output_path.to_path_buf(),
            total_rows: 0,
            patients: BTreeMap::new(),
            warnings: WarningLog::new(),
        }
    }

    pub fn record_cohort(&mut self, cohort: &Cohort) {
        for (patient_id, frames) in cohort {
            self.patients.entry(patient_id.clone()).or_default().selected_frames = frames.len();
        }
    }

    pub fn record_rows(&mut self, patient_id: &str, rows: usize) {
        self.patients.entry(patient_id.to_string()).or_default().rows += rows;
        self.total_rows += rows;
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).with_context(|| format!("Failed to write report {:?}", path))?;
        Ok(())
    }
}
