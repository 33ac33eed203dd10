use crate::pipeline::orchestrator::PipelineConfig;
use crate::run_context::{
    default_output_path, DatasetLayout, DEFAULT_IMAGE_SUBDIR, DEFAULT_PATIENT_PREFIX,
};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Root directory containing Patient_XX/RGB frame folders
    #[arg(long, env = "PRAXIS_ROOT_DIR")]
    pub root_dir: PathBuf,

    /// Directory containing Patient_XX.csv annotation files
    #[arg(long, env = "PRAXIS_ANNOTATION_ROOT")]
    pub annotation_root: PathBuf,

    /// Action label to extract
    #[arg(long, env = "PRAXIS_ACTION_ID", default_value = "P2_3")]
    pub action_id: String,

    /// Output table; defaults to <action_id>_skeleton.csv
    #[arg(long)]
    pub output_path: Option<PathBuf>,

    /// ONNX BlazePose landmark model
    #[arg(long, env = "PRAXIS_POSE_MODEL")]
    pub model_path: PathBuf,

    /// Minimum pose presence score for a frame to count as detected
    #[arg(long, default_value_t = 0.5)]
    pub min_detection_confidence: f32,

    /// Frame folder name inside each patient directory
    #[arg(long, default_value = DEFAULT_IMAGE_SUBDIR)]
    pub image_subdir: String,

    /// Prefix identifying patient directories under the root
    #[arg(long, default_value = DEFAULT_PATIENT_PREFIX)]
    pub patient_prefix: String,

    /// Number of patients processed concurrently
    #[arg(long, default_value_t = 1)]
    pub workers: usize,
}

impl Args {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        let layout = DatasetLayout {
            image_subdir: self.image_subdir.clone(),
            patient_prefix: self.patient_prefix.clone(),
            ..DatasetLayout::new(&self.root_dir, &self.annotation_root)
        };

        PipelineConfig {
            layout,
            action_id: self.action_id.clone(),
            output_path: self
                .output_path
                .clone()
                .unwrap_or_else(|| default_output_path(&self.action_id)),
            workers: self.workers,
        }
    }
}
