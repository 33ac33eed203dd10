use super::{Landmark, LandmarkSet, PoseEstimator};
use anyhow::{anyhow, bail, Context, Result};
use ndarray::{Array4, ArrayViewD};
use opencv::core::{Mat, Size};
use opencv::imgproc;
use opencv::prelude::*;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use std::path::Path;

/// Square input edge of the BlazePose landmark model.
pub const INPUT_SIZE: i32 = 256;

/// Body landmarks in MediaPipe pose indexing. The model emits a few auxiliary
/// points after these, which are dropped.
pub const POSE_LANDMARKS: usize = 33;

/// Points in the landmark output including the auxiliary ones.
const MAX_MODEL_LANDMARKS: usize = 39;

/// x, y, z, visibility, presence
const VALUES_PER_LANDMARK: usize = 5;

/// A wrapper around an ONNX BlazePose landmark model that handles BGR-to-RGB
/// conversion, resizing and output decoding.
///
/// The landmark model runs on the whole frame resized to the model input. There
/// is no person detector cropping a region of interest first, so small or
/// off-centre subjects come out less accurate than with the two-stage
/// MediaPipe pipeline.
///
/// Outputs are told apart by size: the landmark tensor holds 33 to 39 groups of
/// five values and the presence score is a single value. Export order and
/// output names do not matter.
pub struct BlazePoseEstimator {
    session: Session,
    input_name: String,
    output_names: Vec<String>,
    min_detection_confidence: f32,
}

impl BlazePoseEstimator {
    pub fn new(model_path: &Path, min_detection_confidence: f32) -> Result<Self> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .commit_from_file(model_path)
            .with_context(|| format!("Failed to load pose model {:?}", model_path))?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .ok_or_else(|| anyhow!("Pose model {:?} has no inputs", model_path))?;

        let output_names: Vec<String> =
            session.outputs.iter().map(|output| output.name.clone()).collect();
        if output_names.len() < 2 {
            bail!(
                "Pose model {:?} must expose landmark and presence outputs",
                model_path
            );
        }

        tracing::info!(
            "Loaded pose model {:?} (input {}, outputs {:?})",
            model_path,
            input_name,
            output_names
        );

        Ok(Self {
            session,
            input_name,
            output_names,
            min_detection_confidence,
        })
    }

    /// BGR Mat to a 1xHxWx3 RGB tensor scaled to [0, 1].
    fn preprocess(&self, image: &Mat) -> Result<Array4<f32>> {
        let mut rgb = Mat::default();
        imgproc::cvt_color_def(image, &mut rgb, imgproc::COLOR_BGR2RGB)?;

        let mut resized = Mat::default();
        imgproc::resize(
            &rgb,
            &mut resized,
            Size::new(INPUT_SIZE, INPUT_SIZE),
            0.0,
            0.0,
            imgproc::INTER_LINEAR,
        )?;

        if !resized.is_continuous() {
            return Err(anyhow!("Mat is not continuous"));
        }

        let side = INPUT_SIZE as usize;
        let bytes = resized.data_bytes()?;
        if bytes.len() != side * side * 3 {
            bail!("Unexpected image buffer of {} bytes", bytes.len());
        }

        Ok(Array4::from_shape_fn((1, side, side, 3), |(_, y, x, c)| {
            bytes[(y * side + x) * 3 + c] as f32 / 255.0
        }))
    }
}

impl PoseEstimator for BlazePoseEstimator {
    type Image = Mat;

    fn infer(&mut self, image: &Mat) -> Result<Option<LandmarkSet>> {
        let input_tensor = Tensor::from_array(self.preprocess(image)?)?;
        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => input_tensor])
            .context("Pose inference failed")?;

        let mut sizes = Vec::with_capacity(self.output_names.len());
        for name in &self.output_names {
            let view: ArrayViewD<f32> = outputs[name.as_str()]
                .try_extract_array()
                .with_context(|| format!("Failed to extract output {}", name))?;
            sizes.push(view.len());
        }
        let (landmarks_idx, presence_idx) = pick_outputs(&sizes)
            .ok_or_else(|| anyhow!("No landmark/presence outputs among sizes {:?}", sizes))?;

        let presence: ArrayViewD<f32> = outputs[self.output_names[presence_idx].as_str()]
            .try_extract_array()
            .context("Failed to extract presence score")?;
        let score = presence.iter().next().copied().unwrap_or(0.0);
        if score < self.min_detection_confidence {
            return Ok(None);
        }

        let raw: ArrayViewD<f32> = outputs[self.output_names[landmarks_idx].as_str()]
            .try_extract_array()
            .context("Failed to extract landmarks")?;
        let values: Vec<f32> = raw.iter().copied().collect();

        decode_landmarks(&values, INPUT_SIZE as f32)
            .map(Some)
            .ok_or_else(|| anyhow!("Landmark output too short: {} values", values.len()))
    }
}

/// Indices of the landmark and presence outputs, given each output's element count.
fn pick_outputs(sizes: &[usize]) -> Option<(usize, usize)> {
    let landmarks = sizes.iter().position(|&n| {
        n % VALUES_PER_LANDMARK == 0
            && (POSE_LANDMARKS..=MAX_MODEL_LANDMARKS).contains(&(n / VALUES_PER_LANDMARK))
    })?;
    let presence = sizes.iter().position(|&n| n == 1)?;
    Some((landmarks, presence))
}

/// Convert the flat landmark output into normalized coordinates.
fn decode_landmarks(values: &[f32], input_size: f32) -> Option<LandmarkSet> {
    if values.len() < POSE_LANDMARKS * VALUES_PER_LANDMARK {
        return None;
    }

    let points = values
        .chunks_exact(VALUES_PER_LANDMARK)
        .take(POSE_LANDMARKS)
        .map(|v| Landmark {
            x: v[0] / input_size,
            y: v[1] / input_size,
        })
        .collect();

    Some(LandmarkSet::new(points))
}
