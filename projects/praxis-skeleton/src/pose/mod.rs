pub mod blazepose;
pub mod opencv_source;

use anyhow::Result;
use std::path::Path;

/// A single landmark in normalized image coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
}

/// Ordered landmarks for one detected body, indexed by joint id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LandmarkSet {
    points: Vec<Landmark>,
}

impl LandmarkSet {
    pub fn new(points: Vec<Landmark>) -> Self {
        Self { points }
    }

    pub fn get(&self, index: usize) -> Option<&Landmark> {
        self.points.get(index)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Decodes frame files into images the estimator understands.
pub trait ImageSource {
    type Image;

    /// `None` when the file cannot be read or decoded.
    fn load(&self, path: &Path) -> Option<Self::Image>;
}

/// A body-pose model.
///
/// Construction is the fallible, expensive part; a value that exists is ready
/// to run. Each call is independent of the previous ones.
pub trait PoseEstimator {
    type Image;

    /// `Ok(None)` means no body was detected in the image.
    fn infer(&mut self, image: &Self::Image) -> Result<Option<LandmarkSet>>;
}
