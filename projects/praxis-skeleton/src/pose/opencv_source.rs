use super::ImageSource;
use opencv::core::Mat;
use opencv::imgcodecs::{imread, IMREAD_COLOR};
use opencv::prelude::*;
use std::path::Path;

/// Loads frames from disk with OpenCV. Images come back in BGR channel order.
#[derive(Debug, Default, Clone, Copy)]
pub struct OpencvImageSource;

impl ImageSource for OpencvImageSource {
    type Image = Mat;

    fn load(&self, path: &Path) -> Option<Mat> {
        let path_str = path.to_str()?;
        match imread(path_str, IMREAD_COLOR) {
            Ok(mat) if !mat.empty() => Some(mat),
            Ok(_) => {
                tracing::debug!("Unreadable image {:?}", path);
                None
            }
            Err(e) => {
                tracing::debug!("Failed to decode image {:?}: {}", path, e);
                None
            }
        }
    }
}
