//! Frames from an image file kept up to date by an external capture tool.

use std::path::{Path, PathBuf};
use std::time::Duration;

use image::RgbImage;

use crate::error::{HwError, Result};
use crate::util::wait_until;

#[derive(Debug, Clone)]
pub struct FileFrameGrabber {
    path: PathBuf,
}

impl FileFrameGrabber {
    /// Wait up to `timeout` for the first frame to appear.
    pub fn open(path: impl AsRef<Path>, timeout: Duration) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        wait_until(|| path.is_file(), timeout, Duration::from_millis(20)).map_err(|e| match e {
            HwError::Timeout(_) => HwError::Camera(format!("no frame at {}", path.display())),
            other => other,
        })?;
        tracing::debug!(path = %path.display(), "frame source opened");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Decode the current frame as 8-bit RGB.
    pub fn grab(&mut self) -> Result<RgbImage> {
        let frame = image::open(&self.path)?.to_rgb8();
        tracing::trace!(w = frame.width(), h = frame.height(), "frame");
        Ok(frame)
    }
}
