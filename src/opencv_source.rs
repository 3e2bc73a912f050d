use std::path::Path;

use opencv::core::Mat;
use opencv::prelude::*;
use opencv::videoio::{self, VideoCapture};
use tracing::debug;

use crate::{BenchError, DecoderVariant, FrameSource, FrameStep};

/// Frames pulled through OpenCV's `VideoCapture`, one `read` per step.
pub struct OpenCvSource {
    capture: VideoCapture,
    frame: Mat,
    finished: bool,
}

impl OpenCvSource {
    pub fn open(path: &Path) -> Result<Self, BenchError> {
        let path_str = path.to_str().ok_or_else(|| {
            BenchError::InvalidInput(format!("non UTF-8 path: {}", path.display()))
        })?;
        let capture = VideoCapture::from_file(path_str, videoio::CAP_ANY)
            .map_err(|err| BenchError::Decode(format!("failed to open video: {err}")))?;
        if !capture.is_opened().unwrap_or(false) {
            return Err(BenchError::Decode(format!(
                "failed to open video file: {}",
                path.display()
            )));
        }
        debug!(path = %path.display(), "opened opencv capture");

        Ok(Self {
            capture,
            frame: Mat::default(),
            finished: false,
        })
    }
}

impl FrameSource for OpenCvSource {
    fn variant(&self) -> DecoderVariant {
        DecoderVariant::Capture
    }

    fn advance(&mut self) -> Result<FrameStep, BenchError> {
        let read = self
            .capture
            .read(&mut self.frame)
            .map_err(|err| BenchError::Decode(format!("opencv read: {err}")))?;
        if !read || self.frame.empty() {
            self.finished = true;
            return Ok(FrameStep::EndOfStream);
        }
        Ok(FrameStep::Decoded { frames: 1 })
    }

    fn is_finished(&self) -> bool {
        self.finished
    }
}

impl Drop for OpenCvSource {
    fn drop(&mut self) {
        let _ = self.capture.release();
    }
}
