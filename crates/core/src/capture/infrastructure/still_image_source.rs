use std::path::Path;

use crate::capture::domain::frame_source::FrameSource;
use crate::shared::frame::Frame;

/// Serves one decoded image as a stream of identical frames.
///
/// Useful for exercising the live pipeline without a camera.
pub struct StillImageSource {
    frame: Option<Frame>,
    remaining: usize,
    next_index: usize,
}

impl StillImageSource {
    pub fn new(frame: Frame, repeat: usize) -> Self {
        Self {
            frame: Some(frame),
            remaining: repeat,
            next_index: 0,
        }
    }

    /// Decodes `path` to RGB with the `image` crate.
    pub fn open(path: &Path, repeat: usize) -> Result<Self, Box<dyn std::error::Error>> {
        let rgb = image::open(path)?.to_rgb8();
        let (width, height) = rgb.dimensions();
        log::info!("Loaded still image {} ({width}x{height})", path.display());
        Ok(Self::new(
            Frame::new(rgb.into_raw(), width, height, 3, 0),
            repeat,
        ))
    }
}

impl FrameSource for StillImageSource {
    fn next_frame(&mut self) -> Option<Result<Frame, Box<dyn std::error::Error>>> {
        if self.remaining == 0 {
            return None;
        }
        let template = self.frame.as_ref()?;
        let frame = Frame::new(
            template.data().to_vec(),
            template.width(),
            template.height(),
            template.channels(),
            self.next_index,
        );
        self.remaining -= 1;
        self.next_index += 1;
        Some(Ok(frame))
    }

    fn close(&mut self) {
        self.frame = None;
        self.remaining = 0;
    }
}
