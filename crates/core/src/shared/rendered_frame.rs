use image::DynamicImage;

/// A finished output frame, materialized into a concrete pixel buffer.
///
/// `sequence` is the tracking index of the frame that produced it, so
/// consumers can verify delivery order.
#[derive(Clone, Debug)]
pub struct RenderedFrame {
    pub image: DynamicImage,
    pub sequence: usize,
}

impl RenderedFrame {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}
