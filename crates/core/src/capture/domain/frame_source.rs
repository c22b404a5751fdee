use crate::shared::frame::Frame;

/// Produces frames at whatever cadence the underlying device or file dictates.
///
/// Implementations own their decoding state and are driven from a single
/// capture thread.
pub trait FrameSource: Send {
    /// The next frame, an error for a frame that could not be decoded, or
    /// `None` at end of stream.
    fn next_frame(&mut self) -> Option<Result<Frame, Box<dyn std::error::Error>>>;

    /// Releases any resources held by the source. Safe to call twice.
    fn close(&mut self);
}
