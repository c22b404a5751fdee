use crate::shared::frame::Frame;
use crate::shared::region::DetectedFace;

/// Domain interface for face detection.
///
/// Returns normalized boxes for the given frame only. Implementations may
/// hold inference sessions or scripted state, hence `&mut self`.
pub trait FaceDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<DetectedFace>, Box<dyn std::error::Error>>;
}
