use std::collections::VecDeque;

use crate::detection::domain::face_detector::FaceDetector;
use crate::shared::frame::Frame;
use crate::shared::region::DetectedFace;

/// Replays a scripted sequence of detections, one entry per call.
///
/// Once the script is exhausted every call returns the fallback (empty by
/// default, or the last entry when built with [`FixedFaceDetector::repeating`]).
pub struct FixedFaceDetector {
    script: VecDeque<Vec<DetectedFace>>,
    fallback: Vec<DetectedFace>,
    repeat_last: bool,
}

impl FixedFaceDetector {
    pub fn new(script: Vec<Vec<DetectedFace>>) -> Self {
        Self {
            script: script.into(),
            fallback: Vec::new(),
            repeat_last: false,
        }
    }

    /// Keeps returning the final scripted entry after the script ends.
    pub fn repeating(script: Vec<Vec<DetectedFace>>) -> Self {
        Self {
            repeat_last: true,
            ..Self::new(script)
        }
    }

    /// Reports the same faces on every frame.
    pub fn always(faces: Vec<DetectedFace>) -> Self {
        Self::repeating(vec![faces])
    }
}

impl FaceDetector for FixedFaceDetector {
    fn detect(&mut self, _frame: &Frame) -> Result<Vec<DetectedFace>, Box<dyn std::error::Error>> {
        match self.script.pop_front() {
            Some(faces) => {
                if self.repeat_last {
                    self.fallback = faces.clone();
                }
                Ok(faces)
            }
            None => Ok(self.fallback.clone()),
        }
    }
}
