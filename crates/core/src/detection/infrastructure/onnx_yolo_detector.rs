/// YOLO face detector using ONNX Runtime via `ort`.
///
/// Letterbox preprocessing, inference, confidence filtering and NMS.
/// Boxes are reported normalized to the source frame.
use std::path::Path;

use crate::detection::domain::face_detector::FaceDetector;
use crate::shared::frame::Frame;
use crate::shared::region::{DetectedFace, NormalizedBox};

use super::execution_provider::execution_providers;
use super::math::bbox_iou;

/// Fallback YOLO model input resolution when the model doesn't specify dimensions.
const DEFAULT_INPUT_SIZE: u32 = 640;

/// Default confidence threshold for face detection.
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

/// NMS IoU threshold.
const NMS_IOU_THRESH: f64 = 0.45;

/// Letterbox fill value (YOLO convention).
const PAD_GRAY: f32 = 114.0 / 255.0;

pub struct OnnxYoloDetector {
    session: ort::session::Session,
    confidence: f64,
    input_size: u32,
}

impl OnnxYoloDetector {
    /// Load a YOLO ONNX model and prepare for inference.
    ///
    /// The input resolution is read from the model's input shape (expecting NCHW).
    /// Falls back to 640 if the shape is dynamic or unreadable.
    pub fn new(
        model_path: &Path,
        confidence: f64,
        accelerated: bool,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let session = ort::session::Session::builder()?
            .with_execution_providers(execution_providers(accelerated))?
            .commit_from_file(model_path)?;

        let input_size = session
            .inputs()
            .first()
            .and_then(|input| match input.dtype() {
                ort::value::ValueType::Tensor { ref shape, .. }
                    if shape.len() >= 4 && shape[2] > 0 =>
                {
                    Some(shape[2] as u32)
                }
                _ => None,
            })
            .unwrap_or(DEFAULT_INPUT_SIZE);

        log::info!(
            "Loaded face model {} (input {input_size}px, confidence {confidence})",
            model_path.display()
        );

        Ok(Self {
            session,
            confidence,
            input_size,
        })
    }
}

impl FaceDetector for OnnxYoloDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<DetectedFace>, Box<dyn std::error::Error>> {
        if frame.width() == 0 || frame.height() == 0 {
            return Ok(Vec::new());
        }
        let letterboxed = letterbox(frame, self.input_size);

        let input_value = ort::value::Tensor::from_array(letterboxed.tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        if outputs.len() == 0 {
            return Err("YOLO model produced no outputs".into());
        }
        let tensor = outputs[0].try_extract_array::<f32>()?;
        let shape = tensor.shape().to_vec();
        if shape.len() != 3 {
            return Err(format!("Unexpected YOLO output shape: {shape:?}").into());
        }

        // Either [1, features, detections] or [1, detections, features].
        let transposed = shape[1] < shape[2];
        let (num_dets, num_feats) = if transposed {
            (shape[2], shape[1])
        } else {
            (shape[1], shape[2])
        };
        if num_feats < 5 {
            return Ok(Vec::new());
        }

        let data = tensor.as_slice().ok_or("Cannot get tensor slice")?;
        let feature = |det: usize, f: usize| -> f64 {
            if transposed {
                data[f * num_dets + det] as f64
            } else {
                data[det * num_feats + f] as f64
            }
        };

        let mut candidates = Vec::new();
        for i in 0..num_dets {
            // [cx, cy, w, h, conf, ...keypoints]
            let conf = feature(i, 4);
            if conf < self.confidence {
                continue;
            }
            let (cx, cy, w, h) = (feature(i, 0), feature(i, 1), feature(i, 2), feature(i, 3));
            candidates.push(Candidate {
                bbox: letterboxed.to_source([cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0]),
                confidence: conf,
            });
        }

        let kept = nms(&mut candidates, NMS_IOU_THRESH);
        log::debug!(
            "frame {}: {} candidates, {} after NMS",
            frame.index(),
            candidates.len(),
            kept.len()
        );

        let fw = frame.width() as f64;
        let fh = frame.height() as f64;
        Ok(kept
            .into_iter()
            .filter_map(|c| normalize(c.bbox, fw, fh).map(|b| DetectedFace::new(b, c.confidence)))
            .collect())
    }
}

/// Converts an `[x1, y1, x2, y2]` pixel box into a normalized box clipped
/// to the unit square. Boxes with no area inside the frame are dropped.
fn normalize(bbox: [f64; 4], fw: f64, fh: f64) -> Option<NormalizedBox> {
    let x1 = (bbox[0] / fw).clamp(0.0, 1.0);
    let y1 = (bbox[1] / fh).clamp(0.0, 1.0);
    let x2 = (bbox[2] / fw).clamp(0.0, 1.0);
    let y2 = (bbox[3] / fh).clamp(0.0, 1.0);
    if x2 <= x1 || y2 <= y1 {
        return None;
    }
    Some(NormalizedBox::new(x1, y1, x2 - x1, y2 - y1))
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

struct Letterboxed {
    tensor: ndarray::Array4<f32>,
    scale: f64,
    pad_x: u32,
    pad_y: u32,
}

impl Letterboxed {
    /// Maps a box from model input coordinates back to source pixels.
    fn to_source(&self, b: [f64; 4]) -> [f64; 4] {
        let px = self.pad_x as f64;
        let py = self.pad_y as f64;
        [
            (b[0] - px) / self.scale,
            (b[1] - py) / self.scale,
            (b[2] - px) / self.scale,
            (b[3] - py) / self.scale,
        ]
    }
}

/// Letterbox-resize a frame to `target_size` × `target_size` as an NCHW
/// float tensor in `[0, 1]`.
fn letterbox(frame: &Frame, target_size: u32) -> Letterboxed {
    let fw = frame.width() as f64;
    let fh = frame.height() as f64;
    let target = target_size as f64;

    let scale = (target / fw).min(target / fh);
    let new_w = ((fw * scale).round() as u32).min(target_size);
    let new_h = ((fh * scale).round() as u32).min(target_size);
    let pad_x = (target_size - new_w) / 2;
    let pad_y = (target_size - new_h) / 2;

    let mut tensor = ndarray::Array4::<f32>::from_elem(
        (1, 3, target_size as usize, target_size as usize),
        PAD_GRAY,
    );

    let src = frame.as_ndarray(); // [H, W, C] u8
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;
    let color_channels = (frame.channels() as usize).min(3);

    // Nearest-neighbor resize into the padded area
    for y in 0..new_h as usize {
        let src_y = ((y as f64 / scale) as usize).min(src_h - 1);
        for x in 0..new_w as usize {
            let src_x = ((x as f64 / scale) as usize).min(src_w - 1);
            let ty = pad_y as usize + y;
            let tx = pad_x as usize + x;
            for c in 0..3 {
                // Grayscale frames replicate their single channel
                let sc = c.min(color_channels - 1);
                tensor[[0, c, ty, tx]] = src[[src_y, src_x, sc]] as f32 / 255.0;
            }
        }
    }

    Letterboxed {
        tensor,
        scale,
        pad_x,
        pad_y,
    }
}

// ---------------------------------------------------------------------------
// NMS
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
struct Candidate {
    bbox: [f64; 4],
    confidence: f64,
}

/// Greedy NMS: sort by confidence descending, suppress overlapping boxes.
fn nms(dets: &mut [Candidate], iou_thresh: f64) -> Vec<Candidate> {
    dets.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut keep: Vec<Candidate> = Vec::new();
    for det in dets.iter() {
        if keep.iter().all(|k| bbox_iou(&k.bbox, &det.bbox) <= iou_thresh) {
            keep.push(det.clone());
        }
    }
    keep
}
