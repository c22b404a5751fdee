pub mod execution_provider;
pub mod fixed_face_detector;
mod math;
pub mod model_resolver;
pub mod onnx_yolo_detector;
