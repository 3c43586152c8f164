pub mod inference_process;
pub mod yolo_v1;

pub use inference_process::InferenceProcess;
pub use yolo_v1::YoloV1;
