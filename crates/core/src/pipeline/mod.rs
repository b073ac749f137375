pub mod face_crop;
pub mod frame_result;
pub mod frame_sink;
pub mod infrastructure;
pub mod liveness_gate_use_case;
pub mod pipeline_logger;
pub mod presence_register;
