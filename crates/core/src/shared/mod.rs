pub mod bounding_box;
pub mod clock;
pub mod constants;
pub mod frame;
pub mod math;
pub mod model_resolver;
