// Audio - Clock, click rendering and the cpal output stream

pub mod click;
pub mod clock;
pub mod device;
pub mod engine;
