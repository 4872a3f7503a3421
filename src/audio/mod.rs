pub mod cpal_driver;
pub mod driver;

pub use cpal_driver::CpalDriver;
pub use driver::{AudioDriver, FrameCallback};
