pub mod physical;
pub mod shape;

pub use physical::{ObjectSize, PhysicalImage, PhysicalMapper};
pub use shape::{ShapeClassifier, ShapeLabel};
