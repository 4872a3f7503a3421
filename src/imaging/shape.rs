//! Shape classification capability.
//!
//! Classification itself is an external collaborator (the reference
//! deployment runs a contour-based classifier outside this crate); the
//! pipeline only defines the closed label set and the capability trait
//! an implementation plugs into.

use serde::{Deserialize, Serialize};

use crate::imaging::physical::PhysicalImage;

/// Closed set of coarse shape labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShapeLabel {
    Unknown,
    Circle,
    Rectangle,
    Square,
    Triangle,
    Ellipse,
    Polygon,
}

impl std::fmt::Display for ShapeLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ShapeLabel::Unknown => "unknown",
            ShapeLabel::Circle => "circle",
            ShapeLabel::Rectangle => "rectangle",
            ShapeLabel::Square => "square",
            ShapeLabel::Triangle => "triangle",
            ShapeLabel::Ellipse => "ellipse",
            ShapeLabel::Polygon => "polygon",
        };
        f.write_str(name)
    }
}

/// Injected classifier: consumes a centred physical image and an
/// intensity threshold, returns a label from the closed set.
pub trait ShapeClassifier: Send {
    fn classify(&self, physical: &PhysicalImage, threshold: f32) -> ShapeLabel;
}
