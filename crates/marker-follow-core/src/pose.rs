//! Marker quads and the compact pose derived from them.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Image-space corners of a detected marker, in detector order.
///
/// Corner 0 is the marker's own top-left corner, the rest follow clockwise.
pub type MarkerQuad = [Point2<f32>; 4];

/// Compact marker pose in image pixels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackedPose {
    pub center: Point2<f64>,
    /// Angle of the `corner0 -> corner1` edge against +x, never wrapped.
    pub rotation_degrees: f64,
    /// Length of the `corner0 -> corner1` edge.
    pub size: f64,
}

impl Default for TrackedPose {
    fn default() -> Self {
        Self {
            center: Point2::origin(),
            rotation_degrees: 0.0,
            size: 0.0,
        }
    }
}

impl TrackedPose {
    /// Reduce a quad to center, rotation and edge size.
    ///
    /// The size is the length of the first edge only; perspective foreshortening
    /// of the other edges is ignored.
    pub fn from_quad(quad: &MarkerQuad) -> Self {
        let mut cx = 0.0f64;
        let mut cy = 0.0f64;
        for c in quad {
            cx += c.x as f64;
            cy += c.y as f64;
        }
        cx /= 4.0;
        cy /= 4.0;

        let vx = (quad[1].x - quad[0].x) as f64;
        let vy = (quad[1].y - quad[0].y) as f64;

        Self {
            center: Point2::new(cx, cy),
            rotation_degrees: vy.atan2(vx).to_degrees(),
            size: vx.hypot(vy),
        }
    }

    /// Same pose moved to another center, rotation and size kept.
    pub fn with_center(self, center: Point2<f64>) -> Self {
        Self { center, ..self }
    }
}
