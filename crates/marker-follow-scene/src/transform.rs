//! Pose -> scene item transform.

use marker_follow_core::TrackedPose;
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

/// How a pose in image pixels maps into scene coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinateSpace {
    /// Image pixels are scene pixels.
    Scene,
    /// Compose with the host item's position and scale, so the target follows
    /// the marker wherever the host video is placed.
    #[default]
    HostRelative,
}

/// Position and scale of a scene item.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub position: Vector2<f32>,
    pub scale: Vector2<f32>,
}

impl Placement {
    pub fn identity() -> Self {
        Self {
            position: Vector2::zeros(),
            scale: Vector2::new(1.0, 1.0),
        }
    }
}

impl Default for Placement {
    fn default() -> Self {
        Self::identity()
    }
}

/// Transform applied to the target item.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeTransform {
    pub position: Vector2<f32>,
    pub scale: Vector2<f32>,
    pub rotation: f32,
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformError {
    #[error("target has a degenerate size ({width}x{height})")]
    DegenerateTarget { width: u32, height: u32 },
}

/// Inputs of [`compute_transform`] besides the pose.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TransformParams {
    /// Intrinsic `(width, height)` of the target node.
    pub target_size: (u32, u32),
    /// Proportional scale adjustment, nominally in `[-1, 1]`.
    pub bias: f64,
    pub space: CoordinateSpace,
    /// Host item placement, used in [`CoordinateSpace::HostRelative`].
    pub base: Placement,
}

/// Compute the target transform for `pose`.
///
/// The scale is normalized against the shorter side of the target so the
/// target's aspect ratio is kept, then grown by `scale * bias`. A negative
/// component on either axis zeroes both.
pub fn compute_transform(
    pose: &TrackedPose,
    params: &TransformParams,
) -> Result<NodeTransform, TransformError> {
    let (width, height) = params.target_size;
    let short_side = width.min(height);
    if short_side == 0 {
        return Err(TransformError::DegenerateTarget { width, height });
    }

    let base = match params.space {
        CoordinateSpace::Scene => Placement::identity(),
        CoordinateSpace::HostRelative => params.base,
    };
    let base_pos = base.position.cast::<f64>();
    let base_scale = base.scale.cast::<f64>();

    let position = Vector2::new(
        pose.center.x * base_scale.x + base_pos.x,
        pose.center.y * base_scale.y + base_pos.y,
    );

    let factor = pose.size / short_side as f64;
    let mut scale = base_scale * factor;
    scale += scale * params.bias;
    if scale.x < 0.0 || scale.y < 0.0 {
        scale = Vector2::zeros();
    }

    Ok(NodeTransform {
        position: position.cast::<f32>(),
        scale: scale.cast::<f32>(),
        rotation: pose.rotation_degrees as f32,
    })
}
