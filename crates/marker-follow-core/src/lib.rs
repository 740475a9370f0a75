//! Core types for marker-follow.
//!
//! Decoded frames, single-channel images, marker quads and the compact pose
//! the rest of the workspace passes around. Nothing here talks to a detector
//! or a compositor.

mod frame;
mod image;
mod logger;
mod pose;

pub use frame::{ColorRange, PixelFormat, Plane, VideoFrame};
pub use image::{GrayImage, GrayImageView};
pub use pose::{MarkerQuad, TrackedPose};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::{init_with_level, level_from_name};
