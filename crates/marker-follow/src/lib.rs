//! Move a scene element after a fiducial marker seen in live video.
//!
//! This crate wires the workspace together:
//! - [`Controller`]: frame path (preprocess, detect, publish) and tick path
//!   (gate, transform, mutate the scene) around a shared [`PoseHandoff`],
//! - [`Preprocessor`] and the reference [`LumaConverter`],
//! - [`ControllerSettings`] with JSON load/save and a [`settings_schema`] for
//!   editors,
//! - [`replay`]: scripted sessions against the in-memory host.
//!
//! ## Quickstart
//!
//! ```
//! use marker_follow::{Controller, ControllerSettings};
//! use marker_follow::aruco::{Dictionary, MarkerObservation};
//! use marker_follow::core::{GrayImageView, VideoFrame};
//! use marker_follow::scene::memory::MemoryScene;
//! use marker_follow::scene::{NodeId, NodeKind};
//! use nalgebra::Point2;
//! use std::sync::Arc;
//!
//! let host = Arc::new(MemoryScene::new());
//! host.add_node("main", "Main", NodeKind::Scene, 1920, 1080);
//! host.add_node("cam", "Camera", NodeKind::Input, 64, 64);
//! host.add_node("logo", "Logo", NodeKind::Input, 40, 40);
//! host.add_node("follow", "Follow", NodeKind::Filter, 0, 0);
//! host.attach_filter("follow", "cam");
//! host.set_current_scene("main");
//! host.add_item("main", "cam");
//! let logo = host.add_item("main", "logo");
//!
//! let detector = |_: &GrayImageView<'_>, _: &Dictionary| {
//!     vec![MarkerObservation {
//!         id: 0,
//!         corners: [
//!             Point2::new(10.0, 10.0),
//!             Point2::new(50.0, 10.0),
//!             Point2::new(50.0, 50.0),
//!             Point2::new(10.0, 50.0),
//!         ],
//!     }]
//! };
//! let settings = ControllerSettings {
//!     target_node: "logo".into(),
//!     ..ControllerSettings::default()
//! };
//! let controller =
//!     Controller::with_detector(host.clone(), NodeId::new("follow"), settings, Box::new(detector));
//!
//! controller.filter_video(VideoFrame::gray(64, 64, vec![0; 64 * 64], 0));
//! host.run_tick(1.0 / 60.0);
//! assert_eq!(host.item(logo).map(|i| i.position.x), Some(30.0));
//! ```

pub use marker_follow_aruco as aruco;
pub use marker_follow_core as core;
pub use marker_follow_scene as scene;

mod config;
mod controller;
mod handoff;
mod preprocess;
pub mod replay;
mod schema;

pub use config::{ControllerSettings, SettingsError, SettingsIoError};
pub use controller::Controller;
pub use handoff::{PoseHandoff, PoseSnapshot};
pub use preprocess::{
    ConvertError, ConverterFactory, ConverterKey, FrameConverter, LumaConverter,
    LumaConverterFactory, Preprocessor,
};
pub use schema::{settings_schema, target_choices, Choice, Property, PropertyGroup, PropertyKind};

pub use marker_follow_core::{init_with_level, level_from_name, TrackedPose, VideoFrame};
pub use marker_follow_scene::{CoordinateSpace, SceneHost};

/// Install logging for a binary.
///
/// With the `tracing` feature a `tracing` subscriber is installed and `log`
/// records are forwarded to it; otherwise the stderr logger is used.
pub fn init_logging(level: log::LevelFilter, json: bool) -> Result<(), log::SetLoggerError> {
    #[cfg(feature = "tracing")]
    {
        let _ = tracing_log::LogTracer::init();
        let directive = level.to_string().to_ascii_lowercase();
        marker_follow_core::init_tracing(json, &directive);
        Ok(())
    }
    #[cfg(not(feature = "tracing"))]
    {
        if json {
            log::debug!("json logs need the `tracing` feature");
        }
        init_with_level(level)
    }
}
