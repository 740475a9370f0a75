//! Offline replay of a scripted session against the in-memory host.
//!
//! A scenario lists the scene graph, the initial settings and a timeline of
//! frames, ticks and settings updates. Detections are scripted per frame, so
//! a replay exercises the full controller without a real detector.

use crate::config::{ControllerSettings, SettingsIoError};
use crate::controller::Controller;
use crate::handoff::PoseSnapshot;
use marker_follow_aruco::{Dictionary, MarkerDetector, MarkerObservation};
use marker_follow_core::{GrayImageView, MarkerQuad, VideoFrame};
use marker_follow_scene::memory::{ItemState, MemoryScene};
use marker_follow_scene::{NodeId, NodeKind};
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Nominal frame interval used for replay timestamps (30 fps).
const FRAME_INTERVAL_NS: u64 = 33_333_333;

#[derive(thiserror::Error, Debug)]
pub enum ReplayError {
    #[error(transparent)]
    Io(#[from] SettingsIoError),
    #[cfg(feature = "image")]
    #[error("failed to load frame image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("frame image {0} needs the `image` feature")]
    ImageUnsupported(PathBuf),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeSpec {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub kind: NodeKind,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
}

fn origin() -> Vector2<f32> {
    Vector2::zeros()
}

fn unit_scale() -> Vector2<f32> {
    Vector2::new(1.0, 1.0)
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ItemSpec {
    pub scene: String,
    pub node: String,
    #[serde(default = "origin")]
    pub position: Vector2<f32>,
    #[serde(default = "unit_scale")]
    pub scale: Vector2<f32>,
}

/// The filter running the controller and the node it is attached to.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FilterSpec {
    pub id: String,
    #[serde(default)]
    pub parent: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScriptedMarker {
    pub id: i32,
    pub corners: MarkerQuad,
}

/// One incoming frame. Without an image, a blank gray frame of
/// `width x height` is used.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FrameSpec {
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(default)]
    pub image: Option<PathBuf>,
    /// Markers the detector reports for this frame.
    #[serde(default)]
    pub markers: Vec<ScriptedMarker>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineEvent {
    Frame(FrameSpec),
    /// Elapsed seconds passed to the tick.
    Tick(f32),
    Update(ControllerSettings),
    Activate,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Scenario {
    pub nodes: Vec<NodeSpec>,
    #[serde(default)]
    pub items: Vec<ItemSpec>,
    #[serde(default)]
    pub current_scene: Option<String>,
    pub filter: FilterSpec,
    #[serde(default)]
    pub settings: ControllerSettings,
    #[serde(default)]
    pub timeline: Vec<TimelineEvent>,
}

impl Scenario {
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, SettingsIoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Populate an in-memory host with the scenario's scene graph.
    pub fn build_host(&self) -> Arc<MemoryScene> {
        let host = Arc::new(MemoryScene::new());
        for node in &self.nodes {
            let name = if node.name.is_empty() {
                &node.id
            } else {
                &node.name
            };
            host.add_node(&node.id, name, node.kind, node.width, node.height);
        }
        if !self.nodes.iter().any(|n| n.id == self.filter.id) {
            host.add_node(&self.filter.id, &self.filter.id, NodeKind::Filter, 0, 0);
        }
        if let Some(parent) = &self.filter.parent {
            host.attach_filter(&self.filter.id, parent);
        }
        for item in &self.items {
            let id = host.add_item(&item.scene, &item.node);
            host.place_item(id, item.position, item.scale);
        }
        if let Some(scene) = &self.current_scene {
            host.set_current_scene(scene);
        }
        host
    }
}

/// Detector returning whatever was last scripted through its [`ScriptHandle`].
#[derive(Debug, Default)]
pub struct ScriptedDetector {
    script: Arc<Mutex<Vec<MarkerObservation>>>,
    calls: Arc<AtomicUsize>,
}

/// Sets the markers a [`ScriptedDetector`] reports next.
#[derive(Clone, Debug)]
pub struct ScriptHandle {
    script: Arc<Mutex<Vec<MarkerObservation>>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedDetector {
    pub fn new() -> (Self, ScriptHandle) {
        let detector = Self::default();
        let handle = ScriptHandle {
            script: Arc::clone(&detector.script),
            calls: Arc::clone(&detector.calls),
        };
        (detector, handle)
    }
}

impl ScriptHandle {
    pub fn set(&self, markers: Vec<MarkerObservation>) {
        *self.script.lock().unwrap_or_else(|e| e.into_inner()) = markers;
    }

    /// Number of detector invocations so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl MarkerDetector for ScriptedDetector {
    fn detect(
        &mut self,
        _image: &GrayImageView<'_>,
        _dictionary: &Dictionary,
    ) -> Vec<MarkerObservation> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct TickRecord {
    /// Position of the tick in the timeline.
    pub event: usize,
    pub generation: u64,
    pub marker_visible: bool,
    pub transform_dirty: bool,
    pub target: Option<ItemState>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ReplayReport {
    pub frames: usize,
    pub detector_calls: usize,
    pub ticks: Vec<TickRecord>,
    pub final_state: PoseSnapshot,
    /// Node references still held after teardown.
    pub leaked_refs: usize,
    /// Tick callbacks still registered after teardown.
    pub leaked_ticks: usize,
}

impl ReplayReport {
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), SettingsIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

fn frame_for(spec: &FrameSpec, index: usize, base_dir: &Path) -> Result<VideoFrame, ReplayError> {
    let timestamp = index as u64 * FRAME_INTERVAL_NS;
    match &spec.image {
        Some(path) => load_gray_frame(&base_dir.join(path), timestamp),
        None => {
            let len = spec.width as usize * spec.height as usize;
            Ok(VideoFrame::gray(spec.width, spec.height, vec![0; len], timestamp))
        }
    }
}

#[cfg(feature = "image")]
fn load_gray_frame(path: &Path, timestamp: u64) -> Result<VideoFrame, ReplayError> {
    let img = image::ImageReader::open(path)
        .map_err(|e| ReplayError::Image {
            path: path.to_path_buf(),
            source: image::ImageError::IoError(e),
        })?
        .decode()
        .map_err(|source| ReplayError::Image {
            path: path.to_path_buf(),
            source,
        })?
        .to_luma8();
    let (width, height) = img.dimensions();
    Ok(VideoFrame::gray(width, height, img.into_raw(), timestamp))
}

#[cfg(not(feature = "image"))]
fn load_gray_frame(path: &Path, _timestamp: u64) -> Result<VideoFrame, ReplayError> {
    Err(ReplayError::ImageUnsupported(path.to_path_buf()))
}

/// Run `scenario` against a fresh in-memory host.
///
/// Relative image paths are resolved against `base_dir`.
pub fn run_scenario(scenario: &Scenario, base_dir: &Path) -> Result<ReplayReport, ReplayError> {
    let host = scenario.build_host();
    let (detector, script) = ScriptedDetector::new();
    let controller = Controller::with_detector(
        host.clone(),
        NodeId::new(scenario.filter.id.as_str()),
        scenario.settings.clone(),
        Box::new(detector),
    );

    let mut frames = 0;
    let mut ticks = Vec::new();
    for (event, step) in scenario.timeline.iter().enumerate() {
        match step {
            TimelineEvent::Frame(spec) => {
                let frame = frame_for(spec, frames, base_dir)?;
                script.set(
                    spec.markers
                        .iter()
                        .map(|m| MarkerObservation {
                            id: m.id,
                            corners: m.corners,
                        })
                        .collect(),
                );
                controller.filter_video(frame);
                frames += 1;
            }
            TimelineEvent::Tick(seconds) => {
                host.run_tick(*seconds);
                let state = controller.snapshot();
                ticks.push(TickRecord {
                    event,
                    generation: state.generation,
                    marker_visible: state.marker_visible,
                    transform_dirty: state.transform_dirty,
                    target: controller.target_item().and_then(|item| host.item(item)),
                });
            }
            TimelineEvent::Update(settings) => controller.update(settings),
            TimelineEvent::Activate => controller.activate(),
        }
    }

    let final_state = controller.snapshot();
    controller.destroy();
    drop(controller);
    log::info!("replayed {frames} frame(s), {} tick(s)", ticks.len());

    Ok(ReplayReport {
        frames,
        detector_calls: script.calls(),
        ticks,
        final_state,
        leaked_refs: host.outstanding_refs(),
        leaked_ticks: host.tick_callbacks(),
    })
}

/// Load a scenario file and replay it.
pub fn replay_file(path: impl AsRef<Path>) -> Result<ReplayReport, ReplayError> {
    let path = path.as_ref();
    let scenario = Scenario::load_json(path)?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    run_scenario(&scenario, base_dir)
}
