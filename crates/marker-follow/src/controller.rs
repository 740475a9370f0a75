//! Tracking controller: frame path in, scene mutations out.
//!
//! A [`Controller`] is driven from two contexts:
//! - the frame path ([`Controller::filter_video`]) runs preprocessing and
//!   detection, then publishes into the [`PoseHandoff`];
//! - the host's periodic tick ([`Controller::tick`]) reads the handoff and
//!   moves the target scene item.
//!
//! Locks: the scene state and the frame pipeline each have their own mutex.
//! The only nesting is scene state -> handoff.

use crate::config::ControllerSettings;
use crate::handoff::{PoseHandoff, PoseSnapshot};
use crate::preprocess::{ConverterFactory, ConverterKey, LumaConverterFactory, Preprocessor};
use marker_follow_aruco::{FrameDecimator, MarkerAdapter, MarkerDetector};
use marker_follow_core::VideoFrame;
use marker_follow_scene::{
    compute_transform, CoordinateSpace, GateAction, ItemId, NodeId, Placement, SceneBinding,
    SceneHost, TickToken, TransformParams, VisibilityGate,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

#[cfg(feature = "tracing")]
use tracing::instrument;

struct FramePipeline {
    decimator: FrameDecimator,
    preprocessor: Preprocessor,
    adapter: MarkerAdapter,
}

struct SceneState {
    binding: SceneBinding<dyn SceneHost>,
    target_id: String,
    gate: VisibilityGate,
    bias: f64,
    space: CoordinateSpace,
}

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Moves one scene item after one tracked marker.
pub struct Controller {
    host: Arc<dyn SceneHost>,
    handoff: PoseHandoff,
    pipeline: Mutex<FramePipeline>,
    scene: Mutex<SceneState>,
    settings: Mutex<ControllerSettings>,
    tick_token: Mutex<Option<TickToken>>,
    host_known: AtomicBool,
    torn_down: AtomicBool,
}

impl Controller {
    /// Build a controller, resolve its nodes and register the tick callback.
    ///
    /// Invalid settings fields fall back to their defaults with a warning.
    pub fn create(
        host: Arc<dyn SceneHost>,
        filter: NodeId,
        settings: ControllerSettings,
        detector: Box<dyn MarkerDetector>,
        converters: Box<dyn ConverterFactory>,
    ) -> Arc<Self> {
        let defaults = ControllerSettings::default();
        let mut effective = settings;
        let dictionary = effective.resolve_dictionary().unwrap_or_else(|err| {
            log::warn!("{err}; using {}", defaults.dictionary);
            effective.dictionary = defaults.dictionary.clone();
            Default::default()
        });
        let bias = effective.checked_bias().unwrap_or_else(|err| {
            log::warn!("{err}; using {}", defaults.scaling_bias);
            effective.scaling_bias = defaults.scaling_bias;
            defaults.scaling_bias
        });

        log::info!(
            "creating controller for {filter} (target {:?}, marker {}, {})",
            effective.target_node,
            effective.marker_id,
            dictionary.name,
        );
        let mut binding = SceneBinding::new(Arc::clone(&host), filter);
        binding.resolve_all(&effective.target_node);
        let host_known = binding.host_node().is_some();

        let pipeline = FramePipeline {
            decimator: FrameDecimator::new(effective.skip_frames),
            preprocessor: Preprocessor::new(converters),
            adapter: MarkerAdapter::new(detector, dictionary, effective.marker_id),
        };
        let scene = SceneState {
            binding,
            target_id: effective.target_node.clone(),
            gate: VisibilityGate::new(effective.hide_when_absent),
            bias,
            space: effective.coordinate_space,
        };

        let controller = Arc::new(Self {
            host: Arc::clone(&host),
            handoff: PoseHandoff::new(),
            pipeline: Mutex::new(pipeline),
            scene: Mutex::new(scene),
            settings: Mutex::new(effective),
            tick_token: Mutex::new(None),
            host_known: AtomicBool::new(host_known),
            torn_down: AtomicBool::new(false),
        });

        let weak = Arc::downgrade(&controller);
        let token = host.add_tick_callback(Arc::new(move |seconds| {
            if let Some(controller) = weak.upgrade() {
                controller.tick(seconds);
            }
        }));
        *lock(&controller.tick_token) = Some(token);

        controller
    }

    /// [`Self::create`] with the reference [`LumaConverterFactory`].
    pub fn with_detector(
        host: Arc<dyn SceneHost>,
        filter: NodeId,
        settings: ControllerSettings,
        detector: Box<dyn MarkerDetector>,
    ) -> Arc<Self> {
        Self::create(host, filter, settings, detector, Box::new(LumaConverterFactory))
    }

    /// Apply new settings. Fields that fail validation keep their previous
    /// value; everything else takes effect for the next frame and tick.
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip_all))]
    pub fn update(&self, settings: &ControllerSettings) {
        if self.torn_down.load(Ordering::Acquire) {
            return;
        }
        let mut effective = settings.clone();
        let previous = lock(&self.settings).clone();

        {
            let mut scene = lock(&self.scene);
            scene.target_id = effective.target_node.clone();
            scene.gate = VisibilityGate::new(effective.hide_when_absent);
            scene.space = effective.coordinate_space;
            match effective.checked_bias() {
                Ok(bias) => scene.bias = bias,
                Err(err) => {
                    log::warn!("{err}; keeping {}", previous.scaling_bias);
                    effective.scaling_bias = previous.scaling_bias;
                }
            }
            let target = scene.target_id.clone();
            scene.binding.resolve_all(&target);
            if scene.binding.host_node().is_some() {
                self.host_known.store(true, Ordering::Release);
            }
        }

        {
            let mut pipeline = lock(&self.pipeline);
            pipeline.decimator.set_skip(effective.skip_frames);
            match effective.resolve_dictionary() {
                Ok(dictionary) => pipeline.adapter.set_dictionary(dictionary),
                Err(err) => {
                    log::warn!("{err}; keeping {}", previous.dictionary);
                    effective.dictionary = previous.dictionary.clone();
                }
            }
            pipeline.adapter.set_tracked_id(effective.marker_id);
        }

        log::debug!("settings updated: {effective:?}");
        *lock(&self.settings) = effective;
    }

    /// Re-resolve the target and host items when the filter becomes active.
    pub fn activate(&self) {
        if self.torn_down.load(Ordering::Acquire) {
            return;
        }
        let mut scene = lock(&self.scene);
        let target = scene.target_id.clone();
        scene.binding.resolve_all(&target);
        if scene.binding.host_node().is_some() {
            self.host_known.store(true, Ordering::Release);
        }
    }

    /// Frame path: detect the tracked marker and publish its pose.
    ///
    /// The frame is returned unchanged.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "trace", skip_all, fields(ts = frame.timestamp))
    )]
    pub fn filter_video(&self, frame: VideoFrame) -> VideoFrame {
        if self.torn_down.load(Ordering::Acquire) {
            return frame;
        }
        if !self.host_known.load(Ordering::Acquire) && lock(&self.scene).binding.ensure_host() {
            self.host_known.store(true, Ordering::Release);
        }

        let mut guard = lock(&self.pipeline);
        let FramePipeline {
            decimator,
            preprocessor,
            adapter,
        } = &mut *guard;
        if !decimator.admit() {
            return frame;
        }
        let Some(image) = preprocessor.process(&frame) else {
            return frame;
        };

        match adapter.locate(&image) {
            Some(pose) => {
                let generation = self.handoff.publish_found(pose);
                log::trace!(
                    "marker {} at ({:.1}, {:.1}) rot {:.1} size {:.1} gen {generation}",
                    adapter.tracked_id(),
                    pose.center.x,
                    pose.center.y,
                    pose.rotation_degrees,
                    pose.size,
                );
            }
            None => self.handoff.publish_lost(),
        }
        drop(guard);
        frame
    }

    /// Tick path: apply a pending pose to the target item, or hide it.
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    pub fn tick(&self, _seconds: f32) {
        if self.torn_down.load(Ordering::Acquire) {
            return;
        }
        let scene = lock(&self.scene);
        let snapshot = self.handoff.take();

        match scene.gate.decide(snapshot.marker_visible, snapshot.transform_dirty) {
            GateAction::Idle => {}
            GateAction::Hide => {
                if let Some(item) = scene.binding.target_item() {
                    self.host.set_item_visible(item, false);
                }
            }
            GateAction::Apply => self.apply(&scene, &snapshot),
        }
    }

    fn apply(&self, scene: &SceneState, snapshot: &PoseSnapshot) {
        let binding = &scene.binding;
        let (Some(_), Some(item)) = (binding.target(), binding.target_item()) else {
            return;
        };

        let params = TransformParams {
            target_size: binding.target_size(),
            bias: scene.bias,
            space: scene.space,
            base: binding
                .host_item()
                .and_then(|host_item| self.placement_of(host_item))
                .unwrap_or_default(),
        };
        let transform = match compute_transform(&snapshot.pose, &params) {
            Ok(t) => t,
            Err(err) => {
                log::debug!("skipping tick: {err}");
                return;
            }
        };

        self.host.set_item_visible(item, true);
        self.host.set_item_position(item, transform.position);
        self.host.set_item_scale(item, transform.scale);
        self.host.set_item_rotation(item, transform.rotation);

        if !self.handoff.clear_if(snapshot.generation) {
            log::trace!("pose {} superseded while applying", snapshot.generation);
        }
    }

    fn placement_of(&self, item: ItemId) -> Option<Placement> {
        Some(Placement {
            position: self.host.item_position(item)?,
            scale: self.host.item_scale(item)?,
        })
    }

    /// Unregister the tick callback, release the target and the converter.
    ///
    /// Runs once; later calls and the eventual drop do nothing.
    pub fn destroy(&self) {
        if self.torn_down.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(token) = lock(&self.tick_token).take() {
            self.host.remove_tick_callback(token);
        }
        lock(&self.scene).binding.release();
        lock(&self.pipeline).preprocessor.release();
        log::info!("controller for {} torn down", lock(&self.scene).binding.filter());
    }

    /// Copy of the shared pose state.
    pub fn snapshot(&self) -> PoseSnapshot {
        self.handoff.take()
    }

    /// Settings in effect, after validation.
    pub fn settings(&self) -> ControllerSettings {
        lock(&self.settings).clone()
    }

    pub fn target_item(&self) -> Option<ItemId> {
        lock(&self.scene).binding.target_item()
    }

    pub fn host_item(&self) -> Option<ItemId> {
        lock(&self.scene).binding.host_item()
    }

    pub fn converter_key(&self) -> Option<ConverterKey> {
        lock(&self.pipeline).preprocessor.converter_key()
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::Acquire)
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.destroy();
    }
}
