use approx::assert_relative_eq;
use marker_follow::aruco::MarkerObservation;
use marker_follow::core::MarkerQuad;
use marker_follow::replay::{ScriptHandle, ScriptedDetector};
use marker_follow::scene::memory::{ItemState, MemoryScene};
use marker_follow::scene::{ItemId, NodeId, NodeKind};
use marker_follow::{
    ConvertError, ConverterFactory, ConverterKey, Controller, ControllerSettings, CoordinateSpace,
    FrameConverter, LumaConverterFactory, VideoFrame,
};
use nalgebra::{Point2, Vector2};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

const FRAME_SIDE: u32 = 64;

struct Rig {
    host: Arc<MemoryScene>,
    controller: Arc<Controller>,
    script: ScriptHandle,
    camera: ItemId,
    target: ItemId,
    frames: u64,
}

impl Rig {
    fn new(target_size: (u32, u32), settings: ControllerSettings) -> Self {
        Self::with_factory(target_size, settings, Box::new(LumaConverterFactory))
    }

    fn with_factory(
        target_size: (u32, u32),
        settings: ControllerSettings,
        factory: Box<dyn ConverterFactory>,
    ) -> Self {
        let host = Arc::new(MemoryScene::new());
        host.add_node("main", "Main", NodeKind::Scene, 1920, 1080);
        host.add_node("camera", "Camera", NodeKind::Input, FRAME_SIDE, FRAME_SIDE);
        host.add_node("logo", "Logo", NodeKind::Input, target_size.0, target_size.1);
        host.add_node("follow", "Follow", NodeKind::Filter, 0, 0);
        host.attach_filter("follow", "camera");
        host.set_current_scene("main");
        let camera = host.add_item("main", "camera");
        let target = host.add_item("main", "logo");

        let (detector, script) = ScriptedDetector::new();
        let controller = Controller::create(
            host.clone(),
            NodeId::new("follow"),
            settings,
            Box::new(detector),
            factory,
        );
        Self {
            host,
            controller,
            script,
            camera,
            target,
            frames: 0,
        }
    }

    fn frame(&mut self, markers: Vec<MarkerObservation>) {
        self.script.set(markers);
        let side = FRAME_SIDE as usize;
        let frame = VideoFrame::gray(FRAME_SIDE, FRAME_SIDE, vec![0; side * side], self.frames);
        self.frames += 1;
        self.controller.filter_video(frame);
    }

    fn tick(&self) {
        self.host.run_tick(1.0 / 60.0);
    }

    fn target_state(&self) -> ItemState {
        self.host.item(self.target).expect("target item")
    }
}

fn settings(marker_id: i32) -> ControllerSettings {
    ControllerSettings {
        target_node: "logo".into(),
        marker_id,
        ..ControllerSettings::default()
    }
}

fn square(x: f32, y: f32, side: f32) -> MarkerQuad {
    [
        Point2::new(x, y),
        Point2::new(x + side, y),
        Point2::new(x + side, y + side),
        Point2::new(x, y + side),
    ]
}

fn marker(id: i32, corners: MarkerQuad) -> Vec<MarkerObservation> {
    vec![MarkerObservation { id, corners }]
}

#[test]
fn absent_frames_then_marker_two_becomes_visible() {
    let mut rig = Rig::new((40, 40), settings(2));

    for i in 1..=5 {
        let markers = if i == 3 {
            marker(7, square(0.0, 0.0, 20.0))
        } else {
            Vec::new()
        };
        rig.frame(markers);
        let snap = rig.controller.snapshot();
        assert!(!snap.marker_visible, "frame {i}");
        assert!(!snap.transform_dirty, "frame {i}");
        rig.tick();
        assert!(!rig.target_state().visible, "frame {i}");
    }

    for i in 6..=8 {
        rig.frame(marker(2, square(10.0, 10.0, 40.0)));
        let snap = rig.controller.snapshot();
        assert!(snap.marker_visible, "frame {i}");
        assert_relative_eq!(snap.pose.rotation_degrees, 0.0);
        assert_relative_eq!(snap.pose.size, 40.0);
        assert_relative_eq!(snap.pose.center.x, 30.0);
        assert_relative_eq!(snap.pose.center.y, 30.0);
    }

    rig.tick();
    let state = rig.target_state();
    assert!(state.visible);
    assert_relative_eq!(state.position.x, 30.0);
    assert_relative_eq!(state.position.y, 30.0);
    assert_relative_eq!(state.scale.x, 1.0);
    assert_relative_eq!(state.scale.y, 1.0);
    assert_relative_eq!(state.rotation, 0.0);
    assert!(!rig.controller.snapshot().transform_dirty);
}

#[test]
fn lost_marker_keeps_last_known_center() {
    let mut rig = Rig::new((40, 40), settings(0));
    rig.frame(marker(0, square(20.0, 4.0, 10.0)));
    rig.frame(Vec::new());
    rig.frame(marker(5, square(40.0, 40.0, 10.0)));

    let snap = rig.controller.snapshot();
    assert!(!snap.marker_visible);
    assert_relative_eq!(snap.pose.center.x, 25.0);
    assert_relative_eq!(snap.pose.center.y, 9.0);
    assert_eq!(snap.last_known, Point2::new(25.0, 9.0));
    assert!(snap.transform_dirty);

    // hidden, and the pending pose is held back until the marker returns
    rig.tick();
    let state = rig.target_state();
    assert!(!state.visible);
    assert_eq!(state.transform_writes, 0);
    assert!(rig.controller.snapshot().transform_dirty);

    rig.frame(marker(0, square(30.0, 30.0, 10.0)));
    rig.tick();
    let state = rig.target_state();
    assert!(state.visible);
    assert_relative_eq!(state.position.x, 35.0);
    assert_eq!(state.transform_writes, 3);
}

#[test]
fn rotation_follows_first_edge() {
    let mut rig = Rig::new((10, 10), settings(0));
    let corners = [
        Point2::new(10.0, 10.0),
        Point2::new(13.0, 14.0),
        Point2::new(9.0, 17.0),
        Point2::new(6.0, 13.0),
    ];
    rig.frame(marker(0, corners));
    rig.tick();

    let expected = 4.0f64.atan2(3.0).to_degrees();
    assert_relative_eq!(rig.controller.snapshot().pose.rotation_degrees, expected, epsilon = 1e-9);
    assert_relative_eq!(rig.target_state().rotation, expected as f32, epsilon = 1e-4);
    assert_relative_eq!(rig.controller.snapshot().pose.size, 5.0, epsilon = 1e-6);
}

#[test]
fn scale_is_normalized_against_short_side() {
    let mut rig = Rig::new((200, 100), settings(0));
    rig.frame(marker(0, square(0.0, 0.0, 50.0)));
    rig.tick();
    let state = rig.target_state();
    assert_relative_eq!(state.scale.x, 0.5);
    assert_relative_eq!(state.scale.y, 0.5);
}

#[test]
fn negative_scale_collapses_to_zero() {
    let mut rig = Rig::new(
        (40, 40),
        ControllerSettings {
            scaling_bias: -1.5,
            ..settings(0)
        },
    );
    rig.frame(marker(0, square(0.0, 0.0, 40.0)));
    rig.tick();
    assert_eq!(rig.target_state().scale, Vector2::new(0.0, 0.0));
}

#[test]
fn positive_bias_grows_scale() {
    let mut rig = Rig::new(
        (40, 40),
        ControllerSettings {
            scaling_bias: 0.25,
            ..settings(0)
        },
    );
    rig.frame(marker(0, square(0.0, 0.0, 40.0)));
    rig.tick();
    assert_relative_eq!(rig.target_state().scale.x, 1.25);
}

#[test]
fn skip_three_detects_on_every_third_frame() {
    let mut rig = Rig::new(
        (40, 40),
        ControllerSettings {
            skip_frames: 3,
            ..settings(0)
        },
    );
    let mut detected_on = Vec::new();
    for frame in 1..=10 {
        let before = rig.script.calls();
        rig.frame(marker(0, square(0.0, 0.0, 10.0)));
        if rig.script.calls() > before {
            detected_on.push(frame);
        }
    }
    assert_eq!(detected_on, vec![3, 6, 9]);
    assert_eq!(rig.controller.snapshot().generation, 3);
}

#[test]
fn repeated_ticks_apply_a_pose_once() {
    let mut rig = Rig::new((40, 40), settings(0));
    rig.frame(marker(0, square(0.0, 0.0, 40.0)));
    rig.tick();
    rig.tick();
    rig.tick();
    assert_eq!(rig.target_state().transform_writes, 3);

    rig.frame(marker(0, square(4.0, 0.0, 40.0)));
    rig.tick();
    rig.tick();
    let state = rig.target_state();
    assert_eq!(state.transform_writes, 6);
    assert_relative_eq!(state.position.x, 24.0);
}

#[test]
fn pose_follows_host_placement() {
    let mut rig = Rig::new((40, 40), settings(0));
    rig.host
        .place_item(rig.camera, Vector2::new(100.0, 50.0), Vector2::new(0.5, 0.5));
    rig.frame(marker(0, square(10.0, 10.0, 40.0)));
    rig.tick();
    let state = rig.target_state();
    assert_relative_eq!(state.position.x, 115.0);
    assert_relative_eq!(state.position.y, 65.0);
    assert_relative_eq!(state.scale.x, 0.5);

    rig.controller.update(&ControllerSettings {
        coordinate_space: CoordinateSpace::Scene,
        ..settings(0)
    });
    rig.frame(marker(0, square(10.0, 10.0, 40.0)));
    rig.tick();
    let state = rig.target_state();
    assert_relative_eq!(state.position.x, 30.0);
    assert_relative_eq!(state.scale.x, 1.0);
}

#[test]
fn visibility_is_left_alone_when_hiding_is_off() {
    let mut rig = Rig::new(
        (40, 40),
        ControllerSettings {
            hide_when_absent: false,
            ..settings(0)
        },
    );
    rig.frame(Vec::new());
    rig.tick();
    assert!(rig.target_state().visible);

    rig.frame(marker(0, square(0.0, 0.0, 40.0)));
    rig.frame(Vec::new());
    rig.tick();
    let state = rig.target_state();
    assert!(state.visible);
    assert_eq!(state.transform_writes, 3);
}

#[test]
fn empty_target_never_touches_the_scene() {
    let mut rig = Rig::new((40, 40), settings(0));
    rig.controller.update(&ControllerSettings {
        target_node: String::new(),
        ..settings(0)
    });
    assert_eq!(rig.host.ref_count("logo"), 0);
    assert!(rig.controller.target_item().is_none());

    rig.frame(marker(0, square(0.0, 0.0, 40.0)));
    rig.tick();
    assert_eq!(rig.target_state().transform_writes, 0);
    assert!(rig.controller.snapshot().transform_dirty);
}

#[test]
fn degenerate_target_waits_for_a_usable_size() {
    let mut rig = Rig::new((0, 40), settings(0));
    rig.frame(marker(0, square(0.0, 0.0, 40.0)));
    rig.tick();
    assert_eq!(rig.target_state().transform_writes, 0);
    assert!(rig.controller.snapshot().transform_dirty);

    rig.host.set_node_size("logo", 40, 40);
    rig.controller.activate();
    rig.tick();
    assert_eq!(rig.target_state().transform_writes, 3);
    assert!(!rig.controller.snapshot().transform_dirty);
}

#[test]
fn settings_update_swaps_target_and_keeps_invalid_fields() {
    let mut rig = Rig::new((40, 40), settings(0));
    assert_eq!(rig.host.ref_count("logo"), 1);

    rig.controller.update(&ControllerSettings {
        target_node: "camera".into(),
        dictionary: "DICT_5X5_100".into(),
        ..settings(3)
    });
    assert_eq!(rig.host.ref_count("logo"), 0);
    assert_eq!(rig.host.ref_count("camera"), 1);
    assert_eq!(rig.controller.target_item(), Some(rig.camera));

    rig.controller.update(&ControllerSettings {
        target_node: "camera".into(),
        dictionary: "DICT_BOGUS".into(),
        scaling_bias: f64::INFINITY,
        ..settings(3)
    });
    let effective = rig.controller.settings();
    assert_eq!(effective.dictionary, "DICT_5X5_100");
    assert_eq!(effective.scaling_bias, 0.0);
    assert_eq!(effective.marker_id, 3);

    rig.frame(marker(0, square(0.0, 0.0, 10.0)));
    assert!(!rig.controller.snapshot().marker_visible);
    rig.frame(marker(3, square(0.0, 0.0, 10.0)));
    assert!(rig.controller.snapshot().marker_visible);
}

#[test]
fn invalid_initial_fields_fall_back_to_defaults() {
    let rig = Rig::new(
        (40, 40),
        ControllerSettings {
            dictionary: "nope".into(),
            scaling_bias: f64::NAN,
            ..settings(0)
        },
    );
    let effective = rig.controller.settings();
    assert_eq!(effective.dictionary, "DICT_4X4_50");
    assert_eq!(effective.scaling_bias, 0.0);
}

#[test]
fn host_item_resolves_on_first_frame() {
    let host = Arc::new(MemoryScene::new());
    host.add_node("main", "Main", NodeKind::Scene, 1920, 1080);
    host.add_node("camera", "Camera", NodeKind::Input, 64, 64);
    host.add_node("logo", "Logo", NodeKind::Input, 40, 40);
    host.set_current_scene("main");
    let camera = host.add_item("main", "camera");
    host.add_item("main", "logo");

    let (detector, _script) = ScriptedDetector::new();
    let controller = Controller::with_detector(
        host.clone(),
        NodeId::new("follow"),
        settings(0),
        Box::new(detector),
    );
    assert!(controller.host_item().is_none());

    host.attach_filter("follow", "camera");
    controller.filter_video(VideoFrame::gray(4, 4, vec![0; 16], 0));
    assert_eq!(controller.host_item(), Some(camera));
}

struct CountingFactory {
    created: Arc<AtomicUsize>,
}

impl ConverterFactory for CountingFactory {
    fn create(&self, key: ConverterKey) -> Result<Box<dyn FrameConverter>, ConvertError> {
        self.created.fetch_add(1, Ordering::SeqCst);
        LumaConverterFactory.create(key)
    }
}

#[test]
fn converter_is_reused_until_geometry_changes() {
    let created = Arc::new(AtomicUsize::new(0));
    let mut rig = Rig::with_factory(
        (40, 40),
        settings(0),
        Box::new(CountingFactory {
            created: Arc::clone(&created),
        }),
    );
    for _ in 0..4 {
        rig.frame(Vec::new());
    }
    assert_eq!(created.load(Ordering::SeqCst), 1);

    rig.controller
        .filter_video(VideoFrame::gray(8, 8, vec![0; 64], 99));
    assert_eq!(created.load(Ordering::SeqCst), 2);
    assert!(rig.controller.converter_key().is_some());

    rig.controller.destroy();
    assert!(rig.controller.converter_key().is_none());
}

#[test]
fn unreadable_frames_skip_detection() {
    let mut rig = Rig::new((40, 40), settings(0));
    rig.script.set(marker(0, square(0.0, 0.0, 10.0)));
    rig.controller.filter_video(VideoFrame::gray(0, 0, Vec::new(), 0));
    assert_eq!(rig.script.calls(), 0);
    assert_eq!(rig.controller.snapshot().generation, 0);

    rig.frame(marker(0, square(0.0, 0.0, 10.0)));
    assert_eq!(rig.script.calls(), 1);
}

#[test]
fn teardown_releases_everything_once() {
    let mut rig = Rig::new((40, 40), settings(0));
    rig.frame(marker(0, square(0.0, 0.0, 40.0)));
    assert_eq!(rig.host.tick_callbacks(), 1);
    assert_eq!(rig.host.outstanding_refs(), 1);

    rig.controller.destroy();
    rig.controller.destroy();
    assert!(rig.controller.is_torn_down());
    assert_eq!(rig.host.tick_callbacks(), 0);
    assert_eq!(rig.host.outstanding_refs(), 0);

    rig.tick();
    rig.controller.tick(0.016);
    assert_eq!(rig.target_state().transform_writes, 0);

    let Rig { host, controller, .. } = rig;
    drop(controller);
    assert_eq!(host.outstanding_refs(), 0);
    assert_eq!(host.unbalanced_releases(), 0);
}

#[test]
fn dropping_the_controller_unregisters_the_tick() {
    let rig = Rig::new((40, 40), settings(0));
    let Rig { host, controller, .. } = rig;
    assert_eq!(host.tick_callbacks(), 1);
    drop(controller);
    assert_eq!(host.tick_callbacks(), 0);
    assert_eq!(host.outstanding_refs(), 0);
    host.run_tick(0.016);
}

#[test]
fn concurrent_frames_and_ticks_settle_on_the_last_pose() {
    const FRAMES: u64 = 2_000;
    let rig = Rig::new((40, 40), settings(0));
    let stop = Arc::new(AtomicBool::new(false));

    let ticker = {
        let host = Arc::clone(&rig.host);
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            let mut ticks = 0usize;
            while !stop.load(Ordering::SeqCst) {
                host.run_tick(1.0 / 60.0);
                ticks += 1;
            }
            ticks
        })
    };
    let video = {
        let controller = Arc::clone(&rig.controller);
        let script = rig.script.clone();
        thread::spawn(move || {
            let side = FRAME_SIDE as usize;
            for i in 0..FRAMES {
                script.set(marker(0, square(i as f32, 0.0, 40.0)));
                let frame = VideoFrame::gray(FRAME_SIDE, FRAME_SIDE, vec![0; side * side], i);
                controller.filter_video(frame);
            }
        })
    };

    video.join().expect("video thread");
    stop.store(true, Ordering::SeqCst);
    let ticks = ticker.join().expect("tick thread");
    assert!(ticks > 0);

    rig.tick();
    let state = rig.target_state();
    assert_relative_eq!(state.position.x, (FRAMES - 1) as f32 + 20.0);
    assert_relative_eq!(state.position.y, 20.0);
    assert!(state.visible);
    assert_eq!(rig.controller.snapshot().generation, FRAMES);
    assert!(!rig.controller.snapshot().transform_dirty);
}
