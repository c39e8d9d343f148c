// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the draw state machine, using an in-memory backend

use depth_clipper::backends::camera::{
    CaptureMode, CapturedFrame, ConfidenceLevel, SyntheticFrameSource, SyntheticOptions,
    ViewportSize,
};
use depth_clipper::errors::RendererError;
use depth_clipper::render::{
    CompositeUniforms, CompositorBackend, DrawOutcome, FrameCompletion, Renderer, SkipReason,
    ThresholdState,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Write { slot: usize, uniforms: CompositeUniforms },
    Submit { frame: u64, slot: usize },
    Complete { frame: u64, slot: usize },
}

/// Records everything the renderer asks of it; completions are either
/// signalled immediately or parked until the test releases them
#[derive(Clone)]
struct RecordingBackend {
    events: Arc<Mutex<Vec<Event>>>,
    parked: Arc<Mutex<VecDeque<FrameCompletion>>>,
    auto_complete: bool,
    has_target: bool,
    uploads_fail: bool,
    submits_fail: bool,
}

impl RecordingBackend {
    fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
            parked: Arc::new(Mutex::new(VecDeque::new())),
            auto_complete: true,
            has_target: true,
            uploads_fail: false,
            submits_fail: false,
        }
    }

    fn parking() -> Self {
        Self {
            auto_complete: false,
            ..Self::new()
        }
    }

    fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    fn writes(&self) -> Vec<(usize, CompositeUniforms)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Write { slot, uniforms } => Some((slot, uniforms)),
                _ => None,
            })
            .collect()
    }

    /// Simulate the GPU finishing the oldest parked frame
    fn complete_oldest(&self) -> bool {
        let Some(completion) = self.parked.lock().unwrap().pop_front() else {
            return false;
        };
        self.events.lock().unwrap().push(Event::Complete {
            frame: completion.frame(),
            slot: completion.slot(),
        });
        completion.complete();
        true
    }
}

impl CompositorBackend for RecordingBackend {
    type UniformBuffer = usize;
    type Target = ();
    type Textures = ();

    fn create_uniform_buffer(&mut self, index: usize) -> Result<usize, RendererError> {
        Ok(index)
    }

    fn acquire_target(&mut self) -> Option<()> {
        self.has_target.then_some(())
    }

    fn upload_textures(&mut self, _frame: &CapturedFrame, _mode: CaptureMode) -> Option<()> {
        (!self.uploads_fail).then_some(())
    }

    fn write_uniforms(&mut self, buffer: &usize, uniforms: &CompositeUniforms) {
        self.events.lock().unwrap().push(Event::Write {
            slot: *buffer,
            uniforms: *uniforms,
        });
    }

    fn submit(
        &mut self,
        _target: (),
        buffer: &usize,
        _textures: (),
        completion: FrameCompletion,
    ) -> bool {
        assert_eq!(*buffer, completion.slot());
        if self.submits_fail {
            return false;
        }
        self.events.lock().unwrap().push(Event::Submit {
            frame: completion.frame(),
            slot: completion.slot(),
        });
        if self.auto_complete {
            completion.complete();
        } else {
            self.parked.lock().unwrap().push_back(completion);
        }
        true
    }
}

fn renderer(backend: RecordingBackend, mode: CaptureMode) -> Renderer<RecordingBackend> {
    let renderer = Renderer::new(backend, mode, ThresholdState::default()).unwrap();
    renderer.on_viewport_resized(ViewportSize::new(390.0, 844.0));
    renderer
}

fn slot_of(outcome: DrawOutcome) -> usize {
    match outcome {
        DrawOutcome::Submitted { slot, .. } => slot,
        DrawOutcome::Skipped(reason) => panic!("draw skipped: {reason:?}"),
    }
}

#[test]
fn test_slots_rotate_from_zero() {
    let source = SyntheticFrameSource::new(CaptureMode::DepthSensorWide);
    let mut renderer = renderer(RecordingBackend::new(), CaptureMode::DepthSensorWide);

    let slots: Vec<usize> = (0..4).map(|_| slot_of(renderer.draw(&source))).collect();
    assert_eq!(slots, vec![0, 1, 2, 0]);
    assert_eq!(renderer.gate().available(), 3);
}

#[test]
fn test_unchanged_uniforms_are_not_rewritten() {
    let backend = RecordingBackend::new();
    let source = SyntheticFrameSource::new(CaptureMode::DepthSensorWide);
    let mut renderer = renderer(backend.clone(), CaptureMode::DepthSensorWide);

    for _ in 0..6 {
        renderer.draw(&source);
    }
    // First pass writes every slot once, the second pass writes nothing
    let written: Vec<usize> = backend.writes().iter().map(|(slot, _)| *slot).collect();
    assert_eq!(written, vec![0, 1, 2]);
    assert_eq!(renderer.stats().uniform_uploads, 3);

    renderer.set_near_depth_threshold(0.1);
    renderer.draw(&source);
    let writes = backend.writes();
    assert_eq!(writes.len(), 4);
    assert_eq!(writes[3].0, 0);
    assert_eq!(writes[3].1.near_depth_threshold, 0.1);
}

#[test]
fn test_threshold_changes_reach_the_next_frame() {
    let backend = RecordingBackend::new();
    let source = SyntheticFrameSource::new(CaptureMode::DepthSensorWide);
    let mut renderer = renderer(backend.clone(), CaptureMode::DepthSensorWide);

    let controls = renderer.controls();
    controls.set_far_depth_threshold(0.75);
    controls.set_confidence_threshold(ConfidenceLevel::High);
    renderer.draw(&source);

    let (_, uniforms) = backend.writes()[0];
    assert_eq!(uniforms.far_depth_threshold, 0.75);
    assert_eq!(uniforms.confidence_threshold, 2);
}

#[test]
fn test_slot_is_not_rewritten_before_its_frame_completes() {
    let backend = RecordingBackend::parking();
    let source = Arc::new(SyntheticFrameSource::new(CaptureMode::DepthSensorWide));
    let mut renderer = renderer(backend.clone(), CaptureMode::DepthSensorWide);

    for expected in 0..3 {
        assert_eq!(slot_of(renderer.draw(&source)), expected);
    }
    assert_eq!(renderer.gate().in_flight(), 3);

    // Force the fourth frame to write slot 0 again
    renderer.set_far_depth_threshold(0.9);

    let finished = Arc::new(AtomicBool::new(false));
    let drawer = {
        let finished = Arc::clone(&finished);
        let source = Arc::clone(&source);
        thread::spawn(move || {
            let outcome = renderer.draw(&source);
            finished.store(true, Ordering::SeqCst);
            (outcome, renderer)
        })
    };

    thread::sleep(Duration::from_millis(100));
    assert!(!finished.load(Ordering::SeqCst), "fourth draw must wait for the gate");
    assert_eq!(backend.writes().len(), 3);

    assert!(backend.complete_oldest());
    let (outcome, renderer) = drawer.join().unwrap();
    assert_eq!(slot_of(outcome), 0);

    let events = backend.events();
    let completed = events
        .iter()
        .position(|e| *e == Event::Complete { frame: 1, slot: 0 })
        .unwrap();
    let rewritten = events
        .iter()
        .rposition(|e| matches!(e, Event::Write { slot: 0, .. }))
        .unwrap();
    assert!(completed < rewritten, "slot 0 rewritten while frame 1 was in flight");

    while backend.complete_oldest() {}
    assert_eq!(renderer.gate().available(), 3);
}

#[test]
fn test_incomplete_frames_are_skipped_without_holding_the_gate() {
    let backend = RecordingBackend::parking();
    let source = SyntheticFrameSource::new(CaptureMode::DepthSensorWide);
    let mut renderer = renderer(backend.clone(), CaptureMode::DepthSensorWide);

    source.set_options(SyntheticOptions {
        single_plane_color: true,
        ..Default::default()
    });
    assert_eq!(
        renderer.draw(&source),
        DrawOutcome::Skipped(SkipReason::MissingColorPlanes)
    );

    source.set_options(SyntheticOptions {
        drop_confidence: true,
        ..Default::default()
    });
    assert_eq!(
        renderer.draw(&source),
        DrawOutcome::Skipped(SkipReason::MissingConfidence)
    );

    source.set_options(SyntheticOptions::default());
    source.set_paused(true);
    assert_eq!(renderer.draw(&source), DrawOutcome::Skipped(SkipReason::NoFrame));

    assert!(backend.events().is_empty());
    assert_eq!(renderer.gate().available(), 3);
    assert_eq!(renderer.ring().current(), 2, "ring must not advance on skips");
    assert_eq!(renderer.stats().skipped, 3);
}

#[test]
fn test_front_sensor_requires_calibration() {
    let backend = RecordingBackend::new();
    let source = SyntheticFrameSource::new(CaptureMode::FrontDepthSensor);
    let mut renderer = renderer(backend.clone(), CaptureMode::FrontDepthSensor);

    // No confidence map is needed in this mode
    assert!(renderer.draw(&source).is_submitted());

    source.set_options(SyntheticOptions {
        drop_calibration: true,
        ..Default::default()
    });
    assert_eq!(
        renderer.draw(&source),
        DrawOutcome::Skipped(SkipReason::MissingCalibration)
    );
    assert_eq!(renderer.stats().submitted, 1);
}

#[test]
fn test_missing_target_or_textures_release_the_gate() {
    let source = SyntheticFrameSource::new(CaptureMode::DepthSensorWide);

    let mut no_target = renderer(
        RecordingBackend {
            has_target: false,
            ..RecordingBackend::parking()
        },
        CaptureMode::DepthSensorWide,
    );
    assert_eq!(
        no_target.draw(&source),
        DrawOutcome::Skipped(SkipReason::NoRenderTarget)
    );
    assert_eq!(no_target.gate().available(), 3);

    let failing = RecordingBackend {
        uploads_fail: true,
        ..RecordingBackend::parking()
    };
    let mut no_textures = renderer(failing.clone(), CaptureMode::DepthSensorWide);
    for _ in 0..5 {
        assert_eq!(
            no_textures.draw(&source),
            DrawOutcome::Skipped(SkipReason::TexturesUnavailable)
        );
    }
    assert_eq!(no_textures.gate().available(), 3);
    assert!(failing.events().is_empty());
}

#[test]
fn test_viewport_resize_changes_view_transform() {
    let backend = RecordingBackend::new();
    let source = SyntheticFrameSource::new(CaptureMode::DepthSensorWide);
    let mut renderer = renderer(backend.clone(), CaptureMode::DepthSensorWide);

    renderer.draw(&source);
    assert!(renderer.on_viewport_resized(ViewportSize::new(1024.0, 768.0)));
    renderer.draw(&source);

    let writes = backend.writes();
    assert_eq!(writes.len(), 2);
    assert_ne!(writes[0].1.view_to_camera, writes[1].1.view_to_camera);
    assert_eq!(writes[0].1.far_depth_threshold, writes[1].1.far_depth_threshold);
}

#[test]
fn test_empty_viewport_falls_back_to_rotation_only() {
    let source = SyntheticFrameSource::new(CaptureMode::DepthSensorWide);
    let renderer = Renderer::new(
        RecordingBackend::new(),
        CaptureMode::DepthSensorWide,
        ThresholdState::default(),
    )
    .unwrap();

    // Portrait rotation alone is still invertible
    let transform = renderer.view_to_camera(&source);
    let (u, v) = transform.apply(0.0, 0.0);
    assert!((u - 0.0).abs() < 1e-6 && (v - 1.0).abs() < 1e-6, "({u}, {v})");
}

#[test]
fn test_declined_submit_is_reported_as_skip() {
    let backend = RecordingBackend {
        submits_fail: true,
        ..RecordingBackend::parking()
    };
    let source = SyntheticFrameSource::new(CaptureMode::DepthSensorWide);
    let mut renderer = renderer(backend.clone(), CaptureMode::DepthSensorWide);

    for _ in 0..4 {
        assert_eq!(
            renderer.draw(&source),
            DrawOutcome::Skipped(SkipReason::TexturesUnavailable)
        );
    }
    assert!(backend.events().iter().all(|e| !matches!(e, Event::Submit { .. })));
    assert_eq!(renderer.gate().available(), 3);
    assert_eq!(renderer.stats().submitted, 0);
    assert_eq!(renderer.stats().skipped, 4);
}
