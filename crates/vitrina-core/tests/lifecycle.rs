mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{count, lifecycle_calls, triangle_gltf, Call, FailAt, MockHost, RecordingObserver};
use vitrina_core::{
    LoadError, LoadPhase, PointerInput, Viewer, ViewerConfig, ViewerError, ViewportSize,
};

async fn mount(width: u32, height: u32) -> (Viewer<MockHost>, common::CallLog) {
    let (host, log) = MockHost::new(width, height);
    let viewer = Viewer::mount(host, "model.glb", ViewerConfig::default())
        .await
        .expect("mount");
    (viewer, log)
}

fn tick_n(viewer: &mut Viewer<MockHost>, n: usize) {
    for _ in 0..n {
        assert!(viewer.tick());
    }
}

#[tokio::test]
async fn mount_matches_viewport() {
    for (w, h) in [(800, 600), (1, 1), (1920, 1080), (333, 777)] {
        let (viewer, _log) = mount(w, h).await;
        assert_eq!(viewer.surface().unwrap().size, ViewportSize::new(w, h));
        assert_eq!(viewer.scene().camera.aspect(), w as f32 / h as f32);
        assert!(viewer.scene().model.is_empty());
        assert_eq!(viewer.load_phase(), &LoadPhase::Loading {
            url: "model.glb".into(),
            loaded: 0,
            total: None,
        });
    }
}

#[tokio::test]
async fn mount_acquires_in_order() {
    let (viewer, log) = mount(800, 600).await;
    assert!(!viewer.resources().is_released());
    let calls = lifecycle_calls(&log);
    assert!(matches!(
        calls.as_slice(),
        [
            Call::CreateSurface(_),
            Call::AttachSurface,
            Call::ListenInput(_),
            Call::Fetch(url),
            Call::ListenResize(_),
        ] if url == "model.glb"
    ));
    assert_eq!(count(&log, |c| matches!(c, Call::RequestFrame(_))), 1);
}

#[tokio::test]
async fn model_glb_scenario_800x600() {
    let (mut viewer, log) = mount(800, 600).await;
    let sink = viewer.host_mut().sinks.pop().unwrap();
    let bytes = triangle_gltf();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        sink.progress(bytes.len() as u64 / 2, Some(bytes.len() as u64));
        sink.finish_with_bytes(&bytes);
    });

    let start = tokio::time::Instant::now();
    let mut seen_at = None;
    while start.elapsed() < Duration::from_millis(200) {
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(viewer.tick());
        if seen_at.is_none() && !viewer.scene().model.is_empty() {
            seen_at = Some(start.elapsed());
        }
    }

    let seen_at = seen_at.expect("model never arrived");
    assert!(seen_at >= Duration::from_millis(50));
    assert_eq!(viewer.scene().model.get().unwrap().triangle_count(), 1);
    assert!(count(&log, |c| *c == Call::Render { triangles: 1 }) > 0);
    assert_eq!(viewer.load_phase(), &LoadPhase::Loaded { url: "model.glb".into() });

    let before = log.lock().unwrap().len();
    assert!(viewer.dispose());
    let teardown: Vec<Call> = log.lock().unwrap()[before..].to_vec();
    assert!(matches!(
        teardown.as_slice(),
        [
            Call::UnlistenResize(_),
            Call::CancelFrame(_),
            Call::DetachSurface,
            Call::UnlistenInput(_),
            Call::ReleaseSurface,
        ]
    ));

    // Every listener that was registered got removed
    let calls = lifecycle_calls(&log);
    let listened: Vec<_> = calls
        .iter()
        .filter_map(|c| match c {
            Call::ListenResize(id) | Call::ListenInput(id) => Some(*id),
            _ => None,
        })
        .collect();
    for id in listened {
        assert!(calls
            .iter()
            .any(|c| matches!(c, Call::UnlistenResize(u) | Call::UnlistenInput(u) if *u == id)));
    }

    // No frame is scheduled after disposal
    assert!(!viewer.tick());
    assert_eq!(log.lock().unwrap().len(), before + 5);
}

#[tokio::test]
async fn dispose_is_idempotent() {
    let (mut viewer, log) = mount(800, 600).await;
    tick_n(&mut viewer, 3);

    assert!(viewer.dispose());
    assert!(viewer.resources().is_released());
    let after_first = log.lock().unwrap().len();
    assert!(!viewer.dispose());
    assert!(viewer.resources().is_released());
    drop(viewer);

    assert_eq!(log.lock().unwrap().len(), after_first);
    assert_eq!(count(&log, |c| *c == Call::ReleaseSurface), 1);
    assert_eq!(count(&log, |c| *c == Call::DetachSurface), 1);
}

#[tokio::test]
async fn drop_tears_down() {
    let (viewer, log) = mount(640, 480).await;
    drop(viewer);
    assert_eq!(count(&log, |c| matches!(c, Call::UnlistenResize(_))), 1);
    assert_eq!(count(&log, |c| matches!(c, Call::CancelFrame(_))), 1);
    assert_eq!(count(&log, |c| *c == Call::ReleaseSurface), 1);
}

#[tokio::test]
async fn load_failure_keeps_rendering() {
    let (mut viewer, log) = mount(800, 600).await;
    let observer = RecordingObserver::default();
    viewer.set_observer(Box::new(observer.clone()));

    let sink = viewer.host_mut().sinks.pop().unwrap();
    assert!(sink.fail(LoadError::Http {
        status: 404,
        status_text: "Not Found".into(),
    }));
    tick_n(&mut viewer, 5);

    assert!(viewer.scene().model.is_empty());
    assert!(matches!(viewer.load_phase(), LoadPhase::Failed { .. }));
    assert_eq!(observer.errors.lock().unwrap().len(), 1);
    assert_eq!(count(&log, |c| *c == Call::Render { triangles: 0 }), 5);
    assert_eq!(viewer.frame_count(), 5);
}

#[tokio::test]
async fn progress_reaches_observer_without_completion() {
    let (mut viewer, _log) = mount(800, 600).await;
    let observer = RecordingObserver::default();
    viewer.set_observer(Box::new(observer.clone()));

    let sink = viewer.host_mut().sinks.pop().unwrap();
    sink.progress(100, None);
    sink.progress(300, None);
    tick_n(&mut viewer, 1);

    assert_eq!(*observer.progress.lock().unwrap(), vec![(100, None), (300, None)]);
    assert!(viewer.scene().model.is_empty());
}

#[tokio::test]
async fn second_success_replaces_model() {
    let (mut viewer, _log) = mount(800, 600).await;
    let first = viewer.host_mut().sinks.pop().unwrap();
    assert!(first.finish_with_bytes(&triangle_gltf()));
    tick_n(&mut viewer, 1);
    let first_model = viewer.scene().model.get().cloned().unwrap();

    assert!(viewer.load("other.glb"));
    // The previous model stays visible while the next one loads
    tick_n(&mut viewer, 1);
    assert!(Arc::ptr_eq(viewer.scene().model.get().unwrap(), &first_model));

    let second = viewer.host_mut().sinks.pop().unwrap();
    assert!(second.finish_with_bytes(&triangle_gltf()));
    tick_n(&mut viewer, 1);

    let current = viewer.scene().model.get().unwrap();
    assert!(!Arc::ptr_eq(current, &first_model));
    assert_eq!(viewer.scene().model.generation(), 2);
    assert_eq!(viewer.load_phase(), &LoadPhase::Loaded { url: "other.glb".into() });
}

#[tokio::test]
async fn superseded_load_is_discarded() {
    let (mut viewer, _log) = mount(800, 600).await;
    viewer.load("newer.glb");
    let newer = viewer.host_mut().sinks.pop().unwrap();
    let older = viewer.host_mut().sinks.pop().unwrap();

    assert!(!older.finish_with_bytes(&triangle_gltf()));
    tick_n(&mut viewer, 1);
    assert!(viewer.scene().model.is_empty());

    assert!(newer.finish_with_bytes(&triangle_gltf()));
    tick_n(&mut viewer, 1);
    assert_eq!(viewer.scene().model.generation(), 1);
}

#[tokio::test]
async fn late_load_after_dispose_is_noop() {
    let (mut viewer, log) = mount(800, 600).await;
    let sink = viewer.host_mut().sinks.pop().unwrap();
    viewer.dispose();
    let settled = log.lock().unwrap().len();

    assert!(sink.is_cancelled());
    assert!(!sink.progress(10, Some(20)));
    assert!(!sink.finish_with_bytes(&triangle_gltf()));
    assert!(!viewer.tick());

    assert!(viewer.scene().model.is_empty());
    assert_eq!(log.lock().unwrap().len(), settled);
    assert!(!viewer.load("again.glb"));
}

#[tokio::test]
async fn resize_updates_raster_and_aspect() {
    let (mut viewer, _log) = mount(800, 600).await;
    let (fov, near, far) = {
        let camera = &viewer.scene().camera;
        (camera.fov_degrees(), camera.near(), camera.far())
    };

    viewer.host_mut().size = ViewportSize::new(1200, 400);
    assert!(viewer.handle_resize());
    assert!(!viewer.handle_resize(), "same size again changes nothing");

    let camera = &viewer.scene().camera;
    assert_eq!(viewer.surface().unwrap().size, ViewportSize::new(1200, 400));
    assert_eq!(camera.aspect(), 3.0);
    assert_eq!((camera.fov_degrees(), camera.near(), camera.far()), (fov, near, far));

    viewer.host_mut().size = ViewportSize::new(0, 400);
    assert!(!viewer.handle_resize());
    assert_eq!(viewer.surface().unwrap().size, ViewportSize::new(1200, 400));
}

#[tokio::test]
async fn resize_after_dispose_is_ignored() {
    let (mut viewer, _log) = mount(800, 600).await;
    viewer.dispose();
    viewer.host_mut().size = ViewportSize::new(100, 100);
    assert!(!viewer.handle_resize());
    assert_eq!(viewer.scene().camera.aspect(), 800.0 / 600.0);
}

#[tokio::test]
async fn wheel_input_dollies_camera() {
    let (mut viewer, _log) = mount(800, 600).await;
    tick_n(&mut viewer, 1);
    let before = viewer.scene().camera.distance_to_target();

    assert!(viewer.handle_input(PointerInput::Wheel { delta_y: -120.0 }));
    tick_n(&mut viewer, 30);
    assert!(viewer.scene().camera.distance_to_target() < before);

    viewer.dispose();
    assert!(!viewer.handle_input(PointerInput::Wheel { delta_y: -120.0 }));
}

#[tokio::test]
async fn detached_viewport_fails_without_side_effects() {
    let (mut host, log) = MockHost::new(800, 600);
    host.attached = false;
    let err = Viewer::mount(host, "model.glb", ViewerConfig::default())
        .await
        .err()
        .unwrap();
    assert!(matches!(err, ViewerError::ViewportDetached));
    assert!(err.is_precondition());
    assert!(log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn empty_viewport_fails_without_side_effects() {
    let (host, log) = MockHost::new(0, 600);
    let err = Viewer::mount(host, "model.glb", ViewerConfig::default())
        .await
        .err()
        .unwrap();
    assert!(matches!(err, ViewerError::EmptyViewport { width: 0, height: 600 }));
    assert!(log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn invalid_config_is_rejected_before_mount() {
    let (host, log) = MockHost::new(800, 600);
    let mut config = ViewerConfig::default();
    config.camera.near = 10.0;
    config.camera.far = 1.0;
    let err = Viewer::mount(host, "model.glb", config).await.err().unwrap();
    assert!(matches!(err, ViewerError::Config(_)));
    assert!(log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn surface_failure_releases_nothing() {
    let (host, log) = MockHost::new(800, 600);
    let host = host.failing_at(FailAt::CreateSurface);
    let err = Viewer::mount(host, "model.glb", ViewerConfig::default())
        .await
        .err()
        .unwrap();
    assert!(matches!(err, ViewerError::Surface(_)));
    assert!(log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn input_listener_failure_rolls_back() {
    let (host, log) = MockHost::new(800, 600);
    let host = host.failing_at(FailAt::ListenInput);
    assert!(Viewer::mount(host, "model.glb", ViewerConfig::default()).await.is_err());

    assert!(matches!(
        lifecycle_calls(&log).as_slice(),
        [
            Call::CreateSurface(_),
            Call::AttachSurface,
            Call::DetachSurface,
            Call::ReleaseSurface,
        ]
    ));
}

#[tokio::test]
async fn resize_listener_failure_rolls_back_in_order() {
    let (host, log) = MockHost::new(800, 600);
    let host = host.failing_at(FailAt::ListenResize);
    let err = Viewer::mount(host, "model.glb", ViewerConfig::default())
        .await
        .err()
        .unwrap();
    assert!(matches!(err, ViewerError::Listener { kind: "resize", .. }));

    let calls = lifecycle_calls(&log);
    let teardown = &calls[4..];
    assert!(matches!(
        teardown,
        [
            Call::CancelFrame(_),
            Call::DetachSurface,
            Call::UnlistenInput(_),
            Call::ReleaseSurface,
        ]
    ));
}
