//! Scripted host that records every call a viewer makes

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use base64::Engine;
use vitrina_core::{
    DrawingSurface, FrameHandle, Host, ListenerId, LoadError, LoadObserver, LoadSink, ModelRoot, RendererConfig,
    SceneState, ViewerError, ViewportSize,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreateSurface(ViewportSize),
    AttachSurface,
    DetachSurface,
    ListenResize(ListenerId),
    UnlistenResize(ListenerId),
    ListenInput(ListenerId),
    UnlistenInput(ListenerId),
    RequestFrame(FrameHandle),
    CancelFrame(FrameHandle),
    Fetch(String),
    Render { triangles: usize },
    ReleaseSurface,
}

pub type CallLog = Arc<Mutex<Vec<Call>>>;

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub enum FailAt {
    #[default]
    Nothing,
    CreateSurface,
    ListenInput,
    ListenResize,
}

pub struct MockSurface {
    pub size: ViewportSize,
    log: CallLog,
}

impl DrawingSurface for MockSurface {
    fn raster_size(&self) -> ViewportSize {
        self.size
    }

    fn set_raster_size(&mut self, size: ViewportSize) {
        self.size = size;
    }

    fn render(&mut self, scene: &SceneState) -> Result<(), ViewerError> {
        let triangles = scene.model.get().map_or(0, |m| m.triangle_count());
        self.log.lock().unwrap().push(Call::Render { triangles });
        Ok(())
    }

    fn release(&mut self) {
        self.log.lock().unwrap().push(Call::ReleaseSurface);
    }
}

pub struct MockHost {
    pub attached: bool,
    pub size: ViewportSize,
    pub fail_at: FailAt,
    pub sinks: Vec<LoadSink>,
    log: CallLog,
    next_id: u64,
}

impl MockHost {
    pub fn new(width: u32, height: u32) -> (Self, CallLog) {
        let log = CallLog::default();
        let host = Self {
            attached: true,
            size: ViewportSize::new(width, height),
            fail_at: FailAt::Nothing,
            sinks: Vec::new(),
            log: log.clone(),
            next_id: 0,
        };
        (host, log)
    }

    pub fn failing_at(mut self, fail_at: FailAt) -> Self {
        self.fail_at = fail_at;
        self
    }

    fn record(&self, call: Call) {
        self.log.lock().unwrap().push(call);
    }

    fn next(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

impl Host for MockHost {
    type Surface = MockSurface;

    fn is_attached(&self) -> bool {
        self.attached
    }

    fn viewport_size(&self) -> ViewportSize {
        self.size
    }

    async fn create_surface(
        &mut self,
        size: ViewportSize,
        _config: &RendererConfig,
    ) -> Result<MockSurface, ViewerError> {
        if self.fail_at == FailAt::CreateSurface {
            return Err(ViewerError::Surface("no adapter".into()));
        }
        self.record(Call::CreateSurface(size));
        Ok(MockSurface {
            size,
            log: self.log.clone(),
        })
    }

    fn attach_surface(&mut self, _surface: &MockSurface) -> Result<(), ViewerError> {
        self.record(Call::AttachSurface);
        Ok(())
    }

    fn detach_surface(&mut self, _surface: &MockSurface) {
        self.record(Call::DetachSurface);
    }

    fn listen_resize(&mut self) -> Result<ListenerId, ViewerError> {
        if self.fail_at == FailAt::ListenResize {
            return Err(ViewerError::Listener {
                kind: "resize",
                reason: "refused".into(),
            });
        }
        let id = ListenerId(self.next());
        self.record(Call::ListenResize(id));
        Ok(id)
    }

    fn unlisten_resize(&mut self, id: ListenerId) {
        self.record(Call::UnlistenResize(id));
    }

    fn listen_input(&mut self, _surface: &MockSurface) -> Result<ListenerId, ViewerError> {
        if self.fail_at == FailAt::ListenInput {
            return Err(ViewerError::Listener {
                kind: "pointer",
                reason: "refused".into(),
            });
        }
        let id = ListenerId(self.next());
        self.record(Call::ListenInput(id));
        Ok(id)
    }

    fn unlisten_input(&mut self, id: ListenerId) {
        self.record(Call::UnlistenInput(id));
    }

    fn request_frame(&mut self) -> FrameHandle {
        let frame = FrameHandle(self.next() as i32);
        self.record(Call::RequestFrame(frame));
        frame
    }

    fn cancel_frame(&mut self, frame: FrameHandle) {
        self.record(Call::CancelFrame(frame));
    }

    fn fetch_asset(&mut self, url: &str, sink: LoadSink) {
        self.record(Call::Fetch(url.to_string()));
        self.sinks.push(sink);
    }
}

/// Everything logged, minus per-frame noise
pub fn lifecycle_calls(log: &CallLog) -> Vec<Call> {
    log.lock()
        .unwrap()
        .iter()
        .filter(|c| !matches!(c, Call::Render { .. } | Call::RequestFrame(_)))
        .cloned()
        .collect()
}

pub fn count(log: &CallLog, pred: impl Fn(&Call) -> bool) -> usize {
    log.lock().unwrap().iter().filter(|c| pred(c)).count()
}

/// Self-contained glTF with one triangle, buffer embedded as a data URI
pub fn triangle_gltf() -> Vec<u8> {
    let mut bin = Vec::new();
    for v in [0.0f32, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0] {
        bin.extend_from_slice(&v.to_le_bytes());
    }
    for i in [0u16, 1, 2, 0] {
        bin.extend_from_slice(&i.to_le_bytes());
    }
    let data = base64::engine::general_purpose::STANDARD.encode(&bin);

    format!(
        r#"{{"asset":{{"version":"2.0"}},"scene":0,"scenes":[{{"nodes":[0]}}],
"nodes":[{{"mesh":0}}],
"meshes":[{{"primitives":[{{"attributes":{{"POSITION":0}},"indices":1}}]}}],
"buffers":[{{"byteLength":{},"uri":"data:application/octet-stream;base64,{}"}}],
"bufferViews":[{{"buffer":0,"byteOffset":0,"byteLength":36}},{{"buffer":0,"byteOffset":36,"byteLength":6}}],
"accessors":[{{"bufferView":0,"componentType":5126,"count":3,"type":"VEC3","min":[0,0,0],"max":[1,1,0]}},
{{"bufferView":1,"componentType":5123,"count":3,"type":"SCALAR"}}]}}"#,
        bin.len(),
        data
    )
    .into_bytes()
}

/// Observer that keeps what it was told
#[derive(Clone, Default)]
pub struct RecordingObserver {
    pub loaded: Arc<Mutex<Vec<String>>>,
    pub errors: Arc<Mutex<Vec<(String, LoadError)>>>,
    pub progress: Arc<Mutex<Vec<(u64, Option<u64>)>>>,
}

impl LoadObserver for RecordingObserver {
    fn on_progress(&mut self, _url: &str, loaded: u64, total: Option<u64>) {
        self.progress.lock().unwrap().push((loaded, total));
    }

    fn on_loaded(&mut self, url: &str, _model: &ModelRoot) {
        self.loaded.lock().unwrap().push(url.to_string());
    }

    fn on_error(&mut self, url: &str, error: &LoadError) {
        self.errors.lock().unwrap().push((url.to_string(), error.clone()));
    }
}
