//! Asynchronous asset loading
//!
//! The host's fetch task gets a [`LoadSink`] and reports through it from
//! whatever task or thread it runs on. Results land in a shared inbox that the
//! viewer drains at the start of each render tick, so the scene is only ever
//! mutated between frames.
//!
//! A sink turns into a no-op when the view is disposed or when a newer load
//! supersedes it. Terminal results (`Success`/`Failure`) are accepted at most
//! once per sink.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::asset::ModelRoot;
use crate::config::ModelConfig;
use crate::error::LoadError;
use crate::render_loop::Liveness;

/// One report from an in-flight load
#[derive(Debug, Clone)]
pub enum LoadResult {
    /// `total` is absent when the response does not announce a length
    Progress { loaded: u64, total: Option<u64> },
    Success(Arc<ModelRoot>),
    Failure(LoadError),
}

/// Observable state of the most recent load
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LoadPhase {
    Idle,
    Loading {
        url: String,
        loaded: u64,
        total: Option<u64>,
    },
    Loaded {
        url: String,
    },
    Failed {
        url: String,
        reason: String,
    },
}

impl LoadPhase {
    /// Fraction in `0..=1` while loading with a known total
    pub fn fraction(&self) -> Option<f64> {
        match self {
            LoadPhase::Loading { loaded, total: Some(total), .. } if *total > 0 => {
                Some((*loaded as f64 / *total as f64).min(1.0))
            }
            _ => None,
        }
    }
}

/// Receives load reports as the viewer applies them
pub trait LoadObserver {
    fn on_progress(&mut self, _url: &str, _loaded: u64, _total: Option<u64>) {}
    fn on_loaded(&mut self, _url: &str, _model: &ModelRoot) {}
    fn on_error(&mut self, _url: &str, _error: &LoadError) {}
}

/// Default observer: reports through `tracing`
#[derive(Debug, Default)]
pub struct TracingObserver;

impl LoadObserver for TracingObserver {
    fn on_progress(&mut self, url: &str, loaded: u64, total: Option<u64>) {
        match total {
            Some(total) if total > 0 => {
                debug!("{}: {:.0}% loaded", url, loaded as f64 / total as f64 * 100.0)
            }
            _ => debug!("{}: {} bytes loaded", url, loaded),
        }
    }

    fn on_loaded(&mut self, url: &str, model: &ModelRoot) {
        let extent = model.bounds().map(|b| b.size()).unwrap_or_default();
        info!(
            "Loaded {} ({} meshes, {} triangles, extent {:.2} x {:.2} x {:.2})",
            url,
            model.meshes.len(),
            model.triangle_count(),
            extent.x,
            extent.y,
            extent.z
        );
    }

    fn on_error(&mut self, url: &str, error: &LoadError) {
        error!("Failed to load {}: {}", url, error);
    }
}

#[derive(Debug)]
struct Shared {
    liveness: Liveness,
    current: AtomicU64,
    inbox: Mutex<VecDeque<(u64, LoadResult)>>,
}

/// Write end handed to a fetch task
#[derive(Debug, Clone)]
pub struct LoadSink {
    shared: Arc<Shared>,
    generation: u64,
    url: Arc<str>,
    placement: ModelConfig,
    settled: Arc<AtomicBool>,
}

impl LoadSink {
    pub fn url(&self) -> &str {
        &self.url
    }

    /// True once the view is disposed or a newer load has started
    pub fn is_cancelled(&self) -> bool {
        !self.shared.liveness.is_live() || self.shared.current.load(Ordering::Acquire) != self.generation
    }

    pub fn progress(&self, loaded: u64, total: Option<u64>) -> bool {
        if self.settled.load(Ordering::Acquire) {
            return false;
        }
        self.push(LoadResult::Progress { loaded, total })
    }

    /// Deliver a parsed model as-is
    pub fn succeed(&self, model: ModelRoot) -> bool {
        self.settle(LoadResult::Success(Arc::new(model)))
    }

    pub fn fail(&self, error: LoadError) -> bool {
        self.settle(LoadResult::Failure(error))
    }

    /// Parse fetched bytes, apply the configured placement, and settle
    pub fn finish_with_bytes(&self, bytes: &[u8]) -> bool {
        if self.is_cancelled() {
            debug!("Dropping {} bytes for cancelled load of {}", bytes.len(), self.url);
            return false;
        }
        match ModelRoot::from_gltf_slice(bytes) {
            Ok(model) => self.succeed(model.with_placement(&self.placement)),
            Err(e) => self.fail(e),
        }
    }

    fn settle(&self, result: LoadResult) -> bool {
        if self.is_cancelled() {
            return false;
        }
        if self.settled.swap(true, Ordering::AcqRel) {
            warn!("Ignoring repeated completion for {}", self.url);
            return false;
        }
        self.push(result)
    }

    fn push(&self, result: LoadResult) -> bool {
        if self.is_cancelled() {
            return false;
        }
        match self.shared.inbox.lock() {
            Ok(mut inbox) => {
                inbox.push_back((self.generation, result));
                true
            }
            Err(_) => {
                warn!("Load inbox poisoned, dropping result for {}", self.url);
                false
            }
        }
    }
}

/// Read end owned by the viewer
#[derive(Debug)]
pub struct AssetLoader {
    shared: Arc<Shared>,
    placement: ModelConfig,
    phase: LoadPhase,
}

impl AssetLoader {
    pub fn new(liveness: Liveness, placement: ModelConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                liveness,
                current: AtomicU64::new(0),
                inbox: Mutex::new(VecDeque::new()),
            }),
            placement,
            phase: LoadPhase::Idle,
        }
    }

    /// Start a load, superseding any load still in flight
    pub fn begin(&mut self, url: &str) -> LoadSink {
        let generation = self.shared.current.fetch_add(1, Ordering::AcqRel) + 1;
        if let LoadPhase::Loading { url: previous, .. } = &self.phase {
            debug!("Load of {} superseded by {}", previous, url);
        }
        self.phase = LoadPhase::Loading {
            url: url.to_string(),
            loaded: 0,
            total: None,
        };
        LoadSink {
            shared: self.shared.clone(),
            generation,
            url: Arc::from(url),
            placement: self.placement.clone(),
            settled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Invalidate every outstanding sink and drop queued results
    pub fn cancel(&mut self) {
        self.shared.current.fetch_add(1, Ordering::AcqRel);
        if let Ok(mut inbox) = self.shared.inbox.lock() {
            inbox.clear();
        }
        if matches!(self.phase, LoadPhase::Loading { .. }) {
            self.phase = LoadPhase::Idle;
        }
    }

    /// Take queued results from the current load, updating the phase
    pub fn drain(&mut self) -> Vec<LoadResult> {
        let queued: Vec<_> = match self.shared.inbox.try_lock() {
            Ok(mut inbox) => inbox.drain(..).collect(),
            // A fetch task is mid-push; pick it up next tick
            Err(_) => return Vec::new(),
        };
        let current = self.shared.current.load(Ordering::Acquire);

        let mut results = Vec::with_capacity(queued.len());
        for (generation, result) in queued {
            if generation != current {
                continue;
            }
            self.advance_phase(&result);
            results.push(result);
        }
        results
    }

    pub fn phase(&self) -> &LoadPhase {
        &self.phase
    }

    fn advance_phase(&mut self, result: &LoadResult) {
        let LoadPhase::Loading { url, .. } = &self.phase else {
            return;
        };
        let url = url.clone();
        self.phase = match result {
            LoadResult::Progress { loaded, total } => LoadPhase::Loading {
                url,
                loaded: *loaded,
                total: *total,
            },
            LoadResult::Success(_) => LoadPhase::Loaded { url },
            LoadResult::Failure(e) => LoadPhase::Failed {
                url,
                reason: e.to_string(),
            },
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::tests::triangle_glb;

    fn loader() -> (AssetLoader, Liveness) {
        let liveness = Liveness::new();
        (AssetLoader::new(liveness.clone(), ModelConfig::default()), liveness)
    }

    #[test]
    fn test_progress_then_success() {
        let (mut loader, _live) = loader();
        let sink = loader.begin("model.glb");

        assert!(sink.progress(10, Some(100)));
        assert_eq!(loader.drain().len(), 1);
        assert_eq!(loader.phase().fraction(), Some(0.1));

        assert!(sink.finish_with_bytes(&triangle_glb([0.0; 3])));
        let results = loader.drain();
        assert!(matches!(results.as_slice(), [LoadResult::Success(_)]));
        assert_eq!(loader.phase(), &LoadPhase::Loaded { url: "model.glb".into() });
    }

    #[test]
    fn test_terminal_result_is_exactly_once() {
        let (mut loader, _live) = loader();
        let sink = loader.begin("model.glb");
        let twin = sink.clone();

        assert!(sink.fail(LoadError::Network("reset".into())));
        assert!(!twin.finish_with_bytes(&triangle_glb([0.0; 3])));
        assert!(!sink.progress(1, None), "progress after completion is ignored");

        let results = loader.drain();
        assert_eq!(results.len(), 1);
        assert!(matches!(loader.phase(), LoadPhase::Failed { .. }));
    }

    #[test]
    fn test_parse_failure_is_reported() {
        let (mut loader, _live) = loader();
        let sink = loader.begin("broken.glb");
        assert!(sink.finish_with_bytes(b"not a model"));
        assert!(matches!(
            loader.drain().as_slice(),
            [LoadResult::Failure(LoadError::Parse(_))]
        ));
    }

    #[test]
    fn test_newer_load_supersedes_older() {
        let (mut loader, _live) = loader();
        let first = loader.begin("a.glb");
        first.progress(5, None);
        let second = loader.begin("b.glb");

        assert!(first.is_cancelled());
        assert!(!first.finish_with_bytes(&triangle_glb([0.0; 3])));
        assert!(second.finish_with_bytes(&triangle_glb([0.0; 3])));

        let results = loader.drain();
        assert_eq!(results.len(), 1, "queued progress from the old load is dropped");
        assert_eq!(loader.phase(), &LoadPhase::Loaded { url: "b.glb".into() });
    }

    #[test]
    fn test_sink_is_noop_after_disposal() {
        let (mut loader, liveness) = loader();
        let sink = loader.begin("model.glb");
        liveness.kill();

        assert!(sink.is_cancelled());
        assert!(!sink.progress(1, Some(2)));
        assert!(!sink.finish_with_bytes(&triangle_glb([0.0; 3])));
        assert!(loader.drain().is_empty());
    }

    #[test]
    fn test_cancel_clears_inbox() {
        let (mut loader, _live) = loader();
        let sink = loader.begin("model.glb");
        sink.progress(1, None);
        loader.cancel();
        assert!(loader.drain().is_empty());
        assert_eq!(loader.phase(), &LoadPhase::Idle);
        assert!(!sink.fail(LoadError::Network("late".into())));
    }

    #[test]
    fn test_sink_reports_from_another_thread() {
        let (mut loader, _live) = loader();
        let sink = loader.begin("model.glb");
        let bytes = triangle_glb([0.0; 3]);
        std::thread::spawn(move || {
            sink.progress(bytes.len() as u64 / 2, None);
            sink.finish_with_bytes(&bytes);
        })
        .join()
        .unwrap();
        assert_eq!(loader.drain().len(), 2);
    }

    #[test]
    fn test_load_phase_serializes_with_state_tag() {
        let phase = LoadPhase::Loading {
            url: "model.glb".into(),
            loaded: 3,
            total: None,
        };
        let json = serde_json::to_value(&phase).unwrap();
        assert_eq!(json["state"], "loading");
        assert_eq!(json["loaded"], 3);
        assert!(json["total"].is_null());
    }
}
