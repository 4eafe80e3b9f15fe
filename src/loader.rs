//! Single-flight engine initialization.
//!
//! The engine binary is fetched and instantiated at most once per loader; all
//! concurrent callers attach to the same in-flight initialization and observe
//! the same resolved handle or the same rejection. Threading is negotiated
//! during that one initialization and is strictly best-effort: a failed pool
//! start leaves the engine fully functional in single-threaded mode.

use std::fmt;
use std::rc::Rc;
use std::sync::{Mutex, MutexGuard, PoisonError};

use futures::future::{FutureExt, LocalBoxFuture, Shared};

use crate::capabilities::{probe_snapshot, CapabilitySnapshot, EnvProbe};
use crate::error::LoaderError;
use crate::fetch::{fetch_module, ModuleSource};
use crate::module::EngineModule;

/// Upper bound on the worker count requested from the engine pool. Browsers
/// report large core counts on desktop hardware; worker startup cost grows
/// faster than vectorization gains beyond this.
const MAX_POOL_THREADS: u32 = 16;

type InitFuture = Shared<LocalBoxFuture<'static, Result<Rc<EngineHandle>, LoaderError>>>;

/// The loaded engine plus the thread count achieved during initialization.
///
/// Owned by the loader; callers share it as `Rc`.
pub struct EngineHandle {
    module: Box<dyn EngineModule>,
    thread_count: u32,
}

impl EngineHandle {
    pub fn thread_count(&self) -> u32 {
        self.thread_count
    }

    pub fn module(&self) -> &dyn EngineModule {
        self.module.as_ref()
    }
}

impl fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineHandle")
            .field("thread_count", &self.thread_count)
            .finish_non_exhaustive()
    }
}

enum LoadPhase {
    Idle,
    Pending(InitFuture),
    Ready(Rc<EngineHandle>),
}

/// Loads the engine module once and answers capability queries about it.
pub struct EngineLoader<S, E> {
    source: S,
    env: E,
    phase: Mutex<LoadPhase>,
}

impl<S, E> EngineLoader<S, E>
where
    S: ModuleSource + Clone + 'static,
    E: EnvProbe + Clone + 'static,
{
    pub fn new(source: S, env: E) -> Self {
        Self {
            source,
            env,
            phase: Mutex::new(LoadPhase::Idle),
        }
    }

    fn lock_phase(&self) -> MutexGuard<'_, LoadPhase> {
        self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Load the engine, attaching to any initialization already in flight.
    ///
    /// A failed initialization is terminal: the cached rejection is replayed
    /// to every later caller until [`reset`](Self::reset).
    pub async fn load(&self) -> Result<Rc<EngineHandle>, LoaderError> {
        let pending = {
            let mut phase = self.lock_phase();
            match &*phase {
                LoadPhase::Ready(handle) => return Ok(handle.clone()),
                LoadPhase::Pending(init) => init.clone(),
                LoadPhase::Idle => {
                    let init: InitFuture = initialize(self.source.clone(), self.env.clone())
                        .boxed_local()
                        .shared();
                    *phase = LoadPhase::Pending(init.clone());
                    init
                }
            }
        };

        let result = pending.await;
        if let Ok(handle) = &result {
            let mut phase = self.lock_phase();
            if matches!(&*phase, LoadPhase::Pending(_)) {
                *phase = LoadPhase::Ready(handle.clone());
            }
        }
        result
    }

    /// Drop any cached outcome, allowing a fresh load attempt. The escape
    /// hatch from a cached failure; an initialization already in flight is
    /// not interrupted.
    pub fn reset(&self) {
        *self.lock_phase() = LoadPhase::Idle;
    }

    pub fn is_loaded(&self) -> bool {
        matches!(&*self.lock_phase(), LoadPhase::Ready(_))
    }

    /// Worker threads the engine is running with; 1 before the engine is
    /// ready (the single-threaded default).
    pub fn current_thread_count(&self) -> u32 {
        match &*self.lock_phase() {
            LoadPhase::Ready(handle) => handle.thread_count(),
            _ => 1,
        }
    }

    /// Probe the environment and layer the engine's own threading report on
    /// top. Loads the engine first so the report is truthful.
    pub async fn capabilities(&self) -> Result<CapabilitySnapshot, LoaderError> {
        let handle = self.load().await?;
        let mut snapshot = probe_snapshot(&self.env);
        snapshot.threading_supported = handle.module().threading_supported().unwrap_or(false);
        Ok(snapshot)
    }

    /// Backend identifiers reported by the loaded engine. Fails fast with
    /// [`LoaderError::ModuleNotReady`] before the engine is ready.
    pub fn available_backends(&self) -> Result<Vec<String>, LoaderError> {
        match &*self.lock_phase() {
            LoadPhase::Ready(handle) => Ok(handle.module().available_backends()),
            _ => Err(LoaderError::ModuleNotReady),
        }
    }

    /// Preset identifiers reported by the loaded engine; same readiness
    /// policy as [`available_backends`](Self::available_backends).
    pub fn available_presets(&self) -> Result<Vec<String>, LoaderError> {
        match &*self.lock_phase() {
            LoadPhase::Ready(handle) => Ok(handle.module().available_presets()),
            _ => Err(LoaderError::ModuleNotReady),
        }
    }

    /// One-line diagnostic for console display.
    pub fn threading_summary(&self) -> String {
        let snapshot = probe_snapshot(&self.env);
        let phase = match &*self.lock_phase() {
            LoadPhase::Idle => "idle",
            LoadPhase::Pending(init) => match init.peek() {
                Some(Err(_)) => "failed",
                _ => "loading",
            },
            LoadPhase::Ready(_) => "ready",
        };
        format!(
            "engine {phase}; threads: {}; cross-origin isolated: {}; shared array buffer: {}; hardware concurrency: {}",
            self.current_thread_count(),
            snapshot.cross_origin_isolated,
            snapshot.shared_array_buffer,
            snapshot.hardware_concurrency,
        )
    }
}

/// The one-time initialization behind the shared future: fetch, setup, then
/// best-effort thread pool negotiation.
async fn initialize<S, E>(source: S, env: E) -> Result<Rc<EngineHandle>, LoaderError>
where
    S: ModuleSource,
    E: EnvProbe,
{
    let module = fetch_module(&source).await?;
    module.setup().await.map_err(LoaderError::Instantiation)?;

    let snapshot = probe_snapshot(&env);
    let mut thread_count = 1;
    if snapshot.cross_origin_isolated && snapshot.shared_array_buffer {
        let requested = snapshot.hardware_concurrency.clamp(1, MAX_POOL_THREADS);
        match module.start_thread_pool(requested) {
            Some(startup) => match startup.await {
                Ok(achieved) => {
                    thread_count = achieved.max(1);
                    log::info!("engine thread pool started with {thread_count} threads");
                }
                Err(err) => {
                    let err = LoaderError::ThreadPoolStart(err);
                    log::warn!("{err}; continuing single-threaded");
                }
            },
            None => log::debug!("engine module has no thread pool initializer"),
        }
    } else {
        log::debug!(
            "threading prerequisites missing ({:?}); staying single-threaded",
            snapshot.missing_requirements()
        );
    }

    Ok(Rc::new(EngineHandle {
        module,
        thread_count,
    }))
}
