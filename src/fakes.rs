//! In-memory doubles for the engine contract, shared across the unit tests.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use futures::channel::oneshot;
use futures::future::{FutureExt, LocalBoxFuture};

use crate::capabilities::EnvProbe;
use crate::fetch::{FetchedBytes, ModuleSource};
use crate::module::{EngineModule, PixelFrame, VectorizerBackend};

pub fn valid_wasm_bytes() -> Vec<u8> {
    vec![0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00]
}

fn bump(cell: &Cell<u32>) {
    cell.set(cell.get() + 1);
}

#[derive(Clone, Copy, Default)]
pub struct FakeEnv {
    pub isolated: bool,
    pub shared_buffer: bool,
    pub concurrency: Option<u32>,
}

impl EnvProbe for FakeEnv {
    fn cross_origin_isolated(&self) -> bool {
        self.isolated
    }
    fn shared_array_buffer(&self) -> bool {
        self.shared_buffer
    }
    fn hardware_concurrency(&self) -> Option<u32> {
        self.concurrency
    }
}

/// Call counts observed by tests, shared by every clone of a fixture.
#[derive(Debug, Default)]
pub struct Counters {
    pub streaming_calls: Cell<u32>,
    pub byte_fetches: Cell<u32>,
    pub buffer_instantiations: Cell<u32>,
    pub setup_calls: Cell<u32>,
    pub pool_attempts: Cell<u32>,
    pub pool_threads_requested: Cell<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolBehavior {
    Absent,
    Succeed,
    Fail,
}

#[derive(Debug, Clone)]
pub struct VectorizerSpec {
    pub svg: String,
    pub backend_error: Option<String>,
    pub vectorize_error: Option<String>,
    pub calls: Rc<RefCell<Vec<String>>>,
    pub released: Rc<Cell<bool>>,
}

impl Default for VectorizerSpec {
    fn default() -> Self {
        Self {
            svg: "<svg xmlns=\"http://www.w3.org/2000/svg\"/>".into(),
            backend_error: None,
            vectorize_error: None,
            calls: Rc::default(),
            released: Rc::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModuleSpec {
    pub setup_error: Option<String>,
    pub threading: Option<bool>,
    pub pool: PoolBehavior,
    pub backends: Vec<String>,
    pub presets: Vec<String>,
    /// `None` models a build without the vectorizer constructor export.
    pub vectorizer: Option<VectorizerSpec>,
}

impl Default for ModuleSpec {
    fn default() -> Self {
        Self {
            setup_error: None,
            threading: None,
            pool: PoolBehavior::Absent,
            backends: Vec::new(),
            presets: Vec::new(),
            vectorizer: Some(VectorizerSpec::default()),
        }
    }
}

#[derive(Debug)]
pub struct FakeModule {
    counters: Rc<Counters>,
    spec: ModuleSpec,
}

impl EngineModule for FakeModule {
    fn setup(&self) -> LocalBoxFuture<'_, Result<(), String>> {
        bump(&self.counters.setup_calls);
        let result = match &self.spec.setup_error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        };
        async move { result }.boxed_local()
    }

    fn threading_supported(&self) -> Option<bool> {
        self.spec.threading
    }

    fn start_thread_pool(&self, threads: u32) -> Option<LocalBoxFuture<'_, Result<u32, String>>> {
        if self.spec.pool == PoolBehavior::Absent {
            return None;
        }
        bump(&self.counters.pool_attempts);
        self.counters.pool_threads_requested.set(threads);
        let result = match self.spec.pool {
            PoolBehavior::Succeed => Ok(threads),
            PoolBehavior::Fail => Err("worker spawn failed".to_string()),
            PoolBehavior::Absent => unreachable!(),
        };
        Some(async move { result }.boxed_local())
    }

    fn available_backends(&self) -> Vec<String> {
        self.spec.backends.clone()
    }

    fn available_presets(&self) -> Vec<String> {
        self.spec.presets.clone()
    }

    fn create_vectorizer(&self) -> Result<Option<Box<dyn VectorizerBackend>>, String> {
        match &self.spec.vectorizer {
            None => Ok(None),
            Some(spec) => Ok(Some(Box::new(FakeVectorizer { spec: spec.clone() }))),
        }
    }
}

#[derive(Debug)]
pub struct FakeVectorizer {
    spec: VectorizerSpec,
}

impl VectorizerBackend for FakeVectorizer {
    fn set_backend(&mut self, backend: &str) -> Result<(), String> {
        self.spec.calls.borrow_mut().push(format!("backend={backend}"));
        match &self.spec.backend_error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn set_detail(&mut self, detail: f32) -> Result<(), String> {
        self.spec.calls.borrow_mut().push(format!("detail={detail}"));
        Ok(())
    }

    fn set_stroke_width(&mut self, width: f32) -> Result<(), String> {
        self.spec
            .calls
            .borrow_mut()
            .push(format!("stroke_width={width}"));
        Ok(())
    }

    fn vectorize(&mut self, frame: &PixelFrame) -> Result<String, String> {
        self.spec
            .calls
            .borrow_mut()
            .push(format!("vectorize {}x{}", frame.width(), frame.height()));
        match &self.spec.vectorize_error {
            Some(err) => Err(err.clone()),
            None => Ok(self.spec.svg.clone()),
        }
    }

    fn release(&mut self) {
        self.spec.released.set(true);
    }
}

#[derive(Clone)]
pub struct SourceSpec {
    pub streaming_ok: bool,
    pub fetch_error: Option<String>,
    pub status: u16,
    pub status_text: String,
    pub bytes: Vec<u8>,
    pub buffer_error: Option<String>,
    pub module: ModuleSpec,
}

impl Default for SourceSpec {
    fn default() -> Self {
        Self {
            streaming_ok: true,
            fetch_error: None,
            status: 200,
            status_text: "OK".into(),
            bytes: valid_wasm_bytes(),
            buffer_error: None,
            module: ModuleSpec::default(),
        }
    }
}

/// Scriptable [`ModuleSource`]. Behavior lives behind `Rc<RefCell<..>>` so a
/// test can flip it after the loader has cloned the source.
#[derive(Clone)]
pub struct FakeSource {
    counters: Rc<Counters>,
    pub spec: Rc<RefCell<SourceSpec>>,
    gate: Rc<RefCell<Option<oneshot::Receiver<()>>>>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self {
            counters: Rc::default(),
            spec: Rc::new(RefCell::new(SourceSpec::default())),
            gate: Rc::default(),
        }
    }

    pub fn counters(&self) -> Rc<Counters> {
        self.counters.clone()
    }

    /// Park the next instantiation until the sender side fires, letting tests
    /// pile up concurrent callers against one in-flight initialization.
    pub fn gate_next_instantiation(&self, receiver: oneshot::Receiver<()>) {
        *self.gate.borrow_mut() = Some(receiver);
    }

    fn make_module(&self) -> Box<dyn EngineModule> {
        Box::new(FakeModule {
            counters: self.counters.clone(),
            spec: self.spec.borrow().module.clone(),
        })
    }
}

impl ModuleSource for FakeSource {
    fn instantiate_streaming(&self) -> LocalBoxFuture<'_, Result<Box<dyn EngineModule>, String>> {
        let this = self.clone();
        async move {
            bump(&this.counters.streaming_calls);
            let gate = this.gate.borrow_mut().take();
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            if !this.spec.borrow().streaming_ok {
                return Err("streaming instantiation unsupported".into());
            }
            Ok(this.make_module())
        }
        .boxed_local()
    }

    fn fetch_bytes(&self) -> LocalBoxFuture<'_, Result<FetchedBytes, String>> {
        let this = self.clone();
        async move {
            bump(&this.counters.byte_fetches);
            let spec = this.spec.borrow();
            if let Some(err) = &spec.fetch_error {
                return Err(err.clone());
            }
            Ok(FetchedBytes {
                status: spec.status,
                status_text: spec.status_text.clone(),
                bytes: spec.bytes.clone(),
            })
        }
        .boxed_local()
    }

    fn instantiate_buffer<'a>(
        &'a self,
        _bytes: &'a [u8],
    ) -> LocalBoxFuture<'a, Result<Box<dyn EngineModule>, String>> {
        let this = self.clone();
        async move {
            bump(&this.counters.buffer_instantiations);
            if let Some(err) = &this.spec.borrow().buffer_error {
                return Err(err.clone());
            }
            Ok(this.make_module())
        }
        .boxed_local()
    }
}
