//! The engine module contract.
//!
//! The vectorization engine is an externally compiled WebAssembly module; this
//! crate never reimplements it, only talks to it. Its export surface is
//! modeled here as traits whose optional capabilities are explicit `Option`s,
//! so a presence check on a duck-typed export becomes a nullability check in
//! the caller.

use futures::future::LocalBoxFuture;

use crate::error::LoaderError;

/// Setup entry point, awaited once after instantiation.
pub const SETUP_EXPORT: &str = "start";
/// Optional promise-returning thread pool initializer.
pub const THREAD_POOL_EXPORT: &str = "init_thread_pool";
/// Optional query for the pool's achieved thread count.
pub const THREAD_COUNT_EXPORT: &str = "get_thread_count";
/// Optional query for whether this engine build supports threading.
pub const THREADING_QUERY_EXPORT: &str = "is_threading_supported";
/// Backend enumeration export.
pub const BACKENDS_EXPORT: &str = "available_backends";
/// Preset enumeration export.
pub const PRESETS_EXPORT: &str = "available_presets";
/// Vectorizer constructor export. The one hard dependency: its absence is an
/// error at the point of use, not at load time.
pub const VECTORIZER_EXPORT: &str = "WasmVectorizer";

/// An instantiated engine module.
///
/// Errors cross this boundary as opaque strings; the loader wraps them into
/// [`LoaderError`] variants. Methods returning `Option` model exports the
/// engine may or may not carry.
pub trait EngineModule: std::fmt::Debug {
    /// Run the module's setup entry point. Invoked exactly once per
    /// successful instantiation, before any other call.
    fn setup(&self) -> LocalBoxFuture<'_, Result<(), String>>;

    /// The engine's own threading-support report, `None` when the build does
    /// not carry the query export.
    fn threading_supported(&self) -> Option<bool>;

    /// Start the engine's worker pool with the given thread count, resolving
    /// to the achieved count. `None` when the build has no pool initializer.
    fn start_thread_pool(&self, threads: u32) -> Option<LocalBoxFuture<'_, Result<u32, String>>>;

    /// Backend identifiers reported by the engine, passed through opaque.
    fn available_backends(&self) -> Vec<String>;

    /// Preset identifiers reported by the engine, passed through opaque.
    fn available_presets(&self) -> Vec<String>;

    /// Construct a fresh vectorizer instance. `Ok(None)` when the constructor
    /// export is missing, `Err` when construction itself failed.
    fn create_vectorizer(&self) -> Result<Option<Box<dyn VectorizerBackend>>, String>;
}

/// One vectorizer instance inside the engine.
///
/// Setters for configuration the engine build does not expose are skipped by
/// the binding layer (reported as `Ok`); `release` frees the instance's
/// native resources and must be called exactly once, which the
/// [`crate::vectorizer::Vectorizer`] guard enforces.
pub trait VectorizerBackend: std::fmt::Debug {
    fn set_backend(&mut self, backend: &str) -> Result<(), String>;
    fn set_detail(&mut self, detail: f32) -> Result<(), String>;
    fn set_stroke_width(&mut self, width: f32) -> Result<(), String>;
    /// Synchronous vectorization of one RGBA frame into an SVG document.
    fn vectorize(&mut self, frame: &PixelFrame) -> Result<String, String>;
    fn release(&mut self);
}

/// RGBA pixel buffer with validated dimensions.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelFrame {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelFrame {
    /// Wrap raw RGBA bytes, checking the length against `width * height * 4`.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self, LoaderError> {
        let expected = u64::from(width) * u64::from(height) * 4;
        if data.len() as u64 != expected {
            return Err(LoaderError::FrameSize {
                expected,
                actual: data.len() as u64,
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}
