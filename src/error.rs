//! Error taxonomy for engine loading and invocation.

use thiserror::Error;

/// Everything that can go wrong between "engine requested" and "SVG returned".
///
/// `Clone` matters here: a failed initialization is cached and the same error
/// is replayed to every caller that arrives afterwards.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LoaderError {
    /// The engine binary was fetched but the server answered with a
    /// non-success status.
    #[error("engine module fetch failed: HTTP {status} {status_text}")]
    Fetch { status: u16, status_text: String },

    /// The fetch itself failed before any response existed.
    #[error("engine module fetch failed: {0}")]
    Network(String),

    /// Instantiation or module setup failed after the streaming fallback was
    /// exhausted.
    #[error("engine module instantiation failed: {0}")]
    Instantiation(String),

    /// Thread pool startup failed. Never propagated out of the loader; the
    /// load continues single-threaded and this is only logged.
    #[error("engine thread pool startup failed: {0}")]
    ThreadPoolStart(String),

    /// A required module export is absent.
    #[error("engine module export `{name}` is missing")]
    MissingExport { name: &'static str },

    /// A synchronous query was issued before the engine finished loading.
    #[error("engine module is not loaded yet")]
    ModuleNotReady,

    /// Pixel buffer length does not match the frame dimensions.
    #[error("pixel data length mismatch: expected {expected} bytes, got {actual}")]
    FrameSize { expected: u64, actual: u64 },

    /// The engine rejected a call (bad backend name, vectorize failure, ...).
    #[error("engine call failed: {0}")]
    Engine(String),
}
