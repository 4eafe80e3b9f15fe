//! Vectorizer construction and the one-shot convenience call.
//!
//! Instances own native resources inside the engine; the [`Vectorizer`] guard
//! ties their release to drop so every path out of a vectorize call, success
//! or error, frees the instance.

use serde::{Deserialize, Serialize};

use crate::capabilities::EnvProbe;
use crate::error::LoaderError;
use crate::fetch::ModuleSource;
use crate::loader::EngineLoader;
use crate::module::{PixelFrame, VectorizerBackend, VECTORIZER_EXPORT};

/// Optional per-call configuration. Fields left `None` keep the engine's
/// defaults; values are passed through to the engine uninterpreted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VectorizeOptions {
    pub backend: Option<String>,
    pub detail: Option<f32>,
    pub stroke_width: Option<f32>,
}

/// A live vectorizer instance. Dropping it releases the engine-side
/// resources.
#[derive(Debug)]
pub struct Vectorizer {
    backend: Box<dyn VectorizerBackend>,
}

impl Vectorizer {
    pub(crate) fn new(backend: Box<dyn VectorizerBackend>) -> Self {
        Self { backend }
    }

    pub fn set_backend(&mut self, backend: &str) -> Result<(), LoaderError> {
        self.backend.set_backend(backend).map_err(LoaderError::Engine)
    }

    pub fn set_detail(&mut self, detail: f32) -> Result<(), LoaderError> {
        self.backend.set_detail(detail).map_err(LoaderError::Engine)
    }

    pub fn set_stroke_width(&mut self, width: f32) -> Result<(), LoaderError> {
        self.backend
            .set_stroke_width(width)
            .map_err(LoaderError::Engine)
    }

    /// Apply each provided option through the matching setter.
    pub fn configure(&mut self, options: &VectorizeOptions) -> Result<(), LoaderError> {
        if let Some(backend) = &options.backend {
            self.set_backend(backend)?;
        }
        if let Some(detail) = options.detail {
            self.set_detail(detail)?;
        }
        if let Some(width) = options.stroke_width {
            self.set_stroke_width(width)?;
        }
        Ok(())
    }

    /// Run the engine's synchronous vectorize call on one frame.
    pub fn vectorize(&mut self, frame: &PixelFrame) -> Result<String, LoaderError> {
        self.backend.vectorize(frame).map_err(LoaderError::Engine)
    }

    /// Release the instance now rather than at end of scope.
    pub fn release(self) {}
}

impl Drop for Vectorizer {
    fn drop(&mut self) {
        self.backend.release();
    }
}

impl<S, E> EngineLoader<S, E>
where
    S: ModuleSource + Clone + 'static,
    E: EnvProbe + Clone + 'static,
{
    /// Construct a fresh vectorizer instance, loading the engine first if
    /// needed. The constructor export is a hard dependency of this call.
    pub async fn create_vectorizer(&self) -> Result<Vectorizer, LoaderError> {
        let handle = self.load().await?;
        let backend = handle
            .module()
            .create_vectorizer()
            .map_err(LoaderError::Engine)?
            .ok_or(LoaderError::MissingExport {
                name: VECTORIZER_EXPORT,
            })?;
        Ok(Vectorizer::new(backend))
    }

    /// Configure, vectorize, release: the whole round trip in one call.
    pub async fn vectorize_image(
        &self,
        frame: &PixelFrame,
        options: &VectorizeOptions,
    ) -> Result<String, LoaderError> {
        let mut vectorizer = self.create_vectorizer().await?;
        vectorizer.configure(options)?;
        vectorizer.vectorize(frame)
    }
}
