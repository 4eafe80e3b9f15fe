//! Two-tier module retrieval.
//!
//! Streaming instantiation compiles the engine while its bytes are still in
//! flight, but carries stricter content-type and CORS requirements. The
//! fallback path trades that speed for portability: fetch the raw bytes,
//! verify the response, and instantiate from the buffer.

use futures::future::LocalBoxFuture;

use crate::error::LoaderError;
use crate::module::EngineModule;
use crate::utils::read_u32_le;

/// `\0asm`, little-endian.
const WASM_MAGIC: u32 = 0x6d73_6100;
const WASM_VERSION: u32 = 1;

/// A fetched response body together with its HTTP status.
#[derive(Debug, Clone)]
pub struct FetchedBytes {
    pub status: u16,
    pub status_text: String,
    pub bytes: Vec<u8>,
}

impl FetchedBytes {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Byte-source and instantiation primitives for one engine binary.
///
/// Errors are opaque strings; [`fetch_module`] decides which [`LoaderError`]
/// they become.
pub trait ModuleSource {
    /// Instantiate straight from the in-flight response.
    fn instantiate_streaming(&self) -> LocalBoxFuture<'_, Result<Box<dyn EngineModule>, String>>;

    /// Fetch the raw bytes, reporting transport failures as `Err` and HTTP
    /// failures through the returned status.
    fn fetch_bytes(&self) -> LocalBoxFuture<'_, Result<FetchedBytes, String>>;

    /// Instantiate from an already-buffered binary.
    fn instantiate_buffer<'a>(
        &'a self,
        bytes: &'a [u8],
    ) -> LocalBoxFuture<'a, Result<Box<dyn EngineModule>, String>>;
}

/// Retrieve and instantiate the engine module.
///
/// Any failure of the streaming path falls back to the buffered path; only
/// the fallback's failures surface to the caller.
pub async fn fetch_module<S: ModuleSource>(
    source: &S,
) -> Result<Box<dyn EngineModule>, LoaderError> {
    match source.instantiate_streaming().await {
        Ok(module) => return Ok(module),
        Err(err) => {
            log::warn!("streaming instantiation failed, falling back to buffered: {err}");
        }
    }

    let response = source.fetch_bytes().await.map_err(LoaderError::Network)?;
    if !response.is_success() {
        return Err(LoaderError::Fetch {
            status: response.status,
            status_text: response.status_text,
        });
    }
    validate_wasm_header(&response.bytes)?;
    source
        .instantiate_buffer(&response.bytes)
        .await
        .map_err(LoaderError::Instantiation)
}

/// Reject obviously wrong payloads (an HTML error page, a truncated upload)
/// before handing them to the instantiation machinery.
fn validate_wasm_header(bytes: &[u8]) -> Result<(), LoaderError> {
    if bytes.len() < 8 || read_u32_le(bytes, 0) != WASM_MAGIC {
        return Err(LoaderError::Instantiation(
            "response is not a WebAssembly binary".into(),
        ));
    }
    let version = read_u32_le(bytes, 4);
    if version != WASM_VERSION {
        return Err(LoaderError::Instantiation(format!(
            "unsupported WebAssembly version {version}"
        )));
    }
    Ok(())
}
