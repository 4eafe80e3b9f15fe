//! linework-loader: runtime loader for the linework vectorization engine
//!
//! The engine itself (edge, centerline, superpixel and dot tracing) is
//! compiled separately to WebAssembly. This crate fetches and instantiates
//! that binary exactly once per page, negotiates multi-threaded execution
//! against the environment's capabilities, and exposes the narrow vectorize
//! surface behind camelCase bindings.

use std::rc::Rc;

use wasm_bindgen::prelude::*;

pub mod browser;
pub mod capabilities;
pub mod error;
pub mod fetch;
pub mod loader;
pub mod module;
pub mod utils;
pub mod vectorizer;

#[cfg(test)]
mod fakes;

pub use capabilities::{probe_snapshot, BrowserEnv, CapabilitySnapshot, EnvProbe};
pub use error::LoaderError;
pub use fetch::{fetch_module, FetchedBytes, ModuleSource};
pub use loader::{EngineHandle, EngineLoader};
pub use module::{EngineModule, PixelFrame, VectorizerBackend};
pub use vectorizer::{VectorizeOptions, Vectorizer};

use browser::HttpModuleSource;

/// Build-time location of the engine binary.
pub const ENGINE_MODULE_URL: &str = "/wasm/linework_engine_bg.wasm";

thread_local! {
    static ENGINE: Rc<EngineLoader<HttpModuleSource, BrowserEnv>> = Rc::new(EngineLoader::new(
        HttpModuleSource::new(ENGINE_MODULE_URL),
        BrowserEnv,
    ));
}

fn engine() -> Rc<EngineLoader<HttpModuleSource, BrowserEnv>> {
    ENGINE.with(Rc::clone)
}

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    utils::set_panic_hook();
    let _ = console_log::init_with_level(log::Level::Info);
    log::info!("linework-loader initialized");
}

/// Get loader version
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Load the engine, attaching to any load already in flight.
#[wasm_bindgen(js_name = loadEngine)]
pub async fn load_engine() -> Result<(), JsError> {
    engine().load().await?;
    Ok(())
}

/// Whether the engine has finished loading.
#[wasm_bindgen(js_name = isEngineLoaded)]
pub fn is_engine_loaded() -> bool {
    engine().is_loaded()
}

/// Probe environment capabilities. Loads the engine first so threading
/// support is reported truthfully.
#[wasm_bindgen(js_name = getCapabilities)]
pub async fn get_capabilities() -> Result<JsValue, JsError> {
    let snapshot = engine().capabilities().await?;
    Ok(serde_wasm_bindgen::to_value(&snapshot)?)
}

/// Worker threads the engine is running with; 1 until the engine is ready.
#[wasm_bindgen(js_name = getCurrentThreadCount)]
pub fn get_current_thread_count() -> u32 {
    engine().current_thread_count()
}

/// Backend identifiers reported by the loaded engine.
#[wasm_bindgen(js_name = getAvailableBackends)]
pub fn get_available_backends() -> Result<Vec<JsValue>, JsError> {
    let backends = engine().available_backends()?;
    Ok(backends.iter().map(|name| JsValue::from_str(name)).collect())
}

/// Preset identifiers reported by the loaded engine.
#[wasm_bindgen(js_name = getAvailablePresets)]
pub fn get_available_presets() -> Result<Vec<JsValue>, JsError> {
    let presets = engine().available_presets()?;
    Ok(presets.iter().map(|name| JsValue::from_str(name)).collect())
}

/// Vectorize one image: configure from the options object, run the engine,
/// release the instance.
#[wasm_bindgen(js_name = vectorizeImage)]
pub async fn vectorize_image(image: web_sys::ImageData, options: JsValue) -> Result<String, JsError> {
    let options: VectorizeOptions = if options.is_undefined() || options.is_null() {
        VectorizeOptions::default()
    } else {
        serde_wasm_bindgen::from_value(options)?
    };
    let frame = PixelFrame::new(image.width(), image.height(), image.data().0)?;
    Ok(engine().vectorize_image(&frame, &options).await?)
}

/// Drop any cached load outcome so the next call retries from scratch.
#[wasm_bindgen(js_name = resetEngine)]
pub fn reset_engine() {
    engine().reset();
}

/// One-line threading diagnostic for console display.
#[wasm_bindgen(js_name = threadingSummary)]
pub fn threading_summary() -> String {
    engine().threading_summary()
}
