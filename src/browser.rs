//! Browser-side implementations of the engine contract.
//!
//! Everything here is duck-typed plumbing over a live `WebAssembly.Instance`:
//! export lookups through `Reflect`, promise bridging through `JsFuture`, and
//! pixel handoff through `ImageData`. Presence checks on optional exports
//! happen here so the rest of the crate only sees `Option`s.

use futures::future::{FutureExt, LocalBoxFuture};
use js_sys::{Array, Function, Object, Promise, Reflect, Uint8Array, WebAssembly};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;

use crate::fetch::{FetchedBytes, ModuleSource};
use crate::module::{
    EngineModule, PixelFrame, VectorizerBackend, BACKENDS_EXPORT, PRESETS_EXPORT, SETUP_EXPORT,
    THREADING_QUERY_EXPORT, THREAD_COUNT_EXPORT, THREAD_POOL_EXPORT, VECTORIZER_EXPORT,
};

fn js_detail(value: &JsValue) -> String {
    value.as_string().unwrap_or_else(|| format!("{value:?}"))
}

/// Fetches the engine binary over HTTP and instantiates it.
#[derive(Debug, Clone)]
pub struct HttpModuleSource {
    url: String,
}

impl HttpModuleSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// Host bindings passed to instantiation; the engine is self-contained,
    /// so this stays empty.
    fn imports(&self) -> Object {
        Object::new()
    }

    fn fetch_promise(&self) -> Result<Promise, String> {
        let window = web_sys::window().ok_or_else(|| "no window in this realm".to_string())?;
        Ok(window.fetch_with_str(&self.url))
    }
}

impl ModuleSource for HttpModuleSource {
    fn instantiate_streaming(&self) -> LocalBoxFuture<'_, Result<Box<dyn EngineModule>, String>> {
        async move {
            let response = self.fetch_promise()?;
            let result = JsFuture::from(WebAssembly::instantiate_streaming(
                &response,
                &self.imports(),
            ))
            .await
            .map_err(|err| js_detail(&err))?;
            module_from_result(&result)
        }
        .boxed_local()
    }

    fn fetch_bytes(&self) -> LocalBoxFuture<'_, Result<FetchedBytes, String>> {
        async move {
            let response = JsFuture::from(self.fetch_promise()?)
                .await
                .map_err(|err| js_detail(&err))?;
            let response: web_sys::Response = response
                .dyn_into()
                .map_err(|_| "fetch did not yield a Response".to_string())?;
            let status = response.status();
            let status_text = response.status_text();
            let buffer = JsFuture::from(response.array_buffer().map_err(|err| js_detail(&err))?)
                .await
                .map_err(|err| js_detail(&err))?;
            Ok(FetchedBytes {
                status,
                status_text,
                bytes: Uint8Array::new(&buffer).to_vec(),
            })
        }
        .boxed_local()
    }

    fn instantiate_buffer<'a>(
        &'a self,
        bytes: &'a [u8],
    ) -> LocalBoxFuture<'a, Result<Box<dyn EngineModule>, String>> {
        async move {
            let result = JsFuture::from(WebAssembly::instantiate_buffer(bytes, &self.imports()))
                .await
                .map_err(|err| js_detail(&err))?;
            module_from_result(&result)
        }
        .boxed_local()
    }
}

/// Pull the instance out of an `instantiate` result (`{module, instance}`).
fn module_from_result(result: &JsValue) -> Result<Box<dyn EngineModule>, String> {
    let instance = Reflect::get(result, &"instance".into()).map_err(|err| js_detail(&err))?;
    let instance: WebAssembly::Instance = instance
        .dyn_into()
        .map_err(|_| "instantiation result has no instance".to_string())?;
    Ok(Box::new(JsEngineModule::new(instance.exports())))
}

/// An instantiated engine module seen through its export table.
#[derive(Debug)]
pub struct JsEngineModule {
    exports: Object,
}

impl JsEngineModule {
    pub fn new(exports: Object) -> Self {
        Self { exports }
    }

    fn export_fn(&self, name: &str) -> Option<Function> {
        let value = Reflect::get(&self.exports, &name.into()).ok()?;
        value.dyn_into::<Function>().ok()
    }

    fn string_list(&self, export: &str) -> Vec<String> {
        let Some(query) = self.export_fn(export) else {
            log::debug!("engine module has no `{export}` export");
            return Vec::new();
        };
        match query.call0(&JsValue::UNDEFINED) {
            Ok(value) => Array::from(&value)
                .iter()
                .filter_map(|item| item.as_string())
                .collect(),
            Err(err) => {
                log::warn!("engine `{export}` call failed: {}", js_detail(&err));
                Vec::new()
            }
        }
    }
}

impl EngineModule for JsEngineModule {
    fn setup(&self) -> LocalBoxFuture<'_, Result<(), String>> {
        async move {
            let Some(setup) = self.export_fn(SETUP_EXPORT) else {
                log::debug!("engine module has no `{SETUP_EXPORT}` export; skipping setup");
                return Ok(());
            };
            let value = setup
                .call0(&JsValue::UNDEFINED)
                .map_err(|err| js_detail(&err))?;
            // Normalize plain returns and thenables alike.
            JsFuture::from(Promise::resolve(&value))
                .await
                .map(|_| ())
                .map_err(|err| js_detail(&err))
        }
        .boxed_local()
    }

    fn threading_supported(&self) -> Option<bool> {
        let query = self.export_fn(THREADING_QUERY_EXPORT)?;
        query.call0(&JsValue::UNDEFINED).ok()?.as_bool()
    }

    fn start_thread_pool(&self, threads: u32) -> Option<LocalBoxFuture<'_, Result<u32, String>>> {
        let init = self.export_fn(THREAD_POOL_EXPORT)?;
        Some(
            async move {
                let value = init
                    .call1(&JsValue::UNDEFINED, &JsValue::from(threads))
                    .map_err(|err| js_detail(&err))?;
                JsFuture::from(Promise::resolve(&value))
                    .await
                    .map_err(|err| js_detail(&err))?;
                // Prefer the pool's own count over the requested one.
                let achieved = self
                    .export_fn(THREAD_COUNT_EXPORT)
                    .and_then(|count| count.call0(&JsValue::UNDEFINED).ok())
                    .and_then(|value| value.as_f64())
                    .map(|value| value as u32)
                    .unwrap_or(threads);
                Ok(achieved)
            }
            .boxed_local(),
        )
    }

    fn available_backends(&self) -> Vec<String> {
        self.string_list(BACKENDS_EXPORT)
    }

    fn available_presets(&self) -> Vec<String> {
        self.string_list(PRESETS_EXPORT)
    }

    fn create_vectorizer(&self) -> Result<Option<Box<dyn VectorizerBackend>>, String> {
        let Some(constructor) = self.export_fn(VECTORIZER_EXPORT) else {
            return Ok(None);
        };
        let instance =
            Reflect::construct(&constructor, &Array::new()).map_err(|err| js_detail(&err))?;
        Ok(Some(Box::new(JsVectorizerBackend::new(instance))))
    }
}

/// One engine-side vectorizer instance.
#[derive(Debug)]
pub struct JsVectorizerBackend {
    instance: JsValue,
}

impl JsVectorizerBackend {
    pub fn new(instance: JsValue) -> Self {
        Self { instance }
    }

    fn method(&self, name: &str) -> Option<Function> {
        let value = Reflect::get(&self.instance, &name.into()).ok()?;
        value.dyn_into::<Function>().ok()
    }

    /// Engine builds do not all carry every setter; absent ones are skipped.
    fn call_setter(&self, name: &str, arg: &JsValue) -> Result<(), String> {
        let Some(setter) = self.method(name) else {
            log::debug!("vectorizer instance has no `{name}` setter; ignoring");
            return Ok(());
        };
        setter
            .call1(&self.instance, arg)
            .map(|_| ())
            .map_err(|err| js_detail(&err))
    }
}

impl VectorizerBackend for JsVectorizerBackend {
    fn set_backend(&mut self, backend: &str) -> Result<(), String> {
        self.call_setter("set_backend", &JsValue::from_str(backend))
    }

    fn set_detail(&mut self, detail: f32) -> Result<(), String> {
        self.call_setter("set_detail", &JsValue::from_f64(f64::from(detail)))
    }

    fn set_stroke_width(&mut self, width: f32) -> Result<(), String> {
        self.call_setter("set_stroke_width", &JsValue::from_f64(f64::from(width)))
    }

    fn vectorize(&mut self, frame: &PixelFrame) -> Result<String, String> {
        let vectorize = self
            .method("vectorize")
            .ok_or_else(|| "vectorizer instance has no `vectorize` method".to_string())?;
        let image = web_sys::ImageData::new_with_u8_clamped_array_and_sh(
            wasm_bindgen::Clamped(frame.data()),
            frame.width(),
            frame.height(),
        )
        .map_err(|err| js_detail(&err))?;
        let svg = vectorize
            .call1(&self.instance, &image)
            .map_err(|err| js_detail(&err))?;
        svg.as_string()
            .ok_or_else(|| "vectorize did not return a string".to_string())
    }

    fn release(&mut self) {
        if let Some(free) = self.method("free") {
            if let Err(err) = free.call0(&self.instance) {
                log::warn!("vectorizer free failed: {}", js_detail(&err));
            }
        }
    }
}
