//! Environment capability detection for engine threading.
//!
//! Multi-threaded execution inside the engine module requires SharedArrayBuffer,
//! which browsers only expose under cross-origin isolation. This module reads
//! those environment flags into an immutable snapshot; whether the loaded
//! engine itself supports threading is layered on top by the loader.

use serde::{Deserialize, Serialize};

/// Point-in-time read of the environment flags relevant to threading.
///
/// Built fresh on every query so that a service worker flipping headers
/// mid-session is observed; there is no identity beyond value equality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilitySnapshot {
    /// Whether the host reports cross-origin isolation.
    pub cross_origin_isolated: bool,
    /// Whether the SharedArrayBuffer constructor is defined.
    pub shared_array_buffer: bool,
    /// Whether the loaded engine reports threading support. Always `false`
    /// from a bare probe; truthful only after the module is loaded.
    pub threading_supported: bool,
    /// Host-reported logical processor count, at least 1.
    pub hardware_concurrency: u32,
}

impl CapabilitySnapshot {
    /// Environment prerequisites for threading that are currently absent.
    pub fn missing_requirements(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if !self.cross_origin_isolated {
            missing.push("Cross-Origin Isolation");
        }
        if !self.shared_array_buffer {
            missing.push("SharedArrayBuffer");
        }
        missing
    }
}

/// Read-only view of the hosting environment.
///
/// The loader is generic over this so the pure core can be exercised against
/// synthetic environments; [`BrowserEnv`] is the production implementation.
pub trait EnvProbe {
    fn cross_origin_isolated(&self) -> bool;
    fn shared_array_buffer(&self) -> bool;
    /// Logical processor count as reported by the host, `None` if the host
    /// does not report one.
    fn hardware_concurrency(&self) -> Option<u32>;
}

/// Build a snapshot from an environment probe.
///
/// Synchronous, side-effect free, safe to call before the engine is loaded.
/// Every field degrades to a safe default when its source is absent.
pub fn probe_snapshot(env: &impl EnvProbe) -> CapabilitySnapshot {
    CapabilitySnapshot {
        cross_origin_isolated: env.cross_origin_isolated(),
        shared_array_buffer: env.shared_array_buffer(),
        threading_supported: false,
        hardware_concurrency: env.hardware_concurrency().unwrap_or(1).max(1),
    }
}

/// Probe backed by the JS globals of the current realm.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserEnv;

#[cfg(target_arch = "wasm32")]
impl EnvProbe for BrowserEnv {
    fn cross_origin_isolated(&self) -> bool {
        js_sys::Reflect::get(&js_sys::global(), &"crossOriginIsolated".into())
            .ok()
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    fn shared_array_buffer(&self) -> bool {
        js_sys::Reflect::get(&js_sys::global(), &"SharedArrayBuffer".into())
            .map(|v| !v.is_undefined())
            .unwrap_or(false)
    }

    fn hardware_concurrency(&self) -> Option<u32> {
        let window = web_sys::window()?;
        let concurrency = window.navigator().hardware_concurrency();
        if concurrency >= 1.0 {
            Some(concurrency as u32)
        } else {
            None
        }
    }
}

/// Outside the browser there are no JS globals to inspect; report the
/// single-threaded defaults.
#[cfg(not(target_arch = "wasm32"))]
impl EnvProbe for BrowserEnv {
    fn cross_origin_isolated(&self) -> bool {
        false
    }

    fn shared_array_buffer(&self) -> bool {
        false
    }

    fn hardware_concurrency(&self) -> Option<u32> {
        None
    }
}
