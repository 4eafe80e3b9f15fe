//! Utility functions for WASM

/// Set panic hook for better error messages in console
pub fn set_panic_hook() {
    console_error_panic_hook::set_once();
}

/// Read u32 little-endian from slice
#[inline]
pub fn read_u32_le(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}
