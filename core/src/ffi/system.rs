//! Logging and event FFI functions

use wasmtime::Caller;

use crate::gl::GlBackend;
use crate::input::NO_EVENT;
use crate::marshal;
use crate::wasm::BridgeContext;
use crate::wasm::state::with_memory;

/// Log a NUL-terminated message from WASM
pub(super) fn console_log<G: GlBackend>(mut caller: Caller<'_, BridgeContext<G>>, msg: u32) {
    with_memory(&mut caller, "console_log", |memory, ctx| {
        let limit = ctx.gl.config().string_scan_limit;
        match marshal::read_c_string(memory, msg, limit) {
            Ok(text) => tracing::info!(target: "guest", ">>> {}", text),
            Err(error) => tracing::warn!(%error, "console_log: unreadable message"),
        }
    });
}

/// Copy the next queued event into `buf`
///
/// Returns the number of bytes written, or 0 when there is no event this tick.
pub(super) fn fetch_event<G: GlBackend>(
    mut caller: Caller<'_, BridgeContext<G>>,
    buf: u32,
    buf_size: u32,
) -> u32 {
    with_memory(&mut caller, "fetch_event", |memory, ctx| {
        match marshal::view_bytes_mut(memory, buf, buf_size) {
            Ok(dst) => ctx.events.fetch_into(dst),
            Err(error) => {
                tracing::warn!(%error, "fetch_event: bad destination buffer");
                NO_EVENT
            }
        }
    })
    .unwrap_or(NO_EVENT)
}
