//! Store data for a bridge session
//!
//! Everything the import functions touch lives here, owned by the wasmtime
//! store: there is no ambient state.

use tracing::warn;
use wasmtime::{Caller, Memory, StoreLimits, StoreLimitsBuilder};

use crate::gl::{GlBackend, GlBridge};
use crate::input::{EventQueue, KeyMap};

/// Default cap on guest linear memory (64 MiB)
pub const DEFAULT_RAM_LIMIT: usize = 64 * 1024 * 1024;

/// Context stored in the wasmtime store for one guest
pub struct BridgeContext<G: GlBackend> {
    /// Guest linear memory (set after instantiation)
    pub memory: Option<Memory>,
    /// Graphics forwarding state
    pub gl: GlBridge<G>,
    /// Key events waiting for `fetch_event`
    pub events: EventQueue,
    /// Physical key code to logical name
    pub keymap: KeyMap,
    /// Memory limits enforced by the store's resource limiter
    pub limits: StoreLimits,
}

impl<G: GlBackend> BridgeContext<G> {
    pub fn new(gl: GlBridge<G>, events: EventQueue, keymap: KeyMap) -> Self {
        Self::with_ram_limit(gl, events, keymap, DEFAULT_RAM_LIMIT)
    }

    pub fn with_ram_limit(
        gl: GlBridge<G>,
        events: EventQueue,
        keymap: KeyMap,
        ram_limit: usize,
    ) -> Self {
        Self {
            memory: None,
            gl,
            events,
            keymap,
            limits: StoreLimitsBuilder::new().memory_size(ram_limit).build(),
        }
    }
}

/// Run `f` with guest memory and the context borrowed together
///
/// Returns `None` (after logging) when the guest exports no memory.
pub(crate) fn with_memory<G: GlBackend, R>(
    caller: &mut Caller<'_, BridgeContext<G>>,
    call: &'static str,
    f: impl FnOnce(&mut [u8], &mut BridgeContext<G>) -> R,
) -> Option<R> {
    let Some(memory) = caller.data().memory else {
        warn!(call, "No WASM memory available");
        return None;
    };
    let (data, ctx) = memory.data_and_store_mut(caller);
    Some(f(data, ctx))
}
