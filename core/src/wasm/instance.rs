//! Instantiated guest module and its lifecycle hooks

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use wasmtime::{Func, Instance, Linker, Module, Store, Val};

use super::engine::WasmEngine;
use super::state::BridgeContext;
use crate::config::BridgeConfig;
use crate::ffi::register_bridge_ffi;
use crate::gl::{GlBackend, GlBridge, ScratchBuffer};
use crate::input::{EventQueue, KeyState};
use crate::runtime::GuestHooks;

/// Names of the guest exports the host looks up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportNames {
    #[serde(default = "default_memory")]
    pub memory: String,
    #[serde(default = "default_init")]
    pub init: String,
    #[serde(default = "default_destroy")]
    pub destroy: String,
    #[serde(default = "default_apply_events")]
    pub apply_events: String,
    #[serde(default = "default_tick")]
    pub tick: String,
    #[serde(default = "default_draw")]
    pub draw: String,
    /// Global holding the address of the diagnostic text buffer
    #[serde(default = "default_scratch_buffer")]
    pub scratch_buffer: String,
    /// Optional global holding that buffer's size in bytes
    #[serde(default = "default_scratch_buffer_size")]
    pub scratch_buffer_size: String,
}

fn default_memory() -> String {
    "memory".to_string()
}
fn default_init() -> String {
    "c_init".to_string()
}
fn default_destroy() -> String {
    "c_destroy".to_string()
}
fn default_apply_events() -> String {
    "c_applyEvents".to_string()
}
fn default_tick() -> String {
    "c_tickScene".to_string()
}
fn default_draw() -> String {
    "c_drawScene".to_string()
}
fn default_scratch_buffer() -> String {
    "retstr_buf".to_string()
}
fn default_scratch_buffer_size() -> String {
    "retstr_buf_size".to_string()
}

impl Default for ExportNames {
    fn default() -> Self {
        Self {
            memory: default_memory(),
            init: default_init(),
            destroy: default_destroy(),
            apply_events: default_apply_events(),
            tick: default_tick(),
            draw: default_draw(),
            scratch_buffer: default_scratch_buffer(),
            scratch_buffer_size: default_scratch_buffer_size(),
        }
    }
}

/// Exported hook function plus the name it was found under
struct Hook {
    name: String,
    func: Func,
}

/// A loaded and instantiated guest
///
/// Missing hook exports are treated as hooks that always succeed.
pub struct GuestInstance<G: GlBackend> {
    store: Store<BridgeContext<G>>,
    /// Kept alive for the lifetime of the exported functions and memory.
    #[allow(dead_code)]
    instance: Instance,
    init_fn: Option<Hook>,
    destroy_fn: Option<Hook>,
    apply_events_fn: Option<Hook>,
    tick_fn: Option<Hook>,
    draw_fn: Option<Hook>,
}

fn read_global_u32<T>(store: &mut Store<T>, instance: &Instance, name: &str) -> Option<u32> {
    let global = instance.get_global(&mut *store, name)?;
    match global.get(&mut *store) {
        Val::I32(value) => Some(value as u32),
        Val::I64(value) => u32::try_from(value).ok(),
        _ => {
            tracing::warn!(name, "Ignoring non-integer global");
            None
        }
    }
}

impl<G: GlBackend> GuestInstance<G> {
    /// Instantiate `module` with an already populated linker and context
    pub fn new(
        engine: &WasmEngine,
        module: &Module,
        linker: &Linker<BridgeContext<G>>,
        context: BridgeContext<G>,
        exports: &ExportNames,
    ) -> Result<Self> {
        let mut store = Store::new(engine.engine(), context);
        store.limiter(|ctx| &mut ctx.limits);

        let instance = linker
            .instantiate(&mut store, module)
            .context("Failed to instantiate guest module")?;

        match instance.get_memory(&mut store, &exports.memory) {
            Some(memory) => store.data_mut().memory = Some(memory),
            None => tracing::warn!(
                export = %exports.memory,
                "Guest exports no memory; memory-backed imports will be skipped"
            ),
        }

        let scratch =
            read_global_u32(&mut store, &instance, &exports.scratch_buffer).map(|address| {
                ScratchBuffer {
                    address,
                    capacity: read_global_u32(&mut store, &instance, &exports.scratch_buffer_size)
                        .map(|size| size as usize),
                }
            });
        tracing::debug!(?scratch, "Scratch buffer");
        store.data_mut().gl.set_scratch_buffer(scratch);

        let mut hook = |name: &str| {
            let func = instance.get_func(&mut store, name);
            if func.is_none() {
                tracing::debug!(name, "Guest does not export hook");
            }
            func.map(|func| Hook {
                name: name.to_string(),
                func,
            })
        };
        let init_fn = hook(&exports.init);
        let destroy_fn = hook(&exports.destroy);
        let apply_events_fn = hook(&exports.apply_events);
        let tick_fn = hook(&exports.tick);
        let draw_fn = hook(&exports.draw);

        Ok(Self {
            store,
            instance,
            init_fn,
            destroy_fn,
            apply_events_fn,
            tick_fn,
            draw_fn,
        })
    }

    /// Compile, link and instantiate a guest from bytes using `config`
    ///
    /// Also sizes the viewport to the configured drawing buffer, as context
    /// creation does in a browser.
    pub fn load(
        engine: &WasmEngine,
        wasm: &[u8],
        backend: G,
        config: &BridgeConfig,
    ) -> Result<Self> {
        let module = engine.load_module(wasm)?;
        WasmEngine::validate_module_memory(&module, config.ram_limit)?;

        let mut linker = Linker::new(engine.engine());
        register_bridge_ffi(&mut linker)?;

        let mut gl = GlBridge::new(backend, config.gl);
        gl.viewport(
            0,
            0,
            config.context.width as i32,
            config.context.height as i32,
        );
        let context = BridgeContext::with_ram_limit(
            gl,
            EventQueue::new(config.input.max_events_per_tick),
            config.input.keymap.clone(),
            config.ram_limit,
        );

        Self::new(engine, &module, &linker, context, &config.exports)
    }

    /// Call a hook; `Ok(None)` means the hook is not exported
    fn call_hook(
        store: &mut Store<BridgeContext<G>>,
        hook: Option<&Hook>,
        params: &[Val],
    ) -> Result<Option<Option<i32>>> {
        let Some(hook) = hook else {
            return Ok(None);
        };
        let result_count = hook.func.ty(&*store).results().len();
        let mut results = vec![Val::I32(0); result_count];
        hook.func
            .call(&mut *store, params, &mut results)
            .with_context(|| format!("Guest hook `{}` trapped", hook.name))?;
        Ok(Some(results.first().and_then(Val::i32)))
    }

    /// Call the guest's init hook; `false` when it reports failure
    pub fn init(&mut self) -> Result<bool> {
        let status = Self::call_hook(&mut self.store, self.init_fn.as_ref(), &[])?;
        Ok(status.flatten().is_none_or(|code| code != 0))
    }

    /// Call the guest's teardown hook
    pub fn destroy(&mut self) -> Result<()> {
        Self::call_hook(&mut self.store, self.destroy_fn.as_ref(), &[])?;
        Ok(())
    }

    /// Let the guest pull queued events
    ///
    /// Resets the per-tick event budget first. The guest returns non-zero
    /// when it failed or wants to exit, reported here as `false`.
    pub fn apply_events(&mut self) -> Result<bool> {
        self.store.data_mut().events.begin_tick();
        let status = Self::call_hook(&mut self.store, self.apply_events_fn.as_ref(), &[])?;
        Ok(status.flatten().is_none_or(|code| code == 0))
    }

    /// Advance the guest's simulation by `delta_seconds`
    pub fn tick(&mut self, delta_seconds: f32) -> Result<bool> {
        let params = [Val::F32(delta_seconds.to_bits())];
        let status = Self::call_hook(&mut self.store, self.tick_fn.as_ref(), &params)?;
        Ok(status.flatten().is_none_or(|code| code != 0))
    }

    /// Let the guest render, with error queries suppressed if configured
    pub fn draw(&mut self) -> Result<bool> {
        self.store.data_mut().gl.begin_draw();
        let status = Self::call_hook(&mut self.store, self.draw_fn.as_ref(), &[]);
        self.store.data_mut().gl.end_draw();
        Ok(status?.flatten().is_none_or(|code| code != 0))
    }

    /// Queue a host key event for the guest; `false` if the key is unmapped
    pub fn push_key(&mut self, code: &str, state: KeyState) -> bool {
        let ctx = self.store.data_mut();
        ctx.events.push_key(&ctx.keymap, code, state)
    }

    pub fn context(&self) -> &BridgeContext<G> {
        self.store.data()
    }

    pub fn context_mut(&mut self) -> &mut BridgeContext<G> {
        self.store.data_mut()
    }

    pub fn backend(&self) -> &G {
        self.store.data().gl.backend()
    }

    pub fn backend_mut(&mut self) -> &mut G {
        self.store.data_mut().gl.backend_mut()
    }

    /// Copy of guest memory, for inspection
    pub fn memory_snapshot(&self) -> Option<Vec<u8>> {
        let memory = self.store.data().memory?;
        Some(memory.data(&self.store).to_vec())
    }

    /// Consume the instance, returning the backend
    pub fn into_backend(self) -> G {
        self.store.into_data().gl.into_backend()
    }
}

impl<G: GlBackend> GuestHooks for GuestInstance<G> {
    fn init(&mut self) -> Result<bool> {
        GuestInstance::init(self)
    }

    fn destroy(&mut self) -> Result<()> {
        GuestInstance::destroy(self)
    }

    fn apply_events(&mut self) -> Result<bool> {
        GuestInstance::apply_events(self)
    }

    fn tick(&mut self, delta_seconds: f32) -> Result<bool> {
        GuestInstance::tick(self, delta_seconds)
    }

    fn draw(&mut self) -> Result<bool> {
        GuestInstance::draw(self)
    }
}
