use crate::api::{self, WispApi};
use crate::error::WispError;
use std::fs;
use std::path::Path;
use wasmtime::{
    Engine, Instance, Linker, Memory, Module, Store, Trap, TypedFunc, Val, WasmParams,
    WasmResults,
};

struct Exports {
    ctx_init: TypedFunc<(), i32>,
    alloc: TypedFunc<(i32, i32), i32>,
    free: TypedFunc<(i32, i32), ()>,
    destroy: TypedFunc<(i32, i32), ()>,
    v08_len: TypedFunc<i32, i32>,
    v08_ptr: TypedFunc<i32, i32>,
    v32_len: TypedFunc<i32, i32>,
    v32_ptr: TypedFunc<i32, i32>,
    dat_init: TypedFunc<i32, i32>,
    dat_read: TypedFunc<(i32, i32), ()>,
    read: TypedFunc<(i32, i32), i32>,
    eval: TypedFunc<(i32, i32, i32), i32>,
}

/// A wisp module instantiated in wasmtime.
pub struct WasmWisp {
    store: Store<()>,
    instance: Instance,
    memory: Memory,
    exports: Exports,
}

impl WasmWisp {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, WispError> {
        let path = path.as_ref();
        let bytes = fs::read(path)
            .map_err(|err| WispError::Load(anyhow::anyhow!("{}: {err}", path.display())))?;
        Self::from_bytes(&bytes)
    }

    /// Accepts either a binary module or its text format.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WispError> {
        let binary = wat::parse_bytes(bytes).map_err(|err| WispError::Load(err.into()))?;
        let engine = Engine::default();
        let module = Module::from_binary(&engine, &binary).map_err(WispError::Load)?;
        let mut store = Store::new(&engine, ());
        let mut linker = Linker::new(&engine);
        linker
            .define_unknown_imports_as_traps(&module)
            .map_err(WispError::Load)?;
        let instance = linker
            .instantiate(&mut store, &module)
            .map_err(|err| WispError::Load(map_trap(err)))?;
        let memory = instance
            .get_memory(&mut store, api::MEMORY_EXPORT)
            .ok_or_else(|| WispError::MissingExport(api::MEMORY_EXPORT.to_string()))?;
        let exports = Exports {
            ctx_init: typed(&instance, &mut store, api::CTX_INIT)?,
            alloc: typed(&instance, &mut store, api::ALLOC)?,
            free: typed(&instance, &mut store, api::FREE)?,
            destroy: typed(&instance, &mut store, api::DESTROY)?,
            v08_len: typed(&instance, &mut store, api::V08_LEN)?,
            v08_ptr: typed(&instance, &mut store, api::V08_PTR)?,
            v32_len: typed(&instance, &mut store, api::V32_LEN)?,
            v32_ptr: typed(&instance, &mut store, api::V32_PTR)?,
            dat_init: typed(&instance, &mut store, api::DAT_INIT)?,
            dat_read: typed(&instance, &mut store, api::DAT_READ)?,
            read: typed(&instance, &mut store, api::READ)?,
            eval: typed(&instance, &mut store, api::EVAL)?,
        };
        log::debug!(
            "instantiated wisp module with {} bytes of memory",
            memory.data_size(&store)
        );
        Ok(Self {
            store,
            instance,
            memory,
            exports,
        })
    }
}

fn typed<Params, Results>(
    instance: &Instance,
    store: &mut Store<()>,
    name: &str,
) -> Result<TypedFunc<Params, Results>, WispError>
where
    Params: WasmParams,
    Results: WasmResults,
{
    instance
        .get_typed_func::<Params, Results>(&mut *store, name)
        .map_err(|err| {
            log::debug!("export {name}: {err:#}");
            WispError::MissingExport(name.to_string())
        })
}

fn map_trap(err: anyhow::Error) -> anyhow::Error {
    let message = match err.downcast_ref::<Trap>() {
        Some(Trap::StackOverflow) => Some("runtime call stack exhausted".to_string()),
        Some(trap) => Some(format!("wasm trap: {trap}")),
        None => None,
    };
    match message {
        Some(message) => err.context(message),
        None => err,
    }
}

fn word(value: i32) -> u32 {
    value as u32
}

fn arg(value: u32) -> i32 {
    value as i32
}

impl WispApi for WasmWisp {
    fn memory(&self) -> &[u8] {
        self.memory.data(&self.store)
    }

    fn write_memory(&mut self, offset: u32, bytes: &[u8]) -> anyhow::Result<()> {
        self.memory.write(&mut self.store, offset as usize, bytes)?;
        Ok(())
    }

    fn global(&mut self, name: &str) -> anyhow::Result<u32> {
        let global = self
            .instance
            .get_global(&mut self.store, name)
            .ok_or_else(|| anyhow::anyhow!("missing global export `{name}`"))?;
        match global.get(&mut self.store) {
            Val::I32(value) => Ok(word(value)),
            other => anyhow::bail!("global `{name}` is not an i32: {other:?}"),
        }
    }

    fn ctx_init(&mut self) -> anyhow::Result<u32> {
        self.exports
            .ctx_init
            .call(&mut self.store, ())
            .map(word)
            .map_err(map_trap)
    }

    fn alloc(&mut self, ctx: u32, size: u32) -> anyhow::Result<u32> {
        self.exports
            .alloc
            .call(&mut self.store, (arg(ctx), arg(size)))
            .map(word)
            .map_err(map_trap)
    }

    fn free(&mut self, ctx: u32, ptr: u32) -> anyhow::Result<()> {
        self.exports
            .free
            .call(&mut self.store, (arg(ctx), arg(ptr)))
            .map_err(map_trap)
    }

    fn destroy(&mut self, ctx: u32, value: u32) -> anyhow::Result<()> {
        self.exports
            .destroy
            .call(&mut self.store, (arg(ctx), arg(value)))
            .map_err(map_trap)
    }

    fn v08_len(&mut self, ctx: u32) -> anyhow::Result<u32> {
        self.exports
            .v08_len
            .call(&mut self.store, arg(ctx))
            .map(word)
            .map_err(map_trap)
    }

    fn v08_ptr(&mut self, ctx: u32) -> anyhow::Result<u32> {
        self.exports
            .v08_ptr
            .call(&mut self.store, arg(ctx))
            .map(word)
            .map_err(map_trap)
    }

    fn v32_len(&mut self, ctx: u32) -> anyhow::Result<u32> {
        self.exports
            .v32_len
            .call(&mut self.store, arg(ctx))
            .map(word)
            .map_err(map_trap)
    }

    fn v32_ptr(&mut self, ctx: u32) -> anyhow::Result<u32> {
        self.exports
            .v32_ptr
            .call(&mut self.store, arg(ctx))
            .map(word)
            .map_err(map_trap)
    }

    fn dat_init(&mut self, ctx: u32) -> anyhow::Result<u32> {
        self.exports
            .dat_init
            .call(&mut self.store, arg(ctx))
            .map(word)
            .map_err(map_trap)
    }

    fn dat_read(&mut self, ctx: u32, dat: u32) -> anyhow::Result<()> {
        self.exports
            .dat_read
            .call(&mut self.store, (arg(ctx), arg(dat)))
            .map_err(map_trap)
    }

    fn read(&mut self, ctx: u32, buf: u32) -> anyhow::Result<u32> {
        self.exports
            .read
            .call(&mut self.store, (arg(ctx), arg(buf)))
            .map(word)
            .map_err(map_trap)
    }

    fn eval(&mut self, ctx: u32, exp: u32, max_steps: u32) -> anyhow::Result<u32> {
        self.exports
            .eval
            .call(&mut self.store, (arg(ctx), arg(exp), arg(max_steps)))
            .map(word)
            .map_err(map_trap)
    }
}
