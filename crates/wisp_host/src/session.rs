use crate::api::{self, WispApi};
use crate::codes::Codes;
use crate::config::SessionConfig;
use crate::error::{runtime_error, WispError};
use crate::heap::{read_tables, HeapTables};
use crate::inspect::Inspector;
use crate::memory::MemoryView;
use crate::value::Value;
use crate::vector::Arenas;

/// One runtime context driven from the host.
///
/// Codes are read when the session is created; the context itself exists
/// only after [`Session::attach`]. Every call that may allocate or evaluate
/// inside the runtime advances the session epoch, which invalidates heap
/// snapshots taken before it.
pub struct Session<R: WispApi> {
    runtime: R,
    codes: Codes,
    config: SessionConfig,
    ctx: Option<u32>,
    epoch: u64,
}

impl<R: WispApi> Session<R> {
    pub fn new(runtime: R) -> Result<Self, WispError> {
        Self::with_config(runtime, SessionConfig::default())
    }

    pub fn with_config(mut runtime: R, config: SessionConfig) -> Result<Self, WispError> {
        let codes = Codes::load(&mut runtime)?;
        Ok(Self {
            runtime,
            codes,
            config,
            ctx: None,
            epoch: 0,
        })
    }

    /// Loads codes and creates the context in one step.
    pub fn open(runtime: R) -> Result<Self, WispError> {
        let mut session = Self::new(runtime)?;
        session.attach()?;
        Ok(session)
    }

    pub fn attach(&mut self) -> Result<u32, WispError> {
        if self.ctx.is_some() {
            return Err(WispError::AlreadyAttached);
        }
        let ctx = self
            .runtime
            .ctx_init()
            .map_err(runtime_error(api::CTX_INIT))?;
        log::debug!("attached runtime context {ctx:#x}");
        self.ctx = Some(ctx);
        self.epoch += 1;
        Ok(ctx)
    }

    pub fn is_attached(&self) -> bool {
        self.ctx.is_some()
    }

    pub fn context(&self) -> Result<u32, WispError> {
        self.ctx.ok_or(WispError::NotAttached)
    }

    pub fn codes(&self) -> &Codes {
        &self.codes
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub fn into_runtime(self) -> R {
        self.runtime
    }

    pub fn memory(&self) -> MemoryView<'_> {
        MemoryView::new(self.runtime.memory())
    }

    /// Whether no mutating call happened since `tables` was taken.
    pub fn is_current(&self, tables: &HeapTables) -> bool {
        let current = tables.epoch == self.epoch;
        if !current {
            log::debug!(
                "snapshot {} is stale, session is at epoch {}",
                tables.epoch,
                self.epoch
            );
        }
        current
    }

    pub fn alloc(&mut self, size: u32) -> Result<u32, WispError> {
        let ctx = self.mutating()?;
        self.runtime
            .alloc(ctx, size)
            .map_err(runtime_error(api::ALLOC))
    }

    pub fn free(&mut self, ptr: u32) -> Result<(), WispError> {
        let ctx = self.mutating()?;
        self.runtime.free(ctx, ptr).map_err(runtime_error(api::FREE))
    }

    pub fn destroy(&mut self, value: Value) -> Result<(), WispError> {
        let ctx = self.mutating()?;
        self.runtime
            .destroy(ctx, value.raw())
            .map_err(runtime_error(api::DESTROY))
    }

    /// Hands `source` to the runtime reader through a NUL-terminated scratch
    /// buffer. The buffer is released whether or not reading succeeds.
    pub fn read_text(&mut self, source: &str) -> Result<Value, WispError> {
        let ctx = self.context()?;
        let mut text = Vec::with_capacity(source.len() + 1);
        text.extend_from_slice(source.as_bytes());
        text.push(0);
        let size = u32::try_from(text.len()).map_err(|_| WispError::SourceTooLarge(source.len()))?;

        let buf = self.alloc(size)?;
        let parsed = self.read_buffer(ctx, buf, &text);
        let freed = self.free(buf);
        let value = parsed?;
        freed?;
        log::debug!("read {} bytes -> {value}", source.len());
        Ok(value)
    }

    fn read_buffer(&mut self, ctx: u32, buf: u32, text: &[u8]) -> Result<Value, WispError> {
        self.runtime
            .write_memory(buf, text)
            .map_err(runtime_error("memory write"))?;
        self.epoch += 1;
        self.runtime
            .read(ctx, buf)
            .map(Value::from_raw)
            .map_err(runtime_error(api::READ))
    }

    /// Evaluates `value` with at most `max_steps` reductions. Running out of
    /// steps is reported by the runtime as a sentinel value, returned as is.
    pub fn eval(&mut self, value: Value, max_steps: u32) -> Result<Value, WispError> {
        let ctx = self.mutating()?;
        let result = self
            .runtime
            .eval(ctx, value.raw(), max_steps)
            .map(Value::from_raw)
            .map_err(runtime_error(api::EVAL))?;
        log::debug!("eval {value} with {max_steps} steps -> {result}");
        Ok(result)
    }

    pub fn eval_default(&mut self, value: Value) -> Result<Value, WispError> {
        self.eval(value, self.config.step_budget)
    }

    pub fn read_eval(&mut self, source: &str) -> Result<Value, WispError> {
        let value = self.read_text(source)?;
        self.eval_default(value)
    }

    /// Asks the runtime for a fresh metadata block and copies out every heap
    /// table it describes.
    pub fn snapshot(&mut self) -> Result<HeapTables, WispError> {
        let ctx = self.mutating()?;
        let block = self
            .runtime
            .dat_init(ctx)
            .map_err(runtime_error(api::DAT_INIT))?;
        self.runtime
            .dat_read(ctx, block)
            .map_err(runtime_error(api::DAT_READ))?;
        read_tables(&self.memory(), block, self.epoch)
    }

    pub fn arenas(&mut self) -> Result<Arenas, WispError> {
        let ctx = self.context()?;
        let v08_len = self
            .runtime
            .v08_len(ctx)
            .map_err(runtime_error(api::V08_LEN))?;
        let v08_ptr = self
            .runtime
            .v08_ptr(ctx)
            .map_err(runtime_error(api::V08_PTR))?;
        let v32_len = self
            .runtime
            .v32_len(ctx)
            .map_err(runtime_error(api::V32_LEN))?;
        let v32_ptr = self
            .runtime
            .v32_ptr(ctx)
            .map_err(runtime_error(api::V32_PTR))?;
        Arenas::read(&self.memory(), (v08_ptr, v08_len), (v32_ptr, v32_len))
    }

    pub fn inspect(&mut self) -> Result<Inspector, WispError> {
        let tables = self.snapshot()?;
        let arenas = self.arenas()?;
        Ok(Inspector::new(self.codes.clone(), tables, arenas))
    }

    fn mutating(&mut self) -> Result<u32, WispError> {
        let ctx = self.context()?;
        self.epoch += 1;
        Ok(ctx)
    }
}
