// Entry points exported by a wisp runtime module.

use crate::value::{Sys, Tag};

pub const MEMORY_EXPORT: &str = "memory";

pub const CTX_INIT: &str = "wisp_ctx_init";
pub const ALLOC: &str = "wisp_alloc";
pub const FREE: &str = "wisp_free";
pub const DESTROY: &str = "wisp_destroy";
pub const V08_LEN: &str = "wisp_ctx_v08_len";
pub const V08_PTR: &str = "wisp_ctx_v08_ptr";
pub const V32_LEN: &str = "wisp_ctx_v32_len";
pub const V32_PTR: &str = "wisp_ctx_v32_ptr";
pub const DAT_INIT: &str = "wisp_dat_init";
pub const DAT_READ: &str = "wisp_dat_read";
pub const READ: &str = "wisp_read";
pub const EVAL: &str = "wisp_eval";

pub fn tag_global(tag: Tag) -> String {
    format!("wisp_tag_{}", tag.name())
}

pub fn sys_global(sys: Sys) -> String {
    format!("wisp_sys_{}", sys.name())
}

/// The fixed contract a runtime instance offers the host.
///
/// `ctx` is the handle returned by [`WispApi::ctx_init`]. Pointers and values
/// are raw 32-bit words; interpreting them is the caller's job.
pub trait WispApi {
    fn memory(&self) -> &[u8];

    fn write_memory(&mut self, offset: u32, bytes: &[u8]) -> anyhow::Result<()>;

    /// Value of an exported global. Tag and sys globals hold the address of
    /// the actual code in linear memory.
    fn global(&mut self, name: &str) -> anyhow::Result<u32>;

    fn ctx_init(&mut self) -> anyhow::Result<u32>;

    fn alloc(&mut self, ctx: u32, size: u32) -> anyhow::Result<u32>;

    fn free(&mut self, ctx: u32, ptr: u32) -> anyhow::Result<()>;

    fn destroy(&mut self, ctx: u32, value: u32) -> anyhow::Result<()>;

    fn v08_len(&mut self, ctx: u32) -> anyhow::Result<u32>;

    fn v08_ptr(&mut self, ctx: u32) -> anyhow::Result<u32>;

    fn v32_len(&mut self, ctx: u32) -> anyhow::Result<u32>;

    fn v32_ptr(&mut self, ctx: u32) -> anyhow::Result<u32>;

    fn dat_init(&mut self, ctx: u32) -> anyhow::Result<u32>;

    fn dat_read(&mut self, ctx: u32, dat: u32) -> anyhow::Result<()>;

    fn read(&mut self, ctx: u32, buf: u32) -> anyhow::Result<u32>;

    fn eval(&mut self, ctx: u32, exp: u32, max_steps: u32) -> anyhow::Result<u32>;
}
