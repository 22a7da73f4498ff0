//! Host-side introspection for a wisp runtime compiled to wasm.

pub mod api;
mod codes;
mod config;
mod error;
mod heap;
mod inspect;
mod memory;
mod session;
mod value;
mod vector;
mod wasm;

#[cfg(test)]
mod fake;

pub use api::WispApi;
pub use codes::Codes;
pub use config::{SessionConfig, DEFAULT_STEP_BUDGET, STEPS_ENV};
pub use error::{DecodeError, WispError};
pub use heap::{
    Ct0Row, Ct0Table, Ct1Row, Ct1Table, Ct2Row, Ct2Table, Ct3Row, Ct3Table, DuoRow, DuoTable,
    FunRow, FunTable, HeapTables, MacRow, MacTable, PkgRow, PkgTable, Row, SymRow, SymTable,
    V08Row, V08Table, V32Row, V32Table,
};
pub use inspect::Inspector;
pub use memory::MemoryView;
pub use session::Session;
pub use value::{index_of, Sys, Tag, Value};
pub use vector::Arenas;
pub use wasm::WasmWisp;

pub const TOOL_NAME: &str = "wisp";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
