use crate::codes::Codes;
use crate::error::{DecodeError, WispError};
use crate::heap::HeapTables;
use crate::memory::MemoryView;
use crate::value::{Tag, Value};

/// Copies of the two vector backing stores.
///
/// Byte vectors and word vectors are `(idx, len)` descriptors into these
/// arenas; the arenas themselves are read straight from the runtime without
/// going through the metadata block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Arenas {
    pub v08: Vec<u8>,
    pub v32: Vec<u32>,
}

impl Arenas {
    pub(crate) fn read(
        view: &MemoryView<'_>,
        (v08_ptr, v08_len): (u32, u32),
        (v32_ptr, v32_len): (u32, u32),
    ) -> Result<Self, WispError> {
        let v08 = view.bytes(v08_ptr, v08_len)?.to_vec();
        let v32 = view.words(v32_ptr, v32_len)?;
        log::debug!("arenas: {} bytes, {} words", v08.len(), v32.len());
        Ok(Self { v08, v32 })
    }

    pub fn bytes_of(
        &self,
        codes: &Codes,
        tables: &HeapTables,
        value: Value,
    ) -> Result<&[u8], WispError> {
        let tag = codes.tag_of(value)?;
        if tag != Tag::V08 {
            return Err(DecodeError::NotBytes(tag).into());
        }
        let row = tables.v08.row(codes, value)?;
        Ok(slice(&self.v08, row.idx, row.len)?)
    }

    pub fn string_of(
        &self,
        codes: &Codes,
        tables: &HeapTables,
        value: Value,
    ) -> Result<&str, WispError> {
        let bytes = self.bytes_of(codes, tables, value)?;
        Ok(std::str::from_utf8(bytes).map_err(DecodeError::from)?)
    }

    pub fn words_of(
        &self,
        codes: &Codes,
        tables: &HeapTables,
        value: Value,
    ) -> Result<Vec<Value>, WispError> {
        let tag = codes.tag_of(value)?;
        if tag != Tag::V32 {
            return Err(DecodeError::NotWords(tag).into());
        }
        let row = tables.v32.row(codes, value)?;
        let words = slice(&self.v32, row.idx, row.len)?;
        Ok(words.iter().copied().map(Value::from_raw).collect())
    }
}

fn slice<T>(arena: &[T], idx: u32, len: u32) -> Result<&[T], DecodeError> {
    let start = idx as usize;
    start
        .checked_add(len as usize)
        .and_then(|end| arena.get(start..end))
        .ok_or(DecodeError::ArenaRange {
            idx,
            len,
            size: arena.len(),
        })
}
