use crate::codes::Codes;
use crate::error::WispError;
use crate::memory::MemoryView;
use crate::value::{Tag, Value};
use serde::Serialize;

struct BlockCursor<'v, 'a> {
    view: &'v MemoryView<'a>,
    offset: u32,
}

impl BlockCursor<'_, '_> {
    fn next(&mut self) -> Result<u32, WispError> {
        let word = self.view.u32(self.offset)?;
        self.offset = self.offset.wrapping_add(4);
        Ok(word)
    }
}

fn read_column<T: From<u32>>(
    view: &MemoryView<'_>,
    ptr: u32,
    count: u32,
) -> Result<Vec<T>, WispError> {
    if count == 0 {
        return Ok(Vec::new());
    }
    Ok(view.words(ptr, count)?.into_iter().map(T::from).collect())
}

fn checked_index(codes: &Codes, tag: Tag, value: Value, count: u32) -> Result<usize, WispError> {
    let actual = codes.tag_of(value)?;
    if actual != tag {
        return Err(WispError::TagMismatch {
            expected: tag,
            actual,
            value,
        });
    }
    let index = value.index();
    if index >= count {
        return Err(WispError::IndexOutOfRange { tag, index, count });
    }
    Ok(index as usize)
}

// Declares one table per heap tag. Field order inside each table and table
// order here must match the runtime's metadata block exactly.
macro_rules! heap_schema {
    ($(
        $field:ident => $tag:ident, $Table:ident, $Row:ident { $($col:ident: $ty:ty),+ $(,)? }
    )+) => {
        $(
            #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
            pub struct $Table {
                pub count: u32,
                $(pub $col: Vec<$ty>,)+
            }

            #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
            pub struct $Row {
                $(pub $col: $ty,)+
            }

            impl $Table {
                pub const TAG: Tag = Tag::$tag;
                pub const COLUMNS: &'static [&'static str] = &[$(stringify!($col)),+];

                fn read(block: &mut BlockCursor<'_, '_>) -> Result<Self, WispError> {
                    let count = block.next()?;
                    $(
                        let ptr = block.next()?;
                        let $col = read_column(block.view, ptr, count)?;
                        log::trace!(
                            "{}.{}: {} rows at {:#x}",
                            Tag::$tag,
                            stringify!($col),
                            count,
                            ptr
                        );
                    )+
                    Ok(Self { count, $($col,)+ })
                }

                pub fn row_count(&self) -> u32 {
                    self.count
                }

                pub fn get(&self, index: usize) -> Option<$Row> {
                    if index >= self.count as usize {
                        return None;
                    }
                    Some($Row { $($col: *self.$col.get(index)?,)+ })
                }

                pub fn row(&self, codes: &Codes, value: Value) -> Result<$Row, WispError> {
                    let index = checked_index(codes, Self::TAG, value, self.count)?;
                    self.get(index).ok_or(WispError::IndexOutOfRange {
                        tag: Self::TAG,
                        index: value.index(),
                        count: self.count,
                    })
                }

                pub fn rows(&self) -> impl Iterator<Item = $Row> + '_ {
                    (0..self.count as usize).filter_map(move |index| self.get(index))
                }
            }

            impl $Row {
                pub fn columns(&self) -> Vec<(&'static str, u32)> {
                    vec![$((stringify!($col), u32::from(self.$col))),+]
                }
            }
        )+

        /// Every heap table of one snapshot.
        #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
        pub struct HeapTables {
            pub epoch: u64,
            $(pub $field: $Table,)+
        }

        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
        #[serde(tag = "tag", rename_all = "lowercase")]
        pub enum Row {
            $($tag($Row),)+
        }

        impl Row {
            pub fn tag(&self) -> Tag {
                match self {
                    $(Row::$tag(_) => Tag::$tag,)+
                }
            }

            pub fn columns(&self) -> Vec<(&'static str, u32)> {
                match self {
                    $(Row::$tag(row) => row.columns(),)+
                }
            }
        }

        impl HeapTables {
            pub const SCHEMA: &'static [(Tag, &'static [&'static str])] =
                &[$((Tag::$tag, $Table::COLUMNS)),+];

            fn read_block(block: &mut BlockCursor<'_, '_>, epoch: u64) -> Result<Self, WispError> {
                $(let $field = $Table::read(block)?;)+
                Ok(Self { epoch, $($field,)+ })
            }

            pub fn row(&self, codes: &Codes, tag: Tag, value: Value) -> Result<Row, WispError> {
                match tag {
                    $(Tag::$tag => self.$field.row(codes, value).map(Row::$tag),)+
                    other => Err(WispError::NoTable(other)),
                }
            }

            pub fn row_count(&self, tag: Tag) -> Option<u32> {
                match tag {
                    $(Tag::$tag => Some(self.$field.count),)+
                    _ => None,
                }
            }
        }
    };
}

heap_schema! {
    duo => Duo, DuoTable, DuoRow { car: Value, cdr: Value }
    sym => Sym, SymTable, SymRow { str: Value, pkg: Value, val: Value, fun: Value }
    fun => Fun, FunTable, FunRow { env: Value, par: Value, exp: Value }
    mac => Mac, MacTable, MacRow { env: Value, par: Value, exp: Value }
    v08 => V08, V08Table, V08Row { idx: u32, len: u32 }
    v32 => V32, V32Table, V32Row { idx: u32, len: u32 }
    pkg => Pkg, PkgTable, PkgRow { nam: Value, sym: Value }
    ct0 => Ct0, Ct0Table, Ct0Row { env: Value, fun: Value, arg: Value, exp: Value, hop: Value }
    ct1 => Ct1, Ct1Table, Ct1Row { env: Value, yay: Value, nay: Value }
    ct2 => Ct2, Ct2Table, Ct2Row { env: Value, exp: Value, hop: Value }
    ct3 => Ct3, Ct3Table, Ct3Row { env: Value, exp: Value, dew: Value, arg: Value, hop: Value }
}

impl HeapTables {
    pub fn table_count() -> usize {
        Self::SCHEMA.len()
    }

    pub fn column_count() -> usize {
        Self::SCHEMA.iter().map(|(_, columns)| columns.len()).sum()
    }

    /// Size in bytes of the metadata block the runtime fills for a snapshot.
    pub fn block_size() -> usize {
        4 * (Self::table_count() + Self::column_count())
    }

    pub fn columns_of(tag: Tag) -> Option<&'static [&'static str]> {
        Self::SCHEMA
            .iter()
            .find(|(table, _)| *table == tag)
            .map(|(_, columns)| *columns)
    }

    pub fn total_rows(&self) -> u64 {
        Self::SCHEMA
            .iter()
            .filter_map(|(tag, _)| self.row_count(*tag))
            .map(u64::from)
            .sum()
    }
}

/// Decodes the metadata block at `block` and copies every column it points to.
pub(crate) fn read_tables(
    view: &MemoryView<'_>,
    block: u32,
    epoch: u64,
) -> Result<HeapTables, WispError> {
    let mut cursor = BlockCursor {
        view,
        offset: block,
    };
    let tables = HeapTables::read_block(&mut cursor, epoch)?;
    log::debug!(
        "snapshot {epoch}: {} rows across {} tables",
        tables.total_rows(),
        HeapTables::table_count()
    );
    Ok(tables)
}
