use crate::codes::Codes;
use crate::error::WispError;
use crate::heap::{HeapTables, Row};
use crate::value::{Sys, Tag, Value};
use crate::vector::Arenas;

const MAX_DEPTH: usize = 64;
const MAX_LIST: usize = 10_000;

/// A coherent view of one runtime context: codes, heap tables and arenas
/// taken together, with no runtime call in between.
#[derive(Debug, Clone)]
pub struct Inspector {
    codes: Codes,
    tables: HeapTables,
    arenas: Arenas,
}

impl Inspector {
    pub fn new(codes: Codes, tables: HeapTables, arenas: Arenas) -> Self {
        Self {
            codes,
            tables,
            arenas,
        }
    }

    pub fn codes(&self) -> &Codes {
        &self.codes
    }

    pub fn tables(&self) -> &HeapTables {
        &self.tables
    }

    pub fn arenas(&self) -> &Arenas {
        &self.arenas
    }

    pub fn epoch(&self) -> u64 {
        self.tables.epoch
    }

    pub fn tag_of(&self, value: Value) -> Result<Tag, WispError> {
        self.codes.tag_of(value)
    }

    pub fn row(&self, tag: Tag, value: Value) -> Result<Row, WispError> {
        self.tables.row(&self.codes, tag, value)
    }

    /// Looks up `value` in whatever table its own tag selects.
    pub fn row_of(&self, value: Value) -> Result<Row, WispError> {
        let tag = self.tag_of(value)?;
        self.row(tag, value)
    }

    pub fn string_of(&self, value: Value) -> Result<&str, WispError> {
        self.arenas.string_of(&self.codes, &self.tables, value)
    }

    pub fn bytes_of(&self, value: Value) -> Result<&[u8], WispError> {
        self.arenas.bytes_of(&self.codes, &self.tables, value)
    }

    pub fn words_of(&self, value: Value) -> Result<Vec<Value>, WispError> {
        self.arenas.words_of(&self.codes, &self.tables, value)
    }

    pub fn symbol_name(&self, value: Value) -> Result<&str, WispError> {
        let row = self.tables.sym.row(&self.codes, value)?;
        self.string_of(row.str)
    }

    /// Elements of a list and its final cdr (nil for proper lists).
    pub fn list(&self, value: Value) -> Result<(Vec<Value>, Value), WispError> {
        let mut items = Vec::new();
        let mut cursor = value;
        while self.tag_of(cursor)? == Tag::Duo && items.len() < MAX_LIST {
            let row = self.tables.duo.row(&self.codes, cursor)?;
            items.push(row.car);
            cursor = row.cdr;
        }
        Ok((items, cursor))
    }

    pub fn render(&self, value: Value) -> Result<String, WispError> {
        let mut out = String::new();
        self.render_into(value, 0, &mut out)?;
        Ok(out)
    }

    fn render_into(&self, value: Value, depth: usize, out: &mut String) -> Result<(), WispError> {
        if depth > MAX_DEPTH {
            out.push_str("...");
            return Ok(());
        }
        let tag = self.tag_of(value)?;
        match tag {
            Tag::Int => {
                let n = value.fixnum_value().unwrap_or_default();
                out.push_str(&n.to_string());
            }
            Tag::Sys => match self.codes.sys_name(value) {
                Some(sys) => out.push_str(sys.name()),
                None => out.push_str(&format!("#<sys {}>", value.index())),
            },
            Tag::V08 => out.push_str(&format!("{:?}", self.string_of(value)?)),
            Tag::Sym => out.push_str(self.symbol_name(value)?),
            Tag::Duo => {
                let (items, tail) = self.list(value)?;
                out.push('(');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(' ');
                    }
                    self.render_into(*item, depth + 1, out)?;
                }
                if self.tag_of(tail)? == Tag::Duo {
                    out.push_str(" ...");
                } else if tail != self.codes.sys(Sys::Nil) {
                    out.push_str(" . ");
                    self.render_into(tail, depth + 1, out)?;
                }
                out.push(')');
            }
            Tag::V32 => {
                out.push('[');
                for (i, item) in self.words_of(value)?.into_iter().enumerate() {
                    if i > 0 {
                        out.push(' ');
                    }
                    self.render_into(item, depth + 1, out)?;
                }
                out.push(']');
            }
            Tag::Pkg => {
                let row = self.tables.pkg.row(&self.codes, value)?;
                match self.string_of(row.nam) {
                    Ok(name) => out.push_str(&format!("#<pkg {name}>")),
                    Err(_) => out.push_str(&format!("#<pkg {}>", value.index())),
                }
            }
            other => out.push_str(&format!("#<{other} {}>", value.index())),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeWisp;
    use crate::session::Session;

    fn render_source(source: &str) -> String {
        let mut session = Session::open(FakeWisp::new()).unwrap();
        let value = session.read_text(source).unwrap();
        session.inspect().unwrap().render(value).unwrap()
    }

    #[test]
    fn renders_atoms() {
        assert_eq!(render_source("42"), "42");
        assert_eq!(render_source("\"hi there\""), "\"hi there\"");
        assert_eq!(render_source("foo"), "foo");
        assert_eq!(render_source("()"), "nil");
    }

    #[test]
    fn renders_nested_lists() {
        assert_eq!(render_source("(+ 1 (f \"x\") ())"), "(+ 1 (f \"x\") nil)");
    }

    #[test]
    fn renders_sys_singletons_by_name() {
        let mut session = Session::open(FakeWisp::new()).unwrap();
        let inspector = session.inspect().unwrap();
        for sys in Sys::ALL {
            let value = inspector.codes().sys(sys);
            assert_eq!(inspector.render(value).unwrap(), sys.name());
        }
    }

    #[test]
    fn renders_word_vectors() {
        let mut fake = FakeWisp::new();
        let value = fake.push_words(&[1, 2, 3]);
        let mut session = Session::open(fake).unwrap();
        let inspector = session.inspect().unwrap();
        assert_eq!(inspector.render(value).unwrap(), "[1 2 3]");
    }

    #[test]
    fn opaque_kinds_render_with_their_index() {
        let mut session = Session::open(FakeWisp::new()).unwrap();
        let inspector = session.inspect().unwrap();
        let value = inspector.codes().pointer(Tag::Fop, 4);
        assert_eq!(inspector.render(value).unwrap(), "#<fop 4>");
    }

    #[test]
    fn list_returns_items_and_tail() {
        let mut session = Session::open(FakeWisp::new()).unwrap();
        let value = session.read_text("(1 2)").unwrap();
        let inspector = session.inspect().unwrap();
        let (items, tail) = inspector.list(value).unwrap();
        assert_eq!(items, vec![Value::fixnum(1), Value::fixnum(2)]);
        assert_eq!(tail, inspector.codes().sys(Sys::Nil));
        assert!(matches!(inspector.row_of(value).unwrap(), Row::Duo(_)));
    }
}
