// In-process stand-in for a wisp module, used by unit tests. It keeps its
// heap as plain Rust vectors and lays the tables out in linear memory only
// when asked for a snapshot, the way the real runtime does.

use crate::api::{self, sys_global, tag_global, WispApi};
use crate::codes::{sample_codes, Codes};
use crate::heap::HeapTables;
use crate::value::{Sys, Tag, Value};
use anyhow::{anyhow, bail, ensure};
use std::collections::{BTreeMap, HashMap};
use std::iter::Peekable;
use std::str::Chars;

const CTX: u32 = 0x7;
const TAG_GLOBALS: u32 = 0x40;
const SYS_GLOBALS: u32 = 0x80;
const HEAP_START: u32 = 0x400;

pub(crate) struct FakeWisp {
    memory: Vec<u8>,
    globals: HashMap<String, u32>,
    codes: Codes,
    next: u32,
    live: BTreeMap<u32, u32>,
    ctx: Option<u32>,
    duo: Vec<[u32; 2]>,
    sym: Vec<[u32; 4]>,
    v08: Vec<[u32; 2]>,
    v32: Vec<[u32; 2]>,
    v08_arena: Vec<u8>,
    v32_arena: Vec<u32>,
    symbols: HashMap<String, Value>,
    calls: Vec<&'static str>,
    last_budget: Option<u32>,
    last_source: Option<Vec<u8>>,
    trap_on_read: bool,
}

impl FakeWisp {
    pub(crate) fn new() -> Self {
        let codes = sample_codes();
        let mut memory = vec![0u8; HEAP_START as usize];
        let mut globals = HashMap::new();
        for tag in Tag::ALL {
            let addr = TAG_GLOBALS + tag as u32;
            memory[addr as usize] = codes.code(tag);
            globals.insert(tag_global(tag), addr);
        }
        for sys in Sys::ALL {
            let addr = SYS_GLOBALS + 4 * sys as u32;
            let start = addr as usize;
            memory[start..start + 4].copy_from_slice(&codes.sys(sys).raw().to_le_bytes());
            globals.insert(sys_global(sys), addr);
        }
        Self {
            memory,
            globals,
            codes,
            next: HEAP_START,
            live: BTreeMap::new(),
            ctx: None,
            duo: Vec::new(),
            sym: Vec::new(),
            v08: Vec::new(),
            v32: Vec::new(),
            v08_arena: Vec::new(),
            v32_arena: Vec::new(),
            symbols: HashMap::new(),
            calls: Vec::new(),
            last_budget: None,
            last_source: None,
            trap_on_read: false,
        }
    }

    pub(crate) fn calls(&self) -> &[&'static str] {
        &self.calls
    }

    pub(crate) fn live_allocations(&self) -> usize {
        self.live.len()
    }

    pub(crate) fn last_budget(&self) -> Option<u32> {
        self.last_budget
    }

    pub(crate) fn last_source(&self) -> Option<&[u8]> {
        self.last_source.as_deref()
    }

    pub(crate) fn trap_on_read(&mut self) {
        self.trap_on_read = true;
    }

    pub(crate) fn push_bytes(&mut self, bytes: &[u8]) -> Value {
        let idx = self.v08_arena.len() as u32;
        self.v08_arena.extend_from_slice(bytes);
        self.v08.push([idx, bytes.len() as u32]);
        self.codes.pointer(Tag::V08, self.v08.len() as u32 - 1)
    }

    pub(crate) fn push_words(&mut self, words: &[u32]) -> Value {
        let idx = self.v32_arena.len() as u32;
        self.v32_arena.extend_from_slice(words);
        self.v32.push([idx, words.len() as u32]);
        self.codes.pointer(Tag::V32, self.v32.len() as u32 - 1)
    }

    fn intern(&mut self, name: &str) -> Value {
        if let Some(value) = self.symbols.get(name) {
            return *value;
        }
        let str = self.push_bytes(name.as_bytes());
        let nil = self.codes.sys(Sys::Nil).raw();
        let top = self.codes.sys(Sys::Top).raw();
        self.sym.push([str.raw(), nil, top, top]);
        let value = self.codes.pointer(Tag::Sym, self.sym.len() as u32 - 1);
        self.symbols.insert(name.to_string(), value);
        value
    }

    fn cons(&mut self, car: Value, cdr: Value) -> Value {
        self.duo.push([car.raw(), cdr.raw()]);
        self.codes.pointer(Tag::Duo, self.duo.len() as u32 - 1)
    }

    fn list(&mut self, items: Vec<Value>) -> Value {
        let mut tail = self.codes.sys(Sys::Nil);
        for item in items.into_iter().rev() {
            tail = self.cons(item, tail);
        }
        tail
    }

    fn parse(&mut self, text: &str) -> Option<Value> {
        let mut chars = text.chars().peekable();
        let value = self.parse_form(&mut chars)?;
        skip_whitespace(&mut chars);
        if chars.peek().is_some() {
            return None;
        }
        Some(value)
    }

    fn parse_form(&mut self, chars: &mut Peekable<Chars<'_>>) -> Option<Value> {
        skip_whitespace(chars);
        match *chars.peek()? {
            '(' => {
                chars.next();
                let mut items = Vec::new();
                loop {
                    skip_whitespace(chars);
                    if *chars.peek()? == ')' {
                        chars.next();
                        break;
                    }
                    items.push(self.parse_form(chars)?);
                }
                Some(self.list(items))
            }
            ')' => None,
            '"' => {
                chars.next();
                let mut text = String::new();
                loop {
                    match chars.next()? {
                        '"' => break,
                        ch => text.push(ch),
                    }
                }
                Some(self.push_bytes(text.as_bytes()))
            }
            _ => {
                let mut atom = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_whitespace() || matches!(ch, '(' | ')' | '"') {
                        break;
                    }
                    atom.push(ch);
                    chars.next();
                }
                match atom.parse::<u32>() {
                    Ok(n) => Some(Value::fixnum(n)),
                    Err(_) => Some(self.intern(&atom)),
                }
            }
        }
    }

    fn symbol_name(&self, value: Value) -> Option<&[u8]> {
        let [str, ..] = *self.sym.get(value.index() as usize)?;
        let [idx, len] = *self.v08.get(Value::from_raw(str).index() as usize)?;
        self.v08_arena.get(idx as usize..(idx + len) as usize)
    }

    fn eval_value(&self, value: Value, steps: &mut u32) -> Option<Value> {
        if *steps == 0 {
            return None;
        }
        *steps -= 1;
        match self.codes.tag_of(value).ok()? {
            Tag::Int | Tag::Sys | Tag::V08 | Tag::V32 => Some(value),
            Tag::Duo => {
                let [head, mut rest] = *self.duo.get(value.index() as usize)?;
                let head = Value::from_raw(head);
                if self.codes.tag_of(head).ok()? != Tag::Sym || self.symbol_name(head)? != b"+" {
                    return None;
                }
                let mut sum = 0u32;
                while self.codes.tag_of(Value::from_raw(rest)).ok()? == Tag::Duo {
                    let [arg, next] = *self.duo.get(Value::from_raw(rest).index() as usize)?;
                    let value = self.eval_value(Value::from_raw(arg), steps)?;
                    sum = sum.wrapping_add(value.fixnum_value()?);
                    rest = next;
                }
                Some(Value::fixnum(sum))
            }
            _ => None,
        }
    }

    fn reserve(&mut self, size: u32) -> u32 {
        let ptr = self.next;
        self.next = (self.next + size.max(1) + 3) & !3;
        if self.memory.len() < self.next as usize {
            self.memory.resize(self.next as usize, 0);
        }
        ptr
    }

    fn put_words(&mut self, ptr: u32, words: &[u32]) {
        for (i, word) in words.iter().enumerate() {
            let start = ptr as usize + 4 * i;
            self.memory[start..start + 4].copy_from_slice(&word.to_le_bytes());
        }
    }

    fn check(&self, ctx: u32) -> anyhow::Result<()> {
        ensure!(self.ctx == Some(ctx), "unknown context {ctx:#x}");
        Ok(())
    }
}

fn skip_whitespace(chars: &mut Peekable<Chars<'_>>) {
    while chars.peek().is_some_and(|ch| ch.is_whitespace()) {
        chars.next();
    }
}

fn columns<const N: usize>(rows: &[[u32; N]]) -> Vec<Vec<u32>> {
    (0..N)
        .map(|col| rows.iter().map(|row| row[col]).collect())
        .collect()
}

impl WispApi for FakeWisp {
    fn memory(&self) -> &[u8] {
        &self.memory
    }

    fn write_memory(&mut self, offset: u32, bytes: &[u8]) -> anyhow::Result<()> {
        let start = offset as usize;
        let target = self
            .memory
            .get_mut(start..start + bytes.len())
            .ok_or_else(|| anyhow!("write of {} bytes at {offset:#x} out of bounds", bytes.len()))?;
        target.copy_from_slice(bytes);
        Ok(())
    }

    fn global(&mut self, name: &str) -> anyhow::Result<u32> {
        self.globals
            .get(name)
            .copied()
            .ok_or_else(|| anyhow!("no global named {name}"))
    }

    fn ctx_init(&mut self) -> anyhow::Result<u32> {
        self.calls.push(api::CTX_INIT);
        if self.ctx.is_some() {
            bail!("context already created");
        }
        self.ctx = Some(CTX);
        Ok(CTX)
    }

    fn alloc(&mut self, ctx: u32, size: u32) -> anyhow::Result<u32> {
        self.calls.push(api::ALLOC);
        self.check(ctx)?;
        let ptr = self.reserve(size);
        self.live.insert(ptr, size);
        Ok(ptr)
    }

    fn free(&mut self, ctx: u32, ptr: u32) -> anyhow::Result<()> {
        self.calls.push(api::FREE);
        self.check(ctx)?;
        self.live
            .remove(&ptr)
            .ok_or_else(|| anyhow!("free of unknown pointer {ptr:#x}"))?;
        Ok(())
    }

    fn destroy(&mut self, ctx: u32, _value: u32) -> anyhow::Result<()> {
        self.calls.push(api::DESTROY);
        self.check(ctx)
    }

    fn v08_len(&mut self, ctx: u32) -> anyhow::Result<u32> {
        self.check(ctx)?;
        Ok(self.v08_arena.len() as u32)
    }

    fn v08_ptr(&mut self, ctx: u32) -> anyhow::Result<u32> {
        self.check(ctx)?;
        let ptr = self.reserve(self.v08_arena.len() as u32);
        let start = ptr as usize;
        self.memory[start..start + self.v08_arena.len()].copy_from_slice(&self.v08_arena);
        Ok(ptr)
    }

    fn v32_len(&mut self, ctx: u32) -> anyhow::Result<u32> {
        self.check(ctx)?;
        Ok(self.v32_arena.len() as u32)
    }

    fn v32_ptr(&mut self, ctx: u32) -> anyhow::Result<u32> {
        self.check(ctx)?;
        let ptr = self.reserve(4 * self.v32_arena.len() as u32);
        let words = self.v32_arena.clone();
        self.put_words(ptr, &words);
        Ok(ptr)
    }

    fn dat_init(&mut self, ctx: u32) -> anyhow::Result<u32> {
        self.calls.push(api::DAT_INIT);
        self.check(ctx)?;
        Ok(self.reserve(HeapTables::block_size() as u32))
    }

    fn dat_read(&mut self, ctx: u32, dat: u32) -> anyhow::Result<()> {
        self.calls.push(api::DAT_READ);
        self.check(ctx)?;
        let mut block = Vec::new();
        for (tag, names) in HeapTables::SCHEMA {
            let (count, data) = match tag {
                Tag::Duo => (self.duo.len(), columns(&self.duo)),
                Tag::Sym => (self.sym.len(), columns(&self.sym)),
                Tag::V08 => (self.v08.len(), columns(&self.v08)),
                Tag::V32 => (self.v32.len(), columns(&self.v32)),
                _ => (0, vec![Vec::new(); names.len()]),
            };
            block.push(count as u32);
            for column in data {
                let ptr = self.reserve(4 * column.len() as u32);
                self.put_words(ptr, &column);
                block.push(ptr);
            }
        }
        self.put_words(dat, &block);
        Ok(())
    }

    fn read(&mut self, ctx: u32, buf: u32) -> anyhow::Result<u32> {
        self.calls.push(api::READ);
        self.check(ctx)?;
        if self.trap_on_read {
            bail!("wasm trap: wasm `unreachable` instruction executed");
        }
        let start = buf as usize;
        let len = self.memory[start..]
            .iter()
            .position(|byte| *byte == 0)
            .ok_or_else(|| anyhow!("source buffer is not terminated"))?;
        let source = self.memory[start..start + len + 1].to_vec();
        let nah = self.codes.sys(Sys::Nah);
        let value = match std::str::from_utf8(&source[..len]) {
            Ok(text) => self.parse(text).unwrap_or(nah),
            Err(_) => nah,
        };
        self.last_source = Some(source);
        Ok(value.raw())
    }

    fn eval(&mut self, ctx: u32, exp: u32, max_steps: u32) -> anyhow::Result<u32> {
        self.calls.push(api::EVAL);
        self.check(ctx)?;
        self.last_budget = Some(max_steps);
        let mut steps = max_steps;
        let result = self
            .eval_value(Value::from_raw(exp), &mut steps)
            .unwrap_or(self.codes.sys(Sys::Nah));
        Ok(result.raw())
    }
}
