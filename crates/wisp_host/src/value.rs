use serde::Serialize;
use std::fmt;

pub const TAG_SHIFT: u32 = 27;
pub const PAYLOAD_MASK: u32 = 0x07FF_FFFF;
pub const FIXNUM_MASK: u32 = 0x7FFF_FFFF;
pub const FIRST_POINTER_CODE: u8 = 0b10000;
pub const TAG_FIELD_LIMIT: usize = 32;
pub const TAG_COUNT: usize = 16;
pub const SYS_COUNT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tag {
    Int,
    Sys,
    Chr,
    Fop,
    Mop,
    Duo,
    Sym,
    Fun,
    Mac,
    V32,
    V08,
    Pkg,
    Ct0,
    Ct1,
    Ct2,
    Ct3,
}

impl Tag {
    pub const ALL: [Tag; TAG_COUNT] = [
        Tag::Int,
        Tag::Sys,
        Tag::Chr,
        Tag::Fop,
        Tag::Mop,
        Tag::Duo,
        Tag::Sym,
        Tag::Fun,
        Tag::Mac,
        Tag::V32,
        Tag::V08,
        Tag::Pkg,
        Tag::Ct0,
        Tag::Ct1,
        Tag::Ct2,
        Tag::Ct3,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Tag::Int => "int",
            Tag::Sys => "sys",
            Tag::Chr => "chr",
            Tag::Fop => "fop",
            Tag::Mop => "mop",
            Tag::Duo => "duo",
            Tag::Sym => "sym",
            Tag::Fun => "fun",
            Tag::Mac => "mac",
            Tag::V32 => "v32",
            Tag::V08 => "v08",
            Tag::Pkg => "pkg",
            Tag::Ct0 => "ct0",
            Tag::Ct1 => "ct1",
            Tag::Ct2 => "ct2",
            Tag::Ct3 => "ct3",
        }
    }

    pub fn from_name(name: &str) -> Option<Tag> {
        Tag::ALL.into_iter().find(|tag| tag.name() == name)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Sys {
    T,
    Nil,
    Nah,
    Zap,
    Top,
}

impl Sys {
    pub const ALL: [Sys; SYS_COUNT] = [Sys::T, Sys::Nil, Sys::Nah, Sys::Zap, Sys::Top];

    pub fn name(self) -> &'static str {
        match self {
            Sys::T => "t",
            Sys::Nil => "nil",
            Sys::Nah => "nah",
            Sys::Zap => "zap",
            Sys::Top => "top",
        }
    }
}

impl fmt::Display for Sys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A raw word exchanged with the runtime.
///
/// The top five bits are the tag field. A field below 16 marks an immediate
/// integer; any other field selects a heap table and the payload below it
/// carries the row index shifted left by one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize)]
#[serde(transparent)]
pub struct Value(u32);

impl Value {
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn fixnum(n: u32) -> Self {
        Self(n & FIXNUM_MASK)
    }

    pub const fn from_parts(code: u8, index: u32) -> Self {
        Self(((code as u32) << TAG_SHIFT) | ((index << 1) & PAYLOAD_MASK))
    }

    pub const fn tag_field(self) -> u8 {
        (self.0 >> TAG_SHIFT) as u8
    }

    pub const fn is_immediate(self) -> bool {
        self.tag_field() < FIRST_POINTER_CODE
    }

    pub fn fixnum_value(self) -> Option<u32> {
        self.is_immediate().then_some(self.0 & FIXNUM_MASK)
    }

    // The low payload bit is reserved by the runtime and ignored here.
    pub const fn index(self) -> u32 {
        (self.0 & PAYLOAD_MASK) >> 1
    }
}

pub fn index_of(value: Value) -> u32 {
    value.index()
}

impl From<u32> for Value {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl From<Value> for u32 {
    fn from(value: Value) -> Self {
        value.0
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}
