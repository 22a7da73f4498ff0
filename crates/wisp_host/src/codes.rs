use crate::api::{sys_global, tag_global, WispApi};
use crate::error::{runtime_error, WispError};
use crate::memory::MemoryView;
use crate::value::{
    Sys, Tag, Value, FIRST_POINTER_CODE, SYS_COUNT, TAG_COUNT, TAG_FIELD_LIMIT,
};

/// Tag and sys codes of one runtime build.
///
/// Built once when a runtime is attached and shared read-only by every
/// decoder working against that runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Codes {
    tags: [u8; TAG_COUNT],
    sys: [Value; SYS_COUNT],
    lookup: [Option<Tag>; TAG_FIELD_LIMIT],
}

impl Codes {
    pub fn new(
        tags: [u8; TAG_COUNT],
        sys: [Value; SYS_COUNT],
    ) -> Result<Self, WispError> {
        let mut lookup = [None; TAG_FIELD_LIMIT];
        for tag in Tag::ALL {
            if tag == Tag::Int {
                continue;
            }
            let code = tags[tag as usize];
            if code < FIRST_POINTER_CODE || code as usize >= TAG_FIELD_LIMIT {
                return Err(WispError::InvalidTagTable(format!(
                    "code {code:#04x} for {tag} is outside the pointer range"
                )));
            }
            if let Some(other) = lookup[code as usize] {
                return Err(WispError::InvalidTagTable(format!(
                    "{tag} and {other} share code {code:#04x}"
                )));
            }
            lookup[code as usize] = Some(tag);
        }
        for (i, a) in Sys::ALL.iter().enumerate() {
            for b in &Sys::ALL[i + 1..] {
                if sys[*a as usize] == sys[*b as usize] {
                    return Err(WispError::InvalidTagTable(format!(
                        "{a} and {b} share the value {}",
                        sys[*a as usize]
                    )));
                }
            }
        }
        Ok(Self { tags, sys, lookup })
    }

    /// Reads the tag and sys globals of a freshly instantiated runtime.
    pub fn load<R: WispApi + ?Sized>(runtime: &mut R) -> Result<Self, WispError> {
        let mut tag_addrs = [0u32; TAG_COUNT];
        for tag in Tag::ALL {
            tag_addrs[tag as usize] = runtime
                .global(&tag_global(tag))
                .map_err(runtime_error("tag global"))?;
        }
        let mut sys_addrs = [0u32; SYS_COUNT];
        for sys in Sys::ALL {
            sys_addrs[sys as usize] = runtime
                .global(&sys_global(sys))
                .map_err(runtime_error("sys global"))?;
        }

        let view = MemoryView::new(runtime.memory());
        let mut tags = [0u8; TAG_COUNT];
        for (code, addr) in tags.iter_mut().zip(tag_addrs) {
            *code = view.u8(addr)?;
        }
        let mut sys = [Value::default(); SYS_COUNT];
        for (value, addr) in sys.iter_mut().zip(sys_addrs) {
            *value = Value::from_raw(view.u32(addr)?);
        }
        let codes = Self::new(tags, sys)?;
        log::debug!("loaded tag codes {:?}", codes.tags);
        Ok(codes)
    }

    pub fn code(&self, tag: Tag) -> u8 {
        self.tags[tag as usize]
    }

    pub fn sys(&self, sys: Sys) -> Value {
        self.sys[sys as usize]
    }

    pub fn sys_name(&self, value: Value) -> Option<Sys> {
        Sys::ALL.into_iter().find(|sys| self.sys(*sys) == value)
    }

    pub fn is(&self, value: Value, sys: Sys) -> bool {
        self.sys(sys) == value
    }

    pub fn tag_of(&self, value: Value) -> Result<Tag, WispError> {
        let field = value.tag_field();
        if field < FIRST_POINTER_CODE {
            return Ok(Tag::Int);
        }
        match self.lookup[field as usize] {
            Some(tag) => Ok(tag),
            None => Err(WispError::UnknownTag { value, field }),
        }
    }

    /// Builds a reference to row `index` of `tag`'s table.
    pub fn pointer(&self, tag: Tag, index: u32) -> Value {
        Value::from_parts(self.code(tag), index)
    }

    pub fn tag_entries(&self) -> Vec<(Tag, u8)> {
        Tag::ALL.into_iter().map(|tag| (tag, self.code(tag))).collect()
    }

    pub fn sys_entries(&self) -> Vec<(Sys, Value)> {
        Sys::ALL.into_iter().map(|sys| (sys, self.sys(sys))).collect()
    }
}

#[cfg(test)]
pub(crate) fn sample_codes() -> Codes {
    let mut tags = [0u8; TAG_COUNT];
    for tag in Tag::ALL.into_iter().skip(1) {
        tags[tag as usize] = FIRST_POINTER_CODE + tag as u8 - 1;
    }
    let sys_code = tags[Tag::Sys as usize];
    let sys = Sys::ALL.map(|sys| Value::from_parts(sys_code, sys as u32));
    match Codes::new(tags, sys) {
        Ok(codes) => codes,
        Err(err) => panic!("sample codes are valid: {err}"),
    }
}
