use crate::error::WispError;

/// Read cursor over the runtime's linear memory.
///
/// Borrowed fresh from the runtime for every use, so its size always
/// reflects the memory as it is right now.
#[derive(Debug, Clone, Copy)]
pub struct MemoryView<'a> {
    data: &'a [u8],
}

impl<'a> MemoryView<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn bytes(&self, offset: u32, len: u32) -> Result<&'a [u8], WispError> {
        let start = offset as usize;
        start
            .checked_add(len as usize)
            .and_then(|end| self.data.get(start..end))
            .ok_or(WispError::OutOfBounds {
                offset,
                len,
                size: self.data.len(),
            })
    }

    pub fn u8(&self, offset: u32) -> Result<u8, WispError> {
        Ok(self.bytes(offset, 1)?[0])
    }

    pub fn u32(&self, offset: u32) -> Result<u32, WispError> {
        let bytes = self.bytes(offset, 4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn words(&self, offset: u32, count: u32) -> Result<Vec<u32>, WispError> {
        let len = count.checked_mul(4).ok_or(WispError::OutOfBounds {
            offset,
            len: u32::MAX,
            size: self.data.len(),
        })?;
        let bytes = self.bytes(offset, len)?;
        Ok(bytes
            .chunks_exact(4)
            .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect())
    }
}
