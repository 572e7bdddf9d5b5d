//! Byte cursor over a code segment.

use crate::error::FatalError;

#[derive(Debug, Clone)]
pub(crate) struct Cursor<'a> {
    code: &'a [u8],
    position: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(code: &'a [u8], position: usize) -> Self {
        Self { code, position }
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.code.len()
    }

    /// Next byte, or [`FatalError::Truncated`] at the end of the code.
    #[inline]
    pub fn byte(&mut self) -> Result<u8, FatalError> {
        let byte = *self.code.get(self.position).ok_or(FatalError::Truncated {
            position: self.position,
        })?;
        self.position += 1;
        Ok(byte)
    }

    /// Byte at the cursor without consuming it.
    #[inline]
    pub fn peek(&self) -> Result<u8, FatalError> {
        self.code
            .get(self.position)
            .copied()
            .ok_or(FatalError::Truncated {
                position: self.position,
            })
    }

    /// Next `N` bytes.
    pub fn array<const N: usize>(&mut self) -> Result<[u8; N], FatalError> {
        let bytes = self
            .code
            .get(self.position..self.position + N)
            .ok_or(FatalError::Truncated {
                position: self.position,
            })?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        self.position += N;
        Ok(out)
    }
}
