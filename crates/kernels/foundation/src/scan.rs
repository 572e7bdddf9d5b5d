//! Flat token scan over a code segment.
//!
//! Walks tokens in stream order, stepping over inline immediates (constants,
//! jump magnitudes, packed count bytes, function ids). It does not check the
//! grammar; the interpreter and disassembler do that.

use crate::error::FoundationError;
use crate::opcode::{Op, Token};

/// One token and the immediate bytes that follow it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scanned<'a> {
    pub position: usize,
    pub token: Token,
    pub immediate: &'a [u8],
}

/// Iterator over the tokens of a code segment.
#[derive(Debug, Clone)]
pub struct Scanner<'a> {
    code: &'a [u8],
    position: usize,
}

/// Scan `code` from the start.
pub fn scan(code: &[u8]) -> Scanner<'_> {
    Scanner { code, position: 0 }
}

impl<'a> Iterator for Scanner<'a> {
    type Item = Result<Scanned<'a>, FoundationError>;

    fn next(&mut self) -> Option<Self::Item> {
        let byte = *self.code.get(self.position)?;
        let position = self.position;
        let token = match Token::decode(byte) {
            Ok(token) => token,
            Err(e) => {
                self.position = self.code.len();
                return Some(Err(e));
            }
        };
        let width = match token {
            Token::Op(op) => op.encoding().immediate_bytes(),
            Token::Variable(_) => 0,
        };
        let start = position + 1;
        let Some(immediate) = self.code.get(start..start + width) else {
            self.position = self.code.len();
            return Some(Err(FoundationError::Truncated { position }));
        };
        self.position = start + width;
        Some(Ok(Scanned {
            position,
            token,
            immediate,
        }))
    }
}

/// Whether the code contains a `CallExternal`.
pub fn calls_external(code: &[u8]) -> bool {
    scan(code)
        .filter_map(Result::ok)
        .any(|scanned| scanned.token == Token::Op(Op::CallExternal))
}
