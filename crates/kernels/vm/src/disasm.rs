//! Bytecode listings.
//!
//! Decodes a code segment token by token, resolving inline immediates into
//! constants, absolute jump targets, packed counts and function ids.

use std::fmt;

use vexel_foundation::{
    decode44, decode62, scan, Encoding, FoundationError, Op, Packed44, Packed62, Token, Value,
};
use vexel_function_registry::{FunctionId, FunctionRegistry};

/// Decoded immediate of one token.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Immediate {
    Constant(Value),
    /// Absolute code offset; `None` when the jump leaves the segment.
    Target(Option<usize>),
    Count62(Packed62),
    Count44(Packed44),
    Call { id: FunctionId, argc: u8 },
}

/// One decoded token.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Instruction {
    pub position: usize,
    pub token: Token,
    pub immediate: Option<Immediate>,
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}  ", self.position)?;
        match self.token {
            Token::Variable(element) => write!(f, "v{element}")?,
            Token::Op(op) => write!(f, "{op}")?,
        }
        match self.immediate {
            None => Ok(()),
            Some(Immediate::Constant(value)) => write!(f, " {value}"),
            Some(Immediate::Target(Some(target))) => write!(f, " -> {target:04x}"),
            Some(Immediate::Target(None)) => f.write_str(" -> ????"),
            Some(Immediate::Count62(packed)) => {
                write!(f, " n={} size={}", packed.count, packed.size.get())
            }
            Some(Immediate::Count44(packed)) => write!(f, " n={} {}", packed.count, packed.shape),
            Some(Immediate::Call { id, argc }) => write!(f, " #{} argc={argc}", id.0),
        }
    }
}

fn immediate(op: Op, position: usize, bytes: &[u8]) -> Result<Option<Immediate>, FoundationError> {
    let truncated = FoundationError::Truncated { position };
    let word = |bytes: &[u8]| -> Result<[u8; 4], FoundationError> {
        bytes.try_into().map_err(|_| FoundationError::Truncated { position })
    };
    let double = |bytes: &[u8]| -> Result<[u8; 8], FoundationError> {
        bytes.try_into().map_err(|_| FoundationError::Truncated { position })
    };
    Ok(Some(match op {
        Op::ConstF32 => Immediate::Constant(Value::numeric(f32::from_le_bytes(word(bytes)?))),
        Op::ConstI32 => Immediate::Constant(Value::id(i32::from_le_bytes(word(bytes)?))),
        Op::ConstBool32 => Immediate::Constant(Value::bool32(u32::from_le_bytes(word(bytes)?))),
        Op::ConstF64 => Immediate::Constant(Value::numeric64(f64::from_le_bytes(double(bytes)?))),
        Op::ConstI64 => Immediate::Constant(Value::id64(i64::from_le_bytes(double(bytes)?))),
        Op::Jump | Op::JumpBack | Op::Jz | Op::Jnz => {
            let distance = usize::from(*bytes.first().ok_or(truncated)?);
            let at = position + 1;
            Immediate::Target(if op.jumps_backward() {
                at.checked_sub(distance)
            } else {
                Some(at + distance)
            })
        }
        Op::PushV => Immediate::Count44(decode44(*bytes.first().ok_or(truncated)?)?),
        Op::CallExternal => match *bytes {
            [lo, hi, argc] => Immediate::Call {
                id: FunctionId(u16::from_le_bytes([lo, hi])),
                argc,
            },
            _ => return Err(truncated),
        },
        op if op.encoding() == Encoding::Packed62 => {
            Immediate::Count62(decode62(*bytes.first().ok_or(truncated)?))
        }
        _ => return Ok(None),
    }))
}

/// Decode every token of `code`.
///
/// # Errors
///
/// Fails on unassigned opcode bytes, truncated immediates and malformed
/// decode44 bytes.
pub fn disassemble(code: &[u8]) -> Result<Vec<Instruction>, FoundationError> {
    scan(code)
        .map(|scanned| {
            let scanned = scanned?;
            let immediate = match scanned.token {
                Token::Op(op) => immediate(op, scanned.position, scanned.immediate)?,
                Token::Variable(_) => None,
            };
            Ok(Instruction {
                position: scanned.position,
                token: scanned.token,
                immediate,
            })
        })
        .collect()
}

/// Text listing, one token per line. Calls are annotated with function
/// names when a registry is given.
pub fn listing(
    code: &[u8],
    registry: Option<&FunctionRegistry>,
) -> Result<String, FoundationError> {
    let mut out = String::new();
    for instruction in disassemble(code)? {
        out.push_str(&instruction.to_string());
        if let (Some(registry), Some(Immediate::Call { id, .. })) =
            (registry, instruction.immediate)
        {
            if let Some(descriptor) = registry.get(id) {
                out.push_str("  ; ");
                out.push_str(&descriptor.name);
            }
        }
        out.push('\n');
    }
    Ok(out)
}
