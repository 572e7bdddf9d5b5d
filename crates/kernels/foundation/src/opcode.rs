//! Opcode byte table for the Vexel bytecode.
//!
//! Opcodes are data: each byte maps to an [`Op`] plus static [`OpcodeMetadata`]
//! describing where it may appear and which inline bytes follow it. The
//! compiler uses the metadata to emit well-formed streams, the disassembler
//! uses it to walk them, and the interpreter uses the class to reject bytes
//! that are out of place.
//!
//! Bytes `0x80..=0xFF` are not opcodes. They reference data element
//! `byte - 0x80` and are decoded as [`Token::Variable`].

use crate::error::FoundationError;

/// First byte that encodes a variable reference.
pub const VARIABLE_BASE: u8 = 0x80;

/// Largest data element index a variable reference byte can address.
pub const MAX_VARIABLE_ELEMENT: usize = (u8::MAX - VARIABLE_BASE) as usize;

/// Where an opcode may appear in the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpClass {
    /// Starts a statement.
    Statement,
    /// Produces a value inside a sequence.
    Operand,
    /// Produces a value and may also start a statement (result discarded).
    Either,
    /// Binary operator between two terms.
    Infix,
    /// Prefix applied to the following term.
    Prefix,
    /// Closes a sequence.
    Terminator,
}

/// What follows an opcode byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    /// Nothing.
    Bare,
    /// A sequence closed by `End`.
    Sequence,
    /// A variable reference byte, then a sequence.
    VariableSequence,
    /// One unsigned jump magnitude byte.
    Offset,
    /// One jump magnitude byte, then a condition sequence.
    OffsetSequence,
    /// `n` little-endian bytes of inline constant.
    Inline(u8),
    /// A fixed number of operand terms.
    Operands(u8),
    /// A decode62 byte, then that many operand terms.
    Packed62,
    /// A decode44 byte, then that many operand terms.
    Packed44,
    /// Two function id bytes, an argument count byte, then that many terms.
    External,
    /// A variable reference byte, then a fixed number of operand terms.
    VariableOperands(u8),
}

impl Encoding {
    /// Raw bytes that follow the opcode before the next token.
    ///
    /// Operand terms and sequences are tokens themselves and not counted.
    #[inline]
    pub const fn immediate_bytes(self) -> usize {
        match self {
            Encoding::Inline(n) => n as usize,
            Encoding::Offset | Encoding::OffsetSequence => 1,
            Encoding::Packed62 | Encoding::Packed44 => 1,
            Encoding::External => 3,
            Encoding::Bare
            | Encoding::Sequence
            | Encoding::VariableSequence
            | Encoding::Operands(_)
            | Encoding::VariableOperands(_) => 0,
        }
    }
}

/// Static description of one opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpcodeMetadata {
    pub class: OpClass,
    pub encoding: Encoding,
    /// Lowercase mnemonic used by the disassembler.
    pub mnemonic: &'static str,
}

macro_rules! opcodes {
    ($($variant:ident = $byte:literal => ($class:ident, $encoding:expr, $mnemonic:literal),)*) => {
        /// A bytecode operation.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(u8)]
        pub enum Op {
            $($variant = $byte,)*
        }

        impl Op {
            /// Every opcode in byte order.
            pub const ALL: &'static [Op] = &[$(Op::$variant,)*];

            /// Decode an opcode byte.
            ///
            /// # Errors
            ///
            /// [`FoundationError::InvalidOpcode`] for unassigned bytes and for
            /// variable reference bytes.
            pub const fn from_byte(byte: u8) -> Result<Self, FoundationError> {
                match byte {
                    $($byte => Ok(Op::$variant),)*
                    other => Err(FoundationError::InvalidOpcode(other)),
                }
            }

            /// Static metadata for this opcode.
            pub const fn metadata(self) -> OpcodeMetadata {
                match self {
                    $(Op::$variant => OpcodeMetadata {
                        class: OpClass::$class,
                        encoding: $encoding,
                        mnemonic: $mnemonic,
                    },)*
                }
            }
        }
    };
}

opcodes! {
    Nop = 0x00 => (Statement, Encoding::Bare, "nop"),
    Begin = 0x01 => (Operand, Encoding::Sequence, "begin"),
    End = 0x02 => (Terminator, Encoding::Bare, "end"),
    Assign = 0x03 => (Statement, Encoding::VariableSequence, "assign"),
    Push = 0x04 => (Statement, Encoding::Sequence, "push"),
    PushV = 0x05 => (Statement, Encoding::Packed44, "pushv"),
    Pop = 0x06 => (Operand, Encoding::Bare, "pop"),
    Peek = 0x07 => (Operand, Encoding::Bare, "peek"),
    Jump = 0x08 => (Statement, Encoding::Offset, "jump"),
    JumpBack = 0x09 => (Statement, Encoding::Offset, "jumpback"),
    Jz = 0x0A => (Statement, Encoding::OffsetSequence, "jz"),
    Jnz = 0x0B => (Statement, Encoding::OffsetSequence, "jnz"),
    Return = 0x0C => (Statement, Encoding::Bare, "return"),
    CallExternal = 0x0D => (Either, Encoding::External, "call"),

    Add = 0x10 => (Infix, Encoding::Bare, "add"),
    Sub = 0x11 => (Infix, Encoding::Bare, "sub"),
    Mul = 0x12 => (Infix, Encoding::Bare, "mul"),
    Div = 0x13 => (Infix, Encoding::Bare, "div"),
    Mod = 0x14 => (Infix, Encoding::Bare, "mod"),
    And = 0x15 => (Infix, Encoding::Bare, "and"),
    Or = 0x16 => (Infix, Encoding::Bare, "or"),
    Xor = 0x17 => (Infix, Encoding::Bare, "xor"),
    Gt = 0x18 => (Infix, Encoding::Bare, "gt"),
    Ge = 0x19 => (Infix, Encoding::Bare, "ge"),
    Lt = 0x1A => (Infix, Encoding::Bare, "lt"),
    Le = 0x1B => (Infix, Encoding::Bare, "le"),
    Eq = 0x1C => (Infix, Encoding::Bare, "eq"),
    Ne = 0x1D => (Infix, Encoding::Bare, "ne"),
    Not = 0x1E => (Prefix, Encoding::Bare, "not"),

    ConstF32 = 0x20 => (Operand, Encoding::Inline(4), "f32"),
    ConstI32 = 0x21 => (Operand, Encoding::Inline(4), "i32"),
    ConstBool32 = 0x22 => (Operand, Encoding::Inline(4), "b32"),
    ConstF64 = 0x23 => (Operand, Encoding::Inline(8), "f64"),
    ConstI64 = 0x24 => (Operand, Encoding::Inline(8), "i64"),

    Value0 = 0x28 => (Operand, Encoding::Bare, "0"),
    Value1 = 0x29 => (Operand, Encoding::Bare, "1"),
    Value2 = 0x2A => (Operand, Encoding::Bare, "2"),
    Value3 = 0x2B => (Operand, Encoding::Bare, "3"),
    Value4 = 0x2C => (Operand, Encoding::Bare, "4"),
    Value10 = 0x2D => (Operand, Encoding::Bare, "10"),
    Value100 = 0x2E => (Operand, Encoding::Bare, "100"),
    Half = 0x2F => (Operand, Encoding::Bare, "0.5"),
    Pi = 0x30 => (Operand, Encoding::Bare, "pi"),
    Tau = 0x31 => (Operand, Encoding::Bare, "tau"),
    E = 0x32 => (Operand, Encoding::Bare, "e"),

    Abs = 0x40 => (Operand, Encoding::Operands(1), "abs"),
    Sqrt = 0x41 => (Operand, Encoding::Operands(1), "sqrt"),
    Rsqrt = 0x42 => (Operand, Encoding::Operands(1), "rsqrt"),
    Sin = 0x43 => (Operand, Encoding::Operands(1), "sin"),
    Cos = 0x44 => (Operand, Encoding::Operands(1), "cos"),
    Tan = 0x45 => (Operand, Encoding::Operands(1), "tan"),
    Exp = 0x46 => (Operand, Encoding::Operands(1), "exp"),
    Log = 0x47 => (Operand, Encoding::Operands(1), "log"),
    Floor = 0x48 => (Operand, Encoding::Operands(1), "floor"),
    Ceil = 0x49 => (Operand, Encoding::Operands(1), "ceil"),
    Frac = 0x4A => (Operand, Encoding::Operands(1), "frac"),
    Sign = 0x4B => (Operand, Encoding::Operands(1), "sign"),
    Length = 0x4C => (Operand, Encoding::Operands(1), "length"),
    Normalize = 0x4D => (Operand, Encoding::Operands(1), "normalize"),
    Saturate = 0x4E => (Operand, Encoding::Operands(1), "saturate"),

    Dot = 0x50 => (Operand, Encoding::Operands(2), "dot"),
    Pow = 0x51 => (Operand, Encoding::Operands(2), "pow"),
    Atan2 = 0x52 => (Operand, Encoding::Operands(2), "atan2"),
    Distance = 0x53 => (Operand, Encoding::Operands(2), "distance"),
    Cross = 0x54 => (Operand, Encoding::Operands(2), "cross"),
    Lerp = 0x55 => (Operand, Encoding::Operands(3), "lerp"),
    Clamp = 0x56 => (Operand, Encoding::Operands(3), "clamp"),
    Select = 0x57 => (Operand, Encoding::Operands(3), "select"),
    Fma = 0x58 => (Operand, Encoding::Operands(3), "fma"),
    Min = 0x59 => (Operand, Encoding::Operands(2), "min"),
    Max = 0x5A => (Operand, Encoding::Operands(2), "max"),

    MaxN = 0x60 => (Operand, Encoding::Packed62, "maxn"),
    MinN = 0x61 => (Operand, Encoding::Packed62, "minn"),
    SumN = 0x62 => (Operand, Encoding::Packed62, "sumn"),
    MulN = 0x63 => (Operand, Encoding::Packed62, "muln"),
    AnyN = 0x64 => (Operand, Encoding::Packed62, "anyn"),
    AllN = 0x65 => (Operand, Encoding::Packed62, "alln"),

    Csum = 0x68 => (Operand, Encoding::Operands(1), "csum"),
    Cmax = 0x69 => (Operand, Encoding::Operands(1), "cmax"),
    Cmin = 0x6A => (Operand, Encoding::Operands(1), "cmin"),

    ToId = 0x6C => (Operand, Encoding::Operands(1), "toid"),
    ToNumeric = 0x6D => (Operand, Encoding::Operands(1), "tonumeric"),
    ToBool32 = 0x6E => (Operand, Encoding::Operands(1), "tobool32"),

    SetBit = 0x70 => (Either, Encoding::VariableOperands(2), "setbit"),
    SetBits = 0x71 => (Either, Encoding::VariableOperands(2), "setbits"),
    GetBit = 0x72 => (Either, Encoding::VariableOperands(1), "getbit"),
    GetBits = 0x73 => (Either, Encoding::VariableOperands(1), "getbits"),
    Rol = 0x74 => (Either, Encoding::VariableOperands(1), "rol"),
    Ror = 0x75 => (Either, Encoding::VariableOperands(1), "ror"),
    Shl = 0x76 => (Either, Encoding::VariableOperands(1), "shl"),
    Shr = 0x77 => (Either, Encoding::VariableOperands(1), "shr"),
    CountBits = 0x78 => (Either, Encoding::VariableOperands(0), "countbits"),
    Lzcnt = 0x79 => (Either, Encoding::VariableOperands(0), "lzcnt"),
    Tzcnt = 0x7A => (Either, Encoding::VariableOperands(0), "tzcnt"),
}

impl Op {
    #[inline]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }

    #[inline]
    pub const fn class(self) -> OpClass {
        self.metadata().class
    }

    #[inline]
    pub const fn encoding(self) -> Encoding {
        self.metadata().encoding
    }

    #[inline]
    pub const fn mnemonic(self) -> &'static str {
        self.metadata().mnemonic
    }

    /// Whether the opcode may start a statement.
    #[inline]
    pub const fn starts_statement(self) -> bool {
        matches!(self.class(), OpClass::Statement | OpClass::Either)
    }

    /// Whether the opcode may appear where a term is expected.
    #[inline]
    pub const fn is_term(self) -> bool {
        matches!(self.class(), OpClass::Operand | OpClass::Either)
    }

    /// Jumps whose magnitude byte is added to its own position.
    #[inline]
    pub const fn jumps_forward(self) -> bool {
        matches!(self, Op::Jump | Op::Jz | Op::Jnz)
    }

    /// Jumps whose magnitude byte is subtracted from its own position.
    #[inline]
    pub const fn jumps_backward(self) -> bool {
        matches!(self, Op::JumpBack)
    }

    /// Bit operations that rewrite their target variable.
    #[inline]
    pub const fn mutates_target(self) -> bool {
        matches!(
            self,
            Op::SetBit | Op::SetBits | Op::Rol | Op::Ror | Op::Shl | Op::Shr
        )
    }
}

impl std::fmt::Display for Op {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// A decoded code byte: an opcode or a variable reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    Op(Op),
    /// Data element index.
    Variable(u8),
}

impl Token {
    /// Decode any code byte.
    ///
    /// # Errors
    ///
    /// [`FoundationError::InvalidOpcode`] for unassigned bytes below
    /// [`VARIABLE_BASE`].
    #[inline]
    pub const fn decode(byte: u8) -> Result<Self, FoundationError> {
        if byte >= VARIABLE_BASE {
            return Ok(Token::Variable(byte - VARIABLE_BASE));
        }
        match Op::from_byte(byte) {
            Ok(op) => Ok(Token::Op(op)),
            Err(e) => Err(e),
        }
    }
}

/// Encode a variable reference to the data element at `element`.
///
/// # Errors
///
/// [`FoundationError::CountOverflow`] when the element is past
/// [`MAX_VARIABLE_ELEMENT`].
pub fn variable_byte(element: usize) -> Result<u8, FoundationError> {
    if element > MAX_VARIABLE_ELEMENT {
        return Err(FoundationError::CountOverflow {
            count: element,
            max: MAX_VARIABLE_ELEMENT,
        });
    }
    Ok(VARIABLE_BASE + element as u8)
}
