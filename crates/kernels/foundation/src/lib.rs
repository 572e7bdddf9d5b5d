//! Vexel Foundation
//!
//! Encodings shared by the Vexel compiler, package layout and VM: datatypes
//! and vector sizes, the per-element metadata byte, dispatch keys, the opcode
//! table, packed count bytes and the typed [`Value`].

pub mod datatype;
pub mod dispatch;
pub mod error;
pub mod lane;
pub mod metadata;
pub mod opcode;
pub mod packing;
pub mod scan;
pub mod value;

pub use datatype::{DataType, Shape, VectorSize, ELEMENT_SIZE};
pub use dispatch::{combine, DispatchKey};
pub use error::{FoundationError, Result};
pub use lane::Lane;
pub use metadata::{decode_metadata, encode_metadata, tag_elements};
pub use opcode::{
    variable_byte, Encoding, Op, OpClass, OpcodeMetadata, Token, MAX_VARIABLE_ELEMENT,
    VARIABLE_BASE,
};
pub use packing::{decode44, decode62, encode44, encode62, Packed44, Packed62};
pub use scan::{calls_external, scan, Scanned, Scanner};
pub use value::{broadcast_size, Value, Vector};
