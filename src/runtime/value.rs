//! WebAssembly value representation
//!
//! Every operand is carried in a [`Value`]: an untagged 64-bit cell. The
//! instruction that produces or consumes a cell decides what it means.
//!
//! - i32: low 32 bits, zero-extended
//! - i64: all 64 bits, two's complement
//! - f32: the 32-bit IEEE-754 pattern in the low 32 bits
//! - f64: the 64-bit IEEE-754 pattern

use fhex::ToHex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Uniform storage cell for one operand
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Value(u64);

impl Value {
    /// Build a cell from its raw bits
    pub const fn from_bits(bits: u64) -> Self {
        Value(bits)
    }

    /// Raw bits of the cell
    pub const fn bits(self) -> u64 {
        self.0
    }

    pub const fn from_i32(v: i32) -> Self {
        Value(v as u32 as u64)
    }

    pub const fn from_u32(v: u32) -> Self {
        Value(v as u64)
    }

    pub const fn from_i64(v: i64) -> Self {
        Value(v as u64)
    }

    pub const fn from_u64(v: u64) -> Self {
        Value(v)
    }

    pub fn from_f32(v: f32) -> Self {
        Value(v.to_bits() as u64)
    }

    pub fn from_f64(v: f64) -> Self {
        Value(v.to_bits())
    }

    /// Build a cell from a boolean (1 or 0), as comparisons produce
    pub const fn from_bool(v: bool) -> Self {
        Value(v as u64)
    }

    pub const fn as_i32(self) -> i32 {
        self.0 as u32 as i32
    }

    pub const fn as_u32(self) -> u32 {
        self.0 as u32
    }

    pub const fn as_i64(self) -> i64 {
        self.0 as i64
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }

    pub fn as_f32(self) -> f32 {
        f32::from_bits(self.0 as u32)
    }

    pub fn as_f64(self) -> f64 {
        f64::from_bits(self.0)
    }

    /// Render the cell as the given type, for diagnostics
    pub fn display_as(self, ty: ValueType) -> String {
        match ty {
            ValueType::I32 => format!("i32:{}", self.as_i32()),
            ValueType::I64 => format!("i64:{}", self.as_i64()),
            ValueType::F32 => format!("f32:{}", self.as_f32().to_hex()),
            ValueType::F64 => format!("f64:{}", self.as_f64().to_hex()),
            other => format!("{other}:{:#018x}", self.0),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

/// WebAssembly value types
///
/// Only the four numeric types are executable. The reference and vector
/// types exist so that declared signatures can be represented and rejected
/// where the engine cannot honour them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    I32,
    I64,
    F32,
    F64,
    V128,
    FuncRef,
    ExternRef,
}

impl ValueType {
    /// Decode a value type from its binary encoding
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x7F => Some(ValueType::I32),
            0x7E => Some(ValueType::I64),
            0x7D => Some(ValueType::F32),
            0x7C => Some(ValueType::F64),
            0x7B => Some(ValueType::V128),
            0x70 => Some(ValueType::FuncRef),
            0x6F => Some(ValueType::ExternRef),
            _ => None,
        }
    }

    /// Binary encoding of this value type
    pub fn to_byte(self) -> u8 {
        match self {
            ValueType::I32 => 0x7F,
            ValueType::I64 => 0x7E,
            ValueType::F32 => 0x7D,
            ValueType::F64 => 0x7C,
            ValueType::V128 => 0x7B,
            ValueType::FuncRef => 0x70,
            ValueType::ExternRef => 0x6F,
        }
    }

    /// Whether this engine can execute values of this type
    pub fn is_numeric(self) -> bool {
        matches!(self, ValueType::I32 | ValueType::I64 | ValueType::F32 | ValueType::F64)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::I32 => "i32",
            ValueType::I64 => "i64",
            ValueType::F32 => "f32",
            ValueType::F64 => "f64",
            ValueType::V128 => "v128",
            ValueType::FuncRef => "funcref",
            ValueType::ExternRef => "externref",
        };
        f.write_str(name)
    }
}

/// A function signature: parameter types followed by result types
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionType {
    pub params: Vec<ValueType>,
    pub results: Vec<ValueType>,
}

impl FunctionType {
    pub fn new(params: Vec<ValueType>, results: Vec<ValueType>) -> Self {
        FunctionType { params, results }
    }
}

impl fmt::Display for FunctionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |types: &[ValueType]| types.iter().map(|t| t.to_string()).collect::<Vec<_>>().join(" ");
        write!(f, "[{}] -> [{}]", join(&self.params), join(&self.results))
    }
}
