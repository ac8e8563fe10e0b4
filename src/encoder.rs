//! Assembles function bodies in the WebAssembly binary instruction encoding.
//!
//! The engine consumes already-decoded function bodies: one opcode byte per
//! instruction followed by its immediates. [`BodyBuilder`] produces exactly
//! that stream, emitting minimal LEB128 for integer immediates and
//! little-endian IEEE 754 for float constants. It is the embedder's (and the
//! test suite's) way of writing bodies without a text-format front end.
//!
//! # Example
//!
//! ```
//! use stackwasm::encoder::BodyBuilder;
//! use stackwasm::runtime::code::BlockType;
//!
//! let body = BodyBuilder::new()
//!     .block(BlockType::Empty)
//!     .i32_const(1)
//!     .br_if(0)
//!     .end()
//!     .build();
//! assert_eq!(body, vec![0x02, 0x40, 0x41, 0x01, 0x0d, 0x00, 0x0b]);
//! ```

use crate::runtime::code::BlockType;
use crate::runtime::opcode::*;
use byteorder::{ByteOrder, LittleEndian};

/// Appends the unsigned LEB128 encoding of `value` to `buf`.
pub fn write_vu32(buf: &mut Vec<u8>, value: u32) {
    let mut value = value as u64;
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            buf.push(byte);
            break;
        }
        byte |= 0x80;
        buf.push(byte);
    }
}

/// Appends the signed LEB128 encoding of `value` to `buf`.
pub fn write_vs64(buf: &mut Vec<u8>, mut value: i64) {
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if (value == 0 && (byte & 0x40) == 0) || (value == -1 && (byte & 0x40) != 0) {
            buf.push(byte);
            break;
        }
        byte |= 0x80;
        buf.push(byte);
    }
}

pub fn write_vs32(buf: &mut Vec<u8>, value: i32) {
    write_vs64(buf, value as i64);
}

/// Natural alignment exponent of a load or store opcode
fn natural_align(opcode: u8) -> u32 {
    match opcode {
        I32_LOAD8_S | I32_LOAD8_U | I64_LOAD8_S | I64_LOAD8_U | I32_STORE8 | I64_STORE8 => 0,
        I32_LOAD16_S | I32_LOAD16_U | I64_LOAD16_S | I64_LOAD16_U | I32_STORE16 | I64_STORE16 => 1,
        I64_LOAD | F64_LOAD | I64_STORE | F64_STORE => 3,
        _ => 2,
    }
}

/// Builder for a function body
///
/// Every method appends one instruction and returns the builder, so bodies
/// read top to bottom like the instruction sequence they encode. The builder
/// does not check structure; [`DefinedFunction::new`](crate::runtime::DefinedFunction::new)
/// does that when the body is loaded.
#[derive(Debug, Clone, Default)]
pub struct BodyBuilder {
    code: Vec<u8>,
}

impl BodyBuilder {
    pub fn new() -> Self {
        BodyBuilder { code: Vec::new() }
    }

    /// Append a bare opcode with no immediates
    pub fn op(mut self, opcode: u8) -> Self {
        self.code.push(opcode);
        self
    }

    /// Append raw bytes, for immediates the builder has no method for
    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.code.extend_from_slice(bytes);
        self
    }

    fn op_u32(mut self, opcode: u8, immediate: u32) -> Self {
        self.code.push(opcode);
        write_vu32(&mut self.code, immediate);
        self
    }

    fn op_block(mut self, opcode: u8, block_type: BlockType) -> Self {
        self.code.push(opcode);
        match block_type {
            BlockType::Empty => self.code.push(BLOCK_TYPE_EMPTY),
            BlockType::Value(ty) => self.code.push(ty.to_byte()),
            BlockType::TypeIndex(idx) => write_vs64(&mut self.code, idx as i64),
        }
        self
    }

    // Control

    pub fn unreachable(self) -> Self {
        self.op(UNREACHABLE)
    }

    pub fn nop(self) -> Self {
        self.op(NOP)
    }

    pub fn block(self, block_type: BlockType) -> Self {
        self.op_block(BLOCK, block_type)
    }

    pub fn loop_(self, block_type: BlockType) -> Self {
        self.op_block(LOOP, block_type)
    }

    pub fn if_(self, block_type: BlockType) -> Self {
        self.op_block(IF, block_type)
    }

    pub fn else_(self) -> Self {
        self.op(ELSE)
    }

    pub fn end(self) -> Self {
        self.op(END)
    }

    pub fn br(self, depth: u32) -> Self {
        self.op_u32(BR, depth)
    }

    pub fn br_if(self, depth: u32) -> Self {
        self.op_u32(BR_IF, depth)
    }

    pub fn br_table(mut self, targets: &[u32], default: u32) -> Self {
        self.code.push(BR_TABLE);
        write_vu32(&mut self.code, targets.len() as u32);
        for target in targets {
            write_vu32(&mut self.code, *target);
        }
        write_vu32(&mut self.code, default);
        self
    }

    pub fn return_(self) -> Self {
        self.op(RETURN)
    }

    pub fn call(self, func_idx: u32) -> Self {
        self.op_u32(CALL, func_idx)
    }

    pub fn call_indirect(mut self, type_idx: u32, table_idx: u32) -> Self {
        self.code.push(CALL_INDIRECT);
        write_vu32(&mut self.code, type_idx);
        write_vu32(&mut self.code, table_idx);
        self
    }

    // Parametric

    pub fn drop(self) -> Self {
        self.op(DROP)
    }

    pub fn select(self) -> Self {
        self.op(SELECT)
    }

    // Variable

    pub fn local_get(self, idx: u32) -> Self {
        self.op_u32(LOCAL_GET, idx)
    }

    pub fn local_set(self, idx: u32) -> Self {
        self.op_u32(LOCAL_SET, idx)
    }

    pub fn local_tee(self, idx: u32) -> Self {
        self.op_u32(LOCAL_TEE, idx)
    }

    pub fn global_get(self, idx: u32) -> Self {
        self.op_u32(GLOBAL_GET, idx)
    }

    pub fn global_set(self, idx: u32) -> Self {
        self.op_u32(GLOBAL_SET, idx)
    }

    // Memory

    /// Append a load or store with its natural alignment and the given static offset
    pub fn mem(mut self, opcode: u8, offset: u32) -> Self {
        self.code.push(opcode);
        write_vu32(&mut self.code, natural_align(opcode));
        write_vu32(&mut self.code, offset);
        self
    }

    pub fn memory_size(mut self) -> Self {
        self.code.extend_from_slice(&[MEMORY_SIZE, 0x00]);
        self
    }

    pub fn memory_grow(mut self) -> Self {
        self.code.extend_from_slice(&[MEMORY_GROW, 0x00]);
        self
    }

    // Constants

    pub fn i32_const(mut self, value: i32) -> Self {
        self.code.push(I32_CONST);
        write_vs32(&mut self.code, value);
        self
    }

    pub fn i64_const(mut self, value: i64) -> Self {
        self.code.push(I64_CONST);
        write_vs64(&mut self.code, value);
        self
    }

    pub fn f32_const(mut self, value: f32) -> Self {
        let mut bytes = [0u8; 4];
        LittleEndian::write_f32(&mut bytes, value);
        self.code.push(F32_CONST);
        self.code.extend_from_slice(&bytes);
        self
    }

    pub fn f64_const(mut self, value: f64) -> Self {
        let mut bytes = [0u8; 8];
        LittleEndian::write_f64(&mut bytes, value);
        self.code.push(F64_CONST);
        self.code.extend_from_slice(&bytes);
        self
    }

    // Frequently used arithmetic, the rest go through `op`

    pub fn i32_add(self) -> Self {
        self.op(I32_ADD)
    }

    pub fn i32_sub(self) -> Self {
        self.op(I32_SUB)
    }

    pub fn i32_mul(self) -> Self {
        self.op(I32_MUL)
    }

    pub fn i32_eqz(self) -> Self {
        self.op(I32_EQZ)
    }

    pub fn i32_lt_s(self) -> Self {
        self.op(I32_LT_S)
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    pub fn build(self) -> Vec<u8> {
        self.code
    }
}
