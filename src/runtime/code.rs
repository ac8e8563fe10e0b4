//! Reading immediates out of a function body
//!
//! Function bodies arrive as raw opcode streams. Each instruction is one
//! opcode byte followed by zero or more immediates, which are either LEB128
//! integers or fixed-width little-endian floats. [`CodeReader`] decodes them
//! on demand during execution, and [`BlockMap`] records the matching `else`
//! and `end` of every structured instruction so branches can jump without
//! rescanning.

use super::opcode::*;
use super::{Fault, RuntimeError, ValueType};
use byteorder::{ByteOrder, LittleEndian};
use std::collections::HashMap;

/// Block type immediate of `block`, `loop` and `if`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockType {
    /// No parameters, no results
    Empty,
    /// No parameters, one result
    Value(ValueType),
    /// Parameters and results given by a type index
    TypeIndex(u32),
}

/// Memory immediate of loads and stores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemArg {
    pub align: u32,
    pub offset: u32,
}

/// Cursor over a function body
pub struct CodeReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> CodeReader<'a> {
    pub fn new(bytes: &'a [u8], pos: usize) -> Self {
        CodeReader { bytes, pos }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    pub fn read_u8(&mut self) -> Result<u8, RuntimeError> {
        let byte = *self
            .bytes
            .get(self.pos)
            .ok_or(Fault::TruncatedImmediate(self.pos))?;
        self.pos += 1;
        Ok(byte)
    }

    fn read_fixed(&mut self, len: usize) -> Result<&'a [u8], RuntimeError> {
        let end = self.pos + len;
        if end > self.bytes.len() {
            return Err(Fault::TruncatedImmediate(self.pos).into());
        }
        let bytes = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn read_unsigned(&mut self, bits: u32) -> Result<u64, RuntimeError> {
        let start = self.pos;
        let mut result: u64 = 0;
        let mut shift: u32 = 0;
        loop {
            let byte = self.read_u8()?;
            result |= u64::from(byte & 0x7F) << shift;
            if byte & 0x80 == 0 {
                return Ok(result);
            }
            shift += 7;
            if shift >= bits {
                return Err(Fault::MalformedImmediate(start).into());
            }
        }
    }

    fn read_signed(&mut self, bits: u32) -> Result<i64, RuntimeError> {
        let start = self.pos;
        let mut result: i64 = 0;
        let mut shift: u32 = 0;
        loop {
            let byte = self.read_u8()?;
            result |= i64::from(byte & 0x7F) << shift;
            shift += 7;
            if byte & 0x80 == 0 {
                if shift < 64 && byte & 0x40 != 0 {
                    result |= -1i64 << shift;
                }
                return Ok(result);
            }
            if shift >= bits {
                return Err(Fault::MalformedImmediate(start).into());
            }
        }
    }

    pub fn read_vu32(&mut self) -> Result<u32, RuntimeError> {
        Ok(self.read_unsigned(32)? as u32)
    }

    pub fn read_vs32(&mut self) -> Result<i32, RuntimeError> {
        Ok(self.read_signed(32)? as i32)
    }

    pub fn read_vs64(&mut self) -> Result<i64, RuntimeError> {
        self.read_signed(64)
    }

    pub fn read_f32(&mut self) -> Result<f32, RuntimeError> {
        Ok(f32::from_bits(LittleEndian::read_u32(self.read_fixed(4)?)))
    }

    pub fn read_f64(&mut self) -> Result<f64, RuntimeError> {
        Ok(f64::from_bits(LittleEndian::read_u64(self.read_fixed(8)?)))
    }

    pub fn read_block_type(&mut self) -> Result<BlockType, RuntimeError> {
        let start = self.pos;
        let first = *self.bytes.get(start).ok_or(Fault::TruncatedImmediate(start))?;
        if first == BLOCK_TYPE_EMPTY {
            self.pos += 1;
            return Ok(BlockType::Empty);
        }
        if let Some(ty) = ValueType::from_byte(first) {
            self.pos += 1;
            return Ok(BlockType::Value(ty));
        }
        // s33 type index, never negative once the value types are excluded
        let index = self.read_signed(33)?;
        u32::try_from(index)
            .map(BlockType::TypeIndex)
            .map_err(|_| Fault::MalformedImmediate(start).into())
    }

    pub fn read_memarg(&mut self) -> Result<MemArg, RuntimeError> {
        let align = self.read_vu32()?;
        let offset = self.read_vu32()?;
        Ok(MemArg { align, offset })
    }

    /// Read a `br_table` immediate: the label vector followed by the default label
    pub fn read_br_table(&mut self) -> Result<(Vec<u32>, u32), RuntimeError> {
        let count = self.read_vu32()?;
        let mut labels = Vec::with_capacity(count.min(1024) as usize);
        for _ in 0..count {
            labels.push(self.read_vu32()?);
        }
        let default = self.read_vu32()?;
        Ok((labels, default))
    }

    /// Step over the immediates of `opcode`
    ///
    /// Opcodes this engine does not execute are treated as having none; the
    /// dispatch loop reports them when they are reached.
    pub fn skip_immediates(&mut self, opcode: u8) -> Result<(), RuntimeError> {
        match opcode {
            BLOCK | LOOP | IF => {
                self.read_block_type()?;
            }
            BR | BR_IF | CALL | LOCAL_GET | LOCAL_SET | LOCAL_TEE | GLOBAL_GET | GLOBAL_SET => {
                self.read_vu32()?;
            }
            BR_TABLE => {
                self.read_br_table()?;
            }
            CALL_INDIRECT => {
                self.read_vu32()?;
                self.read_vu32()?;
            }
            I32_LOAD..=I64_STORE32 => {
                self.read_memarg()?;
            }
            MEMORY_SIZE | MEMORY_GROW => {
                self.read_u8()?;
            }
            I32_CONST => {
                self.read_vs32()?;
            }
            I64_CONST => {
                self.read_vs64()?;
            }
            F32_CONST => {
                self.read_fixed(4)?;
            }
            F64_CONST => {
                self.read_fixed(8)?;
            }
            _ => {}
        }
        Ok(())
    }
}

/// Positions of the `else` and `end` matching one structured instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
    pub else_at: Option<usize>,
    pub end_at: usize,
}

/// Matching `else`/`end` offsets for every `block`, `loop` and `if` in a body,
/// keyed by the offset of the opening opcode
#[derive(Debug, Clone, Default)]
pub struct BlockMap {
    blocks: HashMap<usize, BlockInfo>,
}

impl BlockMap {
    /// Scan a function body once and pair every structured instruction with its `end`
    ///
    /// A single unmatched `end` as the last byte is accepted: it is the
    /// function's own closing `end`, which some decoders leave in the body.
    pub fn scan(body: &[u8]) -> Result<Self, RuntimeError> {
        let mut reader = CodeReader::new(body, 0);
        let mut open: Vec<(usize, u8, Option<usize>)> = Vec::new();
        let mut blocks = HashMap::new();

        while !reader.at_end() {
            let offset = reader.pos();
            let opcode = reader.read_u8()?;
            match opcode {
                BLOCK | LOOP | IF => {
                    reader.read_block_type()?;
                    open.push((offset, opcode, None));
                }
                ELSE => match open.last_mut() {
                    Some((_, IF, else_at @ None)) => *else_at = Some(offset),
                    _ => return Err(Fault::UnbalancedBlock(offset).into()),
                },
                END => match open.pop() {
                    Some((start, _, else_at)) => {
                        blocks.insert(
                            start,
                            BlockInfo {
                                else_at,
                                end_at: offset,
                            },
                        );
                    }
                    None if reader.at_end() => {}
                    None => return Err(Fault::UnbalancedBlock(offset).into()),
                },
                _ => reader.skip_immediates(opcode)?,
            }
        }

        if let Some((start, _, _)) = open.last() {
            return Err(Fault::UnbalancedBlock(*start).into());
        }
        Ok(BlockMap { blocks })
    }

    pub fn get(&self, offset: usize) -> Option<&BlockInfo> {
        self.blocks.get(&offset)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(vec![0x00], 0)]
    #[case(vec![0x7F], 127)]
    #[case(vec![0x80, 0x7F], 16256)]
    #[case(vec![0xE5, 0x8E, 0x26], 624485)]
    #[case(vec![0xFF, 0xFF, 0xFF, 0xFF, 0x0F], u32::MAX)]
    fn test_read_vu32(#[case] bytes: Vec<u8>, #[case] expected: u32) {
        let mut reader = CodeReader::new(&bytes, 0);
        assert_eq!(reader.read_vu32().unwrap(), expected);
        assert!(reader.at_end());
    }

    #[rstest]
    #[case(vec![0x7F], -1)]
    #[case(vec![0x3F], 63)]
    #[case(vec![0x40], -64)]
    #[case(vec![0x80, 0x7F], -128)]
    #[case(vec![0x80, 0x80, 0x80, 0x80, 0x78], i32::MIN)]
    fn test_read_vs32(#[case] bytes: Vec<u8>, #[case] expected: i32) {
        let mut reader = CodeReader::new(&bytes, 0);
        assert_eq!(reader.read_vs32().unwrap(), expected);
    }

    #[test]
    fn test_read_vs64_extremes() {
        let min = [0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x7F];
        assert_eq!(CodeReader::new(&min, 0).read_vs64().unwrap(), i64::MIN);
        let max = [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x00];
        assert_eq!(CodeReader::new(&max, 0).read_vs64().unwrap(), i64::MAX);
    }

    #[test]
    fn test_overlong_and_truncated() {
        let overlong = [0x80, 0x80, 0x80, 0x80, 0x80, 0x00];
        let err = CodeReader::new(&overlong, 0).read_vu32().unwrap_err();
        assert_eq!(err.fault(), Some(&Fault::MalformedImmediate(0)));

        let truncated = [0x80];
        let err = CodeReader::new(&truncated, 0).read_vu32().unwrap_err();
        assert_eq!(err.fault(), Some(&Fault::TruncatedImmediate(1)));

        let short_float = [0x00, 0x00];
        assert!(CodeReader::new(&short_float, 0).read_f32().is_err());
    }

    #[test]
    fn test_block_types() {
        let bytes = [0x40, 0x7F, 0x02];
        let mut reader = CodeReader::new(&bytes, 0);
        assert_eq!(reader.read_block_type().unwrap(), BlockType::Empty);
        assert_eq!(reader.read_block_type().unwrap(), BlockType::Value(ValueType::I32));
        assert_eq!(reader.read_block_type().unwrap(), BlockType::TypeIndex(2));
    }

    #[test]
    fn test_floats_little_endian() {
        let bytes = hex::decode("0000803f000000000000f03f").unwrap();
        let mut reader = CodeReader::new(&bytes, 0);
        assert_eq!(reader.read_f32().unwrap(), 1.0);
        assert_eq!(reader.read_f64().unwrap(), 1.0);
    }

    #[test]
    fn test_scan_nested_blocks() {
        // block; loop; if; else; end; end; end
        let body = [BLOCK, 0x40, LOOP, 0x40, I32_CONST, 0x01, IF, 0x40, ELSE, END, END, END];
        let map = BlockMap::scan(&body).unwrap();

        assert_eq!(map.len(), 3);
        assert_eq!(map.get(0).unwrap().end_at, 11);
        assert_eq!(map.get(2).unwrap().end_at, 10);
        assert_eq!(
            map.get(6).unwrap(),
            &BlockInfo {
                else_at: Some(8),
                end_at: 9
            }
        );
    }

    #[test]
    fn test_scan_skips_immediates() {
        // i32.const 0x0B (looks like END), f64.const with END bytes, block, end
        let mut body = vec![I32_CONST, 0x0B, F64_CONST];
        body.extend_from_slice(&[END; 8]);
        body.extend_from_slice(&[BLOCK, 0x40, END]);

        let map = BlockMap::scan(&body).unwrap();
        assert_eq!(map.get(11).unwrap().end_at, 13);
    }

    #[test]
    fn test_scan_accepts_trailing_function_end() {
        let body = [BLOCK, 0x40, END, END];
        assert!(BlockMap::scan(&body).is_ok());
    }

    #[rstest]
    #[case(vec![BLOCK, 0x40])]
    #[case(vec![END, NOP])]
    #[case(vec![BLOCK, 0x40, ELSE, END])]
    #[case(vec![IF, 0x40, ELSE, ELSE, END])]
    fn test_scan_rejects_unbalanced(#[case] body: Vec<u8>) {
        let err = BlockMap::scan(&body).unwrap_err();
        assert!(matches!(err.fault(), Some(Fault::UnbalancedBlock(_))));
    }
}
