//! Memory operations
//!
//! Loads and stores address linear memory at `base + offset`, where `base` is
//! the i32 popped from the stack read as unsigned and `offset` is the static
//! immediate. The sum is computed in 64 bits so it cannot wrap; any access
//! reaching past the current memory size traps. The alignment hint is
//! ignored.

use super::*;

/// Effective address of an access: popped base plus static offset
fn effective_address(stack: &mut Stack, memarg: MemArg) -> Result<u64, RuntimeError> {
    let base = stack.pop_u32()?;
    Ok(base as u64 + memarg.offset as u64)
}

// ============================================================================
// Loads
// ============================================================================

/// i32.load - Load 4 bytes as i32
/// [i32] → [i32]
pub fn i32_load(stack: &mut Stack, memory: &Memory, memarg: MemArg) -> Result<(), RuntimeError> {
    let addr = effective_address(stack, memarg)?;
    stack.push(Value::from_u32(memory.read_u32(addr)?));
    Ok(())
}

/// i64.load - Load 8 bytes as i64
pub fn i64_load(stack: &mut Stack, memory: &Memory, memarg: MemArg) -> Result<(), RuntimeError> {
    let addr = effective_address(stack, memarg)?;
    stack.push(Value::from_u64(memory.read_u64(addr)?));
    Ok(())
}

/// f32.load - Load 4 bytes as f32, bit pattern preserved
pub fn f32_load(stack: &mut Stack, memory: &Memory, memarg: MemArg) -> Result<(), RuntimeError> {
    let addr = effective_address(stack, memarg)?;
    stack.push(Value::from_u32(memory.read_u32(addr)?));
    Ok(())
}

/// f64.load - Load 8 bytes as f64, bit pattern preserved
pub fn f64_load(stack: &mut Stack, memory: &Memory, memarg: MemArg) -> Result<(), RuntimeError> {
    let addr = effective_address(stack, memarg)?;
    stack.push(Value::from_u64(memory.read_u64(addr)?));
    Ok(())
}

/// i32.load8_s - Load 1 byte and sign-extend to i32
pub fn i32_load8_s(stack: &mut Stack, memory: &Memory, memarg: MemArg) -> Result<(), RuntimeError> {
    let addr = effective_address(stack, memarg)?;
    stack.push_i32(memory.read_u8(addr)? as i8 as i32);
    Ok(())
}

/// i32.load8_u - Load 1 byte and zero-extend to i32
pub fn i32_load8_u(stack: &mut Stack, memory: &Memory, memarg: MemArg) -> Result<(), RuntimeError> {
    let addr = effective_address(stack, memarg)?;
    stack.push_i32(memory.read_u8(addr)? as i32);
    Ok(())
}

/// i32.load16_s
pub fn i32_load16_s(stack: &mut Stack, memory: &Memory, memarg: MemArg) -> Result<(), RuntimeError> {
    let addr = effective_address(stack, memarg)?;
    stack.push_i32(memory.read_u16(addr)? as i16 as i32);
    Ok(())
}

/// i32.load16_u
pub fn i32_load16_u(stack: &mut Stack, memory: &Memory, memarg: MemArg) -> Result<(), RuntimeError> {
    let addr = effective_address(stack, memarg)?;
    stack.push_i32(memory.read_u16(addr)? as i32);
    Ok(())
}

/// i64.load8_s
pub fn i64_load8_s(stack: &mut Stack, memory: &Memory, memarg: MemArg) -> Result<(), RuntimeError> {
    let addr = effective_address(stack, memarg)?;
    stack.push_i64(memory.read_u8(addr)? as i8 as i64);
    Ok(())
}

/// i64.load8_u
pub fn i64_load8_u(stack: &mut Stack, memory: &Memory, memarg: MemArg) -> Result<(), RuntimeError> {
    let addr = effective_address(stack, memarg)?;
    stack.push_i64(memory.read_u8(addr)? as i64);
    Ok(())
}

/// i64.load16_s
pub fn i64_load16_s(stack: &mut Stack, memory: &Memory, memarg: MemArg) -> Result<(), RuntimeError> {
    let addr = effective_address(stack, memarg)?;
    stack.push_i64(memory.read_u16(addr)? as i16 as i64);
    Ok(())
}

/// i64.load16_u
pub fn i64_load16_u(stack: &mut Stack, memory: &Memory, memarg: MemArg) -> Result<(), RuntimeError> {
    let addr = effective_address(stack, memarg)?;
    stack.push_i64(memory.read_u16(addr)? as i64);
    Ok(())
}

/// i64.load32_s
pub fn i64_load32_s(stack: &mut Stack, memory: &Memory, memarg: MemArg) -> Result<(), RuntimeError> {
    let addr = effective_address(stack, memarg)?;
    stack.push_i64(memory.read_u32(addr)? as i32 as i64);
    Ok(())
}

/// i64.load32_u
pub fn i64_load32_u(stack: &mut Stack, memory: &Memory, memarg: MemArg) -> Result<(), RuntimeError> {
    let addr = effective_address(stack, memarg)?;
    stack.push_i64(memory.read_u32(addr)? as i64);
    Ok(())
}

// ============================================================================
// Stores
// ============================================================================

/// i32.store
/// [i32 i32] → []
///
/// The value is popped first, then the base address.
pub fn i32_store(stack: &mut Stack, memory: &mut Memory, memarg: MemArg) -> Result<(), RuntimeError> {
    let value = stack.pop_u32()?;
    let addr = effective_address(stack, memarg)?;
    memory.write_u32(addr, value)
}

pub fn i64_store(stack: &mut Stack, memory: &mut Memory, memarg: MemArg) -> Result<(), RuntimeError> {
    let value = stack.pop_u64()?;
    let addr = effective_address(stack, memarg)?;
    memory.write_u64(addr, value)
}

/// f32.store - Stores the operand's bit pattern, NaN payload included
pub fn f32_store(stack: &mut Stack, memory: &mut Memory, memarg: MemArg) -> Result<(), RuntimeError> {
    let value = stack.pop_u32()?;
    let addr = effective_address(stack, memarg)?;
    memory.write_u32(addr, value)
}

pub fn f64_store(stack: &mut Stack, memory: &mut Memory, memarg: MemArg) -> Result<(), RuntimeError> {
    let value = stack.pop_u64()?;
    let addr = effective_address(stack, memarg)?;
    memory.write_u64(addr, value)
}

/// i32.store8 - Store the low byte
pub fn i32_store8(stack: &mut Stack, memory: &mut Memory, memarg: MemArg) -> Result<(), RuntimeError> {
    let value = stack.pop_u32()?;
    let addr = effective_address(stack, memarg)?;
    memory.write_u8(addr, value as u8)
}

pub fn i32_store16(stack: &mut Stack, memory: &mut Memory, memarg: MemArg) -> Result<(), RuntimeError> {
    let value = stack.pop_u32()?;
    let addr = effective_address(stack, memarg)?;
    memory.write_u16(addr, value as u16)
}

pub fn i64_store8(stack: &mut Stack, memory: &mut Memory, memarg: MemArg) -> Result<(), RuntimeError> {
    let value = stack.pop_u64()?;
    let addr = effective_address(stack, memarg)?;
    memory.write_u8(addr, value as u8)
}

pub fn i64_store16(stack: &mut Stack, memory: &mut Memory, memarg: MemArg) -> Result<(), RuntimeError> {
    let value = stack.pop_u64()?;
    let addr = effective_address(stack, memarg)?;
    memory.write_u16(addr, value as u16)
}

pub fn i64_store32(stack: &mut Stack, memory: &mut Memory, memarg: MemArg) -> Result<(), RuntimeError> {
    let value = stack.pop_u64()?;
    let addr = effective_address(stack, memarg)?;
    memory.write_u32(addr, value as u32)
}

// ============================================================================
// Size and growth
// ============================================================================

/// memory.size - Current size in pages
/// [] → [i32]
pub fn memory_size(stack: &mut Stack, memory: &Memory) -> Result<(), RuntimeError> {
    stack.push_i32(memory.size() as i32);
    Ok(())
}

/// memory.grow - Grow memory by delta pages
/// [i32] → [i32]
///
/// Pushes the previous size in pages, or -1 if the memory cannot grow that
/// far. The delta is read as unsigned.
pub fn memory_grow(stack: &mut Stack, memory: &mut Memory) -> Result<(), RuntimeError> {
    let delta = stack.pop_u32()?;
    let result = memory.grow(delta);
    stack.push_i32(result);
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::encoder::BodyBuilder;
    use crate::runtime::memory::PAGE_SIZE;
    use crate::runtime::opcode::*;
    use crate::runtime::test_utils::test::ExecutorTest;
    use crate::runtime::{DefinedFunction, FunctionType, Instance, Trap, Value, ValueType};

    #[test]
    fn memory_size_no_memory() {
        ExecutorTest::new()
            .body(|b| b.memory_size())
            .returns(vec![ValueType::I32])
            .expect_error("No memory instance available");
    }

    #[test]
    fn memory_grow_no_memory() {
        ExecutorTest::new()
            .body(|b| b.i32_const(1).memory_grow())
            .returns(vec![ValueType::I32])
            .expect_error("No memory instance available");
    }

    #[test]
    fn memory_size_initial() {
        ExecutorTest::new()
            .with_memory()
            .body(|b| b.memory_size())
            .returns(vec![ValueType::I32])
            .expect_stack(vec![Value::from_i32(1)]);
    }

    #[test]
    fn store_then_load_i32() {
        ExecutorTest::new()
            .with_memory()
            .body(|b| {
                b.i32_const(16)
                    .i32_const(0x1234_5678)
                    .mem(I32_STORE, 0)
                    .i32_const(0)
                    .mem(I32_LOAD, 16)
            })
            .returns(vec![ValueType::I32])
            .expect_stack(vec![Value::from_i32(0x1234_5678)]);
    }

    #[test]
    fn little_endian_layout() {
        ExecutorTest::new()
            .with_memory()
            .body(|b| {
                b.i32_const(0)
                    .i32_const(0x0403_0201)
                    .mem(I32_STORE, 0)
                    .i32_const(0)
                    .mem(I32_LOAD8_U, 0)
                    .i32_const(3)
                    .mem(I32_LOAD8_U, 0)
            })
            .returns(vec![ValueType::I32, ValueType::I32])
            .expect_stack(vec![Value::from_i32(1), Value::from_i32(4)]);
    }

    #[test]
    fn narrow_loads_extend() {
        ExecutorTest::new()
            .with_memory()
            .body(|b| {
                b.i32_const(0)
                    .i32_const(0xFF)
                    .mem(I32_STORE8, 0)
                    .i32_const(0)
                    .mem(I32_LOAD8_S, 0)
                    .i32_const(0)
                    .mem(I32_LOAD8_U, 0)
                    .i32_const(0)
                    .mem(I64_LOAD8_S, 0)
            })
            .returns(vec![ValueType::I32, ValueType::I32, ValueType::I64])
            .expect_stack(vec![Value::from_i32(-1), Value::from_i32(255), Value::from_i64(-1)]);
    }

    #[test]
    fn i64_store32_and_load32() {
        ExecutorTest::new()
            .with_memory()
            .body(|b| {
                b.i32_const(8)
                    .i64_const(0x1_8000_0000)
                    .mem(I64_STORE32, 0)
                    .i32_const(8)
                    .mem(I64_LOAD32_S, 0)
                    .i32_const(8)
                    .mem(I64_LOAD32_U, 0)
            })
            .returns(vec![ValueType::I64, ValueType::I64])
            .expect_stack(vec![Value::from_i64(-2147483648), Value::from_i64(0x8000_0000)]);
    }

    #[test]
    fn f32_round_trip_keeps_bits() {
        let nan = f32::from_bits(0x7F80_0001);
        ExecutorTest::new()
            .with_memory()
            .body(|b| b.i32_const(4).f32_const(nan).mem(F32_STORE, 0).i32_const(4).mem(F32_LOAD, 0))
            .returns(vec![ValueType::F32])
            .expect_stack(vec![Value::from_bits(0x7F80_0001)]);
    }

    #[test]
    fn f64_round_trip() {
        ExecutorTest::new()
            .with_memory()
            .body(|b| b.i32_const(0).f64_const(-0.0).mem(F64_STORE, 8).i32_const(8).mem(F64_LOAD, 0))
            .returns(vec![ValueType::F64])
            .expect_stack(vec![Value::from_f64(-0.0)]);
    }

    #[test]
    fn load_at_last_byte() {
        ExecutorTest::new()
            .with_memory()
            .body(|b| b.i32_const(PAGE_SIZE as i32 - 1).mem(I32_LOAD8_U, 0))
            .returns(vec![ValueType::I32])
            .expect_stack(vec![Value::from_i32(0)]);
    }

    #[test]
    fn load_past_end_traps() {
        ExecutorTest::new()
            .with_memory()
            .body(|b| b.i32_const(PAGE_SIZE as i32 - 3).mem(I32_LOAD, 0))
            .returns(vec![ValueType::I32])
            .expect_trap(Trap::MemoryOutOfBounds);
    }

    #[test]
    fn offset_does_not_wrap() {
        ExecutorTest::new()
            .with_memory()
            .body(|b| b.i32_const(-1).mem(I32_LOAD8_U, 1))
            .returns(vec![ValueType::I32])
            .expect_trap(Trap::MemoryOutOfBounds);
    }

    #[test]
    fn store_out_of_bounds_traps() {
        ExecutorTest::new()
            .with_memory()
            .body(|b| b.i32_const(PAGE_SIZE as i32).i64_const(1).mem(I64_STORE8, 0))
            .expect_trap(Trap::MemoryOutOfBounds);
    }

    #[test]
    fn grow_returns_previous_size() {
        ExecutorTest::new()
            .with_memory()
            .body(|b| b.i32_const(2).memory_grow().memory_size())
            .returns(vec![ValueType::I32, ValueType::I32])
            .expect_stack(vec![Value::from_i32(1), Value::from_i32(3)]);
    }

    #[test]
    fn grow_beyond_max_fails() {
        let body = BodyBuilder::new()
            .i32_const(2)
            .memory_grow()
            .memory_size()
            .build();
        let func = DefinedFunction::new(
            FunctionType::new(vec![], vec![ValueType::I32, ValueType::I32]),
            0,
            body,
        )
        .unwrap();
        let mut instance = Instance::builder().function(func).memory(1, Some(2)).build().unwrap();

        let results = instance.invoke(0, &[]).unwrap();
        assert_eq!(results, vec![Value::from_i32(-1), Value::from_i32(1)]);
    }

    #[test]
    fn grow_by_zero() {
        ExecutorTest::new()
            .with_memory()
            .body(|b| b.i32_const(0).memory_grow())
            .returns(vec![ValueType::I32])
            .expect_stack(vec![Value::from_i32(1)]);
    }

    #[test]
    fn grown_pages_are_addressable() {
        ExecutorTest::new()
            .with_memory()
            .body(|b| {
                b.i32_const(1)
                    .memory_grow()
                    .drop()
                    .i32_const(PAGE_SIZE as i32)
                    .i32_const(9)
                    .mem(I32_STORE, 0)
                    .i32_const(PAGE_SIZE as i32)
                    .mem(I32_LOAD, 0)
            })
            .returns(vec![ValueType::I32])
            .expect_stack(vec![Value::from_i32(9)]);
    }
}
