//! Bitwise operations
//!
//! All shift and rotate operations take the shift count modulo the bit width
//! of the operand, so `x << 33` on an i32 is `x << 1`.

use super::*;

// ============================================================================
// i32 Bitwise Operations
// ============================================================================

/// i32.and - Bitwise AND
pub fn i32_and(stack: &mut Stack) -> Result<(), RuntimeError> {
    let b = stack.pop_u32()?;
    let a = stack.pop_u32()?;
    stack.push(Value::from_u32(a & b));
    Ok(())
}

/// i32.or - Bitwise OR
pub fn i32_or(stack: &mut Stack) -> Result<(), RuntimeError> {
    let b = stack.pop_u32()?;
    let a = stack.pop_u32()?;
    stack.push(Value::from_u32(a | b));
    Ok(())
}

/// i32.xor - Bitwise XOR
pub fn i32_xor(stack: &mut Stack) -> Result<(), RuntimeError> {
    let b = stack.pop_u32()?;
    let a = stack.pop_u32()?;
    stack.push(Value::from_u32(a ^ b));
    Ok(())
}

/// i32.shl - Shift left
pub fn i32_shl(stack: &mut Stack) -> Result<(), RuntimeError> {
    let k = stack.pop_u32()?;
    let a = stack.pop_u32()?;
    stack.push(Value::from_u32(a.wrapping_shl(k)));
    Ok(())
}

/// i32.shr_s - Arithmetic shift right, replicating the sign bit
pub fn i32_shr_s(stack: &mut Stack) -> Result<(), RuntimeError> {
    let k = stack.pop_u32()?;
    let a = stack.pop_i32()?;
    stack.push_i32(a.wrapping_shr(k));
    Ok(())
}

/// i32.shr_u - Logical shift right, filling with zeros
pub fn i32_shr_u(stack: &mut Stack) -> Result<(), RuntimeError> {
    let k = stack.pop_u32()?;
    let a = stack.pop_u32()?;
    stack.push(Value::from_u32(a.wrapping_shr(k)));
    Ok(())
}

/// i32.rotl - Rotate left
pub fn i32_rotl(stack: &mut Stack) -> Result<(), RuntimeError> {
    let k = stack.pop_u32()?;
    let a = stack.pop_u32()?;
    stack.push(Value::from_u32(a.rotate_left(k % 32)));
    Ok(())
}

/// i32.rotr - Rotate right
pub fn i32_rotr(stack: &mut Stack) -> Result<(), RuntimeError> {
    let k = stack.pop_u32()?;
    let a = stack.pop_u32()?;
    stack.push(Value::from_u32(a.rotate_right(k % 32)));
    Ok(())
}

// ============================================================================
// i64 Bitwise Operations
// ============================================================================

/// i64.and - Bitwise AND
pub fn i64_and(stack: &mut Stack) -> Result<(), RuntimeError> {
    let b = stack.pop_u64()?;
    let a = stack.pop_u64()?;
    stack.push(Value::from_u64(a & b));
    Ok(())
}

/// i64.or - Bitwise OR
pub fn i64_or(stack: &mut Stack) -> Result<(), RuntimeError> {
    let b = stack.pop_u64()?;
    let a = stack.pop_u64()?;
    stack.push(Value::from_u64(a | b));
    Ok(())
}

/// i64.xor - Bitwise XOR
pub fn i64_xor(stack: &mut Stack) -> Result<(), RuntimeError> {
    let b = stack.pop_u64()?;
    let a = stack.pop_u64()?;
    stack.push(Value::from_u64(a ^ b));
    Ok(())
}

/// i64.shl - Shift left by k mod 64
pub fn i64_shl(stack: &mut Stack) -> Result<(), RuntimeError> {
    let k = stack.pop_u64()?;
    let a = stack.pop_u64()?;
    stack.push(Value::from_u64(a.wrapping_shl((k % 64) as u32)));
    Ok(())
}

/// i64.shr_s
pub fn i64_shr_s(stack: &mut Stack) -> Result<(), RuntimeError> {
    let k = stack.pop_u64()?;
    let a = stack.pop_i64()?;
    stack.push_i64(a.wrapping_shr((k % 64) as u32));
    Ok(())
}

/// i64.shr_u
pub fn i64_shr_u(stack: &mut Stack) -> Result<(), RuntimeError> {
    let k = stack.pop_u64()?;
    let a = stack.pop_u64()?;
    stack.push(Value::from_u64(a.wrapping_shr((k % 64) as u32)));
    Ok(())
}

/// i64.rotl
pub fn i64_rotl(stack: &mut Stack) -> Result<(), RuntimeError> {
    let k = stack.pop_u64()?;
    let a = stack.pop_u64()?;
    stack.push(Value::from_u64(a.rotate_left((k % 64) as u32)));
    Ok(())
}

/// i64.rotr
pub fn i64_rotr(stack: &mut Stack) -> Result<(), RuntimeError> {
    let k = stack.pop_u64()?;
    let a = stack.pop_u64()?;
    stack.push(Value::from_u64(a.rotate_right((k % 64) as u32)));
    Ok(())
}
