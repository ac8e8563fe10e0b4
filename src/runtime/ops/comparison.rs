//! Comparison operations
//!
//! Every test and comparison pushes an i32: 1 for true, 0 for false. Float
//! comparisons involving NaN are false, except `ne` which is true.

use super::*;

// ============================================================================
// Integer Comparison Operations (i32)
// ============================================================================

/// i32.eqz - Test if i32 is zero
pub fn i32_eqz(stack: &mut Stack) -> Result<(), RuntimeError> {
    let value = stack.pop_i32()?;
    stack.push_bool(value == 0);
    Ok(())
}

/// i32.eq - Test if two i32 values are equal
pub fn i32_eq(stack: &mut Stack) -> Result<(), RuntimeError> {
    let b = stack.pop_i32()?;
    let a = stack.pop_i32()?;
    stack.push_bool(a == b);
    Ok(())
}

/// i32.ne - Test if two i32 values are not equal
pub fn i32_ne(stack: &mut Stack) -> Result<(), RuntimeError> {
    let b = stack.pop_i32()?;
    let a = stack.pop_i32()?;
    stack.push_bool(a != b);
    Ok(())
}

/// i32.lt_s - Signed less than
pub fn i32_lt_s(stack: &mut Stack) -> Result<(), RuntimeError> {
    let b = stack.pop_i32()?;
    let a = stack.pop_i32()?;
    stack.push_bool(a < b);
    Ok(())
}

/// i32.lt_u - Unsigned less than
pub fn i32_lt_u(stack: &mut Stack) -> Result<(), RuntimeError> {
    let b = stack.pop_u32()?;
    let a = stack.pop_u32()?;
    stack.push_bool(a < b);
    Ok(())
}

/// i32.gt_s - Signed greater than
pub fn i32_gt_s(stack: &mut Stack) -> Result<(), RuntimeError> {
    let b = stack.pop_i32()?;
    let a = stack.pop_i32()?;
    stack.push_bool(a > b);
    Ok(())
}

/// i32.gt_u - Unsigned greater than
pub fn i32_gt_u(stack: &mut Stack) -> Result<(), RuntimeError> {
    let b = stack.pop_u32()?;
    let a = stack.pop_u32()?;
    stack.push_bool(a > b);
    Ok(())
}

/// i32.le_s - Signed less than or equal
pub fn i32_le_s(stack: &mut Stack) -> Result<(), RuntimeError> {
    let b = stack.pop_i32()?;
    let a = stack.pop_i32()?;
    stack.push_bool(a <= b);
    Ok(())
}

/// i32.le_u - Unsigned less than or equal
pub fn i32_le_u(stack: &mut Stack) -> Result<(), RuntimeError> {
    let b = stack.pop_u32()?;
    let a = stack.pop_u32()?;
    stack.push_bool(a <= b);
    Ok(())
}

/// i32.ge_s - Signed greater than or equal
pub fn i32_ge_s(stack: &mut Stack) -> Result<(), RuntimeError> {
    let b = stack.pop_i32()?;
    let a = stack.pop_i32()?;
    stack.push_bool(a >= b);
    Ok(())
}

/// i32.ge_u - Unsigned greater than or equal
pub fn i32_ge_u(stack: &mut Stack) -> Result<(), RuntimeError> {
    let b = stack.pop_u32()?;
    let a = stack.pop_u32()?;
    stack.push_bool(a >= b);
    Ok(())
}

// ============================================================================
// Integer Comparison Operations (i64)
// ============================================================================

/// i64.eqz - Test if i64 is zero
pub fn i64_eqz(stack: &mut Stack) -> Result<(), RuntimeError> {
    let value = stack.pop_i64()?;
    stack.push_bool(value == 0);
    Ok(())
}

pub fn i64_eq(stack: &mut Stack) -> Result<(), RuntimeError> {
    let b = stack.pop_i64()?;
    let a = stack.pop_i64()?;
    stack.push_bool(a == b);
    Ok(())
}

pub fn i64_ne(stack: &mut Stack) -> Result<(), RuntimeError> {
    let b = stack.pop_i64()?;
    let a = stack.pop_i64()?;
    stack.push_bool(a != b);
    Ok(())
}

pub fn i64_lt_s(stack: &mut Stack) -> Result<(), RuntimeError> {
    let b = stack.pop_i64()?;
    let a = stack.pop_i64()?;
    stack.push_bool(a < b);
    Ok(())
}

pub fn i64_lt_u(stack: &mut Stack) -> Result<(), RuntimeError> {
    let b = stack.pop_u64()?;
    let a = stack.pop_u64()?;
    stack.push_bool(a < b);
    Ok(())
}

pub fn i64_gt_s(stack: &mut Stack) -> Result<(), RuntimeError> {
    let b = stack.pop_i64()?;
    let a = stack.pop_i64()?;
    stack.push_bool(a > b);
    Ok(())
}

pub fn i64_gt_u(stack: &mut Stack) -> Result<(), RuntimeError> {
    let b = stack.pop_u64()?;
    let a = stack.pop_u64()?;
    stack.push_bool(a > b);
    Ok(())
}

pub fn i64_le_s(stack: &mut Stack) -> Result<(), RuntimeError> {
    let b = stack.pop_i64()?;
    let a = stack.pop_i64()?;
    stack.push_bool(a <= b);
    Ok(())
}

pub fn i64_le_u(stack: &mut Stack) -> Result<(), RuntimeError> {
    let b = stack.pop_u64()?;
    let a = stack.pop_u64()?;
    stack.push_bool(a <= b);
    Ok(())
}

pub fn i64_ge_s(stack: &mut Stack) -> Result<(), RuntimeError> {
    let b = stack.pop_i64()?;
    let a = stack.pop_i64()?;
    stack.push_bool(a >= b);
    Ok(())
}

pub fn i64_ge_u(stack: &mut Stack) -> Result<(), RuntimeError> {
    let b = stack.pop_u64()?;
    let a = stack.pop_u64()?;
    stack.push_bool(a >= b);
    Ok(())
}

// ============================================================================
// Float Comparison Operations
// ============================================================================

/// f32.eq - Ordered equality; -0.0 equals +0.0
pub fn f32_eq(stack: &mut Stack) -> Result<(), RuntimeError> {
    let b = stack.pop_f32()?;
    let a = stack.pop_f32()?;
    stack.push_bool(a == b);
    Ok(())
}

/// f32.ne - True when either operand is NaN
pub fn f32_ne(stack: &mut Stack) -> Result<(), RuntimeError> {
    let b = stack.pop_f32()?;
    let a = stack.pop_f32()?;
    stack.push_bool(a != b);
    Ok(())
}

pub fn f32_lt(stack: &mut Stack) -> Result<(), RuntimeError> {
    let b = stack.pop_f32()?;
    let a = stack.pop_f32()?;
    stack.push_bool(a < b);
    Ok(())
}

pub fn f32_gt(stack: &mut Stack) -> Result<(), RuntimeError> {
    let b = stack.pop_f32()?;
    let a = stack.pop_f32()?;
    stack.push_bool(a > b);
    Ok(())
}

pub fn f32_le(stack: &mut Stack) -> Result<(), RuntimeError> {
    let b = stack.pop_f32()?;
    let a = stack.pop_f32()?;
    stack.push_bool(a <= b);
    Ok(())
}

pub fn f32_ge(stack: &mut Stack) -> Result<(), RuntimeError> {
    let b = stack.pop_f32()?;
    let a = stack.pop_f32()?;
    stack.push_bool(a >= b);
    Ok(())
}

pub fn f64_eq(stack: &mut Stack) -> Result<(), RuntimeError> {
    let b = stack.pop_f64()?;
    let a = stack.pop_f64()?;
    stack.push_bool(a == b);
    Ok(())
}

pub fn f64_ne(stack: &mut Stack) -> Result<(), RuntimeError> {
    let b = stack.pop_f64()?;
    let a = stack.pop_f64()?;
    stack.push_bool(a != b);
    Ok(())
}

pub fn f64_lt(stack: &mut Stack) -> Result<(), RuntimeError> {
    let b = stack.pop_f64()?;
    let a = stack.pop_f64()?;
    stack.push_bool(a < b);
    Ok(())
}

pub fn f64_gt(stack: &mut Stack) -> Result<(), RuntimeError> {
    let b = stack.pop_f64()?;
    let a = stack.pop_f64()?;
    stack.push_bool(a > b);
    Ok(())
}

pub fn f64_le(stack: &mut Stack) -> Result<(), RuntimeError> {
    let b = stack.pop_f64()?;
    let a = stack.pop_f64()?;
    stack.push_bool(a <= b);
    Ok(())
}

pub fn f64_ge(stack: &mut Stack) -> Result<(), RuntimeError> {
    let b = stack.pop_f64()?;
    let a = stack.pop_f64()?;
    stack.push_bool(a >= b);
    Ok(())
}
