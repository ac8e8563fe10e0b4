//! Type conversion operations
//!
//! Conversions include:
//! - Integer width conversions (wrap, extend)
//! - Sign extension within an integer (extend8_s and friends)
//! - Float width conversions (promote, demote)
//! - Integer to float conversions
//! - Float to integer conversions (trapping truncation)
//! - Reinterpretation (bit casting)

use super::*;

// ============================================================================
// Integer Width Conversions
// ============================================================================

/// i32.wrap_i64 - Keep the low 32 bits of an i64
pub fn i32_wrap_i64(stack: &mut Stack) -> Result<(), RuntimeError> {
    let value = stack.pop_i64()?;
    stack.push_i32(value as i32);
    Ok(())
}

/// i64.extend_i32_s - Sign-extend i32 to i64
pub fn i64_extend_i32_s(stack: &mut Stack) -> Result<(), RuntimeError> {
    let value = stack.pop_i32()?;
    stack.push_i64(value as i64);
    Ok(())
}

/// i64.extend_i32_u - Zero-extend i32 to i64
pub fn i64_extend_i32_u(stack: &mut Stack) -> Result<(), RuntimeError> {
    let value = stack.pop_u32()?;
    stack.push_i64(value as i64);
    Ok(())
}

// ============================================================================
// Sign Extension Operations
// ============================================================================

/// i32.extend8_s - Sign-extend the low 8 bits to i32
///
/// If bit 7 is set, all upper bits are set to 1.
pub fn i32_extend8_s(stack: &mut Stack) -> Result<(), RuntimeError> {
    let value = stack.pop_i32()?;
    stack.push_i32(value as i8 as i32);
    Ok(())
}

/// i32.extend16_s - Sign-extend the low 16 bits to i32
pub fn i32_extend16_s(stack: &mut Stack) -> Result<(), RuntimeError> {
    let value = stack.pop_i32()?;
    stack.push_i32(value as i16 as i32);
    Ok(())
}

/// i64.extend8_s
pub fn i64_extend8_s(stack: &mut Stack) -> Result<(), RuntimeError> {
    let value = stack.pop_i64()?;
    stack.push_i64(value as i8 as i64);
    Ok(())
}

/// i64.extend16_s
pub fn i64_extend16_s(stack: &mut Stack) -> Result<(), RuntimeError> {
    let value = stack.pop_i64()?;
    stack.push_i64(value as i16 as i64);
    Ok(())
}

/// i64.extend32_s
pub fn i64_extend32_s(stack: &mut Stack) -> Result<(), RuntimeError> {
    let value = stack.pop_i64()?;
    stack.push_i64(value as i32 as i64);
    Ok(())
}

// ============================================================================
// Float to Integer Truncation
// ============================================================================

// Exclusive bounds of the values whose truncation fits each target type.
// The i64 lower bound is the largest f64 below -2^63, so -2^63 itself passes.
const I32_S_BOUNDS: (f64, f64) = (-2147483649.0, 2147483648.0);
const U32_BOUNDS: (f64, f64) = (-1.0, 4294967296.0);
const I64_S_BOUNDS: (f64, f64) = (-9223372036854777856.0, 9223372036854775808.0);
const U64_BOUNDS: (f64, f64) = (-1.0, 18446744073709551616.0);

/// Truncate toward zero, trapping when the result has no integer value
///
/// NaN is an invalid conversion; infinities and finite values outside
/// `bounds` overflow.
fn checked_trunc(value: f64, bounds: (f64, f64)) -> Result<f64, RuntimeError> {
    if value.is_nan() {
        return Err(Trap::InvalidConversion.into());
    }
    let (lower, upper) = bounds;
    if !(value > lower && value < upper) {
        return Err(Trap::IntegerOverflow.into());
    }
    Ok(value.trunc())
}

/// i32.trunc_f32_s
/// 1. Pop f32 value
/// 2. If NaN, trap with invalid conversion
/// 3. If trunc(value) is outside [-2^31, 2^31), trap with integer overflow
/// 4. Push trunc(value) as i32
pub fn i32_trunc_f32_s(stack: &mut Stack) -> Result<(), RuntimeError> {
    let value = stack.pop_f32()?;
    let truncated = checked_trunc(value as f64, I32_S_BOUNDS)?;
    stack.push_i32(truncated as i32);
    Ok(())
}

/// i32.trunc_f32_u
pub fn i32_trunc_f32_u(stack: &mut Stack) -> Result<(), RuntimeError> {
    let value = stack.pop_f32()?;
    let truncated = checked_trunc(value as f64, U32_BOUNDS)?;
    stack.push_i32(truncated as u32 as i32);
    Ok(())
}

/// i32.trunc_f64_s
pub fn i32_trunc_f64_s(stack: &mut Stack) -> Result<(), RuntimeError> {
    let value = stack.pop_f64()?;
    let truncated = checked_trunc(value, I32_S_BOUNDS)?;
    stack.push_i32(truncated as i32);
    Ok(())
}

/// i32.trunc_f64_u
pub fn i32_trunc_f64_u(stack: &mut Stack) -> Result<(), RuntimeError> {
    let value = stack.pop_f64()?;
    let truncated = checked_trunc(value, U32_BOUNDS)?;
    stack.push_i32(truncated as u32 as i32);
    Ok(())
}

/// i64.trunc_f32_s
pub fn i64_trunc_f32_s(stack: &mut Stack) -> Result<(), RuntimeError> {
    let value = stack.pop_f32()?;
    let truncated = checked_trunc(value as f64, I64_S_BOUNDS)?;
    stack.push_i64(truncated as i64);
    Ok(())
}

/// i64.trunc_f32_u
pub fn i64_trunc_f32_u(stack: &mut Stack) -> Result<(), RuntimeError> {
    let value = stack.pop_f32()?;
    let truncated = checked_trunc(value as f64, U64_BOUNDS)?;
    stack.push_i64(truncated as u64 as i64);
    Ok(())
}

/// i64.trunc_f64_s
pub fn i64_trunc_f64_s(stack: &mut Stack) -> Result<(), RuntimeError> {
    let value = stack.pop_f64()?;
    let truncated = checked_trunc(value, I64_S_BOUNDS)?;
    stack.push_i64(truncated as i64);
    Ok(())
}

/// i64.trunc_f64_u
pub fn i64_trunc_f64_u(stack: &mut Stack) -> Result<(), RuntimeError> {
    let value = stack.pop_f64()?;
    let truncated = checked_trunc(value, U64_BOUNDS)?;
    stack.push_i64(truncated as u64 as i64);
    Ok(())
}

// ============================================================================
// Integer to Float Conversion
// ============================================================================

/// f32.convert_i32_s - Round to nearest, ties to even
pub fn f32_convert_i32_s(stack: &mut Stack) -> Result<(), RuntimeError> {
    let value = stack.pop_i32()?;
    stack.push_f32(value as f32);
    Ok(())
}

pub fn f32_convert_i32_u(stack: &mut Stack) -> Result<(), RuntimeError> {
    let value = stack.pop_u32()?;
    stack.push_f32(value as f32);
    Ok(())
}

pub fn f32_convert_i64_s(stack: &mut Stack) -> Result<(), RuntimeError> {
    let value = stack.pop_i64()?;
    stack.push_f32(value as f32);
    Ok(())
}

pub fn f32_convert_i64_u(stack: &mut Stack) -> Result<(), RuntimeError> {
    let value = stack.pop_u64()?;
    stack.push_f32(value as f32);
    Ok(())
}

/// f64.convert_i32_s - Exact for every i32
pub fn f64_convert_i32_s(stack: &mut Stack) -> Result<(), RuntimeError> {
    let value = stack.pop_i32()?;
    stack.push_f64(value as f64);
    Ok(())
}

pub fn f64_convert_i32_u(stack: &mut Stack) -> Result<(), RuntimeError> {
    let value = stack.pop_u32()?;
    stack.push_f64(value as f64);
    Ok(())
}

pub fn f64_convert_i64_s(stack: &mut Stack) -> Result<(), RuntimeError> {
    let value = stack.pop_i64()?;
    stack.push_f64(value as f64);
    Ok(())
}

pub fn f64_convert_i64_u(stack: &mut Stack) -> Result<(), RuntimeError> {
    let value = stack.pop_u64()?;
    stack.push_f64(value as f64);
    Ok(())
}

// ============================================================================
// Float Width Conversions
// ============================================================================

/// f32.demote_f64 - Round to nearest f32
pub fn f32_demote_f64(stack: &mut Stack) -> Result<(), RuntimeError> {
    let value = stack.pop_f64()?;
    stack.push_f32(value as f32);
    Ok(())
}

/// f64.promote_f32 - Exact
pub fn f64_promote_f32(stack: &mut Stack) -> Result<(), RuntimeError> {
    let value = stack.pop_f32()?;
    stack.push_f64(value as f64);
    Ok(())
}

// ============================================================================
// Reinterpretation
// ============================================================================

/// i32.reinterpret_f32, i64.reinterpret_f64, f32.reinterpret_i32, f64.reinterpret_i64
///
/// A cell already holds the raw bits of either type, so reinterpretation
/// leaves the operand untouched. The operand must still be present.
pub fn reinterpret(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.peek()?;
    Ok(())
}
