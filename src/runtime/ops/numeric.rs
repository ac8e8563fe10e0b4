//! Numeric instructions
//!
//! Constants, integer arithmetic and float arithmetic. Integer arithmetic
//! wraps modulo 2^N; division and remainder trap on a zero divisor and
//! signed division traps on `MIN / -1`.

use super::{Context, Flow, Instance, RuntimeError, Stack, Trap, Value};

// ============================================================================
// Constants
// ============================================================================

/// i32.const - Push a constant i32 value (signed LEB128 immediate)
pub fn i32_const(instance: &mut Instance, ctx: &mut Context) -> Result<Flow, RuntimeError> {
    let mut reader = ctx.immediates();
    let value = reader.read_vs32()?;
    instance.stack.push_i32(value);
    ctx.pc = reader.pos();
    Ok(Flow::Continue)
}

/// i64.const - Push a constant i64 value (signed LEB128 immediate)
pub fn i64_const(instance: &mut Instance, ctx: &mut Context) -> Result<Flow, RuntimeError> {
    let mut reader = ctx.immediates();
    let value = reader.read_vs64()?;
    instance.stack.push_i64(value);
    ctx.pc = reader.pos();
    Ok(Flow::Continue)
}

/// f32.const - Push a constant f32 value (4 bytes little-endian)
///
/// The bit pattern is pushed unchanged, so NaN payloads survive.
pub fn f32_const(instance: &mut Instance, ctx: &mut Context) -> Result<Flow, RuntimeError> {
    let mut reader = ctx.immediates();
    let value = reader.read_f32()?;
    instance.stack.push(Value::from_f32(value));
    ctx.pc = reader.pos();
    Ok(Flow::Continue)
}

/// f64.const - Push a constant f64 value (8 bytes little-endian)
pub fn f64_const(instance: &mut Instance, ctx: &mut Context) -> Result<Flow, RuntimeError> {
    let mut reader = ctx.immediates();
    let value = reader.read_f64()?;
    instance.stack.push(Value::from_f64(value));
    ctx.pc = reader.pos();
    Ok(Flow::Continue)
}

// ============================================================================
// i32 arithmetic
// ============================================================================

/// i32.clz - Count leading zero bits
pub fn i32_clz(stack: &mut Stack) -> Result<(), RuntimeError> {
    let value = stack.pop_u32()?;
    stack.push_i32(value.leading_zeros() as i32);
    Ok(())
}

/// i32.ctz - Count trailing zero bits
pub fn i32_ctz(stack: &mut Stack) -> Result<(), RuntimeError> {
    let value = stack.pop_u32()?;
    stack.push_i32(value.trailing_zeros() as i32);
    Ok(())
}

/// i32.popcnt - Count set bits
pub fn i32_popcnt(stack: &mut Stack) -> Result<(), RuntimeError> {
    let value = stack.pop_u32()?;
    stack.push_i32(value.count_ones() as i32);
    Ok(())
}

/// i32.add
/// 1. Pop value c2 from stack
/// 2. Pop value c1 from stack
/// 3. Push (c1 + c2) mod 2^32
pub fn i32_add(stack: &mut Stack) -> Result<(), RuntimeError> {
    let c2 = stack.pop_i32()?;
    let c1 = stack.pop_i32()?;
    stack.push_i32(c1.wrapping_add(c2));
    Ok(())
}

/// i32.sub
pub fn i32_sub(stack: &mut Stack) -> Result<(), RuntimeError> {
    let c2 = stack.pop_i32()?;
    let c1 = stack.pop_i32()?;
    stack.push_i32(c1.wrapping_sub(c2));
    Ok(())
}

/// i32.mul
pub fn i32_mul(stack: &mut Stack) -> Result<(), RuntimeError> {
    let c2 = stack.pop_i32()?;
    let c1 = stack.pop_i32()?;
    stack.push_i32(c1.wrapping_mul(c2));
    Ok(())
}

/// i32.div_s
/// 1. Pop value c2 from stack
/// 2. Pop value c1 from stack
/// 3. If c2 is 0, trap
/// 4. If c1 is i32::MIN and c2 is -1, trap (result is unrepresentable)
/// 5. Push c1 / c2, truncated toward zero
pub fn i32_div_s(stack: &mut Stack) -> Result<(), RuntimeError> {
    let c2 = stack.pop_i32()?;
    let c1 = stack.pop_i32()?;
    if c2 == 0 {
        return Err(Trap::DivisionByZero.into());
    }
    if c1 == i32::MIN && c2 == -1 {
        return Err(Trap::IntegerOverflow.into());
    }
    stack.push_i32(c1 / c2);
    Ok(())
}

/// i32.div_u
pub fn i32_div_u(stack: &mut Stack) -> Result<(), RuntimeError> {
    let c2 = stack.pop_u32()?;
    let c1 = stack.pop_u32()?;
    if c2 == 0 {
        return Err(Trap::DivisionByZero.into());
    }
    stack.push_i32((c1 / c2) as i32);
    Ok(())
}

/// i32.rem_s
///
/// The result takes the sign of the dividend. `MIN rem_s -1` is 0, not a trap.
pub fn i32_rem_s(stack: &mut Stack) -> Result<(), RuntimeError> {
    let c2 = stack.pop_i32()?;
    let c1 = stack.pop_i32()?;
    if c2 == 0 {
        return Err(Trap::DivisionByZero.into());
    }
    // any integer % ±1 = 0, and i32::MIN % -1 would overflow
    if c2 == 1 || c2 == -1 {
        stack.push_i32(0);
    } else {
        stack.push_i32(c1 % c2);
    }
    Ok(())
}

/// i32.rem_u
pub fn i32_rem_u(stack: &mut Stack) -> Result<(), RuntimeError> {
    let c2 = stack.pop_u32()?;
    let c1 = stack.pop_u32()?;
    if c2 == 0 {
        return Err(Trap::DivisionByZero.into());
    }
    stack.push_i32((c1 % c2) as i32);
    Ok(())
}

// ============================================================================
// i64 arithmetic
// ============================================================================

/// i64.clz
pub fn i64_clz(stack: &mut Stack) -> Result<(), RuntimeError> {
    let value = stack.pop_u64()?;
    stack.push_i64(value.leading_zeros() as i64);
    Ok(())
}

/// i64.ctz
pub fn i64_ctz(stack: &mut Stack) -> Result<(), RuntimeError> {
    let value = stack.pop_u64()?;
    stack.push_i64(value.trailing_zeros() as i64);
    Ok(())
}

/// i64.popcnt
pub fn i64_popcnt(stack: &mut Stack) -> Result<(), RuntimeError> {
    let value = stack.pop_u64()?;
    stack.push_i64(value.count_ones() as i64);
    Ok(())
}

/// i64.add
pub fn i64_add(stack: &mut Stack) -> Result<(), RuntimeError> {
    let c2 = stack.pop_i64()?;
    let c1 = stack.pop_i64()?;
    stack.push_i64(c1.wrapping_add(c2));
    Ok(())
}

/// i64.sub
pub fn i64_sub(stack: &mut Stack) -> Result<(), RuntimeError> {
    let c2 = stack.pop_i64()?;
    let c1 = stack.pop_i64()?;
    stack.push_i64(c1.wrapping_sub(c2));
    Ok(())
}

/// i64.mul
pub fn i64_mul(stack: &mut Stack) -> Result<(), RuntimeError> {
    let c2 = stack.pop_i64()?;
    let c1 = stack.pop_i64()?;
    stack.push_i64(c1.wrapping_mul(c2));
    Ok(())
}

/// i64.div_s
pub fn i64_div_s(stack: &mut Stack) -> Result<(), RuntimeError> {
    let c2 = stack.pop_i64()?;
    let c1 = stack.pop_i64()?;
    if c2 == 0 {
        return Err(Trap::DivisionByZero.into());
    }
    if c1 == i64::MIN && c2 == -1 {
        return Err(Trap::IntegerOverflow.into());
    }
    stack.push_i64(c1 / c2);
    Ok(())
}

/// i64.div_u
pub fn i64_div_u(stack: &mut Stack) -> Result<(), RuntimeError> {
    let c2 = stack.pop_u64()?;
    let c1 = stack.pop_u64()?;
    if c2 == 0 {
        return Err(Trap::DivisionByZero.into());
    }
    stack.push_i64((c1 / c2) as i64);
    Ok(())
}

/// i64.rem_s
pub fn i64_rem_s(stack: &mut Stack) -> Result<(), RuntimeError> {
    let c2 = stack.pop_i64()?;
    let c1 = stack.pop_i64()?;
    if c2 == 0 {
        return Err(Trap::DivisionByZero.into());
    }
    if c2 == 1 || c2 == -1 {
        stack.push_i64(0);
    } else {
        stack.push_i64(c1 % c2);
    }
    Ok(())
}

/// i64.rem_u
pub fn i64_rem_u(stack: &mut Stack) -> Result<(), RuntimeError> {
    let c2 = stack.pop_u64()?;
    let c1 = stack.pop_u64()?;
    if c2 == 0 {
        return Err(Trap::DivisionByZero.into());
    }
    stack.push_i64((c1 % c2) as i64);
    Ok(())
}

// ============================================================================
// Float min/max
// ============================================================================

/// IEEE minimum with NaN propagation and -0.0 < +0.0
fn fmin32(c1: f32, c2: f32) -> f32 {
    if c1.is_nan() || c2.is_nan() {
        f32::NAN
    } else if c1 == 0.0 && c2 == 0.0 && c1.is_sign_negative() != c2.is_sign_negative() {
        if c1.is_sign_negative() {
            c1
        } else {
            c2
        }
    } else {
        c1.min(c2)
    }
}

fn fmax32(c1: f32, c2: f32) -> f32 {
    if c1.is_nan() || c2.is_nan() {
        f32::NAN
    } else if c1 == 0.0 && c2 == 0.0 && c1.is_sign_negative() != c2.is_sign_negative() {
        if c1.is_sign_positive() {
            c1
        } else {
            c2
        }
    } else {
        c1.max(c2)
    }
}

fn fmin64(c1: f64, c2: f64) -> f64 {
    if c1.is_nan() || c2.is_nan() {
        f64::NAN
    } else if c1 == 0.0 && c2 == 0.0 && c1.is_sign_negative() != c2.is_sign_negative() {
        if c1.is_sign_negative() {
            c1
        } else {
            c2
        }
    } else {
        c1.min(c2)
    }
}

fn fmax64(c1: f64, c2: f64) -> f64 {
    if c1.is_nan() || c2.is_nan() {
        f64::NAN
    } else if c1 == 0.0 && c2 == 0.0 && c1.is_sign_negative() != c2.is_sign_negative() {
        if c1.is_sign_positive() {
            c1
        } else {
            c2
        }
    } else {
        c1.max(c2)
    }
}

// ============================================================================
// f32 arithmetic
// ============================================================================

/// f32.abs - Clear the sign bit, NaN payload included
pub fn f32_abs(stack: &mut Stack) -> Result<(), RuntimeError> {
    let value = stack.pop_f32()?;
    stack.push_f32(value.abs());
    Ok(())
}

/// f32.neg - Flip the sign bit
pub fn f32_neg(stack: &mut Stack) -> Result<(), RuntimeError> {
    let value = stack.pop_f32()?;
    stack.push_f32(-value);
    Ok(())
}

/// f32.ceil
pub fn f32_ceil(stack: &mut Stack) -> Result<(), RuntimeError> {
    let value = stack.pop_f32()?;
    stack.push_f32(value.ceil());
    Ok(())
}

/// f32.floor
pub fn f32_floor(stack: &mut Stack) -> Result<(), RuntimeError> {
    let value = stack.pop_f32()?;
    stack.push_f32(value.floor());
    Ok(())
}

/// f32.trunc - Round toward zero
pub fn f32_trunc(stack: &mut Stack) -> Result<(), RuntimeError> {
    let value = stack.pop_f32()?;
    stack.push_f32(value.trunc());
    Ok(())
}

/// f32.nearest - Round to nearest, ties to even
pub fn f32_nearest(stack: &mut Stack) -> Result<(), RuntimeError> {
    let value = stack.pop_f32()?;
    stack.push_f32(value.round_ties_even());
    Ok(())
}

/// f32.sqrt
pub fn f32_sqrt(stack: &mut Stack) -> Result<(), RuntimeError> {
    let value = stack.pop_f32()?;
    stack.push_f32(value.sqrt());
    Ok(())
}

/// f32.add
/// 1. Pop value c2 from stack
/// 2. Pop value c1 from stack
/// 3. Push c1 + c2, rounded to nearest
pub fn f32_add(stack: &mut Stack) -> Result<(), RuntimeError> {
    let c2 = stack.pop_f32()?;
    let c1 = stack.pop_f32()?;
    stack.push_f32(c1 + c2);
    Ok(())
}

/// f32.sub
pub fn f32_sub(stack: &mut Stack) -> Result<(), RuntimeError> {
    let c2 = stack.pop_f32()?;
    let c1 = stack.pop_f32()?;
    stack.push_f32(c1 - c2);
    Ok(())
}

/// f32.mul
pub fn f32_mul(stack: &mut Stack) -> Result<(), RuntimeError> {
    let c2 = stack.pop_f32()?;
    let c1 = stack.pop_f32()?;
    stack.push_f32(c1 * c2);
    Ok(())
}

/// f32.div - Never traps; x/0 is ±inf and 0/0 is NaN
pub fn f32_div(stack: &mut Stack) -> Result<(), RuntimeError> {
    let c2 = stack.pop_f32()?;
    let c1 = stack.pop_f32()?;
    stack.push_f32(c1 / c2);
    Ok(())
}

/// f32.min - NaN if either operand is NaN
pub fn f32_min(stack: &mut Stack) -> Result<(), RuntimeError> {
    let c2 = stack.pop_f32()?;
    let c1 = stack.pop_f32()?;
    stack.push_f32(fmin32(c1, c2));
    Ok(())
}

/// f32.max - NaN if either operand is NaN
pub fn f32_max(stack: &mut Stack) -> Result<(), RuntimeError> {
    let c2 = stack.pop_f32()?;
    let c1 = stack.pop_f32()?;
    stack.push_f32(fmax32(c1, c2));
    Ok(())
}

/// f32.copysign - Magnitude of c1 with the sign of c2
pub fn f32_copysign(stack: &mut Stack) -> Result<(), RuntimeError> {
    let c2 = stack.pop_f32()?;
    let c1 = stack.pop_f32()?;
    stack.push_f32(c1.copysign(c2));
    Ok(())
}

// ============================================================================
// f64 arithmetic
// ============================================================================

pub fn f64_abs(stack: &mut Stack) -> Result<(), RuntimeError> {
    let value = stack.pop_f64()?;
    stack.push_f64(value.abs());
    Ok(())
}

pub fn f64_neg(stack: &mut Stack) -> Result<(), RuntimeError> {
    let value = stack.pop_f64()?;
    stack.push_f64(-value);
    Ok(())
}

pub fn f64_ceil(stack: &mut Stack) -> Result<(), RuntimeError> {
    let value = stack.pop_f64()?;
    stack.push_f64(value.ceil());
    Ok(())
}

pub fn f64_floor(stack: &mut Stack) -> Result<(), RuntimeError> {
    let value = stack.pop_f64()?;
    stack.push_f64(value.floor());
    Ok(())
}

pub fn f64_trunc(stack: &mut Stack) -> Result<(), RuntimeError> {
    let value = stack.pop_f64()?;
    stack.push_f64(value.trunc());
    Ok(())
}

/// f64.nearest - Round to nearest, ties to even
pub fn f64_nearest(stack: &mut Stack) -> Result<(), RuntimeError> {
    let value = stack.pop_f64()?;
    stack.push_f64(value.round_ties_even());
    Ok(())
}

pub fn f64_sqrt(stack: &mut Stack) -> Result<(), RuntimeError> {
    let value = stack.pop_f64()?;
    stack.push_f64(value.sqrt());
    Ok(())
}

pub fn f64_add(stack: &mut Stack) -> Result<(), RuntimeError> {
    let c2 = stack.pop_f64()?;
    let c1 = stack.pop_f64()?;
    stack.push_f64(c1 + c2);
    Ok(())
}

pub fn f64_sub(stack: &mut Stack) -> Result<(), RuntimeError> {
    let c2 = stack.pop_f64()?;
    let c1 = stack.pop_f64()?;
    stack.push_f64(c1 - c2);
    Ok(())
}

pub fn f64_mul(stack: &mut Stack) -> Result<(), RuntimeError> {
    let c2 = stack.pop_f64()?;
    let c1 = stack.pop_f64()?;
    stack.push_f64(c1 * c2);
    Ok(())
}

pub fn f64_div(stack: &mut Stack) -> Result<(), RuntimeError> {
    let c2 = stack.pop_f64()?;
    let c1 = stack.pop_f64()?;
    stack.push_f64(c1 / c2);
    Ok(())
}

pub fn f64_min(stack: &mut Stack) -> Result<(), RuntimeError> {
    let c2 = stack.pop_f64()?;
    let c1 = stack.pop_f64()?;
    stack.push_f64(fmin64(c1, c2));
    Ok(())
}

pub fn f64_max(stack: &mut Stack) -> Result<(), RuntimeError> {
    let c2 = stack.pop_f64()?;
    let c1 = stack.pop_f64()?;
    stack.push_f64(fmax64(c1, c2));
    Ok(())
}

pub fn f64_copysign(stack: &mut Stack) -> Result<(), RuntimeError> {
    let c2 = stack.pop_f64()?;
    let c1 = stack.pop_f64()?;
    stack.push_f64(c1.copysign(c2));
    Ok(())
}
