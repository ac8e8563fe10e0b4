//! Parametric operations
//!
//! `drop` and `select` work on operands of any type; the cells are moved
//! without being interpreted.

use super::*;

/// drop - Drop value from stack
/// 1. Pop the value val from the stack.
pub fn drop(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.pop()?;
    Ok(())
}

/// select - Select one of two values based on condition
/// 1. Pop the i32 condition c
/// 2. Pop val2, then val1
/// 3. Push val1 if c is non-zero, otherwise val2
pub fn select(stack: &mut Stack) -> Result<(), RuntimeError> {
    let condition = stack.pop_i32()?;
    let val2 = stack.pop()?;
    let val1 = stack.pop()?;
    stack.push(if condition != 0 { val1 } else { val2 });
    Ok(())
}
