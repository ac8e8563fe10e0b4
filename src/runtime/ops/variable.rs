//! Variable operations
//!
//! Locals live in the current [`Context`]: parameters first, then declared
//! locals. Globals live in the [`Instance`] and are shared with host
//! functions. Every handler reads its u32 index immediate and moves `pc`
//! past it.

use super::*;

/// local.get x - Push the value of local x
pub fn local_get(instance: &mut Instance, ctx: &mut Context) -> Result<Flow, RuntimeError> {
    let mut reader = ctx.immediates();
    let local_idx = reader.read_vu32()?;
    let next = reader.pos();

    let value = ctx.local(local_idx)?;
    instance.stack.push(value);
    ctx.pc = next;
    Ok(Flow::Continue)
}

/// local.set x - Pop a value into local x
pub fn local_set(instance: &mut Instance, ctx: &mut Context) -> Result<Flow, RuntimeError> {
    let mut reader = ctx.immediates();
    let local_idx = reader.read_vu32()?;
    let next = reader.pos();

    let value = instance.stack.pop()?;
    ctx.set_local(local_idx, value)?;
    ctx.pc = next;
    Ok(Flow::Continue)
}

/// local.tee x - Set local x but keep the value on the stack
pub fn local_tee(instance: &mut Instance, ctx: &mut Context) -> Result<Flow, RuntimeError> {
    let mut reader = ctx.immediates();
    let local_idx = reader.read_vu32()?;
    let next = reader.pos();

    let value = instance.stack.peek()?;
    ctx.set_local(local_idx, value)?;
    ctx.pc = next;
    Ok(Flow::Continue)
}

/// global.get x - Push the value of global x
pub fn global_get(instance: &mut Instance, ctx: &mut Context) -> Result<Flow, RuntimeError> {
    let mut reader = ctx.immediates();
    let global_idx = reader.read_vu32()?;
    let next = reader.pos();

    let value = instance.global(global_idx)?;
    instance.stack.push(value);
    ctx.pc = next;
    Ok(Flow::Continue)
}

/// global.set x - Pop a value into global x
///
/// The write is visible to host functions immediately.
pub fn global_set(instance: &mut Instance, ctx: &mut Context) -> Result<Flow, RuntimeError> {
    let mut reader = ctx.immediates();
    let global_idx = reader.read_vu32()?;
    let next = reader.pos();

    let value = instance.stack.pop()?;
    instance.set_global(global_idx, value)?;
    ctx.pc = next;
    Ok(Flow::Continue)
}
