//! WebAssembly instruction executor
//!
//! Execution is a fetch/decode/execute loop over a function body: read the
//! opcode byte at `pc`, look its handler up in a 256-entry dispatch table and
//! run it. Every handler moves `pc` past itself and its immediates, or to a
//! branch target. A `call` runs the callee's loop to completion before the
//! caller's loop resumes, so nested calls are ordinary recursion bounded by
//! [`EngineConfig::max_call_depth`](crate::config::EngineConfig).

use super::control::{Label, LabelKind};
use super::frame::Context;
use super::opcode::*;
use super::ops::{bitwise, comparison, control, conversion, memory, numeric, parametric, variable};
use super::{DefinedFunction, Fault, Instance, RuntimeError, Trap};
use once_cell::sync::Lazy;
use std::rc::Rc;

/// What the dispatch loop does after a handler returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Fetch the instruction at the updated `pc`
    Continue,
    /// Leave the current function
    Return,
}

/// An instruction handler
pub type Handler = fn(&mut Instance, &mut Context) -> Result<Flow, RuntimeError>;

/// Adapt an operand-stack-only operation to a handler that steps over its opcode
macro_rules! stack_op {
    ($f:path) => {{
        fn handler(instance: &mut Instance, ctx: &mut Context) -> Result<Flow, RuntimeError> {
            $f(&mut instance.stack)?;
            ctx.pc += 1;
            Ok(Flow::Continue)
        }
        handler as Handler
    }};
}

/// Adapt a load to a handler that decodes its memarg
macro_rules! load_op {
    ($f:path) => {{
        fn handler(instance: &mut Instance, ctx: &mut Context) -> Result<Flow, RuntimeError> {
            let mut reader = ctx.immediates();
            let memarg = reader.read_memarg()?;
            let next = reader.pos();
            let shared = instance.memory.as_ref().ok_or(Fault::MissingMemory)?;
            $f(&mut instance.stack, &shared.borrow(), memarg)?;
            ctx.pc = next;
            Ok(Flow::Continue)
        }
        handler as Handler
    }};
}

macro_rules! store_op {
    ($f:path) => {{
        fn handler(instance: &mut Instance, ctx: &mut Context) -> Result<Flow, RuntimeError> {
            let mut reader = ctx.immediates();
            let memarg = reader.read_memarg()?;
            let next = reader.pos();
            let shared = instance.memory.as_ref().ok_or(Fault::MissingMemory)?;
            $f(&mut instance.stack, &mut shared.borrow_mut(), memarg)?;
            ctx.pc = next;
            Ok(Flow::Continue)
        }
        handler as Handler
    }};
}

/// memory.size and memory.grow carry one reserved byte
fn memory_size(instance: &mut Instance, ctx: &mut Context) -> Result<Flow, RuntimeError> {
    let mut reader = ctx.immediates();
    reader.read_u8()?;
    let next = reader.pos();
    let shared = instance.memory.as_ref().ok_or(Fault::MissingMemory)?;
    memory::memory_size(&mut instance.stack, &shared.borrow())?;
    ctx.pc = next;
    Ok(Flow::Continue)
}

fn memory_grow(instance: &mut Instance, ctx: &mut Context) -> Result<Flow, RuntimeError> {
    let mut reader = ctx.immediates();
    reader.read_u8()?;
    let next = reader.pos();
    let shared = instance.memory.as_ref().ok_or(Fault::MissingMemory)?;
    memory::memory_grow(&mut instance.stack, &mut shared.borrow_mut())?;
    ctx.pc = next;
    Ok(Flow::Continue)
}

/// Opcode-indexed handler table; `None` marks opcodes this engine does not execute
static DISPATCH: Lazy<[Option<Handler>; 256]> = Lazy::new(|| {
    let mut table: [Option<Handler>; 256] = [None; 256];
    let mut register = |opcode: u8, handler: Handler| table[opcode as usize] = Some(handler);

    // Control
    register(UNREACHABLE, control::unreachable);
    register(NOP, control::nop);
    register(BLOCK, control::block);
    register(LOOP, control::loop_);
    register(IF, control::if_);
    register(ELSE, control::else_);
    register(END, control::end);
    register(BR, control::br);
    register(BR_IF, control::br_if);
    register(BR_TABLE, control::br_table);
    register(RETURN, control::return_);
    register(CALL, control::call);
    register(CALL_INDIRECT, control::call_indirect);

    // Parametric
    register(DROP, stack_op!(parametric::drop));
    register(SELECT, stack_op!(parametric::select));

    // Variable
    register(LOCAL_GET, variable::local_get);
    register(LOCAL_SET, variable::local_set);
    register(LOCAL_TEE, variable::local_tee);
    register(GLOBAL_GET, variable::global_get);
    register(GLOBAL_SET, variable::global_set);

    // Memory
    register(I32_LOAD, load_op!(memory::i32_load));
    register(I64_LOAD, load_op!(memory::i64_load));
    register(F32_LOAD, load_op!(memory::f32_load));
    register(F64_LOAD, load_op!(memory::f64_load));
    register(I32_LOAD8_S, load_op!(memory::i32_load8_s));
    register(I32_LOAD8_U, load_op!(memory::i32_load8_u));
    register(I32_LOAD16_S, load_op!(memory::i32_load16_s));
    register(I32_LOAD16_U, load_op!(memory::i32_load16_u));
    register(I64_LOAD8_S, load_op!(memory::i64_load8_s));
    register(I64_LOAD8_U, load_op!(memory::i64_load8_u));
    register(I64_LOAD16_S, load_op!(memory::i64_load16_s));
    register(I64_LOAD16_U, load_op!(memory::i64_load16_u));
    register(I64_LOAD32_S, load_op!(memory::i64_load32_s));
    register(I64_LOAD32_U, load_op!(memory::i64_load32_u));
    register(I32_STORE, store_op!(memory::i32_store));
    register(I64_STORE, store_op!(memory::i64_store));
    register(F32_STORE, store_op!(memory::f32_store));
    register(F64_STORE, store_op!(memory::f64_store));
    register(I32_STORE8, store_op!(memory::i32_store8));
    register(I32_STORE16, store_op!(memory::i32_store16));
    register(I64_STORE8, store_op!(memory::i64_store8));
    register(I64_STORE16, store_op!(memory::i64_store16));
    register(I64_STORE32, store_op!(memory::i64_store32));
    register(MEMORY_SIZE, memory_size);
    register(MEMORY_GROW, memory_grow);

    // Constants
    register(I32_CONST, numeric::i32_const);
    register(I64_CONST, numeric::i64_const);
    register(F32_CONST, numeric::f32_const);
    register(F64_CONST, numeric::f64_const);

    // i32 comparison
    register(I32_EQZ, stack_op!(comparison::i32_eqz));
    register(I32_EQ, stack_op!(comparison::i32_eq));
    register(I32_NE, stack_op!(comparison::i32_ne));
    register(I32_LT_S, stack_op!(comparison::i32_lt_s));
    register(I32_LT_U, stack_op!(comparison::i32_lt_u));
    register(I32_GT_S, stack_op!(comparison::i32_gt_s));
    register(I32_GT_U, stack_op!(comparison::i32_gt_u));
    register(I32_LE_S, stack_op!(comparison::i32_le_s));
    register(I32_LE_U, stack_op!(comparison::i32_le_u));
    register(I32_GE_S, stack_op!(comparison::i32_ge_s));
    register(I32_GE_U, stack_op!(comparison::i32_ge_u));

    // i64 comparison
    register(I64_EQZ, stack_op!(comparison::i64_eqz));
    register(I64_EQ, stack_op!(comparison::i64_eq));
    register(I64_NE, stack_op!(comparison::i64_ne));
    register(I64_LT_S, stack_op!(comparison::i64_lt_s));
    register(I64_LT_U, stack_op!(comparison::i64_lt_u));
    register(I64_GT_S, stack_op!(comparison::i64_gt_s));
    register(I64_GT_U, stack_op!(comparison::i64_gt_u));
    register(I64_LE_S, stack_op!(comparison::i64_le_s));
    register(I64_LE_U, stack_op!(comparison::i64_le_u));
    register(I64_GE_S, stack_op!(comparison::i64_ge_s));
    register(I64_GE_U, stack_op!(comparison::i64_ge_u));

    // Float comparison
    register(F32_EQ, stack_op!(comparison::f32_eq));
    register(F32_NE, stack_op!(comparison::f32_ne));
    register(F32_LT, stack_op!(comparison::f32_lt));
    register(F32_GT, stack_op!(comparison::f32_gt));
    register(F32_LE, stack_op!(comparison::f32_le));
    register(F32_GE, stack_op!(comparison::f32_ge));
    register(F64_EQ, stack_op!(comparison::f64_eq));
    register(F64_NE, stack_op!(comparison::f64_ne));
    register(F64_LT, stack_op!(comparison::f64_lt));
    register(F64_GT, stack_op!(comparison::f64_gt));
    register(F64_LE, stack_op!(comparison::f64_le));
    register(F64_GE, stack_op!(comparison::f64_ge));

    // i32 arithmetic
    register(I32_CLZ, stack_op!(numeric::i32_clz));
    register(I32_CTZ, stack_op!(numeric::i32_ctz));
    register(I32_POPCNT, stack_op!(numeric::i32_popcnt));
    register(I32_ADD, stack_op!(numeric::i32_add));
    register(I32_SUB, stack_op!(numeric::i32_sub));
    register(I32_MUL, stack_op!(numeric::i32_mul));
    register(I32_DIV_S, stack_op!(numeric::i32_div_s));
    register(I32_DIV_U, stack_op!(numeric::i32_div_u));
    register(I32_REM_S, stack_op!(numeric::i32_rem_s));
    register(I32_REM_U, stack_op!(numeric::i32_rem_u));
    register(I32_AND, stack_op!(bitwise::i32_and));
    register(I32_OR, stack_op!(bitwise::i32_or));
    register(I32_XOR, stack_op!(bitwise::i32_xor));
    register(I32_SHL, stack_op!(bitwise::i32_shl));
    register(I32_SHR_S, stack_op!(bitwise::i32_shr_s));
    register(I32_SHR_U, stack_op!(bitwise::i32_shr_u));
    register(I32_ROTL, stack_op!(bitwise::i32_rotl));
    register(I32_ROTR, stack_op!(bitwise::i32_rotr));

    // i64 arithmetic
    register(I64_CLZ, stack_op!(numeric::i64_clz));
    register(I64_CTZ, stack_op!(numeric::i64_ctz));
    register(I64_POPCNT, stack_op!(numeric::i64_popcnt));
    register(I64_ADD, stack_op!(numeric::i64_add));
    register(I64_SUB, stack_op!(numeric::i64_sub));
    register(I64_MUL, stack_op!(numeric::i64_mul));
    register(I64_DIV_S, stack_op!(numeric::i64_div_s));
    register(I64_DIV_U, stack_op!(numeric::i64_div_u));
    register(I64_REM_S, stack_op!(numeric::i64_rem_s));
    register(I64_REM_U, stack_op!(numeric::i64_rem_u));
    register(I64_AND, stack_op!(bitwise::i64_and));
    register(I64_OR, stack_op!(bitwise::i64_or));
    register(I64_XOR, stack_op!(bitwise::i64_xor));
    register(I64_SHL, stack_op!(bitwise::i64_shl));
    register(I64_SHR_S, stack_op!(bitwise::i64_shr_s));
    register(I64_SHR_U, stack_op!(bitwise::i64_shr_u));
    register(I64_ROTL, stack_op!(bitwise::i64_rotl));
    register(I64_ROTR, stack_op!(bitwise::i64_rotr));

    // f32 arithmetic
    register(F32_ABS, stack_op!(numeric::f32_abs));
    register(F32_NEG, stack_op!(numeric::f32_neg));
    register(F32_CEIL, stack_op!(numeric::f32_ceil));
    register(F32_FLOOR, stack_op!(numeric::f32_floor));
    register(F32_TRUNC, stack_op!(numeric::f32_trunc));
    register(F32_NEAREST, stack_op!(numeric::f32_nearest));
    register(F32_SQRT, stack_op!(numeric::f32_sqrt));
    register(F32_ADD, stack_op!(numeric::f32_add));
    register(F32_SUB, stack_op!(numeric::f32_sub));
    register(F32_MUL, stack_op!(numeric::f32_mul));
    register(F32_DIV, stack_op!(numeric::f32_div));
    register(F32_MIN, stack_op!(numeric::f32_min));
    register(F32_MAX, stack_op!(numeric::f32_max));
    register(F32_COPYSIGN, stack_op!(numeric::f32_copysign));

    // f64 arithmetic
    register(F64_ABS, stack_op!(numeric::f64_abs));
    register(F64_NEG, stack_op!(numeric::f64_neg));
    register(F64_CEIL, stack_op!(numeric::f64_ceil));
    register(F64_FLOOR, stack_op!(numeric::f64_floor));
    register(F64_TRUNC, stack_op!(numeric::f64_trunc));
    register(F64_NEAREST, stack_op!(numeric::f64_nearest));
    register(F64_SQRT, stack_op!(numeric::f64_sqrt));
    register(F64_ADD, stack_op!(numeric::f64_add));
    register(F64_SUB, stack_op!(numeric::f64_sub));
    register(F64_MUL, stack_op!(numeric::f64_mul));
    register(F64_DIV, stack_op!(numeric::f64_div));
    register(F64_MIN, stack_op!(numeric::f64_min));
    register(F64_MAX, stack_op!(numeric::f64_max));
    register(F64_COPYSIGN, stack_op!(numeric::f64_copysign));

    // Conversions
    register(I32_WRAP_I64, stack_op!(conversion::i32_wrap_i64));
    register(I32_TRUNC_F32_S, stack_op!(conversion::i32_trunc_f32_s));
    register(I32_TRUNC_F32_U, stack_op!(conversion::i32_trunc_f32_u));
    register(I32_TRUNC_F64_S, stack_op!(conversion::i32_trunc_f64_s));
    register(I32_TRUNC_F64_U, stack_op!(conversion::i32_trunc_f64_u));
    register(I64_EXTEND_I32_S, stack_op!(conversion::i64_extend_i32_s));
    register(I64_EXTEND_I32_U, stack_op!(conversion::i64_extend_i32_u));
    register(I64_TRUNC_F32_S, stack_op!(conversion::i64_trunc_f32_s));
    register(I64_TRUNC_F32_U, stack_op!(conversion::i64_trunc_f32_u));
    register(I64_TRUNC_F64_S, stack_op!(conversion::i64_trunc_f64_s));
    register(I64_TRUNC_F64_U, stack_op!(conversion::i64_trunc_f64_u));
    register(F32_CONVERT_I32_S, stack_op!(conversion::f32_convert_i32_s));
    register(F32_CONVERT_I32_U, stack_op!(conversion::f32_convert_i32_u));
    register(F32_CONVERT_I64_S, stack_op!(conversion::f32_convert_i64_s));
    register(F32_CONVERT_I64_U, stack_op!(conversion::f32_convert_i64_u));
    register(F32_DEMOTE_F64, stack_op!(conversion::f32_demote_f64));
    register(F64_CONVERT_I32_S, stack_op!(conversion::f64_convert_i32_s));
    register(F64_CONVERT_I32_U, stack_op!(conversion::f64_convert_i32_u));
    register(F64_CONVERT_I64_S, stack_op!(conversion::f64_convert_i64_s));
    register(F64_CONVERT_I64_U, stack_op!(conversion::f64_convert_i64_u));
    register(F64_PROMOTE_F32, stack_op!(conversion::f64_promote_f32));
    register(I32_REINTERPRET_F32, stack_op!(conversion::reinterpret));
    register(I64_REINTERPRET_F64, stack_op!(conversion::reinterpret));
    register(F32_REINTERPRET_I32, stack_op!(conversion::reinterpret));
    register(F64_REINTERPRET_I64, stack_op!(conversion::reinterpret));

    // Sign extension
    register(I32_EXTEND8_S, stack_op!(conversion::i32_extend8_s));
    register(I32_EXTEND16_S, stack_op!(conversion::i32_extend16_s));
    register(I64_EXTEND8_S, stack_op!(conversion::i64_extend8_s));
    register(I64_EXTEND16_S, stack_op!(conversion::i64_extend16_s));
    register(I64_EXTEND32_S, stack_op!(conversion::i64_extend32_s));

    table
});

/// Handler registered for `opcode`, if any
pub fn handler(opcode: u8) -> Option<Handler> {
    DISPATCH[opcode as usize]
}

/// Run a defined function whose arguments are on top of the operand stack
///
/// On success the function's results replace its arguments on the stack.
pub fn invoke_defined(instance: &mut Instance, func: Rc<DefinedFunction>) -> Result<(), RuntimeError> {
    if instance.call_depth >= instance.config.max_call_depth {
        return Err(Trap::CallStackExhausted.into());
    }

    let params = func.signature().params.len();
    let arity = func.signature().results.len();
    let args = instance.stack.pop_n(params)?;
    let base = instance.stack.depth();

    let mut ctx = Context::new(func, args);
    ctx.labels.push(Label {
        kind: LabelKind::Function,
        height: base,
        arity,
        target: ctx.func.body().len(),
    });

    instance.call_depth += 1;
    let result = execute(instance, &mut ctx);
    instance.call_depth -= 1;
    result?;

    // Whatever the body left beneath its results belongs to no one
    instance.stack.unwind(base, arity)
}

/// The dispatch loop: run `ctx` until its body ends or a handler returns
pub fn execute(instance: &mut Instance, ctx: &mut Context) -> Result<(), RuntimeError> {
    let body_len = ctx.func.body().len();

    while ctx.pc < body_len {
        let opcode = ctx.func.body()[ctx.pc];

        if let Some(budget) = instance.budget.as_mut() {
            if *budget == 0 {
                return Err(RuntimeError::InstructionBudgetExhausted);
            }
            *budget -= 1;
        }

        let op = handler(opcode).ok_or(Fault::UnknownOpcode {
            opcode,
            offset: ctx.pc,
        })?;
        log::trace!("{:#06x}: {:#04x} (stack depth {})", ctx.pc, opcode, instance.stack.depth());

        match op(instance, ctx) {
            Ok(Flow::Continue) => {}
            Ok(Flow::Return) => return Ok(()),
            Err(e) => {
                if let RuntimeError::Trap(trap) = &e {
                    log::debug!("trap at {:#06x}: {trap}", ctx.pc);
                }
                return Err(e);
            }
        }
    }
    Ok(())
}
