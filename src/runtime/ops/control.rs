//! Control instructions
//!
//! Structured control flow runs on the label stack of the current
//! [`Context`]. Entering `block`, `loop` or `if` pushes a [`Label`]; `end`
//! pops it; a branch to depth `n` removes the innermost `n + 1` labels,
//! keeps the target's arity worth of values on top of the operand stack,
//! and jumps to the target. Matching `else`/`end` offsets come from the
//! function's block map, so no handler scans the body.

use super::*;
use crate::runtime::code::BlockType;
use crate::runtime::control::{Label, LabelKind};

/// Parameter and result counts of a block type
fn block_arity(instance: &Instance, block_type: BlockType) -> Result<(usize, usize), RuntimeError> {
    match block_type {
        BlockType::Empty => Ok((0, 0)),
        BlockType::Value(_) => Ok((0, 1)),
        BlockType::TypeIndex(idx) => {
            let ty = instance.func_type(idx)?;
            Ok((ty.params.len(), ty.results.len()))
        }
    }
}

/// Operand stack height below a construct's parameters
fn entry_height(stack: &Stack, params: usize) -> Result<usize, RuntimeError> {
    stack
        .depth()
        .checked_sub(params)
        .ok_or_else(|| Fault::StackUnderflow.into())
}

/// Branch to the label `depth` levels out
fn branch(instance: &mut Instance, ctx: &mut Context, depth: u32) -> Result<Flow, RuntimeError> {
    let label = ctx.labels.unwind(depth).ok_or(Fault::InvalidLabel(depth))?;
    instance.stack.unwind(label.height, label.arity)?;
    ctx.pc = label.target;
    Ok(Flow::Continue)
}

/// unreachable - Trap unconditionally
pub fn unreachable(_instance: &mut Instance, _ctx: &mut Context) -> Result<Flow, RuntimeError> {
    Err(Trap::Unreachable.into())
}

/// nop
pub fn nop(_instance: &mut Instance, ctx: &mut Context) -> Result<Flow, RuntimeError> {
    ctx.pc += 1;
    Ok(Flow::Continue)
}

/// block bt - Enter a block; branches continue after its `end`
pub fn block(instance: &mut Instance, ctx: &mut Context) -> Result<Flow, RuntimeError> {
    let start = ctx.pc;
    let mut reader = ctx.immediates();
    let block_type = reader.read_block_type()?;
    let next = reader.pos();

    let (params, results) = block_arity(instance, block_type)?;
    let info = *ctx.func.block(start)?;
    let height = entry_height(&instance.stack, params)?;
    ctx.labels.push(Label {
        kind: LabelKind::Block,
        height,
        arity: results,
        target: info.end_at + 1,
    });
    ctx.pc = next;
    Ok(Flow::Continue)
}

/// loop bt - Enter a loop; branches re-enter at the `loop` instruction
///
/// A branch to a loop carries the loop's parameters, not its results.
/// Re-executing the `loop` opcode pushes a fresh label for the next
/// iteration.
pub fn loop_(instance: &mut Instance, ctx: &mut Context) -> Result<Flow, RuntimeError> {
    let start = ctx.pc;
    let mut reader = ctx.immediates();
    let block_type = reader.read_block_type()?;
    let next = reader.pos();

    let (params, _) = block_arity(instance, block_type)?;
    let height = entry_height(&instance.stack, params)?;
    ctx.labels.push(Label {
        kind: LabelKind::Loop,
        height,
        arity: params,
        target: start,
    });
    ctx.pc = next;
    Ok(Flow::Continue)
}

/// if bt - Pop an i32 condition and enter the "then" or "else" arm
///
/// 1. Pop the condition c
/// 2. Push a label whose branch target is just past the matching `end`
/// 3. If c is non-zero, continue with the "then" arm
/// 4. Otherwise jump into the "else" arm, or onto the `end` when there is none
pub fn if_(instance: &mut Instance, ctx: &mut Context) -> Result<Flow, RuntimeError> {
    let start = ctx.pc;
    let mut reader = ctx.immediates();
    let block_type = reader.read_block_type()?;
    let next = reader.pos();

    let condition = instance.stack.pop_i32()?;
    let (params, results) = block_arity(instance, block_type)?;
    let info = *ctx.func.block(start)?;
    let height = entry_height(&instance.stack, params)?;

    let mut label = Label {
        kind: LabelKind::IfThen,
        height,
        arity: results,
        target: info.end_at + 1,
    };
    if condition != 0 {
        ctx.pc = next;
    } else if let Some(else_at) = info.else_at {
        label.kind = LabelKind::IfElse;
        ctx.pc = else_at + 1;
    } else {
        ctx.pc = info.end_at;
    }
    ctx.labels.push(label);
    Ok(Flow::Continue)
}

/// else - Reached when the "then" arm finishes; skip the "else" arm
pub fn else_(_instance: &mut Instance, ctx: &mut Context) -> Result<Flow, RuntimeError> {
    match ctx.labels.pop() {
        Some(label) if label.kind == LabelKind::IfThen => {
            ctx.pc = label.target;
            Ok(Flow::Continue)
        }
        _ => Err(Fault::UnbalancedBlock(ctx.pc).into()),
    }
}

/// end - Leave the innermost construct
///
/// The construct's results are already on top of the operand stack. The
/// function's own closing `end` pops the function label and runs execution
/// off the end of the body.
pub fn end(_instance: &mut Instance, ctx: &mut Context) -> Result<Flow, RuntimeError> {
    ctx.labels.pop().ok_or(Fault::UnbalancedBlock(ctx.pc))?;
    ctx.pc += 1;
    Ok(Flow::Continue)
}

/// br l - Unconditional branch
pub fn br(instance: &mut Instance, ctx: &mut Context) -> Result<Flow, RuntimeError> {
    let depth = ctx.immediates().read_vu32()?;
    branch(instance, ctx, depth)
}

/// br_if l - Pop an i32 and branch if it is non-zero
pub fn br_if(instance: &mut Instance, ctx: &mut Context) -> Result<Flow, RuntimeError> {
    let mut reader = ctx.immediates();
    let depth = reader.read_vu32()?;
    let next = reader.pos();

    if instance.stack.pop_i32()? != 0 {
        branch(instance, ctx, depth)
    } else {
        ctx.pc = next;
        Ok(Flow::Continue)
    }
}

/// br_table l* l_default - Pop an index and branch to the selected label
///
/// An index past the end of the table selects the default.
pub fn br_table(instance: &mut Instance, ctx: &mut Context) -> Result<Flow, RuntimeError> {
    let (targets, default) = ctx.immediates().read_br_table()?;
    let index = instance.stack.pop_u32()?;
    let depth = targets.get(index as usize).copied().unwrap_or(default);
    branch(instance, ctx, depth)
}

/// return - Leave the current function
///
/// The caller keeps the function's results and discards the rest of the
/// activation's operands.
pub fn return_(_instance: &mut Instance, _ctx: &mut Context) -> Result<Flow, RuntimeError> {
    Ok(Flow::Return)
}

/// call x - Call function x with arguments from the operand stack
pub fn call(instance: &mut Instance, ctx: &mut Context) -> Result<Flow, RuntimeError> {
    let mut reader = ctx.immediates();
    let func_idx = reader.read_vu32()?;
    let next = reader.pos();

    let func = instance.function(func_idx)?.clone();
    func.call(instance)?;
    ctx.pc = next;
    Ok(Flow::Continue)
}

/// call_indirect y t - Call through the function table
///
/// 1. Pop the i32 element index
/// 2. Trap if the element is out of range or empty
/// 3. Trap if the function's signature differs from type y
/// 4. Call the function
///
/// Nothing of the callee runs when a check fails.
pub fn call_indirect(instance: &mut Instance, ctx: &mut Context) -> Result<Flow, RuntimeError> {
    let mut reader = ctx.immediates();
    let type_idx = reader.read_vu32()?;
    let table_idx = reader.read_vu32()?;
    let next = reader.pos();

    if table_idx != 0 {
        return Err(Fault::MissingTable.into());
    }
    let elem_idx = instance.stack.pop_u32()?;
    let func_idx = instance.table().ok_or(Fault::MissingTable)?.get(elem_idx)?;
    let func = instance.function(func_idx)?.clone();

    let expected = instance.func_type(type_idx)?;
    if func.signature() != expected {
        return Err(Trap::IndirectCallTypeMismatch {
            expected: expected.clone(),
            actual: func.signature().clone(),
        }
        .into());
    }

    func.call(instance)?;
    ctx.pc = next;
    Ok(Flow::Continue)
}

#[cfg(test)]
mod tests {
    use crate::config::EngineConfig;
    use crate::encoder::BodyBuilder;
    use crate::runtime::code::BlockType;
    use crate::runtime::test_utils::test::ExecutorTest;
    use crate::runtime::{DefinedFunction, Fault, FunctionType, Instance, Trap, Value, ValueType};

    fn function(params: Vec<ValueType>, results: Vec<ValueType>, body: BodyBuilder) -> DefinedFunction {
        DefinedFunction::new(FunctionType::new(params, results), 0, body.end().build()).unwrap()
    }

    mod structured {
        use super::*;

        #[test]
        fn block_falls_through() {
            ExecutorTest::new()
                .body(|b| b.block(BlockType::Value(ValueType::I32)).i32_const(7).end())
                .returns(vec![ValueType::I32])
                .expect_stack(vec![Value::from_i32(7)]);
        }

        #[test]
        fn br_keeps_only_label_arity() {
            ExecutorTest::new()
                .body(|b| {
                    b.i32_const(9)
                        .block(BlockType::Value(ValueType::I32))
                        .i32_const(1)
                        .i32_const(2)
                        .br(0)
                        .i32_const(3)
                        .end()
                })
                .returns(vec![ValueType::I32, ValueType::I32])
                .expect_stack(vec![Value::from_i32(9), Value::from_i32(2)]);
        }

        #[test]
        fn br_out_of_nested_blocks() {
            ExecutorTest::new()
                .body(|b| {
                    b.block(BlockType::Value(ValueType::I64))
                        .block(BlockType::Empty)
                        .block(BlockType::Empty)
                        .i64_const(5)
                        .br(2)
                        .end()
                        .unreachable()
                        .end()
                        .unreachable()
                        .end()
                })
                .returns(vec![ValueType::I64])
                .expect_stack(vec![Value::from_i64(5)]);
        }

        #[test]
        fn loop_counts_to_five() {
            ExecutorTest::new()
                .locals(1)
                .body(|b| {
                    b.loop_(BlockType::Empty)
                        .local_get(0)
                        .i32_const(1)
                        .i32_add()
                        .local_tee(0)
                        .i32_const(5)
                        .i32_lt_s()
                        .br_if(0)
                        .end()
                        .local_get(0)
                })
                .returns(vec![ValueType::I32])
                .expect_stack(vec![Value::from_i32(5)]);
        }

        #[test]
        fn loop_branch_carries_parameters() {
            let body = BodyBuilder::new()
                .i32_const(0)
                .loop_(BlockType::TypeIndex(0))
                .i32_const(1)
                .i32_add()
                .local_tee(0)
                .local_get(0)
                .i32_const(3)
                .i32_lt_s()
                .br_if(0)
                .end();
            let func = DefinedFunction::new(FunctionType::new(vec![], vec![ValueType::I32]), 1, body.end().build())
                .unwrap();
            let mut instance = Instance::builder()
                .type_(FunctionType::new(vec![ValueType::I32], vec![ValueType::I32]))
                .function(func)
                .build()
                .unwrap();

            assert_eq!(instance.invoke(0, &[]).unwrap(), vec![Value::from_i32(3)]);
        }

        #[test]
        fn block_with_type_index_consumes_parameters() {
            let body = BodyBuilder::new()
                .i32_const(4)
                .block(BlockType::TypeIndex(0))
                .i32_const(1)
                .i32_add()
                .end();
            let mut instance = Instance::builder()
                .type_(FunctionType::new(vec![ValueType::I32], vec![ValueType::I32]))
                .function(function(vec![], vec![ValueType::I32], body))
                .build()
                .unwrap();

            assert_eq!(instance.invoke(0, &[]).unwrap(), vec![Value::from_i32(5)]);
        }

        #[test]
        fn if_else_selects_arm() {
            for (condition, expected) in [(1, 10), (0, 20), (-5, 10)] {
                ExecutorTest::new()
                    .arg(Value::from_i32(condition))
                    .body(|b| {
                        b.local_get(0)
                            .if_(BlockType::Value(ValueType::I32))
                            .i32_const(10)
                            .else_()
                            .i32_const(20)
                            .end()
                    })
                    .returns(vec![ValueType::I32])
                    .expect_stack(vec![Value::from_i32(expected)]);
            }
        }

        #[test]
        fn if_without_else_skips_then_arm() {
            ExecutorTest::new()
                .body(|b| b.i32_const(0).if_(BlockType::Empty).unreachable().end().i32_const(7))
                .returns(vec![ValueType::I32])
                .expect_stack(vec![Value::from_i32(7)]);
        }

        #[test]
        fn br_inside_else_arm() {
            ExecutorTest::new()
                .body(|b| {
                    b.i32_const(0)
                        .if_(BlockType::Value(ValueType::I32))
                        .i32_const(1)
                        .else_()
                        .i32_const(2)
                        .br(0)
                        .unreachable()
                        .end()
                })
                .returns(vec![ValueType::I32])
                .expect_stack(vec![Value::from_i32(2)]);
        }

        #[test]
        fn br_if_not_taken() {
            ExecutorTest::new()
                .body(|b| {
                    b.block(BlockType::Value(ValueType::I32))
                        .i32_const(1)
                        .i32_const(0)
                        .br_if(0)
                        .drop()
                        .i32_const(2)
                        .end()
                })
                .returns(vec![ValueType::I32])
                .expect_stack(vec![Value::from_i32(2)]);
        }

        #[test]
        fn br_table_selects_target_or_default() {
            for (index, expected) in [(0, 10), (1, 11), (2, 12), (99, 12)] {
                ExecutorTest::new()
                    .arg(Value::from_i32(index))
                    .body(|b| {
                        b.block(BlockType::Empty)
                            .block(BlockType::Empty)
                            .block(BlockType::Empty)
                            .local_get(0)
                            .br_table(&[0, 1], 2)
                            .end()
                            .i32_const(10)
                            .return_()
                            .end()
                            .i32_const(11)
                            .return_()
                            .end()
                            .i32_const(12)
                    })
                    .returns(vec![ValueType::I32])
                    .expect_stack(vec![Value::from_i32(expected)]);
            }
        }

        #[test]
        fn return_from_nested_block() {
            ExecutorTest::new()
                .body(|b| b.block(BlockType::Empty).i32_const(1).i32_const(2).return_().end().unreachable())
                .returns(vec![ValueType::I32])
                .expect_stack(vec![Value::from_i32(2)]);
        }

        #[test]
        fn br_to_function_label_returns() {
            ExecutorTest::new()
                .body(|b| b.i64_const(3).i64_const(4).br(0).unreachable())
                .returns(vec![ValueType::I64])
                .expect_stack(vec![Value::from_i64(4)]);
        }

        #[test]
        fn unreachable_traps() {
            ExecutorTest::new()
                .body(|b| b.nop().unreachable())
                .expect_trap(Trap::Unreachable);
        }

        #[test]
        fn branch_past_outermost_label() {
            ExecutorTest::new().body(|b| b.br(3)).expect_error("Invalid label: 3");
        }
    }

    mod calls {
        use super::*;

        fn add() -> DefinedFunction {
            function(
                vec![ValueType::I32, ValueType::I32],
                vec![ValueType::I32],
                BodyBuilder::new().local_get(0).local_get(1).i32_add(),
            )
        }

        #[test]
        fn call_passes_arguments_in_order() {
            let caller = function(
                vec![],
                vec![ValueType::I32],
                BodyBuilder::new().i32_const(10).i32_const(3).call(1).i32_const(2).i32_sub(),
            );
            let sub = function(
                vec![ValueType::I32, ValueType::I32],
                vec![ValueType::I32],
                BodyBuilder::new().local_get(0).local_get(1).i32_sub(),
            );
            let mut instance = Instance::builder().function(caller).function(sub).build().unwrap();

            assert_eq!(instance.invoke(0, &[]).unwrap(), vec![Value::from_i32(5)]);
            assert_eq!(instance.stack_height(), 0);
        }

        #[test]
        fn call_unknown_function() {
            let caller = function(vec![], vec![], BodyBuilder::new().call(4));
            let mut instance = Instance::builder().function(caller).build().unwrap();

            let err = instance.invoke(0, &[]).unwrap_err();
            assert_eq!(err.fault(), Some(&Fault::FunctionIndexOutOfBounds(4)));
        }

        fn indirect_instance(callee: DefinedFunction) -> Instance {
            let caller = function(
                vec![ValueType::I32],
                vec![ValueType::I32],
                BodyBuilder::new().i32_const(20).i32_const(22).local_get(0).call_indirect(0, 0),
            );
            Instance::builder()
                .type_(FunctionType::new(vec![ValueType::I32, ValueType::I32], vec![ValueType::I32]))
                .function(caller)
                .function(callee)
                .global(Value::from_i32(0))
                .table(3, None)
                .elements(0, &[1])
                .elements(2, &[1])
                .build()
                .unwrap()
        }

        #[test]
        fn call_indirect_matching_signature() {
            let mut instance = indirect_instance(add());
            assert_eq!(instance.invoke(0, &[Value::from_i32(0)]).unwrap(), vec![Value::from_i32(42)]);
            assert_eq!(instance.invoke(0, &[Value::from_i32(2)]).unwrap(), vec![Value::from_i32(42)]);
        }

        #[test]
        fn call_indirect_mismatch_does_not_run_callee() {
            let callee = function(
                vec![ValueType::I32, ValueType::I32],
                vec![],
                BodyBuilder::new().i32_const(1).global_set(0),
            );
            let mut instance = indirect_instance(callee);

            let err = instance.invoke(0, &[Value::from_i32(0)]).unwrap_err();
            assert!(matches!(err.trap(), Some(Trap::IndirectCallTypeMismatch { .. })));
            assert_eq!(instance.global(0).unwrap(), Value::from_i32(0));
            assert_eq!(instance.stack_height(), 0);
        }

        #[test]
        fn call_indirect_empty_and_missing_slots() {
            let mut instance = indirect_instance(add());

            let err = instance.invoke(0, &[Value::from_i32(1)]).unwrap_err();
            assert_eq!(err.trap(), Some(&Trap::UninitializedElement(1)));

            let err = instance.invoke(0, &[Value::from_i32(3)]).unwrap_err();
            assert_eq!(err.trap(), Some(&Trap::UndefinedElement(3)));
        }

        #[test]
        fn call_indirect_without_table() {
            let caller = function(vec![], vec![], BodyBuilder::new().i32_const(0).call_indirect(0, 0));
            let mut instance = Instance::builder()
                .type_(FunctionType::default())
                .function(caller)
                .build()
                .unwrap();

            let err = instance.invoke(0, &[]).unwrap_err();
            assert_eq!(err.fault(), Some(&Fault::MissingTable));
        }

        #[test]
        fn recursion_is_bounded() {
            let recurse = function(vec![], vec![], BodyBuilder::new().call(0));
            let config = EngineConfig {
                max_call_depth: 16,
                ..EngineConfig::default()
            };
            let mut instance = Instance::builder().function(recurse).config(config).build().unwrap();

            let err = instance.invoke(0, &[]).unwrap_err();
            assert_eq!(err.trap(), Some(&Trap::CallStackExhausted));
            assert_eq!(instance.stack_height(), 0);
        }
    }
}
