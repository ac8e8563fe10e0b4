//! Common test utilities shared between integration tests

#![allow(dead_code)]

use stackwasm::encoder::BodyBuilder;
use stackwasm::runtime::{DefinedFunction, FunctionType, Instance, InstanceBuilder, RuntimeError, Value, ValueType};

pub fn sig(params: &[ValueType], results: &[ValueType]) -> FunctionType {
    FunctionType::new(params.to_vec(), results.to_vec())
}

pub fn func(signature: FunctionType, locals: u32, body: BodyBuilder) -> DefinedFunction {
    DefinedFunction::new(signature, locals, body.end().build()).unwrap_or_else(|e| panic!("bad body: {e}"))
}

/// An instance holding one function with the given signature and body
pub fn single(signature: FunctionType, body: BodyBuilder) -> Instance {
    single_with(Instance::builder(), signature, body)
}

pub fn single_with(builder: InstanceBuilder, signature: FunctionType, body: BodyBuilder) -> Instance {
    builder
        .function(func(signature, 0, body))
        .build()
        .unwrap_or_else(|e| panic!("build failed: {e}"))
}

/// Run a `[i32 i32] -> [i32]` binary operator over two operands
pub fn binary_i32(opcode: u8, a: i32, b: i32) -> Result<i32, RuntimeError> {
    let mut instance = single(
        sig(&[ValueType::I32, ValueType::I32], &[ValueType::I32]),
        BodyBuilder::new().local_get(0).local_get(1).op(opcode),
    );
    let results = instance.invoke(0, &[Value::from_i32(a), Value::from_i32(b)])?;
    Ok(results[0].as_i32())
}

pub fn binary_i64(opcode: u8, a: i64, b: i64) -> Result<i64, RuntimeError> {
    let mut instance = single(
        sig(&[ValueType::I64, ValueType::I64], &[ValueType::I64]),
        BodyBuilder::new().local_get(0).local_get(1).op(opcode),
    );
    let results = instance.invoke(0, &[Value::from_i64(a), Value::from_i64(b)])?;
    Ok(results[0].as_i64())
}

pub fn binary_f64(opcode: u8, a: f64, b: f64) -> Result<f64, RuntimeError> {
    let mut instance = single(
        sig(&[ValueType::F64, ValueType::F64], &[ValueType::F64]),
        BodyBuilder::new().local_get(0).local_get(1).op(opcode),
    );
    let results = instance.invoke(0, &[Value::from_f64(a), Value::from_f64(b)])?;
    Ok(results[0].as_f64())
}
