//! A WebAssembly bytecode execution engine written in Rust.
//!
//! stackwasm executes already-decoded WebAssembly function bodies: a byte
//! stream of opcodes and immediates plus a declared local count per function.
//! It provides the stack-machine interpreter, linear memory, the function
//! table for indirect calls, and a bridge that lets natively typed Rust
//! closures be called from guest code.
//!
//! # Modules
//!
//! - [`runtime`] -- Interpreter, values, memory, tables, and the host function bridge.
//! - [`encoder`] -- Assembles function bodies (opcodes plus LEB128 immediates).
//! - [`config`] -- Engine limits, loadable from JSON.
//!
//! # Example
//!
//! Build an instance with a single `add` function and call it:
//!
//! ```
//! use stackwasm::encoder::BodyBuilder;
//! use stackwasm::runtime::{DefinedFunction, FunctionType, Instance, Value, ValueType};
//!
//! let body = BodyBuilder::new().local_get(0).local_get(1).i32_add().build();
//! let add = DefinedFunction::new(
//!     FunctionType::new(vec![ValueType::I32, ValueType::I32], vec![ValueType::I32]),
//!     0,
//!     body,
//! )
//! .unwrap();
//!
//! let mut instance = Instance::builder().function(add).build().unwrap();
//! let results = instance.invoke(0, &[Value::from_i32(2), Value::from_i32(3)]).unwrap();
//! assert_eq!(results, vec![Value::from_i32(5)]);
//! ```
//!
//! # Scope
//!
//! Targets the WebAssembly 1.0 core instruction set (i32/i64/f32/f64 numerics,
//! linear memory, structured control flow, direct and indirect calls) plus the
//! sign-extension operators and multi-value block types. Module decoding,
//! validation and linking are the caller's responsibility.

pub mod config;
pub mod encoder;
pub mod runtime;
