//! WebAssembly operation implementations
//!
//! Instruction semantics grouped by category. Operations that only touch the
//! operand stack take a [`Stack`]; memory operations additionally take the
//! [`Memory`] and their decoded [`MemArg`]; control and variable operations
//! take the [`Instance`] and the current [`Context`] because they read
//! immediates and move the program counter themselves.

pub mod bitwise;
pub mod comparison;
pub mod control;
pub mod conversion;
pub mod memory;
pub mod numeric;
pub mod parametric;
pub mod variable;

pub(crate) use crate::runtime::code::MemArg;
pub(crate) use crate::runtime::executor::Flow;
pub(crate) use crate::runtime::frame::Context;
pub(crate) use crate::runtime::memory::Memory;
pub(crate) use crate::runtime::stack::Stack;
pub(crate) use crate::runtime::{Fault, Instance, RuntimeError, Trap, Value};
