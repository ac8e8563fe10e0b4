//! Execution context of one function activation
//!
//! Holds the program counter into the function body, the function itself,
//! the locals (parameters followed by declared locals) and the label stack.
//! A context lives exactly as long as the call it belongs to.

use super::code::CodeReader;
use super::control::LabelStack;
use super::{DefinedFunction, Fault, RuntimeError, Value};
use std::rc::Rc;

#[derive(Debug)]
pub struct Context {
    /// Byte offset of the next opcode in the function body
    pub pc: usize,
    /// The function being executed
    pub func: Rc<DefinedFunction>,
    /// Parameters followed by declared locals
    pub locals: Vec<Value>,
    /// Control labels of this activation, the function scope at the bottom
    pub labels: LabelStack,
}

impl Context {
    /// Create the context for a call, with `args` as the leading locals
    ///
    /// Declared locals start as zero cells.
    pub fn new(func: Rc<DefinedFunction>, args: Vec<Value>) -> Self {
        let mut locals = args;
        locals.resize(locals.len() + func.local_count() as usize, Value::default());
        Context {
            pc: 0,
            func,
            locals,
            labels: LabelStack::new(),
        }
    }

    /// Reader positioned just past the opcode at `pc`
    pub fn immediates(&self) -> CodeReader<'_> {
        CodeReader::new(self.func.body(), self.pc + 1)
    }

    pub fn local(&self, idx: u32) -> Result<Value, RuntimeError> {
        self.locals
            .get(idx as usize)
            .copied()
            .ok_or_else(|| Fault::LocalIndexOutOfBounds(idx).into())
    }

    pub fn set_local(&mut self, idx: u32, value: Value) -> Result<(), RuntimeError> {
        let slot = self
            .locals
            .get_mut(idx as usize)
            .ok_or(Fault::LocalIndexOutOfBounds(idx))?;
        *slot = value;
        Ok(())
    }
}
