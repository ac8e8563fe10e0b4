//! Callable functions of an instance
//!
//! A function is either *defined*, with a body executed by the interpreter,
//! or *host*, backed by a native callable. Both expose their signature and
//! are called the same way by `call` and `call_indirect`.

use super::code::{BlockInfo, BlockMap};
use super::host::BoundHostFunction;
use super::{executor, Fault, FunctionType, Instance, RuntimeError};
use std::rc::Rc;

/// A function whose body the interpreter executes
#[derive(Debug)]
pub struct DefinedFunction {
    signature: FunctionType,
    local_count: u32,
    body: Vec<u8>,
    blocks: BlockMap,
}

impl DefinedFunction {
    /// Load a decoded function body
    ///
    /// `local_count` is the number of declared locals beyond the parameters.
    /// `body` is the opcode stream, with or without the function's closing
    /// `end`. The body's block structure is checked here, once.
    pub fn new(signature: FunctionType, local_count: u32, body: Vec<u8>) -> Result<Self, RuntimeError> {
        let blocks = BlockMap::scan(&body)?;
        Ok(DefinedFunction {
            signature,
            local_count,
            body,
            blocks,
        })
    }

    pub fn signature(&self) -> &FunctionType {
        &self.signature
    }

    pub fn local_count(&self) -> u32 {
        self.local_count
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Matching `else`/`end` of the structured instruction at `offset`
    pub fn block(&self, offset: usize) -> Result<&BlockInfo, RuntimeError> {
        self.blocks
            .get(offset)
            .ok_or_else(|| Fault::UnbalancedBlock(offset).into())
    }
}

/// A function as stored in an instance
#[derive(Debug, Clone)]
pub enum Function {
    Defined(Rc<DefinedFunction>),
    Host(Rc<BoundHostFunction>),
}

impl Function {
    pub fn signature(&self) -> &FunctionType {
        match self {
            Function::Defined(func) => func.signature(),
            Function::Host(func) => func.signature(),
        }
    }

    /// Call with arguments taken from, and results left on, the instance's stack
    pub fn call(&self, instance: &mut Instance) -> Result<(), RuntimeError> {
        match self {
            Function::Defined(func) => executor::invoke_defined(instance, func.clone()),
            Function::Host(func) => {
                log::debug!("calling host function {}", func.signature());
                func.call(&mut instance.stack)
            }
        }
    }
}

impl From<DefinedFunction> for Function {
    fn from(func: DefinedFunction) -> Self {
        Function::Defined(Rc::new(func))
    }
}
