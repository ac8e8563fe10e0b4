//! WebAssembly module instance
//!
//! An [`Instance`] is the live state one call tree executes against: the
//! operand stack, globals, the linear memory, the function table and the
//! functions themselves. Nested calls share it by `&mut` borrow, so at most
//! one activation touches it at a time; callers that want concurrency keep
//! one instance per thread or wrap it in a lock.

use super::function::Function;
use super::host::{HostEnv, HostFunction};
use super::memory::MAX_PAGES;
use super::stack::Stack;
use super::{
    DefinedFunction, Fault, FunctionType, Memory, NativeKind, NativeTuple, RuntimeError, SharedMemory, Table, Value,
    ValueType,
};
use crate::config::EngineConfig;
use std::cell::RefCell;
use std::rc::Rc;

/// Globals shared between an instance and its host functions
pub type SharedGlobals = Rc<RefCell<Vec<Value>>>;

pub struct Instance {
    pub(crate) stack: Stack,
    pub(crate) globals: SharedGlobals,
    pub(crate) memory: Option<SharedMemory>,
    pub(crate) table: Option<Table>,
    pub(crate) types: Vec<FunctionType>,
    pub(crate) functions: Vec<Function>,
    pub(crate) config: EngineConfig,
    /// Defined functions currently executing
    pub(crate) call_depth: usize,
    /// Instructions left in the current `invoke`
    pub(crate) budget: Option<u64>,
}

impl Instance {
    pub fn builder() -> InstanceBuilder {
        InstanceBuilder::default()
    }

    /// Call function `idx` with `args` and return its results
    ///
    /// On error the operand stack is cut back to where it stood before the
    /// call; memory and global writes made before a trap are kept.
    pub fn invoke(&mut self, idx: u32, args: &[Value]) -> Result<Vec<Value>, RuntimeError> {
        let func = self.function(idx)?.clone();
        let signature = func.signature().clone();
        if args.len() != signature.params.len() {
            return Err(RuntimeError::ArgumentMismatch {
                expected: signature.to_string(),
                actual: format!("{} arguments", args.len()),
            });
        }

        let base = self.stack.depth();
        self.stack.push_all(args.iter().copied());
        self.call_depth = 0;
        self.budget = self.config.instruction_budget;
        log::debug!("invoke function {idx} {signature}");

        match func.call(self) {
            Ok(()) => {
                let results = self.stack.pop_n(signature.results.len());
                self.stack.truncate(base);
                results
            }
            Err(e) => {
                log::debug!("function {idx} failed: {e}");
                self.stack.truncate(base);
                Err(e)
            }
        }
    }

    /// Call function `idx` with natively typed arguments and results
    ///
    /// The argument and result tuples must match the function's signature
    /// type for type; unsigned kinds are accepted wherever the signed kind of
    /// the same width is.
    pub fn invoke_typed<P: NativeTuple, R: NativeTuple>(&mut self, idx: u32, args: P) -> Result<R, RuntimeError> {
        let signature = self.function(idx)?.signature().clone();

        let param_kinds = P::kinds();
        if !kinds_match(&signature.params, &param_kinds) {
            return Err(kinds_mismatch(&signature.params, &param_kinds));
        }
        let result_kinds = R::kinds();
        if !kinds_match(&signature.results, &result_kinds) {
            return Err(kinds_mismatch(&signature.results, &result_kinds));
        }

        let args: Vec<Value> = args.into_natives().into_iter().map(|v| v.lower()).collect();
        let results = self.invoke(idx, &args)?;
        let natives: Vec<_> = result_kinds
            .iter()
            .zip(results)
            .map(|(kind, value)| kind.lift(value))
            .collect();
        R::from_natives(&natives).ok_or_else(|| kinds_mismatch(&signature.results, &result_kinds))
    }

    pub fn function(&self, idx: u32) -> Result<&Function, RuntimeError> {
        self.functions
            .get(idx as usize)
            .ok_or_else(|| Fault::FunctionIndexOutOfBounds(idx).into())
    }

    pub fn func_type(&self, idx: u32) -> Result<&FunctionType, RuntimeError> {
        self.types
            .get(idx as usize)
            .ok_or_else(|| Fault::TypeIndexOutOfBounds(idx).into())
    }

    pub fn memory(&self) -> Option<&SharedMemory> {
        self.memory.as_ref()
    }

    pub fn table(&self) -> Option<&Table> {
        self.table.as_ref()
    }

    pub fn table_mut(&mut self) -> Option<&mut Table> {
        self.table.as_mut()
    }

    pub fn global(&self, idx: u32) -> Result<Value, RuntimeError> {
        self.globals
            .borrow()
            .get(idx as usize)
            .copied()
            .ok_or_else(|| Fault::GlobalIndexOutOfBounds(idx).into())
    }

    pub fn set_global(&mut self, idx: u32, value: Value) -> Result<(), RuntimeError> {
        let mut globals = self.globals.borrow_mut();
        let slot = globals
            .get_mut(idx as usize)
            .ok_or(Fault::GlobalIndexOutOfBounds(idx))?;
        *slot = value;
        Ok(())
    }

    /// Values currently on the operand stack; zero between calls
    pub fn stack_height(&self) -> usize {
        self.stack.depth()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

fn kinds_match(types: &[ValueType], kinds: &[NativeKind]) -> bool {
    types.len() == kinds.len() && types.iter().zip(kinds).all(|(ty, kind)| kind.value_type() == *ty)
}

fn kinds_mismatch(types: &[ValueType], kinds: &[NativeKind]) -> RuntimeError {
    RuntimeError::ArgumentMismatch {
        expected: format!("{types:?}"),
        actual: format!("{kinds:?}"),
    }
}

enum PendingFunction {
    Defined(DefinedFunction),
    Host(HostFunction),
}

/// Assembles an [`Instance`] from already-decoded parts
///
/// ```
/// use stackwasm::runtime::{Instance, Value};
///
/// let instance = Instance::builder()
///     .memory(1, Some(4))
///     .global(Value::from_i32(7))
///     .build()
///     .unwrap();
/// assert_eq!(instance.global(0).unwrap(), Value::from_i32(7));
/// assert_eq!(instance.memory().unwrap().borrow().size(), 1);
/// ```
#[derive(Default)]
pub struct InstanceBuilder {
    types: Vec<FunctionType>,
    functions: Vec<PendingFunction>,
    memory: Option<(u32, Option<u32>)>,
    globals: Vec<Value>,
    table: Option<(u32, Option<u32>)>,
    elements: Vec<(u32, Vec<u32>)>,
    config: EngineConfig,
}

impl InstanceBuilder {
    /// Replace the type section, indexed by `call_indirect` and block types
    pub fn types(mut self, types: Vec<FunctionType>) -> Self {
        self.types = types;
        self
    }

    pub fn type_(mut self, ty: FunctionType) -> Self {
        self.types.push(ty);
        self
    }

    /// Append a defined function; indices follow the order of `function` and `host_function` calls
    pub fn function(mut self, func: DefinedFunction) -> Self {
        self.functions.push(PendingFunction::Defined(func));
        self
    }

    pub fn host_function(mut self, func: HostFunction) -> Self {
        self.functions.push(PendingFunction::Host(func));
        self
    }

    pub fn memory(mut self, min: u32, max: Option<u32>) -> Self {
        self.memory = Some((min, max));
        self
    }

    pub fn global(mut self, value: Value) -> Self {
        self.globals.push(value);
        self
    }

    pub fn table(mut self, min: u32, max: Option<u32>) -> Self {
        self.table = Some((min, max));
        self
    }

    /// Place function indices into the table starting at `offset`
    pub fn elements(mut self, offset: u32, func_indices: &[u32]) -> Self {
        self.elements.push((offset, func_indices.to_vec()));
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Allocate memory, table and globals, then bind every host function
    pub fn build(self) -> Result<Instance, RuntimeError> {
        let memory = match self.memory {
            Some((min, max)) => {
                let cap = self.config.max_memory_pages.min(MAX_PAGES);
                if min > cap {
                    return Err(RuntimeError::Memory(format!(
                        "initial size {min} pages exceeds configured limit {cap} pages"
                    )));
                }
                let max = max.map_or(cap, |max| max.min(cap));
                Some(Memory::new(min, Some(max))?.into_shared())
            }
            None => None,
        };
        let globals: SharedGlobals = Rc::new(RefCell::new(self.globals));

        let env = HostEnv {
            memory: memory.clone(),
            globals: globals.clone(),
        };
        let functions: Vec<Function> = self
            .functions
            .into_iter()
            .map(|pending| match pending {
                PendingFunction::Defined(func) => Function::Defined(Rc::new(func)),
                PendingFunction::Host(func) => Function::Host(Rc::new(func.bind(&env))),
            })
            .collect();

        let mut table = match self.table {
            Some((min, max)) => Some(Table::new(min, max)?),
            None => None,
        };
        for (offset, func_indices) in &self.elements {
            let table = table.as_mut().ok_or(Fault::MissingTable)?;
            if let Some(bad) = func_indices.iter().find(|idx| **idx as usize >= functions.len()) {
                return Err(Fault::FunctionIndexOutOfBounds(*bad).into());
            }
            table.init(*offset, func_indices)?;
        }

        log::debug!(
            "instance built: {} functions, {} types, memory {:?}",
            functions.len(),
            self.types.len(),
            self.memory
        );

        Ok(Instance {
            stack: Stack::new(),
            globals,
            memory,
            table,
            types: self.types,
            functions,
            config: self.config,
            call_depth: 0,
            budget: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::BodyBuilder;
    use crate::runtime::{HostFunction, Trap};

    fn add_function() -> DefinedFunction {
        let body = BodyBuilder::new().local_get(0).local_get(1).i32_add().build();
        DefinedFunction::new(
            FunctionType::new(vec![ValueType::I32, ValueType::I32], vec![ValueType::I32]),
            0,
            body,
        )
        .unwrap()
    }

    #[test]
    fn test_invoke_checks_argument_count() {
        let mut instance = Instance::builder().function(add_function()).build().unwrap();

        let err = instance.invoke(0, &[Value::from_i32(1)]).unwrap_err();
        assert!(matches!(err, RuntimeError::ArgumentMismatch { .. }));

        let err = instance.invoke(1, &[]).unwrap_err();
        assert_eq!(err.fault(), Some(&Fault::FunctionIndexOutOfBounds(1)));
    }

    #[test]
    fn test_invoke_typed() {
        let mut instance = Instance::builder().function(add_function()).build().unwrap();

        let sum: i32 = instance.invoke_typed(0, (40i32, 2i32)).unwrap();
        assert_eq!(sum, 42);

        let wrapped: u32 = instance.invoke_typed(0, (u32::MAX, 1u32)).unwrap();
        assert_eq!(wrapped, 0);

        let err = instance.invoke_typed::<(i64, i64), i32>(0, (1, 2)).unwrap_err();
        assert!(matches!(err, RuntimeError::ArgumentMismatch { .. }));
    }

    #[test]
    fn test_stack_restored_after_trap() {
        let body = BodyBuilder::new().i32_const(1).i32_const(2).unreachable().build();
        let func = DefinedFunction::new(FunctionType::default(), 0, body).unwrap();
        let mut instance = Instance::builder().function(func).build().unwrap();

        let err = instance.invoke(0, &[]).unwrap_err();
        assert_eq!(err.trap(), Some(&Trap::Unreachable));
        assert_eq!(instance.stack_height(), 0);
    }

    #[test]
    fn test_memory_capped_by_config() {
        let config = EngineConfig {
            max_memory_pages: 2,
            ..EngineConfig::default()
        };
        let instance = Instance::builder().memory(1, None).config(config.clone()).build().unwrap();
        assert_eq!(instance.memory().unwrap().borrow().max_pages(), Some(2));

        assert!(Instance::builder().memory(3, None).config(config).build().is_err());
    }

    #[test]
    fn test_elements_validated() {
        let err = Instance::builder().elements(0, &[0]).build().unwrap_err();
        assert_eq!(err.fault(), Some(&Fault::MissingTable));

        let err = Instance::builder()
            .function(add_function())
            .table(2, None)
            .elements(0, &[0, 5])
            .build()
            .unwrap_err();
        assert_eq!(err.fault(), Some(&Fault::FunctionIndexOutOfBounds(5)));

        let instance = Instance::builder()
            .function(add_function())
            .table(2, None)
            .elements(1, &[0])
            .build()
            .unwrap();
        assert_eq!(instance.table().unwrap().get(1).unwrap(), 0);
    }

    #[test]
    fn test_host_functions_bound_with_instance_state() {
        let read_global = HostFunction::wrap(FunctionType::new(vec![], vec![ValueType::I64]), |env: &HostEnv| {
            let env = env.clone();
            move || env.global(0).map_or(-1, |v| v.as_i64())
        })
        .unwrap();

        let mut instance = Instance::builder()
            .global(Value::from_i64(9))
            .host_function(read_global)
            .build()
            .unwrap();

        assert_eq!(instance.invoke(0, &[]).unwrap(), vec![Value::from_i64(9)]);
        instance.set_global(0, Value::from_i64(10)).unwrap();
        assert_eq!(instance.invoke(0, &[]).unwrap(), vec![Value::from_i64(10)]);
    }
}
