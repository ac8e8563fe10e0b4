//! Host function bridge
//!
//! A host function is a native Rust callable exposed to guest code under a
//! WebAssembly signature. Guest code sees untyped [`Value`] cells; the
//! callable sees concrete `i32`/`u32`/`i64`/`u64`/`f32`/`f64` arguments. Each
//! declared parameter and result carries a [`NativeKind`] tag, and conversion
//! in both directions is a fixed table keyed by that tag:
//!
//! | kind | cell -> native | native -> cell |
//! |------|----------------|----------------|
//! | `I32` | low 32 bits, signed | zero-extended bit pattern |
//! | `U32` | low 32 bits, unsigned | zero-extended |
//! | `I64` | 64 bits, signed | bit pattern |
//! | `U64` | 64 bits, unsigned | bit pattern |
//! | `F32` | low 32 bits as IEEE-754 | IEEE-754 bits |
//! | `F64` | 64 bits as IEEE-754 | IEEE-754 bits |
//!
//! A [`HostFunction`] holds a *generator* rather than the callable itself.
//! The generator runs once when an instance is built, receiving a
//! [`HostEnv`] with that instance's memory and globals, and the callable it
//! returns is fixed for the life of the instance.
//!
//! ```
//! use stackwasm::runtime::{FunctionType, HostFunction, ValueType};
//!
//! let ratio = HostFunction::from_fn(
//!     FunctionType::new(vec![ValueType::I32, ValueType::I32], vec![ValueType::F64]),
//!     |a: u32, b: u32| a as f64 / b as f64,
//! )
//! .unwrap();
//! assert_eq!(ratio.signature().params.len(), 2);
//! ```

use super::instance::SharedGlobals;
use super::stack::Stack;
use super::{Fault, FunctionType, RuntimeError, SharedMemory, Trap, Value, ValueType};
use std::fmt;
use std::rc::Rc;

/// Native type of one host parameter or result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeKind {
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
}

impl NativeKind {
    /// The WebAssembly type values of this kind travel as
    pub fn value_type(self) -> ValueType {
        match self {
            NativeKind::I32 | NativeKind::U32 => ValueType::I32,
            NativeKind::I64 | NativeKind::U64 => ValueType::I64,
            NativeKind::F32 => ValueType::F32,
            NativeKind::F64 => ValueType::F64,
        }
    }

    /// Signed kind for a numeric value type, `None` for anything else
    pub fn for_type(ty: ValueType) -> Option<Self> {
        match ty {
            ValueType::I32 => Some(NativeKind::I32),
            ValueType::I64 => Some(NativeKind::I64),
            ValueType::F32 => Some(NativeKind::F32),
            ValueType::F64 => Some(NativeKind::F64),
            _ => None,
        }
    }

    /// Read a cell as this kind
    pub fn lift(self, value: Value) -> NativeValue {
        match self {
            NativeKind::I32 => NativeValue::I32(value.as_i32()),
            NativeKind::U32 => NativeValue::U32(value.as_u32()),
            NativeKind::I64 => NativeValue::I64(value.as_i64()),
            NativeKind::U64 => NativeValue::U64(value.as_u64()),
            NativeKind::F32 => NativeValue::F32(value.as_f32()),
            NativeKind::F64 => NativeValue::F64(value.as_f64()),
        }
    }
}

/// A natively typed argument or result
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NativeValue {
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
}

impl NativeValue {
    pub fn kind(&self) -> NativeKind {
        match self {
            NativeValue::I32(_) => NativeKind::I32,
            NativeValue::U32(_) => NativeKind::U32,
            NativeValue::I64(_) => NativeKind::I64,
            NativeValue::U64(_) => NativeKind::U64,
            NativeValue::F32(_) => NativeKind::F32,
            NativeValue::F64(_) => NativeKind::F64,
        }
    }

    /// Store this value in a cell
    pub fn lower(self) -> Value {
        match self {
            NativeValue::I32(v) => Value::from_i32(v),
            NativeValue::U32(v) => Value::from_u32(v),
            NativeValue::I64(v) => Value::from_i64(v),
            NativeValue::U64(v) => Value::from_u64(v),
            NativeValue::F32(v) => Value::from_f32(v),
            NativeValue::F64(v) => Value::from_f64(v),
        }
    }
}

/// A Rust type that can cross the host boundary
pub trait NativeType: Sized {
    const KIND: NativeKind;

    fn from_native(value: NativeValue) -> Option<Self>;

    fn into_native(self) -> NativeValue;
}

/// A list of native values: `()`, a single [`NativeType`], or a tuple of them
pub trait NativeTuple: Sized {
    fn kinds() -> Vec<NativeKind>;

    fn into_natives(self) -> Vec<NativeValue>;

    /// Rebuild from values; `None` if the count or any kind disagrees
    fn from_natives(values: &[NativeValue]) -> Option<Self>;
}

macro_rules! native_type {
    ($t:ty, $kind:ident) => {
        impl NativeType for $t {
            const KIND: NativeKind = NativeKind::$kind;

            fn from_native(value: NativeValue) -> Option<Self> {
                match value {
                    NativeValue::$kind(v) => Some(v),
                    _ => None,
                }
            }

            fn into_native(self) -> NativeValue {
                NativeValue::$kind(self)
            }
        }

        impl NativeTuple for $t {
            fn kinds() -> Vec<NativeKind> {
                vec![NativeKind::$kind]
            }

            fn into_natives(self) -> Vec<NativeValue> {
                vec![NativeValue::$kind(self)]
            }

            fn from_natives(values: &[NativeValue]) -> Option<Self> {
                match values {
                    [NativeValue::$kind(v)] => Some(*v),
                    _ => None,
                }
            }
        }
    };
}

native_type!(i32, I32);
native_type!(u32, U32);
native_type!(i64, I64);
native_type!(u64, U64);
native_type!(f32, F32);
native_type!(f64, F64);

impl NativeTuple for () {
    fn kinds() -> Vec<NativeKind> {
        Vec::new()
    }

    fn into_natives(self) -> Vec<NativeValue> {
        Vec::new()
    }

    fn from_natives(values: &[NativeValue]) -> Option<Self> {
        values.is_empty().then_some(())
    }
}

macro_rules! native_tuple {
    ($($name:ident),+) => {
        impl<$($name: NativeType),+> NativeTuple for ($($name,)+) {
            fn kinds() -> Vec<NativeKind> {
                vec![$($name::KIND),+]
            }

            #[allow(non_snake_case)]
            fn into_natives(self) -> Vec<NativeValue> {
                let ($($name,)+) = self;
                vec![$($name.into_native()),+]
            }

            #[allow(non_snake_case)]
            fn from_natives(values: &[NativeValue]) -> Option<Self> {
                let mut iter = values.iter().copied();
                $(let $name = $name::from_native(iter.next()?)?;)+
                if iter.next().is_some() {
                    return None;
                }
                Some(($($name,)+))
            }
        }
    };
}

native_tuple!(A);
native_tuple!(A, B);
native_tuple!(A, B, C);
native_tuple!(A, B, C, D);
native_tuple!(A, B, C, D, E);
native_tuple!(A, B, C, D, E, F);

/// What a host closure may return: its results, or its results or a trap
pub trait HostReturn {
    type Values: NativeTuple;

    fn into_result(self) -> Result<Self::Values, Trap>;
}

impl<T: NativeTuple> HostReturn for T {
    type Values = T;

    fn into_result(self) -> Result<T, Trap> {
        Ok(self)
    }
}

impl<T: NativeTuple> HostReturn for Result<T, Trap> {
    type Values = T;

    fn into_result(self) -> Result<T, Trap> {
        self
    }
}

/// A callable after type erasure: natives in, natives out
pub type HostCallable = Box<dyn Fn(&[NativeValue]) -> Result<Vec<NativeValue>, Trap>>;

/// Produces the callable for one instance
pub type HostGenerator = Rc<dyn Fn(&HostEnv) -> HostCallable>;

/// Typed Rust closures that can be erased into a [`HostCallable`]
///
/// Implemented for `Fn` closures of up to six [`NativeType`] parameters
/// returning a [`HostReturn`]. `Params` is the parameter tuple and only
/// serves to keep the per-arity impls apart.
pub trait IntoCallable<Params, Results> {
    fn param_kinds() -> Vec<NativeKind>;

    fn result_kinds() -> Vec<NativeKind>;

    fn into_callable(self) -> HostCallable;
}

macro_rules! into_callable {
    ($($name:ident),*) => {
        impl<Func, Ret, $($name),*> IntoCallable<($($name,)*), Ret> for Func
        where
            Func: Fn($($name),*) -> Ret + 'static,
            Ret: HostReturn,
            $($name: NativeType,)*
        {
            fn param_kinds() -> Vec<NativeKind> {
                vec![$($name::KIND),*]
            }

            fn result_kinds() -> Vec<NativeKind> {
                <Ret::Values as NativeTuple>::kinds()
            }

            #[allow(non_snake_case, unused_mut, unused_variables)]
            fn into_callable(self) -> HostCallable {
                Box::new(move |args: &[NativeValue]| {
                    let mut iter = args.iter().copied();
                    $(
                        let $name = iter
                            .next()
                            .and_then($name::from_native)
                            .ok_or_else(|| Trap::Host("argument kind mismatch".to_string()))?;
                    )*
                    let values = (self)($($name),*).into_result()?;
                    Ok(values.into_natives())
                })
            }
        }
    };
}

into_callable!();
into_callable!(A);
into_callable!(A, B);
into_callable!(A, B, C);
into_callable!(A, B, C, D);
into_callable!(A, B, C, D, E);
into_callable!(A, B, C, D, E, F);

/// Configuration errors in a host function declaration
///
/// Positions count parameters first, then results.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HostError {
    #[error("unsupported type {ty} at position {position}")]
    UnsupportedType { position: usize, ty: ValueType },
    #[error("arity mismatch: signature declares {expected} values, callable has {actual}")]
    ArityMismatch { expected: usize, actual: usize },
    #[error("kind mismatch at position {position}: declared {declared}, native {native:?}")]
    KindMismatch {
        position: usize,
        declared: ValueType,
        native: NativeKind,
    },
}

/// Instance state a host generator may close over
#[derive(Clone, Default)]
pub struct HostEnv {
    pub memory: Option<SharedMemory>,
    pub globals: SharedGlobals,
}

impl HostEnv {
    pub fn memory(&self) -> Option<&SharedMemory> {
        self.memory.as_ref()
    }

    pub fn global(&self, idx: u32) -> Option<Value> {
        self.globals.borrow().get(idx as usize).copied()
    }

    pub fn set_global(&self, idx: u32, value: Value) -> Result<(), RuntimeError> {
        let mut globals = self.globals.borrow_mut();
        let slot = globals
            .get_mut(idx as usize)
            .ok_or(Fault::GlobalIndexOutOfBounds(idx))?;
        *slot = value;
        Ok(())
    }
}

/// A host function declaration, not yet bound to an instance
#[derive(Clone)]
pub struct HostFunction {
    signature: FunctionType,
    params: Vec<NativeKind>,
    results: Vec<NativeKind>,
    generator: HostGenerator,
}

impl HostFunction {
    /// Declare a host function from explicit kinds and a type-erased generator
    ///
    /// # Errors
    /// - `UnsupportedType` if the signature names a non-numeric type
    /// - `ArityMismatch` if the kind lists and the signature differ in length
    /// - `KindMismatch` if a kind does not travel as its declared type
    pub fn new(
        signature: FunctionType,
        params: Vec<NativeKind>,
        results: Vec<NativeKind>,
        generator: impl Fn(&HostEnv) -> HostCallable + 'static,
    ) -> Result<Self, HostError> {
        let declared = signature.params.iter().chain(&signature.results);
        if let Some((position, ty)) = declared.enumerate().find(|(_, ty)| !ty.is_numeric()) {
            return Err(HostError::UnsupportedType { position, ty: *ty });
        }

        for (declared, kinds) in [(&signature.params, &params), (&signature.results, &results)] {
            if declared.len() != kinds.len() {
                return Err(HostError::ArityMismatch {
                    expected: declared.len(),
                    actual: kinds.len(),
                });
            }
        }

        let declared = signature.params.iter().chain(&signature.results);
        let natives = params.iter().chain(&results);
        for (position, (ty, kind)) in declared.zip(natives).enumerate() {
            if kind.value_type() != *ty {
                return Err(HostError::KindMismatch {
                    position,
                    declared: *ty,
                    native: *kind,
                });
            }
        }

        Ok(HostFunction {
            signature,
            params,
            results,
            generator: Rc::new(generator),
        })
    }

    /// Declare a host function from a generator returning a typed closure
    ///
    /// The closure's parameter and result types determine the kinds.
    pub fn wrap<P, R, F, G>(signature: FunctionType, generator: G) -> Result<Self, HostError>
    where
        G: Fn(&HostEnv) -> F + 'static,
        F: IntoCallable<P, R>,
    {
        HostFunction::new(signature, F::param_kinds(), F::result_kinds(), move |env| {
            generator(env).into_callable()
        })
    }

    /// Declare a host function that needs no instance state
    pub fn from_fn<P, R, F>(signature: FunctionType, f: F) -> Result<Self, HostError>
    where
        F: IntoCallable<P, R> + Clone + 'static,
    {
        HostFunction::wrap(signature, move |_env: &HostEnv| f.clone())
    }

    pub fn signature(&self) -> &FunctionType {
        &self.signature
    }

    pub fn param_kinds(&self) -> &[NativeKind] {
        &self.params
    }

    pub fn result_kinds(&self) -> &[NativeKind] {
        &self.results
    }

    /// Run the generator against an instance's state
    pub fn bind(&self, env: &HostEnv) -> BoundHostFunction {
        BoundHostFunction {
            signature: self.signature.clone(),
            params: self.params.clone(),
            results: self.results.clone(),
            callable: (self.generator)(env),
        }
    }
}

impl fmt::Debug for HostFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostFunction")
            .field("signature", &self.signature)
            .field("params", &self.params)
            .field("results", &self.results)
            .finish_non_exhaustive()
    }
}

/// A host function bound to one instance
pub struct BoundHostFunction {
    signature: FunctionType,
    params: Vec<NativeKind>,
    results: Vec<NativeKind>,
    callable: HostCallable,
}

impl BoundHostFunction {
    pub fn signature(&self) -> &FunctionType {
        &self.signature
    }

    /// Pop the arguments, run the callable and push its results
    ///
    /// The last parameter is on top of the stack. Results are pushed in
    /// declared order, so the first result ends up deepest.
    pub fn call(&self, stack: &mut Stack) -> Result<(), RuntimeError> {
        let mut args = Vec::with_capacity(self.params.len());
        for kind in self.params.iter().rev() {
            args.push(kind.lift(stack.pop()?));
        }
        args.reverse();

        let results = (self.callable)(&args)?;

        let matches = results.len() == self.results.len()
            && results.iter().zip(&self.results).all(|(value, kind)| value.kind() == *kind);
        if !matches {
            log::warn!(
                "host function {} returned {:?}, declared {:?}",
                self.signature,
                results.iter().map(NativeValue::kind).collect::<Vec<_>>(),
                self.results
            );
            return Err(Fault::HostResultMismatch.into());
        }

        stack.push_all(results.into_iter().map(NativeValue::lower));
        Ok(())
    }
}

impl fmt::Debug for BoundHostFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundHostFunction")
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Memory;
    use rstest::rstest;
    use std::cell::RefCell;

    fn sig(params: &[ValueType], results: &[ValueType]) -> FunctionType {
        FunctionType::new(params.to_vec(), results.to_vec())
    }

    #[rstest]
    #[case(NativeKind::I32, Value::from_u32(0xFFFF_FFFF), NativeValue::I32(-1))]
    #[case(NativeKind::U32, Value::from_u32(0xFFFF_FFFF), NativeValue::U32(u32::MAX))]
    #[case(NativeKind::I64, Value::from_u64(u64::MAX), NativeValue::I64(-1))]
    #[case(NativeKind::U64, Value::from_i64(-1), NativeValue::U64(u64::MAX))]
    #[case(NativeKind::F32, Value::from_f32(1.5), NativeValue::F32(1.5))]
    #[case(NativeKind::F64, Value::from_f64(-0.25), NativeValue::F64(-0.25))]
    fn test_lift_and_lower(#[case] kind: NativeKind, #[case] cell: Value, #[case] native: NativeValue) {
        assert_eq!(kind.lift(cell), native);
        assert_eq!(native.kind(), kind);
        assert_eq!(native.lower(), cell);
    }

    #[test]
    fn test_tuple_kinds() {
        assert_eq!(<(u32, f64)>::kinds(), vec![NativeKind::U32, NativeKind::F64]);
        assert!(<()>::kinds().is_empty());
        assert_eq!(i64::kinds(), vec![NativeKind::I64]);

        let values = [NativeValue::I32(1), NativeValue::F32(2.0)];
        assert_eq!(<(i32, f32)>::from_natives(&values), Some((1, 2.0)));
        assert_eq!(<(i32, i32)>::from_natives(&values), None);
        assert_eq!(<(i32,)>::from_natives(&values), None);
    }

    #[test]
    fn test_pops_in_reverse_and_passes_in_order() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let record = seen.clone();
        let host = HostFunction::wrap(sig(&[ValueType::I32, ValueType::I32], &[ValueType::F64]), move |_env| {
            let record = record.clone();
            move |a: u32, b: u32| {
                record.borrow_mut().push((a, b));
                a as f64 / b as f64
            }
        })
        .unwrap();

        let bound = host.bind(&HostEnv::default());
        let mut stack = Stack::new();
        stack.push_i32(7);
        stack.push_i32(3);
        bound.call(&mut stack).unwrap();

        assert_eq!(*seen.borrow(), vec![(7, 3)]);
        assert_eq!(stack.depth(), 1);
        assert_eq!(stack.pop_f64().unwrap(), 7.0 / 3.0);
    }

    #[test]
    fn test_results_pushed_in_declared_order() {
        let host = HostFunction::from_fn(
            sig(&[ValueType::I64], &[ValueType::I64, ValueType::I32]),
            |x: i64| (x + 1, x as i32 - 1),
        )
        .unwrap();

        let mut stack = Stack::new();
        stack.push_i64(10);
        host.bind(&HostEnv::default()).call(&mut stack).unwrap();

        assert_eq!(stack.pop_i32().unwrap(), 9);
        assert_eq!(stack.pop_i64().unwrap(), 11);
    }

    #[test]
    fn test_host_trap_propagates() {
        let host = HostFunction::from_fn(sig(&[], &[]), || -> Result<(), Trap> {
            Err(Trap::Host("refused".to_string()))
        })
        .unwrap();

        let err = host.bind(&HostEnv::default()).call(&mut Stack::new()).unwrap_err();
        assert_eq!(err.trap(), Some(&Trap::Host("refused".to_string())));
    }

    #[test]
    fn test_generator_sees_instance_memory() {
        let memory = Memory::new(1, None).unwrap().into_shared();
        memory.borrow_mut().write_u32(16, 0xABCD).unwrap();
        let env = HostEnv {
            memory: Some(memory),
            ..HostEnv::default()
        };

        let host = HostFunction::wrap(sig(&[ValueType::I32], &[ValueType::I32]), |env: &HostEnv| {
            let memory = env.memory().cloned();
            move |addr: u32| -> Result<u32, Trap> {
                let memory = memory.as_ref().ok_or_else(|| Trap::Host("no memory".to_string()))?;
                memory
                    .borrow()
                    .read_u32(addr as u64)
                    .map_err(|_| Trap::MemoryOutOfBounds)
            }
        })
        .unwrap();

        let mut stack = Stack::new();
        stack.push_i32(16);
        host.bind(&env).call(&mut stack).unwrap();
        assert_eq!(stack.pop_u32().unwrap(), 0xABCD);
    }

    #[test]
    fn test_rejects_unsupported_types() {
        let err = HostFunction::from_fn(sig(&[ValueType::FuncRef], &[]), |_: i32| ()).unwrap_err();
        assert_eq!(
            err,
            HostError::UnsupportedType {
                position: 0,
                ty: ValueType::FuncRef
            }
        );

        let err = HostFunction::from_fn(sig(&[], &[ValueType::V128]), || ()).unwrap_err();
        assert!(matches!(err, HostError::UnsupportedType { position: 0, .. }));
    }

    #[test]
    fn test_rejects_arity_and_kind_mismatch() {
        let err = HostFunction::from_fn(sig(&[ValueType::I32], &[]), |_: i32, _: i32| ()).unwrap_err();
        assert_eq!(err, HostError::ArityMismatch { expected: 1, actual: 2 });

        let err = HostFunction::from_fn(sig(&[ValueType::I32], &[ValueType::I32]), |x: i32| x as f32).unwrap_err();
        assert_eq!(
            err,
            HostError::KindMismatch {
                position: 1,
                declared: ValueType::I32,
                native: NativeKind::F32
            }
        );
    }

    #[test]
    fn test_result_mismatch_is_fault() {
        let host = HostFunction::new(sig(&[], &[ValueType::I32]), vec![], vec![NativeKind::I32], |_env: &HostEnv| -> HostCallable {
            Box::new(|_args: &[NativeValue]| -> Result<Vec<NativeValue>, Trap> { Ok(vec![NativeValue::F64(1.0)]) })
        })
        .unwrap();

        let mut stack = Stack::new();
        let err = host.bind(&HostEnv::default()).call(&mut stack).unwrap_err();
        assert_eq!(err.fault(), Some(&Fault::HostResultMismatch));
        assert!(stack.is_empty());
    }

    #[test]
    fn test_env_globals() {
        let env = HostEnv {
            memory: None,
            globals: Rc::new(RefCell::new(vec![Value::from_i32(1)])),
        };
        env.set_global(0, Value::from_i32(5)).unwrap();
        assert_eq!(env.global(0), Some(Value::from_i32(5)));
        assert!(env.set_global(1, Value::default()).is_err());
    }
}
