//! WebAssembly operand stack implementation

use super::{Fault, RuntimeError, Value};

/// The WebAssembly operand stack
///
/// Cells are untyped; the typed pop/push helpers reinterpret the cell the way
/// the executing instruction expects. Underflow is a [`Fault`]: validated code
/// never pops more than it pushed.
#[derive(Debug, Default)]
pub struct Stack {
    values: Vec<Value>,
}

impl Stack {
    /// Create a new empty stack
    pub fn new() -> Self {
        Stack { values: Vec::new() }
    }

    /// Push a value onto the stack
    pub fn push(&mut self, value: Value) {
        self.values.push(value);
    }

    /// Push multiple values onto the stack
    pub fn push_all(&mut self, values: impl IntoIterator<Item = Value>) {
        self.values.extend(values);
    }

    /// Pop a value from the stack
    pub fn pop(&mut self) -> Result<Value, RuntimeError> {
        self.values.pop().ok_or_else(|| Fault::StackUnderflow.into())
    }

    /// Pop `count` values, returned in push order
    pub fn pop_n(&mut self, count: usize) -> Result<Vec<Value>, RuntimeError> {
        if count > self.values.len() {
            return Err(Fault::StackUnderflow.into());
        }
        let at = self.values.len() - count;
        Ok(self.values.split_off(at))
    }

    pub fn pop_i32(&mut self) -> Result<i32, RuntimeError> {
        Ok(self.pop()?.as_i32())
    }

    pub fn pop_u32(&mut self) -> Result<u32, RuntimeError> {
        Ok(self.pop()?.as_u32())
    }

    pub fn pop_i64(&mut self) -> Result<i64, RuntimeError> {
        Ok(self.pop()?.as_i64())
    }

    pub fn pop_u64(&mut self) -> Result<u64, RuntimeError> {
        Ok(self.pop()?.as_u64())
    }

    pub fn pop_f32(&mut self) -> Result<f32, RuntimeError> {
        Ok(self.pop()?.as_f32())
    }

    pub fn pop_f64(&mut self) -> Result<f64, RuntimeError> {
        Ok(self.pop()?.as_f64())
    }

    pub fn push_i32(&mut self, v: i32) {
        self.push(Value::from_i32(v));
    }

    pub fn push_i64(&mut self, v: i64) {
        self.push(Value::from_i64(v));
    }

    pub fn push_f32(&mut self, v: f32) {
        self.push(Value::from_f32(v));
    }

    pub fn push_f64(&mut self, v: f64) {
        self.push(Value::from_f64(v));
    }

    pub fn push_bool(&mut self, v: bool) {
        self.push(Value::from_bool(v));
    }

    /// Get the current stack depth
    pub fn depth(&self) -> usize {
        self.values.len()
    }

    /// Check if the stack is empty
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Peek at the top value without popping
    pub fn peek(&self) -> Result<Value, RuntimeError> {
        self.values.last().copied().ok_or_else(|| Fault::StackUnderflow.into())
    }

    /// Drop everything above `height`
    pub fn truncate(&mut self, height: usize) {
        self.values.truncate(height);
    }

    /// Keep the top `arity` values and discard everything between them and `height`
    ///
    /// This is the stack effect of a branch: the label's results survive, the
    /// operands the construct left behind do not.
    pub fn unwind(&mut self, height: usize, arity: usize) -> Result<(), RuntimeError> {
        let len = self.values.len();
        if len < height + arity {
            return Err(Fault::StackUnderflow.into());
        }
        self.values.drain(height..len - arity);
        Ok(())
    }

    /// All values, bottom first
    pub fn as_slice(&self) -> &[Value] {
        &self.values
    }
}
