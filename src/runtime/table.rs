//! WebAssembly function table
//!
//! A table is a vector of nullable function references that `call_indirect`
//! resolves through. Each slot holds the index of a function in the owning
//! [`Instance`](super::Instance), or nothing.
//!
//! Tables are where the dynamic signature check of an indirect call happens:
//! the slot only names a function, and the caller must compare that function's
//! type against the type index it was compiled against before invoking it.

use super::{RuntimeError, Trap};

/// A table of function references
#[derive(Debug, Clone)]
pub struct Table {
    /// `None` is a null slot
    elements: Vec<Option<u32>>,
    max: Option<u32>,
}

impl Table {
    /// Create a table of `min` null slots
    pub fn new(min: u32, max: Option<u32>) -> Result<Self, RuntimeError> {
        if let Some(max) = max {
            if min > max {
                return Err(RuntimeError::Memory(format!(
                    "table minimum {min} exceeds maximum {max}"
                )));
            }
        }
        Ok(Table {
            elements: vec![None; min as usize],
            max,
        })
    }

    /// Current number of slots
    pub fn size(&self) -> u32 {
        self.elements.len() as u32
    }

    pub fn max(&self) -> Option<u32> {
        self.max
    }

    /// Resolve a slot to a function index
    ///
    /// # Errors
    ///
    /// - `UndefinedElement` if `index` is past the end of the table.
    /// - `UninitializedElement` if the slot is null.
    pub fn get(&self, index: u32) -> Result<u32, RuntimeError> {
        match self.elements.get(index as usize) {
            None => Err(Trap::UndefinedElement(index).into()),
            Some(None) => Err(Trap::UninitializedElement(index).into()),
            Some(Some(func_idx)) => Ok(*func_idx),
        }
    }

    /// Set or clear a slot
    pub fn set(&mut self, index: u32, func_idx: Option<u32>) -> Result<(), RuntimeError> {
        let slot = self
            .elements
            .get_mut(index as usize)
            .ok_or(Trap::UndefinedElement(index))?;
        *slot = func_idx;
        Ok(())
    }

    /// Copy function indices into consecutive slots starting at `offset`
    ///
    /// Nothing is written unless the whole range fits.
    pub fn init(&mut self, offset: u32, func_indices: &[u32]) -> Result<(), RuntimeError> {
        let start = offset as usize;
        let end = start + func_indices.len();
        if end > self.elements.len() {
            return Err(Trap::UndefinedElement(end.saturating_sub(1) as u32).into());
        }
        for (slot, func_idx) in self.elements[start..end].iter_mut().zip(func_indices) {
            *slot = Some(*func_idx);
        }
        Ok(())
    }
}
