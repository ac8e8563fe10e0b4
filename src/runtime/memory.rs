//! WebAssembly linear memory
//!
//! A single contiguous, zero-initialised byte buffer that grows in 64KiB
//! pages. Every access is bounds-checked against the current size; an access
//! whose range falls outside it is a [`Trap::MemoryOutOfBounds`].
//!
//! Addresses are taken as `u64` so that a 32-bit base plus a 32-bit static
//! offset can be checked without wrapping.

use super::{RuntimeError, Trap};
use byteorder::{ByteOrder, LittleEndian};
use std::cell::RefCell;
use std::rc::Rc;

/// WebAssembly page size in bytes (64KiB)
pub const PAGE_SIZE: usize = 65536;

/// Maximum number of pages addressable with 32-bit addresses
pub const MAX_PAGES: u32 = 65536;

/// Memory shared between an instance, its nested calls and its host functions
pub type SharedMemory = Rc<RefCell<Memory>>;

/// A linear memory instance
#[derive(Debug)]
pub struct Memory {
    data: Vec<u8>,
    current_pages: u32,
    max_pages: Option<u32>,
}

impl Memory {
    /// Create a memory of `initial_pages` zeroed pages
    ///
    /// # Errors
    /// - Initial pages exceeds the declared maximum
    /// - Either limit exceeds [`MAX_PAGES`]
    pub fn new(initial_pages: u32, max_pages: Option<u32>) -> Result<Self, RuntimeError> {
        if initial_pages > MAX_PAGES {
            return Err(RuntimeError::Memory(format!(
                "initial size {initial_pages} pages exceeds maximum {MAX_PAGES} pages"
            )));
        }
        if let Some(max) = max_pages {
            if initial_pages > max {
                return Err(RuntimeError::Memory(format!(
                    "initial size {initial_pages} pages exceeds declared maximum {max} pages"
                )));
            }
            if max > MAX_PAGES {
                return Err(RuntimeError::Memory(format!(
                    "maximum size {max} pages exceeds {MAX_PAGES} pages"
                )));
            }
        }

        Ok(Memory {
            data: vec![0u8; initial_pages as usize * PAGE_SIZE],
            current_pages: initial_pages,
            max_pages,
        })
    }

    pub fn into_shared(self) -> SharedMemory {
        Rc::new(RefCell::new(self))
    }

    /// Current size in pages
    pub fn size(&self) -> u32 {
        self.current_pages
    }

    pub fn max_pages(&self) -> Option<u32> {
        self.max_pages
    }

    /// Current size in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Grow by `delta_pages`, returning the previous size in pages or -1
    ///
    /// A failed grow leaves the memory untouched.
    pub fn grow(&mut self, delta_pages: u32) -> i32 {
        let current = self.current_pages;
        let effective_max = self.max_pages.unwrap_or(MAX_PAGES);

        let new_pages = match current.checked_add(delta_pages) {
            Some(pages) if pages <= effective_max => pages,
            _ => {
                log::debug!("memory.grow by {delta_pages} refused at {current} pages (max {effective_max})");
                return -1;
            }
        };

        let new_bytes = new_pages as usize * PAGE_SIZE;
        if self.data.try_reserve(new_bytes - self.data.len()).is_err() {
            log::debug!("memory.grow by {delta_pages} failed to allocate");
            return -1;
        }
        self.data.resize(new_bytes, 0);
        self.current_pages = new_pages;
        log::debug!("memory grown from {current} to {new_pages} pages");
        current as i32
    }

    /// Validate an access of `size` bytes at `addr`, returning the start offset
    #[inline]
    fn check_bounds(&self, addr: u64, size: usize) -> Result<usize, RuntimeError> {
        let end = addr.checked_add(size as u64).ok_or(Trap::MemoryOutOfBounds)?;
        if end > self.data.len() as u64 {
            return Err(Trap::MemoryOutOfBounds.into());
        }
        Ok(addr as usize)
    }

    fn slice(&self, addr: u64, size: usize) -> Result<&[u8], RuntimeError> {
        let start = self.check_bounds(addr, size)?;
        Ok(&self.data[start..start + size])
    }

    fn slice_mut(&mut self, addr: u64, size: usize) -> Result<&mut [u8], RuntimeError> {
        let start = self.check_bounds(addr, size)?;
        Ok(&mut self.data[start..start + size])
    }

    pub fn read_u8(&self, addr: u64) -> Result<u8, RuntimeError> {
        Ok(self.slice(addr, 1)?[0])
    }

    pub fn read_u16(&self, addr: u64) -> Result<u16, RuntimeError> {
        Ok(LittleEndian::read_u16(self.slice(addr, 2)?))
    }

    pub fn read_u32(&self, addr: u64) -> Result<u32, RuntimeError> {
        Ok(LittleEndian::read_u32(self.slice(addr, 4)?))
    }

    pub fn read_u64(&self, addr: u64) -> Result<u64, RuntimeError> {
        Ok(LittleEndian::read_u64(self.slice(addr, 8)?))
    }

    pub fn write_u8(&mut self, addr: u64, value: u8) -> Result<(), RuntimeError> {
        self.slice_mut(addr, 1)?[0] = value;
        Ok(())
    }

    pub fn write_u16(&mut self, addr: u64, value: u16) -> Result<(), RuntimeError> {
        LittleEndian::write_u16(self.slice_mut(addr, 2)?, value);
        Ok(())
    }

    pub fn write_u32(&mut self, addr: u64, value: u32) -> Result<(), RuntimeError> {
        LittleEndian::write_u32(self.slice_mut(addr, 4)?, value);
        Ok(())
    }

    pub fn write_u64(&mut self, addr: u64, value: u64) -> Result<(), RuntimeError> {
        LittleEndian::write_u64(self.slice_mut(addr, 8)?, value);
        Ok(())
    }

    pub fn read_f32(&self, addr: u64) -> Result<f32, RuntimeError> {
        Ok(f32::from_bits(self.read_u32(addr)?))
    }

    pub fn read_f64(&self, addr: u64) -> Result<f64, RuntimeError> {
        Ok(f64::from_bits(self.read_u64(addr)?))
    }

    pub fn write_f32(&mut self, addr: u64, value: f32) -> Result<(), RuntimeError> {
        self.write_u32(addr, value.to_bits())
    }

    pub fn write_f64(&mut self, addr: u64, value: f64) -> Result<(), RuntimeError> {
        self.write_u64(addr, value.to_bits())
    }

    /// Copy `len` bytes out of memory
    pub fn read_bytes(&self, addr: u64, len: usize) -> Result<Vec<u8>, RuntimeError> {
        Ok(self.slice(addr, len)?.to_vec())
    }

    /// Copy `bytes` into memory; nothing is written if any byte would be out of bounds
    pub fn write_bytes(&mut self, addr: u64, bytes: &[u8]) -> Result<(), RuntimeError> {
        self.slice_mut(addr, bytes.len())?.copy_from_slice(bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const END: u64 = PAGE_SIZE as u64;

    #[test]
    fn test_memory_creation() {
        let mem = Memory::new(1, None).unwrap();
        assert_eq!(mem.size(), 1);
        assert_eq!(mem.len(), PAGE_SIZE);

        let mem = Memory::new(0, Some(10)).unwrap();
        assert!(mem.is_empty());
        assert_eq!(mem.max_pages(), Some(10));
    }

    #[test]
    fn test_memory_creation_errors() {
        assert!(Memory::new(10, Some(5)).is_err());
        assert!(Memory::new(MAX_PAGES + 1, None).is_err());
        assert!(Memory::new(1, Some(MAX_PAGES + 1)).is_err());
    }

    #[test]
    fn test_memory_grow() {
        let mut mem = Memory::new(1, Some(10)).unwrap();

        assert_eq!(mem.grow(2), 1);
        assert_eq!(mem.size(), 3);
        assert_eq!(mem.len(), 3 * PAGE_SIZE);

        assert_eq!(mem.grow(7), 3);
        assert_eq!(mem.size(), 10);

        assert_eq!(mem.grow(1), -1);
        assert_eq!(mem.size(), 10);

        // growing by zero reports the size and always succeeds
        assert_eq!(mem.grow(0), 10);
    }

    #[test]
    fn test_memory_grow_overflow() {
        let mut mem = Memory::new(1, None).unwrap();
        assert_eq!(mem.grow(u32::MAX), -1);
        assert_eq!(mem.size(), 1);
    }

    #[test]
    fn test_bounds_checking() {
        let mem = Memory::new(1, None).unwrap();

        assert!(mem.check_bounds(0, 1).is_ok());
        assert!(mem.check_bounds(END - 1, 1).is_ok());
        assert!(mem.check_bounds(0, PAGE_SIZE).is_ok());
        assert!(mem.check_bounds(END, 0).is_ok());

        assert!(mem.check_bounds(END, 1).is_err());
        assert!(mem.check_bounds(END - 1, 2).is_err());
        assert!(mem.check_bounds(u64::MAX, 1).is_err());

        let err = mem.read_u32(END - 3).unwrap_err();
        assert_eq!(err.trap(), Some(&Trap::MemoryOutOfBounds));
    }

    #[test]
    fn test_little_endian_layout() {
        let mut mem = Memory::new(1, None).unwrap();

        mem.write_u32(100, 0x12345678).unwrap();
        assert_eq!(mem.read_bytes(100, 4).unwrap(), vec![0x78, 0x56, 0x34, 0x12]);
        assert_eq!(mem.read_u16(100).unwrap(), 0x5678);

        mem.write_u64(END - 8, u64::MAX).unwrap();
        assert_eq!(mem.read_u64(END - 8).unwrap(), u64::MAX);
        assert!(mem.write_u64(END - 7, 1).is_err());
    }

    #[test]
    fn test_floating_point() {
        let mut mem = Memory::new(1, None).unwrap();

        mem.write_f32(0, std::f32::consts::PI).unwrap();
        assert_eq!(mem.read_f32(0).unwrap(), std::f32::consts::PI);

        mem.write_f64(10, std::f64::consts::E).unwrap();
        assert_eq!(mem.read_f64(10).unwrap(), std::f64::consts::E);

        let nan = f32::from_bits(0x7FC0_1234);
        mem.write_f32(24, nan).unwrap();
        assert_eq!(mem.read_f32(24).unwrap().to_bits(), 0x7FC0_1234);
    }

    #[test]
    fn test_failed_write_is_atomic() {
        let mut mem = Memory::new(1, None).unwrap();
        assert!(mem.write_bytes(END - 2, &[1, 2, 3, 4]).is_err());
        assert_eq!(mem.read_bytes(END - 2, 2).unwrap(), vec![0, 0]);
    }

    #[test]
    fn test_grow_zero_initialisation() {
        let mut mem = Memory::new(1, None).unwrap();
        mem.write_u32(0, 0xDEADBEEF).unwrap();

        mem.grow(1);

        assert_eq!(mem.read_u32(0).unwrap(), 0xDEADBEEF);
        assert_eq!(mem.read_u32(END).unwrap(), 0);
        assert_eq!(mem.read_u8(2 * END - 1).unwrap(), 0);
    }
}
