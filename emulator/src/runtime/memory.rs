use thiserror::Error;

use crate::constants::{Address, MEMORY_SIZE};

/// Represents errors related to memory manipulations
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MemoryError {
    /// The given address is outside of the memory
    #[error("address {0} is out of range")]
    OutOfRange(i64),
}

/// Convert a raw operand to an address, checking it against the memory size
///
/// # Errors
///
/// Fails if the value is negative or past the end of the memory.
pub fn checked_address(value: i64) -> Result<Address, MemoryError> {
    Address::try_from(value)
        .ok()
        .filter(|address| *address < MEMORY_SIZE)
        .ok_or(MemoryError::OutOfRange(value))
}

/// Holds the cells of a machine
///
/// Every cell is zero-initialized. Code memories of split profiles are a
/// `Memory<i64>`.
#[derive(Clone, PartialEq)]
pub struct Memory<W> {
    inner: Box<[W]>,
}

impl<W: Clone + Default> Default for Memory<W> {
    fn default() -> Self {
        Self::sized(MEMORY_SIZE)
    }
}

impl<W> std::fmt::Debug for Memory<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Memory {{ size: {}, cells: [...] }}", self.inner.len())
    }
}

impl<W: Clone + Default> Memory<W> {
    /// Create a zeroed memory of a given size
    pub(crate) fn sized(size: usize) -> Self {
        Self {
            inner: vec![W::default(); size].into_boxed_slice(),
        }
    }

    /// Get a cell at an address
    ///
    /// # Errors
    ///
    /// It fails if the address is out of bounds.
    pub fn get(&self, address: Address) -> Result<&W, MemoryError> {
        self.inner
            .get(address)
            .ok_or(MemoryError::OutOfRange(address as i64))
    }

    /// Get a mutable reference to a cell at an address
    ///
    /// # Errors
    ///
    /// It fails if the address is out of bounds.
    pub fn get_mut(&mut self, address: Address) -> Result<&mut W, MemoryError> {
        self.inner
            .get_mut(address)
            .ok_or(MemoryError::OutOfRange(address as i64))
    }

    /// Copy the value of a cell
    ///
    /// # Errors
    ///
    /// It fails if the address is out of bounds.
    pub fn read(&self, address: Address) -> Result<W, MemoryError> {
        self.get(address).cloned()
    }

    /// # Errors
    ///
    /// It fails if the address is out of bounds.
    pub fn write(&mut self, address: Address, value: W) -> Result<(), MemoryError> {
        *self.get_mut(address)? = value;
        Ok(())
    }

    /// Copy an image at the start of the memory
    ///
    /// Each word is cloned, the memory never shares a cell with the caller.
    ///
    /// # Errors
    ///
    /// It fails if the image does not fit.
    pub fn load(&mut self, image: &[W]) -> Result<(), MemoryError> {
        let target = self
            .inner
            .get_mut(..image.len())
            .ok_or(MemoryError::OutOfRange(image.len() as i64))?;
        target.clone_from_slice(image);
        Ok(())
    }

    #[must_use]
    pub fn as_slice(&self) -> &[W] {
        &self.inner
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
