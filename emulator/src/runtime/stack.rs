//! Bounded operand stacks
//!
//! A [`Stack`] never grows: it has [`STACK_SIZE`] slots and a stack pointer
//! that always indexes the top of the stack. What happens at the boundaries
//! is decided by its [`Discipline`].

use std::fmt::Debug;
use std::marker::PhantomData;

use crate::constants::STACK_SIZE;

use super::Exception;

const TOP: usize = STACK_SIZE - 1;

/// Boundary policy of a [`Stack`]
pub trait Discipline: Copy + Default + Debug + 'static {
    const NAME: &'static str;

    /// Slot written by a push, given the current pointer and depth
    ///
    /// # Errors
    ///
    /// Strict stacks overflow when every slot is live.
    fn advance(sp: usize, depth: usize) -> Result<usize, Exception>;

    /// Pointer after a pop
    ///
    /// # Errors
    ///
    /// Strict stacks underflow when no slot is live.
    fn retreat(sp: usize, depth: usize) -> Result<usize, Exception>;

    /// Check that `count` values can be read from the top of the stack
    ///
    /// # Errors
    ///
    /// Strict stacks underflow when fewer values were pushed.
    fn require(_depth: usize, _count: usize) -> Result<(), Exception> {
        Ok(())
    }
}

/// Keeps acting on the boundary slot instead of failing
///
/// Popping at the bottom keeps returning the bottom slot, pushing at the top
/// keeps overwriting the top slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Clamped;

impl Discipline for Clamped {
    const NAME: &'static str = "clamped";

    fn advance(sp: usize, _depth: usize) -> Result<usize, Exception> {
        Ok((sp + 1).min(TOP))
    }

    fn retreat(sp: usize, _depth: usize) -> Result<usize, Exception> {
        Ok(sp.saturating_sub(1))
    }
}

/// Raises [`Exception::StackOverflow`] and [`Exception::StackUnderflow`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Strict;

impl Discipline for Strict {
    const NAME: &'static str = "strict";

    fn advance(sp: usize, depth: usize) -> Result<usize, Exception> {
        match depth {
            0 => Ok(sp),
            STACK_SIZE.. => Err(Exception::StackOverflow),
            _ => Ok(sp + 1),
        }
    }

    fn retreat(sp: usize, depth: usize) -> Result<usize, Exception> {
        if depth == 0 {
            Err(Exception::StackUnderflow)
        } else {
            Ok(sp.saturating_sub(1))
        }
    }

    fn require(depth: usize, count: usize) -> Result<(), Exception> {
        if depth < count {
            Err(Exception::StackUnderflow)
        } else {
            Ok(())
        }
    }
}

/// Wraps around, the oldest values get overwritten
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Circular;

impl Discipline for Circular {
    const NAME: &'static str = "circular";

    fn advance(sp: usize, _depth: usize) -> Result<usize, Exception> {
        Ok((sp + 1) % STACK_SIZE)
    }

    fn retreat(sp: usize, _depth: usize) -> Result<usize, Exception> {
        Ok((sp + TOP) % STACK_SIZE)
    }
}

/// An 8-slot stack
#[derive(Clone, PartialEq)]
pub struct Stack<W, D = Clamped> {
    slots: [W; STACK_SIZE],
    sp: usize,
    depth: usize,
    discipline: PhantomData<D>,
}

impl<W: Default, D> Default for Stack<W, D> {
    fn default() -> Self {
        Self {
            slots: std::array::from_fn(|_| W::default()),
            sp: 0,
            depth: 0,
            discipline: PhantomData,
        }
    }
}

impl<W: Debug, D: Discipline> Debug for Stack<W, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stack")
            .field("discipline", &D::NAME)
            .field("sp", &self.sp)
            .field("slots", &self.slots)
            .finish()
    }
}

impl<W: std::fmt::Display, D> std::fmt::Display for Stack<W, D> {
    /// Slots from the bottom up, the top of the stack marked with `*`
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[")?;
        for (index, slot) in self.slots.iter().enumerate() {
            if index > 0 {
                write!(f, " ")?;
            }
            if index == self.sp {
                write!(f, "*")?;
            }
            write!(f, "{slot}")?;
        }
        write!(f, "]")
    }
}

impl<W: Clone, D: Discipline> Stack<W, D> {
    /// Index of the top of the stack
    #[must_use]
    pub fn sp(&self) -> usize {
        self.sp
    }

    /// Number of live values, saturated at the capacity
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// # Errors
    ///
    /// Fails on a full strict stack.
    pub fn push(&mut self, value: W) -> Result<(), Exception> {
        self.sp = D::advance(self.sp, self.depth)?;
        self.slots[self.sp] = value;
        self.depth = (self.depth + 1).min(STACK_SIZE);
        Ok(())
    }

    /// # Errors
    ///
    /// Fails on an empty strict stack.
    pub fn pop(&mut self) -> Result<W, Exception> {
        let next = D::retreat(self.sp, self.depth)?;
        let value = self.slots[self.sp].clone();
        self.sp = next;
        self.depth = self.depth.saturating_sub(1);
        Ok(value)
    }

    /// Read the top of the stack without removing it
    ///
    /// # Errors
    ///
    /// Fails on an empty strict stack.
    pub fn peek(&self) -> Result<W, Exception> {
        D::require(self.depth, 1)?;
        Ok(self.slots[self.sp].clone())
    }

    /// Overwrite the top of the stack
    ///
    /// # Errors
    ///
    /// Fails on an empty strict stack.
    pub fn replace(&mut self, value: W) -> Result<(), Exception> {
        D::require(self.depth, 1)?;
        self.slots[self.sp] = value;
        Ok(())
    }

    /// `( a -- a a )`
    ///
    /// # Errors
    ///
    /// Propagates the boundary errors of strict stacks.
    pub fn dup(&mut self) -> Result<(), Exception> {
        let top = self.peek()?;
        self.push(top)
    }

    /// `( a -- )`
    ///
    /// # Errors
    ///
    /// Propagates the boundary errors of strict stacks.
    pub fn drop(&mut self) -> Result<(), Exception> {
        self.pop().map(|_| ())
    }

    /// `( a b -- b a )`
    ///
    /// # Errors
    ///
    /// Propagates the boundary errors of strict stacks.
    pub fn swap(&mut self) -> Result<(), Exception> {
        let b = self.pop()?;
        let a = self.peek()?;
        self.replace(b)?;
        self.push(a)
    }

    /// `( a b c -- b c a )`
    ///
    /// # Errors
    ///
    /// Propagates the boundary errors of strict stacks.
    pub fn rot(&mut self) -> Result<(), Exception> {
        let c = self.pop()?;
        let b = self.pop()?;
        let a = self.pop()?;
        self.push(b)?;
        self.push(c)?;
        self.push(a)
    }

    /// `( a b -- a b a )`
    ///
    /// # Errors
    ///
    /// Propagates the boundary errors of strict stacks.
    pub fn over(&mut self) -> Result<(), Exception> {
        let b = self.pop()?;
        let a = self.peek()?;
        self.push(b)?;
        self.push(a)
    }
}
