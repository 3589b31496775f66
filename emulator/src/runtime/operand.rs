//! Addressing modes, shared by the decoders and the assembler

use thiserror::Error;

use crate::constants::{Address, INDEX_BITS, INDEX_MASK, OPCODE_SHIFT, OPERAND_MASK};
use crate::word::Word;

use super::memory::{checked_address, Memory};
use super::Exception;

/// An operand as it was encoded, before any memory access
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    Direct(Address),

    /// The effective address is stored at the given address
    Indirect(Address),

    /// The effective address is the sum of the two cells
    BaseIndex { base: Address, index: Address },
}

impl Operand {
    /// Decode the multi-word convention, where a negative value means one
    /// level of indirection
    ///
    /// # Errors
    ///
    /// Fails if the address is outside of the memory.
    pub fn from_signed(raw: i64) -> Result<Self, Exception> {
        if raw < 0 {
            let pointer = raw.checked_neg().ok_or(Exception::OutOfRange(raw))?;
            Ok(Self::Indirect(checked_address(pointer)?))
        } else {
            Ok(Self::Direct(checked_address(raw)?))
        }
    }

    /// Decode a 24-bit packed operand
    ///
    /// # Errors
    ///
    /// Fails if one of the encoded addresses is outside of the memory.
    pub fn from_packed(operand: u32, indirect: bool, base_index: bool) -> Result<Self, Exception> {
        if base_index {
            Ok(Self::BaseIndex {
                base: checked_address(i64::from(operand >> INDEX_BITS))?,
                index: checked_address(i64::from(operand & INDEX_MASK))?,
            })
        } else if indirect {
            Ok(Self::Indirect(checked_address(i64::from(operand))?))
        } else {
            Ok(Self::Direct(checked_address(i64::from(operand))?))
        }
    }

    /// Compute the effective address, reading the memory at most once per
    /// encoded address
    ///
    /// # Errors
    ///
    /// Fails if the effective address is outside of the memory, or if an
    /// indirect cell holds another indirection.
    pub fn resolve<W: Word>(self, memory: &Memory<W>) -> Result<Target, Exception> {
        let address = match self {
            Self::Direct(address) => address,
            Self::Indirect(pointer) => {
                let value = signed(memory.get(pointer)?)?;
                if value < 0 {
                    return Err(Exception::DoubleIndirect(pointer));
                }
                checked_address(value)?
            }
            Self::BaseIndex { base, index } => {
                let base = signed(memory.get(base)?)?;
                let index = signed(memory.get(index)?)?;
                let sum = base.checked_add(index).ok_or(Exception::OutOfRange(base))?;
                checked_address(sum)?
            }
        };

        Ok(Target {
            operand: self,
            address,
        })
    }
}

impl std::fmt::Display for Operand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Direct(address) => write!(f, "{address}"),
            Self::Indirect(pointer) => write!(f, "[{pointer}]"),
            Self::BaseIndex { base, index } => write!(f, "[{base}, {index}]"),
        }
    }
}

/// A resolved operand: how it was encoded and where it points to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
    pub operand: Operand,
    pub address: Address,
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.operand {
            Operand::Direct(_) => write!(f, "{}", self.operand),
            _ if f.alternate() => write!(f, "{} ({})", self.operand, self.address),
            _ => write!(f, "{}", self.operand),
        }
    }
}

fn signed<W: Word>(value: &W) -> Result<i64, Exception> {
    value
        .to_i64()
        .ok_or_else(|| Exception::NotAnAddress(value.to_string()))
}

/// Use a word as an address
///
/// # Errors
///
/// Fails if the word is not a valid address.
pub fn address_of<W: Word>(value: &W) -> Result<Address, Exception> {
    checked_address(signed(value)?).map_err(Exception::from)
}

/// The fields of a packed single-word instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packed {
    /// Opcode byte, mode bits included
    pub byte: u8,
    pub operand: u32,
}

impl Packed {
    /// Mask of the mode bits in the opcode byte
    pub const MODE_MASK: u8 = 0xC0;

    #[must_use]
    pub fn split(word: i64) -> Self {
        let word = word as u32;
        Self {
            byte: (word >> OPCODE_SHIFT) as u8,
            operand: word & OPERAND_MASK,
        }
    }

    #[must_use]
    pub fn join(self) -> i64 {
        i64::from((u32::from(self.byte) << OPCODE_SHIFT) | (self.operand & OPERAND_MASK))
    }

    /// The opcode, without its mode bits
    #[must_use]
    pub fn opcode(self) -> u8 {
        self.byte & !Self::MODE_MASK
    }

    #[must_use]
    pub fn modes(self) -> u8 {
        self.byte & Self::MODE_MASK
    }
}

/// An operand as written in an assembly source, after symbol resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Argument {
    Direct(i64),
    Indirect(i64),
    BaseIndex(i64, i64),
}

impl Argument {
    pub(crate) const fn mode(&self) -> &'static str {
        match self {
            Self::Direct(_) => "direct",
            Self::Indirect(_) => "indirect",
            Self::BaseIndex(_, _) => "base-index",
        }
    }
}

/// Reasons why an instruction can not be encoded
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("expected between {min} and {max} operands, got {got}")]
    OperandCount { min: usize, max: usize, got: usize },

    #[error("operand {0} does not fit in the instruction")]
    OutOfRange(i64),

    #[error("{mode} addressing is not supported here")]
    UnsupportedMode { mode: &'static str },

    #[error("an instruction needs a mnemonic")]
    MissingOpcode,

    #[error("indirection through address 0 can not be encoded")]
    IndirectThroughZero,

    #[error("operand resolves to 0, which reads as no operand; use LIT 0 instead")]
    ZeroOperand,

    #[error("jump target {0} is outside of the code")]
    JumpOutsideCode(i64),

    #[error("operand {0} is outside of the data")]
    OutsideData(i64),
}

impl EncodeError {
    /// Check the number of operands of an instruction
    ///
    /// # Errors
    ///
    /// Fails when the count is not in `min..=max`.
    pub fn check_count(arguments: &[Argument], min: usize, max: usize) -> Result<(), Self> {
        if (min..=max).contains(&arguments.len()) {
            Ok(())
        } else {
            Err(Self::OperandCount {
                min,
                max,
                got: arguments.len(),
            })
        }
    }
}

/// Check that a value fits in the bits of `mask`
pub(crate) fn field(value: i64, mask: u32) -> Result<u32, EncodeError> {
    u32::try_from(value)
        .ok()
        .filter(|field| field & !mask == 0)
        .ok_or(EncodeError::OutOfRange(value))
}

/// Encode a multi-word operand, negating indirect addresses
pub(crate) fn signed_argument(argument: Argument) -> Result<i64, EncodeError> {
    match argument {
        Argument::Direct(value) if value >= 0 => Ok(value),
        Argument::Direct(value) => Err(EncodeError::OutOfRange(value)),
        Argument::Indirect(0) => Err(EncodeError::IndirectThroughZero),
        Argument::Indirect(pointer) if pointer > 0 => Ok(-pointer),
        Argument::Indirect(pointer) => Err(EncodeError::OutOfRange(pointer)),
        argument @ Argument::BaseIndex(_, _) => Err(EncodeError::UnsupportedMode {
            mode: argument.mode(),
        }),
    }
}
