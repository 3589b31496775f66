use std::collections::BTreeMap;
use std::fmt::{Debug, Display};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::constants::{Address, MEMORY_SIZE};
use crate::word::Word;

mod exception;
mod memory;
mod opcode;
mod operand;
mod stack;

pub mod profiles;

pub use self::exception::Exception;
pub use self::memory::{checked_address, Memory, MemoryError};
pub use self::opcode::{NoOpcode, Opcode};
pub use self::operand::{address_of, Argument, EncodeError, Operand, Packed, Target};
pub use self::stack::{Circular, Clamped, Discipline, Stack, Strict};

pub(crate) use self::opcode::opcodes;
pub(crate) use self::operand::{field, signed_argument};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessorError {
    #[error("CPU exception: {0}")]
    Exception(#[from] Exception),

    #[error("unknown opcode {opcode} at address {pc}")]
    UnknownOpcode { opcode: i64, pc: Address },
}

// Implement a MemoryError -> ProcessorError conversion to simplify code
impl From<MemoryError> for ProcessorError {
    fn from(e: MemoryError) -> Self {
        Self::Exception(e.into())
    }
}

impl ProcessorError {
    /// Unknown opcodes mean the image is corrupted, nothing can be resumed
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::UnknownOpcode { .. })
    }
}

type Result<T> = std::result::Result<T, ProcessorError>;

/// Errors raised when loading a program in a machine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("{region} image of {len} words does not fit in memory")]
    TooLarge { region: &'static str, len: usize },

    #[error("the {profile} machine has no separate data memory")]
    UnexpectedData { profile: &'static str },
}

/// How code and data are laid out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Code and data share the same memory
    Unified,

    /// Code lives in its own memory, the program counter indexes it
    Split,
}

/// What the machine should do after an instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow<W> {
    Continue,
    Halt(W),
}

/// Labels of an assembled program, only used for diagnostics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Symbols {
    pub code: BTreeMap<String, Address>,
    pub data: BTreeMap<String, Address>,
}

impl Symbols {
    /// Find a label pointing to an address of the code
    #[must_use]
    pub fn code_label(&self, address: Address) -> Option<&str> {
        label_at(&self.code, address)
    }

    #[must_use]
    pub fn data_label(&self, address: Address) -> Option<&str> {
        label_at(&self.data, address)
    }

    /// Look up a label, code labels first
    #[must_use]
    pub fn get(&self, label: &str) -> Option<Address> {
        self.code.get(label).or_else(|| self.data.get(label)).copied()
    }
}

fn label_at(table: &BTreeMap<String, Address>, address: Address) -> Option<&str> {
    table
        .iter()
        .find(|(_, value)| **value == address)
        .map(|(label, _)| label.as_str())
}

/// An assembled program, ready to be loaded
///
/// Unified profiles only use `code`, which then holds data words as well.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program<W> {
    pub code: Vec<i64>,
    pub data: Vec<W>,
    pub symbols: Symbols,
}

/// An instruction set, plugged into the generic [`Machine`]
pub trait Profile: Sized + 'static {
    type Word: Word;

    /// Registers and stacks
    type State: Clone + Default + Debug + Display;

    type Opcode: Opcode;

    /// A decoded instruction, with every operand resolved
    type Instruction: Debug + Display;

    const NAME: &'static str;
    const LAYOUT: Layout;

    /// Number of consecutive words of an instruction
    const WIDTH: usize;

    /// Encode an instruction from its resolved source operands
    ///
    /// `opcode` is `None` for the SUBLEQ profiles, which have no mnemonics.
    ///
    /// # Errors
    ///
    /// Fails if the operands do not fit the encoding.
    fn encode(
        opcode: Option<Self::Opcode>,
        arguments: &[Argument],
    ) -> std::result::Result<Vec<i64>, EncodeError>;

    /// Words appended after the last instruction
    fn epilogue(_code_len: usize) -> Vec<i64> {
        Vec::new()
    }

    /// Check the words of an encoded instruction against the final sizes of
    /// the program, epilogue included
    ///
    /// # Errors
    ///
    /// Fails if an operand points outside of the program.
    fn check_ranges(
        _words: &[i64],
        _code_len: usize,
        _data_len: usize,
    ) -> std::result::Result<(), EncodeError> {
        Ok(())
    }

    /// Decode the instruction at `pc`, resolving every addressing mode
    ///
    /// # Errors
    ///
    /// Fails on unknown opcodes and on operands pointing outside of the memory.
    fn decode(machine: &Machine<Self>, pc: Address) -> Result<Self::Instruction>;

    /// Apply a decoded instruction and move the program counter
    ///
    /// # Errors
    ///
    /// Returns an exception if the instruction faults. The machine state must
    /// then be left untouched.
    fn execute(
        instruction: Self::Instruction,
        machine: &mut Machine<Self>,
    ) -> std::result::Result<Flow<Self::Word>, Exception>;
}

pub struct Machine<P: Profile> {
    /// Code memory of split profiles, empty otherwise
    pub code: Memory<i64>,
    pub memory: Memory<P::Word>,
    pub state: P::State,
    pub pc: Address,
    pub cycles: usize,
    pub symbols: Symbols,
    halt_value: Option<P::Word>,
}

impl<P: Profile> Default for Machine<P> {
    fn default() -> Self {
        let code = match P::LAYOUT {
            Layout::Unified => Memory::sized(0),
            Layout::Split => Memory::default(),
        };

        Self {
            code,
            memory: Memory::default(),
            state: P::State::default(),
            pc: 0,
            cycles: 0,
            symbols: Symbols::default(),
            halt_value: None,
        }
    }
}

impl<P: Profile> std::fmt::Debug for Machine<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Machine<{}> {{ pc: {}, state: {:?}, memory: [...] }}",
            P::NAME,
            self.pc,
            self.state
        )
    }
}

impl<P: Profile> Machine<P> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a machine and load a program in it
    ///
    /// # Errors
    ///
    /// Fails if the program does not fit in the machine.
    pub fn with_program(program: &Program<P::Word>) -> std::result::Result<Self, LoadError> {
        let mut machine = Self::new();
        machine.load(program)?;
        Ok(machine)
    }

    /// Copy a program in memory
    ///
    /// Words are cloned, the machine never aliases the program buffers.
    ///
    /// # Errors
    ///
    /// Fails if an image is too large, or if a unified profile is given data.
    #[tracing::instrument(skip_all, fields(profile = P::NAME))]
    pub fn load(&mut self, program: &Program<P::Word>) -> std::result::Result<(), LoadError> {
        match P::LAYOUT {
            Layout::Unified => {
                if !program.data.is_empty() {
                    return Err(LoadError::UnexpectedData { profile: P::NAME });
                }
                let image: Vec<P::Word> = program
                    .code
                    .iter()
                    .map(|word| <P::Word as Word>::from_i64(*word))
                    .collect();
                self.memory.load(&image).map_err(|_| LoadError::TooLarge {
                    region: "code",
                    len: image.len(),
                })?;
            }
            Layout::Split => {
                self.code.load(&program.code).map_err(|_| LoadError::TooLarge {
                    region: "code",
                    len: program.code.len(),
                })?;
                self.memory.load(&program.data).map_err(|_| LoadError::TooLarge {
                    region: "data",
                    len: program.data.len(),
                })?;
            }
        }

        self.symbols = program.symbols.clone();
        debug!(
            code = program.code.len(),
            data = program.data.len(),
            "Program loaded"
        );
        Ok(())
    }

    /// Read the raw word at an address of the code
    ///
    /// # Errors
    ///
    /// Fails if the address is outside of the code memory.
    pub fn fetch(&self, address: Address) -> std::result::Result<i64, Exception> {
        match P::LAYOUT {
            Layout::Split => Ok(self.code.read(address)?),
            Layout::Unified => {
                let word = self.memory.get(address)?;
                word.to_i64()
                    .ok_or_else(|| Exception::NotAnAddress(word.to_string()))
            }
        }
    }

    /// # Errors
    ///
    /// Fails if the address is outside of the memory.
    pub fn read(&self, address: Address) -> std::result::Result<P::Word, Exception> {
        Ok(self.memory.read(address)?)
    }

    /// # Errors
    ///
    /// Fails if the address is outside of the memory.
    pub fn write(&mut self, address: Address, value: P::Word) -> std::result::Result<(), Exception> {
        self.memory.write(address, value)?;
        Ok(())
    }

    /// Compute the effective address of an operand against the data memory
    ///
    /// # Errors
    ///
    /// See [`Operand::resolve`].
    pub fn resolve(&self, operand: Operand) -> std::result::Result<Target, Exception> {
        operand.resolve(&self.memory)
    }

    /// Address of the instruction following the one at `pc`
    #[must_use]
    pub fn next(&self) -> Address {
        self.pc + P::WIDTH
    }

    /// Decode the instruction at an address without executing it
    ///
    /// # Errors
    ///
    /// Fails if the instruction is not fully inside the memory, if its opcode
    /// is unknown, or if one of its operands can not be resolved.
    pub fn disassemble(&self, address: Address) -> Result<P::Instruction> {
        if address + P::WIDTH > MEMORY_SIZE {
            return Err(Exception::OutOfRange(address as i64).into());
        }
        P::decode(self, address)
    }

    /// Execute one instruction
    ///
    /// Returns whether the machine is halted. Stepping a halted machine does
    /// nothing.
    ///
    /// # Errors
    ///
    /// Fails if the instruction can not be decoded or faults. The machine is
    /// left in its state before the instruction.
    #[tracing::instrument(skip(self), fields(pc = self.pc), level = "debug")]
    pub fn step(&mut self) -> Result<bool> {
        if self.is_halted() {
            return Ok(true);
        }

        let instruction = self.disassemble(self.pc).map_err(|e| {
            warn!(error = %e, "Could not decode instruction");
            e
        })?;
        debug!(
            label = self.symbols.code_label(self.pc).unwrap_or_default(),
            "Executing instruction \"{}\"", instruction
        );

        let flow = P::execute(instruction, self).map_err(|e| {
            warn!(exception = e.code(), "{}", e);
            e
        })?;
        self.cycles += 1;

        match flow {
            Flow::Continue => Ok(false),
            Flow::Halt(value) => {
                info!(cycles = self.cycles, "Halted with value {}", value);
                self.halt_value = Some(value);
                Ok(true)
            }
        }
    }

    /// Step until the machine halts
    ///
    /// There is no limit on the number of steps, see [`Machine::run_for`].
    ///
    /// # Errors
    ///
    /// Stops on the first error.
    #[tracing::instrument(skip(self), fields(profile = P::NAME))]
    pub fn run(&mut self) -> Result<()> {
        while !self.step()? {}
        Ok(())
    }

    /// Step until the machine halts, at most `budget` times
    ///
    /// Returns whether the machine halted.
    ///
    /// # Errors
    ///
    /// Stops on the first error.
    #[tracing::instrument(skip(self), fields(profile = P::NAME))]
    pub fn run_for(&mut self, budget: usize) -> Result<bool> {
        for _ in 0..budget {
            if self.step()? {
                return Ok(true);
            }
        }
        Ok(self.is_halted())
    }

    /// The data memory, or the whole memory of unified profiles
    #[must_use]
    pub fn mem(&self) -> &[P::Word] {
        self.memory.as_slice()
    }

    #[must_use]
    pub fn halt_value(&self) -> Option<&P::Word> {
        self.halt_value.as_ref()
    }

    #[must_use]
    pub fn is_halted(&self) -> bool {
        self.halt_value.is_some()
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use super::profiles::{Bvm2, Subleq2, Vm1, Vm2};
    use super::*;
    use crate::assemble;

    const COUNT_LOOP: &str = indoc! {"
                LIT 300 count
        loop:   ADD step sum
                DJNZ count loop
                HLT sum
        step:   7
        count:  0
        sum:    0
    "};

    #[test]
    fn load_too_large_test() {
        let program = Program {
            code: vec![0; MEMORY_SIZE + 1],
            ..Program::default()
        };
        assert_eq!(
            Machine::<Vm1>::with_program(&program).unwrap_err(),
            LoadError::TooLarge {
                region: "code",
                len: 32001
            }
        );
        let program = Program::<i64> {
            code: program.code,
            ..Program::default()
        };
        assert_eq!(
            Machine::<Bvm2<i64>>::with_program(&program).unwrap_err(),
            LoadError::TooLarge {
                region: "code",
                len: 32001
            }
        );

        let program = Program {
            code: vec![0, 0, 0],
            data: vec![0_i64; MEMORY_SIZE + 1],
            symbols: Symbols::default(),
        };
        assert_eq!(
            Machine::<Subleq2>::with_program(&program).unwrap_err(),
            LoadError::TooLarge {
                region: "data",
                len: 32001
            }
        );

        let program = Program {
            code: vec![0; MEMORY_SIZE],
            ..Program::default()
        };
        assert!(Machine::<Vm1>::with_program(&program).is_ok());
    }

    #[test]
    fn unexpected_data_test() {
        let program = Program {
            code: vec![0],
            data: vec![1_u32],
            symbols: Symbols::default(),
        };
        let error = Machine::<Vm1>::with_program(&program).unwrap_err();
        assert_eq!(error, LoadError::UnexpectedData { profile: "vm1" });
        assert_eq!(
            error.to_string(),
            "the vm1 machine has no separate data memory"
        );
    }

    #[test]
    fn determinism_test() {
        let program = assemble::<Vm2>(COUNT_LOOP).unwrap();
        let mut first = Machine::<Vm2>::with_program(&program).unwrap();
        let mut second = Machine::<Vm2>::with_program(&program).unwrap();
        first.run().unwrap();
        second.run().unwrap();

        assert_eq!(first.halt_value(), Some(&2100));
        assert_eq!(first.halt_value(), second.halt_value());
        assert_eq!(first.cycles, second.cycles);
        assert_eq!(first.mem(), second.mem());
    }

    #[test]
    fn load_copies_program_test() {
        let program = assemble::<Vm2>(COUNT_LOOP).unwrap();
        let pristine = program.clone();

        let mut machine = Machine::<Vm2>::with_program(&program).unwrap();
        machine.run().unwrap();
        assert_eq!(machine.mem()[10], 2100);
        machine.write(10, 99).unwrap();
        assert_eq!(program, pristine);

        // Loading again restores the image
        machine.load(&program).unwrap();
        assert_eq!(machine.mem()[8], 7);
        assert_eq!(machine.mem()[10], 0);
        assert_eq!(machine.symbols, program.symbols);
    }

    #[test]
    fn disassemble_bounds_test() {
        let machine = Machine::<Bvm2<i64>>::new();
        assert!(machine.disassemble(MEMORY_SIZE - 3).is_ok());
        assert_eq!(
            machine.disassemble(MEMORY_SIZE - 2).unwrap_err(),
            ProcessorError::Exception(Exception::OutOfRange(31998))
        );

        let machine = Machine::<Vm2>::new();
        assert!(machine.disassemble(MEMORY_SIZE - 2).is_ok());
        assert_eq!(
            machine.disassemble(MEMORY_SIZE - 1).unwrap_err(),
            ProcessorError::Exception(Exception::OutOfRange(31999))
        );
        assert_eq!(
            machine.disassemble(MEMORY_SIZE).unwrap_err(),
            ProcessorError::Exception(Exception::OutOfRange(32000))
        );
    }
}
