//! Memory-to-memory machine with two operands
//!
//! An instruction takes two words. The first one packs the opcode byte and
//! the 24-bit operand A, the second one is operand B.

use bitflags::bitflags;

use super::{branch, NoRegisters};
use crate::constants::{Address, OPERAND_MASK};
use crate::runtime::{
    checked_address, field, opcodes, Argument, EncodeError, Exception, Flow, Layout, Machine,
    Opcode, Operand, Packed, ProcessorError, Profile, Target,
};
use crate::word::Word;

opcodes! {
    pub enum Vm2Opcode {
        Hlt = 0,
        Mov = 1,
        Jsr = 2,
        Add = 3,
        Djnz = 4,
        Jmp = 5,
        Lit = 6,
        And = 7,
        Shl = 8,
        Sub = 9,
        Or = 10,
        Jnz = 11,
    }
}

bitflags! {
    /// Addressing mode bits of the opcode byte
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Mode: u8 {
        const INDIRECT_A = 0x80;
        const INDIRECT_B = 0x40;
    }
}

/// Operand A, which is a literal for `LIT`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Immediate(u32),
    Memory(Target),
}

impl Source {
    fn address(self) -> Address {
        match self {
            Self::Immediate(_) => 0,
            Self::Memory(target) => target.address,
        }
    }

    /// The literal, or the word at the target
    fn value(self, machine: &Machine<Vm2>) -> Result<u32, Exception> {
        match self {
            Self::Immediate(value) => Ok(value),
            Self::Memory(target) => machine.read(target.address),
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Immediate(value) => write!(f, "#{value}"),
            Self::Memory(target) if f.alternate() => write!(f, "{target:#}"),
            Self::Memory(target) => write!(f, "{target}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub opcode: Vm2Opcode,
    pub a: Source,
    pub b: Target,
}

impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if f.alternate() {
            write!(f, "{} {:#} {:#}", self.opcode, self.a, self.b)
        } else {
            write!(f, "{} {} {}", self.opcode, self.a, self.b)
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Vm2;

impl Profile for Vm2 {
    type Word = u32;
    type State = NoRegisters;
    type Opcode = Vm2Opcode;
    type Instruction = Instruction;

    const NAME: &'static str = "vm2";
    const LAYOUT: Layout = Layout::Unified;
    const WIDTH: usize = 2;

    fn encode(opcode: Option<Vm2Opcode>, arguments: &[Argument]) -> Result<Vec<i64>, EncodeError> {
        let opcode = opcode.ok_or(EncodeError::MissingOpcode)?;
        EncodeError::check_count(arguments, 1, 2)?;

        let mut mode = Mode::empty();
        let a = match arguments[0] {
            Argument::Direct(value) => field(value, OPERAND_MASK)?,
            Argument::Indirect(pointer) if opcode != Vm2Opcode::Lit => {
                mode |= Mode::INDIRECT_A;
                field(pointer, OPERAND_MASK)?
            }
            argument => {
                return Err(EncodeError::UnsupportedMode {
                    mode: argument.mode(),
                })
            }
        };
        let b = match arguments.get(1).copied().unwrap_or(Argument::Direct(0)) {
            Argument::Direct(value) => field(value, u32::MAX)?,
            Argument::Indirect(pointer) => {
                mode |= Mode::INDIRECT_B;
                field(pointer, u32::MAX)?
            }
            argument @ Argument::BaseIndex(_, _) => {
                return Err(EncodeError::UnsupportedMode {
                    mode: argument.mode(),
                })
            }
        };

        let packed = Packed {
            byte: opcode.code() as u8 | mode.bits(),
            operand: a,
        };
        Ok(vec![packed.join(), i64::from(b)])
    }

    fn decode(machine: &Machine<Self>, pc: Address) -> Result<Instruction, ProcessorError> {
        let packed = Packed::split(machine.fetch(pc)?);
        let code = i64::from(packed.opcode());
        let opcode =
            Vm2Opcode::from_code(code).ok_or(ProcessorError::UnknownOpcode { opcode: code, pc })?;
        let mode = Mode::from_bits_truncate(packed.modes());

        let a = if opcode == Vm2Opcode::Lit {
            Source::Immediate(packed.operand)
        } else {
            let indirect = mode.contains(Mode::INDIRECT_A);
            let operand = Operand::from_packed(packed.operand, indirect, false)?;
            Source::Memory(machine.resolve(operand)?)
        };

        let b = checked_address(machine.fetch(pc + 1)?)?;
        let b = if mode.contains(Mode::INDIRECT_B) {
            Operand::Indirect(b)
        } else {
            Operand::Direct(b)
        };
        let b = machine.resolve(b)?;

        Ok(Instruction { opcode, a, b })
    }

    fn execute(instruction: Instruction, machine: &mut Machine<Self>) -> Result<Flow<u32>, Exception> {
        let source = instruction.a;
        let (a, b) = (source.address(), instruction.b.address);
        let next = machine.next();

        let pc = match instruction.opcode {
            Vm2Opcode::Hlt => return Ok(Flow::Halt(source.value(machine)?)),
            Vm2Opcode::Mov | Vm2Opcode::Lit => {
                let value = source.value(machine)?;
                machine.write(b, value)?;
                next
            }
            Vm2Opcode::Jsr => {
                machine.write(b, next as u32)?;
                a
            }
            Vm2Opcode::Add => {
                let value = machine.read(b)?.plus(&source.value(machine)?);
                machine.write(b, value)?;
                next
            }
            Vm2Opcode::Sub => {
                let value = machine.read(b)?.minus(&source.value(machine)?);
                machine.write(b, value)?;
                next
            }
            Vm2Opcode::And => {
                let value = machine.read(b)? & source.value(machine)?;
                machine.write(b, value)?;
                next
            }
            Vm2Opcode::Or => {
                let value = machine.read(b)? | source.value(machine)?;
                machine.write(b, value)?;
                next
            }
            Vm2Opcode::Shl => {
                let value = machine.read(b)?.shifted_left(source.value(machine)?);
                machine.write(b, value)?;
                next
            }
            Vm2Opcode::Djnz => {
                let value = machine.read(a)?.decrement();
                machine.write(a, value)?;
                branch(value != 0, b, next)
            }
            Vm2Opcode::Jmp => a,
            Vm2Opcode::Jnz => branch(source.value(machine)? != 0, b, next),
        };

        machine.pc = pc;
        Ok(Flow::Continue)
    }
}
