//! SUBLEQ with indirect addressing and separate code and data
//!
//! A negative operand is one level of indirection through the data memory,
//! for jump targets as well.

use std::marker::PhantomData;

use super::subleq::Instruction;
use super::{subleq, NoRegisters};
use crate::constants::{Address, HALT_LOCATION};
use crate::runtime::{
    signed_argument, Argument, EncodeError, Exception, Flow, Layout, Machine, NoOpcode, Operand,
    ProcessorError, Profile,
};
use crate::word::Word;

#[derive(Debug, Clone, Copy, Default)]
pub struct Subleq2<W = i64>(PhantomData<W>);

impl<W: Word> Profile for Subleq2<W> {
    type Word = W;
    type State = NoRegisters;
    type Opcode = NoOpcode;
    type Instruction = Instruction;

    const NAME: &'static str = "subleq2";
    const LAYOUT: Layout = Layout::Split;
    const WIDTH: usize = 3;

    fn encode(opcode: Option<NoOpcode>, arguments: &[Argument]) -> Result<Vec<i64>, EncodeError> {
        if let Some(opcode) = opcode {
            match opcode {}
        }
        EncodeError::check_count(arguments, 3, 3)?;
        arguments.iter().copied().map(signed_argument).collect()
    }

    /// A guard looping on itself, so that falling off the program never runs
    /// into uninitialized code
    fn epilogue(code_len: usize) -> Vec<i64> {
        vec![0, 0, code_len as i64]
    }

    fn check_ranges(words: &[i64], code_len: usize, data_len: usize) -> Result<(), EncodeError> {
        let in_data = |operand: i64| {
            operand <= 0 || operand < data_len as i64 || operand == HALT_LOCATION as i64
        };

        match *words {
            [a, b, c] => {
                if c > 0 && c >= code_len as i64 {
                    Err(EncodeError::JumpOutsideCode(c))
                } else if !in_data(a) {
                    Err(EncodeError::OutsideData(a))
                } else if !in_data(b) {
                    Err(EncodeError::OutsideData(b))
                } else {
                    Ok(())
                }
            }
            _ => Ok(()),
        }
    }

    fn decode(machine: &Machine<Self>, pc: Address) -> Result<Instruction, ProcessorError> {
        let operand = |offset: Address| -> Result<_, ProcessorError> {
            let operand = Operand::from_signed(machine.fetch(pc + offset)?)?;
            Ok(machine.resolve(operand)?)
        };

        Ok(Instruction {
            a: operand(0)?,
            b: operand(1)?,
            c: operand(2)?,
        })
    }

    fn execute(instruction: Instruction, machine: &mut Machine<Self>) -> Result<Flow<W>, Exception> {
        subleq(
            machine,
            instruction.a.address,
            instruction.b.address,
            instruction.c.address,
        )
    }
}
