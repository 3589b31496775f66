//! SUBLEQ, the one instruction machine
//!
//! `A B C` subtracts `mem[A]` from `mem[B]` and jumps to `C` when the result
//! is less than or equal to zero. Writing to the halt location stops the
//! machine.

use super::{subleq, NoRegisters};
use crate::constants::Address;
use crate::runtime::{
    checked_address, Argument, EncodeError, Exception, Flow, Layout, Machine, NoOpcode, Operand,
    ProcessorError, Profile, Target,
};

/// The operands of a SUBLEQ instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub a: Target,
    pub b: Target,
    pub c: Target,
}

impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if f.alternate() {
            write!(f, "{:#} {:#} {:#}", self.a, self.b, self.c)
        } else {
            write!(f, "{} {} {}", self.a, self.b, self.c)
        }
    }
}

/// SUBLEQ over signed 32-bit words, with direct operands only
#[derive(Debug, Clone, Copy, Default)]
pub struct Subleq;

impl Profile for Subleq {
    type Word = i32;
    type State = NoRegisters;
    type Opcode = NoOpcode;
    type Instruction = Instruction;

    const NAME: &'static str = "subleq";
    const LAYOUT: Layout = Layout::Unified;
    const WIDTH: usize = 3;

    fn encode(opcode: Option<NoOpcode>, arguments: &[Argument]) -> Result<Vec<i64>, EncodeError> {
        if let Some(opcode) = opcode {
            match opcode {}
        }
        EncodeError::check_count(arguments, 3, 3)?;

        arguments
            .iter()
            .map(|argument| match *argument {
                Argument::Direct(value) => checked_address(value)
                    .map(|_| value)
                    .map_err(|_| EncodeError::OutOfRange(value)),
                argument => Err(EncodeError::UnsupportedMode {
                    mode: argument.mode(),
                }),
            })
            .collect()
    }

    fn decode(machine: &Machine<Self>, pc: Address) -> Result<Instruction, ProcessorError> {
        let operand = |offset: Address| -> Result<Target, ProcessorError> {
            let address = checked_address(machine.fetch(pc + offset)?)?;
            Ok(machine.resolve(Operand::Direct(address))?)
        };

        Ok(Instruction {
            a: operand(0)?,
            b: operand(1)?,
            c: operand(2)?,
        })
    }

    fn execute(instruction: Instruction, machine: &mut Machine<Self>) -> Result<Flow<i32>, Exception> {
        subleq(
            machine,
            instruction.a.address,
            instruction.b.address,
            instruction.c.address,
        )
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::assemble;
    use crate::runtime::Program;

    #[test]
    fn loop_test() {
        let program = assemble::<Subleq>(indoc! {"
            loop:   negone sum          ; sum += 1
                    one count done      ; count -= 1
                    z z loop
            done:   sum nsum            ; nsum = -sum
                    nsum 1000
            negone: -1
            one:    1
            count:  5000
            sum:    0
            nsum:   0
            z:      0
        "})
        .unwrap();
        let mut machine = Machine::<Subleq>::with_program(&program).unwrap();
        machine.run().unwrap();

        assert_eq!(machine.mem()[18], 5000);
        assert_eq!(machine.mem()[1000], 5000);
        assert_eq!(machine.halt_value(), Some(&5000));
    }

    #[test]
    fn wraparound_test() {
        let program = assemble::<Subleq>(indoc! {"
                    one min
                    min 1000
            one:    1
            min:    -2147483648
        "})
        .unwrap();
        let mut machine = Machine::<Subleq>::with_program(&program).unwrap();

        assert_eq!(machine.step(), Ok(false));
        assert_eq!(machine.mem()[7], i32::MAX);
        assert_eq!(machine.pc, 3);

        machine.run().unwrap();
        assert_eq!(machine.halt_value(), Some(&-i32::MAX));
    }

    #[test]
    fn negative_operand_test() {
        let program = Program {
            code: vec![-1, 5, 3],
            ..Program::default()
        };
        let mut machine = Machine::<Subleq>::with_program(&program).unwrap();

        assert_eq!(
            machine.step(),
            Err(ProcessorError::Exception(Exception::OutOfRange(-1)))
        );
        assert_eq!(machine.pc, 0);
    }

    #[test]
    fn encode_test() {
        assert_eq!(
            Subleq::encode(None, &[Argument::Direct(1), Argument::Direct(2)]),
            Err(EncodeError::OperandCount {
                min: 3,
                max: 3,
                got: 2
            })
        );
        assert_eq!(
            Subleq::encode(
                None,
                &[Argument::Indirect(1), Argument::Direct(2), Argument::Direct(3)]
            ),
            Err(EncodeError::UnsupportedMode { mode: "indirect" })
        );
        assert_eq!(
            Subleq::encode(
                None,
                &[Argument::Direct(-4), Argument::Direct(2), Argument::Direct(3)]
            ),
            Err(EncodeError::OutOfRange(-4))
        );
    }
}
