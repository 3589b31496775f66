//! Memory-to-memory machine with separate code and data
//!
//! Instructions are three code words: the opcode, operand A and operand B.
//! A negative operand is one level of indirection through the data memory.

use std::marker::PhantomData;

use num_bigint::BigInt;

use super::{branch, NoRegisters};
use crate::constants::Address;
use crate::runtime::{
    opcodes, signed_argument, Argument, EncodeError, Exception, Flow, Layout, Machine, Opcode,
    Operand, ProcessorError, Profile, Target,
};
use crate::word::Word;

opcodes! {
    pub enum Bvm2Opcode {
        Hlt = 0,
        Mov = 1,
        Jsr = 2,
        Add = 3,
        Djnz = 4,
        Jmp = 5,
        And = 6,
        Or = 7,
        Shl = 8,
        Jnz = 9,
        Sne = 10,
        Sle = 11,
        Sub = 12,
        Jgt = 13,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub opcode: Bvm2Opcode,
    pub a: Target,
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

/// The machine, generic over its data words
#[derive(Debug, Clone, Copy, Default)]
pub struct Bvm2<W = BigInt>(PhantomData<W>);

impl<W: Word> Profile for Bvm2<W> {
    type Word = W;
    type State = NoRegisters;
    type Opcode = Bvm2Opcode;
    type Instruction = Instruction;

    const NAME: &'static str = "bvm2";
    const LAYOUT: Layout = Layout::Split;
    const WIDTH: usize = 3;

    fn encode(opcode: Option<Bvm2Opcode>, arguments: &[Argument]) -> Result<Vec<i64>, EncodeError> {
        let opcode = opcode.ok_or(EncodeError::MissingOpcode)?;
        EncodeError::check_count(arguments, 1, 2)?;

        let a = signed_argument(arguments[0])?;
        let b = match arguments.get(1) {
            Some(argument) => signed_argument(*argument)?,
            None => 0,
        };
        Ok(vec![opcode.code(), a, b])
    }

    fn decode(machine: &Machine<Self>, pc: Address) -> Result<Instruction, ProcessorError> {
        let code = machine.fetch(pc)?;
        let opcode =
            Bvm2Opcode::from_code(code).ok_or(ProcessorError::UnknownOpcode { opcode: code, pc })?;
        let a = machine.resolve(Operand::from_signed(machine.fetch(pc + 1)?)?)?;
        let b = machine.resolve(Operand::from_signed(machine.fetch(pc + 2)?)?)?;
        Ok(Instruction { opcode, a, b })
    }

    fn execute(instruction: Instruction, machine: &mut Machine<Self>) -> Result<Flow<W>, Exception> {
        let (a, b) = (instruction.a.address, instruction.b.address);
        let next = machine.next();

        let pc = match instruction.opcode {
            Bvm2Opcode::Hlt => return Ok(Flow::Halt(machine.read(a)?)),
            Bvm2Opcode::Mov => {
                let value = machine.read(a)?;
                machine.write(b, value)?;
                next
            }
            Bvm2Opcode::Jsr => {
                machine.write(b, W::from_i64(next as i64))?;
                a
            }
            Bvm2Opcode::Add => {
                let value = machine.read(b)?.plus(&machine.read(a)?);
                machine.write(b, value)?;
                next
            }
            Bvm2Opcode::Sub => {
                let value = machine.read(b)?.minus(&machine.read(a)?);
                machine.write(b, value)?;
                next
            }
            Bvm2Opcode::And => {
                let value = machine.read(b)?.and(&machine.read(a)?);
                machine.write(b, value)?;
                next
            }
            Bvm2Opcode::Or => {
                let value = machine.read(b)?.or(&machine.read(a)?);
                machine.write(b, value)?;
                next
            }
            Bvm2Opcode::Shl => {
                let amount = machine.read(a)?;
                let bits = amount
                    .shift_amount()
                    .ok_or_else(|| Exception::InvalidShift(amount.to_string()))?;
                let value = machine.read(b)?.shifted_left(bits);
                machine.write(b, value)?;
                next
            }
            Bvm2Opcode::Djnz => {
                let value = machine.read(a)?.decrement();
                let taken = !value.is_zero();
                machine.write(a, value)?;
                branch(taken, b, next)
            }
            Bvm2Opcode::Jmp => a + b,
            Bvm2Opcode::Jnz => branch(!machine.read(a)?.is_zero(), b, next),
            Bvm2Opcode::Jgt => branch(machine.read(a)?.cmp_zero().is_gt(), b, next),
            Bvm2Opcode::Sne => {
                let skip = machine.read(a)? != machine.read(b)?;
                branch(skip, next + Self::WIDTH, next)
            }
            Bvm2Opcode::Sle => {
                let skip = machine.read(a)?.compare(&machine.read(b)?).is_le();
                branch(skip, next + Self::WIDTH, next)
            }
        };

        machine.pc = pc;
        Ok(Flow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::assemble;

    fn run<W: Word>(source: &str) -> Machine<Bvm2<W>> {
        let program = assemble::<Bvm2<W>>(source).unwrap();
        let mut machine = Machine::with_program(&program).unwrap();
        machine.run().unwrap();
        machine
    }

    #[test]
    fn loop_test() {
        let machine: Machine<Bvm2> = run(indoc! {"
            loop:   ADD one sum
                    DJNZ count loop
                    HLT sum
            .data
            one:    1
            count:  5000
            sum:    0
        "});

        assert_eq!(machine.halt_value(), Some(&BigInt::from(5000)));
        assert_eq!(machine.mem()[1], BigInt::from(0));
        assert_eq!(machine.cycles, 10_001);
    }

    const SHIFT_LOOP: &str = indoc! {"
        loop:   SHL one value
                DJNZ count loop
                HLT value
        .data
        one:    1
        count:  100
        value:  1
    "};

    #[test]
    fn shift_never_overflows_test() {
        let machine: Machine<Bvm2> = run(SHIFT_LOOP);
        assert_eq!(
            machine.halt_value(),
            Some(&BigInt::from(1).shifted_left(100))
        );
    }

    #[test]
    fn shift_wraps_on_fixed_width_test() {
        let machine: Machine<Bvm2<i64>> = run(SHIFT_LOOP);
        assert_eq!(machine.halt_value(), Some(&0));
    }

    #[test]
    fn wide_data_test() {
        let machine: Machine<Bvm2> = run(indoc! {"
                    ADD big sum
                    ADD big sum
                    HLT sum
            .data
            big:    100000000000000000000
            sum:    0
        "});

        assert_eq!(machine.mem()[0], BigInt::from(10_u128.pow(20)));
        assert_eq!(
            machine.halt_value(),
            Some(&BigInt::from(2 * 10_u128.pow(20)))
        );
    }

    #[test]
    fn subroutine_test() {
        let machine: Machine<Bvm2> = run(indoc! {"
                    JSR sub link
                    HLT result
            sub:    MOV fifty result
                    JMP [link]
            .data
            pad:    0
            link:   0
            fifty:  50
            result: 0
        "});

        assert_eq!(machine.mem()[1], BigInt::from(3));
        assert_eq!(machine.halt_value(), Some(&BigInt::from(50)));
    }

    #[test]
    fn skip_test() {
        let machine: Machine<Bvm2> = run(indoc! {"
                    SLE small big
                    HLT bad
                    SNE small small
                    HLT good
                    HLT bad
            .data
            pad:    0
            small:  3
            big:    7
            bad:    1
            good:   2
        "});

        assert_eq!(machine.halt_value(), Some(&BigInt::from(2)));
    }

    #[test]
    fn signed_test() {
        let machine: Machine<Bvm2> = run(indoc! {"
                    SUB five x
                    JGT x end
                    HLT x
            end:    HLT five
            .data
            pad:    0
            five:   5
            x:      2
        "});

        assert_eq!(machine.halt_value(), Some(&BigInt::from(-3)));
    }

    #[test]
    fn double_indirect_test() {
        let program = assemble::<Bvm2>(indoc! {"
                    MOV [ptr] out
                    HLT out
            .data
            pad:    0
            ptr:    -3
            out:    0
        "})
        .unwrap();
        let mut machine = Machine::<Bvm2>::with_program(&program).unwrap();

        assert_eq!(
            machine.run(),
            Err(Exception::DoubleIndirect(1).into())
        );
        assert_eq!(machine.pc, 0);
        assert!(!machine.is_halted());
    }

    #[test]
    fn out_of_range_test() {
        let program = assemble::<Bvm2<i64>>(indoc! {"
                    MOV [ptr] out
                    HLT out
            .data
            pad:    0
            ptr:    40000
            out:    0
        "})
        .unwrap();
        let mut machine = Machine::<Bvm2<i64>>::with_program(&program).unwrap();

        assert_eq!(
            machine.step(),
            Err(ProcessorError::Exception(Exception::OutOfRange(40_000)))
        );
    }

    #[test]
    fn encode_test() {
        assert_eq!(
            Bvm2::<i64>::encode(Some(Bvm2Opcode::Jmp), &[Argument::Indirect(4)]),
            Ok(vec![5, -4, 0])
        );
        assert_eq!(
            Bvm2::<i64>::encode(Some(Bvm2Opcode::Mov), &[Argument::Indirect(0)]),
            Err(EncodeError::IndirectThroughZero)
        );
        assert_eq!(
            Bvm2::<i64>::encode(Some(Bvm2Opcode::Hlt), &[]),
            Err(EncodeError::OperandCount {
                min: 1,
                max: 2,
                got: 0
            })
        );
    }
}
