//! Accumulator machine with one operand per instruction
//!
//! Every instruction is a single packed word: the opcode byte holds the
//! addressing mode bits, the low 24 bits hold the operand.

use bitflags::bitflags;

use super::branch;
use crate::constants::{Address, INDEX_BITS, INDEX_MASK, OPERAND_MASK};
use crate::runtime::{
    field, opcodes, Argument, EncodeError, Exception, Flow, Layout, Machine, Opcode, Operand,
    Packed, ProcessorError, Profile, Target,
};
use crate::word::Word;

opcodes! {
    pub enum Vm1Opcode {
        Hlt = 0,
        Lda = 1,
        Sta = 2,
        Add = 3,
        Sub = 4,
        And = 5,
        Inc = 6,
        Jnz = 7,
        Dsz = 8,
        Jmp = 9,
        Shl = 10,
        Ldy = 11,
        Dyjnz = 12,
        Jsr = 13,
        Ret = 14,
        Tay = 15,
        Sty = 16,
        Or = 17,
        Jeq = 18,
        Jgt = 19,
    }
}

impl Vm1Opcode {
    /// Whether the instruction reads its operand
    #[must_use]
    pub const fn has_operand(self) -> bool {
        !matches!(self, Self::Ret | Self::Tay)
    }
}

bitflags! {
    /// Addressing mode bits of the opcode byte
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Mode: u8 {
        const INDIRECT = 0x80;
        const BASE_INDEX = 0x40;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Registers {
    /// Accumulator
    pub ac: u32,
    /// Loop counter
    pub y: u32,
    /// Return address
    pub r: u32,
}

impl std::fmt::Display for Registers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AC={} Y={} R={}", self.ac, self.y, self.r)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub opcode: Vm1Opcode,
    pub target: Option<Target>,
}

impl Instruction {
    fn address(&self) -> Address {
        self.target.map_or(0, |target| target.address)
    }
}

impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.target {
            Some(target) if f.alternate() => write!(f, "{} {:#}", self.opcode, target),
            Some(target) => write!(f, "{} {}", self.opcode, target),
            None => write!(f, "{}", self.opcode),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Vm1;

impl Profile for Vm1 {
    type Word = u32;
    type State = Registers;
    type Opcode = Vm1Opcode;
    type Instruction = Instruction;

    const NAME: &'static str = "vm1";
    const LAYOUT: Layout = Layout::Unified;
    const WIDTH: usize = 1;

    fn encode(opcode: Option<Vm1Opcode>, arguments: &[Argument]) -> Result<Vec<i64>, EncodeError> {
        let opcode = opcode.ok_or(EncodeError::MissingOpcode)?;
        let expected = usize::from(opcode.has_operand());
        EncodeError::check_count(arguments, expected, expected)?;

        let (mode, operand) = match arguments.first() {
            None => (Mode::empty(), 0),
            Some(Argument::Direct(address)) => (Mode::empty(), field(*address, OPERAND_MASK)?),
            Some(Argument::Indirect(pointer)) => (Mode::INDIRECT, field(*pointer, OPERAND_MASK)?),
            Some(Argument::BaseIndex(base, index)) => (
                Mode::BASE_INDEX,
                (field(*base, INDEX_MASK)? << INDEX_BITS) | field(*index, INDEX_MASK)?,
            ),
        };

        let packed = Packed {
            byte: opcode.code() as u8 | mode.bits(),
            operand,
        };
        Ok(vec![packed.join()])
    }

    fn decode(machine: &Machine<Self>, pc: Address) -> Result<Instruction, ProcessorError> {
        let packed = Packed::split(machine.fetch(pc)?);
        let code = i64::from(packed.opcode());
        let opcode =
            Vm1Opcode::from_code(code).ok_or(ProcessorError::UnknownOpcode { opcode: code, pc })?;

        let target = if opcode.has_operand() {
            let mode = Mode::from_bits_truncate(packed.modes());
            let operand = Operand::from_packed(
                packed.operand,
                mode.contains(Mode::INDIRECT),
                mode.contains(Mode::BASE_INDEX),
            )?;
            Some(machine.resolve(operand)?)
        } else {
            None
        };

        Ok(Instruction { opcode, target })
    }

    fn execute(
        instruction: Instruction,
        machine: &mut Machine<Self>,
    ) -> Result<Flow<u32>, Exception> {
        let address = instruction.address();
        let next = machine.next();
        let registers = machine.state;

        let pc = match instruction.opcode {
            Vm1Opcode::Hlt => return Ok(Flow::Halt(machine.read(address)?)),
            Vm1Opcode::Lda => {
                machine.state.ac = machine.read(address)?;
                next
            }
            Vm1Opcode::Sta => {
                machine.write(address, registers.ac)?;
                next
            }
            Vm1Opcode::Add => {
                machine.state.ac = registers.ac.plus(&machine.read(address)?);
                next
            }
            Vm1Opcode::Sub => {
                machine.state.ac = registers.ac.minus(&machine.read(address)?);
                next
            }
            Vm1Opcode::And => {
                machine.state.ac = registers.ac & machine.read(address)?;
                next
            }
            Vm1Opcode::Or => {
                machine.state.ac = registers.ac | machine.read(address)?;
                next
            }
            Vm1Opcode::Inc => {
                let value = machine.read(address)?.increment();
                machine.write(address, value)?;
                next
            }
            Vm1Opcode::Shl => {
                let value = machine.read(address)?.shifted_left(1);
                machine.write(address, value)?;
                next
            }
            Vm1Opcode::Dsz => {
                let value = machine.read(address)?.decrement();
                machine.write(address, value)?;
                // Skip the next instruction when the counter reaches zero
                if value == 0 {
                    next + 1
                } else {
                    next
                }
            }
            Vm1Opcode::Jmp => address,
            Vm1Opcode::Jnz => branch(registers.ac != 0, address, next),
            Vm1Opcode::Jeq => branch(registers.ac == 0, address, next),
            Vm1Opcode::Jgt => branch(registers.ac.cmp_zero().is_gt(), address, next),
            Vm1Opcode::Ldy => {
                machine.state.y = machine.read(address)?;
                next
            }
            Vm1Opcode::Sty => {
                machine.write(address, registers.y)?;
                next
            }
            Vm1Opcode::Tay => {
                machine.state.y = registers.ac;
                next
            }
            Vm1Opcode::Dyjnz => {
                machine.state.y = registers.y.decrement();
                branch(machine.state.y != 0, address, next)
            }
            Vm1Opcode::Jsr => {
                machine.state.r = next as u32;
                address
            }
            Vm1Opcode::Ret => registers.r as Address,
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
    use crate::runtime::Program;

    fn run(source: &str) -> (Machine<Vm1>, Program<u32>) {
        let program = assemble::<Vm1>(source).unwrap();
        let mut machine = Machine::with_program(&program).unwrap();
        machine.run().unwrap();
        (machine, program)
    }

    fn at(program: &Program<u32>, label: &str) -> Address {
        program.symbols.get(label).unwrap()
    }

    #[test]
    fn add12_test() {
        let (machine, program) = run(indoc! {"
                    LDA a
                    ADD b
                    AND mask
                    STA a
                    HLT a
            a:      4094
            b:      6
            mask:   4095
        "});

        assert_eq!(at(&program, "a"), 5);
        assert_eq!(machine.mem()[5], 4);
        assert_eq!(machine.halt_value(), Some(&4));
        assert_eq!(machine.cycles, 5);
    }

    #[test]
    fn loop_until_test() {
        let (machine, program) = run(indoc! {"
                    LDY count
            loop:   LDA sum
                    ADD one
                    STA sum
                    DYJNZ loop
                    HLT sum
            count:  5000
            one:    1
            sum:    0
        "});

        assert_eq!(machine.mem()[at(&program, "sum")], 5000);
        assert_eq!(machine.halt_value(), Some(&5000));
        assert_eq!(machine.state.y, 0);
    }

    #[test]
    fn decrement_and_skip_test() {
        let (machine, _) = run(indoc! {"
            loop:   LDA sum
                    ADD one
                    STA sum
                    DSZ count
                    JMP loop
                    HLT sum
            count:  3
            one:    1
            sum:    0
        "});

        assert_eq!(machine.halt_value(), Some(&3));
    }

    #[test]
    fn subroutine_test() {
        let (machine, program) = run(indoc! {"
                    JSR store
                    HLT val
            store:  LDA fifty
                    STA val
                    RET
            fifty:  50
            val:    0
        "});

        assert_eq!(machine.state.r, 1);
        assert_eq!(machine.pc, 1);
        assert_eq!(machine.mem()[at(&program, "val")], 50);
        assert_eq!(machine.halt_value(), Some(&50));
    }

    #[test]
    fn addressing_modes_test() {
        let (machine, _) = run(indoc! {"
                    LDA [ptr]       ; table[0]
                    ADD [base, idx] ; table[2]
                    STA out
                    HLT out
            ptr:    table
            base:   table
            idx:    2
            table:  10
                    20
                    30
            out:    0
        "});

        assert_eq!(machine.halt_value(), Some(&40));
    }

    #[test]
    fn signed_branch_test() {
        let (machine, _) = run(indoc! {"
                    LDA neg
                    JGT bad
                    LDA pos
                    JGT good
            bad:    HLT neg
            good:   HLT pos
            neg:    -1
            pos:    7
        "});

        assert_eq!(machine.halt_value(), Some(&7));
    }

    #[test]
    fn wraparound_test() {
        let (machine, _) = run(indoc! {"
                    LDA max
                    ADD one
                    STA max
                    SHL high
                    HLT max
            max:    4294967295
            one:    1
            high:   -2147483648
        "});

        assert_eq!(machine.halt_value(), Some(&0));
        assert_eq!(machine.mem()[7], 0);
    }

    #[test]
    fn out_of_range_test() {
        let program = assemble::<Vm1>(indoc! {"
                    LDA one
                    STA [ptr]
                    HLT one
            one:    1
            ptr:    40000
        "})
        .unwrap();
        let mut machine = Machine::<Vm1>::with_program(&program).unwrap();

        assert_eq!(machine.step(), Ok(false));
        let err = machine.step().unwrap_err();
        assert_eq!(err, ProcessorError::from(Exception::OutOfRange(40_000)));
        assert!(!err.is_fatal());

        // The faulting instruction did not change anything
        assert_eq!(machine.pc, 1);
        assert_eq!(machine.state.ac, 1);
        assert_eq!(machine.cycles, 1);
    }

    #[test]
    fn unknown_opcode_test() {
        let program = Program {
            code: vec![0x3F00_0000],
            ..Program::default()
        };
        let mut machine = Machine::<Vm1>::with_program(&program).unwrap();

        let err = machine.step().unwrap_err();
        assert_eq!(err, ProcessorError::UnknownOpcode { opcode: 63, pc: 0 });
        assert!(err.is_fatal());
    }

    #[test]
    fn halted_machine_test() {
        let (mut machine, _) = run(indoc! {"
                    HLT val
            val:    9
        "});

        assert!(machine.is_halted());
        assert_eq!(machine.step(), Ok(true));
        assert_eq!(machine.cycles, 1);
        assert_eq!(machine.pc, 0);
    }

    #[test]
    fn run_for_test() {
        let program = assemble::<Vm1>("loop: JMP loop").unwrap();
        let mut machine = Machine::<Vm1>::with_program(&program).unwrap();
        assert_eq!(machine.run_for(100), Ok(false));
        assert_eq!(machine.cycles, 100);
    }

    #[test]
    fn encode_test() {
        assert_eq!(
            Vm1::encode(Some(Vm1Opcode::Lda), &[Argument::Indirect(5)]),
            Ok(vec![0x8100_0005])
        );
        assert_eq!(
            Vm1::encode(Some(Vm1Opcode::Add), &[Argument::BaseIndex(3, 4)]),
            Ok(vec![0x4300_3004])
        );
        assert_eq!(Vm1::encode(Some(Vm1Opcode::Ret), &[]), Ok(vec![0x0E00_0000]));
        assert_eq!(
            Vm1::encode(Some(Vm1Opcode::Add), &[Argument::BaseIndex(4096, 0)]),
            Err(EncodeError::OutOfRange(4096))
        );
        assert_eq!(
            Vm1::encode(Some(Vm1Opcode::Ret), &[Argument::Direct(1)]),
            Err(EncodeError::OperandCount {
                min: 0,
                max: 0,
                got: 1
            })
        );
    }

    #[test]
    fn listing_test() {
        let program = assemble::<Vm1>(indoc! {"
                    LDA [ptr]
                    ADD [ptr, ptr]
                    JSR 0
                    RET
            ptr:    1
        "})
        .unwrap();
        let machine = Machine::<Vm1>::with_program(&program).unwrap();
        let listing: Vec<String> = (0..4)
            .map(|address| format!("{:#}", machine.disassemble(address).unwrap()))
            .collect();

        insta::assert_snapshot!(listing.join("\n"), @r###"
        LDA [4] (1)
        ADD [4, 4] (2)
        JSR 0
        RET
        "###);
    }
}
