//! Stack machine
//!
//! Instructions are single packed words. A non-zero operand is pushed on the
//! data stack before the instruction runs, so `FETCH x` reads `x` and
//! `JMP loop` jumps to `loop`. `LIT 0` is the only way to push a zero.

use std::marker::PhantomData;

use crate::constants::{Address, OPERAND_MASK};
use crate::runtime::{
    address_of, field, opcodes, Argument, Clamped, Discipline, EncodeError, Exception, Flow,
    Layout, Machine, Opcode, Packed, ProcessorError, Profile, Stack,
};
use crate::word::Word;

opcodes! {
    pub enum StackOpcode {
        Hlt = 0,
        Fetch = 1,
        Store = 2,
        Add = 3,
        Sub = 4,
        And = 5,
        Inc = 6,
        Jnz = 7,
        Djnz = 8,
        Jmp = 9,
        Shl = 10,
        Lit = 11,
        Drop = 12,
        Swap = 13,
        Jsr = 14,
        Ret = 15,
        Dup = 16,
        Or = 17,
        Jz = 18,
        Jgt = 19,
        Rot = 20,
        Over = 21,
        Fetchi = 22,
        Fetchbi = 23,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub opcode: StackOpcode,
    pub operand: u32,
}

impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.operand == 0 && self.opcode != StackOpcode::Lit {
            write!(f, "{}", self.opcode)
        } else {
            write!(f, "{} {}", self.opcode, self.operand)
        }
    }
}

/// The data stack and the return stack
#[derive(Clone, Default, PartialEq)]
pub struct Stacks<W, D = Clamped> {
    pub data: Stack<W, D>,
    pub ret: Stack<Address, D>,
}

impl<W: std::fmt::Debug, D: Discipline> std::fmt::Debug for Stacks<W, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stacks")
            .field("data", &self.data)
            .field("ret", &self.ret)
            .finish()
    }
}

impl<W: std::fmt::Display, D> std::fmt::Display for Stacks<W, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "D={} R={}", self.data, self.ret)
    }
}

/// The machine, generic over its words and the discipline of its stacks
#[derive(Debug, Clone, Copy, Default)]
pub struct StackMachine<W = u32, D = Clamped>(PhantomData<(W, D)>);

impl<W: Word, D: Discipline> Profile for StackMachine<W, D> {
    type Word = W;
    type State = Stacks<W, D>;
    type Opcode = StackOpcode;
    type Instruction = Instruction;

    const NAME: &'static str = "stack";
    const LAYOUT: Layout = Layout::Split;
    const WIDTH: usize = 1;

    fn encode(opcode: Option<StackOpcode>, arguments: &[Argument]) -> Result<Vec<i64>, EncodeError> {
        let opcode = opcode.ok_or(EncodeError::MissingOpcode)?;
        EncodeError::check_count(arguments, 0, 1)?;

        let operand = match arguments.first().copied() {
            None => 0,
            // A zero operand would be read as no operand at all
            Some(Argument::Direct(0)) if opcode != StackOpcode::Lit => {
                return Err(EncodeError::ZeroOperand)
            }
            Some(Argument::Direct(value)) => field(value, OPERAND_MASK)?,
            Some(argument) => {
                return Err(EncodeError::UnsupportedMode {
                    mode: argument.mode(),
                })
            }
        };

        let packed = Packed {
            byte: opcode.code() as u8,
            operand,
        };
        Ok(vec![packed.join()])
    }

    fn decode(machine: &Machine<Self>, pc: Address) -> Result<Instruction, ProcessorError> {
        let packed = Packed::split(machine.fetch(pc)?);
        let code = i64::from(packed.byte);
        let opcode =
            StackOpcode::from_code(code).ok_or(ProcessorError::UnknownOpcode { opcode: code, pc })?;
        Ok(Instruction {
            opcode,
            operand: packed.operand,
        })
    }

    fn execute(instruction: Instruction, machine: &mut Machine<Self>) -> Result<Flow<W>, Exception> {
        let snapshot = machine.state.clone();
        let result = apply(instruction, machine);
        if result.is_err() {
            machine.state = snapshot;
        }
        result
    }
}

/// Run an instruction, possibly leaving the stacks half updated on a fault
///
/// Memory is only written by the last fallible operation of an instruction.
fn apply<W: Word, D: Discipline>(
    instruction: Instruction,
    machine: &mut Machine<StackMachine<W, D>>,
) -> Result<Flow<W>, Exception> {
    let next = machine.next();
    if instruction.operand != 0 {
        machine
            .state
            .data
            .push(W::from_i64(i64::from(instruction.operand)))?;
    }

    let stack = &mut machine.state.data;
    let pc = match instruction.opcode {
        StackOpcode::Hlt => return Ok(Flow::Halt(stack.pop()?)),
        StackOpcode::Fetch => {
            let address = address_of(&stack.peek()?)?;
            let value = machine.read(address)?;
            machine.state.data.replace(value)?;
            next
        }
        StackOpcode::Fetchi => {
            let pointer = address_of(&stack.peek()?)?;
            let address = address_of(&machine.read(pointer)?)?;
            let value = machine.read(address)?;
            machine.state.data.replace(value)?;
            next
        }
        StackOpcode::Fetchbi => {
            let index = stack.pop()?;
            let base = stack.peek()?;
            let address = address_of(&base.plus(&index))?;
            let value = machine.read(address)?;
            machine.state.data.replace(value)?;
            next
        }
        StackOpcode::Store => {
            let address = address_of(&stack.pop()?)?;
            let value = stack.pop()?;
            machine.write(address, value)?;
            next
        }
        StackOpcode::Add => {
            let b = stack.pop()?;
            let a = stack.peek()?;
            stack.replace(a.plus(&b))?;
            next
        }
        StackOpcode::Sub => {
            let b = stack.pop()?;
            let a = stack.peek()?;
            stack.replace(a.minus(&b))?;
            next
        }
        StackOpcode::And => {
            let b = stack.pop()?;
            let a = stack.peek()?;
            stack.replace(a.and(&b))?;
            next
        }
        StackOpcode::Or => {
            let b = stack.pop()?;
            let a = stack.peek()?;
            stack.replace(a.or(&b))?;
            next
        }
        StackOpcode::Inc => {
            let value = stack.peek()?.increment();
            stack.replace(value)?;
            next
        }
        StackOpcode::Shl => {
            let value = stack.peek()?.shifted_left(1);
            stack.replace(value)?;
            next
        }
        StackOpcode::Lit => {
            if instruction.operand == 0 {
                stack.push(W::default())?;
            }
            next
        }
        StackOpcode::Drop => {
            stack.drop()?;
            next
        }
        StackOpcode::Dup => {
            stack.dup()?;
            next
        }
        StackOpcode::Swap => {
            stack.swap()?;
            next
        }
        StackOpcode::Rot => {
            stack.rot()?;
            next
        }
        StackOpcode::Over => {
            stack.over()?;
            next
        }
        StackOpcode::Jmp => address_of(&stack.pop()?)?,
        StackOpcode::Jnz => {
            let target = stack.pop()?;
            let taken = !stack.pop()?.is_zero();
            jump(taken, &target, next)?
        }
        StackOpcode::Jz => {
            let target = stack.pop()?;
            let taken = stack.pop()?.is_zero();
            jump(taken, &target, next)?
        }
        StackOpcode::Jgt => {
            let target = stack.pop()?;
            let taken = stack.pop()?.cmp_zero().is_gt();
            jump(taken, &target, next)?
        }
        StackOpcode::Djnz => {
            let target = stack.pop()?;
            let value = stack.peek()?.decrement();
            let taken = !value.is_zero();
            stack.replace(value)?;
            jump(taken, &target, next)?
        }
        StackOpcode::Jsr => {
            let target = address_of(&stack.pop()?)?;
            machine.state.ret.push(next)?;
            target
        }
        StackOpcode::Ret => machine.state.ret.pop()?,
    };

    machine.pc = pc;
    Ok(Flow::Continue)
}

/// The target address is only checked when the branch is taken
fn jump<W: Word>(taken: bool, target: &W, next: Address) -> Result<Address, Exception> {
    if taken {
        address_of(target)
    } else {
        Ok(next)
    }
}
