//! The instruction sets of every machine
//!
//! | Profile | Word | Layout | Encoding |
//! |---|---|---|---|
//! | [`Vm1`] | `u32` | unified | packed, one operand |
//! | [`Vm2`] | `u32` | unified | packed opcode and A, B in a second word |
//! | [`Bvm2`] | `BigInt` or `i64` | split | three words |
//! | [`StackMachine`] | `u32` or `BigInt` | split | packed, operand pushed |
//! | [`Subleq`] | `i32` | unified | three direct addresses |
//! | [`Subleq2`] | `i64` or `BigInt` | split | three signed addresses |

use num_bigint::BigInt;

use crate::constants::{Address, HALT_LOCATION};
use crate::runtime::{Exception, Flow, Machine, Profile};
use crate::word::Word;

pub mod bvm2;
pub mod stack;
pub mod subleq;
pub mod subleq2;
pub mod vm1;
pub mod vm2;

pub use self::bvm2::Bvm2;
pub use self::stack::StackMachine;
pub use self::subleq::Subleq;
pub use self::subleq2::Subleq2;
pub use self::vm1::Vm1;
pub use self::vm2::Vm2;

/// The stack machine on arbitrary precision words
pub type BStack = StackMachine<BigInt>;

/// SUBLEQ with indirection on arbitrary precision words
pub type BSubleq2 = Subleq2<BigInt>;

/// State of the machines that only have a program counter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoRegisters;

impl std::fmt::Display for NoRegisters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "no registers")
    }
}

/// Pick the jump target of a conditional branch
pub(crate) fn branch(taken: bool, target: Address, next: Address) -> Address {
    if taken {
        target
    } else {
        next
    }
}

/// Subtract and branch if less than or equal to zero
///
/// Writing to [`HALT_LOCATION`] halts the machine with the written value.
pub(crate) fn subleq<P: Profile>(
    machine: &mut Machine<P>,
    a: Address,
    b: Address,
    c: Address,
) -> Result<Flow<P::Word>, Exception> {
    let value = machine.read(b)?.minus(&machine.read(a)?);
    machine.write(b, value.clone())?;
    if b == HALT_LOCATION {
        return Ok(Flow::Halt(value));
    }

    machine.pc = branch(value.cmp_zero().is_le(), c, machine.next());
    Ok(Flow::Continue)
}
