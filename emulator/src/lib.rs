pub mod assembler;
pub mod constants;
pub mod runtime;
pub mod word;

pub use self::assembler::assemble;
pub use self::runtime::{Machine, Program};
