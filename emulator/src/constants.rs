/// Index of a memory cell
pub type Address = usize;

/// Total size of the memory of every machine, in words
pub const MEMORY_SIZE: Address = 32000;

/// Writing to this address through the B operand of a SUBLEQ instruction halts
/// the machine
pub const HALT_LOCATION: Address = 1000;

/// Number of slots in the operand and return stacks
pub const STACK_SIZE: usize = 8;

/// Position of the opcode byte in a packed instruction word
pub const OPCODE_SHIFT: u32 = 24;

/// Bits of a packed instruction word holding its operand
pub const OPERAND_MASK: u32 = 0x00FF_FFFF;

/// Width of each half of a base+index operand
pub const INDEX_BITS: u32 = 12;

/// Mask of one half of a base+index operand
pub const INDEX_MASK: u32 = (1 << INDEX_BITS) - 1;
