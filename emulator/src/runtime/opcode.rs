use std::fmt::{Debug, Display};
use std::str::FromStr;

/// The closed set of opcodes of a profile
pub trait Opcode: Copy + Eq + Debug + Display + FromStr + 'static {
    /// Every opcode, in numbering order
    const ALL: &'static [Self];

    /// Numeric value of the opcode in an encoded instruction
    fn code(self) -> i64;

    fn from_code(code: i64) -> Option<Self>;
}

/// Opcodes of the SUBLEQ machines, which only have one implicit instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoOpcode {}

impl Display for NoOpcode {
    fn fmt(&self, _f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {}
    }
}

impl FromStr for NoOpcode {
    type Err = ();

    fn from_str(_s: &str) -> Result<Self, Self::Err> {
        Err(())
    }
}

impl Opcode for NoOpcode {
    const ALL: &'static [Self] = &[];

    fn code(self) -> i64 {
        match self {}
    }

    fn from_code(_code: i64) -> Option<Self> {
        None
    }
}

/// Declare an opcode enum with its numbering
///
/// Mnemonics are the upper-cased variant names.
macro_rules! opcodes {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($variant:ident = $code:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            ::parse_display::Display,
            ::parse_display::FromStr,
        )]
        #[display(style = "UPPERCASE")]
        $vis enum $name {
            $($variant = $code),+
        }

        impl $crate::runtime::Opcode for $name {
            const ALL: &'static [Self] = &[$(Self::$variant),+];

            fn code(self) -> i64 {
                self as i64
            }

            fn from_code(code: i64) -> Option<Self> {
                match code {
                    $($code => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

pub(crate) use opcodes;
