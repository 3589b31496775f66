//! Two-pass assembler, shared by every profile
//!
//! Lines are parsed with `nom`, then laid out to define the
//! labels, then encoded by the profile once every symbol is known.
//!
//! ```text
//! loop:   ADD one sum     ; an instruction
//!         DJNZ count loop
//!         HLT sum
//! .data                   ; split profiles only
//! one:    1               ; a data word
//! ```

use miette::{Diagnostic, SourceSpan};
use nom::Offset;
use thiserror::Error;
use tracing::debug;

use crate::runtime::{EncodeError, Profile, Program};

mod emit;
mod layout;
mod parser;

/// What went wrong on a line
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    #[error("invalid syntax")]
    Syntax,

    #[error("label {0} is already defined")]
    DuplicateLabel(String),

    #[error("unknown symbol {0}")]
    UnknownSymbol(String),

    #[error("unknown mnemonic {0}")]
    UnknownMnemonic(String),

    #[error("unknown directive .{0}")]
    UnknownDirective(String),

    #[error("the {profile} machine has no separate data memory")]
    MisplacedDirective { profile: &'static str },

    #[error("data words must follow the .data directive")]
    MisplacedData,

    #[error("{value} does not fit in a {word} word")]
    WordRange { value: String, word: &'static str },

    #[error("literal {0} does not fit in 64 bits")]
    LiteralTooLarge(String),

    #[error(transparent)]
    Encode(#[from] EncodeError),
}

#[derive(Debug, Error, Diagnostic, Clone, PartialEq, Eq)]
#[error("line {line}: {kind}")]
#[diagnostic(code(tinyvm::assembler))]
pub struct AssemblyError {
    /// One-based line number
    pub line: usize,

    #[label("{kind}")]
    pub span: SourceSpan,

    pub kind: ErrorKind,
}

impl AssemblyError {
    /// Build an error pointing at a fragment of the source
    ///
    /// `fragment` must be a slice of `source`.
    pub(crate) fn at(source: &str, fragment: &str, kind: ErrorKind) -> Self {
        let offset = source.offset(fragment);
        Self {
            line: source[..offset].matches('\n').count() + 1,
            span: (offset, fragment.len()).into(),
            kind,
        }
    }
}

/// Assemble a program for a profile
///
/// # Errors
///
/// Stops on the first invalid line.
#[tracing::instrument(skip(source), fields(profile = P::NAME))]
pub fn assemble<P: Profile>(source: &str) -> Result<Program<P::Word>, AssemblyError> {
    let lines = source
        .lines()
        .map(|text| {
            parser::parse(text)
                .map(|line| (text, line))
                .map_err(|e| AssemblyError::at(source, e.input, ErrorKind::Syntax))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let layout = layout::layout_memory::<P>(source, lines)?;
    let program = emit::emit::<P>(source, layout)?;

    debug!(
        code = program.code.len(),
        data = program.data.len(),
        labels = program.symbols.code.len() + program.symbols.data.len(),
        "Program assembled"
    );
    Ok(program)
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use num_bigint::BigInt;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::runtime::profiles::{BSubleq2, Bvm2, StackMachine, Subleq, Subleq2, Vm1, Vm2};

    #[test]
    fn unified_layout_test() {
        let program = assemble::<Vm2>(indoc! {"
            start:  LIT 5 x     ; two words
            x:      0
            y:      x+1
                    start
        "})
        .unwrap();

        assert_eq!(program.code, vec![0x0600_0005, 2, 0, 3, 0]);
        assert!(program.data.is_empty());
        assert_eq!(program.symbols.get("x"), Some(2));
        assert_eq!(program.symbols.get("y"), Some(3));
        assert_eq!(program.symbols.code_label(0), Some("start"));
    }

    #[test]
    fn split_layout_test() {
        let program = assemble::<Bvm2<i64>>(indoc! {"
            loop:   ADD one, sum
                    jmp loop
            .data
            one:    1
            sum:    loop+7
        "})
        .unwrap();

        assert_eq!(program.code, vec![3, 0, 1, 5, 0, 0]);
        assert_eq!(program.data, vec![1, 7]);
        assert_eq!(program.symbols.code.get("loop"), Some(&0));
        assert_eq!(program.symbols.data.get("sum"), Some(&1));
    }

    #[test]
    fn subleq_default_jump_test() {
        let program = assemble::<Subleq>(indoc! {"
            a b
            a b 0
            a: 0
            b: 0
        "})
        .unwrap();

        assert_eq!(program.code, vec![6, 7, 3, 6, 7, 0, 0, 0]);
    }

    #[test]
    fn duplicate_label_test() {
        let source = indoc! {"
            x:  HLT x
            .data
            x:  0
        "};
        let error = assemble::<StackMachine>(source).unwrap_err();

        assert_eq!(error.line, 3);
        assert_eq!(error.kind, ErrorKind::DuplicateLabel("x".to_owned()));
        assert_eq!(error.span, (source.rfind('x').unwrap(), 1).into());
    }

    #[test]
    fn unknown_symbol_test() {
        let source = "  LDA nowhere";
        let error = assemble::<Vm1>(source).unwrap_err();

        assert_eq!(error.line, 1);
        assert_eq!(error.kind, ErrorKind::UnknownSymbol("nowhere".to_owned()));
        assert_eq!(error.span, (6, 7).into());
        assert_eq!(error.to_string(), "line 1: unknown symbol nowhere");
    }

    #[test]
    fn unknown_mnemonic_test() {
        let error = assemble::<Vm1>("\n\nFOO 1").unwrap_err();
        assert_eq!(error.line, 3);
        assert_eq!(error.kind, ErrorKind::UnknownMnemonic("FOO".to_owned()));
    }

    #[test]
    fn syntax_error_test() {
        let error = assemble::<Vm1>("LDA @x").unwrap_err();
        assert_eq!(error.kind, ErrorKind::Syntax);
        assert_eq!(error.span, (4, 2).into());
    }

    #[test]
    fn directive_errors_test() {
        assert_eq!(
            assemble::<Vm1>(".data").unwrap_err().kind,
            ErrorKind::MisplacedDirective { profile: "vm1" }
        );
        assert_eq!(
            assemble::<Subleq2>(".text").unwrap_err().kind,
            ErrorKind::UnknownDirective("text".to_owned())
        );
        assert_eq!(
            assemble::<Subleq2>("x: 4").unwrap_err().kind,
            ErrorKind::MisplacedData
        );
    }

    #[test]
    fn encode_errors_test() {
        assert_eq!(
            assemble::<Vm1>("LDA 1 2").unwrap_err().kind,
            ErrorKind::Encode(EncodeError::OperandCount {
                min: 1,
                max: 1,
                got: 2
            })
        );
        assert_eq!(
            assemble::<Bvm2>("MOV [0] 1").unwrap_err().kind,
            ErrorKind::Encode(EncodeError::IndirectThroughZero)
        );
        assert_eq!(
            assemble::<Subleq>("a b c d").unwrap_err().kind,
            ErrorKind::Encode(EncodeError::OperandCount {
                min: 2,
                max: 3,
                got: 4
            })
        );
        assert_eq!(
            assemble::<Vm1>("x: [x]").unwrap_err().kind,
            ErrorKind::Encode(EncodeError::UnsupportedMode { mode: "indirect" })
        );
    }

    #[test]
    fn range_checks_test() {
        let error = assemble::<Subleq2>(indoc! {"
                    z z
                    z z 99
            .data
            z:      0
        "})
        .unwrap_err();
        assert_eq!(error.line, 2);
        assert_eq!(error.kind, ErrorKind::Encode(EncodeError::JumpOutsideCode(99)));

        let error = assemble::<Subleq2>(indoc! {"
                    z 5000
            .data
            z:      0
        "})
        .unwrap_err();
        assert_eq!(error.kind, ErrorKind::Encode(EncodeError::OutsideData(5000)));

        assert!(assemble::<Subleq2>(indoc! {"
                    z 1000
            .data
            z:      0
        "})
        .is_ok());
    }

    #[test]
    fn wide_literal_test() {
        let program = assemble::<BSubleq2>(indoc! {"
                    z z
            .data
            z:      0
            big:    -0x10000000000000000
        "})
        .unwrap();
        assert_eq!(program.data, vec![BigInt::from(0), -BigInt::from(1_u128 << 64)]);

        let error = assemble::<Bvm2<i64>>(indoc! {"
                    HLT x
            .data
            x:      100000000000000000000
        "})
        .unwrap_err();
        assert_eq!(
            error.kind,
            ErrorKind::WordRange {
                value: "100000000000000000000".to_owned(),
                word: "i64"
            }
        );

        let source = "  LDA 100000000000000000000";
        let error = assemble::<Vm1>(source).unwrap_err();
        assert_eq!(
            error.kind,
            ErrorKind::LiteralTooLarge("100000000000000000000".to_owned())
        );
        assert_eq!(error.span, (6, 21).into());
    }

    #[test]
    fn word_range_test() {
        let source = "x: 4294967296";
        let error = assemble::<Vm1>(source).unwrap_err();
        assert_eq!(
            error.kind,
            ErrorKind::WordRange {
                value: "4294967296".to_owned(),
                word: "u32"
            }
        );
        assert_eq!(error.span, (3, 10).into());
        assert_eq!(
            error.to_string(),
            "line 1: 4294967296 does not fit in a u32 word"
        );

        assert_eq!(
            assemble::<Subleq>("x: 4294967295").unwrap_err().kind,
            ErrorKind::WordRange {
                value: "4294967295".to_owned(),
                word: "i32"
            }
        );
        assert_eq!(
            assemble::<Subleq>("x: x+2147483648").unwrap_err().kind,
            ErrorKind::WordRange {
                value: "x+2147483648".to_owned(),
                word: "i32"
            }
        );

        let program = assemble::<Vm1>(indoc! {"
            max:    4294967295
            min:    -1
            low:    -2147483648
        "})
        .unwrap();
        assert_eq!(program.code, vec![4_294_967_295, -1, -2_147_483_648]);
    }
}
