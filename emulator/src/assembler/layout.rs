//! First pass: place every statement and define the labels

use tracing::trace;

use super::parser::{Content, Line, Term};
use super::{AssemblyError, ErrorKind};
use crate::constants::Address;
use crate::runtime::{EncodeError, Layout, Opcode, Profile, Symbols};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Region {
    Code,
    Data,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Statement<'a, O> {
    /// `opcode` is `None` for the profiles without mnemonics
    Instruction {
        opcode: Option<O>,
        operands: Vec<Term<'a>>,
    },
    Word(Term<'a>),
}

#[derive(Debug)]
pub(crate) struct Placed<'a, O> {
    /// The whole source line, for diagnostics
    pub text: &'a str,
    pub address: Address,
    pub statement: Statement<'a, O>,
}

#[derive(Debug)]
pub(crate) struct MemoryLayout<'a, O> {
    pub symbols: Symbols,
    pub statements: Vec<Placed<'a, O>>,
}

/// Tell instructions from data words
fn classify<'a, P: Profile>(
    source: &'a str,
    text: &'a str,
    terms: Vec<Term<'a>>,
) -> Result<Statement<'a, P::Opcode>, AssemblyError> {
    if P::Opcode::ALL.is_empty() {
        return match <[_; 1]>::try_from(terms) {
            Ok([term]) => Ok(Statement::Word(term)),
            Err(terms) if (2..=3).contains(&terms.len()) => Ok(Statement::Instruction {
                opcode: None,
                operands: terms,
            }),
            Err(terms) => Err(AssemblyError::at(
                source,
                text,
                EncodeError::OperandCount {
                    min: 2,
                    max: 3,
                    got: terms.len(),
                }
                .into(),
            )),
        };
    }

    let mnemonic = terms.first().and_then(Term::mnemonic);
    let opcode = mnemonic.and_then(|m| m.to_ascii_uppercase().parse::<P::Opcode>().ok());
    if let Some(opcode) = opcode {
        return Ok(Statement::Instruction {
            opcode: Some(opcode),
            operands: terms.into_iter().skip(1).collect(),
        });
    }

    match (<[_; 1]>::try_from(terms), mnemonic) {
        (Ok([term]), _) => Ok(Statement::Word(term)),
        (Err(_), Some(mnemonic)) => Err(AssemblyError::at(
            source,
            mnemonic,
            ErrorKind::UnknownMnemonic(mnemonic.to_owned()),
        )),
        (Err(_), None) => Err(AssemblyError::at(source, text, ErrorKind::Syntax)),
    }
}

fn define(
    source: &str,
    symbols: &mut Symbols,
    region: Region,
    label: &str,
    address: Address,
) -> Result<(), AssemblyError> {
    if symbols.code.contains_key(label) || symbols.data.contains_key(label) {
        return Err(AssemblyError::at(
            source,
            label,
            ErrorKind::DuplicateLabel(label.to_owned()),
        ));
    }

    trace!(label, address, ?region, "Defining label");
    let table = match region {
        Region::Code => &mut symbols.code,
        Region::Data => &mut symbols.data,
    };
    table.insert(label.to_owned(), address);
    Ok(())
}

/// Lay out the parsed lines of a program
///
/// Instructions always go to the code. Data words go to the code of unified
/// profiles, and must follow `.data` in split profiles.
pub(crate) fn layout_memory<'a, P: Profile>(
    source: &'a str,
    lines: Vec<(&'a str, Line<'a>)>,
) -> Result<MemoryLayout<'a, P::Opcode>, AssemblyError> {
    let mut symbols = Symbols::default();
    let mut statements = Vec::new();
    let mut region = Region::Code;
    let (mut code, mut data) = (0, 0);

    for (text, line) in lines {
        let statement = match line.content {
            None => None,
            Some(Content::Directive("data")) if P::LAYOUT == Layout::Split => {
                region = Region::Data;
                None
            }
            Some(Content::Directive("data")) => {
                return Err(AssemblyError::at(
                    source,
                    text,
                    ErrorKind::MisplacedDirective { profile: P::NAME },
                ))
            }
            Some(Content::Directive(directive)) => {
                return Err(AssemblyError::at(
                    source,
                    directive,
                    ErrorKind::UnknownDirective(directive.to_owned()),
                ))
            }
            Some(Content::Terms(terms)) => Some(classify::<P>(source, text, terms)?),
        };

        let target = match (&statement, P::LAYOUT) {
            (Some(Statement::Instruction { .. }), _) | (Some(Statement::Word(_)), Layout::Unified) => {
                Region::Code
            }
            (Some(Statement::Word(_)), Layout::Split) if region == Region::Code => {
                return Err(AssemblyError::at(source, text, ErrorKind::MisplacedData));
            }
            _ => region,
        };

        let address = match target {
            Region::Code => code,
            Region::Data => data,
        };
        for label in line.labels {
            define(source, &mut symbols, target, label, address)?;
        }

        if let Some(statement) = statement {
            match (&statement, target) {
                (Statement::Instruction { .. }, _) => code += P::WIDTH,
                (Statement::Word(_), Region::Code) => code += 1,
                (Statement::Word(_), Region::Data) => data += 1,
            }
            statements.push(Placed {
                text,
                address,
                statement,
            });
        }
    }

    Ok(MemoryLayout {
        symbols,
        statements,
    })
}
