//! Second pass: resolve the symbols and encode the statements

use std::ops::Range;

use super::layout::{MemoryLayout, Statement};
use super::parser::{Atom, Expression, Sign, Term};
use super::{AssemblyError, ErrorKind};
use crate::runtime::{Argument, EncodeError, Layout, Profile, Program, Symbols};
use crate::word::Word;

struct Resolver<'a, 's> {
    source: &'a str,
    symbols: &'s Symbols,
}

impl<'a> Resolver<'a, '_> {
    fn atom(&self, atom: Atom<'a>) -> Result<i64, AssemblyError> {
        match atom {
            Atom::Literal(literal) => literal.value().ok_or_else(|| {
                AssemblyError::at(
                    self.source,
                    literal.text,
                    ErrorKind::LiteralTooLarge(literal.text.to_owned()),
                )
            }),
            Atom::Symbol(symbol) => self
                .symbols
                .get(symbol)
                .map(|address| address as i64)
                .ok_or_else(|| {
                    AssemblyError::at(
                        self.source,
                        symbol,
                        ErrorKind::UnknownSymbol(symbol.to_owned()),
                    )
                }),
        }
    }

    fn expression(&self, expression: &Expression<'a>) -> Result<i64, AssemblyError> {
        let mut value = self.atom(expression.first)?;
        for (sign, atom) in &expression.rest {
            let operand = self.atom(*atom)?;
            value = match sign {
                Sign::Plus => value.checked_add(operand),
                Sign::Minus => value.checked_sub(operand),
            }
            .ok_or_else(|| {
                AssemblyError::at(
                    self.source,
                    expression.text,
                    EncodeError::OutOfRange(value).into(),
                )
            })?;
        }
        Ok(value)
    }

    fn term(&self, term: &Term<'a>) -> Result<Argument, AssemblyError> {
        Ok(match term {
            Term::Direct(expression) => Argument::Direct(self.expression(expression)?),
            Term::Indirect(pointer) => Argument::Indirect(self.expression(pointer)?),
            Term::BaseIndex(base, index) => {
                Argument::BaseIndex(self.expression(base)?, self.expression(index)?)
            }
        })
    }
}

/// Encode a laid out program
pub(crate) fn emit<'a, P: Profile>(
    source: &'a str,
    layout: MemoryLayout<'a, P::Opcode>,
) -> Result<Program<P::Word>, AssemblyError> {
    let MemoryLayout {
        symbols,
        statements,
    } = layout;
    let resolver = Resolver {
        source,
        symbols: &symbols,
    };

    let mut code = Vec::new();
    let mut data = Vec::new();
    let mut instructions: Vec<(&str, Range<usize>)> = Vec::new();

    for placed in statements {
        let error = |kind: ErrorKind| AssemblyError::at(source, placed.text, kind);

        match placed.statement {
            Statement::Instruction { opcode, operands } => {
                let mut arguments = operands
                    .iter()
                    .map(|term| resolver.term(term))
                    .collect::<Result<Vec<_>, _>>()?;

                // SUBLEQ falls through to the next instruction by default
                if opcode.is_none() && arguments.len() == 2 {
                    arguments.push(Argument::Direct((placed.address + P::WIDTH) as i64));
                }

                let words = P::encode(opcode, &arguments).map_err(|e| error(e.into()))?;
                instructions.push((placed.text, code.len()..code.len() + words.len()));
                code.extend(words);
            }

            Statement::Word(term) => {
                let Term::Direct(expression) = &term else {
                    let mode = resolver.term(&term)?.mode();
                    return Err(error(EncodeError::UnsupportedMode { mode }.into()));
                };
                let out_of_range = || {
                    AssemblyError::at(
                        source,
                        expression.text,
                        ErrorKind::WordRange {
                            value: expression.text.to_owned(),
                            word: <P::Word as Word>::NAME,
                        },
                    )
                };

                match P::LAYOUT {
                    // Unified memories keep the assembled value, it is
                    // converted when the program is loaded
                    Layout::Unified => {
                        let value = resolver.expression(expression)?;
                        if <P::Word as Word>::checked_from_i64(value).is_none() {
                            return Err(out_of_range());
                        }
                        code.push(value);
                    }
                    Layout::Split => {
                        let word = match expression.literal() {
                            Some(literal) => literal.word::<P::Word>(),
                            None => <P::Word as Word>::checked_from_i64(
                                resolver.expression(expression)?,
                            ),
                        };
                        data.push(word.ok_or_else(out_of_range)?);
                    }
                }
            }
        }
    }

    let epilogue = P::epilogue(code.len());
    code.extend(epilogue);

    for (text, range) in instructions {
        P::check_ranges(&code[range], code.len(), data.len())
            .map_err(|e| AssemblyError::at(source, text, e.into()))?;
    }

    Ok(Program {
        code,
        data,
        symbols,
    })
}
