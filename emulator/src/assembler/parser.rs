//! Source line parsing
//!
//! A line is made of label definitions, an optional content and an optional
//! comment. The content is either a directive or a list of terms; telling
//! instructions from data words is left to the layout pass, which knows the
//! mnemonics of the profile.
//!
//! The parser is zero copy: symbols and expressions borrow the source, which
//! lets diagnostics compute their position in it.

use nom::{
    branch::alt,
    bytes::complete::{tag_no_case, take_while1},
    character::complete::{char, digit1, hex_digit1, one_of, space0, space1},
    combinator::{all_consuming, consumed, map, opt, recognize, rest, value, verify},
    multi::{many0, separated_list1},
    sequence::{delimited, pair, preceded, separated_pair, terminated, tuple},
    Finish, IResult,
};

use crate::word::{literal_value, Word};

/// A number as written in the source, kept as text so that words wider than
/// 64 bits can be built from it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Literal<'a> {
    pub text: &'a str,
    pub negative: bool,
    pub digits: &'a str,
    pub radix: u32,
}

impl Literal<'_> {
    pub(crate) fn value(&self) -> Option<i64> {
        literal_value(self.negative, self.digits, self.radix)
    }

    pub(crate) fn word<W: Word>(&self) -> Option<W> {
        W::from_literal(self.negative, self.digits, self.radix)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Atom<'a> {
    Literal(Literal<'a>),
    Symbol(&'a str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Sign {
    Plus,
    Minus,
}

/// A sum of literals and symbols, like `table+2`
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Expression<'a> {
    pub text: &'a str,
    pub first: Atom<'a>,
    pub rest: Vec<(Sign, Atom<'a>)>,
}

impl<'a> Expression<'a> {
    fn symbol(&self) -> Option<&'a str> {
        match self.first {
            Atom::Symbol(symbol) if self.rest.is_empty() => Some(symbol),
            _ => None,
        }
    }

    /// The expression as a lone literal
    pub(crate) fn literal(&self) -> Option<Literal<'a>> {
        match self.first {
            Atom::Literal(literal) if self.rest.is_empty() => Some(literal),
            _ => None,
        }
    }
}

/// An operand or a data word
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Term<'a> {
    Direct(Expression<'a>),
    Indirect(Expression<'a>),
    BaseIndex(Expression<'a>, Expression<'a>),
}

impl<'a> Term<'a> {
    /// The term as a possible mnemonic, when it is a lone symbol
    pub(crate) fn mnemonic(&self) -> Option<&'a str> {
        match self {
            Self::Direct(expression) => expression.symbol(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Content<'a> {
    /// A directive, without its leading dot
    Directive(&'a str),
    Terms(Vec<Term<'a>>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Line<'a> {
    pub labels: Vec<&'a str>,
    pub content: Option<Content<'a>>,
}

fn is_identifier_char(c: char) -> bool {
    is_start_identifier_char(c) || c.is_ascii_digit()
}

fn is_start_identifier_char(c: char) -> bool {
    c == '_' || c.is_ascii_alphabetic()
}

/// Parse a C-like identifier
fn parse_identifier(input: &str) -> IResult<&str, &str> {
    verify(take_while1(is_identifier_char), |f: &str| {
        f.chars().next().is_some_and(is_start_identifier_char)
    })(input)
}

/// Parse a decimal or `0x`-prefixed hexadecimal literal, with an optional
/// minus sign. Literals of any length are accepted.
fn parse_literal(input: &str) -> IResult<&str, Literal<'_>> {
    map(
        consumed(pair(
            opt(char('-')),
            alt((
                map(preceded(tag_no_case("0x"), hex_digit1), |digits| (digits, 16_u32)),
                map(digit1, |digits| (digits, 10_u32)),
            )),
        )),
        |(text, (sign, (digits, radix)))| Literal {
            text,
            negative: sign.is_some(),
            digits,
            radix,
        },
    )(input)
}

fn parse_atom(input: &str) -> IResult<&str, Atom<'_>> {
    alt((
        map(parse_literal, Atom::Literal),
        map(parse_identifier, Atom::Symbol),
    ))(input)
}

fn parse_sign(input: &str) -> IResult<&str, Sign> {
    alt((value(Sign::Plus, char('+')), value(Sign::Minus, char('-'))))(input)
}

fn parse_expression(input: &str) -> IResult<&str, Expression<'_>> {
    map(
        consumed(pair(parse_atom, many0(pair(parse_sign, parse_atom)))),
        |(text, (first, rest))| Expression { text, first, rest },
    )(input)
}

/// Parse something between square brackets
fn bracketed<'a, O>(
    inner: impl FnMut(&'a str) -> IResult<&'a str, O>,
) -> impl FnMut(&'a str) -> IResult<&'a str, O> {
    delimited(pair(char('['), space0), inner, pair(space0, char(']')))
}

fn parse_term(input: &str) -> IResult<&str, Term<'_>> {
    let comma = tuple((space0, char(','), space0));

    alt((
        map(
            bracketed(separated_pair(parse_expression, comma, parse_expression)),
            |(base, index)| Term::BaseIndex(base, index),
        ),
        map(bracketed(parse_expression), Term::Indirect),
        map(parse_expression, Term::Direct),
    ))(input)
}

/// Terms are separated by spaces and/or a comma
fn parse_separator(input: &str) -> IResult<&str, &str> {
    alt((recognize(tuple((space0, char(','), space0))), space1))(input)
}

fn parse_content(input: &str) -> IResult<&str, Content<'_>> {
    alt((
        map(preceded(char('.'), parse_identifier), Content::Directive),
        map(separated_list1(parse_separator, parse_term), Content::Terms),
    ))(input)
}

fn parse_comment(input: &str) -> IResult<&str, &str> {
    preceded(one_of(";#"), rest)(input)
}

fn parse_line(input: &str) -> IResult<&str, Line<'_>> {
    let (input, _) = space0(input)?;
    let (input, labels) = many0(terminated(
        parse_identifier,
        tuple((space0, char(':'), space0)),
    ))(input)?;
    let (input, content) = opt(parse_content)(input)?;
    let (input, _) = space0(input)?;
    let (input, _) = opt(parse_comment)(input)?;
    Ok((input, Line { labels, content }))
}

/// Parse a whole line
///
/// On error, the input of the error is the part of the line that could not be
/// parsed.
pub(crate) fn parse(input: &str) -> Result<Line<'_>, nom::error::Error<&str>> {
    all_consuming(parse_line)(input)
        .finish()
        .map(|(_, line)| line)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn decimal(text: &str) -> Atom<'_> {
        Atom::Literal(Literal {
            text,
            negative: text.starts_with('-'),
            digits: text.trim_start_matches('-'),
            radix: 10,
        })
    }

    fn direct<'a>(text: &'a str, first: Atom<'a>) -> Term<'a> {
        Term::Direct(Expression {
            text,
            first,
            rest: Vec::new(),
        })
    }

    #[test]
    fn parse_identifier_test() {
        type R<'a> = IResult<&'a str, &'a str>;
        assert_eq!(parse_identifier("hello"), R::Ok(("", "hello")));
        assert_eq!(parse_identifier("abc_123"), R::Ok(("", "abc_123")));
        assert_eq!(parse_identifier("abc-123"), R::Ok(("-123", "abc")));
        assert!(parse_identifier("123abc").is_err());
    }

    #[test]
    fn parse_literal_test() {
        let parsed = |input: &'static str| parse_literal(input).map(|(rest, literal)| (rest, literal.value()));
        assert_eq!(parsed("42"), Ok(("", Some(42))));
        assert_eq!(parsed("-2147483648"), Ok(("", Some(-2_147_483_648))));
        assert_eq!(parsed("0x3F000000"), Ok(("", Some(0x3F00_0000))));
        assert_eq!(parsed("0X1f ;"), Ok((" ;", Some(31))));
        assert!(parse_literal("abc").is_err());

        let (rest, literal) = parse_literal("-0x10,").unwrap();
        assert_eq!(rest, ",");
        assert_eq!(
            literal,
            Literal {
                text: "-0x10",
                negative: true,
                digits: "10",
                radix: 16,
            }
        );
        assert_eq!(literal.value(), Some(-16));
    }

    #[test]
    fn parse_wide_literal_test() {
        let (rest, literal) = parse_literal("100000000000000000000 ;").unwrap();
        assert_eq!(rest, " ;");
        assert_eq!(literal.text, "100000000000000000000");
        assert_eq!(literal.value(), None);
        assert_eq!(literal.word::<i64>(), None);
        assert_eq!(
            literal.word::<num_bigint::BigInt>(),
            Some(num_bigint::BigInt::from(10_u128.pow(20)))
        );
    }

    #[test]
    fn parse_expression_test() {
        let (rest, expression) = parse_expression("table+2-one ]").unwrap();
        assert_eq!(rest, " ]");
        assert_eq!(expression.text, "table+2-one");
        assert_eq!(expression.first, Atom::Symbol("table"));
        assert_eq!(
            expression.rest,
            vec![(Sign::Plus, decimal("2")), (Sign::Minus, Atom::Symbol("one"))]
        );
    }

    #[test]
    fn parse_term_test() {
        let (_, term) = parse_term("[ ptr ]").unwrap();
        assert_eq!(
            term,
            Term::Indirect(Expression {
                text: "ptr",
                first: Atom::Symbol("ptr"),
                rest: Vec::new(),
            })
        );

        let (_, term) = parse_term("[base,idx]").unwrap();
        assert!(matches!(term, Term::BaseIndex(_, _)));
        assert_eq!(term.mnemonic(), None);
    }

    #[test]
    fn parse_line_test() {
        assert_eq!(parse(""), Ok(Line::default()));
        assert_eq!(parse("   ; only a comment"), Ok(Line::default()));

        assert_eq!(
            parse("loop:   ADD one, sum   # comment"),
            Ok(Line {
                labels: vec!["loop"],
                content: Some(Content::Terms(vec![
                    direct("ADD", Atom::Symbol("ADD")),
                    direct("one", Atom::Symbol("one")),
                    direct("sum", Atom::Symbol("sum")),
                ])),
            })
        );

        assert_eq!(
            parse("a: b:"),
            Ok(Line {
                labels: vec!["a", "b"],
                content: None,
            })
        );

        assert_eq!(
            parse(".data"),
            Ok(Line {
                labels: Vec::new(),
                content: Some(Content::Directive("data")),
            })
        );

        assert_eq!(
            parse("min:    -1"),
            Ok(Line {
                labels: vec!["min"],
                content: Some(Content::Terms(vec![direct("-1", decimal("-1"))])),
            })
        );
    }

    #[test]
    fn parse_error_test() {
        let error = parse("LDA @x").unwrap_err();
        assert_eq!(error.input, "@x");

        assert!(parse("LDA [x").is_err());
    }
}
