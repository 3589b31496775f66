use std::ops::Range;
use std::str::FromStr;

use anyhow::anyhow;
use nom::branch::alt;
use nom::bytes::complete::{tag, tag_no_case};
use nom::character::complete::{alpha1, alphanumeric1, char, digit1, hex_digit1};
use nom::combinator::{all_consuming, map, map_res, opt, recognize, value};
use nom::error::{convert_error, VerboseError};
use nom::multi::many0_count;
use nom::sequence::{pair, preceded};
use nom::{Finish, IResult};
use thiserror::Error;
use tinyvm_emulator::constants::Address;
use tinyvm_emulator::runtime::Symbols;

/// Which labels to look at first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Code,
    Data,
}

/// An address typed by the user, either a number or a label with an
/// optional offset
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Literal(i64),
    Label { label: String, offset: i64 },
}

impl Location {
    pub fn evaluate(&self, symbols: &Symbols, region: Region) -> anyhow::Result<Address> {
        let value = match self {
            Self::Literal(value) => *value,
            Self::Label { label, offset } => {
                let (first, second) = match region {
                    Region::Code => (&symbols.code, &symbols.data),
                    Region::Data => (&symbols.data, &symbols.code),
                };
                let base = first
                    .get(label)
                    .or_else(|| second.get(label))
                    .ok_or_else(|| anyhow!("unknown label {label}"))?;
                i64::try_from(*base)
                    .ok()
                    .and_then(|base| base.checked_add(*offset))
                    .ok_or_else(|| anyhow!("{label}{offset:+} is out of range"))?
            }
        };

        Address::try_from(value).map_err(|_| anyhow!("{value} is not a valid address"))
    }
}

/// Addresses of `count` consecutive cells starting at `start`
pub fn block(start: Address, count: usize) -> anyhow::Result<Range<Address>> {
    let end = start
        .checked_add(count)
        .ok_or_else(|| anyhow!("a block of {count} cells at {start} overflows"))?;
    Ok(start..end)
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("could not parse address: {0}")]
pub struct ParseLocationError(String);

impl ParseLocationError {
    pub fn new(message: String) -> Self {
        Self(message)
    }
}

impl FromStr for Location {
    type Err = ParseLocationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_location(s).map_err(|e| ParseLocationError(convert_error(s, e)))
    }
}

type Res<'a, T> = IResult<&'a str, T, VerboseError<&'a str>>;

fn parse_number(input: &str) -> Res<'_, i64> {
    alt((
        map_res(preceded(tag_no_case("0x"), hex_digit1), |digits| {
            i64::from_str_radix(digits, 16)
        }),
        map_res(recognize(pair(opt(char('-')), digit1)), str::parse::<i64>),
    ))(input)
}

fn parse_label(input: &str) -> Res<'_, &str> {
    recognize(pair(
        alt((alpha1, tag("_"))),
        many0_count(alt((alphanumeric1, tag("_")))),
    ))(input)
}

fn parse_offset(input: &str) -> Res<'_, i64> {
    let (rest, sign) = alt((value(1, char('+')), value(-1, char('-'))))(input)?;
    let (rest, amount) = map_res(digit1, str::parse::<i64>)(rest)?;
    Ok((rest, sign * amount))
}

fn parse_location_inner(input: &str) -> Res<'_, Location> {
    alt((
        map(parse_number, Location::Literal),
        map(pair(parse_label, opt(parse_offset)), |(label, offset)| {
            Location::Label {
                label: label.to_owned(),
                offset: offset.unwrap_or_default(),
            }
        }),
    ))(input)
}

fn parse_location(input: &str) -> Result<Location, VerboseError<&str>> {
    let (_, ret) = all_consuming(parse_location_inner)(input).finish()?;
    Ok(ret)
}
