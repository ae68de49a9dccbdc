//! Shared parsing helpers: whitespace handling, identifiers, keywords.

use nom::{
    bytes::complete::{tag_no_case, take_while, take_while1},
    character::complete::multispace0,
    combinator::recognize,
    sequence::pair,
    IResult, Parser,
};

/// Wrap a parser to consume trailing whitespace (Cypher is whitespace-insensitive).
pub fn ws<'a, F, O>(mut inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: Parser<&'a str, Output = O, Error = nom::error::Error<&'a str>>,
{
    move |input: &'a str| {
        let (input, out) = inner.parse(input)?;
        let (input, _) = multispace0(input)?;
        Ok((input, out))
    }
}

pub fn lead_ws(input: &str) -> IResult<&str, &str> {
    multispace0(input)
}

/// Identifier: `[A-Za-z_][A-Za-z0-9_]*`, not a reserved keyword.
pub fn identifier(input: &str) -> IResult<&str, String> {
    let (input, _) = multispace0(input)?;
    let (input, ident) = recognize(pair(
        take_while1(|c: char| c.is_alphabetic() || c == '_'),
        take_while(|c: char| c.is_alphanumeric() || c == '_'),
    ))
    .parse(input)?;
    let (input, _) = multispace0(input)?;
    Ok((input, ident.to_string()))
}

pub fn kw<'a>(word: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    move |input: &'a str| {
        let (input, _) = multispace0(input)?;
        let (input, out) = tag_no_case(word)(input)?;
        let (input, _) = multispace0(input)?;
        Ok((input, out))
    }
}
