//! Node/relationship pattern grammar: `(a:Label {k:v})-[r:TYPE*1..3]->(b)`.

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{char, digit1},
    combinator::{map, opt},
    multi::{many0, separated_list0, separated_list1},
    sequence::{delimited, pair, preceded},
    IResult, Parser,
};

use super::ast::{Direction, NodePattern, Pattern, PatternPath, RelPattern, ShortestPathKind};
use super::common::{identifier, kw, ws};
use super::expression::parse_expression;

pub fn parse_pattern(input: &str) -> IResult<&str, Pattern> {
    let (input, paths) = separated_list1(ws(char(',')), parse_pattern_path).parse(input)?;
    Ok((input, Pattern { paths }))
}

fn parse_pattern_path(input: &str) -> IResult<&str, PatternPath> {
    let (input, shortest) =
        opt(alt((map(kw("shortestPath"), |_| ShortestPathKind::Single), map(kw("allShortestPaths"), |_| ShortestPathKind::All))))
            .parse(input)?;
    let open_paren = shortest.is_some();
    let input = if open_paren { ws(char('('))(input)?.0 } else { input };

    let (input, start) = parse_node_pattern(input)?;
    let (input, steps) = many0(pair(parse_rel_pattern, parse_node_pattern)).parse(input)?;

    let input = if open_paren { ws(char(')'))(input)?.0 } else { input };

    Ok((
        input,
        PatternPath { start, steps, shortest_path: shortest.unwrap_or(ShortestPathKind::None) },
    ))
}

fn parse_node_pattern(input: &str) -> IResult<&str, NodePattern> {
    let (input, _) = ws(char('(')).parse(input)?;
    let (input, alias) = opt(identifier).parse(input)?;
    let (input, labels) = many0(preceded(ws(char(':')), identifier)).parse(input)?;
    let (input, properties) = opt(parse_property_map).parse(input)?;
    let (input, _) = ws(char(')')).parse(input)?;
    Ok((
        input,
        NodePattern { alias, labels, properties: properties.unwrap_or_default() },
    ))
}

fn parse_rel_pattern(input: &str) -> IResult<&str, RelPattern> {
    let (input, left_arrow) = opt(tag("<-")).parse(input)?;
    let input = if left_arrow.is_none() { ws(char('-')).parse(input)?.0 } else { input };

    let (input, bracketed) = opt(delimited(
        ws(char('[')),
        (
            opt(identifier),
            many0(preceded(ws(char(':')), identifier)),
            opt(parse_variable_length),
            opt(parse_property_map),
        ),
        ws(char(']')),
    ))
    .parse(input)?;

    let (input, right_arrow) = alt((map(tag("->"), |_| true), map(char('-'), |_| false))).parse(input)?;
    let (input, _) = nom::character::complete::multispace0(input)?;

    let direction = match (left_arrow.is_some(), right_arrow) {
        (true, false) => Direction::Incoming,
        (false, true) => Direction::Outgoing,
        _ => Direction::Either,
    };

    let (alias, rel_types, var_len, props) = bracketed.unwrap_or((None, Vec::new(), None, None));
    let (min_hops, max_hops) = var_len.unwrap_or((None, None));

    Ok((
        input,
        RelPattern {
            alias,
            rel_types,
            direction,
            properties: props.unwrap_or_default(),
            min_hops,
            max_hops,
        },
    ))
}

/// `*`, `*3`, `*1..3`, `*..5`, `*2..`
fn parse_variable_length(input: &str) -> IResult<&str, (Option<u32>, Option<u32>)> {
    let (input, _) = ws(char('*')).parse(input)?;
    let (input, min) = opt(digit1).parse(input)?;
    let (input, range) = opt(preceded(tag(".."), opt(digit1))).parse(input)?;

    let min_n = min.and_then(|s| s.parse().ok());
    match range {
        Some(max) => {
            let max_n = max.and_then(|s| s.parse().ok());
            Ok((input, (Some(min_n.unwrap_or(1)), max_n)))
        }
        None => match min_n {
            Some(n) => Ok((input, (Some(n), Some(n)))),
            None => Ok((input, (Some(1), None))),
        },
    }
}

fn parse_property_map(input: &str) -> IResult<&str, Vec<(String, super::ast::Expr)>> {
    delimited(
        ws(char('{')),
        separated_list0(
            ws(char(',')),
            map((identifier, ws(char(':')), parse_expression), |(k, _, v)| (k, v)),
        ),
        ws(char('}')),
    )
    .parse(input)
}
