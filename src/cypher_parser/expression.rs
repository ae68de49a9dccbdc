//! Expression grammar: precedence-climbing parser over `Expr`.
//!
//! Precedence, loosest to tightest: OR > XOR > AND > NOT > comparison >
//! STARTS WITH/ENDS WITH/CONTAINS/IN > additive > multiplicative > unary
//! minus > postfix (property access, IS NULL) > primary.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while},
    character::complete::{char, digit1, multispace0},
    combinator::{map, opt, recognize},
    multi::separated_list0,
    sequence::{delimited, pair, preceded},
    IResult, Parser,
};

use super::ast::{BinOp, Expr, Literal};
use super::common::{identifier, kw, ws};
use super::pattern::parse_pattern;

pub fn parse_expression(input: &str) -> IResult<&str, Expr> {
    parse_or(input)
}

fn parse_or(input: &str) -> IResult<&str, Expr> {
    let (input, first) = parse_xor(input)?;
    let (input, rest) = nom::multi::many0(preceded(kw("OR"), parse_xor)).parse(input)?;
    Ok((input, fold_left(first, rest, BinOp::Or)))
}

fn parse_xor(input: &str) -> IResult<&str, Expr> {
    let (input, first) = parse_and(input)?;
    let (input, rest) = nom::multi::many0(preceded(kw("XOR"), parse_and)).parse(input)?;
    Ok((input, fold_left(first, rest, BinOp::Xor)))
}

fn parse_and(input: &str) -> IResult<&str, Expr> {
    let (input, first) = parse_not(input)?;
    let (input, rest) = nom::multi::many0(preceded(kw("AND"), parse_not)).parse(input)?;
    Ok((input, fold_left(first, rest, BinOp::And)))
}

fn parse_not(input: &str) -> IResult<&str, Expr> {
    if let Ok((input, _)) = kw("NOT")(input) {
        let (input, e) = parse_not(input)?;
        return Ok((input, Expr::Not(Box::new(e))));
    }
    parse_comparison(input)
}

fn parse_comparison(input: &str) -> IResult<&str, Expr> {
    let (input, first) = parse_string_pred(input)?;
    let (input, op) = opt(alt((
        map(tag("<="), |_| BinOp::Le),
        map(tag(">="), |_| BinOp::Ge),
        map(tag("<>"), |_| BinOp::Ne),
        map(tag("!="), |_| BinOp::Ne),
        map(tag("="), |_| BinOp::Eq),
        map(tag("<"), |_| BinOp::Lt),
        map(tag(">"), |_| BinOp::Gt),
    )))
    .parse(input)?;
    let (input, _) = multispace0(input)?;
    if let Some(op) = op {
        let (input, rhs) = parse_string_pred(input)?;
        return Ok((
            input,
            Expr::BinaryOp { op, lhs: Box::new(first), rhs: Box::new(rhs) },
        ));
    }
    Ok((input, first))
}

fn parse_string_pred(input: &str) -> IResult<&str, Expr> {
    let (input, first) = parse_additive(input)?;
    let (input, op) = opt(alt((
        map((kw("STARTS"), kw("WITH")), |_| BinOp::StartsWith),
        map((kw("ENDS"), kw("WITH")), |_| BinOp::EndsWith),
        map(kw("CONTAINS"), |_| BinOp::Contains),
        map(kw("IN"), |_| BinOp::In),
    )))
    .parse(input)?;
    if let Some(op) = op {
        let (input, rhs) = parse_additive(input)?;
        return Ok((
            input,
            Expr::BinaryOp { op, lhs: Box::new(first), rhs: Box::new(rhs) },
        ));
    }
    Ok((input, first))
}

fn parse_additive(input: &str) -> IResult<&str, Expr> {
    let (input, first) = parse_multiplicative(input)?;
    let (input, rest) = nom::multi::many0(pair(
        alt((map(ws(char('+')), |_| BinOp::Add), map(ws(char('-')), |_| BinOp::Sub))),
        parse_multiplicative,
    ))
    .parse(input)?;
    Ok((input, fold_left_ops(first, rest)))
}

fn parse_multiplicative(input: &str) -> IResult<&str, Expr> {
    let (input, first) = parse_unary(input)?;
    let (input, rest) = nom::multi::many0(pair(
        alt((
            map(ws(char('*')), |_| BinOp::Mul),
            map(ws(char('/')), |_| BinOp::Div),
            map(ws(char('%')), |_| BinOp::Mod),
        )),
        parse_unary,
    ))
    .parse(input)?;
    Ok((input, fold_left_ops(first, rest)))
}

fn parse_unary(input: &str) -> IResult<&str, Expr> {
    if let Ok((input, _)) = ws(char('-')).parse(input) {
        let (input, e) = parse_unary(input)?;
        return Ok((
            input,
            Expr::BinaryOp {
                op: BinOp::Sub,
                lhs: Box::new(Expr::Literal(Literal::Integer(0))),
                rhs: Box::new(e),
            },
        ));
    }
    parse_postfix(input)
}

fn parse_postfix(input: &str) -> IResult<&str, Expr> {
    let (mut input, mut expr) = parse_primary(input)?;
    loop {
        if let Ok((next, _)) = ws(char('.')).parse(input) {
            let (next, key) = identifier(next)?;
            expr = Expr::Property { base: Box::new(expr), key };
            input = next;
            continue;
        }
        if let Ok((next, _)) = (kw("IS"), kw("NOT"), kw("NULL")).parse(input) {
            expr = Expr::IsNotNull(Box::new(expr));
            input = next;
            continue;
        }
        if let Ok((next, _)) = (kw("IS"), kw("NULL")).parse(input) {
            expr = Expr::IsNull(Box::new(expr));
            input = next;
            continue;
        }
        break;
    }
    Ok((input, expr))
}

fn parse_primary(input: &str) -> IResult<&str, Expr> {
    let (input, _) = multispace0(input)?;
    alt((
        parse_exists,
        parse_parameter,
        parse_list_literal,
        parse_function_call,
        parse_literal,
        map(identifier, Expr::Variable),
        delimited(ws(char('(')), parse_expression, ws(char(')'))),
    ))
    .parse(input)
}

fn parse_exists(input: &str) -> IResult<&str, Expr> {
    let (input, _) = kw("EXISTS")(input)?;
    let (input, _) = ws(char('{')).parse(input)?;
    let (input, _) = opt(kw("MATCH")).parse(input)?;
    let (input, pattern) = parse_pattern(input)?;
    let (input, where_clause) = opt(preceded(kw("WHERE"), parse_expression)).parse(input)?;
    let (input, _) = ws(char('}')).parse(input)?;
    Ok((
        input,
        Expr::Exists { pattern, where_clause: where_clause.map(Box::new) },
    ))
}

fn parse_parameter(input: &str) -> IResult<&str, Expr> {
    let (input, _) = char('$')(input)?;
    let (input, name) = identifier(input)?;
    Ok((input, Expr::Parameter(name)))
}

fn parse_list_literal(input: &str) -> IResult<&str, Expr> {
    let (input, items) = delimited(
        ws(char('[')),
        separated_list0(ws(char(',')), parse_expression),
        ws(char(']')),
    )
    .parse(input)?;
    Ok((input, Expr::List(items)))
}

fn parse_function_call(input: &str) -> IResult<&str, Expr> {
    let (input, name) = identifier(input)?;
    let (input, _) = ws(char('(')).parse(input)?;
    let (input, distinct) = opt(kw("DISTINCT")).parse(input)?;
    // `count(*)` special-cased as a zero-arg variadic count.
    let (input, args) = if name.eq_ignore_ascii_case("count") {
        alt((
            map(ws(char('*')), |_| vec![Expr::Variable("*".to_string())]),
            separated_list0(ws(char(',')), parse_expression),
        ))
        .parse(input)?
    } else {
        separated_list0(ws(char(',')), parse_expression).parse(input)?
    };
    let (input, _) = ws(char(')')).parse(input)?;
    Ok((
        input,
        Expr::FunctionCall { name, args, distinct: distinct.is_some() },
    ))
}

fn parse_literal(input: &str) -> IResult<&str, Expr> {
    alt((
        map(kw("null"), |_| Expr::Literal(Literal::Null)),
        map(kw("true"), |_| Expr::Literal(Literal::Boolean(true))),
        map(kw("false"), |_| Expr::Literal(Literal::Boolean(false))),
        map(parse_string, |s| Expr::Literal(Literal::String(s))),
        map(parse_number, |lit| Expr::Literal(lit)),
    ))
    .parse(input)
}

fn parse_number(input: &str) -> IResult<&str, Literal> {
    let (input, text) = recognize(pair(
        pair(opt(char('-')), digit1),
        opt(pair(char('.'), digit1)),
    ))
    .parse(input)?;
    let (input, _) = multispace0(input)?;
    if text.contains('.') {
        Ok((input, Literal::Float(text.parse().unwrap_or(0.0))))
    } else {
        Ok((input, Literal::Integer(text.parse().unwrap_or(0))))
    }
}

pub fn parse_string(input: &str) -> IResult<&str, String> {
    let (input, _) = multispace0(input)?;
    let (input, raw) = alt((
        delimited(char('\''), take_while(|c| c != '\''), char('\'')),
        delimited(char('"'), take_while(|c| c != '"'), char('"')),
    ))
    .parse(input)?;
    let (input, _) = multispace0(input)?;
    Ok((input, raw.to_string()))
}

fn fold_left(first: Expr, rest: Vec<Expr>, op: BinOp) -> Expr {
    rest.into_iter().fold(first, |acc, rhs| Expr::BinaryOp {
        op,
        lhs: Box::new(acc),
        rhs: Box::new(rhs),
    })
}

fn fold_left_ops(first: Expr, rest: Vec<(BinOp, Expr)>) -> Expr {
    rest.into_iter().fold(first, |acc, (op, rhs)| Expr::BinaryOp {
        op,
        lhs: Box::new(acc),
        rhs: Box::new(rhs),
    })
}
