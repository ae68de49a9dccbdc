//! Clause-level grammar: assembles the per-clause parsers into a `Query`.

use nom::{
    branch::alt,
    character::complete::{char, digit1},
    combinator::{map, opt},
    multi::{many0, separated_list0, separated_list1},
    sequence::{delimited, preceded},
    IResult, Parser,
};

use super::ast::*;
use super::common::{identifier, kw};
use super::expression::parse_expression;
use super::pattern::parse_pattern;

pub fn parse_query(input: &str) -> IResult<&str, Query> {
    let (input, _) = nom::character::complete::multispace0(input)?;
    let (input, clauses) = many0(parse_clause).parse(input)?;
    let (input, _) = nom::character::complete::multispace0(input)?;
    let (input, unions) = many0(parse_union_part).parse(input)?;
    let (input, _) = nom::character::complete::multispace0(input)?;
    Ok((input, Query { clauses, unions }))
}

fn parse_union_part(input: &str) -> IResult<&str, UnionPart> {
    let (input, _) = kw("UNION")(input)?;
    let (input, all) = map(opt(kw("ALL")), |a| a.is_some()).parse(input)?;
    let (input, clauses) = many0(parse_clause).parse(input)?;
    let (input, _) = nom::character::complete::multispace0(input)?;
    Ok((input, UnionPart { all, clauses }))
}

fn parse_clause(input: &str) -> IResult<&str, Clause> {
    alt((
        parse_optional_match,
        parse_match,
        parse_where,
        parse_create,
        parse_merge,
        parse_set,
        parse_remove,
        parse_delete,
        parse_with,
        parse_return,
        parse_unwind,
        parse_foreach,
        parse_call_subquery,
        parse_call,
    ))
    .parse(input)
}

fn parse_match(input: &str) -> IResult<&str, Clause> {
    let (input, _) = kw("MATCH")(input)?;
    let (input, path_var) = opt(map((identifier, nom::character::complete::char('=')), |(n, _)| n)).parse(input)?;
    let (input, pattern) = parse_pattern(input)?;
    let (input, where_clause) = opt(preceded(kw("WHERE"), parse_expression)).parse(input)?;
    Ok((input, Clause::Match(MatchClause { path_var, pattern, where_clause })))
}

fn parse_optional_match(input: &str) -> IResult<&str, Clause> {
    let (input, _) = kw("OPTIONAL")(input)?;
    let (input, _) = kw("MATCH")(input)?;
    let (input, path_var) = opt(map((identifier, nom::character::complete::char('=')), |(n, _)| n)).parse(input)?;
    let (input, pattern) = parse_pattern(input)?;
    let (input, where_clause) = opt(preceded(kw("WHERE"), parse_expression)).parse(input)?;
    Ok((input, Clause::OptionalMatch(MatchClause { path_var, pattern, where_clause })))
}

fn parse_where(input: &str) -> IResult<&str, Clause> {
    let (input, _) = kw("WHERE")(input)?;
    let (input, e) = parse_expression(input)?;
    Ok((input, Clause::Where(e)))
}

fn parse_create(input: &str) -> IResult<&str, Clause> {
    let (input, _) = kw("CREATE")(input)?;
    let (input, pattern) = parse_pattern(input)?;
    Ok((input, Clause::Create(CreateClause { pattern })))
}

fn parse_set_item(input: &str) -> IResult<&str, SetItem> {
    alt((
        map(
            (identifier, preceded(nom::character::complete::char(':'), separated_list1(nom::character::complete::char(':'), identifier))),
            |(alias, labels)| SetItem::Labels { alias, labels },
        ),
        map(
            (identifier, preceded(nom::character::complete::char('.'), identifier), preceded(nom::character::complete::char('='), parse_expression)),
            |(alias, key, value)| SetItem::Property { alias, key, value },
        ),
    ))
    .parse(input)
}

fn parse_set(input: &str) -> IResult<&str, Clause> {
    let (input, _) = kw("SET")(input)?;
    let (input, items) = separated_list1(nom::character::complete::char(','), parse_set_item).parse(input)?;
    Ok((input, Clause::Set(SetClause { items })))
}

fn parse_merge(input: &str) -> IResult<&str, Clause> {
    let (input, _) = kw("MERGE")(input)?;
    let (input, pattern) = parse_pattern(input)?;
    let (input, directives) = many0(alt((
        map(
            preceded((kw("ON"), kw("MATCH"), kw("SET")), separated_list1(nom::character::complete::char(','), parse_set_item)),
            |items| (true, items),
        ),
        map(
            preceded((kw("ON"), kw("CREATE"), kw("SET")), separated_list1(nom::character::complete::char(','), parse_set_item)),
            |items| (false, items),
        ),
    )))
    .parse(input)?;
    let mut on_match = Vec::new();
    let mut on_create = Vec::new();
    for (is_match, items) in directives {
        if is_match {
            on_match.extend(items);
        } else {
            on_create.extend(items);
        }
    }
    Ok((input, Clause::Merge(MergeClause { pattern, on_match, on_create })))
}

fn parse_remove_item(input: &str) -> IResult<&str, RemoveItem> {
    alt((
        map(
            (identifier, preceded(nom::character::complete::char('.'), identifier)),
            |(alias, key)| RemoveItem::Property { alias, key },
        ),
        map(
            (identifier, preceded(nom::character::complete::char(':'), identifier)),
            |(alias, label)| RemoveItem::Label { alias, label },
        ),
    ))
    .parse(input)
}

fn parse_remove(input: &str) -> IResult<&str, Clause> {
    let (input, _) = kw("REMOVE")(input)?;
    let (input, items) = separated_list1(nom::character::complete::char(','), parse_remove_item).parse(input)?;
    Ok((input, Clause::Remove(RemoveClause { items })))
}

fn parse_delete(input: &str) -> IResult<&str, Clause> {
    let (input, detach) = opt(kw("DETACH")).parse(input)?;
    let (input, _) = kw("DELETE")(input)?;
    let (input, items) = separated_list1(nom::character::complete::char(','), parse_expression).parse(input)?;
    Ok((input, Clause::Delete(DeleteClause { detach: detach.is_some(), items })))
}

fn parse_projection_item(input: &str) -> IResult<&str, ProjectionItem> {
    let (input, expr) = parse_expression(input)?;
    let (input, alias) = opt(preceded(kw("AS"), identifier)).parse(input)?;
    Ok((input, ProjectionItem { expr, alias }))
}

fn parse_order_by(input: &str) -> IResult<&str, Vec<OrderItem>> {
    let (input, _) = kw("ORDER")(input)?;
    let (input, _) = kw("BY")(input)?;
    separated_list1(nom::character::complete::char(','), |i| {
        let (i, expr) = parse_expression(i)?;
        let (i, desc) = opt(alt((kw("DESC"), kw("DESCENDING")))).parse(i)?;
        let (i, _) = opt(alt((kw("ASC"), kw("ASCENDING")))).parse(i)?;
        Ok((i, OrderItem { expr, desc: desc.is_some() }))
    })
    .parse(input)
}

fn parse_skip(input: &str) -> IResult<&str, i64> {
    let (input, _) = kw("SKIP")(input)?;
    let (input, n) = digit1(input)?;
    let (input, _) = nom::character::complete::multispace0(input)?;
    Ok((input, n.parse().unwrap_or(0)))
}

fn parse_limit(input: &str) -> IResult<&str, i64> {
    let (input, _) = kw("LIMIT")(input)?;
    let (input, n) = digit1(input)?;
    let (input, _) = nom::character::complete::multispace0(input)?;
    Ok((input, n.parse().unwrap_or(0)))
}

fn parse_with(input: &str) -> IResult<&str, Clause> {
    let (input, _) = kw("WITH")(input)?;
    let (input, distinct) = opt(kw("DISTINCT")).parse(input)?;
    let (input, items) = separated_list1(nom::character::complete::char(','), parse_projection_item).parse(input)?;
    let (input, where_clause) = opt(preceded(kw("WHERE"), parse_expression)).parse(input)?;
    let (input, order_by) = opt(parse_order_by).parse(input)?;
    let (input, skip) = opt(parse_skip).parse(input)?;
    let (input, limit) = opt(parse_limit).parse(input)?;
    Ok((
        input,
        Clause::With(WithClause {
            distinct: distinct.is_some(),
            items,
            where_clause,
            order_by: order_by.unwrap_or_default(),
            skip,
            limit,
        }),
    ))
}

fn parse_return(input: &str) -> IResult<&str, Clause> {
    let (input, _) = kw("RETURN")(input)?;
    let (input, distinct) = opt(kw("DISTINCT")).parse(input)?;
    let (input, items) = separated_list1(nom::character::complete::char(','), parse_projection_item).parse(input)?;
    let (input, order_by) = opt(parse_order_by).parse(input)?;
    let (input, skip) = opt(parse_skip).parse(input)?;
    let (input, limit) = opt(parse_limit).parse(input)?;
    Ok((
        input,
        Clause::Return(ReturnClause {
            distinct: distinct.is_some(),
            items,
            order_by: order_by.unwrap_or_default(),
            skip,
            limit,
        }),
    ))
}

fn parse_unwind(input: &str) -> IResult<&str, Clause> {
    let (input, _) = kw("UNWIND")(input)?;
    let (input, expr) = parse_expression(input)?;
    let (input, _) = kw("AS")(input)?;
    let (input, alias) = identifier(input)?;
    Ok((input, Clause::Unwind(UnwindClause { expr, alias })))
}

fn parse_call_arg(input: &str) -> IResult<&str, Expr> {
    parse_expression(input)
}

fn parse_call(input: &str) -> IResult<&str, Clause> {
    let (input, _) = kw("CALL")(input)?;
    let (input, name) = identifier(input)?;
    let (input, rest) = many0(preceded(nom::character::complete::char('.'), identifier)).parse(input)?;
    let full_name = if rest.is_empty() {
        name
    } else {
        format!("{}.{}", name, rest.join("."))
    };
    let (input, _) = nom::character::complete::char('(').parse(input)?;
    let (input, args) = separated_list0(nom::character::complete::char(','), parse_call_arg).parse(input)?;
    let (input, _) = nom::character::complete::char(')').parse(input)?;
    let (input, _) = nom::character::complete::multispace0(input)?;
    let (input, yield_items) = opt(preceded(
        kw("YIELD"),
        separated_list1(nom::character::complete::char(','), identifier),
    ))
    .parse(input)?;
    Ok((input, Clause::Call(CallClause { name: full_name, args, yield_items })))
}

fn parse_call_subquery(input: &str) -> IResult<&str, Clause> {
    let (input, _) = kw("CALL")(input)?;
    let (input, sub) = delimited(
        (nom::character::complete::char('{'), nom::character::complete::multispace0),
        parse_query,
        (nom::character::complete::multispace0, nom::character::complete::char('}')),
    )
    .parse(input)?;
    let (input, _) = nom::character::complete::multispace0(input)?;
    Ok((input, Clause::CallSubquery(sub)))
}

fn parse_foreach(input: &str) -> IResult<&str, Clause> {
    let (input, _) = kw("FOREACH")(input)?;
    let (input, _) = nom::character::complete::char('(').parse(input)?;
    let (input, var) = identifier(input)?;
    let (input, _) = kw("IN")(input)?;
    let (input, list) = parse_expression(input)?;
    let (input, _) = nom::character::complete::char('|').parse(input)?;
    let (input, clauses) = many0(parse_clause).parse(input)?;
    let (input, _) = nom::character::complete::char(')').parse(input)?;
    let (input, _) = nom::character::complete::multispace0(input)?;
    Ok((input, Clause::Foreach(ForeachClause { var, list, clauses })))
}
