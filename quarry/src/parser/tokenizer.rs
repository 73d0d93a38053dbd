use nom::{
    branch::alt,
    bytes::complete::{tag, take_until, take_while1},
    character::complete::{char, multispace0, multispace1, one_of, satisfy},
    combinator::{eof, map, not, opt, peek},
    multi::many0,
    sequence::{delimited, preceded, terminated, tuple},
    IResult,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    And,
    Or,
    Not,
    LParen,
    RParen,
    Clause(Clause),
}

/// One `field:value` clause, field optional
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub field: Option<String>,
    pub value: ClauseValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClauseValue {
    Plain(String),
    Quoted(String),
    Regex(String),
    Range {
        lower: String,
        upper: String,
        include_lower: bool,
        include_upper: bool,
    },
}

fn is_plain_char(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, '(' | ')' | '"')
}

fn is_field_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '.' | '-' | '@')
}

/// Operator keyword, only when not followed by more term text
fn keyword<'a>(word: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    terminated(tag(word), not(peek(satisfy(is_plain_char))))
}

fn operator(input: &str) -> IResult<&str, Token> {
    alt((
        map(alt((keyword("AND"), keyword("&&"))), |_| Token::And),
        map(alt((keyword("OR"), keyword("||"))), |_| Token::Or),
        map(keyword("NOT"), |_| Token::Not),
        map(terminated(one_of("-!"), peek(satisfy(|c| !c.is_whitespace()))), |_| {
            Token::Not
        }),
    ))(input)
}

fn paren(input: &str) -> IResult<&str, Token> {
    alt((
        map(char('('), |_| Token::LParen),
        map(char(')'), |_| Token::RParen),
    ))(input)
}

fn quoted_string(input: &str) -> IResult<&str, String> {
    delimited(
        char('"'),
        map(take_until("\""), |s: &str| s.to_string()),
        char('"'),
    )(input)
}

fn regex_literal(input: &str) -> IResult<&str, String> {
    delimited(
        char('/'),
        map(take_until("/"), |s: &str| s.to_string()),
        char('/'),
    )(input)
}

fn range_bound(input: &str) -> IResult<&str, String> {
    alt((
        quoted_string,
        map(
            take_while1(|c: char| !c.is_whitespace() && c != ']' && c != '}'),
            |s: &str| s.to_string(),
        ),
    ))(input)
}

/// `[a TO b]`, `{a TO b}` or mixed brackets
fn range(input: &str) -> IResult<&str, ClauseValue> {
    map(
        tuple((
            one_of("[{"),
            multispace0,
            range_bound,
            multispace1,
            tag("TO"),
            multispace1,
            range_bound,
            multispace0,
            one_of("]}"),
        )),
        |(open, _, lower, _, _, _, upper, _, close)| ClauseValue::Range {
            lower,
            upper,
            include_lower: open == '[',
            include_upper: close == ']',
        },
    )(input)
}

fn clause_value(input: &str) -> IResult<&str, ClauseValue> {
    alt((
        map(quoted_string, ClauseValue::Quoted),
        map(regex_literal, ClauseValue::Regex),
        range,
        map(take_while1(is_plain_char), |s: &str| {
            ClauseValue::Plain(s.to_string())
        }),
    ))(input)
}

fn field_name(input: &str) -> IResult<&str, String> {
    map(terminated(take_while1(is_field_char), char(':')), |s: &str| {
        s.to_string()
    })(input)
}

fn clause(input: &str) -> IResult<&str, Token> {
    map(tuple((opt(field_name), clause_value)), |(field, value)| {
        Token::Clause(Clause { field, value })
    })(input)
}

/// Tokenize a whole query. The remaining input is non-empty when the text
/// could not be fully tokenized (e.g. an unclosed quote).
pub fn tokenize(input: &str) -> IResult<&str, Vec<Token>> {
    terminated(
        many0(preceded(multispace0, alt((paren, operator, clause)))),
        multispace0,
    )(input)
}

/// True when `input` is fully consumed
pub fn at_end(input: &str) -> bool {
    eof::<&str, nom::error::Error<&str>>(input).is_ok()
}
