use super::tokenizer::{at_end, tokenize, Clause, ClauseValue, Token};
use crate::model::{Query, RangeQuery};
use crate::value::Value;
use crate::{Error, Result};

/// Field that receives clauses without an explicit field
pub const DEFAULT_FIELD: &str = "_all";

/// Deepest nesting of groups and negations a query may use
pub const MAX_NESTING: usize = 64;

pub struct LuceneParser;

impl LuceneParser {
    pub fn parse(query: &str, default_field: Option<&str>) -> Result<Query> {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return Err(Error::Parse("Empty query".to_string()));
        }

        let (rest, tokens) = tokenize(trimmed)
            .map_err(|e| Error::Parse(format!("Failed to tokenize '{}': {}", trimmed, e)))?;
        if !at_end(rest) {
            return Err(Error::Parse(format!(
                "Unexpected input at '{}' in '{}'",
                rest, trimmed
            )));
        }

        let mut cursor = Cursor {
            tokens: &tokens,
            pos: 0,
            depth: 0,
            default_field: default_field.unwrap_or(DEFAULT_FIELD),
        };
        let query = cursor.parse_or()?;
        if let Some(token) = cursor.peek() {
            return Err(Error::Parse(format!(
                "Unexpected {:?} in '{}'",
                token, trimmed
            )));
        }
        Ok(query)
    }

    fn parse_literal(text: &str) -> Value {
        match text {
            "true" => return Value::Bool(true),
            "false" => return Value::Bool(false),
            _ => {}
        }
        if let Ok(n) = text.parse::<i64>() {
            return Value::Long(n);
        }
        if text.chars().any(|c| c.is_ascii_digit()) {
            if let Ok(n) = text.parse::<f64>() {
                if n.is_finite() {
                    return Value::Double(n);
                }
            }
        }
        Value::Str(text.to_string())
    }

    fn parse_bound(text: &str) -> Option<Value> {
        if text == "*" {
            None
        } else {
            Some(Self::parse_literal(text))
        }
    }

    fn build_clause(clause: &Clause, default_field: &str) -> Query {
        if let (Some("_exists_"), ClauseValue::Plain(field)) =
            (clause.field.as_deref(), &clause.value)
        {
            return Query::exists(field.as_str());
        }
        if let (None, ClauseValue::Plain(value)) = (&clause.field, &clause.value) {
            if value == "*" {
                return Query::MatchAll;
            }
        }

        let field = clause.field.as_deref().unwrap_or(default_field);
        match &clause.value {
            ClauseValue::Quoted(text) => Query::phrase(
                field,
                text.split_whitespace().map(|s| s.to_string()).collect(),
            ),
            ClauseValue::Regex(pattern) => Query::regex(field, pattern.as_str()),
            ClauseValue::Range {
                lower,
                upper,
                include_lower,
                include_upper,
            } => {
                let mut range = RangeQuery::new(field);
                if let Some(v) = Self::parse_bound(lower) {
                    if *include_lower {
                        range.gte = Some(v);
                    } else {
                        range.gt = Some(v);
                    }
                }
                if let Some(v) = Self::parse_bound(upper) {
                    if *include_upper {
                        range.lte = Some(v);
                    } else {
                        range.lt = Some(v);
                    }
                }
                Query::Range(range)
            }
            ClauseValue::Plain(value) => {
                if value.contains('*') || value.contains('?') {
                    Query::wildcard(field, value.as_str())
                } else {
                    Query::term(field, Self::parse_literal(value))
                }
            }
        }
    }
}

struct Cursor<'a> {
    tokens: &'a [Token],
    pos: usize,
    depth: usize,
    default_field: &'a str,
}

impl<'a> Cursor<'a> {
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn descend(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(Error::Parse(format!(
                "Query nested deeper than {} levels",
                MAX_NESTING
            )));
        }
        Ok(())
    }

    // Precedence: OR (lowest) > AND / juxtaposition > NOT > primary (highest)
    fn parse_or(&mut self) -> Result<Query> {
        let mut children = vec![self.parse_and()?];
        while let Some(Token::Or) = self.peek() {
            self.next();
            children.push(self.parse_and()?);
        }
        Ok(Self::collapse(children, Query::or))
    }

    fn parse_and(&mut self) -> Result<Query> {
        let mut children = vec![self.parse_not()?];
        loop {
            match self.peek() {
                Some(Token::And) => {
                    self.next();
                    children.push(self.parse_not()?);
                }
                Some(Token::Not) | Some(Token::LParen) | Some(Token::Clause(_)) => {
                    children.push(self.parse_not()?);
                }
                _ => break,
            }
        }
        Ok(Self::collapse(children, Query::and))
    }

    fn parse_not(&mut self) -> Result<Query> {
        if let Some(Token::Not) = self.peek() {
            self.next();
            self.descend()?;
            let child = self.parse_not()?;
            self.depth -= 1;
            return Ok(Query::not(vec![child]));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Query> {
        match self.next() {
            Some(Token::LParen) => {
                self.descend()?;
                let inner = self.parse_or()?;
                self.depth -= 1;
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(Error::Parse("Unbalanced parentheses".to_string())),
                }
            }
            Some(Token::Clause(clause)) => Ok(LuceneParser::build_clause(clause, self.default_field)),
            Some(token) => Err(Error::Parse(format!("Unexpected {:?}", token))),
            None => Err(Error::Parse("Unexpected end of query".to_string())),
        }
    }

    fn collapse(mut children: Vec<Query>, combine: fn(Vec<Query>) -> Query) -> Query {
        if children.len() == 1 {
            children.remove(0)
        } else {
            combine(children)
        }
    }
}
