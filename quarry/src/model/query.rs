use crate::value::Value;
use serde::{Deserialize, Serialize};

/// Filter expression tree node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Query {
    /// All children must match
    And { of: Vec<Query> },

    /// At least one child must match
    Or { of: Vec<Query> },

    /// None of the children may match
    Not { of: Vec<Query> },

    /// Field equals value: `status:active`
    Term(TermQuery),

    /// Field equals any of the values
    Terms(TermsQuery),

    /// Tokens joined by single spaces, compared case-insensitively
    Phrase(PhraseQuery),

    /// Field starts with text
    Prefix(PrefixQuery),

    /// Glob pattern with `*` and `?`; `*` alone means "has a value"
    Wildcard(WildcardQuery),

    /// Full-match regular expression
    Regex(RegexQuery),

    /// Numeric or lexical bounds
    Range(RangeQuery),

    /// Date bounds resolved through date math
    DateRange(DateRangeQuery),

    /// Embedded textual query, expanded before execution
    Lucene(LuceneQuery),

    /// Reference to a bucket of a named aggregation, expanded before execution
    Named(NamedQuery),

    MatchAll,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermQuery {
    pub field: String,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermsQuery {
    pub field: String,
    pub values: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhraseQuery {
    pub field: String,
    pub tokens: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrefixQuery {
    pub field: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WildcardQuery {
    pub field: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegexQuery {
    pub field: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RangeQuery {
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lt: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lte: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gt: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gte: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DateRangeQuery {
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lt: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lte: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gt: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gte: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LuceneQuery {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_field: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedQuery {
    pub name: String,
    pub value: Value,
}

impl RangeQuery {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            ..Default::default()
        }
    }

    pub fn lt(mut self, value: impl Into<Value>) -> Self {
        self.lt = Some(value.into());
        self
    }

    pub fn lte(mut self, value: impl Into<Value>) -> Self {
        self.lte = Some(value.into());
        self
    }

    pub fn gt(mut self, value: impl Into<Value>) -> Self {
        self.gt = Some(value.into());
        self
    }

    pub fn gte(mut self, value: impl Into<Value>) -> Self {
        self.gte = Some(value.into());
        self
    }
}

impl DateRangeQuery {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            ..Default::default()
        }
    }

    pub fn lt(mut self, value: impl Into<Value>) -> Self {
        self.lt = Some(value.into());
        self
    }

    pub fn lte(mut self, value: impl Into<Value>) -> Self {
        self.lte = Some(value.into());
        self
    }

    pub fn gt(mut self, value: impl Into<Value>) -> Self {
        self.gt = Some(value.into());
        self
    }

    pub fn gte(mut self, value: impl Into<Value>) -> Self {
        self.gte = Some(value.into());
        self
    }

    pub fn time_zone(mut self, tz: impl Into<String>) -> Self {
        self.time_zone = Some(tz.into());
        self
    }
}

impl From<RangeQuery> for Query {
    fn from(q: RangeQuery) -> Self {
        Query::Range(q)
    }
}

impl From<DateRangeQuery> for Query {
    fn from(q: DateRangeQuery) -> Self {
        Query::DateRange(q)
    }
}

impl Query {
    pub fn and(of: Vec<Query>) -> Self {
        Query::And { of }
    }

    pub fn or(of: Vec<Query>) -> Self {
        Query::Or { of }
    }

    pub fn not(of: Vec<Query>) -> Self {
        Query::Not { of }
    }

    pub fn term(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Query::Term(TermQuery {
            field: field.into(),
            value: value.into(),
        })
    }

    pub fn terms<V: Into<Value>>(field: impl Into<String>, values: Vec<V>) -> Self {
        Query::Terms(TermsQuery {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        })
    }

    pub fn phrase(field: impl Into<String>, tokens: Vec<String>) -> Self {
        Query::Phrase(PhraseQuery {
            field: field.into(),
            tokens,
        })
    }

    pub fn prefix(field: impl Into<String>, value: impl Into<String>) -> Self {
        Query::Prefix(PrefixQuery {
            field: field.into(),
            value: value.into(),
        })
    }

    pub fn wildcard(field: impl Into<String>, value: impl Into<String>) -> Self {
        Query::Wildcard(WildcardQuery {
            field: field.into(),
            value: value.into(),
        })
    }

    /// Field has at least one non-null value
    pub fn exists(field: impl Into<String>) -> Self {
        Query::wildcard(field, "*")
    }

    pub fn regex(field: impl Into<String>, value: impl Into<String>) -> Self {
        Query::Regex(RegexQuery {
            field: field.into(),
            value: value.into(),
        })
    }

    pub fn lucene(query: impl Into<String>, default_field: Option<String>) -> Self {
        Query::Lucene(LuceneQuery {
            query: query.into(),
            default_field,
        })
    }

    pub fn named(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Query::Named(NamedQuery {
            name: name.into(),
            value: value.into(),
        })
    }

    pub fn match_all() -> Self {
        Query::MatchAll
    }

    /// Field targeted by a leaf query
    pub fn field(&self) -> Option<&str> {
        match self {
            Query::Term(q) => Some(&q.field),
            Query::Terms(q) => Some(&q.field),
            Query::Phrase(q) => Some(&q.field),
            Query::Prefix(q) => Some(&q.field),
            Query::Wildcard(q) => Some(&q.field),
            Query::Regex(q) => Some(&q.field),
            Query::Range(q) => Some(&q.field),
            Query::DateRange(q) => Some(&q.field),
            Query::And { .. }
            | Query::Or { .. }
            | Query::Not { .. }
            | Query::Lucene(_)
            | Query::Named(_)
            | Query::MatchAll => None,
        }
    }

    pub fn query_type(&self) -> &'static str {
        match self {
            Query::And { .. } => "and",
            Query::Or { .. } => "or",
            Query::Not { .. } => "not",
            Query::Term(_) => "term",
            Query::Terms(_) => "terms",
            Query::Phrase(_) => "phrase",
            Query::Prefix(_) => "prefix",
            Query::Wildcard(_) => "wildcard",
            Query::Regex(_) => "regex",
            Query::Range(_) => "range",
            Query::DateRange(_) => "date_range",
            Query::Lucene(_) => "lucene",
            Query::Named(_) => "named",
            Query::MatchAll => "match_all",
        }
    }
}
