//! Record filtering for [`Stream::query`](crate::Stream::query).
//!
//! A [`Filter`] carries two recognised options, `limit` and `since`, plus a
//! list of field rules. Rules target either a header field or a top-level
//! body property:
//!
//! | Key | Target |
//! |-----|--------|
//! | `header.<f>` | header field `<f>` |
//! | `body.<f>` | body property `<f>` |
//! | `at`, `source`, `level`, `event`, `trace` | header field |
//! | any other bare key | body property |
//!
//! Keys are never traversed: `body.user.id` targets the body property named
//! `user.id`.

use std::borrow::Cow;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use eventcap_types::CaptureError;
use serde_json::Value;

use crate::normalize::number_to_count;
use crate::record::Record;

/// Bare keys routed to the header.
pub const HEADER_KEYS: [&str; 5] = ["at", "source", "level", "event", "trace"];

/// A caller-supplied field test. Panics count as a non-match.
pub type PredicateFn = Arc<dyn Fn(Option<&Value>, &Record) -> bool + Send + Sync>;

/// Which part of a record a rule reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldTarget {
    Header(String),
    Body(String),
}

impl FieldTarget {
    /// Routes a filter key to its target.
    pub fn parse(key: &str) -> Self {
        if let Some(field) = key.strip_prefix("header.") {
            Self::Header(field.to_string())
        } else if let Some(field) = key.strip_prefix("body.") {
            Self::Body(field.to_string())
        } else if HEADER_KEYS.contains(&key) {
            Self::Header(key.to_string())
        } else {
            Self::Body(key.to_string())
        }
    }

    fn read<'r>(&self, record: &'r Record) -> Option<Cow<'r, Value>> {
        match self {
            Self::Header(field) => record.header_field(field),
            Self::Body(field) => record.body_field(field),
        }
    }
}

/// How a rule decides whether a field matches.
#[derive(Clone)]
pub enum Matcher {
    /// Field must be present and equal to the value.
    Equals(Value),
    /// Field (possibly absent) is handed to the predicate.
    Predicate(PredicateFn),
}

impl std::fmt::Debug for Matcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Equals(value) => f.debug_tuple("Equals").field(value).finish(),
            Self::Predicate(_) => f.write_str("Predicate(<fn>)"),
        }
    }
}

#[derive(Debug, Clone)]
struct Rule {
    target: FieldTarget,
    matcher: Matcher,
}

impl Rule {
    fn matches(&self, record: &Record) -> bool {
        let field = self.target.read(record);
        match &self.matcher {
            Matcher::Equals(expected) => field.is_some_and(|actual| *actual == *expected),
            Matcher::Predicate(predicate) => {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                    predicate(field.as_deref(), record)
                }));
                outcome.unwrap_or_else(|_| {
                    tracing::warn!(rule = ?self.target, "filter predicate panicked; treating as no match");
                    false
                })
            }
        }
    }
}

/// Query options and field rules.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    limit: Option<Value>,
    since: Option<Value>,
    rules: Vec<Rule>,
}

impl Filter {
    /// A filter that matches everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a filter from a loosely typed value.
    ///
    /// A non-object yields an empty filter. `limit` and `since` are read as
    /// options; every other key becomes an equality rule.
    pub fn from_value(value: &Value) -> Self {
        let mut filter = Self::default();
        let Value::Object(map) = value else {
            return filter;
        };

        for (key, value) in map {
            match key.as_str() {
                "limit" => filter.limit = Some(value.clone()),
                "since" => filter.since = Some(value.clone()),
                _ => filter.rules.push(Rule {
                    target: FieldTarget::parse(key),
                    matcher: Matcher::Equals(value.clone()),
                }),
            }
        }
        filter
    }

    /// Keeps at most the `limit` most recent matches.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(Value::from(limit));
        self
    }

    /// Sets `limit` from an unvalidated value; checked when the query runs.
    pub fn with_limit_value(mut self, limit: impl Into<Value>) -> Self {
        self.limit = Some(limit.into());
        self
    }

    /// Drops records stamped before `at`.
    pub fn with_since(mut self, at: i64) -> Self {
        self.since = Some(Value::from(at));
        self
    }

    /// Adds a rule for `key`, routed through [`FieldTarget::parse`].
    pub fn with_rule(mut self, key: &str, matcher: Matcher) -> Self {
        self.rules.push(Rule {
            target: FieldTarget::parse(key),
            matcher,
        });
        self
    }

    /// Adds an equality rule for `key`.
    pub fn with_equals(self, key: &str, value: impl Into<Value>) -> Self {
        self.with_rule(key, Matcher::Equals(value.into()))
    }

    /// Adds a predicate rule for `key`.
    pub fn with_predicate(
        self,
        key: &str,
        predicate: impl Fn(Option<&Value>, &Record) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.with_rule(key, Matcher::Predicate(Arc::new(predicate)))
    }

    /// The validated `limit`, if one was given.
    ///
    /// # Errors
    ///
    /// Returns `CaptureError::InvalidConfig` unless the limit is a
    /// non-negative integer.
    pub fn resolved_limit(&self) -> Result<Option<usize>, CaptureError> {
        let Some(limit) = &self.limit else {
            return Ok(None);
        };
        match limit {
            Value::Number(n) => number_to_count(n).map(Some).ok_or_else(|| {
                CaptureError::InvalidConfig(format!(
                    "query limit must be a non-negative integer, got {limit}"
                ))
            }),
            other => Err(CaptureError::InvalidConfig(format!(
                "query limit must be a non-negative integer, got {other}"
            ))),
        }
    }

    fn since(&self) -> Option<f64> {
        match &self.since {
            Some(Value::Number(n)) => n.as_f64().filter(|f| f.is_finite()),
            _ => None,
        }
    }

    /// Whether a record passes `since` and every rule.
    pub fn matches(&self, record: &Record) -> bool {
        if let Some(since) = self.since() {
            if (record.header.at as f64) < since {
                return false;
            }
        }
        self.rules.iter().all(|rule| rule.matches(record))
    }

    /// Filters a chronological list and trims it to the most recent `limit`.
    ///
    /// # Errors
    ///
    /// Returns `CaptureError::InvalidConfig` for an invalid `limit`.
    pub fn apply(
        &self,
        chronological: impl IntoIterator<Item = Arc<Record>>,
    ) -> Result<Vec<Arc<Record>>, CaptureError> {
        let limit = self.resolved_limit()?;
        if limit == Some(0) {
            return Ok(Vec::new());
        }

        let mut matched: Vec<Arc<Record>> = chronological
            .into_iter()
            .filter(|record| self.matches(record))
            .collect();

        if let Some(limit) = limit {
            if matched.len() > limit {
                matched.drain(..matched.len() - limit);
            }
        }
        Ok(matched)
    }
}
