//! The `{ header, body }` record model.

use std::borrow::Cow;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::clone::CloneHelper;
use crate::hooks::Clock;

/// Key under which non-object payloads are wrapped.
pub const WRAPPED_VALUE_KEY: &str = "value";

/// System-owned metadata attached to every record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordHeader {
    /// Epoch milliseconds from the stream's clock.
    pub at: i64,
    /// Name of the stream that accepted the record.
    pub source: String,
    /// Free-form severity (`log`, `info`, `warn`, `error`, ...).
    pub level: String,
    /// Caller-supplied label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
    /// Caller-supplied opaque context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<Value>,
    /// Timestamp of the previous record accepted by the same stream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_at: Option<i64>,
    /// `at - last_at`; present exactly when `last_at` is.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<i64>,
}

impl RecordHeader {
    /// Reads a header field by its serialized name.
    ///
    /// `lastAt` is also reachable as `last_at`. Unknown names and unset
    /// optional fields return `None`.
    pub fn field(&self, name: &str) -> Option<Value> {
        match name {
            "at" => Some(Value::from(self.at)),
            "source" => Some(Value::from(self.source.as_str())),
            "level" => Some(Value::from(self.level.as_str())),
            "event" => self.event.as_deref().map(Value::from),
            "trace" => self.trace.clone(),
            "lastAt" | "last_at" => self.last_at.map(Value::from),
            "delta" => self.delta.map(Value::from),
            _ => None,
        }
    }
}

/// One captured entry. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// System-owned metadata.
    pub header: RecordHeader,
    /// User-owned payload, shared with the caller unless cloned at emit time.
    pub body: Arc<Map<String, Value>>,
}

impl Record {
    /// Reads a header field (see [`RecordHeader::field`]).
    pub fn header_field(&self, name: &str) -> Option<Cow<'_, Value>> {
        self.header.field(name).map(Cow::Owned)
    }

    /// Reads a top-level body property. No path traversal.
    pub fn body_field(&self, name: &str) -> Option<Cow<'_, Value>> {
        self.body.get(name).map(Cow::Borrowed)
    }
}

/// Input to [`Stream::emit`](crate::Stream::emit).
///
/// A JSON object becomes the record body; anything else is wrapped as
/// `{ "value": <payload> }`. Objects passed as `Arc` are stored without
/// copying unless cloning is requested.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// A key-value body, used directly.
    Object(Arc<Map<String, Value>>),
    /// Any other value, wrapped on construction.
    Value(Value),
}

impl Payload {
    fn into_body(self) -> Arc<Map<String, Value>> {
        match self {
            Self::Object(map) => map,
            Self::Value(value) => {
                let mut map = Map::new();
                map.insert(WRAPPED_VALUE_KEY.to_string(), value);
                Arc::new(map)
            }
        }
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => Self::Object(Arc::new(map)),
            other => Self::Value(other),
        }
    }
}

impl From<Map<String, Value>> for Payload {
    fn from(map: Map<String, Value>) -> Self {
        Self::Object(Arc::new(map))
    }
}

impl From<Arc<Map<String, Value>>> for Payload {
    fn from(map: Arc<Map<String, Value>>) -> Self {
        Self::Object(map)
    }
}

impl From<&Arc<Map<String, Value>>> for Payload {
    fn from(map: &Arc<Map<String, Value>>) -> Self {
        Self::Object(Arc::clone(map))
    }
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Self::Value(Value::from(s))
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Self::Value(Value::from(s))
    }
}

impl From<i64> for Payload {
    fn from(n: i64) -> Self {
        Self::Value(Value::from(n))
    }
}

impl From<f64> for Payload {
    fn from(n: f64) -> Self {
        Self::Value(Value::from(n))
    }
}

impl From<bool> for Payload {
    fn from(b: bool) -> Self {
        Self::Value(Value::from(b))
    }
}

/// Everything besides the payload needed to build a record.
pub struct RecordContext<'a> {
    /// Stamps `header.at`.
    pub clock: &'a Clock,
    /// Owning stream name.
    pub source: &'a str,
    /// Effective level.
    pub level: &'a str,
    /// Optional caller label.
    pub event: Option<&'a str>,
    /// Optional caller context.
    pub trace: Option<&'a Value>,
    /// The stream's last accepted timestamp, if any.
    pub last_at: Option<i64>,
    /// Set when the body must be detached from the caller's copy.
    pub clone_with: Option<&'a CloneHelper>,
}

/// Builds a record, deriving `last_at` and `delta` from the context.
pub fn build_record(payload: Payload, ctx: RecordContext<'_>) -> Record {
    let at = (ctx.clock)();

    let mut body = payload.into_body();
    if let Some(helper) = ctx.clone_with {
        body = helper.clone_body(&body);
    }

    Record {
        header: RecordHeader {
            at,
            source: ctx.source.to_string(),
            level: ctx.level.to_string(),
            event: ctx.event.map(str::to_string),
            trace: ctx.trace.cloned(),
            last_at: ctx.last_at,
            // Injected clocks may jump arbitrarily; clamp instead of overflowing.
            delta: ctx.last_at.map(|last| at.saturating_sub(last)),
        },
        body,
    }
}
