//! In-memory event capture for eventcap.
//!
//! A [`Stream`] accepts structured entries from application code and keeps
//! them in bounded or unbounded memory for later inspection. It performs no
//! transport, scheduling, or transformation; shippers, samplers, and batchers
//! belong in layers built on top.
//!
//! # Records
//!
//! Every captured entry is a [`Record`] with two parts:
//!
//! | Part | Owner | Contents |
//! |------|-------|----------|
//! | `header` | stream | `at`, `source`, `level`, optional `event`, `trace`, `lastAt`, `delta` |
//! | `body` | caller | the payload object, or `{ "value": <payload> }` for non-objects |
//!
//! # Storage
//!
//! With `limit == 0` a stream grows without bound. With `limit > 0` it is a
//! ring: once full, each new record overwrites the oldest. Queries always
//! return records oldest first.
//!
//! # Usage
//!
//! ```rust,ignore
//! use eventcap_core::{EmitOptions, Filter, Stream, StreamOptions};
//! use serde_json::json;
//!
//! let mut stream = Stream::new(StreamOptions::named("http").with_limit(500))?;
//! stream.emit(json!({"code": 503, "path": "/api"}), &EmitOptions::level("error"));
//!
//! let failures = stream.query(&Filter::new().with_predicate("code", |code, _| {
//!     code.and_then(|c| c.as_i64()).is_some_and(|c| c >= 500)
//! }))?;
//! ```

mod clone;
mod hooks;
pub mod normalize;
mod options;
mod query;
mod record;
mod storage;
mod stream;

pub use clone::{CloneHelper, DeepCopy, MAX_NATIVE_DEPTH};
pub use eventcap_types::{CaptureError, ConsolePolicy};
pub use hooks::{
    default_printer, system_clock, AcceptHook, Clock, HookRef, HookResolver, PrintContext,
    PrintHook, Workspace,
};
pub use options::{EmitOptions, StreamOptions, StreamPatch};
pub use query::{FieldTarget, Filter, Matcher, PredicateFn, HEADER_KEYS};
pub use record::{build_record, Payload, Record, RecordContext, RecordHeader, WRAPPED_VALUE_KEY};
pub use stream::{Collaborators, Stream, StreamStats};
