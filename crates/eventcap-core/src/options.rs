//! Construction options, runtime patches, and per-emit options.
//!
//! Every field is an `Option`: `Some` means "the caller set this", even when
//! the value inside is falsy, and `None` means "leave it to the default" (or,
//! for a patch, "leave it unchanged"). When deserializing, an explicit `null`
//! counts as present.

use eventcap_types::{CaptureError, ConsolePolicy};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::hooks::{AcceptHook, Clock, HookRef, PrintContext, PrintHook, Workspace};
use crate::record::Record;
use crate::stream::Stream;

/// Deserializes a present field, including an explicit `null`, as `Some`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// Options used to construct a [`Stream`].
///
/// Raw values are normalized on construction; see
/// [`normalize`](crate::normalize).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StreamOptions {
    /// Stream name (string or number).
    #[serde(deserialize_with = "present")]
    pub name: Option<Value>,
    /// Retained record bound; `0` or falsy is unbounded.
    #[serde(deserialize_with = "present")]
    pub limit: Option<Value>,
    /// Whether `emit` accepts records. Defaults to `true`.
    pub enabled: Option<bool>,
    /// Console policy. Defaults to `off`.
    #[serde(deserialize_with = "present")]
    pub console: Option<Value>,
    /// Hook fired after each stored record.
    #[serde(deserialize_with = "present")]
    pub on_accept: Option<HookRef<AcceptHook>>,
    /// Hook replacing the default printer.
    #[serde(deserialize_with = "present")]
    pub on_print: Option<HookRef<PrintHook>>,
    /// Clock stamping `header.at`. Defaults to the system clock.
    #[serde(deserialize_with = "present")]
    pub clock: Option<HookRef<Clock>>,
    /// Whether bodies are deep-copied by default.
    pub clone: Option<bool>,
    /// Container forwarded to hooks.
    #[serde(deserialize_with = "present")]
    pub workspace: Option<Workspace>,
}

impl StreamOptions {
    /// Options for a stream called `name`.
    pub fn named(name: impl Into<Value>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Fills every unset field from `defaults`. Fields set here win, even
    /// when falsy.
    pub fn merged_over(self, defaults: &StreamOptions) -> StreamOptions {
        StreamOptions {
            name: self.name.or_else(|| defaults.name.clone()),
            limit: self.limit.or_else(|| defaults.limit.clone()),
            enabled: self.enabled.or(defaults.enabled),
            console: self.console.or_else(|| defaults.console.clone()),
            on_accept: self.on_accept.or_else(|| defaults.on_accept.clone()),
            on_print: self.on_print.or_else(|| defaults.on_print.clone()),
            clock: self.clock.or_else(|| defaults.clock.clone()),
            clone: self.clone.or(defaults.clone),
            workspace: self.workspace.or_else(|| defaults.workspace.clone()),
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(Value::from(limit));
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    pub fn with_console(mut self, policy: ConsolePolicy) -> Self {
        self.console = Some(Value::from(policy.as_str()));
        self
    }

    pub fn with_on_accept(
        mut self,
        hook: impl Fn(&Record, &Stream, &Workspace) + Send + Sync + 'static,
    ) -> Self {
        self.on_accept = Some(HookRef::accept(hook));
        self
    }

    pub fn with_on_print(
        mut self,
        hook: impl Fn(&Record, &PrintContext, &Workspace) + Send + Sync + 'static,
    ) -> Self {
        self.on_print = Some(HookRef::print(hook));
        self
    }

    pub fn with_clock(mut self, clock: impl Fn() -> i64 + Send + Sync + 'static) -> Self {
        self.clock = Some(HookRef::clock(clock));
        self
    }

    pub fn with_clone(mut self, clone: bool) -> Self {
        self.clone = Some(clone);
        self
    }

    pub fn with_workspace(mut self, workspace: Workspace) -> Self {
        self.workspace = Some(workspace);
        self
    }
}

/// A runtime patch for [`Stream::configure`].
///
/// Only the fields that are `Some` are applied. A hook set to
/// [`HookRef::none`] removes the current hook; a clock set to it restores the
/// system clock.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StreamPatch {
    pub enabled: Option<bool>,
    #[serde(deserialize_with = "present")]
    pub limit: Option<Value>,
    #[serde(deserialize_with = "present")]
    pub console: Option<Value>,
    #[serde(deserialize_with = "present")]
    pub on_accept: Option<HookRef<AcceptHook>>,
    #[serde(deserialize_with = "present")]
    pub on_print: Option<HookRef<PrintHook>>,
    #[serde(deserialize_with = "present")]
    pub clock: Option<HookRef<Clock>>,
    #[serde(deserialize_with = "present")]
    pub workspace: Option<Workspace>,
    pub clone: Option<bool>,
}

impl StreamPatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a patch from a loosely typed value.
    ///
    /// # Errors
    ///
    /// Returns `CaptureError::InvalidConfig` if `value` is not an object or
    /// one of its fields has the wrong shape.
    pub fn from_value(value: &Value) -> Result<Self, CaptureError> {
        if !value.is_object() {
            return Err(CaptureError::InvalidConfig(format!(
                "configure patch must be an object, got {value}"
            )));
        }
        serde_json::from_value(value.clone())
            .map_err(|e| CaptureError::InvalidConfig(format!("configure patch: {e}")))
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    pub fn with_limit(mut self, limit: impl Into<Value>) -> Self {
        self.limit = Some(limit.into());
        self
    }

    pub fn with_console(mut self, console: impl Into<Value>) -> Self {
        self.console = Some(console.into());
        self
    }

    pub fn with_on_accept(mut self, hook: HookRef<AcceptHook>) -> Self {
        self.on_accept = Some(hook);
        self
    }

    pub fn with_on_print(mut self, hook: HookRef<PrintHook>) -> Self {
        self.on_print = Some(hook);
        self
    }

    pub fn with_clock(mut self, clock: HookRef<Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn with_workspace(mut self, workspace: impl Into<Workspace>) -> Self {
        self.workspace = Some(workspace.into());
        self
    }

    pub fn with_clone(mut self, clone: bool) -> Self {
        self.clone = Some(clone);
        self
    }
}

/// Per-call options for [`Stream::emit`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EmitOptions {
    /// Record level; `log` when unset.
    pub level: Option<String>,
    pub event: Option<String>,
    pub trace: Option<Value>,
    /// Overrides the stream's clone policy when set, even to `false`.
    pub clone: Option<bool>,
    /// `Some(false)` suppresses printing for this call.
    pub print: Option<bool>,
    /// Overrides the stream's console policy for this call.
    #[serde(deserialize_with = "present")]
    pub console: Option<Value>,
}

impl EmitOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options carrying only a level.
    pub fn level(level: impl Into<String>) -> Self {
        Self {
            level: Some(level.into()),
            ..Self::default()
        }
    }

    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = Some(level.into());
        self
    }

    pub fn with_event(mut self, event: impl Into<String>) -> Self {
        self.event = Some(event.into());
        self
    }

    pub fn with_trace(mut self, trace: impl Into<Value>) -> Self {
        self.trace = Some(trace.into());
        self
    }

    pub fn with_clone(mut self, clone: bool) -> Self {
        self.clone = Some(clone);
        self
    }

    pub fn with_print(mut self, print: bool) -> Self {
        self.print = Some(print);
        self
    }

    pub fn with_console(mut self, console: impl Into<Value>) -> Self {
        self.console = Some(console.into());
        self
    }
}
