//! The single-stream capture engine.
//!
//! A [`Stream`] accepts records through [`Stream::emit`], retains them in
//! unbounded or ring storage, fires its hooks inline, and answers
//! [`Stream::query`]. Everything happens on the caller's stack; a stream
//! never spawns or defers work.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use eventcap_types::{CaptureError, ConsolePolicy, DEFAULT_LEVEL};
use serde::Serialize;
use serde_json::Value;

use crate::clone::{CloneHelper, DeepCopy};
use crate::hooks::{default_printer, AcceptHook, Clock, HookResolver, PrintContext, PrintHook, Workspace};
use crate::normalize::{
    normalize_console_policy, normalize_limit, resolve_callable, resolve_clock,
    validate_stream_name,
};
use crate::options::{EmitOptions, StreamOptions, StreamPatch};
use crate::query::Filter;
use crate::record::{build_record, Payload, Record, RecordContext};
use crate::storage::Storage;

/// Services a stream may consult but does not own.
#[derive(Clone, Default)]
pub struct Collaborators {
    /// Resolves hook references found in options and patches.
    pub resolver: Option<Arc<dyn HookResolver>>,
    /// Second-tier deep copy used when the native clone refuses a body.
    pub deep_copy: Option<Arc<dyn DeepCopy>>,
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("resolver", &self.resolver.is_some())
            .field("deep_copy", &self.deep_copy.is_some())
            .finish()
    }
}

/// A read-only snapshot of a stream's bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamStats {
    pub name: String,
    pub enabled: bool,
    /// `0` means unbounded.
    pub limit: usize,
    /// Records currently retained.
    pub size: usize,
    /// Records accepted since creation or the last `clear`.
    pub total_accepted: u64,
    pub is_ring: bool,
}

/// One named, bounded or unbounded sequence of records.
pub struct Stream {
    name: String,
    enabled: bool,
    limit: usize,
    console: ConsolePolicy,
    on_accept: Option<AcceptHook>,
    on_print: Option<PrintHook>,
    clock: Clock,
    clone_by_default: bool,
    cloner: CloneHelper,
    resolver: Option<Arc<dyn HookResolver>>,
    workspace: Workspace,
    storage: Storage,
    total_accepted: u64,
    last_at: Option<i64>,
}

impl Stream {
    /// Creates a stream with no external collaborators.
    ///
    /// # Errors
    ///
    /// Returns `CaptureError::InvalidName` for a missing or invalid name and
    /// `CaptureError::InvalidConfig` for an invalid limit, hook, or clock.
    pub fn new(options: StreamOptions) -> Result<Self, CaptureError> {
        Self::with_collaborators(options, Collaborators::default())
    }

    /// Creates a stream that resolves hook references and deep-copies bodies
    /// through `collaborators`.
    ///
    /// # Errors
    ///
    /// See [`Stream::new`].
    pub fn with_collaborators(
        options: StreamOptions,
        collaborators: Collaborators,
    ) -> Result<Self, CaptureError> {
        let name = validate_stream_name(options.name.as_ref().unwrap_or(&Value::Null), true)?
            .ok_or_else(|| CaptureError::InvalidName("stream name is required".to_string()))?;
        let limit = normalize_limit(options.limit.as_ref().unwrap_or(&Value::Null))?;
        let console = options
            .console
            .as_ref()
            .map(normalize_console_policy)
            .unwrap_or_default();

        let resolver = collaborators.resolver;
        let on_accept = resolve_callable(options.on_accept, "on_accept", |reference| {
            resolver.as_ref()?.resolve_accept(reference)
        })?;
        let on_print = resolve_callable(options.on_print, "on_print", |reference| {
            resolver.as_ref()?.resolve_print(reference)
        })?;
        let clock = resolve_clock(options.clock)?;

        let cloner = match collaborators.deep_copy {
            Some(copier) => CloneHelper::with_fallback(copier),
            None => CloneHelper::new(),
        };

        tracing::debug!(stream = %name, limit, %console, "stream created");

        Ok(Self {
            name,
            enabled: options.enabled.unwrap_or(true),
            limit,
            console,
            on_accept,
            on_print,
            clock,
            clone_by_default: options.clone.unwrap_or(false),
            cloner,
            resolver,
            workspace: options.workspace.unwrap_or_default(),
            storage: Storage::new(limit),
            total_accepted: 0,
            last_at: None,
        })
    }

    /// Captures one record.
    ///
    /// Returns `None` when the stream is disabled. Hook and printer panics
    /// are caught and never reach the caller.
    pub fn emit(&mut self, payload: impl Into<Payload>, options: &EmitOptions) -> Option<Arc<Record>> {
        if !self.enabled {
            return None;
        }

        let level = options.level.as_deref().unwrap_or(DEFAULT_LEVEL);
        let clone = options.clone.unwrap_or(self.clone_by_default);
        let record = Arc::new(build_record(
            payload.into(),
            RecordContext {
                clock: &self.clock,
                source: &self.name,
                level,
                event: options.event.as_deref(),
                trace: options.trace.as_ref(),
                last_at: self.last_at,
                clone_with: clone.then_some(&self.cloner),
            },
        ));

        self.last_at = Some(record.header.at);
        self.storage.push(Arc::clone(&record));
        self.total_accepted += 1;

        tracing::trace!(
            stream = %self.name,
            level = %record.header.level,
            at = record.header.at,
            "record accepted"
        );

        self.fire_accept(&record);
        self.print(&record, options);

        Some(record)
    }

    /// Emits with level `log`.
    pub fn log(&mut self, payload: impl Into<Payload>) -> Option<Arc<Record>> {
        self.emit(payload, &EmitOptions::level("log"))
    }

    /// Emits with level `info`.
    pub fn info(&mut self, payload: impl Into<Payload>) -> Option<Arc<Record>> {
        self.emit(payload, &EmitOptions::level("info"))
    }

    /// Emits with level `warn`.
    pub fn warn(&mut self, payload: impl Into<Payload>) -> Option<Arc<Record>> {
        self.emit(payload, &EmitOptions::level("warn"))
    }

    /// Emits with level `error`.
    pub fn error(&mut self, payload: impl Into<Payload>) -> Option<Arc<Record>> {
        self.emit(payload, &EmitOptions::level("error"))
    }

    fn fire_accept(&self, record: &Record) {
        let Some(hook) = &self.on_accept else {
            return;
        };
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| hook(record, self, &self.workspace)));
        if outcome.is_err() {
            tracing::warn!(stream = %self.name, "accept hook panicked; record kept");
        }
    }

    fn print(&self, record: &Record, options: &EmitOptions) {
        if options.print == Some(false) {
            return;
        }

        let policy = options
            .console
            .as_ref()
            .map(normalize_console_policy)
            .unwrap_or(self.console);
        let severity = ConsolePolicy::for_level(&record.header.level);
        if !policy.allows(severity) {
            return;
        }

        let ctx = PrintContext { severity, policy };
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| match &self.on_print {
            Some(hook) => hook(record, &ctx, &self.workspace),
            None => default_printer(record, &ctx, &self.workspace),
        }));
        if outcome.is_err() {
            tracing::warn!(stream = %self.name, "print hook panicked; ignoring");
        }
    }

    /// Applies the fields present in `patch`.
    ///
    /// Every present value is validated before any is applied, so a failing
    /// patch leaves the stream untouched.
    ///
    /// # Errors
    ///
    /// Returns `CaptureError::InvalidConfig` for an invalid limit, an
    /// unresolvable hook reference, or a non-callable clock.
    pub fn configure(&mut self, patch: &StreamPatch) -> Result<(), CaptureError> {
        let limit = patch.limit.as_ref().map(normalize_limit).transpose()?;
        let on_accept = patch
            .on_accept
            .clone()
            .map(|hook| {
                resolve_callable(Some(hook), "on_accept", |reference| {
                    self.resolver.as_ref()?.resolve_accept(reference)
                })
            })
            .transpose()?;
        let on_print = patch
            .on_print
            .clone()
            .map(|hook| {
                resolve_callable(Some(hook), "on_print", |reference| {
                    self.resolver.as_ref()?.resolve_print(reference)
                })
            })
            .transpose()?;
        let clock = patch
            .clock
            .clone()
            .map(|clock| resolve_clock(Some(clock)))
            .transpose()?;

        if let Some(enabled) = patch.enabled {
            self.enabled = enabled;
        }
        if let Some(limit) = limit {
            self.apply_limit(limit);
        }
        if let Some(console) = &patch.console {
            self.console = normalize_console_policy(console);
        }
        if let Some(hook) = on_accept {
            self.on_accept = hook;
        }
        if let Some(hook) = on_print {
            self.on_print = hook;
        }
        if let Some(clock) = clock {
            self.clock = clock;
        }
        if let Some(workspace) = &patch.workspace {
            self.workspace = workspace.clone();
        }
        if let Some(clone) = patch.clone {
            self.clone_by_default = clone;
        }

        tracing::debug!(
            stream = %self.name,
            enabled = self.enabled,
            limit = self.limit,
            console = %self.console,
            "stream configured"
        );
        Ok(())
    }

    /// Parses and applies a loosely typed patch.
    ///
    /// # Errors
    ///
    /// Returns `CaptureError::InvalidConfig` if `patch` is not an object or
    /// any of its values is invalid.
    pub fn configure_value(&mut self, patch: &Value) -> Result<(), CaptureError> {
        self.configure(&StreamPatch::from_value(patch)?)
    }

    /// Changes the retention bound, truncating to the most recent records
    /// when it shrinks.
    ///
    /// # Errors
    ///
    /// Returns `CaptureError::InvalidConfig` if `limit` does not normalize.
    pub fn set_limit(&mut self, limit: &Value) -> Result<(), CaptureError> {
        let limit = normalize_limit(limit)?;
        self.apply_limit(limit);
        Ok(())
    }

    fn apply_limit(&mut self, limit: usize) {
        if limit == self.limit {
            return;
        }
        let dropped = self.storage.resize(limit);
        tracing::debug!(stream = %self.name, from = self.limit, to = limit, dropped, "limit changed");
        self.limit = limit;
    }

    /// Sets the default console policy.
    pub fn set_console(&mut self, console: &Value) {
        self.console = normalize_console_policy(console);
    }

    /// Replaces the workspace forwarded to hooks.
    pub fn set_workspace(&mut self, workspace: impl Into<Workspace>) {
        self.workspace = workspace.into();
    }

    pub fn enable(&mut self) {
        self.enabled = true;
    }

    pub fn disable(&mut self) {
        self.enabled = false;
    }

    /// Returns matching records, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `CaptureError::InvalidConfig` if the filter's `limit` is not a
    /// non-negative integer.
    pub fn query(&self, filter: &Filter) -> Result<Vec<Arc<Record>>, CaptureError> {
        if filter.resolved_limit()? == Some(0) {
            return Ok(Vec::new());
        }
        filter.apply(self.storage.chronological())
    }

    /// Every retained record, oldest first.
    pub fn records(&self) -> Vec<Arc<Record>> {
        self.storage.chronological()
    }

    pub fn stats(&self) -> StreamStats {
        StreamStats {
            name: self.name.clone(),
            enabled: self.enabled,
            limit: self.limit,
            size: self.storage.len(),
            total_accepted: self.total_accepted,
            is_ring: self.limit > 0,
        }
    }

    /// Drops every record and resets the accepted counter. The last accepted
    /// timestamp is kept so the next record's `delta` spans the clear.
    pub fn clear(&mut self) {
        self.storage.clear();
        self.total_accepted = 0;
        tracing::debug!(stream = %self.name, "stream cleared");
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn size(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.len() == 0
    }

    pub fn console(&self) -> ConsolePolicy {
        self.console
    }

    pub fn clones_by_default(&self) -> bool {
        self.clone_by_default
    }

    pub fn last_at(&self) -> Option<i64> {
        self.last_at
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }
}

impl std::fmt::Debug for Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stream")
            .field("name", &self.name)
            .field("enabled", &self.enabled)
            .field("limit", &self.limit)
            .field("console", &self.console)
            .field("size", &self.storage.len())
            .field("total_accepted", &self.total_accepted)
            .field("last_at", &self.last_at)
            .finish_non_exhaustive()
    }
}
