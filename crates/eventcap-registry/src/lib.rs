//! Named stream registry for eventcap.
//!
//! A [`Registry`] owns many named [`Stream`]s, applies creation defaults,
//! and forwards `log`/`info`/`warn`/`error` calls by stream name. It never
//! stores records itself; every record lives in exactly one stream.
//!
//! # Lookup modes
//!
//! | Entry point | Invalid or unknown name |
//! |-------------|-------------------------|
//! | [`Registry::get`], [`Registry::query`], forwarding calls | `None` / empty |
//! | [`Registry::require`], [`Registry::configure`], [`Registry::create`] | `CaptureError` |
//!
//! # Defaults
//!
//! Options passed to [`Registry::create`] are merged over the registry's
//! defaults field by field: a field the caller set wins even when it is
//! falsy (`enabled = false`, `limit = 0`); an unset field takes the default.
//!
//! # Usage
//!
//! ```rust,ignore
//! use eventcap_registry::{load_config, Registry};
//!
//! let config = load_config(Some("eventcap.toml"))?;
//! eventcap_registry::init_logging(&config.logging);
//!
//! let mut registry = Registry::from_config(&config)?;
//! registry.warn("http", serde_json::json!({"path": "/slow", "ms": 2400}));
//! ```

pub mod config;
pub mod logging;

pub use config::{load_config, parse_config, Config, ConfigError, LoggingConfig};
pub use logging::init_logging;

use std::collections::BTreeMap;
use std::sync::Arc;

use eventcap_core::normalize::validate_stream_name;
use eventcap_core::{
    CaptureError, Collaborators, DeepCopy, EmitOptions, Filter, HookResolver, Payload, Record,
    Stream, StreamOptions, StreamPatch, StreamStats,
};
use parking_lot::Mutex;
use serde_json::Value;

/// Shared handle to a registered stream.
///
/// Hooks run while the handle's lock is held; they receive the stream
/// directly and must not lock it again.
pub type StreamHandle = Arc<Mutex<Stream>>;

/// Owns named streams and routes calls to them.
#[derive(Debug, Default)]
pub struct Registry {
    streams: BTreeMap<String, StreamHandle>,
    defaults: StreamOptions,
    collaborators: Collaborators,
}

impl Registry {
    /// Creates an empty registry with no defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty registry with creation defaults.
    pub fn with_defaults(defaults: StreamOptions) -> Self {
        Self {
            defaults,
            ..Self::default()
        }
    }

    /// Uses `resolver` for hook references in options and patches.
    pub fn with_resolver(mut self, resolver: Arc<dyn HookResolver>) -> Self {
        self.collaborators.resolver = Some(resolver);
        self
    }

    /// Uses `copier` when a body is too deep for the native clone.
    pub fn with_deep_copy(mut self, copier: Arc<dyn DeepCopy>) -> Self {
        self.collaborators.deep_copy = Some(copier);
        self
    }

    /// Builds a registry from loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns the first `CaptureError` raised by a declared stream.
    pub fn from_config(config: &Config) -> Result<Self, CaptureError> {
        let mut registry = Self::new();
        registry.load(config)?;
        Ok(registry)
    }

    /// Adopts `config.defaults` and creates every declared stream.
    ///
    /// Call after [`Registry::with_resolver`] when declared streams name
    /// their hooks. Returns the number of streams created.
    ///
    /// # Errors
    ///
    /// Returns the first `CaptureError` raised by a declared stream; streams
    /// declared before it stay registered.
    pub fn load(&mut self, config: &Config) -> Result<usize, CaptureError> {
        self.defaults = config.defaults.clone();
        for options in &config.streams {
            let name = options.name.clone().unwrap_or(Value::Null);
            self.create(name, options.clone())?;
        }
        tracing::debug!(streams = config.streams.len(), "registry loaded from config");
        Ok(config.streams.len())
    }

    /// Replaces the creation defaults. Existing streams are not touched.
    pub fn set_defaults(&mut self, defaults: StreamOptions) {
        self.defaults = defaults;
    }

    pub fn defaults(&self) -> &StreamOptions {
        &self.defaults
    }

    /// Creates (or replaces) the stream called `name`.
    ///
    /// # Errors
    ///
    /// Returns `CaptureError::InvalidName` for an invalid name, or any
    /// construction error from the merged options.
    pub fn create(
        &mut self,
        name: impl Into<Value>,
        options: StreamOptions,
    ) -> Result<StreamHandle, CaptureError> {
        let name = strict_name(&name.into())?;
        let options = StreamOptions {
            name: Some(Value::from(name.as_str())),
            ..options
        }
        .merged_over(&self.defaults);

        let stream = Stream::with_collaborators(options, self.collaborators.clone())?;
        let handle = Arc::new(Mutex::new(stream));
        if self.streams.insert(name.clone(), Arc::clone(&handle)).is_some() {
            tracing::debug!(stream = %name, "replaced existing stream");
        } else {
            tracing::debug!(stream = %name, "registered stream");
        }
        Ok(handle)
    }

    /// Returns the stream called `name`, creating it from `options` if absent.
    ///
    /// # Errors
    ///
    /// Returns `CaptureError::InvalidName` for an invalid name, or any
    /// construction error when the stream has to be created.
    pub fn get_or_create(
        &mut self,
        name: impl Into<Value>,
        options: StreamOptions,
    ) -> Result<StreamHandle, CaptureError> {
        let name = strict_name(&name.into())?;
        match self.streams.get(&name) {
            Some(handle) => Ok(Arc::clone(handle)),
            None => self.create(name, options),
        }
    }

    fn lookup(&self, name: &Value, strict: bool) -> Result<Option<StreamHandle>, CaptureError> {
        let Some(name) = validate_stream_name(name, strict)? else {
            return Ok(None);
        };
        match self.streams.get(&name) {
            Some(handle) => Ok(Some(Arc::clone(handle))),
            None if strict => Err(CaptureError::InvalidName(format!(
                "no stream named `{name}`"
            ))),
            None => Ok(None),
        }
    }

    /// Soft lookup: `None` for invalid or unknown names.
    pub fn get(&self, name: impl Into<Value>) -> Option<StreamHandle> {
        self.lookup(&name.into(), false).ok().flatten()
    }

    /// Strict lookup.
    ///
    /// # Errors
    ///
    /// Returns `CaptureError::InvalidName` for invalid or unknown names.
    pub fn require(&self, name: impl Into<Value>) -> Result<StreamHandle, CaptureError> {
        let name = name.into();
        self.lookup(&name, true)?
            .ok_or_else(|| CaptureError::InvalidName(format!("no stream named {name}")))
    }

    pub fn contains(&self, name: impl Into<Value>) -> bool {
        self.get(name).is_some()
    }

    /// Applies `patch` to the stream called `name`.
    ///
    /// # Errors
    ///
    /// Returns `CaptureError::InvalidName` for invalid or unknown names and
    /// any error from [`Stream::configure`].
    pub fn configure(&self, name: impl Into<Value>, patch: &StreamPatch) -> Result<(), CaptureError> {
        let handle = self.require(name)?;
        let result = handle.lock().configure(patch);
        result
    }

    /// Unregisters a stream, returning its handle.
    pub fn remove(&mut self, name: impl Into<Value>) -> Option<StreamHandle> {
        let name = validate_stream_name(&name.into(), false).ok().flatten()?;
        let removed = self.streams.remove(&name);
        if removed.is_some() {
            tracing::debug!(stream = %name, "removed stream");
        }
        removed
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.streams.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Stats for every stream, sorted by name.
    pub fn stats(&self) -> Vec<StreamStats> {
        self.streams.values().map(|handle| handle.lock().stats()).collect()
    }

    /// Clears every stream.
    pub fn clear_all(&self) {
        for handle in self.streams.values() {
            handle.lock().clear();
        }
    }

    /// Emits into the stream called `name`, creating it with the registry
    /// defaults if needed.
    ///
    /// Returns `None` for an invalid name, a disabled stream, or defaults
    /// that fail to build a stream.
    pub fn emit(
        &mut self,
        name: impl Into<Value>,
        payload: impl Into<Payload>,
        options: &EmitOptions,
    ) -> Option<Arc<Record>> {
        let name = validate_stream_name(&name.into(), false).ok().flatten()?;
        let handle = match self.get_or_create(name.as_str(), StreamOptions::default()) {
            Ok(handle) => handle,
            Err(err) => {
                tracing::warn!(stream = %name, error = %err, "could not create stream for emit");
                return None;
            }
        };
        let record = handle.lock().emit(payload, options);
        record
    }

    pub fn log(&mut self, name: impl Into<Value>, payload: impl Into<Payload>) -> Option<Arc<Record>> {
        self.emit(name, payload, &EmitOptions::level("log"))
    }

    pub fn info(&mut self, name: impl Into<Value>, payload: impl Into<Payload>) -> Option<Arc<Record>> {
        self.emit(name, payload, &EmitOptions::level("info"))
    }

    pub fn warn(&mut self, name: impl Into<Value>, payload: impl Into<Payload>) -> Option<Arc<Record>> {
        self.emit(name, payload, &EmitOptions::level("warn"))
    }

    pub fn error(&mut self, name: impl Into<Value>, payload: impl Into<Payload>) -> Option<Arc<Record>> {
        self.emit(name, payload, &EmitOptions::level("error"))
    }

    /// Queries the stream called `name`; unknown names yield no records.
    ///
    /// # Errors
    ///
    /// Returns `CaptureError::InvalidConfig` for an invalid filter `limit`.
    pub fn query(
        &self,
        name: impl Into<Value>,
        filter: &Filter,
    ) -> Result<Vec<Arc<Record>>, CaptureError> {
        let Some(handle) = self.get(name) else {
            return Ok(Vec::new());
        };
        let records = handle.lock().query(filter);
        records
    }
}

fn strict_name(name: &Value) -> Result<String, CaptureError> {
    validate_stream_name(name, true)?
        .ok_or_else(|| CaptureError::InvalidName(format!("invalid stream name {name}")))
}
