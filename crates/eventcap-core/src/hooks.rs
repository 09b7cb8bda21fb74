//! Callable types, the workspace handle, and the default console printer.

use std::sync::Arc;

use eventcap_types::ConsolePolicy;
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::record::Record;
use crate::stream::Stream;

/// Called synchronously after a record is stored.
pub type AcceptHook = Arc<dyn Fn(&Record, &Stream, &Workspace) + Send + Sync>;

/// Called synchronously for records that pass the console policy.
pub type PrintHook = Arc<dyn Fn(&Record, &PrintContext, &Workspace) + Send + Sync>;

/// Returns the current time in epoch milliseconds.
pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

/// A callable supplied either directly or as a reference to be resolved.
///
/// References come from loosely typed configuration (a TOML string naming a
/// registered hook, for instance) and are resolved through a
/// [`HookResolver`]. A falsy reference (`null`, `false`, `0`, `""`) stands
/// for "no callable", which lets a patch clear a hook explicitly.
#[derive(Clone)]
pub enum HookRef<F> {
    /// A callable ready to use.
    Direct(F),
    /// A configuration value naming a callable.
    Reference(Value),
}

impl<F> HookRef<F> {
    /// A reference that resolves to no callable.
    pub fn none() -> Self {
        Self::Reference(Value::Null)
    }

    /// A named reference, resolved through the stream's [`HookResolver`].
    pub fn named(name: impl Into<String>) -> Self {
        Self::Reference(Value::String(name.into()))
    }
}

impl HookRef<AcceptHook> {
    /// Wraps a closure as an accept-hook.
    pub fn accept(hook: impl Fn(&Record, &Stream, &Workspace) + Send + Sync + 'static) -> Self {
        Self::Direct(Arc::new(hook))
    }
}

impl HookRef<PrintHook> {
    /// Wraps a closure as a print-hook.
    pub fn print(hook: impl Fn(&Record, &PrintContext, &Workspace) + Send + Sync + 'static) -> Self {
        Self::Direct(Arc::new(hook))
    }
}

impl HookRef<Clock> {
    /// Wraps a closure as a clock.
    pub fn clock(clock: impl Fn() -> i64 + Send + Sync + 'static) -> Self {
        Self::Direct(Arc::new(clock))
    }
}

impl<F> std::fmt::Debug for HookRef<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Direct(_) => f.write_str("Direct(<callable>)"),
            Self::Reference(value) => f.debug_tuple("Reference").field(value).finish(),
        }
    }
}

impl<'de, F> Deserialize<'de> for HookRef<F> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Self::Reference)
    }
}

/// Resolves configuration references to callables.
///
/// Consulted only when a hook option is neither falsy nor directly callable.
/// Every method defaults to "cannot resolve".
pub trait HookResolver: Send + Sync {
    /// Resolves an accept-hook reference.
    fn resolve_accept(&self, _reference: &Value) -> Option<AcceptHook> {
        None
    }

    /// Resolves a print-hook reference.
    fn resolve_print(&self, _reference: &Value) -> Option<PrintHook> {
        None
    }
}

/// Severity and policy resolved for one print decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PrintContext {
    /// Severity derived from the record's level.
    pub severity: ConsolePolicy,
    /// Effective console policy (per-call override or stream default).
    pub policy: ConsolePolicy,
}

/// Caller-owned key-value container forwarded to every hook invocation.
///
/// Cloning a `Workspace` clones the handle, not the contents: all clones see
/// the same map. The stream never writes to it.
#[derive(Clone, Default)]
pub struct Workspace(Arc<Mutex<Map<String, Value>>>);

impl Workspace {
    /// Creates an empty workspace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps an existing map.
    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(Arc::new(Mutex::new(map)))
    }

    /// Locks the workspace for reading or writing.
    pub fn lock(&self) -> MutexGuard<'_, Map<String, Value>> {
        self.0.lock()
    }

    /// Copies the current contents out.
    pub fn snapshot(&self) -> Map<String, Value> {
        self.0.lock().clone()
    }

    /// Whether two handles share the same container.
    pub fn ptr_eq(&self, other: &Workspace) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// An object becomes the workspace as-is; anything else yields an empty one.
impl From<Value> for Workspace {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => Self::from_map(map),
            _ => Self::new(),
        }
    }
}

impl From<Map<String, Value>> for Workspace {
    fn from(map: Map<String, Value>) -> Self {
        Self::from_map(map)
    }
}

impl<'de> Deserialize<'de> for Workspace {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Self::from)
    }
}

impl std::fmt::Debug for Workspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0.try_lock() {
            Some(map) => f.debug_tuple("Workspace").field(&*map).finish(),
            None => f.write_str("Workspace(<locked>)"),
        }
    }
}

/// The wall clock in epoch milliseconds.
pub fn system_clock() -> Clock {
    Arc::new(|| chrono::Utc::now().timestamp_millis())
}

/// Writes a record as a `tracing` event under the `eventcap::console` target.
///
/// Used when a stream has no print-hook.
pub fn default_printer(record: &Record, ctx: &PrintContext, _workspace: &Workspace) {
    let header = &record.header;
    let body = Value::Object((*record.body).clone());
    match ctx.severity {
        ConsolePolicy::Error => tracing::error!(
            target: "eventcap::console",
            source = %header.source,
            level = %header.level,
            event = header.event.as_deref(),
            at = header.at,
            %body,
            "captured record"
        ),
        ConsolePolicy::Warn => tracing::warn!(
            target: "eventcap::console",
            source = %header.source,
            level = %header.level,
            event = header.event.as_deref(),
            at = header.at,
            %body,
            "captured record"
        ),
        _ => tracing::info!(
            target: "eventcap::console",
            source = %header.source,
            level = %header.level,
            event = header.event.as_deref(),
            at = header.at,
            %body,
            "captured record"
        ),
    }
}
