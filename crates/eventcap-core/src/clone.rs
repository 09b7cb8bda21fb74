//! Best-effort deep copy of record bodies.
//!
//! The fallback chain is: native deep clone, then an injected [`DeepCopy`]
//! implementation, then the original shared body. Nothing in this module
//! panics or returns an error to the caller.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use serde_json::{Map, Value};

/// Deepest nesting the native tier will copy.
///
/// Matches the recursion limit `serde_json` applies when parsing, so any
/// body that came from JSON text is always within reach.
pub const MAX_NATIVE_DEPTH: usize = 128;

/// Externally supplied deep-copy strategy, consulted after the native tier.
pub trait DeepCopy: Send + Sync {
    /// Returns an independent copy of `body`, or `None` if it cannot.
    fn deep_copy(&self, body: &Map<String, Value>) -> Option<Map<String, Value>>;
}

impl<F> DeepCopy for F
where
    F: Fn(&Map<String, Value>) -> Option<Map<String, Value>> + Send + Sync,
{
    fn deep_copy(&self, body: &Map<String, Value>) -> Option<Map<String, Value>> {
        self(body)
    }
}

/// Copies record bodies through the fallback chain.
#[derive(Clone, Default)]
pub struct CloneHelper {
    fallback: Option<Arc<dyn DeepCopy>>,
}

impl CloneHelper {
    /// A helper with only the native tier.
    pub fn new() -> Self {
        Self::default()
    }

    /// A helper that falls back to `copier` when the native tier refuses.
    pub fn with_fallback(copier: Arc<dyn DeepCopy>) -> Self {
        Self {
            fallback: Some(copier),
        }
    }

    /// Returns a body that no longer shares storage with `body`, when any
    /// tier manages to copy it; otherwise returns `body` itself.
    pub fn clone_body(&self, body: &Arc<Map<String, Value>>) -> Arc<Map<String, Value>> {
        if let Some(copy) = native_clone(body) {
            return Arc::new(copy);
        }

        if let Some(copier) = &self.fallback {
            match panic::catch_unwind(AssertUnwindSafe(|| copier.deep_copy(body))) {
                Ok(Some(copy)) => return Arc::new(copy),
                Ok(None) => {}
                Err(_) => tracing::warn!("injected deep copy panicked; keeping shared body"),
            }
        }

        tracing::debug!("body could not be copied; keeping shared reference");
        Arc::clone(body)
    }
}

impl std::fmt::Debug for CloneHelper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloneHelper")
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

fn native_clone(body: &Map<String, Value>) -> Option<Map<String, Value>> {
    if exceeds_depth(body, MAX_NATIVE_DEPTH) {
        None
    } else {
        Some(body.clone())
    }
}

/// Whether any container inside `body` sits deeper than `max` levels.
/// The body itself is level 1. Walks iteratively.
fn exceeds_depth(body: &Map<String, Value>, max: usize) -> bool {
    let mut pending: Vec<(&Value, usize)> = body.values().map(|v| (v, 1)).collect();

    while let Some((value, parent_depth)) = pending.pop() {
        let depth = parent_depth + 1;
        match value {
            Value::Array(items) => {
                if depth > max {
                    return true;
                }
                pending.extend(items.iter().map(|v| (v, depth)));
            }
            Value::Object(map) => {
                if depth > max {
                    return true;
                }
                pending.extend(map.values().map(|v| (v, depth)));
            }
            _ => {}
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Arc<Map<String, Value>> {
        match value {
            Value::Object(map) => Arc::new(map),
            other => panic!("expected object, got {other}"),
        }
    }

    /// Builds `{"n": [[[...]]]}` with `levels` nested arrays.
    fn nested(levels: usize) -> Arc<Map<String, Value>> {
        let mut value = json!(1);
        for _ in 0..levels {
            value = Value::Array(vec![value]);
        }
        object(json!({ "n": value }))
    }

    #[test]
    fn native_tier_detaches_body() {
        let body = object(json!({"msg": "x", "tags": ["a"]}));
        let copy = CloneHelper::new().clone_body(&body);
        assert!(!Arc::ptr_eq(&body, &copy));
        assert_eq!(*body, *copy);
    }

    #[test]
    fn depth_guard_boundaries() {
        assert!(!exceeds_depth(&nested(MAX_NATIVE_DEPTH - 1), MAX_NATIVE_DEPTH));
        assert!(exceeds_depth(&nested(MAX_NATIVE_DEPTH), MAX_NATIVE_DEPTH));
    }

    #[test]
    fn falls_back_to_injected_copier() {
        let body = nested(MAX_NATIVE_DEPTH + 5);
        let helper = CloneHelper::with_fallback(Arc::new(|_: &Map<String, Value>| {
            let mut map = Map::new();
            map.insert("copied".to_string(), json!(true));
            Some(map)
        }));
        let copy = helper.clone_body(&body);
        assert_eq!(copy.get("copied"), Some(&json!(true)));
    }

    #[test]
    fn returns_original_when_every_tier_fails() {
        let body = nested(MAX_NATIVE_DEPTH + 5);
        let refusing = CloneHelper::with_fallback(Arc::new(|_: &Map<String, Value>| None));
        assert!(Arc::ptr_eq(&body, &refusing.clone_body(&body)));

        assert!(Arc::ptr_eq(&body, &CloneHelper::new().clone_body(&body)));
    }

    #[test]
    fn panicking_copier_is_swallowed() {
        let body = nested(MAX_NATIVE_DEPTH + 5);
        let helper = CloneHelper::with_fallback(Arc::new(|_: &Map<String, Value>| -> Option<Map<String, Value>> {
            panic!("copier exploded")
        }));
        assert!(Arc::ptr_eq(&body, &helper.clone_body(&body)));
    }
}
