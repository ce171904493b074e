//! Deduplicated warnings routed through the `log` facade.
//!
//! The DOM, parser and render crates report inputs they cannot honour
//! (an unknown script type, a split that hit the nesting cap) through here so
//! a pathological document produces one line per distinct problem instead
//! of one per node.

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

/// Global set of warnings we've already emitted
static WARNED: Mutex<Option<HashSet<String>>> = Mutex::new(None);

/// Warn about an unsupported or degraded input (logged once per unique message).
///
/// # Example
/// ```
/// arbor_common::warning::warn_once("Render", "inline split depth cap reached");
/// ```
pub fn warn_once(component: &str, message: &str) {
    let key = format!("[{component}] {message}");
    let should_log = WARNED
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .get_or_insert_with(HashSet::new)
        .insert(key);

    if should_log {
        log::warn!(target: "arbor", "[{component}] {message}");
    }
}

/// Returns true if `warn_once` has already emitted this warning.
#[must_use]
pub fn was_warned(component: &str, message: &str) -> bool {
    let key = format!("[{component}] {message}");
    WARNED
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .as_ref()
        .is_some_and(|set| set.contains(&key))
}

/// Clear all recorded warnings (call when loading a new document)
pub fn clear_warnings() {
    let mut guard = WARNED.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(set) = guard.as_mut() {
        set.clear();
    }
}
