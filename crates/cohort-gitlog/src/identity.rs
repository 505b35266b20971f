//! Author identity resolution.
//!
//! The same person often commits under several display names. A resolver
//! maps a raw display name to a canonical handle; names it does not know
//! stay their own handle.

use std::collections::BTreeMap;

/// Maps a raw author display name to a canonical handle.
pub trait IdentityResolver {
    /// Canonical handle for `display_name`, or `None` if unknown.
    fn resolve(&self, display_name: &str) -> Option<String>;
}

impl<F> IdentityResolver for F
where
    F: Fn(&str) -> Option<String>,
{
    fn resolve(&self, display_name: &str) -> Option<String> {
        self(display_name)
    }
}

/// Resolver that leaves every display name as its own handle.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoResolver;

impl IdentityResolver for NoResolver {
    fn resolve(&self, _display_name: &str) -> Option<String> {
        None
    }
}

/// Table-driven resolver, usually built from the `[identities]` config section.
///
/// # Examples
///
/// ```
/// use cohort_gitlog::identity::{HandleMap, IdentityResolver};
///
/// let map = HandleMap::from_iter([("M. D. Ahwireng", "mdahwireng")]);
/// assert_eq!(map.resolve("M. D. Ahwireng").as_deref(), Some("mdahwireng"));
/// assert_eq!(map.resolve("someone else"), None);
/// ```
#[derive(Debug, Clone, Default)]
pub struct HandleMap {
    handles: BTreeMap<String, String>,
}

impl HandleMap {
    pub fn new(handles: BTreeMap<String, String>) -> Self {
        Self { handles }
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for HandleMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            handles: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl IdentityResolver for HandleMap {
    fn resolve(&self, display_name: &str) -> Option<String> {
        self.handles.get(display_name.trim()).cloned()
    }
}
