use std::collections::BTreeMap;

/// A type that can be merged with a set of defaults.
///
/// Descriptor builders collect the caller's overrides in a fragment where every field is
/// optional, and merge it with a fragment of image defaults when the descriptor is built.
///
/// # Example
///
/// ```
/// # use xtf_builder::config::merge::Merge;
/// let mut data_dir: Option<String> = None;
/// data_dir.merge(&Some("/var/lib/pgsql/data".to_string()));
/// assert_eq!(data_dir.as_deref(), Some("/var/lib/pgsql/data"));
/// ```
pub trait Merge {
    /// Merge with `defaults`, preferring values from `self` if they are set there
    fn merge(&mut self, defaults: &Self);
}

/// Moving version of [`Merge::merge`]
pub fn merge<T: Merge>(mut overrides: T, defaults: &T) -> T {
    overrides.merge(defaults);
    overrides
}

/// A marker trait for types that are merged atomically (as one single value) rather than
/// trying to merge each field individually.
///
/// Collections are atomic on purpose: a caller supplied argument list or variable map
/// replaces the default one as a whole.
pub trait Atomic: Clone {}
impl Atomic for bool {}
impl Atomic for String {}
impl<T: Clone> Atomic for Vec<T> {}
impl<K: Clone, V: Clone> Atomic for BTreeMap<K, V> {}

impl<T: Atomic> Merge for Option<T> {
    fn merge(&mut self, defaults: &Self) {
        if self.is_none() {
            self.clone_from(defaults);
        }
    }
}

/// Treats the empty string as "not set", so that it falls back to the default on merge.
pub fn non_empty(value: impl Into<String>) -> Option<String> {
    Some(value.into()).filter(|value| !value.is_empty())
}
