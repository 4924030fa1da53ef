//! Fast hash map and hash set type aliases.
//!
//! Type aliases for [`FxHashMap`] and [`FxHashSet`] from the `rustc-hash`
//! crate. The Fx hash algorithm is roughly 2x faster than the standard
//! library's default hasher for the small keys used here (subscriber ids,
//! directory paths), at the cost of denial-of-service resistance, which is
//! irrelevant for process-internal registries.

/// A [`HashMap`](std::collections::HashMap) using the Fx hash algorithm.
pub type FxHashMap<K, V> = rustc_hash::FxHashMap<K, V>;

/// A [`HashSet`](std::collections::HashSet) using the Fx hash algorithm.
pub type FxHashSet<V> = rustc_hash::FxHashSet<V>;

/// The hasher used by [`FxHashMap`] and [`FxHashSet`].
pub type FxBuildHasher = rustc_hash::FxBuildHasher;
