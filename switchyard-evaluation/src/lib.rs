//! Deterministic evaluation primitives for switchyard.
//!
//! This crate holds the pure leaf components of the assignment engine:
//! attribute/condition matching, semantic version comparison, FNV-1a hashing,
//! bucket-range arithmetic and querystring-override parsing. Everything here
//! is synchronous and free of I/O, and none of it can fail: malformed input
//! resolves to a safe default (no match, `None`, `-1`) so a caller's request
//! path is never crashed by bad targeting data.

pub mod bucket;
pub mod condition;
pub mod hash;
pub mod url;
pub mod value;
pub mod version;

pub use bucket::{
    BucketRange, Namespace, choose_variation, get_bucket_ranges, get_equal_weights, in_namespace,
    in_range,
};
pub use condition::eval_condition;
pub use hash::{fnv1a32, hash};
pub use self::url::get_query_string_override;
pub use version::compare_versions;
