//! Semantic-version comparison with lexical-safe padding.
//!
//! Version strings are normalized so that plain string ordering over the
//! padded form matches semantic ordering. The exact algorithm is load-bearing:
//! interoperating evaluators must produce identical orderings.

use std::cmp::Ordering;

/// Split a version into its padded (main, prerelease) strings.
///
/// Lower-cases, strips a leading `v` and trailing `+build` metadata, splits
/// on `.` and `-`, zero-pads numeric segments to 5 digits. The first three
/// segments joined with `.` form the main version; any remaining segments
/// form the prerelease string.
fn parse_version(version: &str) -> (String, String) {
    let lowered = version.trim().to_lowercase();
    let stripped = lowered.strip_prefix('v').unwrap_or(&lowered);
    let stripped = stripped.split('+').next().unwrap_or("");

    let parts: Vec<String> = stripped
        .split(['.', '-'])
        .map(|segment| {
            if !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()) {
                format!("{segment:0>5}")
            } else {
                segment.to_string()
            }
        })
        .collect();

    let main = parts[..parts.len().min(3)].join(".");
    let prerelease = if parts.len() > 3 {
        parts[3..].join(".")
    } else {
        String::new()
    };
    (main, prerelease)
}

/// Compare two version strings semantically.
///
/// Main versions are compared lexically over their padded forms. When mains
/// are equal, a release (no prerelease) orders above any prerelease, and two
/// prereleases tie-break lexically.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let (main_a, pre_a) = parse_version(a);
    let (main_b, pre_b) = parse_version(b);

    match main_a.cmp(&main_b) {
        Ordering::Equal => match (pre_a.is_empty(), pre_b.is_empty()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => pre_a.cmp(&pre_b),
        },
        ordering => ordering,
    }
}
