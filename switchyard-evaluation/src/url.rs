//! Querystring-based variation overrides.

use ::url::Url;

/// Look up a forced variation index for `id` in a request URL.
///
/// The override parameter is named after the experiment/feature key and must
/// parse as an integer within `[0, num_variations)`; anything else (missing
/// parameter, unparseable URL or value, out-of-range index) returns `None`.
pub fn get_query_string_override(id: &str, raw_url: &str, num_variations: usize) -> Option<i32> {
    let parsed = Url::parse(raw_url).ok()?;
    let raw = parsed
        .query_pairs()
        .find(|(key, _)| key == id)
        .map(|(_, value)| value.into_owned())?;

    let index: i64 = raw.parse().ok()?;
    if index < 0 || index as usize >= num_variations {
        return None;
    }
    Some(index as i32)
}
