//! Turns a logical API path into the request target sent to the daemon.

use crate::request::Query;

/// Build `/v{version}{path}?{query}`.
///
/// A leading `v` on `version` is tolerated, and an empty version leaves the
/// path unversioned. The query separator is omitted when there are no
/// parameters.
pub fn api_path(version: &str, path: &str, query: &Query) -> String {
    let version = version.trim_start_matches('v');
    let mut target = if version.is_empty() {
        path.to_string()
    } else {
        format!("/v{version}{path}")
    };
    if !query.is_empty() {
        target.push('?');
        target.push_str(&query.encode());
    }
    target
}
