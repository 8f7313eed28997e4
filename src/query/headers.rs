//! Trace header propagation between tiers.

use reqwest::header::HeaderMap;

/// Headers copied from an inbound request onto downstream calls so the
/// service mesh can stitch the tiers into a single trace.
pub const PROPAGATED_HEADERS: &[&str] = &[
    "x-request-id",
    "x-b3-traceid",
    "x-b3-spanid",
    "x-b3-parentspanid",
    "x-b3-sampled",
    "x-b3-flags",
    "x-ot-span-context",
];

/// Copy the propagated headers present (and non-empty) in `from` into `to`.
pub fn copy_trace_headers(from: &HeaderMap, to: &mut HeaderMap) {
    for name in PROPAGATED_HEADERS {
        if let Some(value) = from.get(*name) {
            if !value.is_empty() {
                to.insert(*name, value.clone());
            }
        }
    }
}
