//! Header flattening between `http::HeaderMap` and envelope header objects.

use http::HeaderMap;
use std::collections::BTreeMap;

/// Flat header object as carried in both envelope directions.
///
/// Ordered so serialized envelopes are deterministic.
pub type HeaderFields = BTreeMap<String, String>;

/// Flatten a header map to exactly one value per header name.
///
/// When a name carries several values only the first is kept; repeated
/// headers are not round-tripped. Names come out in canonical MIME form
/// (see [`canonical_header_name`]). Values that are not valid UTF-8 are
/// converted lossily.
#[must_use]
pub fn flatten_headers(headers: &HeaderMap) -> HeaderFields {
    let mut fields = HeaderFields::new();
    for name in headers.keys() {
        if let Some(first) = headers.get(name) {
            fields.insert(
                canonical_header_name(name.as_str()),
                String::from_utf8_lossy(first.as_bytes()).into_owned(),
            );
        }
    }
    fields
}

/// Canonical MIME form of a header name: the first letter and every letter
/// following a `-` upper-cased, all other letters lower-cased.
///
/// `content-type` becomes `Content-Type`, `x-request-id` becomes
/// `X-Request-Id`. Non-letters are left alone.
#[must_use]
pub fn canonical_header_name(name: &str) -> String {
    let mut upper = true;
    name.chars()
        .map(|c| {
            let out = if upper {
                c.to_ascii_uppercase()
            } else {
                c.to_ascii_lowercase()
            };
            upper = c == '-';
            out
        })
        .collect()
}
