// SPDX-License-Identifier: PMPL-1.0-or-later
//! Identifier exactness checks.
//!
//! A well-formed identifier is compared with `=`, anything else with a
//! substring test. The prefix lengths are positional: blank nodes look like
//! `_:<uuid>` and CTIDs like `ce-<uuid>`.

use url::Url;
use uuid::Uuid;

const BLANK_NODE_PREFIX_LEN: usize = 2;
const CTID_PREFIX_LEN: usize = 3;

/// Whether `value` is a complete identifier for the identifier-valued `key`.
///
/// For `@id` the blank-node form is checked before the URI form.
pub fn is_exact(key: &str, value: &str) -> bool {
    match key {
        "@id" => is_blank_node(value) || is_http_uri(value),
        "ceterms:ctid" => is_ctid(value),
        _ => false,
    }
}

pub fn is_blank_node(value: &str) -> bool {
    is_uuid(skip_chars(value, BLANK_NODE_PREFIX_LEN))
}

pub fn is_ctid(value: &str) -> bool {
    is_uuid(skip_chars(value, CTID_PREFIX_LEN))
}

/// Absolute `http`/`https` URI.
pub fn is_http_uri(value: &str) -> bool {
    Url::parse(value)
        .map(|url| matches!(url.scheme(), "http" | "https"))
        .unwrap_or(false)
}

fn is_uuid(value: Option<&str>) -> bool {
    value.is_some_and(|v| Uuid::try_parse(v).is_ok())
}

/// The remainder of `value` after `n` characters, if it has more than `n`.
fn skip_chars(value: &str, n: usize) -> Option<&str> {
    value
        .char_indices()
        .nth(n)
        .map(|(offset, _)| &value[offset..])
}
