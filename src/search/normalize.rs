//! Cleanup of result hrefs.
//!
//! Result headings link either straight to the target or through the engine's
//! redirect wrapper (`/url?url=<target>&<tracking>`). Refinement links such as
//! "search again" point back at `/search` and are not results at all.
//! These markers follow one engine's markup and need revisiting if it changes.

use std::borrow::Cow;

/// Internal refinement-link path.
const REFINEMENT_PREFIX: &str = "/search";
/// Redirect-wrapper path.
const REDIRECT_PREFIX: &str = "/url";
/// Redirect target parameter.
const REDIRECT_MARKER: &str = "?url=";

/// Placeholder written instead of URLs longer than the safety bound.
pub const URL_ERROR_MARKER: &str = "ERROR";

/// Turn a heading href into the target URL.
///
/// Returns `None` for refinement links and for hrefs that leave nothing usable.
#[must_use]
pub fn normalize_href(href: &str) -> Option<String> {
    let decoded = percent_decode(href);
    tracing::debug!("before: {href}");

    if decoded.starts_with(REFINEMENT_PREFIX) {
        return None;
    }

    let mut url = decoded.as_str();
    if let Some(start) = decoded.find(REDIRECT_MARKER) {
        url = &decoded[start + REDIRECT_MARKER.len()..];
        if let (true, Some(end)) = (decoded.starts_with(REDIRECT_PREFIX), url.find('&')) {
            url = &url[..end];
        }
    }

    tracing::debug!("after: {url}");
    (!url.is_empty()).then(|| url.to_string())
}

/// Replace URLs longer than `max_len` characters with [`URL_ERROR_MARKER`].
#[must_use]
pub fn checked_url(url: &str, max_len: usize) -> &str {
    if url.chars().count() > max_len {
        URL_ERROR_MARKER
    } else {
        url
    }
}

fn percent_decode(href: &str) -> String {
    urlencoding::decode(href).map_or_else(
        |_| String::from_utf8_lossy(&urlencoding::decode_binary(href.as_bytes())).into_owned(),
        Cow::into_owned,
    )
}
