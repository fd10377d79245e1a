//! Source URL normalization.

/// Prefixes `http://` when the value carries no URL scheme.
///
/// Scheme detection is done textually: `localhost:9090/x.gif` has no scheme
/// even though it contains a colon, so `Url::parse` alone cannot be used
/// here (it would read `localhost` as the scheme).
pub fn normalize_source_url(raw: &str) -> String {
    if has_scheme(raw) {
        raw.to_string()
    } else {
        format!("http://{raw}")
    }
}

fn has_scheme(raw: &str) -> bool {
    match raw.split_once("://") {
        Some((scheme, _)) => {
            !scheme.is_empty()
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        None => false,
    }
}
