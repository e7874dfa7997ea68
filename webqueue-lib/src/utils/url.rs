use url::Url;

use crate::HTTP_PORT;

/// Remove user info before a URL ends up in a log line
pub(crate) fn redact(url: &Url) -> String {
    let mut url = url.clone();
    // Both fail only for URLs that cannot carry credentials anyway
    let _ = url.set_username("");
    let _ = url.set_password(None);
    url.to_string()
}

/// Whether `left` and `right` name the same resource.
///
/// A missing port counts as 80 on both sides, everything else
/// has to match exactly.
pub(crate) fn urls_equivalent(left: &Url, right: &Url) -> bool {
    left.port().unwrap_or(HTTP_PORT) == right.port().unwrap_or(HTTP_PORT)
        && without_port(left) == without_port(right)
}

fn without_port(url: &Url) -> Url {
    let mut url = url.clone();
    let _ = url.set_port(None);
    url
}
