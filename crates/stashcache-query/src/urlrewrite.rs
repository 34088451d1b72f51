//! Upstream media URL rewriting (§4.8): turns a raw upstream path into
//! a same-origin proxy path so the browser never talks to the upstream
//! directly.

const PROXY_PREFIX: &str = "/api/proxy/stash";

/// `raw` may be an absolute URL or a path; both are rewritten the same
/// way since only `pathname+search` ever survives into the proxy path.
pub fn rewrite_url(raw: Option<&str>, instance: Option<&str>) -> Option<String> {
    let raw = raw?;
    if raw.starts_with(PROXY_PREFIX) {
        return Some(raw.to_string());
    }

    let path_and_query = strip_origin(raw);
    let mut out = format!("{PROXY_PREFIX}?path={}", urlencoding::encode(path_and_query));
    if let Some(instance) = instance {
        out.push_str(&format!("&instanceId={}", urlencoding::encode(instance)));
    }
    Some(out)
}

/// Strips `scheme://host[:port]` from an absolute URL, leaving
/// `pathname+search`; a relative path is returned unchanged.
fn strip_origin(raw: &str) -> &str {
    let Some(scheme_end) = raw.find("://") else {
        return raw;
    };
    let rest = &raw[scheme_end + 3..];
    match rest.find('/') {
        Some(i) => &rest[i..],
        None => "/",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_stays_null() {
        assert_eq!(rewrite_url(None, None), None);
    }

    #[test]
    fn already_proxied_is_unchanged() {
        let raw = "/api/proxy/stash?path=%2Fscene%2F1&instanceId=abc";
        assert_eq!(rewrite_url(Some(raw), Some("other")), Some(raw.to_string()));
    }

    #[test]
    fn absolute_url_is_rewritten_to_path_query_param() {
        let got = rewrite_url(Some("http://stash.local:9999/scene/1/preview.webp?a=b"), None).unwrap();
        assert_eq!(got, "/api/proxy/stash?path=%2Fscene%2F1%2Fpreview.webp%3Fa%3Db");
    }

    #[test]
    fn relative_path_is_rewritten_the_same_way() {
        let got = rewrite_url(Some("/scene/1/preview.webp"), None).unwrap();
        assert_eq!(got, "/api/proxy/stash?path=%2Fscene%2F1%2Fpreview.webp");
    }

    #[test]
    fn instance_is_appended_when_present() {
        let got = rewrite_url(Some("/scene/1/preview.webp"), Some("inst a")).unwrap();
        assert_eq!(got, "/api/proxy/stash?path=%2Fscene%2F1%2Fpreview.webp&instanceId=inst%20a");
    }

    #[test]
    fn absolute_url_with_no_path_rewrites_to_root() {
        let got = rewrite_url(Some("http://stash.local"), None).unwrap();
        assert_eq!(got, "/api/proxy/stash?path=%2F");
    }
}
