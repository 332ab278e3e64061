use scraper::{Html, Selector};
use std::sync::LazyLock;
use url::Url;

/// Tags whose URL-bearing attributes are harvested.
const LINK_TAGS: &[&str] = &[
    "a", "area", "audio", "base", "blockquote", "body", "button", "del", "embed", "form",
    "frame", "head", "iframe", "img", "input", "ins", "link", "object", "q", "script",
    "source", "video",
];

const LINK_ATTRS: &[&str] = &["href", "action", "src", "cite", "codebase", "background"];

static LINK_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    let selector = LINK_TAGS.join(",");
    Selector::parse(&selector).unwrap_or_else(|e| panic!("invalid link selector: {e}"))
});

/// Every raw URL value found in the allow-listed tag/attribute pairs, in
/// document order.
pub fn extract_links(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut links = Vec::new();

    for element in document.select(&LINK_SELECTOR) {
        for (name, value) in element.value().attrs() {
            if LINK_ATTRS.contains(&name) {
                links.push(value.to_string());
            }
        }
    }

    links
}

/// Resolves `href` against the page URL. Fragments are dropped and only
/// http(s) targets survive, which filters out `javascript:`, `mailto:`,
/// `tel:` and the like.
pub fn resolve_link(base: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let mut url = base.join(href).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    url.set_fragment(None);
    Some(url)
}

/// `host[:port]` as written in the URL, the unit crawl scope is defined in.
pub fn authority(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_links_from_allowed_pairs() {
        let html = r#"<html><head><link href="/style.css"></head><body>
            <a href="/a">A</a>
            <form action="/submit?x=1"><input src="/btn.png"></form>
            <img src="img.png" alt="ignored">
            <blockquote cite="http://other.test/q"></blockquote>
            <div href="/not-harvested"></div>
            <script src="/app.js"></script>
        </body></html>"#;

        let links = extract_links(html);
        assert_eq!(
            links,
            vec![
                "/style.css",
                "/a",
                "/submit?x=1",
                "/btn.png",
                "img.png",
                "http://other.test/q",
                "/app.js"
            ]
        );
    }

    #[test]
    fn test_extract_links_from_non_html() {
        assert!(extract_links(r#"{"href": "/api"}"#).is_empty());
    }

    #[test]
    fn test_resolve_link() {
        let base = Url::parse("http://a.test/dir/page?x=1").unwrap();
        assert_eq!(
            resolve_link(&base, "other").unwrap().as_str(),
            "http://a.test/dir/other"
        );
        assert_eq!(
            resolve_link(&base, "/root#frag").unwrap().as_str(),
            "http://a.test/root"
        );
        assert_eq!(
            resolve_link(&base, "//b.test/y").unwrap().as_str(),
            "http://b.test/y"
        );
        assert!(resolve_link(&base, "#top").is_none());
        assert!(resolve_link(&base, "javascript:void(0)").is_none());
        assert!(resolve_link(&base, "mailto:x@a.test").is_none());
        assert!(resolve_link(&base, "").is_none());
    }

    #[test]
    fn test_authority() {
        let url = Url::parse("http://127.0.0.1:8080/x").unwrap();
        assert_eq!(authority(&url).unwrap(), "127.0.0.1:8080");
        let url = Url::parse("https://a.test/").unwrap();
        assert_eq!(authority(&url).unwrap(), "a.test");
    }
}
