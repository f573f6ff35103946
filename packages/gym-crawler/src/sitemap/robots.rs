//! Sitemap directives from robots.txt.

use url::Url;

/// Every `Sitemap:` directive in a robots.txt body, in file order.
///
/// The directive name is matched case-insensitively. Relative values are
/// resolved against `base` when given; values that cannot become an absolute
/// URL are dropped.
pub fn parse_sitemap_directives(content: &str, base: Option<&Url>) -> Vec<String> {
    let mut sitemaps = Vec::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((directive, value)) = line.split_once(':') else {
            continue;
        };
        if !directive.trim().eq_ignore_ascii_case("sitemap") {
            continue;
        }

        // Inline comments
        let value = value.split('#').next().unwrap_or_default().trim();
        if value.is_empty() {
            continue;
        }

        let resolved = match Url::parse(value) {
            Ok(url) => Some(url),
            Err(url::ParseError::RelativeUrlWithoutBase) => base.and_then(|b| b.join(value).ok()),
            Err(_) => None,
        };
        if let Some(url) = resolved {
            sitemaps.push(url.to_string());
        }
    }

    sitemaps
}

/// Location of robots.txt for a site root.
pub fn robots_url(base: &Url) -> Option<Url> {
    base.join("/robots.txt").ok()
}
